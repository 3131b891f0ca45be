//! Field access and property flags.

use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

bitflags::bitflags! {
    /// Field access flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct FieldAccessFlags: u16 {
        /// Declared public; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared private; accessible only within the defining class.
        const PRIVATE = 0x0002;
        /// Declared protected; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared static.
        const STATIC = 0x0008;
        /// Declared final; never directly assigned to after object construction.
        const FINAL = 0x0010;
        /// Declared volatile; cannot be cached.
        const VOLATILE = 0x0040;
        /// Declared transient; not written or read by a persistent object manager.
        const TRANSIENT = 0x0080;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an enum class.
        const ENUM = 0x4000;
    }
}

impl FieldAccessFlags {
    /// Deserialize the flags from bytes; undefined bits are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<FieldAccessFlags> {
        let access_flags = bytes.read_u16::<BigEndian>()?;
        Ok(FieldAccessFlags::from_bits_truncate(access_flags))
    }

    /// Serialize the flags to bytes.
    ///
    /// # Errors
    ///
    /// Should not occur; reserved for future use.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.bits())?;
        Ok(())
    }
}

impl fmt::Display for FieldAccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:#06X}) {:?}", self.bits(), self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip() -> Result<()> {
        let flags = FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL;
        let mut bytes = Vec::new();
        flags.to_bytes(&mut bytes)?;
        assert_eq!(vec![0x00, 0x12], bytes);
        assert_eq!(
            flags,
            FieldAccessFlags::from_bytes(&mut Cursor::new(bytes))?
        );
        Ok(())
    }
}
