//! Class access and property flags.

use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

bitflags::bitflags! {
    /// Class access flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ClassAccessFlags: u16 {
        /// Declared public; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared final; no subclasses allowed.
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by the invokespecial instruction.
        const SUPER = 0x0020;
        /// Is an interface, not a class.
        const INTERFACE = 0x0200;
        /// Declared abstract; must not be instantiated.
        const ABSTRACT = 0x0400;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an enum class.
        const ENUM = 0x4000;
        /// Is a module, not a class or interface.
        const MODULE = 0x8000;
    }
}

impl ClassAccessFlags {
    /// Deserialize the flags from bytes; undefined bits are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<ClassAccessFlags> {
        let access_flags = bytes.read_u16::<BigEndian>()?;
        Ok(ClassAccessFlags::from_bits_truncate(access_flags))
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

impl fmt::Display for ClassAccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:#06X}) {:?}", self.bits(), self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip() -> Result<()> {
        let flags = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
        let mut bytes = Vec::new();
        flags.to_bytes(&mut bytes)?;
        assert_eq!(vec![0x00, 0x21], bytes);
        assert_eq!(
            flags,
            ClassAccessFlags::from_bytes(&mut Cursor::new(bytes))?
        );
        Ok(())
    }

    #[test]
    fn test_undefined_bits_dropped() -> Result<()> {
        let mut bytes = Cursor::new(vec![0x01, 0x01]);
        assert_eq!(
            ClassAccessFlags::PUBLIC,
            ClassAccessFlags::from_bytes(&mut bytes)?
        );
        Ok(())
    }
}
