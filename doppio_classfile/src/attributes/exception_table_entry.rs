//! Exception table entries of a `Code` attribute.

use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;
use std::ops::Range;

/// One row of the exception table: a protected `[start, end)` byte range, a handler offset and
/// a constant pool index of the caught class (`0` catches everything).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ExceptionTableEntry {
    pub range_pc: Range<u16>,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    /// Deserialize the entry from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<ExceptionTableEntry> {
        let start_pc = bytes.read_u16::<BigEndian>()?;
        let end_pc = bytes.read_u16::<BigEndian>()?;
        let handler_pc = bytes.read_u16::<BigEndian>()?;
        let catch_type = bytes.read_u16::<BigEndian>()?;
        Ok(ExceptionTableEntry {
            range_pc: start_pc..end_pc,
            handler_pc,
            catch_type,
        })
    }

    /// Serialize the entry to bytes.
    ///
    /// # Errors
    ///
    /// Should not occur; reserved for future use.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.range_pc.start)?;
        bytes.write_u16::<BigEndian>(self.range_pc.end)?;
        bytes.write_u16::<BigEndian>(self.handler_pc)?;
        bytes.write_u16::<BigEndian>(self.catch_type)?;
        Ok(())
    }
}

impl fmt::Display for ExceptionTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "start_pc: {}, end_pc: {}, handler_pc: {}, catch_type: {}",
            self.range_pc.start, self.range_pc.end, self.handler_pc, self.catch_type
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_serialization() -> Result<()> {
        let entry = ExceptionTableEntry {
            range_pc: 1..2,
            handler_pc: 3,
            catch_type: 4,
        };
        let expected = [0, 1, 0, 2, 0, 3, 0, 4];

        let mut bytes = Vec::new();
        entry.to_bytes(&mut bytes)?;
        assert_eq!(expected, &bytes[..]);

        let mut bytes = Cursor::new(expected.to_vec());
        assert_eq!(entry, ExceptionTableEntry::from_bytes(&mut bytes)?);
        Ok(())
    }

    #[test]
    fn test_range_end_is_exclusive() {
        let entry = ExceptionTableEntry {
            range_pc: 1..3,
            handler_pc: 8,
            catch_type: 0,
        };
        assert!(entry.range_pc.contains(&1));
        assert!(entry.range_pc.contains(&2));
        assert!(!entry.range_pc.contains(&3));
    }
}
