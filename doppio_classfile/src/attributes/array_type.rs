//! Primitive array type codes for the `newarray` instruction.

use crate::error::Error::InvalidArrayTypeCode;
use crate::error::Result;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

/// The element type of a primitive array created by `newarray`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ArrayType {
    Boolean = 4,
    Char = 5,
    Float = 6,
    Double = 7,
    Byte = 8,
    Short = 9,
    Int = 10,
    Long = 11,
}

impl ArrayType {
    /// The wire code of the array type.
    #[must_use]
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Deserialize the `ArrayType` from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not in `4..=11`.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<ArrayType> {
        let code = bytes.read_u8()?;
        let array_type = match code {
            4 => ArrayType::Boolean,
            5 => ArrayType::Char,
            6 => ArrayType::Float,
            7 => ArrayType::Double,
            8 => ArrayType::Byte,
            9 => ArrayType::Short,
            10 => ArrayType::Int,
            11 => ArrayType::Long,
            _ => return Err(InvalidArrayTypeCode(code)),
        };
        Ok(array_type)
    }

    /// Serialize the `ArrayType` to bytes.
    ///
    /// # Errors
    ///
    /// Should not occur; reserved for future use.
    pub fn to_bytes(&self, bytes: &mut Cursor<Vec<u8>>) -> Result<()> {
        bytes.write_u8(self.code())?;
        Ok(())
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArrayType::Boolean => write!(f, "boolean"),
            ArrayType::Char => write!(f, "char"),
            ArrayType::Float => write!(f, "float"),
            ArrayType::Double => write!(f, "double"),
            ArrayType::Byte => write!(f, "byte"),
            ArrayType::Short => write!(f, "short"),
            ArrayType::Int => write!(f, "int"),
            ArrayType::Long => write!(f, "long"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_invalid_code() {
        let mut bytes = Cursor::new(vec![3]);
        assert_eq!(Err(InvalidArrayTypeCode(3)), ArrayType::from_bytes(&mut bytes));
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        for (array_type, code) in [
            (ArrayType::Boolean, 4),
            (ArrayType::Double, 7),
            (ArrayType::Long, 11),
        ] {
            assert_eq!(code, array_type.code());
            let mut bytes = Cursor::new(Vec::new());
            array_type.to_bytes(&mut bytes)?;
            assert_eq!(vec![code], bytes.clone().into_inner());
            bytes.set_position(0);
            assert_eq!(array_type, ArrayType::from_bytes(&mut bytes)?);
        }
        Ok(())
    }
}
