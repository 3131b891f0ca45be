//! Wire-level verification types as stored inside `StackMapTable` frames.
//!
//! These carry constant pool indices and bytecode offsets, unlike the semantic lattice in
//! [`crate::analysis::FrameType`] which the abstract interpreter works with.

use crate::error::Error::InvalidVerificationTypeTag;
use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

/// A verification type in its `StackMapTable` encoding.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object { cpool_index: u16 },
    Uninitialized { offset: u16 },
}

impl VerificationType {
    /// The wire tag of the verification type.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            VerificationType::Top => 0,
            VerificationType::Integer => 1,
            VerificationType::Float => 2,
            VerificationType::Double => 3,
            VerificationType::Long => 4,
            VerificationType::Null => 5,
            VerificationType::UninitializedThis => 6,
            VerificationType::Object { .. } => 7,
            VerificationType::Uninitialized { .. } => 8,
        }
    }

    /// Deserialize the verification type from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is invalid.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<VerificationType> {
        let tag = bytes.read_u8()?;
        let verification_type = match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object {
                cpool_index: bytes.read_u16::<BigEndian>()?,
            },
            8 => VerificationType::Uninitialized {
                offset: bytes.read_u16::<BigEndian>()?,
            },
            _ => return Err(InvalidVerificationTypeTag(tag)),
        };
        Ok(verification_type)
    }

    /// Serialize the verification type to bytes.
    ///
    /// # Errors
    ///
    /// Should not occur; reserved for future use.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(self.tag())?;
        match self {
            VerificationType::Object { cpool_index } => {
                bytes.write_u16::<BigEndian>(*cpool_index)?;
            }
            VerificationType::Uninitialized { offset } => {
                bytes.write_u16::<BigEndian>(*offset)?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VerificationType::Top => write!(f, "top"),
            VerificationType::Integer => write!(f, "int"),
            VerificationType::Float => write!(f, "float"),
            VerificationType::Double => write!(f, "double"),
            VerificationType::Long => write!(f, "long"),
            VerificationType::Null => write!(f, "null"),
            VerificationType::UninitializedThis => write!(f, "uninitializedThis"),
            VerificationType::Object { cpool_index } => write!(f, "object #{cpool_index}"),
            VerificationType::Uninitialized { offset } => write!(f, "uninitialized @{offset}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_invalid_tag() {
        let mut bytes = Cursor::new(vec![9]);
        assert_eq!(
            Err(InvalidVerificationTypeTag(9)),
            VerificationType::from_bytes(&mut bytes)
        );
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let cases: Vec<(VerificationType, Vec<u8>)> = vec![
            (VerificationType::Top, vec![0]),
            (VerificationType::Integer, vec![1]),
            (VerificationType::Long, vec![4]),
            (VerificationType::Object { cpool_index: 7 }, vec![7, 0, 7]),
            (
                VerificationType::Uninitialized { offset: 300 },
                vec![8, 1, 44],
            ),
        ];
        for (verification_type, expected) in cases {
            let mut bytes = Vec::new();
            verification_type.to_bytes(&mut bytes)?;
            assert_eq!(expected, bytes);
            let mut cursor = Cursor::new(bytes);
            assert_eq!(
                verification_type,
                VerificationType::from_bytes(&mut cursor)?
            );
        }
        Ok(())
    }
}
