//! Method handle reference kinds.

use crate::error::Error::InvalidReferenceKind;
use crate::error::Result;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

/// The kind of a `MethodHandle` constant; the numeric values 1 through 9 are fixed by the class
/// file format.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl ReferenceKind {
    /// The wire value of the kind.
    #[must_use]
    pub fn kind(&self) -> u8 {
        *self as u8
    }

    /// Deserialize the `ReferenceKind` from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is not in `1..=9`.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<ReferenceKind> {
        let kind = bytes.read_u8()?;
        let reference_kind = match kind {
            1 => ReferenceKind::GetField,
            2 => ReferenceKind::GetStatic,
            3 => ReferenceKind::PutField,
            4 => ReferenceKind::PutStatic,
            5 => ReferenceKind::InvokeVirtual,
            6 => ReferenceKind::InvokeStatic,
            7 => ReferenceKind::InvokeSpecial,
            8 => ReferenceKind::NewInvokeSpecial,
            9 => ReferenceKind::InvokeInterface,
            _ => return Err(InvalidReferenceKind(kind)),
        };
        Ok(reference_kind)
    }

    /// Serialize the `ReferenceKind` to bytes.
    ///
    /// # Errors
    ///
    /// Should not occur; reserved for future use.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(self.kind())?;
        Ok(())
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReferenceKind::GetField => write!(f, "getField"),
            ReferenceKind::GetStatic => write!(f, "getStatic"),
            ReferenceKind::PutField => write!(f, "putField"),
            ReferenceKind::PutStatic => write!(f, "putStatic"),
            ReferenceKind::InvokeVirtual => write!(f, "invokeVirtual"),
            ReferenceKind::InvokeStatic => write!(f, "invokeStatic"),
            ReferenceKind::InvokeSpecial => write!(f, "invokeSpecial"),
            ReferenceKind::NewInvokeSpecial => write!(f, "newInvokeSpecial"),
            ReferenceKind::InvokeInterface => write!(f, "invokeInterface"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_invalid_kind() {
        let mut bytes = Cursor::new(vec![0]);
        assert_eq!(
            Err(InvalidReferenceKind(0)),
            ReferenceKind::from_bytes(&mut bytes)
        );
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        for (kind, value) in [
            (ReferenceKind::GetField, 1),
            (ReferenceKind::PutStatic, 4),
            (ReferenceKind::InvokeInterface, 9),
        ] {
            assert_eq!(value, kind.kind());
            let mut bytes = Vec::new();
            kind.to_bytes(&mut bytes)?;
            assert_eq!(vec![value], bytes);
            assert_eq!(kind, ReferenceKind::from_bytes(&mut Cursor::new(bytes))?);
        }
        Ok(())
    }
}
