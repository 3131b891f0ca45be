//! Methods of a class.

use crate::attributes::Attribute;
use crate::constant_pool::ConstantPool;
use crate::error::Result;
use crate::method_access_flags::MethodAccessFlags;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// A method: access flags, name and descriptor indices and attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl Method {
    /// The method's `Code` attribute, if it has one.
    #[must_use]
    pub fn code_attribute(&self) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| matches!(attribute, Attribute::Code { .. }))
    }

    /// Deserialize the `Method` from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid method.
    pub fn from_bytes(
        constant_pool: &ConstantPool,
        bytes: &mut Cursor<Vec<u8>>,
    ) -> Result<Method> {
        let access_flags = MethodAccessFlags::from_bytes(bytes)?;
        let name_index = bytes.read_u16::<BigEndian>()?;
        let descriptor_index = bytes.read_u16::<BigEndian>()?;
        let attribute_count = bytes.read_u16::<BigEndian>()?;
        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            attributes.push(Attribute::from_bytes(constant_pool, bytes)?);
        }
        Ok(Method {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    /// Serialize the `Method` to bytes.
    ///
    /// # Errors
    ///
    /// If there are more than 65,535 attributes.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        self.access_flags.to_bytes(bytes)?;
        bytes.write_u16::<BigEndian>(self.name_index)?;
        bytes.write_u16::<BigEndian>(self.descriptor_index)?;
        bytes.write_u16::<BigEndian>(u16::try_from(self.attributes.len())?)?;
        for attribute in &self.attributes {
            attribute.to_bytes(bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::attributes::Instruction;

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut constant_pool = ConstantPool::new();
        let code_index = constant_pool.add_utf8("Code")?;
        let method = Method {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            name_index: 2,
            descriptor_index: 3,
            attributes: vec![Attribute::Code {
                name_index: code_index,
                max_stack: 0,
                max_locals: 0,
                code: vec![(0, Instruction::Return)],
                exception_table: vec![],
                attributes: vec![],
            }],
        };

        let mut bytes = Vec::new();
        method.to_bytes(&mut bytes)?;
        let mut cursor = Cursor::new(bytes);
        let read = Method::from_bytes(&constant_pool, &mut cursor)?;
        assert_eq!(method, read);
        assert!(read.code_attribute().is_some());
        Ok(())
    }
}
