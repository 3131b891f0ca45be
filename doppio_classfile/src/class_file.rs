//! The class file façade.

use crate::class_access_flags::ClassAccessFlags;
use crate::constant::Constant;
use crate::constant_pool::ConstantPool;
use crate::error::Error::{InvalidConstantIndex, InvalidMagicNumber};
use crate::error::Result;
use crate::field::Field;
use crate::method::Method;
use crate::attributes::Attribute;
use crate::verify::Verifier;
use crate::version::Version;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const MAGIC: u32 = 0xCAFE_BABE;

/// The content of a Java `.class` file.
///
/// # Examples
///
/// ```rust
/// use doppio_classfile::{ClassFile, Verifier};
/// use std::io::Cursor;
///
/// fn load(bytes: Vec<u8>) -> doppio_classfile::Result<ClassFile> {
///     let mut verifier = Verifier::new();
///     ClassFile::from_bytes(&mut Cursor::new(bytes), &mut verifier)
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassFile {
    pub version: Version,
    pub constant_pool: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// The name of this class.
    ///
    /// # Errors
    ///
    /// Returns an error if `this_class` does not resolve to a class constant.
    pub fn class_name(&self) -> Result<&str> {
        let constant = self.constant_pool.try_get(self.this_class)?;
        let Constant::Class { name } = constant else {
            return Err(InvalidConstantIndex(self.this_class));
        };
        name.as_utf8().ok_or(InvalidConstantIndex(self.this_class))
    }

    /// Deserialize the `ClassFile` from bytes.
    ///
    /// Recoverable constant pool anomalies are reported to `verifier`; structural problems are
    /// hard errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid class file.
    pub fn from_bytes(
        bytes: &mut Cursor<Vec<u8>>,
        verifier: &mut Verifier,
    ) -> Result<ClassFile> {
        let magic = bytes.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(InvalidMagicNumber(magic));
        }

        let version = Version::from_bytes(bytes)?;
        let constant_pool = ConstantPool::from_bytes(&version, bytes, verifier)?;
        let access_flags = ClassAccessFlags::from_bytes(bytes)?;
        let this_class = bytes.read_u16::<BigEndian>()?;
        let super_class = bytes.read_u16::<BigEndian>()?;

        let interface_count = bytes.read_u16::<BigEndian>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(bytes.read_u16::<BigEndian>()?);
        }

        let field_count = bytes.read_u16::<BigEndian>()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(Field::from_bytes(&constant_pool, bytes)?);
        }

        let method_count = bytes.read_u16::<BigEndian>()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(Method::from_bytes(&constant_pool, bytes)?);
        }

        let attribute_count = bytes.read_u16::<BigEndian>()?;
        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            attributes.push(Attribute::from_bytes(&constant_pool, bytes)?);
        }

        Ok(ClassFile {
            version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Serialize the `ClassFile` to bytes.
    ///
    /// # Errors
    ///
    /// If there are more than 65,535 interfaces, fields, methods, or attributes.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(MAGIC)?;
        self.version.to_bytes(bytes)?;
        self.constant_pool.to_bytes(bytes)?;
        self.access_flags.to_bytes(bytes)?;
        bytes.write_u16::<BigEndian>(self.this_class)?;
        bytes.write_u16::<BigEndian>(self.super_class)?;

        bytes.write_u16::<BigEndian>(u16::try_from(self.interfaces.len())?)?;
        for interface in &self.interfaces {
            bytes.write_u16::<BigEndian>(*interface)?;
        }

        bytes.write_u16::<BigEndian>(u16::try_from(self.fields.len())?)?;
        for field in &self.fields {
            field.to_bytes(bytes)?;
        }

        bytes.write_u16::<BigEndian>(u16::try_from(self.methods.len())?)?;
        for method in &self.methods {
            method.to_bytes(bytes)?;
        }

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
    use crate::method_access_flags::MethodAccessFlags;

    fn sample_class() -> Result<ClassFile> {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.add_class("Sample")?;
        let super_class = constant_pool.add_class("java/lang/Object")?;
        let name_index = constant_pool.add_utf8("run")?;
        let descriptor_index = constant_pool.add_utf8("()V")?;
        let code_index = constant_pool.add_utf8("Code")?;

        Ok(ClassFile {
            version: Version::JAVA_8,
            constant_pool,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![Method {
                access_flags: MethodAccessFlags::PUBLIC,
                name_index,
                descriptor_index,
                attributes: vec![Attribute::Code {
                    name_index: code_index,
                    max_stack: 0,
                    max_locals: 1,
                    code: vec![(0, Instruction::Return)],
                    exception_table: vec![],
                    attributes: vec![],
                }],
            }],
            attributes: vec![],
        })
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = Cursor::new(0x0102_0304u32.to_be_bytes().to_vec());
        let mut verifier = Verifier::new();
        assert_eq!(
            Err(InvalidMagicNumber(0x0102_0304)),
            ClassFile::from_bytes(&mut bytes, &mut verifier)
        );
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let class_file = sample_class()?;
        assert_eq!("Sample", class_file.class_name()?);

        let mut bytes = Vec::new();
        class_file.to_bytes(&mut bytes)?;

        let mut verifier = Verifier::new();
        let read = ClassFile::from_bytes(&mut Cursor::new(bytes.clone()), &mut verifier)?;
        assert!(verifier.is_empty());
        assert_eq!(class_file, read);

        // A clean round trip is byte stable.
        let mut again = Vec::new();
        read.to_bytes(&mut again)?;
        assert_eq!(bytes, again);
        Ok(())
    }
}
