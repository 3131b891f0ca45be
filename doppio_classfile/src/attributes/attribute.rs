//! Class, field, method and code attributes.
//!
//! Only the two attributes the analysis core consumes are parsed structurally: `Code` and
//! `StackMapTable`. Every other attribute is carried as an opaque byte blob with its name, so
//! unknown or irrelevant attributes survive a read/write round trip untouched.

use crate::attributes::{ExceptionTableEntry, Instruction, StackFrame, code};
use crate::constant_pool::ConstantPool;
use crate::error::Error::IoShort;
use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Cursor, Read};

/// A single attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    /// The bytecode of a method, with per-instruction byte offsets preserved.
    Code {
        name_index: u16,
        max_stack: u16,
        max_locals: u16,
        code: Vec<(u32, Instruction)>,
        exception_table: Vec<ExceptionTableEntry>,
        attributes: Vec<Attribute>,
    },
    /// Compressed verification frames for the enclosing `Code` attribute.
    StackMapTable {
        name_index: u16,
        frames: Vec<StackFrame>,
    },
    /// Any other attribute, kept as an opaque byte blob of known length.
    Unknown { name_index: u16, info: Vec<u8> },
}

impl Attribute {
    /// The name of the attribute as resolved through the constant pool at read time, when it is
    /// one of the structurally parsed kinds.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Attribute::Code { .. } => Some("Code"),
            Attribute::StackMapTable { .. } => Some("StackMapTable"),
            Attribute::Unknown { .. } => None,
        }
    }

    /// Deserialize an attribute from bytes, dispatching on its resolved name.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated or a parsed attribute is malformed.
    pub fn from_bytes(
        constant_pool: &ConstantPool,
        bytes: &mut Cursor<Vec<u8>>,
    ) -> Result<Attribute> {
        let name_index = bytes.read_u16::<BigEndian>()?;
        let info_length = bytes.read_u32::<BigEndian>()?;
        let name = constant_pool.try_get_utf8(name_index).unwrap_or_default();

        let attribute = match name {
            "Code" => {
                let max_stack = bytes.read_u16::<BigEndian>()?;
                let max_locals = bytes.read_u16::<BigEndian>()?;

                let code_length = bytes.read_u32::<BigEndian>()? as usize;
                let mut code_bytes = vec![0; code_length];
                bytes
                    .read_exact(&mut code_bytes)
                    .map_err(|_| IoShort {
                        expected: code_length,
                    })?;
                let instructions = code::instructions_from_bytes(&mut Cursor::new(code_bytes))?;

                let exception_count = bytes.read_u16::<BigEndian>()?;
                let mut exception_table = Vec::with_capacity(exception_count as usize);
                for _ in 0..exception_count {
                    exception_table.push(ExceptionTableEntry::from_bytes(bytes)?);
                }

                let attribute_count = bytes.read_u16::<BigEndian>()?;
                let mut attributes = Vec::with_capacity(attribute_count as usize);
                for _ in 0..attribute_count {
                    attributes.push(Attribute::from_bytes(constant_pool, bytes)?);
                }

                Attribute::Code {
                    name_index,
                    max_stack,
                    max_locals,
                    code: instructions,
                    exception_table,
                    attributes,
                }
            }
            "StackMapTable" => {
                let frame_count = bytes.read_u16::<BigEndian>()?;
                let mut frames = Vec::with_capacity(frame_count as usize);
                for _ in 0..frame_count {
                    frames.push(StackFrame::from_bytes(bytes)?);
                }
                Attribute::StackMapTable { name_index, frames }
            }
            _ => {
                let info_length = info_length as usize;
                let mut info = vec![0; info_length];
                bytes.read_exact(&mut info).map_err(|_| IoShort {
                    expected: info_length,
                })?;
                Attribute::Unknown { name_index, info }
            }
        };
        Ok(attribute)
    }

    /// Serialize the attribute to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a length field overflows or a branch cannot be encoded.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let mut info: Vec<u8> = Vec::new();
        let name_index = match self {
            Attribute::Code {
                name_index,
                max_stack,
                max_locals,
                code: instructions,
                exception_table,
                attributes,
            } => {
                info.write_u16::<BigEndian>(*max_stack)?;
                info.write_u16::<BigEndian>(*max_locals)?;
                let code_bytes = code::instructions_to_bytes(instructions)?;
                info.write_u32::<BigEndian>(u32::try_from(code_bytes.len())?)?;
                info.extend_from_slice(&code_bytes);
                info.write_u16::<BigEndian>(u16::try_from(exception_table.len())?)?;
                for entry in exception_table {
                    entry.to_bytes(&mut info)?;
                }
                info.write_u16::<BigEndian>(u16::try_from(attributes.len())?)?;
                for attribute in attributes {
                    attribute.to_bytes(&mut info)?;
                }
                *name_index
            }
            Attribute::StackMapTable { name_index, frames } => {
                info.write_u16::<BigEndian>(u16::try_from(frames.len())?)?;
                for frame in frames {
                    frame.to_bytes(&mut info)?;
                }
                *name_index
            }
            Attribute::Unknown { name_index, info: blob } => {
                info.extend_from_slice(blob);
                *name_index
            }
        };

        bytes.write_u16::<BigEndian>(name_index)?;
        bytes.write_u32::<BigEndian>(u32::try_from(info.len())?)?;
        bytes.extend_from_slice(&info);
        Ok(())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Attribute::Code {
                max_stack,
                max_locals,
                code,
                exception_table,
                ..
            } => {
                writeln!(f, "Code: max_stack={max_stack}, max_locals={max_locals}")?;
                for (offset, instruction) in code {
                    writeln!(f, "  {offset}: {instruction}")?;
                }
                for entry in exception_table {
                    writeln!(f, "  {entry}")?;
                }
                Ok(())
            }
            Attribute::StackMapTable { frames, .. } => {
                writeln!(f, "StackMapTable:")?;
                for frame in frames {
                    writeln!(f, "  {frame}")?;
                }
                Ok(())
            }
            Attribute::Unknown { name_index, info } => {
                write!(f, "Unknown #{name_index}: {} bytes", info.len())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn code_pool() -> Result<(ConstantPool, u16)> {
        let mut constant_pool = ConstantPool::new();
        let index = constant_pool.add_utf8("Code")?;
        Ok((constant_pool, index))
    }

    #[test]
    fn test_code_round_trip() -> Result<()> {
        let (constant_pool, name_index) = code_pool()?;
        let attribute = Attribute::Code {
            name_index,
            max_stack: 2,
            max_locals: 2,
            code: vec![
                (0, Instruction::Iload_0),
                (1, Instruction::Iload_1),
                (2, Instruction::Iadd),
                (3, Instruction::Ireturn),
            ],
            exception_table: vec![ExceptionTableEntry {
                range_pc: 0..3,
                handler_pc: 3,
                catch_type: 0,
            }],
            attributes: vec![],
        };

        let mut bytes = Vec::new();
        attribute.to_bytes(&mut bytes)?;
        let mut cursor = Cursor::new(bytes);
        assert_eq!(attribute, Attribute::from_bytes(&constant_pool, &mut cursor)?);
        Ok(())
    }

    #[test]
    fn test_unknown_attribute_is_opaque() -> Result<()> {
        let mut constant_pool = ConstantPool::new();
        let name_index = constant_pool.add_utf8("SourceFile")?;
        let attribute = Attribute::Unknown {
            name_index,
            info: vec![0, 2],
        };

        let mut bytes = Vec::new();
        attribute.to_bytes(&mut bytes)?;
        assert_eq!(vec![0, 1, 0, 0, 0, 2, 0, 2], bytes);

        let mut cursor = Cursor::new(bytes);
        assert_eq!(attribute, Attribute::from_bytes(&constant_pool, &mut cursor)?);
        Ok(())
    }

    #[test]
    fn test_truncated_unknown_attribute() -> Result<()> {
        let mut constant_pool = ConstantPool::new();
        let name_index = constant_pool.add_utf8("SourceFile")?;
        let bytes = vec![0, u8::try_from(name_index)?, 0, 0, 0, 9, 1];
        let result = Attribute::from_bytes(&constant_pool, &mut Cursor::new(bytes));
        assert_eq!(Err(IoShort { expected: 9 }), result);
        Ok(())
    }

    #[test]
    fn test_stack_map_table_round_trip() -> Result<()> {
        let mut constant_pool = ConstantPool::new();
        let name_index = constant_pool.add_utf8("StackMapTable")?;
        let attribute = Attribute::StackMapTable {
            name_index,
            frames: vec![StackFrame::SameFrame { frame_type: 11 }],
        };

        let mut bytes = Vec::new();
        attribute.to_bytes(&mut bytes)?;
        let mut cursor = Cursor::new(bytes);
        assert_eq!(attribute, Attribute::from_bytes(&constant_pool, &mut cursor)?);
        Ok(())
    }
}
