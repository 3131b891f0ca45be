//! Constant pool.
//!
//! The constant pool is a table of structures representing string constants, class and interface
//! names, field and method references, and the other constants referred to within a `ClassFile`
//! and its substructures.
//!
//! Indices are 1-based; index 0 is reserved. `Long` and `Double` constants are wide: they occupy
//! two consecutive slots. The pool deduplicates structurally equal constants on
//! [`add`](ConstantPool::add) and resolves both directions — index to constant and constant to
//! index — in O(1).
//!
//! Reading happens in two phases: every slot is first collected in its raw form (tags plus
//! numeric cross references), and only then resolved into nested [`Constant`] values through a
//! cycle-detecting dereference. The format permits forward references, and some obfuscators
//! exploit cycles; a slot that is re-entered during its own resolution is substituted with an
//! [`Constant::Index`] placeholder and reported as a `RecursiveConstant` diagnostic.

use crate::Version;
use crate::constant::Constant;
use crate::error::Error::{ConstantNotSupported, InvalidConstantIndex, IoShort, UnknownTag};
use crate::error::Result;
use crate::mutf8;
use crate::reference_kind::ReferenceKind;
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;
use std::fmt;
use std::io::{Cursor, Read};

/// One physical pool slot.
#[derive(Clone, Debug, PartialEq)]
enum Slot {
    /// Index 0, or the second slot of a wide constant.
    Placeholder,
    Constant(Constant),
}

/// The constant pool of one class.
///
/// # Examples
///
/// ```rust
/// use doppio_classfile::{Constant, ConstantPool};
///
/// let mut constant_pool = ConstantPool::new();
/// let index = constant_pool.add_utf8("Hello, World!")?;
/// assert_eq!(constant_pool.add_utf8("Hello, World!")?, index);
/// # Ok::<(), doppio_classfile::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantPool {
    slots: Vec<Slot>,
    lookup: HashMap<Constant, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty constant pool.
    #[must_use]
    pub fn new() -> Self {
        // The pool is 1-based; slot 0 is a permanent placeholder.
        Self {
            slots: vec![Slot::Placeholder],
            lookup: HashMap::new(),
        }
    }

    /// Append a constant without deduplication.
    ///
    /// Wide constants reserve an extra placeholder slot. The reverse index keeps the first
    /// occurrence, so later duplicates still resolve to the earliest index.
    pub fn push(&mut self, constant: Constant) {
        let index = self.slots.len();
        let wide = constant.is_wide();
        if let Ok(index) = u16::try_from(index) {
            self.lookup.entry(constant.clone()).or_insert(index);
        }
        self.slots.push(Slot::Constant(constant));
        if wide {
            self.slots.push(Slot::Placeholder);
        }
    }

    /// Add a constant and return its index, deduplicating structurally equal constants.
    ///
    /// Adding an [`Constant::Index`] placeholder is a no-op that returns the wrapped index.
    /// Nested payloads are added first so the pool stays closed under its own references.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool would grow past 65,534 slots; a wide constant at the end of
    /// the pool must not advance the slot count past the `u16` range either.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Constant::Index(index) = constant {
            return Ok(index);
        }
        if let Some(&index) = self.lookup.get(&constant) {
            return Ok(index);
        }
        self.add_children(&constant)?;
        // A duplicate may have been introduced while closing over children.
        if let Some(&index) = self.lookup.get(&constant) {
            return Ok(index);
        }
        // The count written to disk equals the slot total; a wide constant at the end of the
        // pool must leave that total within the u16 range.
        let width = usize::from(constant.is_wide());
        u16::try_from(self.slots.len() + width + 1)?;
        let index = u16::try_from(self.slots.len())?;
        self.push(constant);
        Ok(index)
    }

    fn add_children(&mut self, constant: &Constant) -> Result<()> {
        match constant {
            Constant::Class { name }
            | Constant::String { value: name }
            | Constant::MethodType { descriptor: name }
            | Constant::Module { name }
            | Constant::Package { name } => {
                self.add(name.as_ref().clone())?;
            }
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                self.add(class.as_ref().clone())?;
                self.add(name_and_type.as_ref().clone())?;
            }
            Constant::NameAndType { name, descriptor } => {
                self.add(name.as_ref().clone())?;
                self.add(descriptor.as_ref().clone())?;
            }
            Constant::MethodHandle { reference, .. } => {
                self.add(reference.as_ref().clone())?;
            }
            Constant::Dynamic { name_and_type, .. }
            | Constant::InvokeDynamic { name_and_type, .. } => {
                self.add(name_and_type.as_ref().clone())?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Get a constant by index; indices are 1-based.
    ///
    /// Returns an [`Constant::Index`] placeholder when the slot is absent or reserved, so
    /// callers that tolerate invalid references can keep going; use
    /// [`try_get`](ConstantPool::try_get) to raise instead.
    #[must_use]
    pub fn get(&self, index: u16) -> Constant {
        match self.slots.get(index as usize) {
            Some(Slot::Constant(constant)) => constant.clone(),
            _ => Constant::Index(index),
        }
    }

    /// Get a constant by index; indices are 1-based.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or reserved.
    pub fn try_get(&self, index: u16) -> Result<&Constant> {
        match self.slots.get(index as usize) {
            Some(Slot::Constant(constant)) => Ok(constant),
            _ => Err(InvalidConstantIndex(index)),
        }
    }

    /// Reverse lookup: the index a structurally equal constant occupies, if any.
    #[must_use]
    pub fn index_of(&self, constant: &Constant) -> Option<u16> {
        if let Constant::Index(index) = constant {
            return Some(*index);
        }
        self.lookup.get(constant).copied()
    }

    /// The number of occupied and reserved slots, excluding slot 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    /// Check if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over occupied slots as `(index, constant)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let Slot::Constant(constant) = slot else {
                return None;
            };
            u16::try_from(index).ok().map(|index| (index, constant))
        })
    }

    /// Deserialize the `ConstantPool` from bytes.
    ///
    /// Recoverable anomalies (reference cycles) are reported to `verifier` and substituted with
    /// placeholders; unknown tags, version-gated tags and truncated buffers are hard errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid constant pool.
    pub fn from_bytes(
        version: &Version,
        bytes: &mut Cursor<Vec<u8>>,
        verifier: &mut Verifier,
    ) -> Result<ConstantPool> {
        let count = bytes.read_u16::<BigEndian>()?;
        let mut raws: Vec<Option<RawConstant>> = vec![None; count as usize];

        let mut index = 1u16;
        while index < count {
            let raw = RawConstant::from_bytes(version, bytes)?;
            let wide = raw.is_wide();
            raws[index as usize] = Some(raw);
            index += if wide { 2 } else { 1 };
        }

        let mut pool = ConstantPool::new();
        let mut index = 1u16;
        while index < count {
            let Some(raw) = &raws[index as usize] else {
                // Unreachable for well-formed input; keep slot alignment regardless.
                pool.slots.push(Slot::Placeholder);
                index += 1;
                continue;
            };
            let wide = raw.is_wide();
            let mut resolving = Vec::new();
            let constant = resolve(index, &raws, &mut resolving, verifier);
            pool.push(constant);
            index += if wide { 2 } else { 1 };
        }

        Ok(pool)
    }

    /// Serialize the `ConstantPool` to bytes.
    ///
    /// Nested payloads are written as the indices of their structurally equal pool entries;
    /// [`Constant::Index`] placeholders are written verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested constant has no slot in this pool.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let count = u16::try_from(self.slots.len())?;
        bytes.write_u16::<BigEndian>(count)?;
        for slot in &self.slots {
            if let Slot::Constant(constant) = slot {
                self.write_constant(constant, bytes)?;
            }
        }
        Ok(())
    }

    fn nested_index(&self, constant: &Constant) -> Result<u16> {
        self.index_of(constant).ok_or(InvalidConstantIndex(0))
    }

    fn write_constant(&self, constant: &Constant, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(constant.tag())?;
        match constant {
            Constant::Index(_) => return Err(InvalidConstantIndex(0)),
            Constant::Utf8(value) => {
                let encoded = mutf8::to_bytes(value);
                let length = u16::try_from(encoded.len())?;
                bytes.write_u16::<BigEndian>(length)?;
                bytes.extend_from_slice(&encoded);
            }
            Constant::Integer(value) => bytes.write_i32::<BigEndian>(*value)?,
            Constant::Float(value) => bytes.write_f32::<BigEndian>(*value)?,
            Constant::Long(value) => bytes.write_i64::<BigEndian>(*value)?,
            Constant::Double(value) => bytes.write_f64::<BigEndian>(*value)?,
            Constant::Class { name }
            | Constant::String { value: name }
            | Constant::MethodType { descriptor: name }
            | Constant::Module { name }
            | Constant::Package { name } => {
                bytes.write_u16::<BigEndian>(self.nested_index(name)?)?;
            }
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                bytes.write_u16::<BigEndian>(self.nested_index(class)?)?;
                bytes.write_u16::<BigEndian>(self.nested_index(name_and_type)?)?;
            }
            Constant::NameAndType { name, descriptor } => {
                bytes.write_u16::<BigEndian>(self.nested_index(name)?)?;
                bytes.write_u16::<BigEndian>(self.nested_index(descriptor)?)?;
            }
            Constant::MethodHandle { kind, reference } => {
                kind.to_bytes(bytes)?;
                bytes.write_u16::<BigEndian>(self.nested_index(reference)?)?;
            }
            Constant::Dynamic {
                bootstrap_method_index,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_index,
                name_and_type,
            } => {
                bytes.write_u16::<BigEndian>(*bootstrap_method_index)?;
                bytes.write_u16::<BigEndian>(self.nested_index(name_and_type)?)?;
            }
        }
        Ok(())
    }

    /// Add a UTF-8 constant and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_utf8<S: AsRef<str>>(&mut self, value: S) -> Result<u16> {
        self.add(Constant::Utf8(value.as_ref().to_string()))
    }

    /// Add an integer constant and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.add(Constant::Integer(value))
    }

    /// Add a long constant and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_long(&mut self, value: i64) -> Result<u16> {
        self.add(Constant::Long(value))
    }

    /// Add a class constant and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_class<S: AsRef<str>>(&mut self, name: S) -> Result<u16> {
        self.add(Constant::Class {
            name: Box::new(Constant::Utf8(name.as_ref().to_string())),
        })
    }

    /// Add a string constant and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_string<S: AsRef<str>>(&mut self, value: S) -> Result<u16> {
        self.add(Constant::String {
            value: Box::new(Constant::Utf8(value.as_ref().to_string())),
        })
    }

    /// Add a name-and-type constant and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_name_and_type<S: AsRef<str>>(&mut self, name: S, descriptor: S) -> Result<u16> {
        self.add(Constant::NameAndType {
            name: Box::new(Constant::Utf8(name.as_ref().to_string())),
            descriptor: Box::new(Constant::Utf8(descriptor.as_ref().to_string())),
        })
    }

    /// Add a method reference and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_method_ref<S: AsRef<str>>(
        &mut self,
        class_name: S,
        name: S,
        descriptor: S,
    ) -> Result<u16> {
        let class = Constant::Class {
            name: Box::new(Constant::Utf8(class_name.as_ref().to_string())),
        };
        let name_and_type = Constant::NameAndType {
            name: Box::new(Constant::Utf8(name.as_ref().to_string())),
            descriptor: Box::new(Constant::Utf8(descriptor.as_ref().to_string())),
        };
        self.add(Constant::MethodRef {
            class: Box::new(class),
            name_and_type: Box::new(name_and_type),
        })
    }

    /// Add a field reference and return its index.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn add_field_ref<S: AsRef<str>>(
        &mut self,
        class_name: S,
        name: S,
        descriptor: S,
    ) -> Result<u16> {
        let class = Constant::Class {
            name: Box::new(Constant::Utf8(class_name.as_ref().to_string())),
        };
        let name_and_type = Constant::NameAndType {
            name: Box::new(Constant::Utf8(name.as_ref().to_string())),
            descriptor: Box::new(Constant::Utf8(descriptor.as_ref().to_string())),
        };
        self.add(Constant::FieldRef {
            class: Box::new(class),
            name_and_type: Box::new(name_and_type),
        })
    }

    /// Get a UTF-8 constant by index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or not a UTF-8 constant.
    pub fn try_get_utf8(&self, index: u16) -> Result<&str> {
        self.try_get(index)?
            .as_utf8()
            .ok_or(InvalidConstantIndex(index))
    }

    /// Get the name of a class constant by index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or not a resolved class constant.
    pub fn try_get_class_name(&self, index: u16) -> Result<&str> {
        self.try_get(index)?
            .class_name()
            .ok_or(InvalidConstantIndex(index))
    }
}

impl fmt::Display for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, constant) in self.iter() {
            writeln!(f, "#{index} = {constant}")?;
        }
        Ok(())
    }
}

/// One slot in its unresolved wire form: tags plus raw cross references.
#[derive(Clone, Debug)]
enum RawConstant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { value_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { kind: ReferenceKind, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl RawConstant {
    fn is_wide(&self) -> bool {
        matches!(self, RawConstant::Long(_) | RawConstant::Double(_))
    }

    fn from_bytes(version: &Version, bytes: &mut Cursor<Vec<u8>>) -> Result<RawConstant> {
        let tag = bytes.read_u8()?;
        let since = Constant::tag_since(tag);
        if since > *version {
            return Err(ConstantNotSupported {
                tag,
                major: since.major,
                minor: since.minor,
            });
        }
        let raw = match tag {
            1 => {
                let length = bytes.read_u16::<BigEndian>()? as usize;
                let mut utf8_bytes = vec![0; length];
                bytes
                    .read_exact(&mut utf8_bytes)
                    .map_err(|_| IoShort { expected: length })?;
                RawConstant::Utf8(mutf8::from_bytes(&utf8_bytes))
            }
            3 => RawConstant::Integer(bytes.read_i32::<BigEndian>()?),
            4 => RawConstant::Float(bytes.read_f32::<BigEndian>()?),
            5 => RawConstant::Long(bytes.read_i64::<BigEndian>()?),
            6 => RawConstant::Double(bytes.read_f64::<BigEndian>()?),
            7 => RawConstant::Class {
                name_index: bytes.read_u16::<BigEndian>()?,
            },
            8 => RawConstant::String {
                value_index: bytes.read_u16::<BigEndian>()?,
            },
            9 => RawConstant::FieldRef {
                class_index: bytes.read_u16::<BigEndian>()?,
                name_and_type_index: bytes.read_u16::<BigEndian>()?,
            },
            10 => RawConstant::MethodRef {
                class_index: bytes.read_u16::<BigEndian>()?,
                name_and_type_index: bytes.read_u16::<BigEndian>()?,
            },
            11 => RawConstant::InterfaceMethodRef {
                class_index: bytes.read_u16::<BigEndian>()?,
                name_and_type_index: bytes.read_u16::<BigEndian>()?,
            },
            12 => RawConstant::NameAndType {
                name_index: bytes.read_u16::<BigEndian>()?,
                descriptor_index: bytes.read_u16::<BigEndian>()?,
            },
            15 => RawConstant::MethodHandle {
                kind: ReferenceKind::from_bytes(bytes)?,
                reference_index: bytes.read_u16::<BigEndian>()?,
            },
            16 => RawConstant::MethodType {
                descriptor_index: bytes.read_u16::<BigEndian>()?,
            },
            17 => RawConstant::Dynamic {
                bootstrap_method_index: bytes.read_u16::<BigEndian>()?,
                name_and_type_index: bytes.read_u16::<BigEndian>()?,
            },
            18 => RawConstant::InvokeDynamic {
                bootstrap_method_index: bytes.read_u16::<BigEndian>()?,
                name_and_type_index: bytes.read_u16::<BigEndian>()?,
            },
            19 => RawConstant::Module {
                name_index: bytes.read_u16::<BigEndian>()?,
            },
            20 => RawConstant::Package {
                name_index: bytes.read_u16::<BigEndian>()?,
            },
            _ => return Err(UnknownTag(tag)),
        };
        Ok(raw)
    }
}

/// Resolve the slot at `index` into a [`Constant`], dereferencing raw cross references.
///
/// `resolving` is the stack of slots currently being resolved; re-entering one of them means
/// the file contains a reference cycle, which is reported and short-circuited with an
/// [`Constant::Index`] placeholder.
fn resolve(
    index: u16,
    raws: &[Option<RawConstant>],
    resolving: &mut Vec<u16>,
    verifier: &mut Verifier,
) -> Constant {
    let Some(Some(raw)) = raws.get(index as usize) else {
        return Constant::Index(index);
    };
    if resolving.contains(&index) {
        verifier.report(
            VerifyErrorKind::RecursiveConstant,
            ErrorSource::None,
            format!("constant #{index} participates in a reference cycle"),
        );
        return Constant::Index(index);
    }
    resolving.push(index);
    let mut deref = |target: u16| Box::new(resolve(target, raws, resolving, verifier));
    let constant = match raw {
        RawConstant::Utf8(value) => Constant::Utf8(value.clone()),
        RawConstant::Integer(value) => Constant::Integer(*value),
        RawConstant::Float(value) => Constant::Float(*value),
        RawConstant::Long(value) => Constant::Long(*value),
        RawConstant::Double(value) => Constant::Double(*value),
        RawConstant::Class { name_index } => Constant::Class {
            name: deref(*name_index),
        },
        RawConstant::String { value_index } => Constant::String {
            value: deref(*value_index),
        },
        RawConstant::FieldRef {
            class_index,
            name_and_type_index,
        } => Constant::FieldRef {
            class: deref(*class_index),
            name_and_type: deref(*name_and_type_index),
        },
        RawConstant::MethodRef {
            class_index,
            name_and_type_index,
        } => Constant::MethodRef {
            class: deref(*class_index),
            name_and_type: deref(*name_and_type_index),
        },
        RawConstant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        } => Constant::InterfaceMethodRef {
            class: deref(*class_index),
            name_and_type: deref(*name_and_type_index),
        },
        RawConstant::NameAndType {
            name_index,
            descriptor_index,
        } => Constant::NameAndType {
            name: deref(*name_index),
            descriptor: deref(*descriptor_index),
        },
        RawConstant::MethodHandle {
            kind,
            reference_index,
        } => Constant::MethodHandle {
            kind: *kind,
            reference: deref(*reference_index),
        },
        RawConstant::MethodType { descriptor_index } => Constant::MethodType {
            descriptor: deref(*descriptor_index),
        },
        RawConstant::Dynamic {
            bootstrap_method_index,
            name_and_type_index,
        } => Constant::Dynamic {
            bootstrap_method_index: *bootstrap_method_index,
            name_and_type: deref(*name_and_type_index),
        },
        RawConstant::InvokeDynamic {
            bootstrap_method_index,
            name_and_type_index,
        } => Constant::InvokeDynamic {
            bootstrap_method_index: *bootstrap_method_index,
            name_and_type: deref(*name_and_type_index),
        },
        RawConstant::Module { name_index } => Constant::Module {
            name: deref(*name_index),
        },
        RawConstant::Package { name_index } => Constant::Package {
            name: deref(*name_index),
        },
    };
    resolving.pop();
    constant
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_is_stable() -> Result<()> {
        let mut pool = ConstantPool::new();
        let index = pool.add(Constant::Integer(42))?;
        assert_eq!(1, index);
        assert_eq!(index, pool.add(Constant::Integer(42))?);
        assert_eq!(Constant::Integer(42), pool.get(index));
        assert_eq!(Some(index), pool.index_of(&Constant::Integer(42)));
        Ok(())
    }

    #[test]
    fn test_wide_constants_reserve_a_slot() -> Result<()> {
        let mut pool = ConstantPool::new();
        let long_index = pool.add(Constant::Long(7))?;
        let next_index = pool.add(Constant::Integer(1))?;
        assert_eq!(1, long_index);
        assert_eq!(3, next_index);
        assert_eq!(Constant::Index(2), pool.get(2));
        Ok(())
    }

    #[test]
    fn test_add_index_is_noop() -> Result<()> {
        let mut pool = ConstantPool::new();
        assert_eq!(9, pool.add(Constant::Index(9))?);
        assert!(pool.is_empty());
        Ok(())
    }

    #[test]
    fn test_add_closes_over_children() -> Result<()> {
        let mut pool = ConstantPool::new();
        let index = pool.add_method_ref("Calc", "add", "(II)I")?;
        // Utf8 "Calc", Class, Utf8 "add", Utf8 "(II)I", NameAndType, MethodRef
        assert_eq!(6, pool.len());
        assert_eq!(6, index);
        assert_eq!(Some(1), pool.index_of(&Constant::Utf8("Calc".to_string())));
        Ok(())
    }

    #[test]
    fn test_get_out_of_bounds_is_placeholder() {
        let pool = ConstantPool::new();
        assert_eq!(Constant::Index(0), pool.get(0));
        assert_eq!(Constant::Index(3), pool.get(3));
        assert_eq!(Err(InvalidConstantIndex(3)), pool.try_get(3).cloned());
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut pool = ConstantPool::new();
        pool.add_utf8("Hello")?;
        pool.add(Constant::Long(-2))?;
        pool.add_class("java/lang/Object")?;
        pool.add_string("Hello")?;
        pool.add_field_ref("A", "value", "I")?;

        let mut bytes = Vec::new();
        pool.to_bytes(&mut bytes)?;

        let mut verifier = Verifier::new();
        let read = ConstantPool::from_bytes(
            &Version::JAVA_8,
            &mut Cursor::new(bytes),
            &mut verifier,
        )?;
        assert!(verifier.is_empty());
        assert_eq!(pool.len(), read.len());
        for (index, constant) in pool.iter() {
            assert_eq!(*constant, read.get(index), "index {index}");
        }
        Ok(())
    }

    #[test]
    fn test_forward_reference() -> Result<()> {
        // Class at #1 referencing Utf8 at #2
        let bytes = vec![0, 3, 7, 0, 2, 1, 0, 1, b'A'];
        let mut verifier = Verifier::new();
        let pool = ConstantPool::from_bytes(
            &Version::JAVA_8,
            &mut Cursor::new(bytes),
            &mut verifier,
        )?;
        assert!(verifier.is_empty());
        assert_eq!(Some("A"), pool.get(1).class_name());
        Ok(())
    }

    #[test]
    fn test_recursive_constant() -> Result<()> {
        // Class at #1 whose name index is itself
        let bytes = vec![0, 2, 7, 0, 1];
        let mut verifier = Verifier::new();
        let pool = ConstantPool::from_bytes(
            &Version::JAVA_8,
            &mut Cursor::new(bytes),
            &mut verifier,
        )?;
        assert_eq!(1, verifier.len());
        assert_eq!(VerifyErrorKind::RecursiveConstant, verifier.errors()[0].kind);
        assert_eq!(
            Constant::Class {
                name: Box::new(Constant::Index(1))
            },
            pool.get(1)
        );
        Ok(())
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = vec![0, 2, 2];
        let mut verifier = Verifier::new();
        let result =
            ConstantPool::from_bytes(&Version::JAVA_8, &mut Cursor::new(bytes), &mut verifier);
        assert_eq!(Err(UnknownTag(2)), result);
    }

    #[test]
    fn test_constant_not_supported() {
        // Module constant in a Java 8 class file
        let bytes = vec![0, 2, 19, 0, 1];
        let mut verifier = Verifier::new();
        let result =
            ConstantPool::from_bytes(&Version::JAVA_8, &mut Cursor::new(bytes), &mut verifier);
        assert_eq!(
            Err(ConstantNotSupported {
                tag: 19,
                major: 53,
                minor: 0
            }),
            result
        );
    }

    #[test]
    fn test_truncated_utf8_is_io_short() {
        let bytes = vec![0, 2, 1, 0, 5, b'a'];
        let mut verifier = Verifier::new();
        let result =
            ConstantPool::from_bytes(&Version::JAVA_8, &mut Cursor::new(bytes), &mut verifier);
        assert_eq!(Err(IoShort { expected: 5 }), result);
    }

    #[test]
    fn test_wide_constant_respects_the_index_ceiling() {
        let mut pool = ConstantPool::new();
        // Fill every slot up to the u16 ceiling with distinct narrow constants.
        for value in 0..65_533 {
            pool.push(Constant::Integer(value));
        }
        assert_eq!(65_533, pool.len());

        // A wide constant would need two slots and push the count past u16.
        assert!(pool.add(Constant::Long(1)).is_err());
        // A narrow constant still fits in the final slot.
        assert_eq!(Ok(65_534), pool.add(Constant::Integer(65_534)));
        assert!(pool.add(Constant::Integer(65_535)).is_err());
    }

    #[test]
    fn test_dangling_reference_resolves_to_placeholder() -> Result<()> {
        // String at #1 referencing missing slot #7
        let bytes = vec![0, 2, 8, 0, 7];
        let mut verifier = Verifier::new();
        let pool = ConstantPool::from_bytes(
            &Version::JAVA_8,
            &mut Cursor::new(bytes),
            &mut verifier,
        )?;
        assert!(verifier.is_empty());
        assert_eq!(
            Constant::String {
                value: Box::new(Constant::Index(7))
            },
            pool.get(1)
        );

        // The placeholder round-trips verbatim.
        let mut bytes = Vec::new();
        pool.to_bytes(&mut bytes)?;
        assert_eq!(vec![0, 2, 8, 0, 7], bytes);
        Ok(())
    }
}
