//! Constant pool entries.
//!
//! Unlike the raw class file format, which stores cross references between pool slots as numeric
//! indices, a [`Constant`] here carries its payloads *resolved*: a `Class` holds its name, a
//! `FieldRef` holds its class and name-and-type constants. The [`Index`](Constant::Index)
//! variant stands in for a payload that could not be resolved — a dangling index, an
//! intentionally invalid reference in an obfuscated file, or a slot that participates in a
//! reference cycle.
//!
//! Equality and hashing are structural, with `Float`/`Double` compared by bit pattern so that
//! deduplication is stable even for NaN payloads.

use crate::Version;
use crate::reference_kind::ReferenceKind;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single constant pool entry with resolved payloads.
#[derive(Clone, Debug)]
pub enum Constant {
    /// A raw pool index; stands in for an unresolved or intentionally invalid reference.
    Index(u16),
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name: Box<Constant>,
    },
    String {
        value: Box<Constant>,
    },
    FieldRef {
        class: Box<Constant>,
        name_and_type: Box<Constant>,
    },
    MethodRef {
        class: Box<Constant>,
        name_and_type: Box<Constant>,
    },
    InterfaceMethodRef {
        class: Box<Constant>,
        name_and_type: Box<Constant>,
    },
    NameAndType {
        name: Box<Constant>,
        descriptor: Box<Constant>,
    },
    MethodHandle {
        kind: ReferenceKind,
        reference: Box<Constant>,
    },
    MethodType {
        descriptor: Box<Constant>,
    },
    Dynamic {
        bootstrap_method_index: u16,
        name_and_type: Box<Constant>,
    },
    InvokeDynamic {
        bootstrap_method_index: u16,
        name_and_type: Box<Constant>,
    },
    Module {
        name: Box<Constant>,
    },
    Package {
        name: Box<Constant>,
    },
}

impl Constant {
    /// Get the wire tag of the `Constant`.
    ///
    /// `Index` placeholders have no wire form of their own and report tag `0`.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Index(_) => 0,
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class { .. } => 7,
            Constant::String { .. } => 8,
            Constant::FieldRef { .. } => 9,
            Constant::MethodRef { .. } => 10,
            Constant::InterfaceMethodRef { .. } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType { .. } => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module { .. } => 19,
            Constant::Package { .. } => 20,
        }
    }

    /// `true` for constants that occupy two consecutive pool slots.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    /// The earliest class file version that supports this constant.
    #[must_use]
    pub fn since(&self) -> Version {
        match self {
            Constant::MethodHandle { .. }
            | Constant::MethodType { .. }
            | Constant::InvokeDynamic { .. } => Version::JAVA_7,
            Constant::Module { .. } | Constant::Package { .. } => Version::JAVA_9,
            Constant::Dynamic { .. } => Version::JAVA_11,
            _ => Version::JAVA_1_0_2,
        }
    }

    /// The earliest class file version that supports the given tag.
    #[must_use]
    pub fn tag_since(tag: u8) -> Version {
        match tag {
            15 | 16 | 18 => Version::JAVA_7,
            19 | 20 => Version::JAVA_9,
            17 => Version::JAVA_11,
            _ => Version::JAVA_1_0_2,
        }
    }

    /// The string payload, when this is a `Utf8` constant.
    #[must_use]
    pub fn as_utf8(&self) -> Option<&str> {
        match self {
            Constant::Utf8(value) => Some(value),
            _ => None,
        }
    }

    /// The class name, when this is a `Class` constant with a resolved name.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Constant::Class { name } => name.as_utf8(),
            _ => None,
        }
    }

    /// The name and descriptor strings, when this is a resolved `NameAndType` constant.
    #[must_use]
    pub fn name_and_descriptor(&self) -> Option<(&str, &str)> {
        match self {
            Constant::NameAndType { name, descriptor } => {
                Some((name.as_utf8()?, descriptor.as_utf8()?))
            }
            _ => None,
        }
    }

    /// The class name of a field or method reference, when fully resolved.
    #[must_use]
    pub fn reference_class_name(&self) -> Option<&str> {
        match self {
            Constant::FieldRef { class, .. }
            | Constant::MethodRef { class, .. }
            | Constant::InterfaceMethodRef { class, .. } => class.class_name(),
            _ => None,
        }
    }

    /// The descriptor of a field or method reference, when fully resolved.
    #[must_use]
    pub fn reference_descriptor(&self) -> Option<&str> {
        match self {
            Constant::FieldRef { name_and_type, .. }
            | Constant::MethodRef { name_and_type, .. }
            | Constant::InterfaceMethodRef { name_and_type, .. }
            | Constant::Dynamic { name_and_type, .. }
            | Constant::InvokeDynamic { name_and_type, .. } => {
                name_and_type.name_and_descriptor().map(|(_, d)| d)
            }
            _ => None,
        }
    }

}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Index(a), Constant::Index(b)) => a == b,
            (Constant::Utf8(a), Constant::Utf8(b)) => a == b,
            (Constant::Integer(a), Constant::Integer(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Long(a), Constant::Long(b)) => a == b,
            (Constant::Double(a), Constant::Double(b)) => a.to_bits() == b.to_bits(),
            (Constant::Class { name: a }, Constant::Class { name: b })
            | (Constant::String { value: a }, Constant::String { value: b })
            | (Constant::MethodType { descriptor: a }, Constant::MethodType { descriptor: b })
            | (Constant::Module { name: a }, Constant::Module { name: b })
            | (Constant::Package { name: a }, Constant::Package { name: b }) => a == b,
            (
                Constant::FieldRef {
                    class: class_a,
                    name_and_type: nat_a,
                },
                Constant::FieldRef {
                    class: class_b,
                    name_and_type: nat_b,
                },
            )
            | (
                Constant::MethodRef {
                    class: class_a,
                    name_and_type: nat_a,
                },
                Constant::MethodRef {
                    class: class_b,
                    name_and_type: nat_b,
                },
            )
            | (
                Constant::InterfaceMethodRef {
                    class: class_a,
                    name_and_type: nat_a,
                },
                Constant::InterfaceMethodRef {
                    class: class_b,
                    name_and_type: nat_b,
                },
            ) => class_a == class_b && nat_a == nat_b,
            (
                Constant::NameAndType {
                    name: name_a,
                    descriptor: descriptor_a,
                },
                Constant::NameAndType {
                    name: name_b,
                    descriptor: descriptor_b,
                },
            ) => name_a == name_b && descriptor_a == descriptor_b,
            (
                Constant::MethodHandle {
                    kind: kind_a,
                    reference: reference_a,
                },
                Constant::MethodHandle {
                    kind: kind_b,
                    reference: reference_b,
                },
            ) => kind_a == kind_b && reference_a == reference_b,
            (
                Constant::Dynamic {
                    bootstrap_method_index: bsm_a,
                    name_and_type: nat_a,
                },
                Constant::Dynamic {
                    bootstrap_method_index: bsm_b,
                    name_and_type: nat_b,
                },
            )
            | (
                Constant::InvokeDynamic {
                    bootstrap_method_index: bsm_a,
                    name_and_type: nat_a,
                },
                Constant::InvokeDynamic {
                    bootstrap_method_index: bsm_b,
                    name_and_type: nat_b,
                },
            ) => bsm_a == bsm_b && nat_a == nat_b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            Constant::Index(index) => index.hash(state),
            Constant::Utf8(value) => value.hash(state),
            Constant::Integer(value) => value.hash(state),
            Constant::Float(value) => value.to_bits().hash(state),
            Constant::Long(value) => value.hash(state),
            Constant::Double(value) => value.to_bits().hash(state),
            Constant::Class { name }
            | Constant::String { value: name }
            | Constant::MethodType { descriptor: name }
            | Constant::Module { name }
            | Constant::Package { name } => name.hash(state),
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
                class.hash(state);
                name_and_type.hash(state);
            }
            Constant::NameAndType { name, descriptor } => {
                name.hash(state);
                descriptor.hash(state);
            }
            Constant::MethodHandle { kind, reference } => {
                kind.kind().hash(state);
                reference.hash(state);
            }
            Constant::Dynamic {
                bootstrap_method_index,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_index,
                name_and_type,
            } => {
                bootstrap_method_index.hash(state);
                name_and_type.hash(state);
            }
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constant::Index(index) => write!(f, "Index #{index}"),
            Constant::Utf8(value) => write!(f, "Utf8 {value}"),
            Constant::Integer(value) => write!(f, "Integer {value}"),
            Constant::Float(value) => write!(f, "Float {value}"),
            Constant::Long(value) => write!(f, "Long {value}"),
            Constant::Double(value) => write!(f, "Double {value}"),
            Constant::Class { name } => write!(f, "Class {name}"),
            Constant::String { value } => write!(f, "String {value}"),
            Constant::FieldRef {
                class,
                name_and_type,
            } => write!(f, "Fieldref {class}.{name_and_type}"),
            Constant::MethodRef {
                class,
                name_and_type,
            } => write!(f, "Methodref {class}.{name_and_type}"),
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => write!(f, "InterfaceMethodref {class}.{name_and_type}"),
            Constant::NameAndType { name, descriptor } => {
                write!(f, "NameAndType {name}:{descriptor}")
            }
            Constant::MethodHandle { kind, reference } => {
                write!(f, "MethodHandle {kind} {reference}")
            }
            Constant::MethodType { descriptor } => write!(f, "MethodType {descriptor}"),
            Constant::Dynamic {
                bootstrap_method_index,
                name_and_type,
            } => write!(f, "Dynamic #{bootstrap_method_index}:{name_and_type}"),
            Constant::InvokeDynamic {
                bootstrap_method_index,
                name_and_type,
            } => write!(f, "InvokeDynamic #{bootstrap_method_index}:{name_and_type}"),
            Constant::Module { name } => write!(f, "Module {name}"),
            Constant::Package { name } => write!(f, "Package {name}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn class(name: &str) -> Constant {
        Constant::Class {
            name: Box::new(Constant::Utf8(name.to_string())),
        }
    }

    #[test]
    fn test_tags() {
        assert_eq!(1, Constant::Utf8("a".to_string()).tag());
        assert_eq!(5, Constant::Long(0).tag());
        assert_eq!(7, class("A").tag());
        assert_eq!(0, Constant::Index(3).tag());
    }

    #[test]
    fn test_wide() {
        assert!(Constant::Long(1).is_wide());
        assert!(Constant::Double(1.0).is_wide());
        assert!(!Constant::Integer(1).is_wide());
    }

    #[test]
    fn test_since() {
        assert_eq!(Version::JAVA_1_0_2, Constant::Integer(0).since());
        assert_eq!(
            Version::JAVA_7,
            Constant::MethodType {
                descriptor: Box::new(Constant::Utf8("()V".to_string()))
            }
            .since()
        );
        assert_eq!(Version::JAVA_9, Constant::tag_since(19));
        assert_eq!(Version::JAVA_11, Constant::tag_since(17));
    }

    #[test]
    fn test_nan_equality_is_bitwise() {
        let quiet = Constant::Float(f32::NAN);
        assert_eq!(quiet, Constant::Float(f32::NAN));
        assert_ne!(Constant::Float(0.0), Constant::Float(-0.0));
        assert_eq!(Constant::Double(1.5), Constant::Double(1.5));
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(class("java/lang/Object"), class("java/lang/Object"));
        assert_ne!(class("java/lang/Object"), class("java/lang/String"));
        assert_ne!(class("A"), Constant::Utf8("A".to_string()));
    }

    #[test]
    fn test_accessors() {
        let constant = class("java/lang/String");
        assert_eq!(Some("java/lang/String"), constant.class_name());
        assert_eq!(None, constant.as_utf8());

        let name_and_type = Constant::NameAndType {
            name: Box::new(Constant::Utf8("add".to_string())),
            descriptor: Box::new(Constant::Utf8("(II)I".to_string())),
        };
        assert_eq!(Some(("add", "(II)I")), name_and_type.name_and_descriptor());

        let method_ref = Constant::MethodRef {
            class: Box::new(class("A")),
            name_and_type: Box::new(name_and_type),
        };
        assert_eq!(Some("(II)I"), method_ref.reference_descriptor());
    }

    #[test]
    fn test_unresolved_accessors() {
        let constant = Constant::Class {
            name: Box::new(Constant::Index(42)),
        };
        assert_eq!(None, constant.class_name());
    }

    #[test]
    fn test_display() {
        assert_eq!("Utf8 hello", Constant::Utf8("hello".to_string()).to_string());
        assert_eq!("Class Utf8 A", class("A").to_string());
        assert_eq!("Index #9", Constant::Index(9).to_string());
    }
}
