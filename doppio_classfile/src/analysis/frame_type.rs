//! The verification type lattice used by the abstract interpreter.
//!
//! These are semantic types: class names are carried as strings and uninitialized objects are
//! identified by the instruction that created them, not by a bytecode offset — offsets do not
//! exist until the assembler lays blocks out. The wire-level encoding used inside
//! `StackMapTable` attributes lives in [`crate::attributes::VerificationType`].
//!
//! `byte`, `short`, `char` and `boolean` are distinct members of the lattice (they matter for
//! array element checks) but widen to `int` whenever a value is pushed on the operand stack.

use crate::graph::Label;
use std::fmt;
use std::sync::Arc;

/// The instruction that created an uninitialized object: a `new` at `index` within `block`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NewSite {
    pub block: Label,
    pub index: usize,
}

/// A verification type.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum FrameType {
    /// The unusable type; absorbs everything during merging and pads the second slot of
    /// category 2 values.
    #[default]
    Top,
    Int,
    Byte,
    Short,
    Char,
    Boolean,
    Float,
    Long,
    Double,
    /// The type of the `null` reference; assignable to any reference type.
    Null,
    /// The address pushed by `jsr`; discriminated by entry source, not by the type itself.
    ReturnAddress,
    /// A newly created but uninitialized object.
    Uninitialized(NewSite),
    /// The receiver of a constructor before the superclass constructor has run.
    UninitializedThis,
    /// An instance of a class or interface, by internal name.
    Reference(Arc<str>),
    /// An array with an explicit dimension count and a non-array element type.
    Array { dims: u8, element: Box<FrameType> },
}

impl FrameType {
    /// A reference to a class by internal name.
    #[must_use]
    pub fn reference<S: AsRef<str>>(name: S) -> Self {
        FrameType::Reference(Arc::from(name.as_ref()))
    }

    /// The `java/lang/Object` reference type.
    #[must_use]
    pub fn object() -> Self {
        FrameType::reference("java/lang/Object")
    }

    /// The `java/lang/String` reference type.
    #[must_use]
    pub fn string() -> Self {
        FrameType::reference("java/lang/String")
    }

    /// The `java/lang/Throwable` reference type.
    #[must_use]
    pub fn throwable() -> Self {
        FrameType::reference("java/lang/Throwable")
    }

    /// An array type; `dims` of zero collapses to the element type itself.
    #[must_use]
    pub fn array(dims: u8, element: FrameType) -> Self {
        if dims == 0 {
            element
        } else {
            FrameType::Array {
                dims,
                element: Box::new(element),
            }
        }
    }

    /// The number of stack or local slots the type occupies.
    #[must_use]
    pub const fn category(&self) -> u8 {
        match self {
            FrameType::Long | FrameType::Double => 2,
            _ => 1,
        }
    }

    /// `true` for category 2 types.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        self.category() == 2
    }

    /// `true` for reference types, including `null` and uninitialized objects.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(
            self,
            FrameType::Reference(_)
                | FrameType::Array { .. }
                | FrameType::Null
                | FrameType::Uninitialized(_)
                | FrameType::UninitializedThis
        )
    }

    /// `true` for the int family: `int` and the types that widen to it.
    #[must_use]
    pub const fn is_int_family(&self) -> bool {
        matches!(
            self,
            FrameType::Int
                | FrameType::Byte
                | FrameType::Short
                | FrameType::Char
                | FrameType::Boolean
        )
    }

    /// The type a value takes when pushed on the operand stack; sub-int types widen to `int`.
    #[must_use]
    pub fn on_stack(&self) -> FrameType {
        if self.is_int_family() {
            FrameType::Int
        } else {
            self.clone()
        }
    }

    /// Whether two types can meet at a join or satisfy a pop expectation without conflict.
    ///
    /// `Top` absorbs anything; int-family types agree with each other; all reference types
    /// (including `null`) agree with each other; everything else requires equality.
    #[must_use]
    pub fn check_merge(&self, other: &FrameType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (FrameType::Top, _) | (_, FrameType::Top) => true,
            (a, b) if a.is_int_family() && b.is_int_family() => true,
            // Uninitialized objects only agree with themselves, handled by equality above.
            (FrameType::Uninitialized(_) | FrameType::UninitializedThis, _)
            | (_, FrameType::Uninitialized(_) | FrameType::UninitializedThis) => false,
            (a, b) if a.is_reference() && b.is_reference() => true,
            _ => false,
        }
    }

    /// The least upper bound of two types.
    ///
    /// Without a class hierarchy to consult, distinct reference types meet at
    /// `java/lang/Object`; incompatible types meet at `Top`.
    #[must_use]
    pub fn merge(&self, other: &FrameType) -> FrameType {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (FrameType::Top, _) | (_, FrameType::Top) => FrameType::Top,
            (a, b) if a.is_int_family() && b.is_int_family() => FrameType::Int,
            (FrameType::Null, other) | (other, FrameType::Null) if other.is_reference() => {
                match other {
                    FrameType::Uninitialized(_) | FrameType::UninitializedThis => FrameType::Top,
                    _ => other.clone(),
                }
            }
            (
                FrameType::Array {
                    dims: dims_a,
                    element: element_a,
                },
                FrameType::Array {
                    dims: dims_b,
                    element: element_b,
                },
            ) => {
                if dims_a == dims_b
                    && matches!(element_a.as_ref(), FrameType::Reference(_))
                    && matches!(element_b.as_ref(), FrameType::Reference(_))
                {
                    FrameType::array(*dims_a, FrameType::object())
                } else {
                    FrameType::object()
                }
            }
            (FrameType::Array { .. }, FrameType::Reference(name))
            | (FrameType::Reference(name), FrameType::Array { .. }) => {
                // Arrays implement Cloneable and Serializable; anything else meets at Object.
                if name.as_ref() == "java/lang/Cloneable" || name.as_ref() == "java/io/Serializable"
                {
                    FrameType::Reference(name.clone())
                } else {
                    FrameType::object()
                }
            }
            (FrameType::Reference(_), FrameType::Reference(_)) => FrameType::object(),
            _ => FrameType::Top,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameType::Top => write!(f, "top"),
            FrameType::Int => write!(f, "int"),
            FrameType::Byte => write!(f, "byte"),
            FrameType::Short => write!(f, "short"),
            FrameType::Char => write!(f, "char"),
            FrameType::Boolean => write!(f, "boolean"),
            FrameType::Float => write!(f, "float"),
            FrameType::Long => write!(f, "long"),
            FrameType::Double => write!(f, "double"),
            FrameType::Null => write!(f, "null"),
            FrameType::ReturnAddress => write!(f, "returnAddress"),
            FrameType::Uninitialized(site) => {
                write!(f, "uninitialized({}:{})", site.block, site.index)
            }
            FrameType::UninitializedThis => write!(f, "uninitializedThis"),
            FrameType::Reference(name) => write!(f, "{name}"),
            FrameType::Array { dims, element } => {
                write!(f, "{element}")?;
                for _ in 0..*dims {
                    write!(f, "[]")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_category() {
        assert_eq!(1, FrameType::Int.category());
        assert_eq!(1, FrameType::object().category());
        assert_eq!(2, FrameType::Long.category());
        assert_eq!(2, FrameType::Double.category());
    }

    #[test]
    fn test_on_stack_widening() {
        assert_eq!(FrameType::Int, FrameType::Byte.on_stack());
        assert_eq!(FrameType::Int, FrameType::Boolean.on_stack());
        assert_eq!(FrameType::Float, FrameType::Float.on_stack());
        assert_eq!(FrameType::object(), FrameType::object().on_stack());
    }

    #[test]
    fn test_check_merge() {
        assert!(FrameType::Int.check_merge(&FrameType::Int));
        assert!(FrameType::Int.check_merge(&FrameType::Char));
        assert!(FrameType::Top.check_merge(&FrameType::Long));
        assert!(FrameType::Null.check_merge(&FrameType::string()));
        assert!(FrameType::string().check_merge(&FrameType::object()));
        assert!(!FrameType::Int.check_merge(&FrameType::Float));
        assert!(!FrameType::Long.check_merge(&FrameType::Double));
        assert!(!FrameType::Int.check_merge(&FrameType::object()));
    }

    #[test]
    fn test_check_merge_uninitialized() {
        let site_a = NewSite { block: 0, index: 0 };
        let site_b = NewSite { block: 0, index: 2 };
        assert!(
            FrameType::Uninitialized(site_a).check_merge(&FrameType::Uninitialized(site_a))
        );
        assert!(
            !FrameType::Uninitialized(site_a).check_merge(&FrameType::Uninitialized(site_b))
        );
        assert!(!FrameType::UninitializedThis.check_merge(&FrameType::object()));
    }

    #[test]
    fn test_merge() {
        assert_eq!(FrameType::Int, FrameType::Int.merge(&FrameType::Short));
        assert_eq!(FrameType::Top, FrameType::Int.merge(&FrameType::Float));
        assert_eq!(
            FrameType::string(),
            FrameType::Null.merge(&FrameType::string())
        );
        assert_eq!(
            FrameType::object(),
            FrameType::string().merge(&FrameType::reference("java/lang/Integer"))
        );
    }

    #[test]
    fn test_merge_arrays() {
        let int_array = FrameType::array(1, FrameType::Int);
        let string_array = FrameType::array(1, FrameType::string());
        let object_array = FrameType::array(1, FrameType::object());

        assert_eq!(int_array, int_array.merge(&int_array.clone()));
        assert_eq!(FrameType::object(), int_array.merge(&string_array));
        assert_eq!(object_array, string_array.merge(&object_array));
        assert_eq!(
            FrameType::reference("java/lang/Cloneable"),
            int_array.merge(&FrameType::reference("java/lang/Cloneable"))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!("int", FrameType::Int.to_string());
        assert_eq!("java/lang/String", FrameType::string().to_string());
        assert_eq!(
            "int[][]",
            FrameType::array(2, FrameType::Int).to_string()
        );
    }
}
