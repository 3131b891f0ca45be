//! Class hierarchy queries injected into the analysis.
//!
//! Deciding whether one class is assignable to another needs a classpath, and this library
//! does not load classes. Checks that depend on the hierarchy — a handler's declared catch
//! type must be assignable to `java/lang/Throwable` — consult a caller-supplied
//! [`ClassHierarchy`] instead. Embedders wire the trait to their class loader;
//! [`PermissiveHierarchy`] is the no-classpath default that answers from name structure alone
//! and assumes assignability whenever it cannot disprove it.

/// Answers subtype questions about classes known to the caller.
pub trait ClassHierarchy {
    /// Whether a value of class `source` may be assigned to `target`.
    ///
    /// Both names are internal class names (`java/lang/Throwable`) or array descriptors
    /// (`[I`, `[Ljava/lang/String;`). Implementations that cannot resolve one of the classes
    /// should answer `true`; the analysis treats `false` as proof of a conflict and reports
    /// a diagnostic.
    fn is_assignable(&self, target: &str, source: &str) -> bool;
}

/// The hierarchy used when no classpath is available.
///
/// Only structurally impossible relationships are rejected: an array is assignable to array
/// types, `java/lang/Object`, `java/lang/Cloneable` and `java/io/Serializable` and nothing
/// else, and no plain class is assignable to an array type. Everything else is assumed
/// assignable.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissiveHierarchy;

impl ClassHierarchy for PermissiveHierarchy {
    fn is_assignable(&self, target: &str, source: &str) -> bool {
        if target == source {
            return true;
        }
        let source_is_array = source.starts_with('[');
        let target_is_array = target.starts_with('[');
        if source_is_array {
            // Arrays implement only Object, Cloneable and Serializable.
            return target_is_array
                || matches!(
                    target,
                    "java/lang/Object" | "java/lang/Cloneable" | "java/io/Serializable"
                );
        }
        !target_is_array
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_same_class() {
        let hierarchy = PermissiveHierarchy;
        assert!(hierarchy.is_assignable("java/lang/Throwable", "java/lang/Throwable"));
        assert!(hierarchy.is_assignable("[I", "[I"));
    }

    #[test]
    fn test_unknown_classes_are_assumed_assignable() {
        let hierarchy = PermissiveHierarchy;
        assert!(hierarchy.is_assignable("java/lang/Throwable", "java/io/IOException"));
        assert!(hierarchy.is_assignable("java/lang/Object", "com/example/Anything"));
    }

    #[test]
    fn test_arrays_have_fixed_supertypes() {
        let hierarchy = PermissiveHierarchy;
        assert!(hierarchy.is_assignable("java/lang/Object", "[I"));
        assert!(hierarchy.is_assignable("java/lang/Cloneable", "[I"));
        assert!(hierarchy.is_assignable("java/io/Serializable", "[Ljava/lang/String;"));
        assert!(hierarchy.is_assignable("[Ljava/lang/Object;", "[Ljava/lang/String;"));
        assert!(!hierarchy.is_assignable("java/lang/Throwable", "[I"));
        assert!(!hierarchy.is_assignable("[I", "java/lang/Object"));
    }
}
