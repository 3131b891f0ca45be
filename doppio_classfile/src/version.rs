//! Class file version numbers.
//!
//! A class file carries a `{minor, major}` version pair directly after the magic number. The
//! major number gates which constants, attributes and instructions are allowed; two thresholds
//! matter to the analysis core: major 50 (Java 6) introduces `StackMapTable`, and major 51
//! (Java 7) makes `jsr`/`ret` unverifiable.

use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

/// A class file format version.
///
/// Ordering compares the major number first, then the minor number.
///
/// # Examples
///
/// ```rust
/// use doppio_classfile::Version;
///
/// assert!(Version::JAVA_8 > Version::JAVA_6);
/// assert!(Version::JAVA_6.supports_stack_maps());
/// assert!(!Version::JAVA_6.forbids_jsr());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const JAVA_1_0_2: Version = Version::new(45, 0);
    pub const JAVA_1_1: Version = Version::new(45, 3);
    pub const JAVA_5: Version = Version::new(49, 0);
    pub const JAVA_6: Version = Version::new(50, 0);
    pub const JAVA_7: Version = Version::new(51, 0);
    pub const JAVA_8: Version = Version::new(52, 0);
    pub const JAVA_9: Version = Version::new(53, 0);
    pub const JAVA_11: Version = Version::new(55, 0);
    pub const JAVA_17: Version = Version::new(61, 0);
    pub const JAVA_21: Version = Version::new(65, 0);

    /// Create a version from major and minor numbers.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// `true` when this version requires `StackMapTable` frames (major 50 and later).
    #[must_use]
    pub const fn supports_stack_maps(&self) -> bool {
        self.major >= Version::JAVA_6.major
    }

    /// `true` when this version rejects `jsr`/`ret` during verification (major 51 and later).
    #[must_use]
    pub const fn forbids_jsr(&self) -> bool {
        self.major >= Version::JAVA_7.major
    }

    /// Deserialize the `Version` from bytes; the minor number is stored first.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<Version> {
        let minor = bytes.read_u16::<BigEndian>()?;
        let major = bytes.read_u16::<BigEndian>()?;
        Ok(Version { major, minor })
    }

    /// Serialize the `Version` to bytes.
    ///
    /// # Errors
    ///
    /// Should not occur; reserved for future use.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.minor)?;
        bytes.write_u16::<BigEndian>(self.major)?;
        Ok(())
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::JAVA_8
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
