//! Attribute structures of the class file format.
//!
//! The `Code` and `StackMapTable` attributes are parsed structurally because the analysis core
//! consumes them; every other attribute round-trips as an opaque blob.

mod array_type;
mod attribute;
pub(crate) mod code;
mod exception_table_entry;
mod instruction;
mod stack_frame;
mod verification_type;

pub use array_type::ArrayType;
pub use attribute::Attribute;
pub use code::{instructions_from_bytes, instructions_to_bytes};
pub use exception_table_entry::ExceptionTableEntry;
pub use instruction::{Instruction, LookupSwitch, TableSwitch};
pub use stack_frame::StackFrame;
pub use verification_type::VerificationType;
