//! # doppio_classfile
//!
//! A library for reading, analyzing, rewriting and re-emitting Java class files.
//!
//! The analysis core disassembles method bytecode into a control flow graph of extended basic
//! blocks ([`graph::InsnGraph`]), derives per-block stack and locals constraints by abstract
//! interpretation ([`analysis::Trace`]), and lowers the graph back to a linear stream with
//! valid offsets, exception tables and stack map frames ([`assemble::assemble`]).
//!
//! ```rust
//! use doppio_classfile::analysis::{MethodContext, PermissiveHierarchy, Trace, TraceOptions};
//! use doppio_classfile::attributes::Instruction;
//! use doppio_classfile::graph::InsnGraph;
//! use doppio_classfile::{ConstantPool, Verifier};
//!
//! // int add(int a, int b) { return a + b; }
//! let code = vec![
//!     (0, Instruction::Iload_0),
//!     (1, Instruction::Iload_1),
//!     (2, Instruction::Iadd),
//!     (3, Instruction::Ireturn),
//! ];
//! let constant_pool = ConstantPool::new();
//! let mut verifier = Verifier::new();
//! let graph = InsnGraph::disassemble(&code, &[], &constant_pool, &mut verifier)?;
//! let method = MethodContext {
//!     class_name: "Calc",
//!     name: "add",
//!     descriptor: "(II)I",
//!     is_static: true,
//! };
//! let trace = Trace::run(
//!     &graph,
//!     &method,
//!     &constant_pool,
//!     &PermissiveHierarchy,
//!     TraceOptions::default(),
//!     &mut verifier,
//! )?;
//! assert_eq!(2, trace.max_stack);
//! assert_eq!(2, trace.max_locals);
//! # Ok::<(), doppio_classfile::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod analysis;
pub mod assemble;
pub mod attributes;
mod class_access_flags;
mod class_file;
mod constant;
mod constant_pool;
pub mod descriptor;
mod error;
mod field;
mod field_access_flags;
pub mod graph;
mod method;
mod method_access_flags;
pub(crate) mod mutf8;
mod reference_kind;
mod verify;
mod version;

pub use class_access_flags::ClassAccessFlags;
pub use class_file::ClassFile;
pub use constant::Constant;
pub use constant_pool::ConstantPool;
pub use error::{Error, Result};
pub use field::Field;
pub use field_access_flags::FieldAccessFlags;
pub use method::Method;
pub use method_access_flags::MethodAccessFlags;
pub use reference_kind::ReferenceKind;
pub use verify::{ErrorSource, Verifier, VerifyError, VerifyErrorKind};
pub use version::Version;
