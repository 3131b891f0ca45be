//! Lowering graphs back to linear bytecode: layout, offset fixup, exception tables and stack
//! map frames.

mod assembler;
mod stack_maps;

pub use assembler::{AssembleOptions, CodeOutput, assemble};
