//! Basic blocks.

use crate::attributes::Instruction;
use std::fmt;

/// A block label. Non-negative labels identify regular blocks in the arena; the two pseudo
/// blocks use the reserved negative labels below and are never stored.
pub type Label = i32;

/// The label of the pseudo block every return instruction leads to.
pub const RETURN_LABEL: Label = -1;

/// The label of the pseudo block every `athrow` leads to.
pub const RETHROW_LABEL: Label = -2;

/// An extended basic block: a maximal straight-line run of non-terminator instructions.
///
/// The terminator itself (branch, switch, return, `athrow`, `jsr`, `ret`) is not stored in the
/// block; it travels on the out-edge it creates, so rewriting control flow never requires
/// touching the instruction list.
#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    pub label: Label,
    pub instructions: Vec<Instruction>,
    /// When set, the assembler may replicate this block at each incoming call site instead of
    /// reaching it with a jump.
    pub inline: bool,
}

impl BasicBlock {
    /// Create an empty block with the given label.
    #[must_use]
    pub fn new(label: Label) -> Self {
        Self {
            label,
            instructions: Vec::new(),
            inline: false,
        }
    }

    /// Append an instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// `true` when the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "block {}{}:", self.label, if self.inline { " (inline)" } else { "" })?;
        for instruction in &self.instructions {
            writeln!(f, "  {instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push() {
        let mut block = BasicBlock::new(3);
        assert!(block.is_empty());
        block.push(Instruction::Iconst_0);
        assert_eq!(vec![Instruction::Iconst_0], block.instructions);
    }

    #[test]
    fn test_display() {
        let mut block = BasicBlock::new(0);
        block.push(Instruction::Nop);
        assert_eq!("block 0:\n  nop\n", block.to_string());
    }
}
