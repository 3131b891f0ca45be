//! Offset-aware codecs for the instruction stream of a `Code` attribute.
//!
//! Instructions are kept paired with the byte offset they were decoded at. The disassembler
//! keys block boundaries, exception ranges and stack map offsets by these values, and the
//! encoder relies on them being consistent with sequential layout when re-emitting.

use crate::attributes::Instruction;
use crate::error::Result;
use std::io::Cursor;

/// Decode a full code array into `(offset, instruction)` pairs.
///
/// # Errors
///
/// Returns an error if the code array contains an undefined opcode or is truncated.
pub fn instructions_from_bytes(code: &mut Cursor<Vec<u8>>) -> Result<Vec<(u32, Instruction)>> {
    let length = u64::try_from(code.get_ref().len())?;
    let mut instructions = Vec::new();
    while code.position() < length {
        let offset = u32::try_from(code.position())?;
        let instruction = Instruction::from_bytes(code)?;
        instructions.push((offset, instruction));
    }
    Ok(instructions)
}

/// Encode `(offset, instruction)` pairs back into a code array.
///
/// Instructions are written sequentially; branch displacements are derived from the write
/// position, so the recorded offsets must match sequential layout (which holds for any stream
/// produced by [`instructions_from_bytes`] or by the assembler).
///
/// # Errors
///
/// Returns an error if a branch target does not fit its encoded width.
pub fn instructions_to_bytes(instructions: &[(u32, Instruction)]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    for (_, instruction) in instructions {
        instruction.to_bytes(&mut cursor)?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip() -> Result<()> {
        // iload_0, iload_1, iadd, ireturn
        let bytes = vec![26, 27, 96, 172];
        let instructions = instructions_from_bytes(&mut Cursor::new(bytes.clone()))?;
        assert_eq!(
            vec![
                (0, Instruction::Iload_0),
                (1, Instruction::Iload_1),
                (2, Instruction::Iadd),
                (3, Instruction::Ireturn),
            ],
            instructions
        );
        assert_eq!(bytes, instructions_to_bytes(&instructions)?);
        Ok(())
    }

    #[test]
    fn test_offsets_account_for_operands() -> Result<()> {
        // bipush 5, sipush 300, goto 0
        let bytes = vec![16, 5, 17, 1, 44, 167, 0xFF, 0xFB];
        let instructions = instructions_from_bytes(&mut Cursor::new(bytes.clone()))?;
        assert_eq!(
            vec![
                (0, Instruction::Bipush(5)),
                (2, Instruction::Sipush(300)),
                (5, Instruction::Goto(0)),
            ],
            instructions
        );
        assert_eq!(bytes, instructions_to_bytes(&instructions)?);
        Ok(())
    }
}
