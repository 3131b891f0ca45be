//! The JVM instruction set.
//!
//! Instructions are modeled as one closed sum grouped by operand layout family: no operand,
//! 8-bit operand, 16-bit operand, narrow branch, wide branch, switch, and the `wide`-prefixed
//! forms. Branch and switch targets are stored as **absolute byte offsets** — the decoder
//! converts from the relative displacements in the wire format and the encoder converts back —
//! so the disassembler, the analysis core and the assembler all share one convention.
//!
//! # References
//!
//! - [JVM Specification §6.5](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-6.html#jvms-6.5)

use crate::attributes::ArrayType;
use crate::error::Error::{BranchOutOfRange, InvalidOpcode, InvalidWideOpcode};
use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use std::fmt;
use std::io::Cursor;

/// Payload of the `tableswitch` instruction, kept separate to limit the size of the
/// [`Instruction`] enum. `offsets[i]` is the absolute target for case `low + i`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableSwitch {
    pub default: u32,
    pub low: i32,
    pub high: i32,
    pub offsets: Vec<u32>,
}

/// Payload of the `lookupswitch` instruction; `pairs` maps case keys to absolute targets and
/// preserves the order of the wire format.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LookupSwitch {
    pub default: u32,
    pub pairs: IndexMap<i32, u32>,
}

/// A single JVM instruction.
#[expect(non_camel_case_types)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    // Constants
    Nop,
    Aconst_null,
    Iconst_m1,
    Iconst_0,
    Iconst_1,
    Iconst_2,
    Iconst_3,
    Iconst_4,
    Iconst_5,
    Lconst_0,
    Lconst_1,
    Fconst_0,
    Fconst_1,
    Fconst_2,
    Dconst_0,
    Dconst_1,
    Bipush(i8),
    Sipush(i16),
    Ldc(u8),
    Ldc_w(u16),
    Ldc2_w(u16),
    // Loads
    Iload(u8),
    Lload(u8),
    Fload(u8),
    Dload(u8),
    Aload(u8),
    Iload_0,
    Iload_1,
    Iload_2,
    Iload_3,
    Lload_0,
    Lload_1,
    Lload_2,
    Lload_3,
    Fload_0,
    Fload_1,
    Fload_2,
    Fload_3,
    Dload_0,
    Dload_1,
    Dload_2,
    Dload_3,
    Aload_0,
    Aload_1,
    Aload_2,
    Aload_3,
    Iaload,
    Laload,
    Faload,
    Daload,
    Aaload,
    Baload,
    Caload,
    Saload,
    // Stores
    Istore(u8),
    Lstore(u8),
    Fstore(u8),
    Dstore(u8),
    Astore(u8),
    Istore_0,
    Istore_1,
    Istore_2,
    Istore_3,
    Lstore_0,
    Lstore_1,
    Lstore_2,
    Lstore_3,
    Fstore_0,
    Fstore_1,
    Fstore_2,
    Fstore_3,
    Dstore_0,
    Dstore_1,
    Dstore_2,
    Dstore_3,
    Astore_0,
    Astore_1,
    Astore_2,
    Astore_3,
    Iastore,
    Lastore,
    Fastore,
    Dastore,
    Aastore,
    Bastore,
    Castore,
    Sastore,
    // Stack
    Pop,
    Pop2,
    Dup,
    Dup_x1,
    Dup_x2,
    Dup2,
    Dup2_x1,
    Dup2_x2,
    Swap,
    // Math
    Iadd,
    Ladd,
    Fadd,
    Dadd,
    Isub,
    Lsub,
    Fsub,
    Dsub,
    Imul,
    Lmul,
    Fmul,
    Dmul,
    Idiv,
    Ldiv,
    Fdiv,
    Ddiv,
    Irem,
    Lrem,
    Frem,
    Drem,
    Ineg,
    Lneg,
    Fneg,
    Dneg,
    Ishl,
    Lshl,
    Ishr,
    Lshr,
    Iushr,
    Lushr,
    Iand,
    Land,
    Ior,
    Lor,
    Ixor,
    Lxor,
    Iinc(u8, i8),
    // Conversions
    I2l,
    I2f,
    I2d,
    L2i,
    L2f,
    L2d,
    F2i,
    F2l,
    F2d,
    D2i,
    D2l,
    D2f,
    I2b,
    I2c,
    I2s,
    // Comparisons
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,
    Ifeq(u32),
    Ifne(u32),
    Iflt(u32),
    Ifge(u32),
    Ifgt(u32),
    Ifle(u32),
    If_icmpeq(u32),
    If_icmpne(u32),
    If_icmplt(u32),
    If_icmpge(u32),
    If_icmpgt(u32),
    If_icmple(u32),
    If_acmpeq(u32),
    If_acmpne(u32),
    // Control
    Goto(u32),
    Jsr(u32),
    Ret(u8),
    Tableswitch(TableSwitch),
    Lookupswitch(LookupSwitch),
    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,
    // References
    Getstatic(u16),
    Putstatic(u16),
    Getfield(u16),
    Putfield(u16),
    Invokevirtual(u16),
    Invokespecial(u16),
    Invokestatic(u16),
    Invokeinterface(u16, u8),
    Invokedynamic(u16),
    New(u16),
    Newarray(ArrayType),
    Anewarray(u16),
    Arraylength,
    Athrow,
    Checkcast(u16),
    Instanceof(u16),
    Monitorenter,
    Monitorexit,
    // Extended
    Multianewarray(u16, u8),
    Ifnull(u32),
    Ifnonnull(u32),
    Goto_w(u32),
    Jsr_w(u32),
    // Wide-prefixed forms
    Iload_w(u16),
    Lload_w(u16),
    Fload_w(u16),
    Dload_w(u16),
    Aload_w(u16),
    Istore_w(u16),
    Lstore_w(u16),
    Fstore_w(u16),
    Dstore_w(u16),
    Astore_w(u16),
    Iinc_w(u16, i16),
    Ret_w(u16),
    // Reserved
    Breakpoint,
    Impdep1,
    Impdep2,
}

impl Instruction {
    /// The opcode byte; `wide`-prefixed forms report the prefix (196).
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Instruction::Nop => 0,
            Instruction::Aconst_null => 1,
            Instruction::Iconst_m1 => 2,
            Instruction::Iconst_0 => 3,
            Instruction::Iconst_1 => 4,
            Instruction::Iconst_2 => 5,
            Instruction::Iconst_3 => 6,
            Instruction::Iconst_4 => 7,
            Instruction::Iconst_5 => 8,
            Instruction::Lconst_0 => 9,
            Instruction::Lconst_1 => 10,
            Instruction::Fconst_0 => 11,
            Instruction::Fconst_1 => 12,
            Instruction::Fconst_2 => 13,
            Instruction::Dconst_0 => 14,
            Instruction::Dconst_1 => 15,
            Instruction::Bipush(_) => 16,
            Instruction::Sipush(_) => 17,
            Instruction::Ldc(_) => 18,
            Instruction::Ldc_w(_) => 19,
            Instruction::Ldc2_w(_) => 20,
            Instruction::Iload(_) => 21,
            Instruction::Lload(_) => 22,
            Instruction::Fload(_) => 23,
            Instruction::Dload(_) => 24,
            Instruction::Aload(_) => 25,
            Instruction::Iload_0 => 26,
            Instruction::Iload_1 => 27,
            Instruction::Iload_2 => 28,
            Instruction::Iload_3 => 29,
            Instruction::Lload_0 => 30,
            Instruction::Lload_1 => 31,
            Instruction::Lload_2 => 32,
            Instruction::Lload_3 => 33,
            Instruction::Fload_0 => 34,
            Instruction::Fload_1 => 35,
            Instruction::Fload_2 => 36,
            Instruction::Fload_3 => 37,
            Instruction::Dload_0 => 38,
            Instruction::Dload_1 => 39,
            Instruction::Dload_2 => 40,
            Instruction::Dload_3 => 41,
            Instruction::Aload_0 => 42,
            Instruction::Aload_1 => 43,
            Instruction::Aload_2 => 44,
            Instruction::Aload_3 => 45,
            Instruction::Iaload => 46,
            Instruction::Laload => 47,
            Instruction::Faload => 48,
            Instruction::Daload => 49,
            Instruction::Aaload => 50,
            Instruction::Baload => 51,
            Instruction::Caload => 52,
            Instruction::Saload => 53,
            Instruction::Istore(_) => 54,
            Instruction::Lstore(_) => 55,
            Instruction::Fstore(_) => 56,
            Instruction::Dstore(_) => 57,
            Instruction::Astore(_) => 58,
            Instruction::Istore_0 => 59,
            Instruction::Istore_1 => 60,
            Instruction::Istore_2 => 61,
            Instruction::Istore_3 => 62,
            Instruction::Lstore_0 => 63,
            Instruction::Lstore_1 => 64,
            Instruction::Lstore_2 => 65,
            Instruction::Lstore_3 => 66,
            Instruction::Fstore_0 => 67,
            Instruction::Fstore_1 => 68,
            Instruction::Fstore_2 => 69,
            Instruction::Fstore_3 => 70,
            Instruction::Dstore_0 => 71,
            Instruction::Dstore_1 => 72,
            Instruction::Dstore_2 => 73,
            Instruction::Dstore_3 => 74,
            Instruction::Astore_0 => 75,
            Instruction::Astore_1 => 76,
            Instruction::Astore_2 => 77,
            Instruction::Astore_3 => 78,
            Instruction::Iastore => 79,
            Instruction::Lastore => 80,
            Instruction::Fastore => 81,
            Instruction::Dastore => 82,
            Instruction::Aastore => 83,
            Instruction::Bastore => 84,
            Instruction::Castore => 85,
            Instruction::Sastore => 86,
            Instruction::Pop => 87,
            Instruction::Pop2 => 88,
            Instruction::Dup => 89,
            Instruction::Dup_x1 => 90,
            Instruction::Dup_x2 => 91,
            Instruction::Dup2 => 92,
            Instruction::Dup2_x1 => 93,
            Instruction::Dup2_x2 => 94,
            Instruction::Swap => 95,
            Instruction::Iadd => 96,
            Instruction::Ladd => 97,
            Instruction::Fadd => 98,
            Instruction::Dadd => 99,
            Instruction::Isub => 100,
            Instruction::Lsub => 101,
            Instruction::Fsub => 102,
            Instruction::Dsub => 103,
            Instruction::Imul => 104,
            Instruction::Lmul => 105,
            Instruction::Fmul => 106,
            Instruction::Dmul => 107,
            Instruction::Idiv => 108,
            Instruction::Ldiv => 109,
            Instruction::Fdiv => 110,
            Instruction::Ddiv => 111,
            Instruction::Irem => 112,
            Instruction::Lrem => 113,
            Instruction::Frem => 114,
            Instruction::Drem => 115,
            Instruction::Ineg => 116,
            Instruction::Lneg => 117,
            Instruction::Fneg => 118,
            Instruction::Dneg => 119,
            Instruction::Ishl => 120,
            Instruction::Lshl => 121,
            Instruction::Ishr => 122,
            Instruction::Lshr => 123,
            Instruction::Iushr => 124,
            Instruction::Lushr => 125,
            Instruction::Iand => 126,
            Instruction::Land => 127,
            Instruction::Ior => 128,
            Instruction::Lor => 129,
            Instruction::Ixor => 130,
            Instruction::Lxor => 131,
            Instruction::Iinc(_, _) => 132,
            Instruction::I2l => 133,
            Instruction::I2f => 134,
            Instruction::I2d => 135,
            Instruction::L2i => 136,
            Instruction::L2f => 137,
            Instruction::L2d => 138,
            Instruction::F2i => 139,
            Instruction::F2l => 140,
            Instruction::F2d => 141,
            Instruction::D2i => 142,
            Instruction::D2l => 143,
            Instruction::D2f => 144,
            Instruction::I2b => 145,
            Instruction::I2c => 146,
            Instruction::I2s => 147,
            Instruction::Lcmp => 148,
            Instruction::Fcmpl => 149,
            Instruction::Fcmpg => 150,
            Instruction::Dcmpl => 151,
            Instruction::Dcmpg => 152,
            Instruction::Ifeq(_) => 153,
            Instruction::Ifne(_) => 154,
            Instruction::Iflt(_) => 155,
            Instruction::Ifge(_) => 156,
            Instruction::Ifgt(_) => 157,
            Instruction::Ifle(_) => 158,
            Instruction::If_icmpeq(_) => 159,
            Instruction::If_icmpne(_) => 160,
            Instruction::If_icmplt(_) => 161,
            Instruction::If_icmpge(_) => 162,
            Instruction::If_icmpgt(_) => 163,
            Instruction::If_icmple(_) => 164,
            Instruction::If_acmpeq(_) => 165,
            Instruction::If_acmpne(_) => 166,
            Instruction::Goto(_) => 167,
            Instruction::Jsr(_) => 168,
            Instruction::Ret(_) => 169,
            Instruction::Tableswitch(_) => 170,
            Instruction::Lookupswitch(_) => 171,
            Instruction::Ireturn => 172,
            Instruction::Lreturn => 173,
            Instruction::Freturn => 174,
            Instruction::Dreturn => 175,
            Instruction::Areturn => 176,
            Instruction::Return => 177,
            Instruction::Getstatic(_) => 178,
            Instruction::Putstatic(_) => 179,
            Instruction::Getfield(_) => 180,
            Instruction::Putfield(_) => 181,
            Instruction::Invokevirtual(_) => 182,
            Instruction::Invokespecial(_) => 183,
            Instruction::Invokestatic(_) => 184,
            Instruction::Invokeinterface(_, _) => 185,
            Instruction::Invokedynamic(_) => 186,
            Instruction::New(_) => 187,
            Instruction::Newarray(_) => 188,
            Instruction::Anewarray(_) => 189,
            Instruction::Arraylength => 190,
            Instruction::Athrow => 191,
            Instruction::Checkcast(_) => 192,
            Instruction::Instanceof(_) => 193,
            Instruction::Monitorenter => 194,
            Instruction::Monitorexit => 195,
            Instruction::Iload_w(_)
            | Instruction::Lload_w(_)
            | Instruction::Fload_w(_)
            | Instruction::Dload_w(_)
            | Instruction::Aload_w(_)
            | Instruction::Istore_w(_)
            | Instruction::Lstore_w(_)
            | Instruction::Fstore_w(_)
            | Instruction::Dstore_w(_)
            | Instruction::Astore_w(_)
            | Instruction::Iinc_w(_, _)
            | Instruction::Ret_w(_) => 196,
            Instruction::Multianewarray(_, _) => 197,
            Instruction::Ifnull(_) => 198,
            Instruction::Ifnonnull(_) => 199,
            Instruction::Goto_w(_) => 200,
            Instruction::Jsr_w(_) => 201,
            Instruction::Breakpoint => 202,
            Instruction::Impdep1 => 254,
            Instruction::Impdep2 => 255,
        }
    }

    /// The encoded size in bytes when the instruction starts at `offset`.
    ///
    /// Only the switch instructions depend on the offset, through their alignment padding.
    #[must_use]
    pub fn size(&self, offset: u32) -> u32 {
        match self {
            Instruction::Bipush(_)
            | Instruction::Ldc(_)
            | Instruction::Iload(_)
            | Instruction::Lload(_)
            | Instruction::Fload(_)
            | Instruction::Dload(_)
            | Instruction::Aload(_)
            | Instruction::Istore(_)
            | Instruction::Lstore(_)
            | Instruction::Fstore(_)
            | Instruction::Dstore(_)
            | Instruction::Astore(_)
            | Instruction::Ret(_)
            | Instruction::Newarray(_) => 2,
            Instruction::Sipush(_)
            | Instruction::Ldc_w(_)
            | Instruction::Ldc2_w(_)
            | Instruction::Iinc(_, _)
            | Instruction::Ifeq(_)
            | Instruction::Ifne(_)
            | Instruction::Iflt(_)
            | Instruction::Ifge(_)
            | Instruction::Ifgt(_)
            | Instruction::Ifle(_)
            | Instruction::If_icmpeq(_)
            | Instruction::If_icmpne(_)
            | Instruction::If_icmplt(_)
            | Instruction::If_icmpge(_)
            | Instruction::If_icmpgt(_)
            | Instruction::If_icmple(_)
            | Instruction::If_acmpeq(_)
            | Instruction::If_acmpne(_)
            | Instruction::Goto(_)
            | Instruction::Jsr(_)
            | Instruction::Getstatic(_)
            | Instruction::Putstatic(_)
            | Instruction::Getfield(_)
            | Instruction::Putfield(_)
            | Instruction::Invokevirtual(_)
            | Instruction::Invokespecial(_)
            | Instruction::Invokestatic(_)
            | Instruction::New(_)
            | Instruction::Anewarray(_)
            | Instruction::Checkcast(_)
            | Instruction::Instanceof(_)
            | Instruction::Ifnull(_)
            | Instruction::Ifnonnull(_) => 3,
            Instruction::Multianewarray(_, _)
            | Instruction::Iload_w(_)
            | Instruction::Lload_w(_)
            | Instruction::Fload_w(_)
            | Instruction::Dload_w(_)
            | Instruction::Aload_w(_)
            | Instruction::Istore_w(_)
            | Instruction::Lstore_w(_)
            | Instruction::Fstore_w(_)
            | Instruction::Dstore_w(_)
            | Instruction::Astore_w(_)
            | Instruction::Ret_w(_) => 4,
            Instruction::Invokeinterface(_, _)
            | Instruction::Invokedynamic(_)
            | Instruction::Goto_w(_)
            | Instruction::Jsr_w(_) => 5,
            Instruction::Iinc_w(_, _) => 6,
            Instruction::Tableswitch(table) => {
                let padding = (4 - ((offset + 1) % 4)) % 4;
                let count = u32::try_from(table.offsets.len()).unwrap_or(u32::MAX);
                1 + padding + 12 + 4 * count
            }
            Instruction::Lookupswitch(lookup) => {
                let padding = (4 - ((offset + 1) % 4)) % 4;
                let count = u32::try_from(lookup.pairs.len()).unwrap_or(u32::MAX);
                1 + padding + 8 + 8 * count
            }
            _ => 1,
        }
    }

    /// `true` when the instruction ends a basic block: branches, switches, returns, `athrow`,
    /// `jsr` and `ret`.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.is_branch()
            || self.is_switch()
            || self.is_return()
            || self.is_jsr()
            || self.is_ret()
            || matches!(self, Instruction::Athrow)
    }

    /// `true` for conditional and unconditional branches (not switches).
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.is_conditional_branch() || self.is_unconditional_branch()
    }

    /// `true` for `goto` and `goto_w`.
    #[must_use]
    pub fn is_unconditional_branch(&self) -> bool {
        matches!(self, Instruction::Goto(_) | Instruction::Goto_w(_))
    }

    /// `true` for the two-way conditional branches.
    #[must_use]
    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Ifeq(_)
                | Instruction::Ifne(_)
                | Instruction::Iflt(_)
                | Instruction::Ifge(_)
                | Instruction::Ifgt(_)
                | Instruction::Ifle(_)
                | Instruction::If_icmpeq(_)
                | Instruction::If_icmpne(_)
                | Instruction::If_icmplt(_)
                | Instruction::If_icmpge(_)
                | Instruction::If_icmpgt(_)
                | Instruction::If_icmple(_)
                | Instruction::If_acmpeq(_)
                | Instruction::If_acmpne(_)
                | Instruction::Ifnull(_)
                | Instruction::Ifnonnull(_)
        )
    }

    /// `true` for `tableswitch` and `lookupswitch`.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Instruction::Tableswitch(_) | Instruction::Lookupswitch(_)
        )
    }

    /// `true` for the return family, including `return`.
    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Instruction::Ireturn
                | Instruction::Lreturn
                | Instruction::Freturn
                | Instruction::Dreturn
                | Instruction::Areturn
                | Instruction::Return
        )
    }

    /// `true` for `jsr` and `jsr_w`.
    #[must_use]
    pub fn is_jsr(&self) -> bool {
        matches!(self, Instruction::Jsr(_) | Instruction::Jsr_w(_))
    }

    /// `true` for `ret` and its wide form.
    #[must_use]
    pub fn is_ret(&self) -> bool {
        matches!(self, Instruction::Ret(_) | Instruction::Ret_w(_))
    }

    /// The absolute branch target of a branch or `jsr` instruction.
    #[must_use]
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Instruction::Ifeq(target)
            | Instruction::Ifne(target)
            | Instruction::Iflt(target)
            | Instruction::Ifge(target)
            | Instruction::Ifgt(target)
            | Instruction::Ifle(target)
            | Instruction::If_icmpeq(target)
            | Instruction::If_icmpne(target)
            | Instruction::If_icmplt(target)
            | Instruction::If_icmpge(target)
            | Instruction::If_icmpgt(target)
            | Instruction::If_icmple(target)
            | Instruction::If_acmpeq(target)
            | Instruction::If_acmpne(target)
            | Instruction::Goto(target)
            | Instruction::Jsr(target)
            | Instruction::Ifnull(target)
            | Instruction::Ifnonnull(target)
            | Instruction::Goto_w(target)
            | Instruction::Jsr_w(target) => Some(*target),
            _ => None,
        }
    }

    /// Rewrite the absolute branch target of a branch or `jsr` instruction.
    pub fn set_jump_target(&mut self, new_target: u32) {
        match self {
            Instruction::Ifeq(target)
            | Instruction::Ifne(target)
            | Instruction::Iflt(target)
            | Instruction::Ifge(target)
            | Instruction::Ifgt(target)
            | Instruction::Ifle(target)
            | Instruction::If_icmpeq(target)
            | Instruction::If_icmpne(target)
            | Instruction::If_icmplt(target)
            | Instruction::If_icmpge(target)
            | Instruction::If_icmpgt(target)
            | Instruction::If_icmple(target)
            | Instruction::If_acmpeq(target)
            | Instruction::If_acmpne(target)
            | Instruction::Goto(target)
            | Instruction::Jsr(target)
            | Instruction::Ifnull(target)
            | Instruction::Ifnonnull(target)
            | Instruction::Goto_w(target)
            | Instruction::Jsr_w(target) => *target = new_target,
            _ => {}
        }
    }

    /// The condition-inverted form of a conditional branch, keeping the target.
    ///
    /// Used when a narrow conditional branch must reach a target outside the signed 16-bit
    /// displacement range: the inverted condition skips over a `goto_w` to the real target.
    #[must_use]
    pub fn invert_condition(&self) -> Option<Instruction> {
        let inverted = match self {
            Instruction::Ifeq(target) => Instruction::Ifne(*target),
            Instruction::Ifne(target) => Instruction::Ifeq(*target),
            Instruction::Iflt(target) => Instruction::Ifge(*target),
            Instruction::Ifge(target) => Instruction::Iflt(*target),
            Instruction::Ifgt(target) => Instruction::Ifle(*target),
            Instruction::Ifle(target) => Instruction::Ifgt(*target),
            Instruction::If_icmpeq(target) => Instruction::If_icmpne(*target),
            Instruction::If_icmpne(target) => Instruction::If_icmpeq(*target),
            Instruction::If_icmplt(target) => Instruction::If_icmpge(*target),
            Instruction::If_icmpge(target) => Instruction::If_icmplt(*target),
            Instruction::If_icmpgt(target) => Instruction::If_icmple(*target),
            Instruction::If_icmple(target) => Instruction::If_icmpgt(*target),
            Instruction::If_acmpeq(target) => Instruction::If_acmpne(*target),
            Instruction::If_acmpne(target) => Instruction::If_acmpeq(*target),
            Instruction::Ifnull(target) => Instruction::Ifnonnull(*target),
            Instruction::Ifnonnull(target) => Instruction::Ifnull(*target),
            _ => return None,
        };
        Some(inverted)
    }

    /// Deserialize one instruction from the code array; the cursor position at entry is the
    /// instruction's byte offset, which relative branch displacements are resolved against.
    ///
    /// # Errors
    ///
    /// Returns an error for undefined opcodes or a branch that resolves to a negative offset.
    #[expect(clippy::too_many_lines)]
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<Instruction> {
        let start = i64::try_from(bytes.position())?;
        let code = bytes.read_u8()?;

        let instruction = match code {
            0 => Instruction::Nop,
            1 => Instruction::Aconst_null,
            2 => Instruction::Iconst_m1,
            3 => Instruction::Iconst_0,
            4 => Instruction::Iconst_1,
            5 => Instruction::Iconst_2,
            6 => Instruction::Iconst_3,
            7 => Instruction::Iconst_4,
            8 => Instruction::Iconst_5,
            9 => Instruction::Lconst_0,
            10 => Instruction::Lconst_1,
            11 => Instruction::Fconst_0,
            12 => Instruction::Fconst_1,
            13 => Instruction::Fconst_2,
            14 => Instruction::Dconst_0,
            15 => Instruction::Dconst_1,
            16 => Instruction::Bipush(bytes.read_i8()?),
            17 => Instruction::Sipush(bytes.read_i16::<BigEndian>()?),
            18 => Instruction::Ldc(bytes.read_u8()?),
            19 => Instruction::Ldc_w(bytes.read_u16::<BigEndian>()?),
            20 => Instruction::Ldc2_w(bytes.read_u16::<BigEndian>()?),
            21 => Instruction::Iload(bytes.read_u8()?),
            22 => Instruction::Lload(bytes.read_u8()?),
            23 => Instruction::Fload(bytes.read_u8()?),
            24 => Instruction::Dload(bytes.read_u8()?),
            25 => Instruction::Aload(bytes.read_u8()?),
            26 => Instruction::Iload_0,
            27 => Instruction::Iload_1,
            28 => Instruction::Iload_2,
            29 => Instruction::Iload_3,
            30 => Instruction::Lload_0,
            31 => Instruction::Lload_1,
            32 => Instruction::Lload_2,
            33 => Instruction::Lload_3,
            34 => Instruction::Fload_0,
            35 => Instruction::Fload_1,
            36 => Instruction::Fload_2,
            37 => Instruction::Fload_3,
            38 => Instruction::Dload_0,
            39 => Instruction::Dload_1,
            40 => Instruction::Dload_2,
            41 => Instruction::Dload_3,
            42 => Instruction::Aload_0,
            43 => Instruction::Aload_1,
            44 => Instruction::Aload_2,
            45 => Instruction::Aload_3,
            46 => Instruction::Iaload,
            47 => Instruction::Laload,
            48 => Instruction::Faload,
            49 => Instruction::Daload,
            50 => Instruction::Aaload,
            51 => Instruction::Baload,
            52 => Instruction::Caload,
            53 => Instruction::Saload,
            54 => Instruction::Istore(bytes.read_u8()?),
            55 => Instruction::Lstore(bytes.read_u8()?),
            56 => Instruction::Fstore(bytes.read_u8()?),
            57 => Instruction::Dstore(bytes.read_u8()?),
            58 => Instruction::Astore(bytes.read_u8()?),
            59 => Instruction::Istore_0,
            60 => Instruction::Istore_1,
            61 => Instruction::Istore_2,
            62 => Instruction::Istore_3,
            63 => Instruction::Lstore_0,
            64 => Instruction::Lstore_1,
            65 => Instruction::Lstore_2,
            66 => Instruction::Lstore_3,
            67 => Instruction::Fstore_0,
            68 => Instruction::Fstore_1,
            69 => Instruction::Fstore_2,
            70 => Instruction::Fstore_3,
            71 => Instruction::Dstore_0,
            72 => Instruction::Dstore_1,
            73 => Instruction::Dstore_2,
            74 => Instruction::Dstore_3,
            75 => Instruction::Astore_0,
            76 => Instruction::Astore_1,
            77 => Instruction::Astore_2,
            78 => Instruction::Astore_3,
            79 => Instruction::Iastore,
            80 => Instruction::Lastore,
            81 => Instruction::Fastore,
            82 => Instruction::Dastore,
            83 => Instruction::Aastore,
            84 => Instruction::Bastore,
            85 => Instruction::Castore,
            86 => Instruction::Sastore,
            87 => Instruction::Pop,
            88 => Instruction::Pop2,
            89 => Instruction::Dup,
            90 => Instruction::Dup_x1,
            91 => Instruction::Dup_x2,
            92 => Instruction::Dup2,
            93 => Instruction::Dup2_x1,
            94 => Instruction::Dup2_x2,
            95 => Instruction::Swap,
            96 => Instruction::Iadd,
            97 => Instruction::Ladd,
            98 => Instruction::Fadd,
            99 => Instruction::Dadd,
            100 => Instruction::Isub,
            101 => Instruction::Lsub,
            102 => Instruction::Fsub,
            103 => Instruction::Dsub,
            104 => Instruction::Imul,
            105 => Instruction::Lmul,
            106 => Instruction::Fmul,
            107 => Instruction::Dmul,
            108 => Instruction::Idiv,
            109 => Instruction::Ldiv,
            110 => Instruction::Fdiv,
            111 => Instruction::Ddiv,
            112 => Instruction::Irem,
            113 => Instruction::Lrem,
            114 => Instruction::Frem,
            115 => Instruction::Drem,
            116 => Instruction::Ineg,
            117 => Instruction::Lneg,
            118 => Instruction::Fneg,
            119 => Instruction::Dneg,
            120 => Instruction::Ishl,
            121 => Instruction::Lshl,
            122 => Instruction::Ishr,
            123 => Instruction::Lshr,
            124 => Instruction::Iushr,
            125 => Instruction::Lushr,
            126 => Instruction::Iand,
            127 => Instruction::Land,
            128 => Instruction::Ior,
            129 => Instruction::Lor,
            130 => Instruction::Ixor,
            131 => Instruction::Lxor,
            132 => Instruction::Iinc(bytes.read_u8()?, bytes.read_i8()?),
            133 => Instruction::I2l,
            134 => Instruction::I2f,
            135 => Instruction::I2d,
            136 => Instruction::L2i,
            137 => Instruction::L2f,
            138 => Instruction::L2d,
            139 => Instruction::F2i,
            140 => Instruction::F2l,
            141 => Instruction::F2d,
            142 => Instruction::D2i,
            143 => Instruction::D2l,
            144 => Instruction::D2f,
            145 => Instruction::I2b,
            146 => Instruction::I2c,
            147 => Instruction::I2s,
            148 => Instruction::Lcmp,
            149 => Instruction::Fcmpl,
            150 => Instruction::Fcmpg,
            151 => Instruction::Dcmpl,
            152 => Instruction::Dcmpg,
            153 => Instruction::Ifeq(read_branch(bytes, start)?),
            154 => Instruction::Ifne(read_branch(bytes, start)?),
            155 => Instruction::Iflt(read_branch(bytes, start)?),
            156 => Instruction::Ifge(read_branch(bytes, start)?),
            157 => Instruction::Ifgt(read_branch(bytes, start)?),
            158 => Instruction::Ifle(read_branch(bytes, start)?),
            159 => Instruction::If_icmpeq(read_branch(bytes, start)?),
            160 => Instruction::If_icmpne(read_branch(bytes, start)?),
            161 => Instruction::If_icmplt(read_branch(bytes, start)?),
            162 => Instruction::If_icmpge(read_branch(bytes, start)?),
            163 => Instruction::If_icmpgt(read_branch(bytes, start)?),
            164 => Instruction::If_icmple(read_branch(bytes, start)?),
            165 => Instruction::If_acmpeq(read_branch(bytes, start)?),
            166 => Instruction::If_acmpne(read_branch(bytes, start)?),
            167 => Instruction::Goto(read_branch(bytes, start)?),
            168 => Instruction::Jsr(read_branch(bytes, start)?),
            169 => Instruction::Ret(bytes.read_u8()?),
            170 => {
                skip_switch_padding(bytes)?;
                let default = read_switch_target(bytes, start)?;
                let low = bytes.read_i32::<BigEndian>()?;
                let high = bytes.read_i32::<BigEndian>()?;
                let count = i64::from(high) - i64::from(low) + 1;
                let mut offsets = Vec::new();
                for _ in 0..count.max(0) {
                    offsets.push(read_switch_target(bytes, start)?);
                }
                Instruction::Tableswitch(TableSwitch {
                    default,
                    low,
                    high,
                    offsets,
                })
            }
            171 => {
                skip_switch_padding(bytes)?;
                let default = read_switch_target(bytes, start)?;
                let npairs = bytes.read_i32::<BigEndian>()?;
                let mut pairs = IndexMap::new();
                for _ in 0..npairs.max(0) {
                    let key = bytes.read_i32::<BigEndian>()?;
                    let target = read_switch_target(bytes, start)?;
                    pairs.insert(key, target);
                }
                Instruction::Lookupswitch(LookupSwitch { default, pairs })
            }
            172 => Instruction::Ireturn,
            173 => Instruction::Lreturn,
            174 => Instruction::Freturn,
            175 => Instruction::Dreturn,
            176 => Instruction::Areturn,
            177 => Instruction::Return,
            178 => Instruction::Getstatic(bytes.read_u16::<BigEndian>()?),
            179 => Instruction::Putstatic(bytes.read_u16::<BigEndian>()?),
            180 => Instruction::Getfield(bytes.read_u16::<BigEndian>()?),
            181 => Instruction::Putfield(bytes.read_u16::<BigEndian>()?),
            182 => Instruction::Invokevirtual(bytes.read_u16::<BigEndian>()?),
            183 => Instruction::Invokespecial(bytes.read_u16::<BigEndian>()?),
            184 => Instruction::Invokestatic(bytes.read_u16::<BigEndian>()?),
            185 => {
                let constant_index = bytes.read_u16::<BigEndian>()?;
                let count = bytes.read_u8()?;
                let _reserved = bytes.read_u8()?;
                Instruction::Invokeinterface(constant_index, count)
            }
            186 => {
                let constant_index = bytes.read_u16::<BigEndian>()?;
                let _reserved = bytes.read_u16::<BigEndian>()?;
                Instruction::Invokedynamic(constant_index)
            }
            187 => Instruction::New(bytes.read_u16::<BigEndian>()?),
            188 => Instruction::Newarray(ArrayType::from_bytes(bytes)?),
            189 => Instruction::Anewarray(bytes.read_u16::<BigEndian>()?),
            190 => Instruction::Arraylength,
            191 => Instruction::Athrow,
            192 => Instruction::Checkcast(bytes.read_u16::<BigEndian>()?),
            193 => Instruction::Instanceof(bytes.read_u16::<BigEndian>()?),
            194 => Instruction::Monitorenter,
            195 => Instruction::Monitorexit,
            196 => {
                let wide_code = bytes.read_u8()?;
                match wide_code {
                    21 => Instruction::Iload_w(bytes.read_u16::<BigEndian>()?),
                    22 => Instruction::Lload_w(bytes.read_u16::<BigEndian>()?),
                    23 => Instruction::Fload_w(bytes.read_u16::<BigEndian>()?),
                    24 => Instruction::Dload_w(bytes.read_u16::<BigEndian>()?),
                    25 => Instruction::Aload_w(bytes.read_u16::<BigEndian>()?),
                    54 => Instruction::Istore_w(bytes.read_u16::<BigEndian>()?),
                    55 => Instruction::Lstore_w(bytes.read_u16::<BigEndian>()?),
                    56 => Instruction::Fstore_w(bytes.read_u16::<BigEndian>()?),
                    57 => Instruction::Dstore_w(bytes.read_u16::<BigEndian>()?),
                    58 => Instruction::Astore_w(bytes.read_u16::<BigEndian>()?),
                    132 => Instruction::Iinc_w(
                        bytes.read_u16::<BigEndian>()?,
                        bytes.read_i16::<BigEndian>()?,
                    ),
                    169 => Instruction::Ret_w(bytes.read_u16::<BigEndian>()?),
                    _ => return Err(InvalidWideOpcode(wide_code)),
                }
            }
            197 => Instruction::Multianewarray(bytes.read_u16::<BigEndian>()?, bytes.read_u8()?),
            198 => Instruction::Ifnull(read_branch(bytes, start)?),
            199 => Instruction::Ifnonnull(read_branch(bytes, start)?),
            200 => Instruction::Goto_w(read_wide_branch(bytes, start)?),
            201 => Instruction::Jsr_w(read_wide_branch(bytes, start)?),
            202 => Instruction::Breakpoint,
            254 => Instruction::Impdep1,
            255 => Instruction::Impdep2,
            _ => return Err(InvalidOpcode(code)),
        };
        Ok(instruction)
    }

    /// Serialize the instruction into the code array; the cursor position at entry is the
    /// instruction's byte offset, which absolute branch targets are re-encoded against.
    ///
    /// # Errors
    ///
    /// Returns an error if an absolute target does not fit the encoded displacement width.
    #[expect(clippy::too_many_lines)]
    pub fn to_bytes(&self, bytes: &mut Cursor<Vec<u8>>) -> Result<()> {
        let start = i64::try_from(bytes.position())?;
        bytes.write_u8(self.code())?;

        match self {
            Instruction::Bipush(value) => bytes.write_i8(*value)?,
            Instruction::Sipush(value) => bytes.write_i16::<BigEndian>(*value)?,
            Instruction::Ldc(index) => bytes.write_u8(*index)?,
            Instruction::Ldc_w(index) | Instruction::Ldc2_w(index) => {
                bytes.write_u16::<BigEndian>(*index)?;
            }
            Instruction::Iload(index)
            | Instruction::Lload(index)
            | Instruction::Fload(index)
            | Instruction::Dload(index)
            | Instruction::Aload(index)
            | Instruction::Istore(index)
            | Instruction::Lstore(index)
            | Instruction::Fstore(index)
            | Instruction::Dstore(index)
            | Instruction::Astore(index)
            | Instruction::Ret(index) => bytes.write_u8(*index)?,
            Instruction::Iinc(index, value) => {
                bytes.write_u8(*index)?;
                bytes.write_i8(*value)?;
            }
            Instruction::Ifeq(target)
            | Instruction::Ifne(target)
            | Instruction::Iflt(target)
            | Instruction::Ifge(target)
            | Instruction::Ifgt(target)
            | Instruction::Ifle(target)
            | Instruction::If_icmpeq(target)
            | Instruction::If_icmpne(target)
            | Instruction::If_icmplt(target)
            | Instruction::If_icmpge(target)
            | Instruction::If_icmpgt(target)
            | Instruction::If_icmple(target)
            | Instruction::If_acmpeq(target)
            | Instruction::If_acmpne(target)
            | Instruction::Goto(target)
            | Instruction::Jsr(target)
            | Instruction::Ifnull(target)
            | Instruction::Ifnonnull(target) => {
                let displacement = i64::from(*target) - start;
                let narrow = i16::try_from(displacement)
                    .map_err(|_| BranchOutOfRange(displacement))?;
                bytes.write_i16::<BigEndian>(narrow)?;
            }
            Instruction::Goto_w(target) | Instruction::Jsr_w(target) => {
                let displacement = i64::from(*target) - start;
                let wide = i32::try_from(displacement)
                    .map_err(|_| BranchOutOfRange(displacement))?;
                bytes.write_i32::<BigEndian>(wide)?;
            }
            Instruction::Tableswitch(table) => {
                write_switch_padding(bytes)?;
                write_switch_target(bytes, start, table.default)?;
                bytes.write_i32::<BigEndian>(table.low)?;
                bytes.write_i32::<BigEndian>(table.high)?;
                for target in &table.offsets {
                    write_switch_target(bytes, start, *target)?;
                }
            }
            Instruction::Lookupswitch(lookup) => {
                write_switch_padding(bytes)?;
                write_switch_target(bytes, start, lookup.default)?;
                bytes.write_i32::<BigEndian>(i32::try_from(lookup.pairs.len())?)?;
                for (key, target) in &lookup.pairs {
                    bytes.write_i32::<BigEndian>(*key)?;
                    write_switch_target(bytes, start, *target)?;
                }
            }
            Instruction::Getstatic(index)
            | Instruction::Putstatic(index)
            | Instruction::Getfield(index)
            | Instruction::Putfield(index)
            | Instruction::Invokevirtual(index)
            | Instruction::Invokespecial(index)
            | Instruction::Invokestatic(index)
            | Instruction::New(index)
            | Instruction::Anewarray(index)
            | Instruction::Checkcast(index)
            | Instruction::Instanceof(index) => bytes.write_u16::<BigEndian>(*index)?,
            Instruction::Invokeinterface(index, count) => {
                bytes.write_u16::<BigEndian>(*index)?;
                bytes.write_u8(*count)?;
                bytes.write_u8(0)?;
            }
            Instruction::Invokedynamic(index) => {
                bytes.write_u16::<BigEndian>(*index)?;
                bytes.write_u16::<BigEndian>(0)?;
            }
            Instruction::Newarray(array_type) => array_type.to_bytes(bytes)?,
            Instruction::Multianewarray(index, dimensions) => {
                bytes.write_u16::<BigEndian>(*index)?;
                bytes.write_u8(*dimensions)?;
            }
            Instruction::Iload_w(index) => write_wide_u16(bytes, 21, *index)?,
            Instruction::Lload_w(index) => write_wide_u16(bytes, 22, *index)?,
            Instruction::Fload_w(index) => write_wide_u16(bytes, 23, *index)?,
            Instruction::Dload_w(index) => write_wide_u16(bytes, 24, *index)?,
            Instruction::Aload_w(index) => write_wide_u16(bytes, 25, *index)?,
            Instruction::Istore_w(index) => write_wide_u16(bytes, 54, *index)?,
            Instruction::Lstore_w(index) => write_wide_u16(bytes, 55, *index)?,
            Instruction::Fstore_w(index) => write_wide_u16(bytes, 56, *index)?,
            Instruction::Dstore_w(index) => write_wide_u16(bytes, 57, *index)?,
            Instruction::Astore_w(index) => write_wide_u16(bytes, 58, *index)?,
            Instruction::Ret_w(index) => write_wide_u16(bytes, 169, *index)?,
            Instruction::Iinc_w(index, value) => {
                bytes.write_u8(132)?;
                bytes.write_u16::<BigEndian>(*index)?;
                bytes.write_i16::<BigEndian>(*value)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// The lowercase mnemonic of the instruction.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::Aconst_null => "aconst_null",
            Instruction::Iconst_m1 => "iconst_m1",
            Instruction::Iconst_0 => "iconst_0",
            Instruction::Iconst_1 => "iconst_1",
            Instruction::Iconst_2 => "iconst_2",
            Instruction::Iconst_3 => "iconst_3",
            Instruction::Iconst_4 => "iconst_4",
            Instruction::Iconst_5 => "iconst_5",
            Instruction::Lconst_0 => "lconst_0",
            Instruction::Lconst_1 => "lconst_1",
            Instruction::Fconst_0 => "fconst_0",
            Instruction::Fconst_1 => "fconst_1",
            Instruction::Fconst_2 => "fconst_2",
            Instruction::Dconst_0 => "dconst_0",
            Instruction::Dconst_1 => "dconst_1",
            Instruction::Bipush(_) => "bipush",
            Instruction::Sipush(_) => "sipush",
            Instruction::Ldc(_) => "ldc",
            Instruction::Ldc_w(_) => "ldc_w",
            Instruction::Ldc2_w(_) => "ldc2_w",
            Instruction::Iload(_) => "iload",
            Instruction::Lload(_) => "lload",
            Instruction::Fload(_) => "fload",
            Instruction::Dload(_) => "dload",
            Instruction::Aload(_) => "aload",
            Instruction::Iload_0 => "iload_0",
            Instruction::Iload_1 => "iload_1",
            Instruction::Iload_2 => "iload_2",
            Instruction::Iload_3 => "iload_3",
            Instruction::Lload_0 => "lload_0",
            Instruction::Lload_1 => "lload_1",
            Instruction::Lload_2 => "lload_2",
            Instruction::Lload_3 => "lload_3",
            Instruction::Fload_0 => "fload_0",
            Instruction::Fload_1 => "fload_1",
            Instruction::Fload_2 => "fload_2",
            Instruction::Fload_3 => "fload_3",
            Instruction::Dload_0 => "dload_0",
            Instruction::Dload_1 => "dload_1",
            Instruction::Dload_2 => "dload_2",
            Instruction::Dload_3 => "dload_3",
            Instruction::Aload_0 => "aload_0",
            Instruction::Aload_1 => "aload_1",
            Instruction::Aload_2 => "aload_2",
            Instruction::Aload_3 => "aload_3",
            Instruction::Iaload => "iaload",
            Instruction::Laload => "laload",
            Instruction::Faload => "faload",
            Instruction::Daload => "daload",
            Instruction::Aaload => "aaload",
            Instruction::Baload => "baload",
            Instruction::Caload => "caload",
            Instruction::Saload => "saload",
            Instruction::Istore(_) => "istore",
            Instruction::Lstore(_) => "lstore",
            Instruction::Fstore(_) => "fstore",
            Instruction::Dstore(_) => "dstore",
            Instruction::Astore(_) => "astore",
            Instruction::Istore_0 => "istore_0",
            Instruction::Istore_1 => "istore_1",
            Instruction::Istore_2 => "istore_2",
            Instruction::Istore_3 => "istore_3",
            Instruction::Lstore_0 => "lstore_0",
            Instruction::Lstore_1 => "lstore_1",
            Instruction::Lstore_2 => "lstore_2",
            Instruction::Lstore_3 => "lstore_3",
            Instruction::Fstore_0 => "fstore_0",
            Instruction::Fstore_1 => "fstore_1",
            Instruction::Fstore_2 => "fstore_2",
            Instruction::Fstore_3 => "fstore_3",
            Instruction::Dstore_0 => "dstore_0",
            Instruction::Dstore_1 => "dstore_1",
            Instruction::Dstore_2 => "dstore_2",
            Instruction::Dstore_3 => "dstore_3",
            Instruction::Astore_0 => "astore_0",
            Instruction::Astore_1 => "astore_1",
            Instruction::Astore_2 => "astore_2",
            Instruction::Astore_3 => "astore_3",
            Instruction::Iastore => "iastore",
            Instruction::Lastore => "lastore",
            Instruction::Fastore => "fastore",
            Instruction::Dastore => "dastore",
            Instruction::Aastore => "aastore",
            Instruction::Bastore => "bastore",
            Instruction::Castore => "castore",
            Instruction::Sastore => "sastore",
            Instruction::Pop => "pop",
            Instruction::Pop2 => "pop2",
            Instruction::Dup => "dup",
            Instruction::Dup_x1 => "dup_x1",
            Instruction::Dup_x2 => "dup_x2",
            Instruction::Dup2 => "dup2",
            Instruction::Dup2_x1 => "dup2_x1",
            Instruction::Dup2_x2 => "dup2_x2",
            Instruction::Swap => "swap",
            Instruction::Iadd => "iadd",
            Instruction::Ladd => "ladd",
            Instruction::Fadd => "fadd",
            Instruction::Dadd => "dadd",
            Instruction::Isub => "isub",
            Instruction::Lsub => "lsub",
            Instruction::Fsub => "fsub",
            Instruction::Dsub => "dsub",
            Instruction::Imul => "imul",
            Instruction::Lmul => "lmul",
            Instruction::Fmul => "fmul",
            Instruction::Dmul => "dmul",
            Instruction::Idiv => "idiv",
            Instruction::Ldiv => "ldiv",
            Instruction::Fdiv => "fdiv",
            Instruction::Ddiv => "ddiv",
            Instruction::Irem => "irem",
            Instruction::Lrem => "lrem",
            Instruction::Frem => "frem",
            Instruction::Drem => "drem",
            Instruction::Ineg => "ineg",
            Instruction::Lneg => "lneg",
            Instruction::Fneg => "fneg",
            Instruction::Dneg => "dneg",
            Instruction::Ishl => "ishl",
            Instruction::Lshl => "lshl",
            Instruction::Ishr => "ishr",
            Instruction::Lshr => "lshr",
            Instruction::Iushr => "iushr",
            Instruction::Lushr => "lushr",
            Instruction::Iand => "iand",
            Instruction::Land => "land",
            Instruction::Ior => "ior",
            Instruction::Lor => "lor",
            Instruction::Ixor => "ixor",
            Instruction::Lxor => "lxor",
            Instruction::Iinc(_, _) => "iinc",
            Instruction::I2l => "i2l",
            Instruction::I2f => "i2f",
            Instruction::I2d => "i2d",
            Instruction::L2i => "l2i",
            Instruction::L2f => "l2f",
            Instruction::L2d => "l2d",
            Instruction::F2i => "f2i",
            Instruction::F2l => "f2l",
            Instruction::F2d => "f2d",
            Instruction::D2i => "d2i",
            Instruction::D2l => "d2l",
            Instruction::D2f => "d2f",
            Instruction::I2b => "i2b",
            Instruction::I2c => "i2c",
            Instruction::I2s => "i2s",
            Instruction::Lcmp => "lcmp",
            Instruction::Fcmpl => "fcmpl",
            Instruction::Fcmpg => "fcmpg",
            Instruction::Dcmpl => "dcmpl",
            Instruction::Dcmpg => "dcmpg",
            Instruction::Ifeq(_) => "ifeq",
            Instruction::Ifne(_) => "ifne",
            Instruction::Iflt(_) => "iflt",
            Instruction::Ifge(_) => "ifge",
            Instruction::Ifgt(_) => "ifgt",
            Instruction::Ifle(_) => "ifle",
            Instruction::If_icmpeq(_) => "if_icmpeq",
            Instruction::If_icmpne(_) => "if_icmpne",
            Instruction::If_icmplt(_) => "if_icmplt",
            Instruction::If_icmpge(_) => "if_icmpge",
            Instruction::If_icmpgt(_) => "if_icmpgt",
            Instruction::If_icmple(_) => "if_icmple",
            Instruction::If_acmpeq(_) => "if_acmpeq",
            Instruction::If_acmpne(_) => "if_acmpne",
            Instruction::Goto(_) => "goto",
            Instruction::Jsr(_) => "jsr",
            Instruction::Ret(_) => "ret",
            Instruction::Tableswitch(_) => "tableswitch",
            Instruction::Lookupswitch(_) => "lookupswitch",
            Instruction::Ireturn => "ireturn",
            Instruction::Lreturn => "lreturn",
            Instruction::Freturn => "freturn",
            Instruction::Dreturn => "dreturn",
            Instruction::Areturn => "areturn",
            Instruction::Return => "return",
            Instruction::Getstatic(_) => "getstatic",
            Instruction::Putstatic(_) => "putstatic",
            Instruction::Getfield(_) => "getfield",
            Instruction::Putfield(_) => "putfield",
            Instruction::Invokevirtual(_) => "invokevirtual",
            Instruction::Invokespecial(_) => "invokespecial",
            Instruction::Invokestatic(_) => "invokestatic",
            Instruction::Invokeinterface(_, _) => "invokeinterface",
            Instruction::Invokedynamic(_) => "invokedynamic",
            Instruction::New(_) => "new",
            Instruction::Newarray(_) => "newarray",
            Instruction::Anewarray(_) => "anewarray",
            Instruction::Arraylength => "arraylength",
            Instruction::Athrow => "athrow",
            Instruction::Checkcast(_) => "checkcast",
            Instruction::Instanceof(_) => "instanceof",
            Instruction::Monitorenter => "monitorenter",
            Instruction::Monitorexit => "monitorexit",
            Instruction::Multianewarray(_, _) => "multianewarray",
            Instruction::Ifnull(_) => "ifnull",
            Instruction::Ifnonnull(_) => "ifnonnull",
            Instruction::Goto_w(_) => "goto_w",
            Instruction::Jsr_w(_) => "jsr_w",
            Instruction::Iload_w(_) => "iload_w",
            Instruction::Lload_w(_) => "lload_w",
            Instruction::Fload_w(_) => "fload_w",
            Instruction::Dload_w(_) => "dload_w",
            Instruction::Aload_w(_) => "aload_w",
            Instruction::Istore_w(_) => "istore_w",
            Instruction::Lstore_w(_) => "lstore_w",
            Instruction::Fstore_w(_) => "fstore_w",
            Instruction::Dstore_w(_) => "dstore_w",
            Instruction::Astore_w(_) => "astore_w",
            Instruction::Iinc_w(_, _) => "iinc_w",
            Instruction::Ret_w(_) => "ret_w",
            Instruction::Breakpoint => "breakpoint",
            Instruction::Impdep1 => "impdep1",
            Instruction::Impdep2 => "impdep2",
        }
    }
}

fn read_branch(bytes: &mut Cursor<Vec<u8>>, start: i64) -> Result<u32> {
    let displacement = i64::from(bytes.read_i16::<BigEndian>()?);
    let target = start + displacement;
    u32::try_from(target).map_err(|_| BranchOutOfRange(target))
}

fn read_wide_branch(bytes: &mut Cursor<Vec<u8>>, start: i64) -> Result<u32> {
    let displacement = i64::from(bytes.read_i32::<BigEndian>()?);
    let target = start + displacement;
    u32::try_from(target).map_err(|_| BranchOutOfRange(target))
}

fn read_switch_target(bytes: &mut Cursor<Vec<u8>>, start: i64) -> Result<u32> {
    let displacement = i64::from(bytes.read_i32::<BigEndian>()?);
    let target = start + displacement;
    u32::try_from(target).map_err(|_| BranchOutOfRange(target))
}

fn write_switch_target(bytes: &mut Cursor<Vec<u8>>, start: i64, target: u32) -> Result<()> {
    let displacement = i64::from(target) - start;
    let wide = i32::try_from(displacement).map_err(|_| BranchOutOfRange(displacement))?;
    bytes.write_i32::<BigEndian>(wide)?;
    Ok(())
}

fn skip_switch_padding(bytes: &mut Cursor<Vec<u8>>) -> Result<()> {
    let position = bytes.position();
    let padding = (4 - (position % 4)) % 4;
    for _ in 0..padding {
        let _ = bytes.read_u8()?;
    }
    Ok(())
}

fn write_switch_padding(bytes: &mut Cursor<Vec<u8>>) -> Result<()> {
    let position = bytes.position();
    let padding = (4 - (position % 4)) % 4;
    for _ in 0..padding {
        bytes.write_u8(0)?;
    }
    Ok(())
}

fn write_wide_u16(bytes: &mut Cursor<Vec<u8>>, opcode: u8, operand: u16) -> Result<()> {
    bytes.write_u8(opcode)?;
    bytes.write_u16::<BigEndian>(operand)?;
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            Instruction::Bipush(value) => write!(f, " {value}"),
            Instruction::Sipush(value) => write!(f, " {value}"),
            Instruction::Ldc(index) => write!(f, " #{index}"),
            Instruction::Ldc_w(index)
            | Instruction::Ldc2_w(index)
            | Instruction::Getstatic(index)
            | Instruction::Putstatic(index)
            | Instruction::Getfield(index)
            | Instruction::Putfield(index)
            | Instruction::Invokevirtual(index)
            | Instruction::Invokespecial(index)
            | Instruction::Invokestatic(index)
            | Instruction::Invokedynamic(index)
            | Instruction::New(index)
            | Instruction::Anewarray(index)
            | Instruction::Checkcast(index)
            | Instruction::Instanceof(index) => write!(f, " #{index}"),
            Instruction::Invokeinterface(index, count) => write!(f, " #{index}, {count}"),
            Instruction::Iload(index)
            | Instruction::Lload(index)
            | Instruction::Fload(index)
            | Instruction::Dload(index)
            | Instruction::Aload(index)
            | Instruction::Istore(index)
            | Instruction::Lstore(index)
            | Instruction::Fstore(index)
            | Instruction::Dstore(index)
            | Instruction::Astore(index)
            | Instruction::Ret(index) => write!(f, " {index}"),
            Instruction::Iinc(index, value) => write!(f, " {index}, {value}"),
            Instruction::Iinc_w(index, value) => write!(f, " {index}, {value}"),
            Instruction::Iload_w(index)
            | Instruction::Lload_w(index)
            | Instruction::Fload_w(index)
            | Instruction::Dload_w(index)
            | Instruction::Aload_w(index)
            | Instruction::Istore_w(index)
            | Instruction::Lstore_w(index)
            | Instruction::Fstore_w(index)
            | Instruction::Dstore_w(index)
            | Instruction::Astore_w(index)
            | Instruction::Ret_w(index) => write!(f, " {index}"),
            Instruction::Newarray(array_type) => write!(f, " {array_type}"),
            Instruction::Multianewarray(index, dimensions) => {
                write!(f, " #{index}, {dimensions}")
            }
            Instruction::Tableswitch(table) => {
                write!(
                    f,
                    " [{}..{}] -> {:?}, default -> {}",
                    table.low, table.high, table.offsets, table.default
                )
            }
            Instruction::Lookupswitch(lookup) => {
                write!(f, " {:?}, default -> {}", lookup.pairs, lookup.default)
            }
            _ => match self.jump_target() {
                Some(target) => write!(f, " {target}"),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(bytes: Vec<u8>) -> Result<Instruction> {
        Instruction::from_bytes(&mut Cursor::new(bytes))
    }

    fn encode(instruction: &Instruction) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        instruction.to_bytes(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Err(InvalidOpcode(203)), decode(vec![203]));
    }

    #[test]
    fn test_invalid_wide_opcode() {
        assert_eq!(Err(InvalidWideOpcode(0)), decode(vec![196, 0]));
    }

    #[test]
    fn test_simple_round_trip() -> Result<()> {
        for instruction in [
            Instruction::Nop,
            Instruction::Iconst_m1,
            Instruction::Bipush(-3),
            Instruction::Sipush(300),
            Instruction::Iload(4),
            Instruction::Iinc(2, -1),
            Instruction::Getstatic(17),
            Instruction::Invokeinterface(5, 2),
            Instruction::Invokedynamic(9),
            Instruction::Newarray(ArrayType::Int),
            Instruction::Multianewarray(3, 2),
            Instruction::Iload_w(300),
            Instruction::Iinc_w(300, -300),
            Instruction::Ret_w(700),
            Instruction::Return,
        ] {
            let bytes = encode(&instruction)?;
            assert_eq!(instruction, decode(bytes)?, "{instruction}");
        }
        Ok(())
    }

    #[test]
    fn test_branch_targets_are_absolute() -> Result<()> {
        // goto +5 at offset 0 resolves to target 5
        let instruction = decode(vec![167, 0, 5])?;
        assert_eq!(Instruction::Goto(5), instruction);
        assert_eq!(Some(5), instruction.jump_target());

        // re-encoding at offset 0 reproduces the displacement
        assert_eq!(vec![167, 0, 5], encode(&instruction)?);
        Ok(())
    }

    #[test]
    fn test_backward_branch() -> Result<()> {
        let mut cursor = Cursor::new(vec![0, 0, 0, 167, 0xFF, 0xFD]);
        cursor.set_position(3);
        let instruction = Instruction::from_bytes(&mut cursor)?;
        assert_eq!(Instruction::Goto(0), instruction);
        Ok(())
    }

    #[test]
    fn test_negative_branch_target_is_rejected() {
        assert_eq!(Err(BranchOutOfRange(-2)), decode(vec![167, 0xFF, 0xFE]));
    }

    #[test]
    fn test_narrow_encode_out_of_range() {
        let instruction = Instruction::Goto(40_000);
        let result = encode(&instruction);
        assert_eq!(Err(BranchOutOfRange(40_000)), result);

        let instruction = Instruction::Goto_w(40_000);
        assert!(encode(&instruction).is_ok());
    }

    #[test]
    fn test_tableswitch_round_trip() -> Result<()> {
        let instruction = Instruction::Tableswitch(TableSwitch {
            default: 40,
            low: 0,
            high: 2,
            offsets: vec![28, 32, 36],
        });
        let bytes = encode(&instruction)?;
        // opcode + 3 bytes padding + default + low + high + 3 offsets
        assert_eq!(1 + 3 + 12 + 12, bytes.len());
        assert_eq!(instruction, decode(bytes)?);
        Ok(())
    }

    #[test]
    fn test_lookupswitch_round_trip() -> Result<()> {
        let mut pairs = IndexMap::new();
        pairs.insert(-1, 24);
        pairs.insert(10, 28);
        let instruction = Instruction::Lookupswitch(LookupSwitch { default: 32, pairs });
        let bytes = encode(&instruction)?;
        assert_eq!(instruction, decode(bytes)?);
        Ok(())
    }

    #[test]
    fn test_switch_padding_depends_on_offset() {
        let table = Instruction::Tableswitch(TableSwitch {
            default: 0,
            low: 0,
            high: 0,
            offsets: vec![0],
        });
        // At offset 3 the opcode ends on a 4-byte boundary: no padding.
        assert_eq!(1 + 12 + 4, table.size(3));
        assert_eq!(1 + 3 + 12 + 4, table.size(0));
    }

    #[test]
    fn test_invert_condition() {
        assert_eq!(
            Some(Instruction::Ifne(7)),
            Instruction::Ifeq(7).invert_condition()
        );
        assert_eq!(
            Some(Instruction::If_icmpge(9)),
            Instruction::If_icmplt(9).invert_condition()
        );
        assert_eq!(
            Some(Instruction::Ifnonnull(1)),
            Instruction::Ifnull(1).invert_condition()
        );
        assert_eq!(None, Instruction::Goto(3).invert_condition());
    }

    #[test]
    fn test_classification() {
        assert!(Instruction::Goto(0).is_terminator());
        assert!(Instruction::Athrow.is_terminator());
        assert!(Instruction::Ret(1).is_terminator());
        assert!(Instruction::Ireturn.is_return());
        assert!(Instruction::Jsr(0).is_jsr());
        assert!(!Instruction::Iadd.is_terminator());
        assert!(Instruction::Ifeq(0).is_conditional_branch());
        assert!(!Instruction::Goto(0).is_conditional_branch());
    }

    #[test]
    fn test_display() {
        assert_eq!("iadd", Instruction::Iadd.to_string());
        assert_eq!("bipush 8", Instruction::Bipush(8).to_string());
        assert_eq!("goto 12", Instruction::Goto(12).to_string());
        assert_eq!("invokevirtual #3", Instruction::Invokevirtual(3).to_string());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(1, Instruction::Iadd.size(0));
        assert_eq!(2, Instruction::Bipush(1).size(0));
        assert_eq!(3, Instruction::Goto(0).size(0));
        assert_eq!(4, Instruction::Iload_w(0).size(0));
        assert_eq!(5, Instruction::Goto_w(0).size(0));
        assert_eq!(5, Instruction::Invokeinterface(1, 1).size(0));
        assert_eq!(6, Instruction::Iinc_w(0, 0).size(0));
    }
}
