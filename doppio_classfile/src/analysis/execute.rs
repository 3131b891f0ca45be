//! Per-instruction frame effects.
//!
//! [`step`] applies one instruction's abstract effect to a [`Frame`]: pops with type
//! expectations, pushes with sources, local accesses, and the `uninitialized` to initialized
//! transition on `invokespecial <init>`. Effects degrade rather than abort: conflicts are
//! reported to the [`Verifier`] and analysis continues with substituted entries.

use crate::analysis::frame::{Frame, Source};
use crate::analysis::{FrameType, NewSite};
use crate::attributes::{ArrayType, Instruction};
use crate::constant::Constant;
use crate::constant_pool::ConstantPool;
use crate::descriptor::{self, MethodDescriptor};
use crate::graph::Label;
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};

/// Apply `instruction`'s abstract effect to `frame`.
///
/// `block` and `index` identify the instruction for entry sources and diagnostics; a block's
/// terminator uses the index one past its stored instructions.
#[expect(clippy::too_many_lines)]
pub(crate) fn step(
    instruction: &Instruction,
    block: Label,
    index: usize,
    frame: &mut Frame,
    constant_pool: &ConstantPool,
    verifier: &mut Verifier,
) {
    let source = Source::Instruction { block, index };
    frame.start(source.clone());

    match instruction {
        Instruction::Nop
        | Instruction::Breakpoint
        | Instruction::Impdep1
        | Instruction::Impdep2
        | Instruction::Goto(_)
        | Instruction::Goto_w(_)
        | Instruction::Return => {}

        // Constants
        Instruction::Aconst_null => {
            frame.push(FrameType::Null, None, source.clone());
        }
        Instruction::Iconst_m1 => push_int(frame, -1, &source),
        Instruction::Iconst_0 => push_int(frame, 0, &source),
        Instruction::Iconst_1 => push_int(frame, 1, &source),
        Instruction::Iconst_2 => push_int(frame, 2, &source),
        Instruction::Iconst_3 => push_int(frame, 3, &source),
        Instruction::Iconst_4 => push_int(frame, 4, &source),
        Instruction::Iconst_5 => push_int(frame, 5, &source),
        Instruction::Lconst_0 => {
            frame.push(FrameType::Long, Some(Constant::Long(0)), source.clone());
        }
        Instruction::Lconst_1 => {
            frame.push(FrameType::Long, Some(Constant::Long(1)), source.clone());
        }
        Instruction::Fconst_0 => {
            frame.push(FrameType::Float, Some(Constant::Float(0.0)), source.clone());
        }
        Instruction::Fconst_1 => {
            frame.push(FrameType::Float, Some(Constant::Float(1.0)), source.clone());
        }
        Instruction::Fconst_2 => {
            frame.push(FrameType::Float, Some(Constant::Float(2.0)), source.clone());
        }
        Instruction::Dconst_0 => {
            frame.push(
                FrameType::Double,
                Some(Constant::Double(0.0)),
                source.clone(),
            );
        }
        Instruction::Dconst_1 => {
            frame.push(
                FrameType::Double,
                Some(Constant::Double(1.0)),
                source.clone(),
            );
        }
        Instruction::Bipush(value) => push_int(frame, i32::from(*value), &source),
        Instruction::Sipush(value) => push_int(frame, i32::from(*value), &source),
        Instruction::Ldc(index) => {
            load_constant(frame, constant_pool, u16::from(*index), &source, verifier);
        }
        Instruction::Ldc_w(index) => {
            load_constant(frame, constant_pool, *index, &source, verifier);
        }
        Instruction::Ldc2_w(index) => {
            let constant = constant_pool.get(*index);
            match constant {
                Constant::Long(value) => {
                    frame.push(FrameType::Long, Some(Constant::Long(value)), source.clone());
                }
                Constant::Double(value) => {
                    frame.push(
                        FrameType::Double,
                        Some(Constant::Double(value)),
                        source.clone(),
                    );
                }
                Constant::Dynamic { .. } => {
                    let ty = constant
                        .reference_descriptor()
                        .and_then(|descriptor| {
                            descriptor::parse_field_descriptor(descriptor).ok()
                        })
                        .unwrap_or(FrameType::Top);
                    frame.push(ty, None, source.clone());
                }
                other => {
                    verifier.report(
                        VerifyErrorKind::InvalidType,
                        error_source(&source),
                        format!("ldc2_w of a non category 2 constant: {other}"),
                    );
                    frame.push(FrameType::Top, None, source.clone());
                }
            }
        }

        // Loads
        Instruction::Iload(index) => load(frame, u16::from(*index), FrameType::Int, &source, verifier),
        Instruction::Lload(index) => load(frame, u16::from(*index), FrameType::Long, &source, verifier),
        Instruction::Fload(index) => load(frame, u16::from(*index), FrameType::Float, &source, verifier),
        Instruction::Dload(index) => load(frame, u16::from(*index), FrameType::Double, &source, verifier),
        Instruction::Aload(index) => load_reference(frame, u16::from(*index), &source, verifier),
        Instruction::Iload_w(index) => load(frame, *index, FrameType::Int, &source, verifier),
        Instruction::Lload_w(index) => load(frame, *index, FrameType::Long, &source, verifier),
        Instruction::Fload_w(index) => load(frame, *index, FrameType::Float, &source, verifier),
        Instruction::Dload_w(index) => load(frame, *index, FrameType::Double, &source, verifier),
        Instruction::Aload_w(index) => load_reference(frame, *index, &source, verifier),
        Instruction::Iload_0 => load(frame, 0, FrameType::Int, &source, verifier),
        Instruction::Iload_1 => load(frame, 1, FrameType::Int, &source, verifier),
        Instruction::Iload_2 => load(frame, 2, FrameType::Int, &source, verifier),
        Instruction::Iload_3 => load(frame, 3, FrameType::Int, &source, verifier),
        Instruction::Lload_0 => load(frame, 0, FrameType::Long, &source, verifier),
        Instruction::Lload_1 => load(frame, 1, FrameType::Long, &source, verifier),
        Instruction::Lload_2 => load(frame, 2, FrameType::Long, &source, verifier),
        Instruction::Lload_3 => load(frame, 3, FrameType::Long, &source, verifier),
        Instruction::Fload_0 => load(frame, 0, FrameType::Float, &source, verifier),
        Instruction::Fload_1 => load(frame, 1, FrameType::Float, &source, verifier),
        Instruction::Fload_2 => load(frame, 2, FrameType::Float, &source, verifier),
        Instruction::Fload_3 => load(frame, 3, FrameType::Float, &source, verifier),
        Instruction::Dload_0 => load(frame, 0, FrameType::Double, &source, verifier),
        Instruction::Dload_1 => load(frame, 1, FrameType::Double, &source, verifier),
        Instruction::Dload_2 => load(frame, 2, FrameType::Double, &source, verifier),
        Instruction::Dload_3 => load(frame, 3, FrameType::Double, &source, verifier),
        Instruction::Aload_0 => load_reference(frame, 0, &source, verifier),
        Instruction::Aload_1 => load_reference(frame, 1, &source, verifier),
        Instruction::Aload_2 => load_reference(frame, 2, &source, verifier),
        Instruction::Aload_3 => load_reference(frame, 3, &source, verifier),

        // Array loads
        Instruction::Iaload | Instruction::Baload | Instruction::Caload | Instruction::Saload => {
            array_load(frame, FrameType::Int, &source, verifier);
        }
        Instruction::Laload => array_load(frame, FrameType::Long, &source, verifier),
        Instruction::Faload => array_load(frame, FrameType::Float, &source, verifier),
        Instruction::Daload => array_load(frame, FrameType::Double, &source, verifier),
        Instruction::Aaload => {
            frame.pop(&FrameType::Int, verifier, &source);
            let array = frame.pop_reference(verifier, &source);
            let element = match &frame.entry(array).ty {
                FrameType::Array { dims, element } => {
                    FrameType::array(dims - 1, element.as_ref().clone())
                }
                FrameType::Null => FrameType::Null,
                _ => FrameType::object(),
            };
            frame.push(element, None, source.clone());
        }

        // Stores
        Instruction::Istore(index) => store(frame, u16::from(*index), FrameType::Int, &source, verifier),
        Instruction::Lstore(index) => store(frame, u16::from(*index), FrameType::Long, &source, verifier),
        Instruction::Fstore(index) => store(frame, u16::from(*index), FrameType::Float, &source, verifier),
        Instruction::Dstore(index) => store(frame, u16::from(*index), FrameType::Double, &source, verifier),
        Instruction::Astore(index) => store_reference(frame, u16::from(*index), &source, verifier),
        Instruction::Istore_w(index) => store(frame, *index, FrameType::Int, &source, verifier),
        Instruction::Lstore_w(index) => store(frame, *index, FrameType::Long, &source, verifier),
        Instruction::Fstore_w(index) => store(frame, *index, FrameType::Float, &source, verifier),
        Instruction::Dstore_w(index) => store(frame, *index, FrameType::Double, &source, verifier),
        Instruction::Astore_w(index) => store_reference(frame, *index, &source, verifier),
        Instruction::Istore_0 => store(frame, 0, FrameType::Int, &source, verifier),
        Instruction::Istore_1 => store(frame, 1, FrameType::Int, &source, verifier),
        Instruction::Istore_2 => store(frame, 2, FrameType::Int, &source, verifier),
        Instruction::Istore_3 => store(frame, 3, FrameType::Int, &source, verifier),
        Instruction::Lstore_0 => store(frame, 0, FrameType::Long, &source, verifier),
        Instruction::Lstore_1 => store(frame, 1, FrameType::Long, &source, verifier),
        Instruction::Lstore_2 => store(frame, 2, FrameType::Long, &source, verifier),
        Instruction::Lstore_3 => store(frame, 3, FrameType::Long, &source, verifier),
        Instruction::Fstore_0 => store(frame, 0, FrameType::Float, &source, verifier),
        Instruction::Fstore_1 => store(frame, 1, FrameType::Float, &source, verifier),
        Instruction::Fstore_2 => store(frame, 2, FrameType::Float, &source, verifier),
        Instruction::Fstore_3 => store(frame, 3, FrameType::Float, &source, verifier),
        Instruction::Dstore_0 => store(frame, 0, FrameType::Double, &source, verifier),
        Instruction::Dstore_1 => store(frame, 1, FrameType::Double, &source, verifier),
        Instruction::Dstore_2 => store(frame, 2, FrameType::Double, &source, verifier),
        Instruction::Dstore_3 => store(frame, 3, FrameType::Double, &source, verifier),
        Instruction::Astore_0 => store_reference(frame, 0, &source, verifier),
        Instruction::Astore_1 => store_reference(frame, 1, &source, verifier),
        Instruction::Astore_2 => store_reference(frame, 2, &source, verifier),
        Instruction::Astore_3 => store_reference(frame, 3, &source, verifier),

        // Array stores
        Instruction::Iastore
        | Instruction::Bastore
        | Instruction::Castore
        | Instruction::Sastore => array_store(frame, FrameType::Int, &source, verifier),
        Instruction::Lastore => array_store(frame, FrameType::Long, &source, verifier),
        Instruction::Fastore => array_store(frame, FrameType::Float, &source, verifier),
        Instruction::Dastore => array_store(frame, FrameType::Double, &source, verifier),
        Instruction::Aastore => {
            frame.pop_reference(verifier, &source);
            frame.pop(&FrameType::Int, verifier, &source);
            frame.pop_reference(verifier, &source);
        }

        // Stack management
        Instruction::Pop => frame.pop_slots(1, verifier, &source),
        Instruction::Pop2 => frame.pop_slots(2, verifier, &source),
        Instruction::Dup => frame.dup(1, 0, verifier, &source),
        Instruction::Dup_x1 => frame.dup(1, 1, verifier, &source),
        Instruction::Dup_x2 => frame.dup(1, 2, verifier, &source),
        Instruction::Dup2 => frame.dup(2, 0, verifier, &source),
        Instruction::Dup2_x1 => frame.dup(2, 1, verifier, &source),
        Instruction::Dup2_x2 => frame.dup(2, 2, verifier, &source),
        Instruction::Swap => frame.swap(verifier, &source),

        // Arithmetic
        Instruction::Iadd
        | Instruction::Isub
        | Instruction::Imul
        | Instruction::Idiv
        | Instruction::Irem
        | Instruction::Ishl
        | Instruction::Ishr
        | Instruction::Iushr
        | Instruction::Iand
        | Instruction::Ior
        | Instruction::Ixor => binary(frame, FrameType::Int, FrameType::Int, &source, verifier),
        Instruction::Ladd
        | Instruction::Lsub
        | Instruction::Lmul
        | Instruction::Ldiv
        | Instruction::Lrem
        | Instruction::Land
        | Instruction::Lor
        | Instruction::Lxor => binary(frame, FrameType::Long, FrameType::Long, &source, verifier),
        Instruction::Lshl | Instruction::Lshr | Instruction::Lushr => {
            frame.pop(&FrameType::Int, verifier, &source);
            frame.pop(&FrameType::Long, verifier, &source);
            frame.push(FrameType::Long, None, source.clone());
        }
        Instruction::Fadd
        | Instruction::Fsub
        | Instruction::Fmul
        | Instruction::Fdiv
        | Instruction::Frem => binary(frame, FrameType::Float, FrameType::Float, &source, verifier),
        Instruction::Dadd
        | Instruction::Dsub
        | Instruction::Dmul
        | Instruction::Ddiv
        | Instruction::Drem => binary(frame, FrameType::Double, FrameType::Double, &source, verifier),
        Instruction::Ineg => unary(frame, FrameType::Int, FrameType::Int, &source, verifier),
        Instruction::Lneg => unary(frame, FrameType::Long, FrameType::Long, &source, verifier),
        Instruction::Fneg => unary(frame, FrameType::Float, FrameType::Float, &source, verifier),
        Instruction::Dneg => unary(frame, FrameType::Double, FrameType::Double, &source, verifier),
        Instruction::Iinc(index, _) => {
            frame.get(u16::from(*index), &FrameType::Int, verifier, &source);
            let id = frame.new_entry(FrameType::Int, None, source.clone());
            frame.set(u16::from(*index), id, &source);
        }
        Instruction::Iinc_w(index, _) => {
            frame.get(*index, &FrameType::Int, verifier, &source);
            let id = frame.new_entry(FrameType::Int, None, source.clone());
            frame.set(*index, id, &source);
        }

        // Conversions
        Instruction::I2l => unary(frame, FrameType::Int, FrameType::Long, &source, verifier),
        Instruction::I2f => unary(frame, FrameType::Int, FrameType::Float, &source, verifier),
        Instruction::I2d => unary(frame, FrameType::Int, FrameType::Double, &source, verifier),
        Instruction::L2i => unary(frame, FrameType::Long, FrameType::Int, &source, verifier),
        Instruction::L2f => unary(frame, FrameType::Long, FrameType::Float, &source, verifier),
        Instruction::L2d => unary(frame, FrameType::Long, FrameType::Double, &source, verifier),
        Instruction::F2i => unary(frame, FrameType::Float, FrameType::Int, &source, verifier),
        Instruction::F2l => unary(frame, FrameType::Float, FrameType::Long, &source, verifier),
        Instruction::F2d => unary(frame, FrameType::Float, FrameType::Double, &source, verifier),
        Instruction::D2i => unary(frame, FrameType::Double, FrameType::Int, &source, verifier),
        Instruction::D2l => unary(frame, FrameType::Double, FrameType::Long, &source, verifier),
        Instruction::D2f => unary(frame, FrameType::Double, FrameType::Float, &source, verifier),
        Instruction::I2b | Instruction::I2c | Instruction::I2s => {
            unary(frame, FrameType::Int, FrameType::Int, &source, verifier);
        }

        // Comparisons
        Instruction::Lcmp => binary(frame, FrameType::Long, FrameType::Int, &source, verifier),
        Instruction::Fcmpl | Instruction::Fcmpg => {
            binary(frame, FrameType::Float, FrameType::Int, &source, verifier);
        }
        Instruction::Dcmpl | Instruction::Dcmpg => {
            binary(frame, FrameType::Double, FrameType::Int, &source, verifier);
        }

        // Conditional branches (the jump itself is modeled by edges)
        Instruction::Ifeq(_)
        | Instruction::Ifne(_)
        | Instruction::Iflt(_)
        | Instruction::Ifge(_)
        | Instruction::Ifgt(_)
        | Instruction::Ifle(_) => {
            frame.pop(&FrameType::Int, verifier, &source);
        }
        Instruction::If_icmpeq(_)
        | Instruction::If_icmpne(_)
        | Instruction::If_icmplt(_)
        | Instruction::If_icmpge(_)
        | Instruction::If_icmpgt(_)
        | Instruction::If_icmple(_) => {
            frame.pop(&FrameType::Int, verifier, &source);
            frame.pop(&FrameType::Int, verifier, &source);
        }
        Instruction::If_acmpeq(_) | Instruction::If_acmpne(_) => {
            frame.pop_reference(verifier, &source);
            frame.pop_reference(verifier, &source);
        }
        Instruction::Ifnull(_) | Instruction::Ifnonnull(_) => {
            frame.pop_reference(verifier, &source);
        }

        // Subroutines
        Instruction::Jsr(_) | Instruction::Jsr_w(_) => {
            frame.push(FrameType::ReturnAddress, None, source.clone());
        }
        Instruction::Ret(index) => {
            frame.get(u16::from(*index), &FrameType::ReturnAddress, verifier, &source);
        }
        Instruction::Ret_w(index) => {
            frame.get(*index, &FrameType::ReturnAddress, verifier, &source);
        }

        // Switches
        Instruction::Tableswitch(_) | Instruction::Lookupswitch(_) => {
            frame.pop(&FrameType::Int, verifier, &source);
        }

        // Returns
        Instruction::Ireturn => {
            frame.pop(&FrameType::Int, verifier, &source);
        }
        Instruction::Lreturn => {
            frame.pop(&FrameType::Long, verifier, &source);
        }
        Instruction::Freturn => {
            frame.pop(&FrameType::Float, verifier, &source);
        }
        Instruction::Dreturn => {
            frame.pop(&FrameType::Double, verifier, &source);
        }
        Instruction::Areturn => {
            frame.pop_reference(verifier, &source);
        }

        // Field access
        Instruction::Getstatic(index) => {
            let ty = field_type(constant_pool, *index, &source, verifier);
            frame.push(ty, None, source.clone());
        }
        Instruction::Putstatic(index) => {
            let ty = field_type(constant_pool, *index, &source, verifier);
            pop_field_value(frame, &ty, &source, verifier);
        }
        Instruction::Getfield(index) => {
            let ty = field_type(constant_pool, *index, &source, verifier);
            frame.pop_reference(verifier, &source);
            frame.push(ty, None, source.clone());
        }
        Instruction::Putfield(index) => {
            let ty = field_type(constant_pool, *index, &source, verifier);
            pop_field_value(frame, &ty, &source, verifier);
            frame.pop_reference(verifier, &source);
        }

        // Invocations
        Instruction::Invokevirtual(index) | Instruction::Invokeinterface(index, _) => {
            let signature = method_signature(constant_pool, *index, &source, verifier);
            pop_arguments(frame, &signature, &source, verifier);
            frame.pop_reference(verifier, &source);
            push_return(frame, signature, &source);
        }
        Instruction::Invokespecial(index) => {
            let signature = method_signature(constant_pool, *index, &source, verifier);
            pop_arguments(frame, &signature, &source, verifier);
            let receiver = frame.pop_reference(verifier, &source);
            let constant = constant_pool.get(*index);
            let is_init = matches!(
                &constant,
                Constant::MethodRef { name_and_type, .. }
                | Constant::InterfaceMethodRef { name_and_type, .. }
                    if name_and_type.name_and_descriptor().map(|(name, _)| name) == Some("<init>")
            );
            if is_init {
                let class = constant
                    .reference_class_name()
                    .unwrap_or("java/lang/Object");
                match frame.entry(receiver).ty.clone() {
                    FrameType::Uninitialized(_) | FrameType::UninitializedThis => {
                        frame.replace(receiver, FrameType::reference(class), source.clone());
                    }
                    FrameType::Top => {}
                    other => verifier.report(
                        VerifyErrorKind::InvalidType,
                        error_source(&source),
                        format!("<init> receiver is already initialized: {other}"),
                    ),
                }
            }
            push_return(frame, signature, &source);
        }
        Instruction::Invokestatic(index) => {
            let signature = method_signature(constant_pool, *index, &source, verifier);
            pop_arguments(frame, &signature, &source, verifier);
            push_return(frame, signature, &source);
        }
        Instruction::Invokedynamic(index) => {
            let signature = method_signature(constant_pool, *index, &source, verifier);
            pop_arguments(frame, &signature, &source, verifier);
            push_return(frame, signature, &source);
        }

        // Object and array creation
        Instruction::New(_) => {
            frame.push(
                FrameType::Uninitialized(NewSite { block, index }),
                None,
                source.clone(),
            );
        }
        Instruction::Newarray(array_type) => {
            frame.pop(&FrameType::Int, verifier, &source);
            let element = match array_type {
                ArrayType::Boolean => FrameType::Boolean,
                ArrayType::Char => FrameType::Char,
                ArrayType::Float => FrameType::Float,
                ArrayType::Double => FrameType::Double,
                ArrayType::Byte => FrameType::Byte,
                ArrayType::Short => FrameType::Short,
                ArrayType::Int => FrameType::Int,
                ArrayType::Long => FrameType::Long,
            };
            frame.push(FrameType::array(1, element), None, source.clone());
        }
        Instruction::Anewarray(index) => {
            frame.pop(&FrameType::Int, verifier, &source);
            let ty = match class_type(constant_pool, *index, &source, verifier) {
                FrameType::Array { dims, element } => {
                    FrameType::array(dims.saturating_add(1), *element)
                }
                base => FrameType::array(1, base),
            };
            frame.push(ty, None, source.clone());
        }
        Instruction::Multianewarray(index, dimensions) => {
            for _ in 0..*dimensions {
                frame.pop(&FrameType::Int, verifier, &source);
            }
            let ty = class_type(constant_pool, *index, &source, verifier);
            frame.push(ty, None, source.clone());
        }
        Instruction::Arraylength => {
            frame.pop_reference(verifier, &source);
            frame.push(FrameType::Int, None, source.clone());
        }

        // Exceptions, casts and monitors
        Instruction::Athrow => {
            frame.pop_reference(verifier, &source);
        }
        Instruction::Checkcast(index) => {
            let target = class_type(constant_pool, *index, &source, verifier);
            let popped = frame.pop_reference(verifier, &source);
            let cast = frame.push(target, None, source.clone());
            frame.add_parent(cast, popped);
        }
        Instruction::Instanceof(_) => {
            frame.pop_reference(verifier, &source);
            frame.push(FrameType::Int, None, source.clone());
        }
        Instruction::Monitorenter | Instruction::Monitorexit => {
            frame.pop_reference(verifier, &source);
        }
    }

    frame.finish();
}

fn push_int(frame: &mut Frame, value: i32, source: &Source) {
    frame.push(FrameType::Int, Some(Constant::Integer(value)), source.clone());
}

fn load(frame: &mut Frame, index: u16, expect: FrameType, source: &Source, verifier: &mut Verifier) {
    let id = frame.get(index, &expect, verifier, source);
    frame.push_existing(id);
}

fn load_reference(frame: &mut Frame, index: u16, source: &Source, verifier: &mut Verifier) {
    let id = frame.get(index, &FrameType::Top, verifier, source);
    let ty = frame.entry(id).ty.clone();
    if !ty.is_reference() && ty != FrameType::Top {
        verifier.report(
            VerifyErrorKind::InvalidType,
            error_source(source),
            format!("aload of a non-reference local: {ty}"),
        );
    }
    frame.push_existing(id);
}

fn store(frame: &mut Frame, index: u16, expect: FrameType, source: &Source, verifier: &mut Verifier) {
    let id = frame.pop(&expect, verifier, source);
    frame.set(index, id, source);
}

fn store_reference(frame: &mut Frame, index: u16, source: &Source, verifier: &mut Verifier) {
    // astore also accepts the returnAddress pushed by jsr.
    let id = frame.pop(&FrameType::Top, verifier, source);
    let ty = frame.entry(id).ty.clone();
    if !ty.is_reference() && ty != FrameType::ReturnAddress && ty != FrameType::Top {
        verifier.report(
            VerifyErrorKind::InvalidType,
            error_source(source),
            format!("astore of a non-reference value: {ty}"),
        );
    }
    frame.set(index, id, source);
}

fn array_load(frame: &mut Frame, result: FrameType, source: &Source, verifier: &mut Verifier) {
    frame.pop(&FrameType::Int, verifier, source);
    frame.pop_reference(verifier, source);
    frame.push(result, None, source.clone());
}

fn array_store(frame: &mut Frame, element: FrameType, source: &Source, verifier: &mut Verifier) {
    frame.pop(&element, verifier, source);
    frame.pop(&FrameType::Int, verifier, source);
    frame.pop_reference(verifier, source);
}

fn binary(
    frame: &mut Frame,
    operand: FrameType,
    result: FrameType,
    source: &Source,
    verifier: &mut Verifier,
) {
    frame.pop(&operand, verifier, source);
    frame.pop(&operand, verifier, source);
    frame.push(result, None, source.clone());
}

fn unary(
    frame: &mut Frame,
    operand: FrameType,
    result: FrameType,
    source: &Source,
    verifier: &mut Verifier,
) {
    frame.pop(&operand, verifier, source);
    frame.push(result, None, source.clone());
}

fn load_constant(
    frame: &mut Frame,
    constant_pool: &ConstantPool,
    index: u16,
    source: &Source,
    verifier: &mut Verifier,
) {
    let constant = constant_pool.get(index);
    match constant {
        Constant::Integer(value) => {
            frame.push(
                FrameType::Int,
                Some(Constant::Integer(value)),
                source.clone(),
            );
        }
        Constant::Float(value) => {
            frame.push(
                FrameType::Float,
                Some(Constant::Float(value)),
                source.clone(),
            );
        }
        Constant::String { .. } => {
            frame.push(FrameType::string(), Some(constant), source.clone());
        }
        Constant::Class { .. } => {
            frame.push(
                FrameType::reference("java/lang/Class"),
                Some(constant),
                source.clone(),
            );
        }
        Constant::MethodHandle { .. } => {
            frame.push(
                FrameType::reference("java/lang/invoke/MethodHandle"),
                Some(constant),
                source.clone(),
            );
        }
        Constant::MethodType { .. } => {
            frame.push(
                FrameType::reference("java/lang/invoke/MethodType"),
                Some(constant),
                source.clone(),
            );
        }
        Constant::Dynamic { .. } => {
            let ty = constant
                .reference_descriptor()
                .and_then(|descriptor| descriptor::parse_field_descriptor(descriptor).ok())
                .unwrap_or(FrameType::Top);
            frame.push(ty, None, source.clone());
        }
        other => {
            verifier.report(
                VerifyErrorKind::InvalidType,
                error_source(source),
                format!("ldc of an unloadable constant: {other}"),
            );
            frame.push(FrameType::Top, None, source.clone());
        }
    }
}

fn pop_field_value(frame: &mut Frame, ty: &FrameType, source: &Source, verifier: &mut Verifier) {
    if ty.is_reference() {
        frame.pop_reference(verifier, source);
    } else {
        frame.pop(&ty.on_stack(), verifier, source);
    }
}

fn field_type(
    constant_pool: &ConstantPool,
    index: u16,
    source: &Source,
    verifier: &mut Verifier,
) -> FrameType {
    let constant = constant_pool.get(index);
    match constant
        .reference_descriptor()
        .and_then(|descriptor| descriptor::parse_field_descriptor(descriptor).ok())
    {
        Some(ty) => ty,
        None => {
            verifier.report(
                VerifyErrorKind::InvalidType,
                error_source(source),
                format!("field reference #{index} has no usable descriptor"),
            );
            FrameType::Top
        }
    }
}

fn method_signature(
    constant_pool: &ConstantPool,
    index: u16,
    source: &Source,
    verifier: &mut Verifier,
) -> MethodDescriptor {
    let constant = constant_pool.get(index);
    match constant
        .reference_descriptor()
        .and_then(|descriptor| descriptor::parse_method_descriptor(descriptor).ok())
    {
        Some(signature) => signature,
        None => {
            verifier.report(
                VerifyErrorKind::InvalidType,
                error_source(source),
                format!("method reference #{index} has no usable descriptor"),
            );
            MethodDescriptor {
                parameters: Vec::new(),
                return_type: None,
            }
        }
    }
}

fn pop_arguments(
    frame: &mut Frame,
    signature: &MethodDescriptor,
    source: &Source,
    verifier: &mut Verifier,
) {
    for parameter in signature.parameters.iter().rev() {
        if parameter.is_reference() {
            frame.pop_reference(verifier, source);
        } else {
            frame.pop(&parameter.on_stack(), verifier, source);
        }
    }
}

fn push_return(frame: &mut Frame, signature: MethodDescriptor, source: &Source) {
    if let Some(return_type) = signature.return_type {
        frame.push(return_type, None, source.clone());
    }
}

fn class_type(
    constant_pool: &ConstantPool,
    index: u16,
    source: &Source,
    verifier: &mut Verifier,
) -> FrameType {
    let constant = constant_pool.get(index);
    match constant.class_name() {
        Some(name) if name.starts_with('[') => descriptor::parse_field_descriptor(name)
            .unwrap_or_else(|_| FrameType::object()),
        Some(name) => FrameType::reference(name),
        None => {
            verifier.report(
                VerifyErrorKind::InvalidType,
                error_source(source),
                format!("constant #{index} does not resolve to a class"),
            );
            FrameType::object()
        }
    }
}

fn error_source(source: &Source) -> ErrorSource {
    match source {
        Source::Instruction { block, index } => ErrorSource::Instruction {
            block: *block,
            index: *index,
        },
        _ => ErrorSource::None,
    }
}
