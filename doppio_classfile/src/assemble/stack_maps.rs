//! Stack map frame computation and compression.
//!
//! For every frame point the assembler identified, the merged entry state of the block is
//! materialized into wire verification types — class names become constant pool references,
//! uninitialized objects become the byte offset of their creating `new` — and the resulting
//! frames are delta-compressed against their predecessor, starting from the method's implicit
//! initial frame.

use crate::analysis::{
    Frame, FrameType, FrozenEntry, FrozenState, Liveness, MethodContext, Trace,
};
use crate::assemble::assembler::FramePoint;
use crate::attributes::{StackFrame, VerificationType};
use crate::constant_pool::ConstantPool;
use crate::error::Result;
use crate::graph::Label;
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};
use ahash::AHashMap;
use std::collections::BTreeMap;

type NewSites = AHashMap<(Label, usize), u32>;

/// Compute the compressed frames for the given points, in offset order.
///
/// # Errors
///
/// Returns an error if the constant pool fills up or an offset overflows `u16`.
pub(crate) fn compute(
    trace: &Trace,
    liveness: &Liveness,
    method: &MethodContext,
    points: &[FramePoint],
    new_sites: &NewSites,
    constant_pool: &mut ConstantPool,
    verifier: &mut Verifier,
) -> Result<Vec<StackFrame>> {
    let initial = Frame::initial(method)?.freeze();
    let mut previous_locals = wire_locals(
        &slot_types(&initial, None),
        new_sites,
        constant_pool,
        verifier,
    )?;
    let mut previous_offset: Option<u32> = None;

    let mut frames = Vec::with_capacity(points.len());
    for point in points {
        let Some((locals, stack)) =
            merged_state(trace, liveness, point.label, new_sites, constant_pool, verifier)?
        else {
            continue;
        };

        let offset_delta = match previous_offset {
            None => u16::try_from(point.offset)?,
            Some(previous) => u16::try_from(point.offset - previous - 1)?,
        };
        frames.push(compress(&previous_locals, &locals, &stack, offset_delta));
        previous_locals = locals;
        previous_offset = Some(point.offset);
    }
    Ok(frames)
}

/// The merged `(locals, stack)` wire arrays at a block's entry, or `None` when the states are
/// too inconsistent to merge.
fn merged_state(
    trace: &Trace,
    liveness: &Liveness,
    label: Label,
    new_sites: &NewSites,
    constant_pool: &mut ConstantPool,
    verifier: &mut Verifier,
) -> Result<Option<(Vec<VerificationType>, Vec<VerificationType>)>> {
    let Some(constraints) = trace.constraints.get(&label) else {
        // A dead block is emitted as nops ending in athrow; its synthetic frame carries a
        // single throwable so the padding verifies.
        let throwable = VerificationType::Object {
            cpool_index: constant_pool.add_class("java/lang/Throwable")?,
        };
        return Ok(Some((Vec::new(), vec![throwable])));
    };

    let live = liveness.live_in(label);
    let mut merged_locals: Option<BTreeMap<u16, FrameType>> = None;
    let mut merged_stack: Option<Vec<FrameType>> = None;

    for constraint in constraints {
        let state = &constraint.entry;
        let stack_types = stack_types(state);
        match merged_stack.as_mut() {
            None => merged_stack = Some(stack_types),
            Some(merged) => {
                if merged.len() != stack_types.len() {
                    verifier.report(
                        VerifyErrorKind::InvalidStackMerge,
                        ErrorSource::Block(label),
                        format!(
                            "stack heights disagree at join: {} vs {}",
                            merged.len(),
                            stack_types.len()
                        ),
                    );
                    return Ok(None);
                }
                for (slot, incoming) in merged.iter_mut().zip(stack_types) {
                    if !slot.check_merge(&incoming) {
                        verifier.report(
                            VerifyErrorKind::InvalidStackMerge,
                            ErrorSource::Block(label),
                            format!("cannot merge {slot} with {incoming} on the stack"),
                        );
                    }
                    *slot = slot.merge(&incoming);
                }
            }
        }

        let local_types = slot_types(state, live);
        match merged_locals.as_mut() {
            None => merged_locals = Some(local_types),
            Some(merged) => {
                let indices: Vec<u16> = merged.keys().copied().collect();
                for index in indices {
                    match local_types.get(&index) {
                        Some(incoming) => {
                            let current = &merged[&index];
                            if !current.check_merge(incoming) {
                                verifier.report(
                                    VerifyErrorKind::InvalidLocalsMerge,
                                    ErrorSource::Block(label),
                                    format!(
                                        "cannot merge {current} with {incoming} in local {index}"
                                    ),
                                );
                            }
                            let joined = merged[&index].merge(incoming);
                            merged.insert(index, joined);
                        }
                        None => {
                            merged.remove(&index);
                        }
                    }
                }
            }
        }
    }

    let locals = wire_locals(
        &merged_locals.unwrap_or_default(),
        new_sites,
        constant_pool,
        verifier,
    )?;
    let mut stack = Vec::new();
    for ty in merged_stack.unwrap_or_default() {
        stack.push(wire_type(&ty, new_sites, constant_pool, verifier)?);
    }
    Ok(Some((locals, stack)))
}

/// The stack of a frozen state as frame types, sentinels collapsed into their values.
fn stack_types(state: &FrozenState) -> Vec<FrameType> {
    let mut types = Vec::new();
    let mut skip = false;
    for entry in &state.stack {
        if skip {
            skip = false;
            continue;
        }
        types.push(entry.ty.clone());
        skip = entry.ty.is_wide();
    }
    types
}

/// The locals of a frozen state as slot-indexed frame types, optionally filtered to the live
/// set; wide-value sentinels are dropped (the wire format implies them).
fn slot_types(
    state: &FrozenState,
    live: Option<&ahash::AHashSet<u16>>,
) -> BTreeMap<u16, FrameType> {
    let mut slots = BTreeMap::new();
    for (index, entry) in &state.locals {
        if let Some(live) = live {
            if !live.contains(index) {
                continue;
            }
        }
        if is_sentinel_slot(state, *index, entry) {
            continue;
        }
        slots.insert(*index, entry.ty.clone());
    }
    slots
}

/// A `Top` directly above a wide value is that value's hidden second slot.
fn is_sentinel_slot(state: &FrozenState, index: u16, entry: &FrozenEntry) -> bool {
    entry.ty == FrameType::Top
        && index > 0
        && state
            .locals
            .get(&(index - 1))
            .is_some_and(|below| below.ty.is_wide())
}

/// Materialize a slot map into the wire locals array: gaps become `Top`, wide values cover
/// their second slot implicitly, trailing `Top`s are truncated.
fn wire_locals(
    slots: &BTreeMap<u16, FrameType>,
    new_sites: &NewSites,
    constant_pool: &mut ConstantPool,
    verifier: &mut Verifier,
) -> Result<Vec<VerificationType>> {
    let mut locals = Vec::new();
    let Some(max_index) = slots.keys().next_back().copied() else {
        return Ok(locals);
    };
    let mut index = 0u16;
    while index <= max_index {
        match slots.get(&index) {
            Some(ty) => {
                let width = u16::from(ty.category());
                locals.push(wire_type(ty, new_sites, constant_pool, verifier)?);
                index += width;
            }
            None => {
                locals.push(VerificationType::Top);
                index += 1;
            }
        }
    }
    while locals.last() == Some(&VerificationType::Top) {
        locals.pop();
    }
    Ok(locals)
}

/// Lower one frame type to its wire encoding.
fn wire_type(
    ty: &FrameType,
    new_sites: &NewSites,
    constant_pool: &mut ConstantPool,
    verifier: &mut Verifier,
) -> Result<VerificationType> {
    let verification_type = match ty {
        FrameType::Top => VerificationType::Top,
        FrameType::Int
        | FrameType::Byte
        | FrameType::Short
        | FrameType::Char
        | FrameType::Boolean => VerificationType::Integer,
        FrameType::Float => VerificationType::Float,
        FrameType::Long => VerificationType::Long,
        FrameType::Double => VerificationType::Double,
        FrameType::Null => VerificationType::Null,
        FrameType::UninitializedThis => VerificationType::UninitializedThis,
        FrameType::Uninitialized(site) => {
            match new_sites.get(&(site.block, site.index)) {
                Some(offset) => VerificationType::Uninitialized {
                    offset: u16::try_from(*offset)?,
                },
                None => {
                    verifier.report(
                        VerifyErrorKind::InvalidType,
                        ErrorSource::Block(site.block),
                        "uninitialized value has no laid-out new instruction",
                    );
                    VerificationType::Top
                }
            }
        }
        FrameType::Reference(name) => VerificationType::Object {
            cpool_index: constant_pool.add_class(name.as_ref())?,
        },
        FrameType::Array { dims, element } => {
            let mut descriptor = "[".repeat(usize::from(*dims));
            descriptor.push_str(&element_descriptor(element));
            VerificationType::Object {
                cpool_index: constant_pool.add_class(&descriptor)?,
            }
        }
        FrameType::ReturnAddress => {
            verifier.report(
                VerifyErrorKind::InvalidType,
                ErrorSource::None,
                "return addresses cannot appear in stack map frames",
            );
            VerificationType::Top
        }
    };
    Ok(verification_type)
}

fn element_descriptor(ty: &FrameType) -> String {
    match ty {
        FrameType::Byte => "B".to_string(),
        FrameType::Char => "C".to_string(),
        FrameType::Double => "D".to_string(),
        FrameType::Float => "F".to_string(),
        FrameType::Int => "I".to_string(),
        FrameType::Long => "J".to_string(),
        FrameType::Short => "S".to_string(),
        FrameType::Boolean => "Z".to_string(),
        FrameType::Reference(name) => format!("L{name};"),
        _ => "Ljava/lang/Object;".to_string(),
    }
}

/// Pick the most compact frame kind for the delta from the previous frame.
fn compress(
    previous_locals: &[VerificationType],
    locals: &[VerificationType],
    stack: &[VerificationType],
    offset_delta: u16,
) -> StackFrame {
    if stack.is_empty() && locals == previous_locals {
        return if offset_delta <= 63 {
            StackFrame::SameFrame {
                frame_type: u8::try_from(offset_delta).unwrap_or(0),
            }
        } else {
            StackFrame::SameFrameExtended {
                frame_type: 251,
                offset_delta,
            }
        };
    }
    if stack.len() == 1 && locals == previous_locals {
        return if offset_delta <= 63 {
            StackFrame::SameLocals1StackItemFrame {
                frame_type: 64 + u8::try_from(offset_delta).unwrap_or(0),
                stack: stack.to_vec(),
            }
        } else {
            StackFrame::SameLocals1StackItemFrameExtended {
                frame_type: 247,
                offset_delta,
                stack: stack.to_vec(),
            }
        };
    }
    if stack.is_empty()
        && locals.len() < previous_locals.len()
        && previous_locals.len() - locals.len() <= 3
        && previous_locals[..locals.len()] == *locals
    {
        let chopped = previous_locals.len() - locals.len();
        return StackFrame::ChopFrame {
            frame_type: 251 - u8::try_from(chopped).unwrap_or(1),
            offset_delta,
        };
    }
    if stack.is_empty()
        && locals.len() > previous_locals.len()
        && locals.len() - previous_locals.len() <= 3
        && locals[..previous_locals.len()] == *previous_locals
    {
        let appended = locals.len() - previous_locals.len();
        return StackFrame::AppendFrame {
            frame_type: 251 + u8::try_from(appended).unwrap_or(1),
            offset_delta,
            locals: locals[previous_locals.len()..].to_vec(),
        };
    }
    StackFrame::FullFrame {
        frame_type: 255,
        offset_delta,
        locals: locals.to_vec(),
        stack: stack.to_vec(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_compress_same() {
        let previous = vec![VerificationType::Integer];
        let frame = compress(&previous, &previous.clone(), &[], 7);
        assert_eq!(StackFrame::SameFrame { frame_type: 7 }, frame);

        let frame = compress(&previous, &previous.clone(), &[], 200);
        assert_eq!(
            StackFrame::SameFrameExtended {
                frame_type: 251,
                offset_delta: 200
            },
            frame
        );
    }

    #[test]
    fn test_compress_one_stack_item() {
        let previous = vec![VerificationType::Integer];
        let stack = vec![VerificationType::Null];
        let frame = compress(&previous, &previous.clone(), &stack, 3);
        assert_eq!(
            StackFrame::SameLocals1StackItemFrame {
                frame_type: 67,
                stack,
            },
            frame
        );
    }

    #[test]
    fn test_compress_chop_and_append() {
        let previous = vec![VerificationType::Integer, VerificationType::Float];
        let frame = compress(&previous, &[VerificationType::Integer], &[], 4);
        assert_eq!(
            StackFrame::ChopFrame {
                frame_type: 250,
                offset_delta: 4
            },
            frame
        );

        let locals = vec![
            VerificationType::Integer,
            VerificationType::Float,
            VerificationType::Long,
        ];
        let frame = compress(&previous, &locals, &[], 4);
        assert_eq!(
            StackFrame::AppendFrame {
                frame_type: 252,
                offset_delta: 4,
                locals: vec![VerificationType::Long],
            },
            frame
        );
    }

    #[test]
    fn test_compress_full() {
        let previous = vec![VerificationType::Integer];
        let locals = vec![VerificationType::Float];
        let stack = vec![VerificationType::Integer, VerificationType::Integer];
        let frame = compress(&previous, &locals, &stack, 9);
        assert_eq!(
            StackFrame::FullFrame {
                frame_type: 255,
                offset_delta: 9,
                locals,
                stack,
            },
            frame
        );
    }

    #[test]
    fn test_wire_locals_truncates_trailing_tops() -> Result<()> {
        let mut constant_pool = ConstantPool::new();
        let mut verifier = Verifier::new();
        let mut slots = BTreeMap::new();
        slots.insert(0u16, FrameType::Long);
        slots.insert(3u16, FrameType::Top);
        let locals = wire_locals(&slots, &NewSites::new(), &mut constant_pool, &mut verifier)?;
        // Long covers slots 0 and 1; slot 2 is a gap; the trailing top at 3 is dropped with it.
        assert_eq!(vec![VerificationType::Long], locals);
        Ok(())
    }

    #[test]
    fn test_array_descriptor() {
        assert_eq!("I", element_descriptor(&FrameType::Int));
        assert_eq!(
            "Ljava/lang/String;",
            element_descriptor(&FrameType::string())
        );
    }
}
