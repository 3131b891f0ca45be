//! Lowering a graph back to a linear bytecode stream.
//!
//! Assembly runs in four phases. Phase 1 lays blocks out — entry first, then ascending label —
//! splicing inline blocks at their call sites and stitching fallthroughs that are not
//! physically adjacent with synthetic gotos. Phase 2 iterates offsets to a fixed point,
//! monotonically widening any narrow branch whose displacement no longer fits sixteen signed
//! bits; a conditional branch widens into its inverted form skipping over a `goto_w`. Phase 3
//! synthesizes the exception table from exception edges sorted by priority. Phase 4 computes
//! compressed stack map frames when the class version requires them and no live `jsr` remains.

use crate::analysis::{Liveness, MethodContext, Trace};
use crate::assemble::stack_maps;
use crate::attributes::{
    Attribute, ExceptionTableEntry, Instruction, LookupSwitch, StackFrame, TableSwitch,
    instructions_to_bytes,
};
use crate::constant_pool::ConstantPool;
use crate::error::Error::Verification;
use crate::error::Result;
use crate::graph::{Edge, EdgeKind, InsnGraph, Label};
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};
use crate::version::Version;
use ahash::AHashMap;
use indexmap::IndexMap;
use tracing::debug;

/// Options controlling assembly.
#[derive(Clone, Copy, Debug)]
pub struct AssembleOptions {
    /// Emit a `StackMapTable` when the class version requires one.
    pub compute_frames: bool,
    /// Drop blocks the trace never reached instead of emitting them as nop padding.
    pub remove_dead_blocks: bool,
    /// Raise a composite [`Verification`] error when the verifier log is non-empty at the end.
    pub do_raise: bool,
    /// Fixed-point inline splicing stops at this depth; deeper splices degrade to jumps.
    pub inline_depth: u8,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            compute_frames: true,
            remove_dead_blocks: false,
            do_raise: true,
            inline_depth: 8,
        }
    }
}

/// The lowered method body.
#[derive(Clone, Debug)]
pub struct CodeOutput {
    pub max_stack: u16,
    pub max_locals: u16,
    /// The final instruction stream with its byte offsets.
    pub code: Vec<(u32, Instruction)>,
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Present when stack map frames were computed.
    pub stack_map_frames: Option<Vec<StackFrame>>,
}

impl CodeOutput {
    /// The encoded code array.
    ///
    /// # Errors
    ///
    /// Returns an error if a branch target does not fit its encoded width.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        instructions_to_bytes(&self.code)
    }

    /// Wrap the output into a `Code` attribute, adding the attribute names to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the constant pool is full.
    pub fn into_attribute(self, constant_pool: &mut ConstantPool) -> Result<Attribute> {
        let name_index = constant_pool.add_utf8("Code")?;
        let mut attributes = Vec::new();
        if let Some(frames) = self.stack_map_frames {
            if !frames.is_empty() {
                attributes.push(Attribute::StackMapTable {
                    name_index: constant_pool.add_utf8("StackMapTable")?,
                    frames,
                });
            }
        }
        Ok(Attribute::Code {
            name_index,
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code: self.code,
            exception_table: self.exception_table,
            attributes,
        })
    }
}

/// One planned instruction; branches and switches stay symbolic until offsets stabilize.
#[derive(Clone, Debug)]
enum PlanInsn {
    Fixed(Instruction),
    Branch {
        instruction: Instruction,
        target: Label,
        wide: bool,
    },
    Switch {
        table: Option<(i32, i32)>,
        targets: Vec<(Option<i32>, Label)>,
    },
}

#[derive(Clone, Debug)]
struct PlanItem {
    block: Label,
    /// In-block instruction index, for `new` site bookkeeping; synthetic items carry `None`.
    index: Option<usize>,
    insn: PlanInsn,
}

/// One emitted copy of a block: `[item_start, item_end)` in the plan.
#[derive(Clone, Debug)]
struct Span {
    label: Label,
    /// The block that spliced this copy, for inline exception coverage.
    parent: Option<Label>,
    item_start: usize,
    item_end: usize,
    start: u32,
    end: u32,
}

/// Assemble `graph` into a linear method body.
///
/// The trace provides reachability, stack bounds and subroutine facts; the constant pool
/// receives catch types and stack map class references.
///
/// # Errors
///
/// Returns [`Verification`] when diagnostics were recorded and `do_raise` is set, or a hard
/// error for unencodable output.
pub fn assemble(
    graph: &InsnGraph,
    trace: &Trace,
    method: &MethodContext,
    version: &Version,
    constant_pool: &mut ConstantPool,
    options: &AssembleOptions,
    verifier: &mut Verifier,
) -> Result<CodeOutput> {
    let (mut plan, mut spans) = build_plan(graph, trace, options, verifier);
    let offsets = fix_offsets(&mut plan, &mut spans, verifier)?;
    let (code, new_sites) = emit(&plan, &offsets, &spans, verifier)?;
    let exception_table = build_exception_table(graph, &spans, constant_pool, verifier)?;

    let uses_jsr = !trace.subroutines.is_empty()
        || graph
            .edges()
            .any(|edge| matches!(edge.kind, EdgeKind::JsrJump | EdgeKind::Ret));
    let stack_map_frames = if options.compute_frames
        && version.supports_stack_maps()
        && !uses_jsr
    {
        let liveness = Liveness::from_trace(graph, trace);
        let points = frame_points(graph, &plan, &spans);
        Some(stack_maps::compute(
            trace,
            &liveness,
            method,
            &points,
            &new_sites,
            constant_pool,
            verifier,
        )?)
    } else {
        None
    };

    debug!(
        code_length = code.last().map_or(0, |(offset, insn)| offset + insn.size(*offset)),
        handlers = exception_table.len(),
        frames = stack_map_frames.as_ref().map_or(0, Vec::len),
        "assembly complete"
    );

    if options.do_raise && !verifier.is_empty() {
        return Err(Verification {
            errors: verifier.errors().to_vec(),
        });
    }

    Ok(CodeOutput {
        max_stack: u16::try_from(trace.max_stack)?,
        max_locals: u16::try_from(trace.max_locals)?,
        code,
        exception_table,
        stack_map_frames,
    })
}

/// Phase 1: block layout and inline splicing.
fn build_plan(
    graph: &InsnGraph,
    trace: &Trace,
    options: &AssembleOptions,
    verifier: &mut Verifier,
) -> (Vec<PlanItem>, Vec<Span>) {
    let mut order: Vec<Label> = graph.labels().collect();
    order.sort_unstable();
    if let Some(position) = order.iter().position(|label| *label == graph.entry()) {
        let entry = order.remove(position);
        order.insert(0, entry);
    }
    order.retain(|label| {
        let dead = !trace.reached(*label);
        if dead && options.remove_dead_blocks {
            return false;
        }
        !(spliced_everywhere(graph, *label) && *label != graph.entry())
    });

    let mut plan = Vec::new();
    let mut spans = Vec::new();
    for (position, label) in order.iter().enumerate() {
        let next = order.get(position + 1).copied();
        emit_block(
            graph, trace, options, *label, None, next, 0, &mut plan, &mut spans, verifier,
        );
    }
    (plan, spans)
}

/// `true` when every incoming edge of an inline block is one the splicer consumes.
fn spliced_everywhere(graph: &InsnGraph, label: Label) -> bool {
    let Some(block) = graph.block(label) else {
        return false;
    };
    if !block.inline {
        return false;
    }
    let predecessors = graph.predecessors(label);
    !predecessors.is_empty()
        && predecessors.iter().all(|edge| {
            matches!(edge.kind, EdgeKind::Fallthrough | EdgeKind::JsrFallthrough)
                || (matches!(edge.kind, EdgeKind::Jump)
                    && edge
                        .instruction
                        .as_ref()
                        .is_some_and(Instruction::is_unconditional_branch))
        })
}

#[expect(clippy::too_many_arguments)]
fn emit_block(
    graph: &InsnGraph,
    trace: &Trace,
    options: &AssembleOptions,
    label: Label,
    parent: Option<Label>,
    next: Option<Label>,
    depth: u8,
    plan: &mut Vec<PlanItem>,
    spans: &mut Vec<Span>,
    verifier: &mut Verifier,
) {
    let Some(block) = graph.block(label) else {
        return;
    };
    let item_start = plan.len();

    if !trace.reached(label) {
        // Dead code is nopped into a shape that always verifies: nothing live but an athrow.
        for _ in 0..block.instructions.len() {
            plan.push(PlanItem {
                block: label,
                index: None,
                insn: PlanInsn::Fixed(Instruction::Nop),
            });
        }
        plan.push(PlanItem {
            block: label,
            index: None,
            insn: PlanInsn::Fixed(Instruction::Athrow),
        });
        spans.push(Span {
            label,
            parent,
            item_start,
            item_end: plan.len(),
            start: 0,
            end: 0,
        });
        return;
    }

    for (index, instruction) in block.instructions.iter().enumerate() {
        plan.push(PlanItem {
            block: label,
            index: Some(index),
            insn: PlanInsn::Fixed(instruction.clone()),
        });
    }

    let edges = graph.successors(label);
    let jump = edges.iter().find(|edge| matches!(edge.kind, EdgeKind::Jump));
    let fallthrough = edges
        .iter()
        .find(|edge| matches!(edge.kind, EdgeKind::Fallthrough) && !edge.is_leaf());
    let leaf = edges.iter().find(|edge| edge.is_leaf());
    let jsr_jump = edges
        .iter()
        .find(|edge| matches!(edge.kind, EdgeKind::JsrJump));
    let jsr_fallthrough = edges
        .iter()
        .find(|edge| matches!(edge.kind, EdgeKind::JsrFallthrough));
    let ret = edges.iter().find(|edge| matches!(edge.kind, EdgeKind::Ret));
    let switches: Vec<&Edge> = edges
        .iter()
        .filter(|edge| matches!(edge.kind, EdgeKind::Switch { .. }))
        .collect();

    // Close the span over the block body plus its terminator; splices open their own spans.
    let close_span = |plan: &mut Vec<PlanItem>, spans: &mut Vec<Span>| {
        spans.push(Span {
            label,
            parent,
            item_start,
            item_end: plan.len(),
            start: 0,
            end: 0,
        });
    };

    if !switches.is_empty() {
        let table = switch_shape(&switches, verifier, label);
        let targets = switches
            .iter()
            .filter_map(|edge| {
                let EdgeKind::Switch { value } = edge.kind else {
                    return None;
                };
                edge.to.map(|to| (value, to))
            })
            .collect();
        plan.push(PlanItem {
            block: label,
            index: Some(block.instructions.len()),
            insn: PlanInsn::Switch { table, targets },
        });
        close_span(plan, spans);
    } else if let Some(edge) = ret {
        let instruction = edge
            .instruction
            .clone()
            .unwrap_or(Instruction::Ret(0));
        plan.push(PlanItem {
            block: label,
            index: Some(block.instructions.len()),
            insn: PlanInsn::Fixed(instruction),
        });
        close_span(plan, spans);
    } else if let Some(edge) = leaf {
        let instruction = edge.instruction.clone().unwrap_or(Instruction::Return);
        plan.push(PlanItem {
            block: label,
            index: Some(block.instructions.len()),
            insn: PlanInsn::Fixed(instruction),
        });
        close_span(plan, spans);
    } else if let (Some(jump_edge), Some(continuation)) = (jsr_jump, jsr_fallthrough) {
        let instruction = normalize_branch(
            jump_edge.instruction.clone().unwrap_or(Instruction::Jsr(0)),
        );
        if let Some(target) = jump_edge.to {
            plan.push(PlanItem {
                block: label,
                index: Some(block.instructions.len()),
                insn: PlanInsn::Branch {
                    instruction,
                    target,
                    wide: false,
                },
            });
        }
        close_span(plan, spans);
        if let Some(target) = continuation.to {
            continue_to(
                graph, trace, options, label, target, next, depth, plan, spans, verifier,
            );
        }
    } else if let Some(jump_edge) = jump {
        let instruction = normalize_branch(
            jump_edge.instruction.clone().unwrap_or(Instruction::Goto(0)),
        );
        let conditional = instruction.is_conditional_branch();
        if conditional {
            if let Some(target) = jump_edge.to {
                plan.push(PlanItem {
                    block: label,
                    index: Some(block.instructions.len()),
                    insn: PlanInsn::Branch {
                        instruction,
                        target,
                        wide: false,
                    },
                });
            }
            close_span(plan, spans);
            if let Some(target) = fallthrough.and_then(|edge| edge.to) {
                continue_to(
                    graph, trace, options, label, target, next, depth, plan, spans, verifier,
                );
            }
        } else if let Some(target) = jump_edge.to {
            // A simple unconditional jump into an inline block is a splice point.
            if is_spliceable(graph, target) && depth < options.inline_depth {
                close_span(plan, spans);
                emit_block(
                    graph,
                    trace,
                    options,
                    target,
                    Some(label),
                    next,
                    depth + 1,
                    plan,
                    spans,
                    verifier,
                );
            } else {
                if is_spliceable(graph, target) {
                    verifier.report(
                        VerifyErrorKind::InvalidBlock,
                        ErrorSource::Block(label),
                        "inline splice depth exceeded, degrading to a jump",
                    );
                }
                plan.push(PlanItem {
                    block: label,
                    index: Some(block.instructions.len()),
                    insn: PlanInsn::Branch {
                        instruction,
                        target,
                        wide: false,
                    },
                });
                close_span(plan, spans);
            }
        } else {
            close_span(plan, spans);
        }
    } else if let Some(target) = fallthrough.and_then(|edge| edge.to) {
        close_span(plan, spans);
        continue_to(
            graph, trace, options, label, target, next, depth, plan, spans, verifier,
        );
    } else {
        // No out edges: structurally invalid for a reached block, already reported by the
        // trace; keep the bytes we have.
        close_span(plan, spans);
    }
}

/// Continue control flow into `target`: splice it when inline, fall through when physically
/// next, or stitch with a synthetic goto.
#[expect(clippy::too_many_arguments)]
fn continue_to(
    graph: &InsnGraph,
    trace: &Trace,
    options: &AssembleOptions,
    from: Label,
    target: Label,
    next: Option<Label>,
    depth: u8,
    plan: &mut Vec<PlanItem>,
    spans: &mut Vec<Span>,
    verifier: &mut Verifier,
) {
    if is_spliceable(graph, target) {
        if depth < options.inline_depth {
            emit_block(
                graph,
                trace,
                options,
                target,
                Some(from),
                next,
                depth + 1,
                plan,
                spans,
                verifier,
            );
            return;
        }
        verifier.report(
            VerifyErrorKind::InvalidBlock,
            ErrorSource::Block(from),
            "inline splice depth exceeded, degrading to a jump",
        );
    }
    if next != Some(target) {
        plan.push(PlanItem {
            block: from,
            index: None,
            insn: PlanInsn::Branch {
                instruction: Instruction::Goto(0),
                target,
                wide: false,
            },
        });
        // Synthetic stitches extend the previous span so exception coverage includes them.
        if let Some(span) = spans.last_mut() {
            span.item_end = plan.len();
        }
    }
}

fn is_spliceable(graph: &InsnGraph, label: Label) -> bool {
    graph.block(label).is_some_and(|block| block.inline)
}

/// Normalize wide branch forms to their narrow base; widening is re-derived from offsets.
fn normalize_branch(instruction: Instruction) -> Instruction {
    match instruction {
        Instruction::Goto_w(target) => Instruction::Goto(target),
        Instruction::Jsr_w(target) => Instruction::Jsr(target),
        other => other,
    }
}

/// The switch payload shape carried by a block's switch edges: `Some((low, high))` for a
/// tableswitch, `None` for a lookupswitch.
fn switch_shape(
    switches: &[&Edge],
    verifier: &mut Verifier,
    label: Label,
) -> Option<(i32, i32)> {
    for edge in switches {
        match &edge.instruction {
            Some(Instruction::Tableswitch(table)) => return Some((table.low, table.high)),
            Some(Instruction::Lookupswitch(_)) => return None,
            _ => {}
        }
    }
    verifier.report(
        VerifyErrorKind::InvalidEdge,
        ErrorSource::Block(label),
        "switch edges carry no switch instruction",
    );
    None
}

/// Phase 2: iterate offsets until no branch needs widening.
fn fix_offsets(
    plan: &mut [PlanItem],
    spans: &mut [Span],
    verifier: &mut Verifier,
) -> Result<Vec<u32>> {
    let mut offsets = vec![0u32; plan.len()];
    loop {
        let mut offset = 0u32;
        for (position, item) in plan.iter().enumerate() {
            offsets[position] = offset;
            offset += item_size(item, offset);
        }
        for span in spans.iter_mut() {
            span.start = span_offset(span.item_start, &offsets, offset);
            span.end = span_offset(span.item_end, &offsets, offset);
        }

        let starts = block_starts(spans);
        let mut widened = false;
        for (position, item) in plan.iter_mut().enumerate() {
            let PlanInsn::Branch {
                target,
                wide: wide @ false,
                ..
            } = &mut item.insn
            else {
                continue;
            };
            let Some(resolved) = nearest_start(&starts, *target, offsets[position]) else {
                verifier.report(
                    VerifyErrorKind::InvalidEdge,
                    ErrorSource::Block(item.block),
                    format!("branch target block {target} was never laid out"),
                );
                continue;
            };
            let displacement = i64::from(resolved) - i64::from(offsets[position]);
            if i16::try_from(displacement).is_err() {
                *wide = true;
                widened = true;
            }
        }
        if !widened {
            return Ok(offsets);
        }
    }
}

fn span_offset(item_index: usize, offsets: &[u32], code_end: u32) -> u32 {
    offsets.get(item_index).copied().unwrap_or(code_end)
}

fn item_size(item: &PlanItem, offset: u32) -> u32 {
    match &item.insn {
        PlanInsn::Fixed(instruction) => instruction.size(offset),
        PlanInsn::Branch {
            instruction, wide, ..
        } => match (instruction.is_conditional_branch(), wide) {
            (_, false) => 3,
            (true, true) => 8,
            (false, true) => 5,
        },
        PlanInsn::Switch { table, targets } => {
            let padding = (4 - ((offset + 1) % 4)) % 4;
            let count = u32::try_from(targets.len().saturating_sub(1)).unwrap_or(u32::MAX);
            match table {
                Some((low, high)) => {
                    let span = u32::try_from(i64::from(*high) - i64::from(*low) + 1)
                        .unwrap_or(count);
                    1 + padding + 12 + 4 * span
                }
                None => 1 + padding + 8 + 8 * count,
            }
        }
    }
}

/// Every laid-out start offset of every block copy.
fn block_starts(spans: &[Span]) -> AHashMap<Label, Vec<u32>> {
    let mut starts: AHashMap<Label, Vec<u32>> = AHashMap::new();
    for span in spans {
        starts.entry(span.label).or_default().push(span.start);
    }
    starts
}

/// The copy of `target` closest to a referencing offset.
fn nearest_start(
    starts: &AHashMap<Label, Vec<u32>>,
    target: Label,
    from: u32,
) -> Option<u32> {
    starts.get(&target)?.iter().copied().min_by_key(|start| {
        i64::from(*start).abs_diff(i64::from(from))
    })
}

type NewSites = AHashMap<(Label, usize), u32>;

/// Emit the plan into a concrete instruction stream with resolved targets.
fn emit(
    plan: &[PlanItem],
    offsets: &[u32],
    spans: &[Span],
    verifier: &mut Verifier,
) -> Result<(Vec<(u32, Instruction)>, NewSites)> {
    let starts = block_starts(spans);
    let mut code: Vec<(u32, Instruction)> = Vec::new();
    let mut new_sites: NewSites = AHashMap::new();

    for (position, item) in plan.iter().enumerate() {
        let offset = offsets[position];
        match &item.insn {
            PlanInsn::Fixed(instruction) => {
                if let (Some(index), Instruction::New(_)) = (item.index, instruction) {
                    new_sites.entry((item.block, index)).or_insert(offset);
                }
                code.push((offset, instruction.clone()));
            }
            PlanInsn::Branch {
                instruction,
                target,
                wide,
            } => {
                let Some(resolved) = nearest_start(&starts, *target, offset) else {
                    continue;
                };
                if *wide {
                    if instruction.is_conditional_branch() {
                        let inverted = instruction
                            .invert_condition()
                            .unwrap_or_else(|| instruction.clone());
                        let mut skip = inverted;
                        skip.set_jump_target(offset + 8);
                        code.push((offset, skip));
                        code.push((offset + 3, Instruction::Goto_w(resolved)));
                    } else if matches!(instruction, Instruction::Jsr(_)) {
                        code.push((offset, Instruction::Jsr_w(resolved)));
                    } else {
                        code.push((offset, Instruction::Goto_w(resolved)));
                    }
                } else {
                    let mut narrow = instruction.clone();
                    narrow.set_jump_target(resolved);
                    code.push((offset, narrow));
                }
            }
            PlanInsn::Switch { table, targets } => {
                let default = targets
                    .iter()
                    .find(|(value, _)| value.is_none())
                    .and_then(|(_, label)| nearest_start(&starts, *label, offset));
                let Some(default) = default else {
                    verifier.report(
                        VerifyErrorKind::InvalidEdge,
                        ErrorSource::Block(item.block),
                        "switch has no default edge",
                    );
                    continue;
                };
                let instruction = match table {
                    Some((low, high)) => {
                        let mut cases: Vec<u32> = Vec::new();
                        for value in *low..=*high {
                            let target = targets
                                .iter()
                                .find(|(case, _)| *case == Some(value))
                                .and_then(|(_, label)| nearest_start(&starts, *label, offset));
                            match target {
                                Some(target) => cases.push(target),
                                None => {
                                    verifier.report(
                                        VerifyErrorKind::InvalidEdge,
                                        ErrorSource::Block(item.block),
                                        format!("tableswitch case {value} has no edge"),
                                    );
                                    cases.push(default);
                                }
                            }
                        }
                        Instruction::Tableswitch(TableSwitch {
                            default,
                            low: *low,
                            high: *high,
                            offsets: cases,
                        })
                    }
                    None => {
                        let mut pairs: Vec<(i32, u32)> = targets
                            .iter()
                            .filter_map(|(value, label)| {
                                let value = (*value)?;
                                let target = nearest_start(&starts, *label, offset)?;
                                Some((value, target))
                            })
                            .collect();
                        pairs.sort_unstable_by_key(|(value, _)| *value);
                        Instruction::Lookupswitch(LookupSwitch {
                            default,
                            pairs: pairs.into_iter().collect::<IndexMap<i32, u32>>(),
                        })
                    }
                };
                code.push((offset, instruction));
            }
        }
    }
    Ok((code, new_sites))
}

/// Phase 3: the exception table, rows sorted by edge priority, adjacent identical rows merged.
fn build_exception_table(
    graph: &InsnGraph,
    spans: &[Span],
    constant_pool: &mut ConstantPool,
    verifier: &mut Verifier,
) -> Result<Vec<ExceptionTableEntry>> {
    let mut exception_edges: Vec<&Edge> = graph
        .edges()
        .filter(|edge| matches!(edge.kind, EdgeKind::Exception { .. }))
        .collect();
    exception_edges.sort_by_key(|edge| match edge.kind {
        EdgeKind::Exception { priority, .. } => priority,
        _ => u16::MAX,
    });

    let mut table: Vec<ExceptionTableEntry> = Vec::new();
    for edge in exception_edges {
        let EdgeKind::Exception {
            inline_coverage, ..
        } = edge.kind
        else {
            continue;
        };
        let Some(handler_label) = edge.to else {
            continue;
        };
        let Some(handler) = primary_start(spans, handler_label) else {
            verifier.report(
                VerifyErrorKind::InvalidEdge,
                ErrorSource::Edge {
                    from: edge.from,
                    to: edge.to,
                },
                "exception handler block was never laid out",
            );
            continue;
        };
        let catch_type = match &edge.throwable {
            Some(name) => constant_pool.add_class(name)?,
            None => 0,
        };

        for (position, span) in spans.iter().enumerate() {
            if span.label != edge.from {
                continue;
            }
            let mut end = span.end;
            if inline_coverage {
                // Extend over splices that this block (transitively) pulled in behind it.
                let mut cursor = position + 1;
                while let Some(next) = spans.get(cursor) {
                    if next.start == end && next.parent.is_some() {
                        end = next.end;
                        cursor += 1;
                    } else {
                        break;
                    }
                }
            }
            if span.start >= end {
                continue;
            }
            let entry = ExceptionTableEntry {
                range_pc: u16::try_from(span.start)?..u16::try_from(end)?,
                handler_pc: u16::try_from(handler)?,
                catch_type,
            };
            // Coalesce with an adjacent identical-handler row.
            if let Some(last) = table.last_mut() {
                if last.handler_pc == entry.handler_pc
                    && last.catch_type == entry.catch_type
                    && last.range_pc.end == entry.range_pc.start
                {
                    last.range_pc.end = entry.range_pc.end;
                    continue;
                }
            }
            table.push(entry);
        }
    }
    Ok(table)
}

fn primary_start(spans: &[Span], label: Label) -> Option<u32> {
    spans
        .iter()
        .find(|span| span.label == label && span.parent.is_none())
        .or_else(|| spans.iter().find(|span| span.label == label))
        .map(|span| span.start)
}

/// A point in the laid-out code that needs an explicit stack map frame: the start of a block
/// that is a branch, switch or handler target, or that control cannot fall into.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FramePoint {
    pub label: Label,
    pub offset: u32,
}

/// Whether the plan item physically before `item_start` lets control fall into it.
fn falls_into(plan: &[PlanItem], item_start: usize) -> bool {
    if item_start == 0 {
        return true;
    }
    match &plan[item_start - 1].insn {
        PlanInsn::Fixed(instruction) => {
            !(instruction.is_return()
                || instruction.is_ret()
                || matches!(instruction, Instruction::Athrow))
        }
        PlanInsn::Branch { instruction, .. } => instruction.is_conditional_branch(),
        PlanInsn::Switch { .. } => false,
    }
}

/// The offsets that need explicit frames, in ascending order.
fn frame_points(graph: &InsnGraph, plan: &[PlanItem], spans: &[Span]) -> Vec<FramePoint> {
    let mut targets: Vec<Label> = Vec::new();
    for edge in graph.edges() {
        let targeted = matches!(
            edge.kind,
            EdgeKind::Jump | EdgeKind::Switch { .. } | EdgeKind::Exception { .. }
        );
        if targeted {
            if let Some(to) = edge.to {
                if to >= 0 && !targets.contains(&to) {
                    targets.push(to);
                }
            }
        }
    }

    let mut points: Vec<FramePoint> = Vec::new();
    let mut push = |label: Label, offset: u32| {
        if offset != 0 && !points.iter().any(|point| point.offset == offset) {
            points.push(FramePoint { label, offset });
        }
    };
    for span in spans {
        if span.parent.is_none() && targets.contains(&span.label) {
            push(span.label, span.start);
        }
        if !falls_into(plan, span.item_start) {
            push(span.label, span.start);
        }
    }
    points.sort_unstable_by_key(|point| point.offset);
    points
}
