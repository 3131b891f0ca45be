//! Linear bytecode to control flow graph.
//!
//! Disassembly runs in three passes: boundary discovery (jump and switch targets, exception
//! handler starts and range bounds), block splitting in offset order, and typed edge emission
//! as each terminator is consumed. Obfuscated input is preserved rather than rejected: a jump
//! whose target is not an instruction boundary keeps its raw instruction in the block, gains a
//! synthetic fallthrough to the numerically next block, and is reported as a diagnostic.

use crate::attributes::{
    Attribute, ExceptionTableEntry, Instruction, LookupSwitch, TableSwitch,
};
use crate::constant_pool::ConstantPool;
use crate::error::Result;
use crate::graph::{BasicBlock, Edge, InsnGraph, Label};
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};
use ahash::AHashSet;
use indexmap::IndexMap;
use std::collections::BTreeMap;

impl InsnGraph {
    /// Disassemble a `Code` attribute into a graph.
    ///
    /// # Errors
    ///
    /// Returns an error if `attribute` is not a `Code` attribute.
    pub fn disassemble_code(
        attribute: &Attribute,
        constant_pool: &ConstantPool,
        verifier: &mut Verifier,
    ) -> Result<InsnGraph> {
        let Attribute::Code {
            code,
            exception_table,
            ..
        } = attribute
        else {
            return Err(crate::error::Error::Io(
                "not a Code attribute".to_string(),
            ));
        };
        Self::disassemble(code, exception_table, constant_pool, verifier)
    }

    /// Disassemble an instruction stream and exception table into a graph.
    ///
    /// # Errors
    ///
    /// Returns an error on structural failures (duplicate terminator edges); recoverable
    /// anomalies are reported to `verifier` instead.
    pub fn disassemble(
        code: &[(u32, Instruction)],
        exception_table: &[ExceptionTableEntry],
        constant_pool: &ConstantPool,
        verifier: &mut Verifier,
    ) -> Result<InsnGraph> {
        let mut graph = InsnGraph::new();
        if code.is_empty() {
            return Ok(graph);
        }

        let valid_starts: AHashSet<u32> = code.iter().map(|(offset, _)| *offset).collect();
        let first_offset = code[0].0;

        // Pass 1: boundary discovery.
        let mut edge_targets: AHashSet<u32> = AHashSet::new();
        let mut boundaries: AHashSet<u32> = AHashSet::new();
        for (offset, instruction) in code {
            if let Some(target) = instruction.jump_target() {
                edge_targets.insert(target);
            }
            match instruction {
                Instruction::Tableswitch(table) => {
                    edge_targets.insert(table.default);
                    edge_targets.extend(table.offsets.iter().copied());
                }
                Instruction::Lookupswitch(lookup) => {
                    edge_targets.insert(lookup.default);
                    edge_targets.extend(lookup.pairs.values().copied());
                }
                _ => {}
            }
            if instruction.is_terminator() {
                boundaries.insert(offset + instruction.size(*offset));
            }
        }
        for entry in exception_table {
            edge_targets.insert(u32::from(entry.handler_pc));
            boundaries.insert(u32::from(entry.range_pc.start));
            boundaries.insert(u32::from(entry.range_pc.end));
        }
        boundaries.extend(edge_targets.iter().copied());

        // Pass 2: block splitting. A synthetic empty entry block keeps the entry free of
        // incoming edges when the first instruction is itself a jump or handler target.
        let synthetic_entry = edge_targets.contains(&first_offset);
        let mut starts: Vec<u32> = boundaries
            .iter()
            .copied()
            .filter(|offset| valid_starts.contains(offset))
            .collect();
        if !starts.contains(&first_offset) {
            starts.push(first_offset);
        }
        starts.sort_unstable();

        let mut offset_to_label: BTreeMap<u32, Label> = BTreeMap::new();
        if synthetic_entry {
            let entry = graph.new_block();
            debug_assert_eq!(0, entry);
        }
        for start in &starts {
            let label = graph.new_block();
            offset_to_label.insert(*start, label);
        }
        if synthetic_entry {
            graph.connect(Edge::fallthrough(0, offset_to_label[&first_offset]))?;
        }
        graph.set_entry(0);

        // Pass 3: fill blocks and emit edges.
        let mut current = offset_to_label[&first_offset];
        let mut terminated = true;
        for (index, (offset, instruction)) in code.iter().enumerate() {
            if let Some(&label) = offset_to_label.get(offset) {
                if label != current {
                    if !terminated {
                        graph.connect(Edge::fallthrough(current, label))?;
                    }
                    current = label;
                }
            }
            terminated = false;

            let next_offset = offset + instruction.size(*offset);
            let next_label = offset_to_label.get(&next_offset).copied();

            if instruction.is_return() {
                graph.connect(Edge::returning(current, instruction.clone()))?;
                terminated = true;
            } else if matches!(instruction, Instruction::Athrow) {
                graph.connect(Edge::rethrowing(current))?;
                terminated = true;
            } else if instruction.is_ret() {
                graph.connect(Edge::ret(current, instruction.clone()))?;
                terminated = true;
            } else if instruction.is_jsr() {
                let target = instruction.jump_target().unwrap_or_default();
                match (offset_to_label.get(&target), next_label) {
                    (Some(&target_label), Some(fallthrough_label)) => {
                        let mut carried = instruction.clone();
                        carried.set_jump_target(0);
                        graph.connect(Edge::jsr_jump(current, target_label, carried))?;
                        graph.connect(Edge::jsr_fallthrough(current, fallthrough_label))?;
                        if let Some(block) = graph.block_mut(fallthrough_label) {
                            block.inline = true;
                        }
                        terminated = true;
                    }
                    _ => {
                        verifier.report(
                            VerifyErrorKind::InvalidEdge,
                            ErrorSource::Instruction {
                                block: current,
                                index,
                            },
                            format!("jsr target {target} is not an instruction boundary"),
                        );
                        push_raw(&mut graph, current, instruction.clone());
                    }
                }
            } else if instruction.is_branch() {
                let target = instruction.jump_target().unwrap_or_default();
                match offset_to_label.get(&target) {
                    Some(&target_label) => {
                        let mut carried = instruction.clone();
                        carried.set_jump_target(0);
                        graph.connect(Edge::jump(current, target_label, carried))?;
                        if instruction.is_conditional_branch() {
                            match next_label {
                                Some(fallthrough_label) => {
                                    graph.connect(Edge::fallthrough(
                                        current,
                                        fallthrough_label,
                                    ))?;
                                }
                                None => verifier.report(
                                    VerifyErrorKind::InvalidBlock,
                                    ErrorSource::Block(current),
                                    "conditional branch falls off the end of the code",
                                ),
                            }
                        }
                        terminated = true;
                    }
                    None => {
                        // Unbound jump: keep the raw instruction and fall through.
                        verifier.report(
                            VerifyErrorKind::InvalidEdge,
                            ErrorSource::Instruction {
                                block: current,
                                index,
                            },
                            format!("jump target {target} is not an instruction boundary"),
                        );
                        push_raw(&mut graph, current, instruction.clone());
                    }
                }
            } else if instruction.is_switch() {
                emit_switch_edges(
                    &mut graph,
                    current,
                    index,
                    instruction,
                    &offset_to_label,
                    verifier,
                )?;
                terminated = true;
            } else {
                push_raw(&mut graph, current, instruction.clone());
            }
        }
        if !terminated {
            verifier.report(
                VerifyErrorKind::InvalidBlock,
                ErrorSource::Block(current),
                "code falls off the end of the method",
            );
        }

        // Exception edges, one priority per table row.
        for (row, entry) in exception_table.iter().enumerate() {
            let handler_offset = u32::from(entry.handler_pc);
            let Some(&handler_label) = offset_to_label.get(&handler_offset) else {
                verifier.report(
                    VerifyErrorKind::InvalidEdge,
                    ErrorSource::None,
                    format!("exception handler offset {handler_offset} is not a block start"),
                );
                continue;
            };
            let throwable = if entry.catch_type == 0 {
                None
            } else {
                match constant_pool.get(entry.catch_type).class_name() {
                    Some(name) => Some(name.to_string()),
                    None => {
                        verifier.report(
                            VerifyErrorKind::InvalidType,
                            ErrorSource::None,
                            format!(
                                "catch type #{} does not resolve to a class",
                                entry.catch_type
                            ),
                        );
                        None
                    }
                }
            };
            let priority = u16::try_from(row)?;
            let start = u32::from(entry.range_pc.start);
            let end = u32::from(entry.range_pc.end);
            let covered: Vec<Label> = offset_to_label
                .range(start..end)
                .map(|(_, &label)| label)
                .collect();
            for label in covered {
                graph.connect(Edge::exception(
                    label,
                    handler_label,
                    priority,
                    throwable.clone(),
                ))?;
            }
        }

        // A trailing empty block nothing reaches is layout residue, not control flow.
        if let Some(last) = graph.labels().last() {
            let lonely = graph
                .block(last)
                .is_some_and(BasicBlock::is_empty)
                && graph.successors(last).is_empty()
                && graph.predecessors(last).is_empty();
            if lonely && last != graph.entry() {
                graph.remove_block(last);
            }
        }

        Ok(graph)
    }
}

fn push_raw(graph: &mut InsnGraph, label: Label, instruction: Instruction) {
    if let Some(block) = graph.block_mut(label) {
        block.push(instruction);
    }
}

fn emit_switch_edges(
    graph: &mut InsnGraph,
    current: Label,
    index: usize,
    instruction: &Instruction,
    offset_to_label: &BTreeMap<u32, Label>,
    verifier: &mut Verifier,
) -> Result<()> {
    let mut bind = |graph: &mut InsnGraph,
                    target: u32,
                    value: Option<i32>,
                    carried: &Instruction|
     -> Result<()> {
        match offset_to_label.get(&target) {
            Some(&target_label) => {
                graph.connect(Edge::switch(
                    current,
                    target_label,
                    carried.clone(),
                    value,
                ))?;
            }
            None => verifier.report(
                VerifyErrorKind::InvalidEdge,
                ErrorSource::Instruction {
                    block: current,
                    index,
                },
                format!("switch target {target} is not an instruction boundary"),
            ),
        }
        Ok(())
    };

    match instruction {
        Instruction::Tableswitch(table) => {
            let carried = Instruction::Tableswitch(TableSwitch {
                default: 0,
                low: table.low,
                high: table.high,
                offsets: Vec::new(),
            });
            for (case, target) in table.offsets.iter().enumerate() {
                let value = table.low.wrapping_add(i32::try_from(case)?);
                bind(graph, *target, Some(value), &carried)?;
            }
            bind(graph, table.default, None, &carried)?;
        }
        Instruction::Lookupswitch(lookup) => {
            let carried = Instruction::Lookupswitch(LookupSwitch {
                default: 0,
                pairs: IndexMap::new(),
            });
            for (value, target) in &lookup.pairs {
                bind(graph, *target, Some(*value), &carried)?;
            }
            bind(graph, lookup.default, None, &carried)?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::{EdgeKind, RETHROW_LABEL, RETURN_LABEL};

    fn disassemble(code: Vec<(u32, Instruction)>) -> (InsnGraph, Verifier) {
        let constant_pool = ConstantPool::new();
        let mut verifier = Verifier::new();
        let graph = InsnGraph::disassemble(&code, &[], &constant_pool, &mut verifier)
            .expect("disassembly failed");
        (graph, verifier)
    }

    #[test]
    fn test_empty_method() {
        let (graph, verifier) = disassemble(vec![(0, Instruction::Return)]);
        assert!(verifier.is_empty());
        assert_eq!(1, graph.len());
        let edges = graph.successors(graph.entry());
        assert_eq!(1, edges.len());
        assert_eq!(Some(RETURN_LABEL), edges[0].to);
        assert_eq!(Some(Instruction::Return), edges[0].instruction.clone());
    }

    #[test]
    fn test_straight_line() {
        let (graph, verifier) = disassemble(vec![
            (0, Instruction::Iload_0),
            (1, Instruction::Iload_1),
            (2, Instruction::Iadd),
            (3, Instruction::Ireturn),
        ]);
        assert!(verifier.is_empty());
        assert_eq!(1, graph.len());
        let block = graph.block(graph.entry()).expect("entry block");
        assert_eq!(3, block.instructions.len());
        assert!(graph.successors(graph.entry())[0].is_leaf());
    }

    #[test]
    fn test_conditional_creates_jump_and_fallthrough() {
        // 0: iload_0; 1: ifeq 6; 4: iconst_1; 5: ireturn; 6: iconst_0; 7: ireturn
        let (graph, verifier) = disassemble(vec![
            (0, Instruction::Iload_0),
            (1, Instruction::Ifeq(6)),
            (4, Instruction::Iconst_1),
            (5, Instruction::Ireturn),
            (6, Instruction::Iconst_0),
            (7, Instruction::Ireturn),
        ]);
        assert!(verifier.is_empty());
        assert_eq!(3, graph.len());

        let entry_edges = graph.successors(graph.entry());
        assert_eq!(2, entry_edges.len());
        let jump = entry_edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::Jump)
            .expect("jump edge");
        // Operand offsets are cleared once the edge binds.
        assert_eq!(Some(Instruction::Ifeq(0)), jump.instruction.clone());
        assert!(entry_edges.iter().any(|edge| edge.kind == EdgeKind::Fallthrough));
    }

    #[test]
    fn test_athrow_reaches_rethrow_block() {
        let (graph, _) = disassemble(vec![
            (0, Instruction::Aconst_null),
            (1, Instruction::Athrow),
        ]);
        let edges = graph.successors(graph.entry());
        assert_eq!(Some(RETHROW_LABEL), edges[0].to);
    }

    #[test]
    fn test_backward_jump_to_entry_gets_synthetic_entry() {
        // 0: nop; 1: goto 0 — offset 0 is a jump target, so a synthetic entry protects the
        // entry-has-no-incoming-edges invariant.
        let (graph, verifier) = disassemble(vec![
            (0, Instruction::Nop),
            (1, Instruction::Goto(0)),
        ]);
        assert!(verifier.is_empty());
        assert_eq!(2, graph.len());
        assert!(graph.predecessors(graph.entry()).is_empty());
        assert!(graph.block(graph.entry()).expect("entry").is_empty());
    }

    #[test]
    fn test_jsr_marks_inline_and_pairs_edges() {
        // 0: jsr 4; 3: return; 4: astore_1; 5: ret 1
        let (graph, verifier) = disassemble(vec![
            (0, Instruction::Jsr(4)),
            (3, Instruction::Return),
            (4, Instruction::Astore_1),
            (5, Instruction::Ret(1)),
        ]);
        assert!(verifier.is_empty());

        let entry_edges = graph.successors(graph.entry());
        let jsr_jump = entry_edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::JsrJump)
            .expect("jsr jump edge");
        let jsr_fallthrough = entry_edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::JsrFallthrough)
            .expect("jsr fallthrough edge");
        let continuation = jsr_fallthrough.to.expect("fallthrough target");
        assert!(graph.block(continuation).expect("block").inline);

        let subroutine = jsr_jump.to.expect("subroutine");
        let ret_edges = graph.successors(subroutine);
        assert_eq!(1, ret_edges.len());
        assert!(ret_edges[0].is_opaque());
        assert_eq!(1, graph.opaque_edges().count());
    }

    #[test]
    fn test_tableswitch_edges() {
        // 0: iload_0; 1: tableswitch [0..2] -> 28, 30, 32, default -> 34 (offsets contrived
        // but valid block starts); all targets return.
        let table = TableSwitch {
            default: 34,
            low: 0,
            high: 2,
            offsets: vec![28, 30, 32],
        };
        let (graph, verifier) = disassemble(vec![
            (0, Instruction::Iload_0),
            (1, Instruction::Tableswitch(table)),
            (28, Instruction::Ireturn),
            (30, Instruction::Ireturn),
            (32, Instruction::Ireturn),
            (34, Instruction::Ireturn),
        ]);
        assert!(verifier.is_empty());

        let edges = graph.successors(graph.entry());
        assert_eq!(4, edges.len());
        let values: Vec<Option<i32>> = edges
            .iter()
            .filter_map(|edge| match edge.kind {
                EdgeKind::Switch { value } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(vec![Some(0), Some(1), Some(2), None], values);
    }

    #[test]
    fn test_unbound_goto_keeps_raw_instruction() {
        // goto targets offset 40 which is past the end of the code
        let (graph, verifier) = disassemble(vec![
            (0, Instruction::Goto(40)),
            (3, Instruction::Return),
        ]);
        assert_eq!(1, verifier.len());
        assert_eq!(VerifyErrorKind::InvalidEdge, verifier.errors()[0].kind);

        let entry = graph.block(graph.entry()).expect("entry block");
        assert_eq!(vec![Instruction::Goto(40)], entry.instructions);
        let edges = graph.successors(graph.entry());
        assert_eq!(1, edges.len());
        assert_eq!(EdgeKind::Fallthrough, edges[0].kind);
    }

    #[test]
    fn test_exception_edges_by_priority() {
        let constant_pool = ConstantPool::new();
        let mut verifier = Verifier::new();
        let code = vec![
            (0, Instruction::Nop),
            (1, Instruction::Return),
            (2, Instruction::Aconst_null),
            (3, Instruction::Athrow),
        ];
        let exception_table = vec![ExceptionTableEntry {
            range_pc: 0..2,
            handler_pc: 2,
            catch_type: 0,
        }];
        let graph =
            InsnGraph::disassemble(&code, &exception_table, &constant_pool, &mut verifier)
                .expect("disassembly failed");
        assert!(verifier.is_empty());

        let exception_edges: Vec<&Edge> = graph
            .successors(graph.entry())
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::Exception { .. }))
            .collect();
        assert_eq!(1, exception_edges.len());
        assert_eq!(
            EdgeKind::Exception {
                priority: 0,
                inline_coverage: false
            },
            exception_edges[0].kind
        );
        assert_eq!(None, exception_edges[0].throwable);
    }

    #[test]
    fn test_every_jump_has_exactly_one_edge() {
        // Loop with a conditional exit: every branch instruction maps to one jump edge.
        let code = vec![
            (0, Instruction::Iconst_0),
            (1, Instruction::Istore_0),
            (2, Instruction::Iload_0),
            (3, Instruction::Ifge(9)),
            (6, Instruction::Goto(2)),
            (9, Instruction::Return),
        ];
        let (graph, verifier) = disassemble(code);
        assert!(verifier.is_empty());
        let jump_edges = graph
            .edges()
            .filter(|edge| edge.kind == EdgeKind::Jump)
            .count();
        assert_eq!(2, jump_edges);
    }
}
