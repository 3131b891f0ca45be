//! Abstract interpretation over the instruction graph.
//!
//! The trace walks the graph with an iterative depth-first search — recursion depth is bounded
//! by an explicit stack, not the host call stack, because obfuscated methods nest arbitrarily
//! deep. Each block visit simulates the block's instructions on a cloned frame, runs the
//! terminator edge's instruction once, and records an `(entry, exit)` constraint pair.
//!
//! Revisits are pruned by constraint memoization: a recorded constraint matches when the
//! stacks agree slot for slot and the locals the block actually reads before overwriting
//! (plus any locals still carrying return addresses) agree under entry equality. A revisit of
//! a block still on the traversal path is a back edge.

use crate::analysis::execute::step;
use crate::analysis::frame::{Access, Frame, FrozenState, MethodContext, Source};
use crate::analysis::{ClassHierarchy, FrameType};
use crate::attributes::Instruction;
use crate::constant_pool::ConstantPool;
use crate::error::Result;
use crate::graph::{Edge, EdgeKind, InsnGraph, Label, RETHROW_LABEL, RETURN_LABEL};
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};
use ahash::{AHashMap, AHashSet};
use tracing::debug;

/// Revisit budget per block; exceeded only by code whose frames never stabilize.
const MAX_VISITS: usize = 64;

/// Options controlling a trace.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceOptions {
    /// Record a frozen state after every instruction, not just block exits.
    pub exact: bool,
}

/// One `(entry, exit)` constraint observed for a block.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub entry: FrozenState,
    pub exit: FrozenState,
    /// Locals the block read before overwriting during this computation.
    pub reads: Vec<u16>,
}

/// A resolved subroutine: the `ret` in `ret_block` returns from the `jsr` in `jsr_block` to
/// `exit_block`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subroutine {
    pub ret_block: Label,
    pub jsr_block: Label,
    pub exit_block: Label,
}

/// The result of tracing a method.
#[derive(Debug, Default)]
pub struct Trace {
    /// Per-block constraints; a block is reachable iff it has at least one.
    pub constraints: AHashMap<Label, Vec<Constraint>>,
    /// Per-instruction snapshots of the latest visit, when `exact` was requested.
    pub exact_states: AHashMap<Label, Vec<FrozenState>>,
    pub max_stack: usize,
    pub max_locals: usize,
    /// Edges that re-enter a block on the current traversal path.
    pub back_edges: Vec<Edge>,
    /// Edges into the return and rethrow pseudo blocks that were actually reached.
    pub leaf_edges: Vec<Edge>,
    pub subroutines: Vec<Subroutine>,
    /// The local accesses recorded for each block's most recent computation.
    pub block_accesses: AHashMap<Label, Vec<Access>>,
}

impl Trace {
    /// `true` when the block was reached by any path.
    #[must_use]
    pub fn reached(&self, label: Label) -> bool {
        self.constraints.contains_key(&label)
    }

    /// The entry states recorded for a block.
    #[must_use]
    pub fn entry_states(&self, label: Label) -> Vec<&FrozenState> {
        self.constraints
            .get(&label)
            .map(|constraints| constraints.iter().map(|c| &c.entry).collect())
            .unwrap_or_default()
    }

    /// `true` when any reached block keeps a live `jsr`/`ret` edge.
    #[must_use]
    pub fn uses_subroutines(&self) -> bool {
        !self.subroutines.is_empty()
    }

    /// Trace `graph` for `method`.
    ///
    /// Assignability questions — a handler's declared catch type must extend
    /// `java/lang/Throwable` — are answered by `hierarchy`; pass
    /// [`PermissiveHierarchy`](crate::analysis::PermissiveHierarchy) when no classpath is
    /// available.
    ///
    /// Diagnostics degrade rather than abort: the trace completes even for broken methods and
    /// reports what it found to `verifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the method descriptor is malformed.
    pub fn run<H: ClassHierarchy>(
        graph: &InsnGraph,
        method: &MethodContext,
        constant_pool: &ConstantPool,
        hierarchy: &H,
        options: TraceOptions,
        verifier: &mut Verifier,
    ) -> Result<Trace> {
        let mut trace = Trace::default();
        if graph.is_empty() {
            return Ok(trace);
        }
        validate_structure(graph, verifier);

        let initial = Frame::initial(method)?;
        trace.max_locals = initial.max_locals;
        debug!(
            entry = graph.entry(),
            blocks = graph.len(),
            "tracing {}.{}{}",
            method.class_name,
            method.name,
            method.descriptor
        );

        enum Task {
            Enter {
                target: Label,
                edge: Option<Edge>,
                frame: Frame,
            },
            Leave(Label),
        }

        let mut work = vec![Task::Enter {
            target: graph.entry(),
            edge: None,
            frame: initial,
        }];
        let mut on_path: AHashSet<Label> = AHashSet::new();
        let mut visits: AHashMap<Label, usize> = AHashMap::new();

        while let Some(task) = work.pop() {
            let (target, edge_in, frame) = match task {
                Task::Leave(label) => {
                    on_path.remove(&label);
                    continue;
                }
                Task::Enter {
                    target,
                    edge,
                    frame,
                } => (target, edge, frame),
            };

            if target == RETURN_LABEL || target == RETHROW_LABEL {
                if let Some(edge) = edge_in {
                    if !trace.leaf_edges.contains(&edge) {
                        trace.leaf_edges.push(edge);
                    }
                }
                continue;
            }
            let Some(block) = graph.block(target) else {
                verifier.report(
                    VerifyErrorKind::InvalidEdge,
                    ErrorSource::Block(target),
                    "edge leads to a block that does not exist",
                );
                continue;
            };

            if on_path.contains(&target) {
                if let Some(edge) = &edge_in {
                    if !trace.back_edges.contains(edge) {
                        trace.back_edges.push(edge.clone());
                    }
                }
            }

            let entry_state = frame.freeze();
            if let Some(constraints) = trace.constraints.get(&target) {
                if constraints
                    .iter()
                    .any(|constraint| constraint_matches(constraint, &entry_state))
                {
                    continue;
                }
            }
            let visit_count = visits.entry(target).or_insert(0);
            *visit_count += 1;
            if *visit_count > MAX_VISITS {
                verifier.report(
                    VerifyErrorKind::InvalidBlock,
                    ErrorSource::Block(target),
                    "frames at this block never stabilize",
                );
                continue;
            }

            // Simulate the block.
            let mut state = frame.clone();
            let access_mark = state.accesses().len();
            let mut snapshots = Vec::new();
            for (index, instruction) in block.instructions.iter().enumerate() {
                step(instruction, target, index, &mut state, constant_pool, verifier);
                if options.exact {
                    snapshots.push(state.freeze());
                }
            }

            let edges = graph.successors(target);
            if let Some(instruction) = terminator_instruction(edges) {
                step(
                    &instruction,
                    target,
                    block.instructions.len(),
                    &mut state,
                    constant_pool,
                    verifier,
                );
                if options.exact {
                    snapshots.push(state.freeze());
                }
            }
            if options.exact {
                trace.exact_states.insert(target, snapshots);
            }

            let block_accesses: Vec<Access> = state.accesses()[access_mark..].to_vec();
            let reads = reads_before_writes(&block_accesses);
            trace.block_accesses.insert(target, block_accesses);
            trace.max_stack = trace.max_stack.max(state.max_stack);
            trace.max_locals = trace.max_locals.max(state.max_locals);
            trace.constraints.entry(target).or_default().push(Constraint {
                entry: entry_state,
                exit: state.freeze(),
                reads,
            });

            on_path.insert(target);
            work.push(Task::Leave(target));

            for edge in edges {
                match &edge.kind {
                    EdgeKind::JsrFallthrough => {
                        // Entered only when the subroutine returns.
                    }
                    EdgeKind::Ret => {
                        if let Some((subroutine, continuation)) =
                            resolve_ret(graph, edge, &state, verifier)
                        {
                            let exit = subroutine.exit_block;
                            if !trace.subroutines.contains(&subroutine) {
                                trace.subroutines.push(subroutine);
                            }
                            work.push(Task::Enter {
                                target: exit,
                                edge: Some(continuation),
                                frame: state.clone(),
                            });
                        }
                    }
                    EdgeKind::Exception { .. } => {
                        let handler = handler_frame(&frame, edge, hierarchy, verifier);
                        if let Some(to) = edge.to {
                            work.push(Task::Enter {
                                target: to,
                                edge: Some(edge.clone()),
                                frame: handler,
                            });
                        }
                    }
                    _ => {
                        if let Some(to) = edge.to {
                            work.push(Task::Enter {
                                target: to,
                                edge: Some(edge.clone()),
                                frame: state.clone(),
                            });
                        }
                    }
                }
            }
        }

        // Every opaque edge must be resolved by now or reported.
        for edge in graph.opaque_edges() {
            let resolved = trace
                .subroutines
                .iter()
                .any(|subroutine| subroutine.ret_block == edge.from);
            if !resolved {
                verifier.report(
                    VerifyErrorKind::InvalidBlock,
                    ErrorSource::Edge {
                        from: edge.from,
                        to: None,
                    },
                    "ret edge was never resolved to a jsr continuation",
                );
            }
        }

        debug!(
            max_stack = trace.max_stack,
            max_locals = trace.max_locals,
            blocks = trace.constraints.len(),
            back_edges = trace.back_edges.len(),
            "trace complete"
        );
        Ok(trace)
    }
}

/// Resolve an opaque `ret` edge against the return address in the frame.
///
/// The return address entry's source names the block whose `jsr` created it; that block's
/// jsr-fallthrough edge gives the continuation. A multi-entry or multi-exit subroutine simply
/// yields several resolutions; a missing pair degrades to a diagnostic and a dead end.
fn resolve_ret(
    graph: &InsnGraph,
    edge: &Edge,
    state: &Frame,
    verifier: &mut Verifier,
) -> Option<(Subroutine, Edge)> {
    let error_source = ErrorSource::Edge {
        from: edge.from,
        to: None,
    };
    let Some(index) = edge.ret_index() else {
        verifier.report(
            VerifyErrorKind::InvalidEdge,
            error_source,
            "ret edge carries no ret instruction",
        );
        return None;
    };
    let Some(entry) = state.local(index) else {
        verifier.report(
            VerifyErrorKind::InvalidBlock,
            error_source,
            format!("local {index} holds no return address"),
        );
        return None;
    };
    if entry.ty != FrameType::ReturnAddress {
        verifier.report(
            VerifyErrorKind::InvalidBlock,
            error_source,
            format!("local {index} holds {} instead of a return address", entry.ty),
        );
        return None;
    }
    let Source::Instruction {
        block: jsr_block, ..
    } = entry.source
    else {
        verifier.report(
            VerifyErrorKind::InvalidBlock,
            error_source,
            "return address has no creating jsr",
        );
        return None;
    };
    let continuation = graph
        .successors(jsr_block)
        .iter()
        .find(|candidate| matches!(candidate.kind, EdgeKind::JsrFallthrough));
    match continuation {
        Some(continuation) => {
            let exit_block = continuation.to?;
            Some((
                Subroutine {
                    ret_block: edge.from,
                    jsr_block,
                    exit_block,
                },
                continuation.clone(),
            ))
        }
        None => {
            verifier.report(
                VerifyErrorKind::InvalidBlock,
                error_source,
                format!("block {jsr_block} has no jsr fallthrough to return to"),
            );
            None
        }
    }
}

fn reads_before_writes(accesses: &[Access]) -> Vec<u16> {
    let mut written: AHashSet<u16> = AHashSet::new();
    let mut reads = Vec::new();
    for access in accesses {
        if access.read {
            if !written.contains(&access.index) && !reads.contains(&access.index) {
                reads.push(access.index);
            }
        } else {
            written.insert(access.index);
        }
    }
    reads
}

/// Whether a recorded constraint covers a new entry state.
fn constraint_matches(constraint: &Constraint, current: &FrozenState) -> bool {
    if constraint.entry.stack.len() != current.stack.len() {
        return false;
    }
    if !constraint
        .entry
        .stack
        .iter()
        .zip(&current.stack)
        .all(|(recorded, incoming)| recorded.same_entry(incoming))
    {
        return false;
    }

    let mut relevant: Vec<u16> = constraint.reads.clone();
    let carries = |state: &FrozenState| {
        state
            .locals
            .iter()
            .filter(|(_, entry)| entry.ty == FrameType::ReturnAddress)
            .map(|(index, _)| *index)
            .collect::<Vec<u16>>()
    };
    for index in carries(&constraint.entry)
        .into_iter()
        .chain(carries(current))
    {
        if !relevant.contains(&index) {
            relevant.push(index);
        }
    }

    relevant.into_iter().all(|index| {
        match (
            constraint.entry.locals.get(&index),
            current.locals.get(&index),
        ) {
            (Some(recorded), Some(incoming)) => recorded.same_entry(incoming),
            (None, None) => true,
            _ => false,
        }
    })
}

/// The single instruction carried by a block's terminator edges, if any.
fn terminator_instruction(edges: &[Edge]) -> Option<Instruction> {
    // Switch edges all carry the same instruction; take the first of any kind that has one.
    edges
        .iter()
        .filter(|edge| !matches!(edge.kind, EdgeKind::Exception { .. }))
        .find_map(|edge| edge.instruction.clone())
}

/// The frame an exception handler starts with: the protected block's entry locals, a cleared
/// stack, and the throwable pushed.
///
/// The declared catch type must be assignable to `java/lang/Throwable`; a hierarchy that can
/// disprove the relationship turns the edge into an `INVALID_TYPE` diagnostic, and the
/// handler is still traced with the claimed type so one bad edge does not hide the rest.
fn handler_frame<H: ClassHierarchy>(
    entry_frame: &Frame,
    edge: &Edge,
    hierarchy: &H,
    verifier: &mut Verifier,
) -> Frame {
    let mut handler = entry_frame.clone();
    handler.stack.clear();
    let name = edge
        .throwable
        .clone()
        .unwrap_or_else(|| "java/lang/Throwable".to_string());
    if !hierarchy.is_assignable("java/lang/Throwable", &name) {
        verifier.report(
            VerifyErrorKind::InvalidType,
            ErrorSource::Edge {
                from: edge.from,
                to: edge.to,
            },
            format!("caught type {name} is not assignable to java/lang/Throwable"),
        );
    }
    let source = Source::Edge {
        from: edge.from,
        to: edge.to.unwrap_or(RETHROW_LABEL),
    };
    handler.push(FrameType::reference(name), None, source);
    handler
}

/// Pre-pass over the whole graph checking the pairing invariants of terminator edges.
fn validate_structure(graph: &InsnGraph, verifier: &mut Verifier) {
    for label in graph.labels() {
        let edges = graph.successors(label);
        let jumps: Vec<&Edge> = edges
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::Jump))
            .collect();
        let fallthroughs = edges
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::Fallthrough) && !edge.is_leaf())
            .count();
        let leaves = edges.iter().filter(|edge| edge.is_leaf()).count();
        let switches = edges
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::Switch { .. }))
            .count();
        let rets = edges
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::Ret))
            .count();
        let jsr_jumps = edges
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::JsrJump))
            .count();
        let jsr_falls = edges
            .iter()
            .filter(|edge| matches!(edge.kind, EdgeKind::JsrFallthrough))
            .count();

        if jsr_jumps != jsr_falls {
            verifier.report(
                VerifyErrorKind::InvalidBlock,
                ErrorSource::Block(label),
                "jsr jump and jsr fallthrough edges must be paired",
            );
        }
        for jump in &jumps {
            let conditional = jump
                .instruction
                .as_ref()
                .is_some_and(Instruction::is_conditional_branch);
            if conditional && fallthroughs != 1 {
                verifier.report(
                    VerifyErrorKind::InvalidBlock,
                    ErrorSource::Block(label),
                    "a conditional jump requires exactly one fallthrough edge",
                );
            }
            if !conditional && fallthroughs != 0 {
                verifier.report(
                    VerifyErrorKind::InvalidBlock,
                    ErrorSource::Block(label),
                    "an unconditional jump permits no fallthrough edge",
                );
            }
        }
        let groups = usize::from(!jumps.is_empty())
            + usize::from(switches > 0)
            + usize::from(rets > 0)
            + usize::from(jsr_jumps > 0)
            + usize::from(leaves > 0);
        if groups > 1 {
            verifier.report(
                VerifyErrorKind::InvalidBlock,
                ErrorSource::Block(label),
                "block has more than one terminator",
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::PermissiveHierarchy;

    fn method() -> MethodContext<'static> {
        MethodContext {
            class_name: "Sample",
            name: "run",
            descriptor: "()V",
            is_static: true,
        }
    }

    fn int_method(descriptor: &'static str) -> MethodContext<'static> {
        MethodContext {
            class_name: "Sample",
            name: "calc",
            descriptor,
            is_static: true,
        }
    }

    fn run_trace(
        graph: &InsnGraph,
        method: &MethodContext,
    ) -> (Trace, Verifier) {
        let constant_pool = ConstantPool::new();
        let mut verifier = Verifier::new();
        let trace = Trace::run(
            graph,
            method,
            &constant_pool,
            &PermissiveHierarchy,
            TraceOptions::default(),
            &mut verifier,
        )
        .expect("trace failed");
        (trace, verifier)
    }

    /// A guarded nop with one handler catching `throwable`.
    fn guarded_graph(throwable: Option<&str>) -> InsnGraph {
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        let handler = graph.new_block();
        graph.block_mut(entry).expect("entry").push(Instruction::Nop);
        graph
            .connect(Edge::returning(entry, Instruction::Return))
            .expect("connect");
        graph
            .connect(Edge::exception(
                entry,
                handler,
                0,
                throwable.map(ToString::to_string),
            ))
            .expect("connect");
        graph.connect(Edge::rethrowing(handler)).expect("connect");
        graph
    }

    #[test_log::test]
    fn test_empty_method() {
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        graph
            .connect(Edge::returning(entry, Instruction::Return))
            .expect("connect");

        let (trace, verifier) = run_trace(&graph, &method());
        assert!(verifier.is_empty());
        assert!(trace.reached(entry));
        assert_eq!(0, trace.max_stack);
        assert_eq!(0, trace.max_locals);
        assert_eq!(1, trace.leaf_edges.len());
    }

    #[test_log::test]
    fn test_add_method_bounds() {
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        {
            let block = graph.block_mut(entry).expect("entry");
            block.push(Instruction::Iload_0);
            block.push(Instruction::Iload_1);
            block.push(Instruction::Iadd);
        }
        graph
            .connect(Edge::returning(entry, Instruction::Ireturn))
            .expect("connect");

        let (trace, verifier) = run_trace(&graph, &int_method("(II)I"));
        assert!(verifier.is_empty());
        assert_eq!(2, trace.max_stack);
        assert_eq!(2, trace.max_locals);
        assert_eq!(1, trace.constraints[&entry].len());
    }

    #[test_log::test]
    fn test_branch_converges_on_return() {
        // entry: iload_0, ifeq else; then: iconst_1, ireturn; else: iconst_0, ireturn
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        let then = graph.new_block();
        let other = graph.new_block();
        graph.block_mut(entry).expect("entry").push(Instruction::Iload_0);
        graph.block_mut(then).expect("then").push(Instruction::Iconst_1);
        graph.block_mut(other).expect("else").push(Instruction::Iconst_0);
        graph
            .connect(Edge::jump(entry, other, Instruction::Ifeq(0)))
            .expect("connect");
        graph.connect(Edge::fallthrough(entry, then)).expect("connect");
        graph
            .connect(Edge::returning(then, Instruction::Ireturn))
            .expect("connect");
        graph
            .connect(Edge::returning(other, Instruction::Ireturn))
            .expect("connect");

        let (trace, verifier) = run_trace(&graph, &int_method("(I)I"));
        assert!(verifier.is_empty());
        assert!(trace.reached(then));
        assert!(trace.reached(other));
        assert_eq!(1, trace.max_stack);
        assert_eq!(2, trace.leaf_edges.len());
    }

    #[test_log::test]
    fn test_loop_records_back_edge_and_memoizes() {
        // entry: iconst_0, istore_0 -> head; head: iload_0, ifge -> exit | body;
        // body: iinc 0 -> head (back edge); exit: return
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        let head = graph.new_block();
        let body = graph.new_block();
        let exit = graph.new_block();
        {
            let block = graph.block_mut(entry).expect("entry");
            block.push(Instruction::Iconst_0);
            block.push(Instruction::Istore_0);
        }
        graph.block_mut(head).expect("head").push(Instruction::Iload_0);
        graph.block_mut(body).expect("body").push(Instruction::Iinc(0, 1));
        graph.connect(Edge::fallthrough(entry, head)).expect("connect");
        graph
            .connect(Edge::jump(head, exit, Instruction::Ifge(0)))
            .expect("connect");
        graph.connect(Edge::fallthrough(head, body)).expect("connect");
        graph
            .connect(Edge::jump(body, head, Instruction::Goto(0)))
            .expect("connect");
        graph
            .connect(Edge::returning(exit, Instruction::Return))
            .expect("connect");

        let (trace, verifier) = run_trace(&graph, &method());
        assert!(verifier.is_empty());
        assert_eq!(1, trace.back_edges.len());
        assert_eq!(head, trace.back_edges[0].to.expect("target"));
        // The loop head stabilized instead of accumulating constraints forever.
        assert!(trace.constraints[&head].len() <= 2);
    }

    #[test_log::test]
    fn test_exception_handler_frame() {
        let graph = guarded_graph(None);
        let handler = 1;

        let (trace, verifier) = run_trace(&graph, &method());
        assert!(verifier.is_empty());
        let states = trace.entry_states(handler);
        assert_eq!(1, states.len());
        assert_eq!(1, states[0].stack.len());
        assert_eq!(FrameType::throwable(), states[0].stack[0].ty);
    }

    #[test_log::test]
    fn test_array_catch_type_is_reported() {
        // An array can never extend Throwable; even the no-classpath hierarchy knows that.
        let graph = guarded_graph(Some("[I"));
        let handler = 1;

        let (trace, verifier) = run_trace(&graph, &method());
        assert_eq!(1, verifier.len());
        assert_eq!(VerifyErrorKind::InvalidType, verifier.errors()[0].kind);
        assert!(verifier.errors()[0].message.contains("[I"));

        // The handler is still traced with the claimed type.
        let states = trace.entry_states(handler);
        assert_eq!(1, states.len());
        assert_eq!(FrameType::reference("[I"), states[0].stack[0].ty);
    }

    #[test_log::test]
    fn test_catch_type_checked_against_hierarchy() {
        // A caller-supplied hierarchy that actually knows the throwable subtree rejects
        // plain classes the permissive default has to wave through.
        struct KnownThrowables;

        impl ClassHierarchy for KnownThrowables {
            fn is_assignable(&self, target: &str, source: &str) -> bool {
                if target == "java/lang/Throwable" {
                    source == "java/lang/Throwable" || source.ends_with("Exception")
                } else {
                    true
                }
            }
        }

        let constant_pool = ConstantPool::new();

        let graph = guarded_graph(Some("java/io/IOException"));
        let mut verifier = Verifier::new();
        Trace::run(
            &graph,
            &method(),
            &constant_pool,
            &KnownThrowables,
            TraceOptions::default(),
            &mut verifier,
        )
        .expect("trace failed");
        assert!(verifier.is_empty());

        let graph = guarded_graph(Some("java/lang/String"));
        let mut verifier = Verifier::new();
        Trace::run(
            &graph,
            &method(),
            &constant_pool,
            &KnownThrowables,
            TraceOptions::default(),
            &mut verifier,
        )
        .expect("trace failed");
        assert_eq!(1, verifier.len());
        assert_eq!(VerifyErrorKind::InvalidType, verifier.errors()[0].kind);
        assert!(verifier.errors()[0].message.contains("java/lang/String"));
    }

    #[test_log::test]
    fn test_subroutine_resolution() {
        // entry --jsr--> sub; sub: astore_0; ret 0 -> continuation: return
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        let continuation = graph.new_block();
        let sub = graph.new_block();
        graph.block_mut(sub).expect("sub").push(Instruction::Astore_0);
        graph
            .connect(Edge::jsr_jump(entry, sub, Instruction::Jsr(0)))
            .expect("connect");
        graph
            .connect(Edge::jsr_fallthrough(entry, continuation))
            .expect("connect");
        graph
            .connect(Edge::ret(sub, Instruction::Ret(0)))
            .expect("connect");
        graph
            .connect(Edge::returning(continuation, Instruction::Return))
            .expect("connect");

        let (trace, verifier) = run_trace(&graph, &method());
        assert!(verifier.is_empty());
        assert_eq!(
            vec![Subroutine {
                ret_block: sub,
                jsr_block: entry,
                exit_block: continuation,
            }],
            trace.subroutines
        );
        assert!(trace.reached(continuation));
    }

    #[test_log::test]
    fn test_unresolvable_ret_reports_and_completes() {
        // A ret block with no jsr leading into it: local 0 holds no return address.
        let mut graph = InsnGraph::new();
        let entry = graph.new_block();
        graph
            .connect(Edge::ret(entry, Instruction::Ret(0)))
            .expect("connect");

        let (trace, verifier) = run_trace(&graph, &method());
        assert!(trace.reached(entry));
        assert!(
            verifier
                .errors()
                .iter()
                .any(|error| error.kind == VerifyErrorKind::InvalidBlock)
        );
    }

    #[test_log::test]
    fn test_multiple_terminators_reported() {
        let mut graph = InsnGraph::new();
        let a = graph.new_block();
        let b = graph.new_block();
        graph
            .connect(Edge::jump(a, b, Instruction::Goto(0)))
            .expect("connect");
        graph
            .connect(Edge::returning(a, Instruction::Return))
            .expect("connect");
        graph
            .connect(Edge::returning(b, Instruction::Return))
            .expect("connect");

        let (_, verifier) = run_trace(&graph, &method());
        assert!(
            verifier
                .errors()
                .iter()
                .any(|error| error.kind == VerifyErrorKind::InvalidBlock
                    && error.message.contains("more than one terminator"))
        );
    }
}
