//! Local variable liveness, derived from a trace's access logs.
//!
//! For each block, live-in is the set of locals read before being overwritten plus everything
//! live-out that the block does not overwrite; live-out is the union of the successors'
//! live-in sets. The computation iterates to a fixed point over the graph's edges, including
//! exception edges and resolved subroutine continuations.

use crate::analysis::trace::Trace;
use crate::graph::{InsnGraph, Label};
use ahash::{AHashMap, AHashSet};

/// Per-block live local sets.
#[derive(Debug, Default)]
pub struct Liveness {
    /// Locals live on entry to each block.
    pub entries: AHashMap<Label, AHashSet<u16>>,
    /// Locals live on exit from each block.
    pub exits: AHashMap<Label, AHashSet<u16>>,
}

impl Liveness {
    /// Compute liveness for every block the trace reached.
    #[must_use]
    pub fn from_trace(graph: &InsnGraph, trace: &Trace) -> Liveness {
        let mut liveness = Liveness::default();

        // Per-block generated reads and killed writes, from the recorded access logs.
        let mut reads: AHashMap<Label, AHashSet<u16>> = AHashMap::new();
        let mut writes: AHashMap<Label, AHashSet<u16>> = AHashMap::new();
        for (label, accesses) in &trace.block_accesses {
            let read_set = reads.entry(*label).or_default();
            let write_set = writes.entry(*label).or_default();
            for access in accesses {
                if access.read {
                    if !write_set.contains(&access.index) {
                        read_set.insert(access.index);
                    }
                } else {
                    write_set.insert(access.index);
                }
            }
        }

        // Successor labels per block: regular edges plus subroutine continuations.
        let mut successors: AHashMap<Label, Vec<Label>> = AHashMap::new();
        for label in graph.labels() {
            let mut targets: Vec<Label> = graph
                .successors(label)
                .iter()
                .filter_map(|edge| edge.to)
                .filter(|to| *to >= 0)
                .collect();
            for subroutine in &trace.subroutines {
                if subroutine.ret_block == label {
                    targets.push(subroutine.exit_block);
                }
            }
            successors.insert(label, targets);
        }

        for label in trace.block_accesses.keys() {
            liveness.entries.insert(*label, AHashSet::new());
            liveness.exits.insert(*label, AHashSet::new());
        }

        let labels: Vec<Label> = trace.block_accesses.keys().copied().collect();
        let mut changed = true;
        while changed {
            changed = false;
            for label in &labels {
                let mut live_out: AHashSet<u16> = AHashSet::new();
                for successor in successors.get(label).into_iter().flatten() {
                    if let Some(successor_in) = liveness.entries.get(successor) {
                        live_out.extend(successor_in.iter().copied());
                    }
                }

                let mut live_in: AHashSet<u16> =
                    reads.get(label).cloned().unwrap_or_default();
                let killed = writes.get(label);
                for index in &live_out {
                    if killed.is_none_or(|write_set| !write_set.contains(index)) {
                        live_in.insert(*index);
                    }
                }

                if liveness.exits.get(label) != Some(&live_out) {
                    liveness.exits.insert(*label, live_out);
                    changed = true;
                }
                if liveness.entries.get(label) != Some(&live_in) {
                    liveness.entries.insert(*label, live_in);
                    changed = true;
                }
            }
        }

        liveness
    }

    /// The locals live on entry to `label`.
    #[must_use]
    pub fn live_in(&self, label: Label) -> Option<&AHashSet<u16>> {
        self.entries.get(&label)
    }

    /// The locals live on exit from `label`.
    #[must_use]
    pub fn live_out(&self, label: Label) -> Option<&AHashSet<u16>> {
        self.exits.get(&label)
    }
}
