//! The instruction graph: a label-keyed arena of blocks plus typed edges.
//!
//! Blocks are stored by label and edges hold labels rather than references, so removing or
//! rewriting a block never leaves a dangling pointer. The return (−1) and rethrow (−2) pseudo
//! blocks are not stored; edges may target them, and they never have out-edges.

use crate::error::Error::{EdgeLimitExceeded, UnknownBlock};
use crate::error::Result;
use crate::graph::{BasicBlock, Edge, Label, RETHROW_LABEL, RETURN_LABEL};
use ahash::AHashMap;
use indexmap::IndexMap;
use std::fmt;
use std::mem::discriminant;

/// A control flow graph over JVM instructions.
///
/// # Examples
///
/// ```rust
/// use doppio_classfile::attributes::Instruction;
/// use doppio_classfile::graph::{Edge, InsnGraph};
///
/// let mut graph = InsnGraph::new();
/// let entry = graph.new_block();
/// graph.connect(Edge::returning(entry, Instruction::Return))?;
/// assert_eq!(1, graph.successors(entry).len());
/// # Ok::<(), doppio_classfile::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct InsnGraph {
    blocks: IndexMap<Label, BasicBlock>,
    edges_out: AHashMap<Label, Vec<Edge>>,
    edges_in: AHashMap<Label, Vec<Edge>>,
    entry: Label,
    next_label: Label,
}

impl InsnGraph {
    /// Create an empty graph. The first block created becomes the entry block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry block label.
    #[must_use]
    pub fn entry(&self) -> Label {
        self.entry
    }

    /// Make `label` the entry block.
    pub fn set_entry(&mut self, label: Label) {
        self.entry = label;
    }

    /// Allocate and insert a new empty block, returning its label.
    pub fn new_block(&mut self) -> Label {
        let label = self.next_label;
        self.next_label += 1;
        self.blocks.insert(label, BasicBlock::new(label));
        label
    }

    /// Insert a block under its own label, replacing any existing block with that label.
    pub fn add_block(&mut self, block: BasicBlock) {
        self.next_label = self.next_label.max(block.label + 1);
        self.blocks.insert(block.label, block);
    }

    /// The block with the given label; pseudo blocks are not stored and return `None`.
    #[must_use]
    pub fn block(&self, label: Label) -> Option<&BasicBlock> {
        self.blocks.get(&label)
    }

    /// Mutable access to the block with the given label.
    pub fn block_mut(&mut self, label: Label) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(&label)
    }

    /// `true` when `label` names a stored block or one of the pseudo blocks.
    #[must_use]
    pub fn contains(&self, label: Label) -> bool {
        label == RETURN_LABEL || label == RETHROW_LABEL || self.blocks.contains_key(&label)
    }

    /// Iterate over the stored blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    /// The labels of the stored blocks in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.blocks.keys().copied()
    }

    /// The number of stored blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// `true` when the graph has no stored blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Connect an edge, enforcing the parallel-edge limit of its kind.
    ///
    /// # Errors
    ///
    /// Returns an error when either endpoint does not exist, the source is a pseudo block, or
    /// the limit for the edge kind is already reached.
    pub fn connect(&mut self, edge: Edge) -> Result<()> {
        if !self.blocks.contains_key(&edge.from) {
            return Err(UnknownBlock(edge.from));
        }
        if let Some(to) = edge.to {
            if !self.contains(to) {
                return Err(UnknownBlock(to));
            }
        }
        if let Some(limit) = edge.kind.limit() {
            let same_kind = self
                .successors(edge.from)
                .iter()
                .filter(|existing| discriminant(&existing.kind) == discriminant(&edge.kind))
                .count();
            if same_kind >= limit {
                return Err(EdgeLimitExceeded(edge.from));
            }
        }
        if let Some(to) = edge.to {
            self.edges_in.entry(to).or_default().push(edge.clone());
        }
        self.edges_out.entry(edge.from).or_default().push(edge);
        Ok(())
    }

    /// Remove an edge by structural equality.
    pub fn disconnect(&mut self, edge: &Edge) {
        if let Some(edges) = self.edges_out.get_mut(&edge.from) {
            edges.retain(|existing| existing != edge);
        }
        if let Some(to) = edge.to {
            if let Some(edges) = self.edges_in.get_mut(&to) {
                edges.retain(|existing| existing != edge);
            }
        }
    }

    /// The out-edges of a block.
    #[must_use]
    pub fn successors(&self, label: Label) -> &[Edge] {
        self.edges_out.get(&label).map_or(&[], Vec::as_slice)
    }

    /// The in-edges of a block (opaque edges are not indexed until resolved).
    #[must_use]
    pub fn predecessors(&self, label: Label) -> &[Edge] {
        self.edges_in.get(&label).map_or(&[], Vec::as_slice)
    }

    /// Every edge in the graph.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges_out.values().flatten()
    }

    /// The edges whose target is still unknown; each must be resolved by the trace or reported.
    pub fn opaque_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges().filter(|edge| edge.is_opaque())
    }

    /// The single fallthrough successor of a block, if any.
    #[must_use]
    pub fn fallthrough(&self, label: Label) -> Option<&Edge> {
        self.successors(label)
            .iter()
            .find(|edge| matches!(edge.kind, crate::graph::EdgeKind::Fallthrough))
    }

    /// Remove a block and every edge touching it.
    pub fn remove_block(&mut self, label: Label) {
        self.blocks.shift_remove(&label);
        let outgoing = self.edges_out.remove(&label).unwrap_or_default();
        for edge in outgoing {
            if let Some(to) = edge.to {
                if let Some(edges) = self.edges_in.get_mut(&to) {
                    edges.retain(|existing| existing.from != label);
                }
            }
        }
        let incoming = self.edges_in.remove(&label).unwrap_or_default();
        for edge in incoming {
            if let Some(edges) = self.edges_out.get_mut(&edge.from) {
                edges.retain(|existing| existing.to != Some(label));
            }
        }
    }
}

impl fmt::Display for InsnGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for block in self.blocks.values() {
            write!(f, "{block}")?;
            for edge in self.successors(block.label) {
                writeln!(f, "  -> {edge}")?;
            }
        }
        Ok(())
    }
}
