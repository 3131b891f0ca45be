//! The abstract interpretation frame: entries, stack, locals and deltas.
//!
//! A [`Frame`] owns an arena of [`Entry`] values; the operand stack and the locals map hold
//! entry ids, so duplication preserves identity (a `dup` pushes the same id twice) and
//! replacing an entry (constructor initialization) rewrites every slot that holds it. Category
//! 2 values occupy two slots: the value entry followed by a hidden top sentinel, on the stack
//! and in the locals alike, so slot arithmetic matches the JVM's.
//!
//! Frame operations never abort: type conflicts substitute a cast entry of the merged type,
//! underflows synthesize `top`, and every anomaly is reported to the [`Verifier`] so one
//! broken instruction does not hide the rest of the method.

use crate::analysis::FrameType;
use crate::constant::Constant;
use crate::descriptor;
use crate::error::Result;
use crate::graph::Label;
use crate::verify::{ErrorSource, Verifier, VerifyErrorKind};
use ahash::AHashSet;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies an entry within its owning frame.
pub type EntryId = u32;

/// Where a value came from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Source {
    None,
    /// A method parameter, by local slot.
    Parameter(u16),
    /// An instruction, by block label and in-block index; a block's terminator uses the index
    /// one past the last stored instruction.
    Instruction { block: Label, index: usize },
    /// A control flow edge (exception handler entries).
    Edge { from: Label, to: Label },
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::None => write!(f, "<none>"),
            Source::Parameter(index) => write!(f, "parameter {index}"),
            Source::Instruction { block, index } => write!(f, "block {block} instruction {index}"),
            Source::Edge { from, to } => write!(f, "edge {from} -> {to}"),
        }
    }
}

/// One abstract value.
#[derive(Clone, Debug)]
pub struct Entry {
    pub id: EntryId,
    pub source: Source,
    pub ty: FrameType,
    /// A literal value, when the entry was produced by a constant instruction.
    pub value: Option<Constant>,
    /// The cast chain: entries this one was derived from (`checkcast`, conflict casts,
    /// constructor initialization).
    pub parents: Vec<EntryId>,
    /// Entries merged into this one at control flow joins.
    pub merges: Vec<EntryId>,
    /// Marks the hidden second slot of a category 2 value.
    sentinel: bool,
}

impl Entry {
    /// `true` for the hidden second slot of a category 2 value.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }
}

/// One recorded local variable access: a read or write of `index` touching `entry`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Access {
    pub read: bool,
    pub index: u16,
    pub entry: EntryId,
}

/// The recorded effect of one instruction on a frame.
#[derive(Clone, Debug, Default)]
pub struct FrameDelta {
    pub source: Option<Source>,
    pub pops: Vec<EntryId>,
    pub pushes: Vec<EntryId>,
    pub dups: Vec<EntryId>,
    pub swapped: bool,
    /// `(local index, previous entry, new entry)`.
    pub overwrites: Vec<(u16, Option<EntryId>, EntryId)>,
}

/// An immutable snapshot of one stack or local slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrozenEntry {
    pub ty: FrameType,
    pub source: Source,
}

impl FrozenEntry {
    /// Entry agreement for constraint memoization: types must be equal, and `returnAddress`
    /// values are further discriminated by source so distinct subroutine calls never merge.
    #[must_use]
    pub fn same_entry(&self, other: &FrozenEntry) -> bool {
        if self.ty != other.ty {
            return false;
        }
        if self.ty == FrameType::ReturnAddress {
            return self.source == other.source;
        }
        true
    }
}

/// An immutable snapshot of a whole frame, used as a memoization key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrozenState {
    /// Top-last; sentinels included, so the length is the slot count.
    pub stack: Vec<FrozenEntry>,
    pub locals: BTreeMap<u16, FrozenEntry>,
}

/// The mutable abstract interpretation state at one program point.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    entries: Vec<Entry>,
    pub stack: Vec<EntryId>,
    locals: IndexMap<u16, EntryId>,
    pub max_stack: usize,
    pub max_locals: usize,
    accesses: Vec<Access>,
    consumed: AHashSet<EntryId>,
    deltas: Vec<FrameDelta>,
    recording: Option<FrameDelta>,
}

/// The method being analyzed, as the initial frame needs to see it.
#[derive(Clone, Copy, Debug)]
pub struct MethodContext<'a> {
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
    pub is_static: bool,
}

impl MethodContext<'_> {
    /// `true` for `<init>` methods, whose receiver starts uninitialized.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

impl Frame {
    /// An empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial frame of a method: receiver at local 0 (uninitialized for a constructor),
    /// parameters laid out by verification category.
    ///
    /// # Errors
    ///
    /// Returns an error if the method descriptor is malformed.
    pub fn initial(method: &MethodContext) -> Result<Frame> {
        let mut frame = Frame::new();
        let mut index: u16 = 0;
        if !method.is_static {
            let ty = if method.is_constructor() {
                FrameType::UninitializedThis
            } else {
                FrameType::reference(method.class_name)
            };
            let id = frame.new_entry(ty, None, Source::Parameter(0));
            frame.store_local(index, id);
            index += 1;
        }
        let descriptor = descriptor::parse_method_descriptor(method.descriptor)?;
        for parameter in descriptor.parameters {
            let width = u16::from(parameter.category());
            let id = frame.new_entry(parameter, None, Source::Parameter(index));
            frame.store_local(index, id);
            index += width;
        }
        frame.max_locals = usize::from(index);
        frame.accesses.clear();
        Ok(frame)
    }

    /// Allocate a new entry.
    pub fn new_entry(&mut self, ty: FrameType, value: Option<Constant>, source: Source) -> EntryId {
        let id = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Entry {
            id,
            source,
            ty,
            value,
            parents: Vec::new(),
            merges: Vec::new(),
            sentinel: false,
        });
        id
    }

    fn new_sentinel(&mut self, of: EntryId) -> EntryId {
        let source = self.entries[of as usize].source.clone();
        let id = self.new_entry(FrameType::Top, None, source);
        self.entries[id as usize].sentinel = true;
        self.entries[id as usize].parents.push(of);
        id
    }

    fn new_top(&mut self, source: &Source) -> EntryId {
        self.new_entry(FrameType::Top, None, source.clone())
    }

    /// The entry behind an id.
    ///
    /// # Panics
    ///
    /// Ids are only minted by this frame; a foreign id is a logic error.
    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id as usize]
    }

    /// The entry currently stored at a local slot, if any.
    #[must_use]
    pub fn local(&self, index: u16) -> Option<&Entry> {
        self.locals.get(&index).map(|id| self.entry(*id))
    }

    /// The local access log, in program order.
    #[must_use]
    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    /// The recorded frame deltas, in program order.
    #[must_use]
    pub fn deltas(&self) -> &[FrameDelta] {
        &self.deltas
    }

    /// Entries that have been fully consumed: popped and no longer present in any slot.
    #[must_use]
    pub fn consumed(&self) -> &AHashSet<EntryId> {
        &self.consumed
    }

    /// Begin recording a delta attributed to `source`.
    pub fn start(&mut self, source: Source) {
        self.recording = Some(FrameDelta {
            source: Some(source),
            ..FrameDelta::default()
        });
    }

    /// Finish recording, appending the delta to the log and returning a copy.
    pub fn finish(&mut self) -> Option<FrameDelta> {
        let delta = self.recording.take()?;
        self.deltas.push(delta.clone());
        Some(delta)
    }

    /// Push a new value of the given type; wide types also push their hidden sentinel.
    pub fn push(&mut self, ty: FrameType, value: Option<Constant>, source: Source) -> EntryId {
        let ty = ty.on_stack();
        let id = self.new_entry(ty, value, source);
        self.push_existing(id);
        id
    }

    /// Re-push an existing entry (loads, dups), preserving its identity.
    pub fn push_existing(&mut self, id: EntryId) {
        self.stack.push(id);
        if let Some(delta) = self.recording.as_mut() {
            delta.pushes.push(id);
        }
        if self.entries[id as usize].ty.is_wide() {
            let sentinel = self.new_sentinel(id);
            self.stack.push(sentinel);
        }
        self.max_stack = self.max_stack.max(self.stack.len());
    }

    fn pop_slot(&mut self, verifier: &mut Verifier, source: &Source) -> EntryId {
        match self.stack.pop() {
            Some(id) => {
                if let Some(delta) = self.recording.as_mut() {
                    delta.pops.push(id);
                }
                self.mark_consumed(id);
                id
            }
            None => {
                verifier.report(
                    VerifyErrorKind::StackUnderflow,
                    error_source(source),
                    "popped from an empty stack",
                );
                self.new_top(source)
            }
        }
    }

    fn mark_consumed(&mut self, id: EntryId) {
        if !self.stack.contains(&id) && !self.locals.values().any(|held| *held == id) {
            self.consumed.insert(id);
        }
    }

    /// Pop one value, expecting it to merge with `expect`.
    ///
    /// `FrameType::Top` expects anything of category 1. A wide expectation pops both slots.
    /// On a type conflict a cast entry of the merged type is substituted and the conflict is
    /// reported; on underflow a `top` entry is synthesized.
    pub fn pop(&mut self, expect: &FrameType, verifier: &mut Verifier, source: &Source) -> EntryId {
        if expect.is_wide() {
            let top_slot = self.pop_slot(verifier, source);
            if !self.entry(top_slot).is_sentinel() {
                verifier.report(
                    VerifyErrorKind::InvalidTypeCategory,
                    error_source(source),
                    format!(
                        "expected a category 2 value, found {}",
                        self.entry(top_slot).ty
                    ),
                );
                return self.check_expectation(top_slot, expect, verifier, source);
            }
            let id = self.pop_slot(verifier, source);
            return self.check_expectation(id, expect, verifier, source);
        }

        let id = self.pop_slot(verifier, source);
        if self.entry(id).is_sentinel() {
            verifier.report(
                VerifyErrorKind::InvalidTypeCategory,
                error_source(source),
                "popping a single slot would split a category 2 value",
            );
            let split = self.pop_slot(verifier, source);
            self.mark_consumed(split);
            return self.new_top(source);
        }
        self.check_expectation(id, expect, verifier, source)
    }

    /// Pop one value that must be a reference; `returnAddress` is rejected here.
    pub fn pop_reference(&mut self, verifier: &mut Verifier, source: &Source) -> EntryId {
        let id = self.pop(&FrameType::Top, verifier, source);
        let ty = &self.entry(id).ty;
        if !ty.is_reference() && *ty != FrameType::Top {
            verifier.report(
                VerifyErrorKind::InvalidType,
                error_source(source),
                format!("expected a reference, found {ty}"),
            );
        }
        id
    }

    /// Pop `slots` raw slots (`pop`/`pop2`), checking that no category 2 value is split.
    pub fn pop_slots(&mut self, slots: usize, verifier: &mut Verifier, source: &Source) {
        for remaining in (0..slots).rev() {
            let id = self.pop_slot(verifier, source);
            if self.entry(id).is_sentinel() && remaining == 0 {
                verifier.report(
                    VerifyErrorKind::InvalidTypeCategory,
                    error_source(source),
                    "pop splits a category 2 value",
                );
                // Consume the orphaned value slot as well.
                let value = self.pop_slot(verifier, source);
                self.mark_consumed(value);
            }
        }
    }

    fn check_expectation(
        &mut self,
        id: EntryId,
        expect: &FrameType,
        verifier: &mut Verifier,
        source: &Source,
    ) -> EntryId {
        if *expect == FrameType::Top {
            return id;
        }
        let actual = self.entry(id).ty.clone();
        if actual.check_merge(expect) {
            return id;
        }
        verifier.report(
            VerifyErrorKind::InvalidType,
            error_source(source),
            format!("expected {expect}, found {actual}"),
        );
        let merged = actual.merge(expect);
        let cast = self.new_entry(merged, None, source.clone());
        self.entries[cast as usize].parents.push(id);
        cast
    }

    /// Read a local, expecting its value to merge with `expect`.
    pub fn get(
        &mut self,
        index: u16,
        expect: &FrameType,
        verifier: &mut Verifier,
        source: &Source,
    ) -> EntryId {
        let id = match self.locals.get(&index) {
            Some(id) if !self.entry(*id).is_sentinel() => *id,
            _ => {
                verifier.report(
                    VerifyErrorKind::UnknownLocal,
                    error_source(source),
                    format!("local {index} holds no value"),
                );
                self.new_top(source)
            }
        };
        self.accesses.push(Access {
            read: true,
            index,
            entry: id,
        });
        self.max_locals = self.max_locals.max(usize::from(index) + 1);
        self.check_expectation(id, expect, verifier, source)
    }

    fn store_local(&mut self, index: u16, id: EntryId) {
        self.locals.insert(index, id);
        let width = usize::from(self.entries[id as usize].ty.category());
        if width == 2 {
            let sentinel = self.new_sentinel(id);
            self.locals.insert(index + 1, sentinel);
        }
        self.max_locals = self.max_locals.max(usize::from(index) + width);
    }

    /// Write a local: records the access, invalidates a straddled category 2 value and stores
    /// the hidden sentinel for wide values.
    pub fn set(&mut self, index: u16, id: EntryId, source: &Source) {
        // Overwriting the second slot of a wide value kills the whole value.
        if index > 0 {
            if let Some(&below) = self.locals.get(&(index - 1)) {
                if self.entries[below as usize].ty.is_wide() {
                    let top = self.new_top(source);
                    self.locals.insert(index - 1, top);
                }
            }
        }
        let previous = self.locals.get(&index).copied();
        self.accesses.push(Access {
            read: false,
            index,
            entry: id,
        });
        if let Some(delta) = self.recording.as_mut() {
            delta.overwrites.push((index, previous, id));
        }
        self.store_local(index, id);
        if let Some(previous) = previous {
            self.mark_consumed(previous);
        }
    }

    /// Category-aware duplication: copy the top `count` slots and insert them `depth` slots
    /// further down. Covers `dup`, `dup_x1`, `dup_x2`, `dup2`, `dup2_x1` and `dup2_x2`.
    pub fn dup(&mut self, count: usize, depth: usize, verifier: &mut Verifier, source: &Source) {
        let len = self.stack.len();
        let needed = count + depth;
        if len < needed {
            verifier.report(
                VerifyErrorKind::StackUnderflow,
                error_source(source),
                format!("dup needs {needed} slots, stack holds {len}"),
            );
            for _ in len..needed {
                let top = self.new_top(source);
                self.stack.insert(0, top);
            }
        }
        let len = self.stack.len();
        // Neither the copied slice nor the insertion point may split a category 2 value.
        let slice_bottom = self.stack[len - count];
        if self.entry(slice_bottom).is_sentinel() {
            verifier.report(
                VerifyErrorKind::InvalidTypeCategory,
                error_source(source),
                "dup splits a category 2 value",
            );
        }
        let insert_at = len - count - depth;
        if depth > 0 && self.entry(self.stack[insert_at]).is_sentinel() {
            verifier.report(
                VerifyErrorKind::InvalidTypeCategory,
                error_source(source),
                "dup inserts inside a category 2 value",
            );
        }
        let copied: Vec<EntryId> = self.stack[len - count..].to_vec();
        if let Some(delta) = self.recording.as_mut() {
            delta.dups.extend(copied.iter().copied());
        }
        for (shift, id) in copied.into_iter().enumerate() {
            self.stack.insert(insert_at + shift, id);
        }
        self.max_stack = self.max_stack.max(self.stack.len());
    }

    /// Swap the top two category 1 slots.
    pub fn swap(&mut self, verifier: &mut Verifier, source: &Source) {
        let len = self.stack.len();
        if len < 2 {
            verifier.report(
                VerifyErrorKind::StackUnderflow,
                error_source(source),
                "swap needs two slots",
            );
            return;
        }
        if self.entry(self.stack[len - 1]).is_sentinel()
            || self.entry(self.stack[len - 2]).is_sentinel()
        {
            verifier.report(
                VerifyErrorKind::InvalidTypeCategory,
                error_source(source),
                "swap cannot move a category 2 value",
            );
            return;
        }
        self.stack.swap(len - 1, len - 2);
        if let Some(delta) = self.recording.as_mut() {
            delta.swapped = true;
        }
    }

    /// Replace every slot holding `old` with a new entry of `ty` whose parent is `old`.
    ///
    /// Used when `invokespecial <init>` turns an uninitialized object (and all its dups) into
    /// an initialized one.
    pub fn replace(&mut self, old: EntryId, ty: FrameType, source: Source) -> EntryId {
        let id = self.new_entry(ty, None, source);
        self.entries[id as usize].parents.push(old);
        for slot in &mut self.stack {
            if *slot == old {
                *slot = id;
            }
        }
        let rewrites: Vec<u16> = self
            .locals
            .iter()
            .filter(|(_, held)| **held == old)
            .map(|(index, _)| *index)
            .collect();
        for index in rewrites {
            self.locals.insert(index, id);
        }
        id
    }

    /// Record a cast ancestor on an entry.
    pub fn add_parent(&mut self, id: EntryId, parent: EntryId) {
        if id != parent && !self.entries[id as usize].parents.contains(&parent) {
            self.entries[id as usize].parents.push(parent);
        }
    }

    /// Merge `incoming` into the slot-compatible parts of this frame's entry at a join.
    pub fn record_merge(&mut self, into: EntryId, merged: EntryId) {
        if into != merged && !self.entries[into as usize].merges.contains(&merged) {
            self.entries[into as usize].merges.push(merged);
        }
    }

    /// Snapshot the frame.
    #[must_use]
    pub fn freeze(&self) -> FrozenState {
        let stack = self
            .stack
            .iter()
            .map(|id| self.freeze_entry(*id))
            .collect();
        let locals = self
            .locals
            .iter()
            .map(|(index, id)| (*index, self.freeze_entry(*id)))
            .collect();
        FrozenState { stack, locals }
    }

    fn freeze_entry(&self, id: EntryId) -> FrozenEntry {
        let entry = self.entry(id);
        FrozenEntry {
            ty: entry.ty.clone(),
            source: entry.source.clone(),
        }
    }
}

fn error_source(source: &Source) -> ErrorSource {
    match source {
        Source::Instruction { block, index } => ErrorSource::Instruction {
            block: *block,
            index: *index,
        },
        Source::Edge { from, to } => ErrorSource::Edge {
            from: *from,
            to: Some(*to),
        },
        _ => ErrorSource::None,
    }
}
