//! Reorder buffer restoring frame order from out-of-order unit reports.
//!
//! Units report `Changed` (optional) then `Processed` (mandatory) for each
//! pair. A change is staged until its acknowledgment arrives; the ack
//! resolves the slot exactly once. The playhead then walks forward over
//! resolved slots, delivering changed ones in strictly increasing order.

use crate::extraction::{Difference, FrameIndex, Rect};
use crate::lifecycle::InvariantViolation;
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;

/// Resolution state of one frame pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSlot {
    /// No acknowledgment yet.
    Pending,
    /// Resolved with no changed region.
    NoChange,
    /// Resolved with at least one changed region.
    Changed(Vec<Rect>),
}

impl ResultSlot {
    #[inline]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ResultSlot::Pending)
    }
}

static PENDING: ResultSlot = ResultSlot::Pending;

/// Slot map plus playhead.
#[derive(Debug)]
pub struct ReorderBuffer {
    /// Resolved slots only; absent means pending.
    slots: BTreeMap<FrameIndex, ResultSlot>,
    /// Changes waiting for their `Processed` acknowledgment.
    staged: HashMap<FrameIndex, Vec<Rect>>,
    /// Next index to deliver.
    playhead: FrameIndex,
}

impl ReorderBuffer {
    /// Creates a buffer with the index-0 sentinel already resolved.
    pub fn new() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(0, ResultSlot::NoChange);
        Self {
            slots,
            staged: HashMap::new(),
            playhead: 0,
        }
    }

    /// Next frame index the consumer will see.
    #[inline]
    pub fn playhead(&self) -> FrameIndex {
        self.playhead
    }

    pub fn slot(&self, frame_index: FrameIndex) -> &ResultSlot {
        self.slots.get(&frame_index).unwrap_or(&PENDING)
    }

    /// Slots resolved beyond the playhead, waiting on a gap.
    pub fn backlog(&self) -> usize {
        self.slots.range(self.playhead..).count()
    }

    /// Holds a change until the pair is acknowledged.
    pub fn stage_change(
        &mut self,
        frame_index: FrameIndex,
        rects: Vec<Rect>,
    ) -> Result<(), InvariantViolation> {
        if self.slots.contains_key(&frame_index) {
            return Err(InvariantViolation::SlotAlreadyResolved(frame_index));
        }
        if self.staged.insert(frame_index, rects).is_some() {
            return Err(InvariantViolation::DuplicateChange(frame_index));
        }
        Ok(())
    }

    /// Resolves a pair from its acknowledgment and any staged change.
    pub fn resolve(&mut self, frame_index: FrameIndex) -> Result<(), InvariantViolation> {
        let slot = match self.staged.remove(&frame_index) {
            Some(rects) if !rects.is_empty() => ResultSlot::Changed(rects),
            _ => ResultSlot::NoChange,
        };
        self.write(frame_index, slot)
    }

    /// Single-assignment write of a resolved slot.
    pub fn write(
        &mut self,
        frame_index: FrameIndex,
        slot: ResultSlot,
    ) -> Result<(), InvariantViolation> {
        if !slot.is_resolved() {
            return Ok(());
        }
        if self.slots.contains_key(&frame_index) {
            return Err(InvariantViolation::SlotAlreadyResolved(frame_index));
        }
        self.slots.insert(frame_index, slot);
        Ok(())
    }

    /// Moves the playhead over every contiguously resolved slot.
    ///
    /// `deliver` sees each changed slot in order. It may break to stop the
    /// walk early; the slot it just saw still counts as delivered. Returns
    /// the number of slots passed.
    pub fn advance<F, E>(&mut self, mut deliver: F) -> Result<usize, E>
    where
        F: FnMut(Difference) -> Result<ControlFlow<()>, E>,
    {
        let mut passed = 0;
        while let Some(slot) = self.slots.get(&self.playhead) {
            let frame_index = self.playhead;
            let flow = match slot {
                ResultSlot::Changed(rects) => deliver(Difference {
                    frame_index,
                    rects: rects.clone(),
                })?,
                _ => ControlFlow::Continue(()),
            };
            self.playhead += 1;
            passed += 1;
            if flow.is_break() {
                break;
            }
        }
        Ok(passed)
    }

    /// Consumes the buffer, returning every resolved slot.
    pub fn into_slots(self) -> BTreeMap<FrameIndex, ResultSlot> {
        self.slots
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new()
    }
}
