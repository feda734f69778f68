//! Timeline events and the per-run timeline.

use crate::extraction::FrameIndex;
use crate::lifecycle::InvariantViolation;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Duration of one frame at the nominal rate, in hundredths of a millisecond.
const FRAME_CENTI_MS: u64 = 1667;

/// Frames kept before `Launch` when cropping a recording.
pub const CROP_LEAD_FRAMES: FrameIndex = 15;

/// Semantic events located in a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A small fixed-geometry indicator first appears.
    Launch,
    /// The content area first reaches full size.
    FirstBlank,
    /// Last frame with any visual change.
    Settled,
}

impl TimelineEvent {
    pub const ALL: [TimelineEvent; 3] = [
        TimelineEvent::Launch,
        TimelineEvent::FirstBlank,
        TimelineEvent::Settled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimelineEvent::Launch => "launch",
            TimelineEvent::FirstBlank => "first_blank",
            TimelineEvent::Settled => "settled",
        }
    }
}

impl fmt::Display for TimelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event to frame mapping. Keys are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: BTreeMap<TimelineEvent, FrameIndex>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event once.
    pub fn record(
        &mut self,
        event: TimelineEvent,
        frame: FrameIndex,
    ) -> Result<(), InvariantViolation> {
        if self.events.contains_key(&event) {
            return Err(InvariantViolation::EventAlreadyRecorded(event));
        }
        self.events.insert(event, frame);
        Ok(())
    }

    #[inline]
    pub fn get(&self, event: TimelineEvent) -> Option<FrameIndex> {
        self.events.get(&event).copied()
    }

    #[inline]
    pub fn contains(&self, event: TimelineEvent) -> bool {
        self.events.contains_key(&event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimelineEvent, FrameIndex)> + '_ {
        self.events.iter().map(|(&event, &frame)| (event, frame))
    }

    /// Milliseconds from `Launch` to `event` at 16.67 ms per frame, rounded up.
    ///
    /// `None` if either event is missing or `event` precedes `Launch`.
    pub fn elapsed_ms(&self, event: TimelineEvent) -> Option<u64> {
        let launch = self.get(TimelineEvent::Launch)?;
        let frames = self.get(event)?.checked_sub(launch)?;
        Some((frames * FRAME_CENTI_MS).div_ceil(100))
    }

    /// First frame an external cropper should keep.
    pub fn crop_start(&self) -> Option<FrameIndex> {
        self.get(TimelineEvent::Launch)
            .map(|launch| launch.saturating_sub(CROP_LEAD_FRAMES))
    }
}

impl Serialize for Timeline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.events.len()))?;
        for (event, frame) in &self.events {
            map.serialize_entry(event.as_str(), frame)?;
        }
        map.end()
    }
}
