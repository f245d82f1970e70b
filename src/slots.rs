// Slot mapping for multi-finger and thumb captures
//
// The display has two rows of five slots: `e0..e4` for the left hand and
// `d0..d4` for the right hand, position 4 being the thumb. The scanner
// returns fingers left to right, so right-hand results fill the row in
// reverse.

use crate::error::{PanelError, PanelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which hand a four-finger capture targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

/// Physical finger set a capture operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    LeftHand,
    RightHand,
    Thumbs,
}

impl CaptureMode {
    /// Number of slots available to this mode
    pub fn capacity(&self) -> usize {
        match self {
            CaptureMode::LeftHand | CaptureMode::RightHand => FINGERS_PER_HAND,
            CaptureMode::Thumbs => 2,
        }
    }
}

impl From<Hand> for CaptureMode {
    fn from(hand: Hand) -> Self {
        match hand {
            Hand::Left => CaptureMode::LeftHand,
            Hand::Right => CaptureMode::RightHand,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureMode::LeftHand => "left-hand",
            CaptureMode::RightHand => "right-hand",
            CaptureMode::Thumbs => "thumbs",
        };
        f.write_str(name)
    }
}

/// Non-thumb fingers per hand
pub const FINGERS_PER_HAND: usize = 4;
const THUMB_POSITION: u8 = 4;

/// Display row of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// `e` row (left hand)
    Left,
    /// `d` row (right hand)
    Right,
}

/// Named display location for one finger's image and quality badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId {
    pub side: Side,
    pub position: u8,
}

impl SlotId {
    pub fn left(position: u8) -> Self {
        Self {
            side: Side::Left,
            position,
        }
    }

    pub fn right(position: u8) -> Self {
        Self {
            side: Side::Right,
            position,
        }
    }

    pub fn is_thumb(&self) -> bool {
        self.position == THUMB_POSITION
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.side {
            Side::Left => 'e',
            Side::Right => 'd',
        };
        write!(f, "{}{}", prefix, self.position)
    }
}

/// Map a zero-based capture index to its display slot.
///
/// Indices beyond the mode's capacity are a programming error on the caller's
/// side and come back as `SlotOverflow` instead of being truncated.
pub fn slot_for(mode: CaptureMode, index: usize) -> PanelResult<SlotId> {
    if index >= mode.capacity() {
        return Err(PanelError::SlotOverflow { mode, index });
    }

    let index = index as u8;
    let slot = match mode {
        CaptureMode::LeftHand => SlotId::left(index),
        CaptureMode::RightHand => SlotId::right(FINGERS_PER_HAND as u8 - 1 - index),
        CaptureMode::Thumbs if index == 0 => SlotId::left(THUMB_POSITION),
        CaptureMode::Thumbs => SlotId::right(THUMB_POSITION),
    };

    Ok(slot)
}

/// Map every index of a result with `count` entries, failing as a whole if
/// any index has no slot.
pub fn assign_slots(mode: CaptureMode, count: usize) -> PanelResult<Vec<SlotId>> {
    (0..count).map(|index| slot_for(mode, index)).collect()
}
