//! Frame/score state machine
//!
//! Ten frames, each `Open` until its throws are complete and then `Locked`.
//! Frames 1-9 take one throw on a strike and two otherwise; frame 10 takes a
//! third throw after a strike or spare. Cumulative totals are resolved lazily:
//! a strike waits for the next two throws, a spare for the next one, and a
//! frame only shows a total once every earlier frame has one. Once resolved a
//! total never changes.
//!
//! The current frame index stays on a locked frame until `advance_frame` is
//! called, so displays can show the finished frame during the pause.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

pub const FRAME_COUNT: usize = 10;
pub const RACK_SIZE: u8 = 10;
const LAST_FRAME: usize = FRAME_COUNT - 1;

/// Scoresheet mark for one throw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrowSymbol {
    /// 1-9 pins
    Count(u8),
    /// All ten on the first ball of a rack
    Strike,
    /// Remaining pins cleared with the second ball of a rack
    Spare,
    Foul,
    /// No pins (gutter or clean miss)
    Miss,
}

impl fmt::Display for ThrowSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrowSymbol::Count(n) => write!(f, "{n}"),
            ThrowSymbol::Strike => f.write_str("X"),
            ThrowSymbol::Spare => f.write_str("/"),
            ThrowSymbol::Foul => f.write_str("F"),
            ThrowSymbol::Miss => f.write_str("-"),
        }
    }
}

/// A recorded throw (immutable once recorded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throw {
    /// Pins credited to this throw (0 for a foul)
    pub pins: u8,
    pub is_foul: bool,
    pub symbol: ThrowSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameState {
    Open,
    Locked,
}

/// One scoring frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub throws: Vec<Throw>,
    pub state: FrameState,
    /// Running total through this frame, once its bonus is known
    pub cumulative: Option<u32>,
}

impl Frame {
    fn new(index: usize) -> Self {
        Self {
            index,
            throws: Vec::with_capacity(3),
            state: FrameState::Open,
            cumulative: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.index == LAST_FRAME
    }

    pub fn is_locked(&self) -> bool {
        self.state == FrameState::Locked
    }

    fn pins(&self, throw: usize) -> Option<u8> {
        self.throws.get(throw).map(|t| t.pins)
    }

    pub fn is_strike(&self) -> bool {
        self.pins(0) == Some(RACK_SIZE)
    }

    pub fn is_spare(&self) -> bool {
        match (self.pins(0), self.pins(1)) {
            (Some(first), Some(second)) => first < RACK_SIZE && first + second == RACK_SIZE,
            _ => false,
        }
    }

    /// Sum of pins over this frame's own throws
    pub fn pin_total(&self) -> u32 {
        self.throws.iter().map(|t| t.pins as u32).sum()
    }

    /// Throws this frame is due, given what has been recorded so far
    pub fn throw_budget(&self) -> usize {
        if !self.is_last() {
            if self.is_strike() { 1 } else { 2 }
        } else if self.is_strike() || self.is_spare() {
            3
        } else {
            2
        }
    }

    pub fn throws_left(&self) -> usize {
        if self.is_locked() {
            0
        } else {
            self.throw_budget().saturating_sub(self.throws.len())
        }
    }

    /// Whether throw number `n` (0-based) is the first ball at a full rack
    fn is_fresh_rack(&self, n: usize) -> bool {
        match n {
            0 => true,
            1 => self.is_last() && self.is_strike(),
            2 => {
                self.is_last()
                    && ((self.is_strike() && self.pins(1) == Some(RACK_SIZE)) || self.is_spare())
            }
            _ => false,
        }
    }

    /// Pins standing for the next throw
    pub fn standing_pins(&self) -> u8 {
        let n = self.throws.len();
        if self.is_locked() || n >= 3 {
            return 0;
        }
        if self.is_fresh_rack(n) {
            return RACK_SIZE;
        }
        let previous = self.pins(n - 1).unwrap_or(0);
        RACK_SIZE.saturating_sub(previous)
    }

    /// Mark for knocking down `pins` with the next throw
    fn symbol_for(&self, pins: u8, is_foul: bool) -> ThrowSymbol {
        let fresh = self.is_fresh_rack(self.throws.len());
        if is_foul {
            ThrowSymbol::Foul
        } else if fresh && pins == RACK_SIZE {
            ThrowSymbol::Strike
        } else if !fresh && pins > 0 && pins == self.standing_pins() {
            ThrowSymbol::Spare
        } else if pins == 0 {
            ThrowSymbol::Miss
        } else {
            ThrowSymbol::Count(pins)
        }
    }

    /// Scoresheet marks, e.g. "X", "9/", "7-", "X9/"
    pub fn marks(&self) -> String {
        self.throws.iter().map(|t| t.symbol.to_string()).collect()
    }
}

/// Result of recording a throw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub frame_index: usize,
    pub throw_index: usize,
    pub throw: Throw,
    pub frame_locked: bool,
    pub game_finished: bool,
    pub total: u32,
}

impl RecordOutcome {
    pub fn is_strike(&self) -> bool {
        self.throw.symbol == ThrowSymbol::Strike
    }

    pub fn is_spare(&self) -> bool {
        self.throw.symbol == ThrowSymbol::Spare
    }
}

/// The ten-frame scoresheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameScoreboard {
    frames: Vec<Frame>,
    current: usize,
}

impl Default for FrameScoreboard {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScoreboard {
    pub fn new() -> Self {
        Self {
            frames: (0..FRAME_COUNT).map(Frame::new).collect(),
            current: 0,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frames[self.current]
    }

    /// Game completion: frame 10 is locked
    pub fn is_finished(&self) -> bool {
        self.frames[LAST_FRAME].is_locked()
    }

    /// Cumulative total of the last frame with a resolved value, or 0
    pub fn total_score(&self) -> u32 {
        self.frames
            .iter()
            .filter_map(|f| f.cumulative)
            .last()
            .unwrap_or(0)
    }

    pub fn throws_left(&self) -> usize {
        self.current_frame().throws_left()
    }

    pub fn standing_pins(&self) -> u8 {
        self.current_frame().standing_pins()
    }

    /// The next throw of the current (unlocked) frame needs a full rack.
    /// True at the start of every frame and inside frame 10 after a strike or spare.
    pub fn needs_fresh_rack(&self) -> bool {
        let frame = self.current_frame();
        !frame.is_locked() && frame.is_fresh_rack(frame.throws.len())
    }

    /// Record a throw that knocked down `pins` on the current frame
    pub fn record_throw(&mut self, pins: u8) -> Result<RecordOutcome, InvariantViolation> {
        self.record(pins, false)
    }

    /// Record a foul: an "F" worth no pins
    pub fn record_foul(&mut self) -> Result<RecordOutcome, InvariantViolation> {
        self.record(0, true)
    }

    fn record(&mut self, pins: u8, is_foul: bool) -> Result<RecordOutcome, InvariantViolation> {
        let index = self.current;
        let frame = &mut self.frames[index];

        if frame.is_locked() {
            return Err(if frame.is_last() {
                InvariantViolation::GameFinished
            } else {
                InvariantViolation::FrameLocked { frame: index }
            });
        }
        let budget = frame.throw_budget();
        if frame.throws.len() >= budget {
            return Err(InvariantViolation::ThrowBudgetExceeded {
                frame: index,
                throws: frame.throws.len(),
                budget,
            });
        }
        let standing = frame.standing_pins();
        if pins > standing {
            return Err(InvariantViolation::TooManyPins {
                frame: index,
                pins,
                standing,
            });
        }

        let throw = Throw {
            pins,
            is_foul,
            symbol: frame.symbol_for(pins, is_foul),
        };
        frame.throws.push(throw);
        let throw_index = frame.throws.len() - 1;
        if frame.throws.len() == frame.throw_budget() {
            frame.state = FrameState::Locked;
        }
        let frame_locked = frame.is_locked();

        self.resolve_cumulative();

        Ok(RecordOutcome {
            frame_index: index,
            throw_index,
            throw,
            frame_locked,
            game_finished: self.is_finished(),
            total: self.total_score(),
        })
    }

    /// Move on from a locked frame. Returns false if the current frame is
    /// still open or it was the last one.
    pub fn advance_frame(&mut self) -> bool {
        if !self.current_frame().is_locked() || self.current == LAST_FRAME {
            return false;
        }
        self.current += 1;
        true
    }

    /// Discard the throws of the current frame if it is still open
    pub fn reset_current_frame(&mut self) -> bool {
        let frame = &mut self.frames[self.current];
        if frame.is_locked() || frame.throws.is_empty() {
            return false;
        }
        frame.throws.clear();
        self.resolve_cumulative();
        true
    }

    /// Recompute every cumulative total from the recorded throws
    fn resolve_cumulative(&mut self) {
        let values = cumulative_totals(&self.frames);
        for (frame, value) in self.frames.iter_mut().zip(values) {
            frame.cumulative = value;
        }
    }

    /// Verify every structural invariant of the sheet
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        for frame in &self.frames {
            let budget = frame.throw_budget();
            if frame.throws.len() > budget {
                return Err(InvariantViolation::ThrowBudgetExceeded {
                    frame: frame.index,
                    throws: frame.throws.len(),
                    budget,
                });
            }
            if frame.is_locked() != (frame.throws.len() == budget) {
                return Err(InvariantViolation::LockStateMismatch {
                    frame: frame.index,
                    locked: frame.is_locked(),
                    throws: frame.throws.len(),
                    budget,
                });
            }

            // Replay the frame to check pin counts against the rack
            let mut replay = Frame::new(frame.index);
            for throw in &frame.throws {
                let standing = replay.standing_pins();
                if throw.pins > standing {
                    return Err(InvariantViolation::TooManyPins {
                        frame: frame.index,
                        pins: throw.pins,
                        standing,
                    });
                }
                replay.throws.push(*throw);
            }

            let played = frame.index < self.current && !frame.is_locked();
            let ahead = frame.index > self.current && !frame.throws.is_empty();
            if played || ahead {
                return Err(InvariantViolation::OutOfOrder {
                    frame: frame.index,
                    current: self.current,
                });
            }
        }

        let expected = cumulative_totals(&self.frames);
        for (frame, expected) in self.frames.iter().zip(expected) {
            if frame.cumulative != expected {
                return Err(InvariantViolation::CumulativeMismatch {
                    frame: frame.index,
                    found: frame.cumulative,
                    expected,
                });
            }
        }
        Ok(())
    }
}

/// Running totals per frame, `None` until a frame and all before it resolve
fn cumulative_totals(frames: &[Frame]) -> Vec<Option<u32>> {
    let rolls: Vec<u32> = frames
        .iter()
        .flat_map(|f| f.throws.iter().map(|t| t.pins as u32))
        .collect();

    let mut totals = Vec::with_capacity(frames.len());
    let mut running = 0u32;
    let mut roll_index = 0usize;
    let mut resolved = true;

    for frame in frames {
        let start = roll_index;
        roll_index += frame.throws.len();

        let value = if !resolved || !frame.is_locked() {
            None
        } else if frame.is_last() {
            Some(frame.pin_total())
        } else if frame.is_strike() {
            match (rolls.get(start + 1), rolls.get(start + 2)) {
                (Some(a), Some(b)) => Some(10 + a + b),
                _ => None,
            }
        } else if frame.is_spare() {
            rolls.get(start + 2).map(|a| 10 + a)
        } else {
            Some(frame.pin_total())
        };

        match value {
            Some(v) => {
                running += v;
                totals.push(Some(running));
            }
            None => {
                resolved = false;
                totals.push(None);
            }
        }
    }
    totals
}
