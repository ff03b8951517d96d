//! Error types
//!
//! Only configuration errors are meant to reach a caller. Invariant
//! violations mean the scoring state machine was driven wrongly and exist so
//! tests (and the controller's consistency check) can see them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown difficulty: {name} (expected easy, normal or hard)")]
    UnknownDifficulty { name: String },

    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Frame {frame} is locked")]
    FrameLocked { frame: usize },

    #[error("Frame {frame} already holds {throws} throws (budget {budget})")]
    ThrowBudgetExceeded {
        frame: usize,
        throws: usize,
        budget: usize,
    },

    #[error("Frame {frame}: knocked down {pins} pins with only {standing} standing")]
    TooManyPins {
        frame: usize,
        pins: u8,
        standing: u8,
    },

    #[error("Frame {frame}: locked = {locked} but {throws} of {budget} throws recorded")]
    LockStateMismatch {
        frame: usize,
        locked: bool,
        throws: usize,
        budget: usize,
    },

    #[error("Game already finished")]
    GameFinished,

    #[error("Frame {frame}: cumulative score {found:?} does not match expected {expected:?}")]
    CumulativeMismatch {
        frame: usize,
        found: Option<u32>,
        expected: Option<u32>,
    },

    #[error("Frame {frame} is unlocked but the current frame is {current}")]
    OutOfOrder { frame: usize, current: usize },
}

impl InvariantViolation {
    /// Frame the violation was detected on, if it is frame-specific
    pub fn frame(&self) -> Option<usize> {
        match self {
            InvariantViolation::FrameLocked { frame }
            | InvariantViolation::ThrowBudgetExceeded { frame, .. }
            | InvariantViolation::TooManyPins { frame, .. }
            | InvariantViolation::LockStateMismatch { frame, .. }
            | InvariantViolation::CumulativeMismatch { frame, .. }
            | InvariantViolation::OutOfOrder { frame, .. } => Some(*frame),
            InvariantViolation::GameFinished => None,
        }
    }
}
