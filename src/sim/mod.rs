//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body handle)
//! - No rendering or platform dependencies; physics only through `PhysicsAdapter`
//!   (`LaneWorld` adapts rapier3d)

pub mod catalog;
pub mod controller;
pub mod events;
pub mod lane_world;
pub mod physics;
pub mod scoreboard;
pub mod state;
pub mod throw;

pub use catalog::{BALL_PRESETS, BallPreset, DEFAULT_BALL_ID, get_ball_preset};
pub use controller::{GameController, gutter_rail_x};
pub use events::{EventQueue, GameEvent, GameListener, dispatch};
pub use lane_world::LaneWorld;
pub use physics::{
    BodyDesc, BodyHandle, BodyType, ContactParams, MaterialKind, PhysicsAdapter, Pose, Shape,
};
pub use scoreboard::{
    FRAME_COUNT, Frame, FrameScoreboard, FrameState, RACK_SIZE, RecordOutcome, Throw, ThrowSymbol,
};
pub use state::{BallInPlay, GamePhase, Pin, PinId, rack_positions};
pub use throw::{EndReason, FallCriterion, ThrowEnd, ThrowEngine, clamp_release};
