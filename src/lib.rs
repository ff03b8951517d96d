//! Ten Pin - a bowling lane simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics contract, throws, scoring, game flow)
//! - `settings`: Difficulty profiles and player configuration
//! - `error`: Configuration and invariant errors

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, InvariantViolation};
pub use settings::{Difficulty, DifficultyProfile, Settings, get_difficulty_profile};

use glam::{Quat, Vec3};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for stable contacts)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per display frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 3;
    /// Gravity magnitude (m/s²)
    pub const GRAVITY: f32 = 9.82;

    /// Lane dimensions. Forward is -Z, the foul line sits at z = 0.
    pub const LANE_HALF_WIDTH: f32 = 0.6;
    pub const LANE_LENGTH: f32 = 12.0;
    pub const LANE_HALF_THICKNESS: f32 = 0.025;
    /// Ball past this z has left the pin deck
    pub const PIN_DECK_FAR_Z: f32 = -12.0;
    /// Run-up surface behind the foul line
    pub const APPROACH_LENGTH: f32 = 1.0;
    /// Ball below this height has fallen off the lane
    pub const LANE_DROP_Y: f32 = -0.5;

    /// Gutter channel beside the playable surface (roughly one ball diameter)
    pub const GUTTER_CHANNEL_WIDTH: f32 = 0.25;
    pub const GUTTER_RAIL_HALF_THICKNESS: f32 = 0.02;
    pub const GUTTER_RAIL_HALF_HEIGHT: f32 = 0.2;
    /// Lateral slack past the playable edge before the ball counts as in the gutter
    pub const GUTTER_MARGIN: f32 = 0.03;

    /// Rack layout
    pub const PIN_COUNT: usize = 10;
    pub const RACK_FRONT_Z: f32 = -8.0;
    pub const PIN_SPACING: f32 = 0.16;
    pub const PIN_ROW_SPACING: f32 = 0.32;

    /// Pin body
    pub const PIN_RADIUS: f32 = 0.06;
    pub const PIN_HEIGHT: f32 = 0.38;
    pub const PIN_BASE_RADIUS: f32 = 0.07;
    pub const PIN_MASS: f32 = 1.5;
    pub const PIN_LINEAR_DAMPING: f32 = 0.01;
    pub const PIN_ANGULAR_DAMPING: f32 = 0.35;
    /// Tilt from upright past which a pin counts as fallen (~65°)
    pub const PIN_FALL_TILT: f32 = 65.0 * std::f32::consts::PI / 180.0;
    /// Contact distance used by the proximity fallback criterion
    pub const PROXIMITY_PIN_RADIUS: f32 = 0.12;
    /// Pins keep being watched this long after the ball's throw is over (seconds)
    pub const PIN_SETTLE_SECS: f32 = 0.5;

    /// Ball body
    pub const BALL_LINEAR_DAMPING: f32 = 0.03;
    pub const BALL_ANGULAR_DAMPING: f32 = 0.15;
    /// Below this speed a rolling ball has stopped
    pub const BALL_STOP_SPEED: f32 = 0.15;

    /// Launch tuning: speed = base + scale * power
    pub const LAUNCH_BASE_SPEED: f32 = 6.0;
    pub const LAUNCH_POWER_SCALE: f32 = 0.3;
    /// Scales the (1 - stability) lateral jitter down to a slight curve
    pub const LAUNCH_JITTER_DAMPING: f32 = 0.15;
    /// Realistic release speed band for direct velocity launches
    pub const RELEASE_MIN_SPEED: f32 = 2.0;
    pub const RELEASE_MAX_SPEED: f32 = 11.0;

    /// Pause between a locked frame and the next rack (seconds)
    pub const AUTO_ADVANCE_DELAY: f32 = 3.0;
}

/// Angle (radians) between a body's local up axis and world up
#[inline]
pub fn tilt_from_upright(rotation: Quat) -> f32 {
    let up = rotation * Vec3::Y;
    up.dot(Vec3::Y).clamp(-1.0, 1.0).acos()
}

/// Project a vector onto the lane plane (drop the vertical component)
#[inline]
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Playable half-width once gutters of the given width fraction are carved out
#[inline]
pub fn playable_half_width(gutter_width_fraction: f32) -> f32 {
    consts::LANE_HALF_WIDTH - gutter_width_fraction * 0.5
}
