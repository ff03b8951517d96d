//! Lane entities and game phase
//!
//! Pins and the ball are views over bodies owned by the physics world: the
//! handle is the link, the pose/velocity fields are refreshed every tick.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::catalog::BallPreset;
use super::physics::{BodyDesc, BodyHandle, MaterialKind, Pose, Shape};
use crate::consts::*;

/// Current phase of the game flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Ball waiting on the approach for a launch
    AwaitingThrow,
    /// Ball in flight down the lane
    Rolling,
    /// Frame locked, waiting out the pause before the next rack
    FrameComplete,
    /// Tenth frame locked and the pause elapsed
    Finished,
}

/// Pin number, 1 (head pin) to 10, counted row by row from the bowler's left
pub type PinId = u8;

/// A pin entity
#[derive(Debug, Clone, Serialize)]
pub struct Pin {
    pub id: PinId,
    pub handle: BodyHandle,
    pub pose: Pose,
    /// Set once, never cleared while this rack stands
    pub fallen: bool,
}

impl Pin {
    pub fn new(id: PinId, handle: BodyHandle, position: Vec3) -> Self {
        Self {
            id,
            handle,
            pose: Pose::at(position),
            fallen: false,
        }
    }

    /// Flag the pin as fallen. Returns true only on the first call.
    pub fn mark_fallen(&mut self) -> bool {
        if self.fallen {
            return false;
        }
        self.fallen = true;
        true
    }

    /// Physics description for a pin standing at `position` (base center)
    pub fn body_desc(position: Vec3) -> BodyDesc {
        BodyDesc::dynamic(
            Shape::Pin {
                radius: PIN_RADIUS,
                height: PIN_HEIGHT,
            },
            PIN_MASS,
        )
        .with_material(MaterialKind::Pin)
        .with_damping(PIN_LINEAR_DAMPING, PIN_ANGULAR_DAMPING)
        .with_position(position)
    }
}

/// The ball for the current throw
#[derive(Debug, Clone, Serialize)]
pub struct BallInPlay {
    pub preset: &'static BallPreset,
    pub handle: BodyHandle,
    pub pose: Pose,
    pub velocity: Vec3,
}

impl BallInPlay {
    pub fn new(preset: &'static BallPreset, handle: BodyHandle) -> Self {
        Self {
            preset,
            handle,
            pose: Pose::at(Self::spawn_position(preset)),
            velocity: Vec3::ZERO,
        }
    }

    /// Resting on the lane at the foul line
    pub fn spawn_position(preset: &BallPreset) -> Vec3 {
        Vec3::new(0.0, preset.radius, 0.0)
    }

    /// Physics description for a fresh ball of the given preset
    pub fn body_desc(preset: &BallPreset) -> BodyDesc {
        BodyDesc::dynamic(
            Shape::Sphere {
                radius: preset.radius,
            },
            preset.mass,
        )
        .with_material(MaterialKind::Ball)
        .with_friction(preset.surface_friction)
        .with_damping(BALL_LINEAR_DAMPING, BALL_ANGULAR_DAMPING)
        .with_position(Self::spawn_position(preset))
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// Base positions of the standard four-row triangle, head pin first
pub fn rack_positions() -> [Vec3; PIN_COUNT] {
    let mut positions = [Vec3::ZERO; PIN_COUNT];
    let mut index = 0;
    let mut z = RACK_FRONT_Z;
    for row in 1..=4 {
        let offset = (row - 1) as f32 * PIN_SPACING * 0.5;
        for i in 0..row {
            positions[index] = Vec3::new(i as f32 * PIN_SPACING - offset, 0.0, z);
            index += 1;
        }
        z -= PIN_ROW_SPACING;
    }
    positions
}
