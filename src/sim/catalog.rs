//! Ball presets
//!
//! Masses are real-world weights converted to kilograms (light ~7 lb,
//! standard ~15 lb, heavy 16 lb). Radii hover around the regulation 0.1085 m.

use serde::Serialize;

/// Preset returned for absent or unknown ids
pub const DEFAULT_BALL_ID: &str = "standard";

/// An immutable ball preset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BallPreset {
    pub id: &'static str,
    pub label: &'static str,
    /// kg
    pub mass: f32,
    /// m
    pub radius: f32,
    /// Extra rolling resistance added on top of the lane friction
    pub surface_friction: f32,
    /// Display color (0xRRGGBB), metadata only
    pub color: u32,
}

pub static BALL_PRESETS: [BallPreset; 3] = [
    BallPreset {
        id: "light",
        label: "Light",
        mass: 3.2,
        radius: 0.105,
        surface_friction: 0.07,
        color: 0x44aaee,
    },
    BallPreset {
        id: "standard",
        label: "Standard",
        mass: 6.8,
        radius: 0.1085,
        surface_friction: 0.05,
        color: 0x3366ff,
    },
    BallPreset {
        id: "heavy",
        label: "Heavy",
        mass: 7.26,
        radius: 0.1095,
        surface_friction: 0.04,
        color: 0x2222aa,
    },
];

/// Find a preset by id, falling back to "standard"
pub fn get_ball_preset(id: Option<&str>) -> &'static BallPreset {
    let wanted = id.unwrap_or(DEFAULT_BALL_ID);
    BALL_PRESETS
        .iter()
        .find(|p| p.id == wanted)
        .unwrap_or(&BALL_PRESETS[1])
}
