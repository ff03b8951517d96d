//! Physics engine contract
//!
//! The simulation never touches engine internals. Everything it needs from a
//! rigid-body engine goes through `PhysicsAdapter`: create/remove bodies,
//! read/write linear velocity and pose, per-material-pair contact tuning and
//! fixed-timestep stepping. `LaneWorld` is the built-in implementation; tests
//! substitute a scripted double.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a body owned by a physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// The kind of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Dynamic,
    Fixed,
}

/// Collision shape
///
/// A `Pin` is an upright cylinder whose pose position is the center of its
/// base, so a pin standing on the lane sits at y = 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Pin { radius: f32, height: f32 },
    Cuboid { half_extents: Vec3 },
}

/// Surface materials that take part in contact pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialKind {
    Lane,
    Ball,
    Pin,
    Rail,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 4] = [
        MaterialKind::Lane,
        MaterialKind::Ball,
        MaterialKind::Pin,
        MaterialKind::Rail,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<MaterialKind> {
        Self::ALL.get(index).copied()
    }
}

/// Friction/restitution for a pair of materials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactParams {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.05,
        }
    }
}

/// Position + orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// World-space up axis of the body
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

/// Builder for describing a rigid body before creation.
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub body_type: BodyType,
    pub shape: Shape,
    pub material: MaterialKind,
    pub mass: f32,
    /// Per-body surface friction, added to the pair friction of every contact
    pub friction: f32,
    pub pose: Pose,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDesc {
    /// Create a dynamic body description with the given shape and mass.
    pub fn dynamic(shape: Shape, mass: f32) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            shape,
            material: MaterialKind::Ball,
            mass,
            friction: 0.0,
            pose: Pose::default(),
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    /// Create a fixed (static) body description with the given shape.
    pub fn fixed(shape: Shape) -> Self {
        Self {
            body_type: BodyType::Fixed,
            shape,
            material: MaterialKind::Lane,
            mass: 0.0,
            friction: 0.0,
            pose: Pose::default(),
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.pose.position = position;
        self
    }

    pub fn with_material(mut self, material: MaterialKind) -> Self {
        self.material = material;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Set linear and angular damping coefficients.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }
}

/// What the simulation requires from a rigid-body engine
pub trait PhysicsAdapter {
    /// Drop every body and contact material, back to an empty world
    fn reset(&mut self);

    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Returns false if the handle was not live
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3>;

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3);

    fn pose(&self, handle: BodyHandle) -> Option<Pose>;

    fn set_pose(&mut self, handle: BodyHandle, pose: Pose);

    /// Advance by `real_dt` using fixed `fixed_dt` steps, at most
    /// `max_substeps` of them. Returns the number of steps taken.
    fn step(&mut self, fixed_dt: f32, real_dt: f32, max_substeps: u32) -> u32;

    fn set_contact_material(&mut self, a: MaterialKind, b: MaterialKind, params: ContactParams);
}

/// Contact parameters keyed by unordered material pair
#[derive(Debug, Clone, Default)]
pub struct ContactTable {
    pairs: Vec<((MaterialKind, MaterialKind), ContactParams)>,
    fallback: ContactParams,
}

impl ContactTable {
    fn key(a: MaterialKind, b: MaterialKind) -> (MaterialKind, MaterialKind) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn set(&mut self, a: MaterialKind, b: MaterialKind, params: ContactParams) {
        let key = Self::key(a, b);
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = params,
            None => self.pairs.push((key, params)),
        }
    }

    /// Registered parameters for the pair, or the world default
    pub fn get(&self, a: MaterialKind, b: MaterialKind) -> ContactParams {
        let key = Self::key(a, b);
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| *p)
            .unwrap_or(self.fallback)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

/// Fixed-timestep accumulator shared by world implementations
#[derive(Debug, Clone, Default)]
pub struct StepAccumulator {
    accumulator: f32,
}

impl StepAccumulator {
    /// Bank `real_dt` and return how many fixed steps to run now.
    /// Backlog beyond `max_substeps` is dropped to prevent spiral of death.
    pub fn advance(&mut self, fixed_dt: f32, real_dt: f32, max_substeps: u32) -> u32 {
        if fixed_dt <= 0.0 || !real_dt.is_finite() || real_dt <= 0.0 {
            return 0;
        }
        self.accumulator += real_dt;

        let mut steps = 0;
        while self.accumulator >= fixed_dt && steps < max_substeps {
            self.accumulator -= fixed_dt;
            steps += 1;
        }
        if self.accumulator >= fixed_dt {
            self.accumulator %= fixed_dt;
        }
        steps
    }

    pub fn clear(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Deterministic stand-in for a real engine: bodies move in straight lines,
/// rolling spheres can be given a lateral drift, and tests topple pins by hand.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone)]
    struct ScriptedBody {
        handle: BodyHandle,
        desc: BodyDesc,
        pose: Pose,
        velocity: Vec3,
    }

    #[derive(Debug, Default)]
    pub(crate) struct ScriptedWorld {
        bodies: Vec<ScriptedBody>,
        next_id: u32,
        stepper: StepAccumulator,
        pub contacts: ContactTable,
        /// Lateral acceleration applied to every dynamic sphere (m/s²)
        pub lateral_drift: f32,
        pub steps: u64,
        pub resets: u32,
    }

    impl ScriptedWorld {
        pub fn new() -> Self {
            Self::default()
        }

        /// Lay a body on its side
        pub fn topple(&mut self, handle: BodyHandle) {
            if let Some(body) = self.bodies.iter_mut().find(|b| b.handle == handle) {
                body.pose.rotation = Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2);
            }
        }

        /// Tilt a body about X by the given angle
        pub fn tilt(&mut self, handle: BodyHandle, angle: f32) {
            if let Some(body) = self.bodies.iter_mut().find(|b| b.handle == handle) {
                body.pose.rotation = Quat::from_rotation_x(angle);
            }
        }

        pub fn body_count(&self) -> usize {
            self.bodies.len()
        }

        pub fn count_material(&self, material: MaterialKind) -> usize {
            self.bodies
                .iter()
                .filter(|b| b.desc.material == material)
                .count()
        }
    }

    impl PhysicsAdapter for ScriptedWorld {
        fn reset(&mut self) {
            self.bodies.clear();
            self.contacts.clear();
            self.stepper.clear();
            self.resets += 1;
        }

        fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
            let handle = BodyHandle(self.next_id);
            self.next_id += 1;
            self.bodies.push(ScriptedBody {
                handle,
                desc: desc.clone(),
                pose: desc.pose,
                velocity: Vec3::ZERO,
            });
            handle
        }

        fn remove_body(&mut self, handle: BodyHandle) -> bool {
            let before = self.bodies.len();
            self.bodies.retain(|b| b.handle != handle);
            self.bodies.len() != before
        }

        fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
            self.bodies
                .iter()
                .find(|b| b.handle == handle)
                .map(|b| b.velocity)
        }

        fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
            if let Some(body) = self.bodies.iter_mut().find(|b| b.handle == handle) {
                body.velocity = velocity;
            }
        }

        fn pose(&self, handle: BodyHandle) -> Option<Pose> {
            self.bodies.iter().find(|b| b.handle == handle).map(|b| b.pose)
        }

        fn set_pose(&mut self, handle: BodyHandle, pose: Pose) {
            if let Some(body) = self.bodies.iter_mut().find(|b| b.handle == handle) {
                body.pose = pose;
            }
        }

        fn step(&mut self, fixed_dt: f32, real_dt: f32, max_substeps: u32) -> u32 {
            let steps = self.stepper.advance(fixed_dt, real_dt, max_substeps);
            for _ in 0..steps {
                for body in &mut self.bodies {
                    if body.desc.body_type != BodyType::Dynamic {
                        continue;
                    }
                    body.pose.position += body.velocity * fixed_dt;
                    if matches!(body.desc.shape, Shape::Sphere { .. }) {
                        body.velocity.x += self.lateral_drift * fixed_dt;
                    }
                }
                self.steps += 1;
            }
            steps
        }

        fn set_contact_material(&mut self, a: MaterialKind, b: MaterialKind, params: ContactParams) {
            self.contacts.set(a, b, params);
        }
    }
}
