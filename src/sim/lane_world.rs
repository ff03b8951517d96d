//! Built-in physics world backed by rapier3d
//!
//! `LaneWorld` is a thin `PhysicsAdapter` over a rapier pipeline. Each body
//! gets exactly one collider. The collider's user data holds its
//! `MaterialKind` so a contact hook can apply the friction and restitution
//! registered for the material pair.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use log::trace;
use rapier3d::na::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use super::physics::{
    BodyDesc, BodyHandle, BodyType, ContactParams, ContactTable, MaterialKind, PhysicsAdapter,
    Pose, Shape, StepAccumulator,
};
use crate::consts::GRAVITY;

// ---------------------------------------------------------------------------
// Conversion helpers (private) - glam <-> nalgebra
// ---------------------------------------------------------------------------

fn vec3_to_na(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

fn na_to_vec3(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn pose_to_iso(pose: &Pose) -> Isometry3<f32> {
    let p = pose.position;
    let q = pose.rotation.normalize();
    Isometry3::from_parts(
        Translation3::new(p.x, p.y, p.z),
        UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z)),
    )
}

fn iso_to_pose(iso: &Isometry3<f32>) -> Pose {
    let t = iso.translation.vector;
    let q = iso.rotation.coords;
    Pose {
        position: Vec3::new(t.x, t.y, t.z),
        rotation: Quat::from_xyzw(q.x, q.y, q.z, q.w),
    }
}

fn rigid_body_type(body_type: BodyType) -> RigidBodyType {
    match body_type {
        BodyType::Dynamic => RigidBodyType::Dynamic,
        BodyType::Fixed => RigidBodyType::Fixed,
    }
}

/// Collider for a shape, positioned relative to the body origin
fn build_collider(shape: Shape) -> ColliderBuilder {
    match shape {
        Shape::Sphere { radius } => ColliderBuilder::ball(radius),
        // Body origin is the base center; the cylinder is centered on its axis
        Shape::Pin { radius, height } => ColliderBuilder::cylinder(height * 0.5, radius)
            .translation(Vector3::new(0.0, height * 0.5, 0.0)),
        Shape::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
    }
}

fn material_of(collider: &Collider) -> MaterialKind {
    MaterialKind::from_index(collider.user_data as usize).unwrap_or(MaterialKind::Lane)
}

/// Rewrites solver contacts with the parameters of the touching material pair
struct PairMaterials<'a> {
    table: &'a ContactTable,
}

impl PhysicsHooks for PairMaterials<'_> {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let (Some(a), Some(b)) = (
            context.colliders.get(context.collider1),
            context.colliders.get(context.collider2),
        ) else {
            return;
        };
        let ContactParams {
            friction,
            restitution,
        } = self.table.get(material_of(a), material_of(b));
        // Collider friction carries the per-body surface term
        let friction = friction + a.friction() + b.friction();
        for contact in context.solver_contacts.iter_mut() {
            contact.friction = friction;
            contact.restitution = restitution;
        }
    }
}

/// Wraps the rapier3d boilerplate behind `PhysicsAdapter`.
pub struct LaneWorld {
    gravity: Vector3<f32>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    /// Ordered by handle so iteration stays stable
    handles: BTreeMap<BodyHandle, RigidBodyHandle>,
    contacts: ContactTable,
    stepper: StepAccumulator,
    next_id: u32,
    step_count: u64,
}

impl LaneWorld {
    pub fn new() -> Self {
        Self {
            gravity: Vector3::new(0.0, -GRAVITY, 0.0),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            handles: BTreeMap::new(),
            contacts: ContactTable::default(),
            stepper: StepAccumulator::default(),
            next_id: 0,
            step_count: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    /// Fixed steps run since creation
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn angular_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.rigid_body(handle).map(|rb| na_to_vec3(rb.angvel()))
    }

    fn rigid_body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(*self.handles.get(&handle)?)
    }

    fn rigid_body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(*self.handles.get(&handle)?)
    }
}

impl Default for LaneWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsAdapter for LaneWorld {
    fn reset(&mut self) {
        self.island_manager = IslandManager::new();
        self.broad_phase = DefaultBroadPhase::new();
        self.narrow_phase = NarrowPhase::new();
        self.bodies = RigidBodySet::new();
        self.colliders = ColliderSet::new();
        self.impulse_joints = ImpulseJointSet::new();
        self.multibody_joints = MultibodyJointSet::new();
        self.ccd_solver = CCDSolver::new();
        self.query_pipeline = QueryPipeline::new();
        self.handles.clear();
        self.contacts.clear();
        self.stepper.clear();
    }

    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;

        let rb = RigidBodyBuilder::new(rigid_body_type(desc.body_type))
            .position(pose_to_iso(&desc.pose))
            .linear_damping(desc.linear_damping)
            .angular_damping(desc.angular_damping)
            .ccd_enabled(matches!(desc.shape, Shape::Sphere { .. }))
            .user_data(handle.0 as u128)
            .build();
        let body = self.bodies.insert(rb);

        let mut collider = build_collider(desc.shape)
            .friction(desc.friction)
            .restitution(0.0)
            .user_data(desc.material.index() as u128)
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS);
        if desc.body_type == BodyType::Dynamic && desc.mass > 0.0 {
            collider = collider.mass(desc.mass);
        }
        self.colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);

        self.handles.insert(handle, body);
        trace!("Created {:?} {:?} as {:?}", desc.material, desc.shape, handle);
        handle
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        let Some(body) = self.handles.remove(&handle) else {
            return false;
        };
        self.bodies
            .remove(
                body,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.rigid_body(handle).map(|rb| na_to_vec3(rb.linvel()))
    }

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_mut(handle) {
            rb.set_linvel(vec3_to_na(velocity), true);
        }
    }

    fn pose(&self, handle: BodyHandle) -> Option<Pose> {
        self.rigid_body(handle).map(|rb| iso_to_pose(rb.position()))
    }

    fn set_pose(&mut self, handle: BodyHandle, pose: Pose) {
        if let Some(rb) = self.rigid_body_mut(handle) {
            rb.set_position(pose_to_iso(&pose), true);
        }
    }

    fn step(&mut self, fixed_dt: f32, real_dt: f32, max_substeps: u32) -> u32 {
        let steps = self.stepper.advance(fixed_dt, real_dt, max_substeps);
        self.integration_parameters.dt = fixed_dt;
        let hooks = PairMaterials {
            table: &self.contacts,
        };
        for _ in 0..steps {
            self.physics_pipeline.step(
                &self.gravity,
                &self.integration_parameters,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                Some(&mut self.query_pipeline),
                &hooks,
                &(),
            );
            self.step_count += 1;
        }
        steps
    }

    fn set_contact_material(&mut self, a: MaterialKind, b: MaterialKind, params: ContactParams) {
        self.contacts.set(a, b, params);
    }
}
