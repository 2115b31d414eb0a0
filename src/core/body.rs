use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::collision::contact::ContactKey;
use crate::core::types::{transform_for, MassData, Position, Sweep, Transform, Velocity};
use crate::utils::allocator::EntityId;
use crate::utils::math::cross;

/// Simulation role of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Zero mass, zero velocity; moved only through the API.
    Static,
    /// Zero mass, velocity set by the user; unaffected by forces.
    Kinematic,
    /// Positive mass, velocity determined by forces and impulses.
    #[default]
    Dynamic,
}

impl BodyType {
    /// Speedable bodies integrate velocity (dynamic or kinematic).
    pub fn is_speedable(self) -> bool {
        !matches!(self, BodyType::Static)
    }

    /// Accelerable bodies integrate acceleration (dynamic only).
    pub fn is_accelerable(self) -> bool {
        matches!(self, BodyType::Dynamic)
    }
}

/// Core rigid body: kinematic state, mass state, flags, and incidence lists.
#[derive(Debug, Clone)]
pub struct Body {
    pub body_type: BodyType,
    /// Current body-origin transform; kept in sync with `sweep.pos1`.
    pub transform: Transform,
    pub sweep: Sweep,
    pub velocity: Velocity,

    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,

    /// Per-step force accumulator, cleared after each step.
    pub force: Vec2,
    /// Per-step torque accumulator, cleared after each step.
    pub torque: f32,

    pub is_awake: bool,
    pub is_enabled: bool,
    pub allow_sleep: bool,
    pub fixed_rotation: bool,
    /// Bullet flag: eligible for continuous collision detection.
    pub is_impenetrable: bool,
    pub mass_data_dirty: bool,
    pub is_islanded: bool,

    /// Seconds this body has stayed under the sleep velocity tolerances.
    pub under_active_time: f32,

    /// Attached shape ids, in attachment order.
    pub shapes: Vec<EntityId>,
    /// Incident contacts, keyed for duplicate lookup.
    pub contacts: Vec<(ContactKey, EntityId)>,
    /// Incident joints as `(other_body, joint)` pairs.
    pub joints: Vec<(EntityId, EntityId)>,
    /// Broad-phase leaves owned by this body's shape children.
    pub proxies: Vec<u32>,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            transform: Transform::IDENTITY,
            sweep: Sweep::default(),
            velocity: Velocity::default(),
            inv_mass: 1.0,
            inv_inertia: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            force: Vec2::ZERO,
            torque: 0.0,
            is_awake: true,
            is_enabled: true,
            allow_sleep: true,
            fixed_rotation: false,
            is_impenetrable: false,
            mass_data_dirty: false,
            is_islanded: false,
            under_active_time: 0.0,
            shapes: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            proxies: Vec::new(),
        }
    }
}

impl Body {
    pub fn builder() -> BodyBuilder {
        BodyBuilder::new()
    }

    pub fn is_speedable(&self) -> bool {
        self.body_type.is_speedable()
    }

    pub fn is_accelerable(&self) -> bool {
        self.body_type.is_accelerable()
    }

    /// World-space center of mass at the end of the step.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.pos1.linear
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn angle(&self) -> f32 {
        self.sweep.pos1.angular
    }

    /// Wakes the body and restarts its under-active clock.
    pub fn set_awake(&mut self) {
        if self.is_speedable() {
            self.is_awake = true;
            self.under_active_time = 0.0;
        }
    }

    /// Puts the body to sleep, zeroing its velocity and accumulators.
    pub fn unset_awake(&mut self) {
        self.is_awake = false;
        self.velocity = Velocity::default();
        self.force = Vec2::ZERO;
        self.torque = 0.0;
        self.under_active_time = 0.0;
    }

    /// Teleports the body origin; sweep collapses to the new pose.
    pub fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.transform = Transform::from_angle(position, angle);
        let center = self.transform.transform_point(self.sweep.local_center);
        self.sweep = Sweep::new(Position::new(center, angle), self.sweep.local_center);
    }

    /// Installs solved sweep state and refreshes the cached transform.
    ///
    /// Returns true when the transform actually changed.
    pub fn update_from_position(&mut self, pos: Position) -> bool {
        self.sweep.pos1 = pos;
        let new_xf = transform_for(pos, self.sweep.local_center);
        if new_xf != self.transform {
            self.transform = new_xf;
            true
        } else {
            false
        }
    }

    /// Advances the sweep origin to step fraction `alpha` and installs the
    /// interpolated transform, as done when stepping a body to a TOI.
    pub fn advance(&mut self, alpha: f32) {
        self.sweep.advance0(alpha);
        self.sweep.pos1 = self.sweep.pos0;
        self.transform = transform_for(self.sweep.pos0, self.sweep.local_center);
    }

    /// Restores a sweep snapshot taken before a speculative TOI advance.
    pub fn restore_sweep(&mut self, backup: Sweep) {
        self.sweep = backup;
        self.transform = transform_for(backup.pos1, backup.local_center);
    }

    /// Installs mass data, preserving the world velocity of the new center.
    pub fn set_mass_data(&mut self, data: &MassData) {
        if !self.is_accelerable() {
            self.inv_mass = 0.0;
            self.inv_inertia = 0.0;
            return;
        }

        let mass = if data.mass > 0.0 { data.mass } else { 1.0 };
        self.inv_mass = 1.0 / mass;

        if data.inertia > 0.0 && !self.fixed_rotation {
            // Inertia about the center of mass.
            let inertia = data.inertia - mass * data.center.length_squared();
            self.inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
        } else {
            self.inv_inertia = 0.0;
        }

        let old_center = self.world_center();
        self.sweep.local_center = data.center;
        let new_center = self.transform.transform_point(data.center);
        self.sweep.pos0.linear = new_center;
        self.sweep.pos1.linear = new_center;
        self.velocity.linear += crate::utils::math::cross_sv(
            self.velocity.angular,
            new_center - old_center,
        );
        self.mass_data_dirty = false;
    }

    pub fn apply_force(&mut self, force: Vec2, point: Vec2) {
        if !self.is_accelerable() {
            return;
        }
        self.force += force;
        self.torque += cross(point - self.world_center(), force);
        self.set_awake();
    }

    pub fn apply_force_to_center(&mut self, force: Vec2) {
        if !self.is_accelerable() {
            return;
        }
        self.force += force;
        self.set_awake();
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if !self.is_accelerable() {
            return;
        }
        self.torque += torque;
        self.set_awake();
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if !self.is_accelerable() {
            return;
        }
        self.velocity.linear += impulse * self.inv_mass;
        self.velocity.angular += self.inv_inertia * cross(point - self.world_center(), impulse);
        self.set_awake();
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        if !self.is_accelerable() {
            return;
        }
        self.velocity.angular += self.inv_inertia * impulse;
        self.set_awake();
    }

    /// Looks up an incident contact by broad-phase pair key.
    pub fn find_contact(&self, key: ContactKey) -> Option<EntityId> {
        self.contacts
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, id)| *id)
    }

    pub fn insert_contact(&mut self, key: ContactKey, id: EntityId) {
        self.contacts.push((key, id));
    }

    pub fn erase_contact(&mut self, id: EntityId) {
        self.contacts.retain(|(_, c)| *c != id);
    }

    pub fn insert_joint(&mut self, other: EntityId, joint: EntityId) {
        self.joints.push((other, joint));
    }

    pub fn erase_joint(&mut self, joint: EntityId) {
        self.joints.retain(|(_, j)| *j != joint);
    }

    /// True when a joint with collision disabled connects this body to `other`.
    pub fn is_joined_excluding_collision(
        &self,
        other: EntityId,
        collide_connected: impl Fn(EntityId) -> bool,
    ) -> bool {
        self.joints
            .iter()
            .any(|(o, j)| *o == other && !collide_connected(*j))
    }
}

/// Fluent constructor for bodies, mirroring the shape builder style.
pub struct BodyBuilder {
    body: Body,
}

impl Default for BodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self {
            body: Body::default(),
        }
    }

    pub fn body_type(mut self, body_type: BodyType) -> Self {
        self.body.body_type = body_type;
        if !body_type.is_accelerable() {
            self.body.inv_mass = 0.0;
            self.body.inv_inertia = 0.0;
        }
        if !body_type.is_speedable() {
            self.body.velocity = Velocity::default();
            self.body.is_awake = false;
        }
        self
    }

    pub fn position(mut self, position: Vec2) -> Self {
        let angle = self.body.angle();
        self.body.set_transform(position, angle);
        self
    }

    pub fn angle(mut self, radians: f32) -> Self {
        let position = self.body.transform.p;
        self.body.set_transform(position, radians);
        self
    }

    pub fn linear_velocity(mut self, v: Vec2) -> Self {
        self.body.velocity.linear = v;
        self
    }

    pub fn angular_velocity(mut self, w: f32) -> Self {
        self.body.velocity.angular = w;
        self
    }

    pub fn linear_damping(mut self, d: f32) -> Self {
        self.body.linear_damping = d;
        self
    }

    pub fn angular_damping(mut self, d: f32) -> Self {
        self.body.angular_damping = d;
        self
    }

    pub fn gravity_scale(mut self, scale: f32) -> Self {
        self.body.gravity_scale = scale;
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.body.fixed_rotation = fixed;
        if fixed {
            self.body.velocity.angular = 0.0;
        }
        self
    }

    /// Marks the body impenetrable (a bullet) for continuous collision.
    pub fn bullet(mut self, impenetrable: bool) -> Self {
        self.body.is_impenetrable = impenetrable;
        self
    }

    pub fn allow_sleep(mut self, allow: bool) -> Self {
        self.body.allow_sleep = allow;
        self
    }

    pub fn awake(mut self, awake: bool) -> Self {
        self.body.is_awake = awake && self.body.is_speedable();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.body.is_enabled = enabled;
        self
    }

    pub fn build(self) -> Body {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bodies_carry_no_inverse_mass() {
        let body = Body::builder().body_type(BodyType::Static).build();
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia, 0.0);
        assert!(!body.is_speedable());
        assert!(!body.is_accelerable());
    }

    #[test]
    fn linear_impulse_at_center_leaves_spin_alone() {
        let mut body = Body::builder().build();
        body.set_mass_data(&MassData::new(2.0, 1.0, Vec2::ZERO));
        body.apply_linear_impulse(Vec2::new(4.0, 0.0), body.world_center());
        assert!((body.velocity.linear.x - 2.0).abs() < 1e-6);
        assert_eq!(body.velocity.angular, 0.0);
    }

    #[test]
    fn set_transform_collapses_sweep() {
        let mut body = Body::builder().build();
        body.set_transform(Vec2::new(5.0, -1.0), 0.3);
        assert_eq!(body.sweep.pos0, body.sweep.pos1);
        assert_eq!(body.sweep.alpha0, 0.0);
        assert!((body.transform.p - Vec2::new(5.0, -1.0)).length() < 1e-6);
        assert!((body.angle() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn fixed_rotation_discards_inertia() {
        let mut body = Body::builder().fixed_rotation(true).build();
        body.set_mass_data(&MassData::new(1.0, 3.0, Vec2::ZERO));
        assert_eq!(body.inv_inertia, 0.0);
        body.apply_angular_impulse(1.0);
        assert_eq!(body.velocity.angular, 0.0);
    }

    #[test]
    fn sleep_clears_motion_state(){
        let mut body = Body::builder().linear_velocity(Vec2::X).build();
        body.apply_torque(2.0);
        body.unset_awake();
        assert!(!body.is_awake);
        assert_eq!(body.velocity, Velocity::default());
        assert_eq!(body.force, Vec2::ZERO);
        assert_eq!(body.torque, 0.0);
    }
}
