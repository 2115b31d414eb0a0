pub mod contact_manager;
pub mod step;

use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::broadphase::DynamicTree;
use crate::collision::contact::{Contact, ContactKey};
use crate::collision::manifold::Manifold;
use crate::collision::queries::{ray_cast_proxy, RayCastInput, RayCastOutput};
use crate::config::{
    DEFAULT_GRAVITY, DEFAULT_INITIAL_TREE_SIZE, DEFAULT_MAX_VERTEX_RADIUS,
    DEFAULT_MIN_VERTEX_RADIUS, MAX_BODIES, MAX_JOINTS, MAX_SHAPES,
};
use crate::core::body::{Body, BodyType};
use crate::core::shapes::Shape;
use crate::core::types::{MassData, Transform, Velocity};
use crate::dynamics::island::Island;
use crate::dynamics::joints::Joint;
use crate::errors::{WorldError, WorldResult};
use crate::utils::allocator::{Arena, EntityId};

/// Per-point impulse pair reported to the post-solve listener.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactImpulse {
    pub normal: f32,
    pub tangent: f32,
}

pub(crate) type BeginContactListener = Box<dyn FnMut(EntityId)>;
pub(crate) type EndContactListener = Box<dyn FnMut(EntityId)>;
pub(crate) type PreSolveListener = Box<dyn FnMut(EntityId, &Manifold)>;
pub(crate) type PostSolveListener = Box<dyn FnMut(EntityId, &[ContactImpulse], u32)>;
pub(crate) type DestructionListener = Box<dyn FnMut(EntityId)>;

/// A shape hit found by a world ray cast.
#[derive(Debug, Clone, Copy)]
pub struct RayCastHit {
    pub body: EntityId,
    pub shape: EntityId,
    pub child_index: usize,
    pub point: Vec2,
    pub normal: Vec2,
    pub fraction: f32,
}

/// Central simulation container owning every arena and the broad phase.
pub struct World {
    pub(crate) bodies: Arena<Body>,
    pub(crate) shapes: Arena<Shape>,
    pub(crate) joints: Arena<Joint>,
    pub(crate) contact_arena: Arena<Contact>,
    /// Contact container in insertion order, keyed for duplicate detection.
    pub(crate) contacts: Vec<(ContactKey, EntityId)>,
    pub(crate) tree: DynamicTree,

    pub(crate) gravity: Vec2,
    pub(crate) min_vertex_radius: f32,
    pub(crate) max_vertex_radius: f32,

    /// Leaves that moved since the last pair search.
    pub(crate) moved_proxies: Vec<u32>,
    /// `(body, shape)` attachments awaiting proxy creation or destruction.
    pub(crate) pending_proxies: Vec<(EntityId, EntityId)>,
    /// Bodies teleported through the API since the last step.
    pub(crate) bodies_for_proxy_sync: Vec<EntityId>,
    /// Scratch for pair keys found by the broad phase.
    pub(crate) proxy_keys: Vec<ContactKey>,
    /// Reusable island storage.
    pub(crate) island: Island,

    pub(crate) locked: bool,
    pub(crate) step_complete: bool,
    pub(crate) has_new_shapes: bool,
    pub(crate) inv_dt0: f32,

    pub(crate) begin_contact: Option<BeginContactListener>,
    pub(crate) end_contact: Option<EndContactListener>,
    pub(crate) pre_solve: Option<PreSolveListener>,
    pub(crate) post_solve: Option<PostSolveListener>,
    pub(crate) joint_destruction: Option<DestructionListener>,
    pub(crate) shape_destruction: Option<DestructionListener>,
}

impl Default for World {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Fluent configuration for a new world.
pub struct WorldBuilder {
    gravity: Vec2,
    initial_tree_size: usize,
    min_vertex_radius: f32,
    max_vertex_radius: f32,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            gravity: Vec2::from_slice(&DEFAULT_GRAVITY),
            initial_tree_size: DEFAULT_INITIAL_TREE_SIZE,
            min_vertex_radius: DEFAULT_MIN_VERTEX_RADIUS,
            max_vertex_radius: DEFAULT_MAX_VERTEX_RADIUS,
        }
    }

    pub fn gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn initial_tree_size(mut self, capacity: usize) -> Self {
        self.initial_tree_size = capacity.max(1);
        self
    }

    pub fn vertex_radius_range(mut self, min: f32, max: f32) -> Self {
        self.min_vertex_radius = min;
        self.max_vertex_radius = max;
        self
    }

    pub fn build(self) -> World {
        World {
            bodies: Arena::new(),
            shapes: Arena::new(),
            joints: Arena::new(),
            contact_arena: Arena::new(),
            contacts: Vec::new(),
            tree: DynamicTree::new(self.initial_tree_size),
            gravity: self.gravity,
            min_vertex_radius: self.min_vertex_radius,
            max_vertex_radius: self.max_vertex_radius,
            moved_proxies: Vec::new(),
            pending_proxies: Vec::new(),
            bodies_for_proxy_sync: Vec::new(),
            proxy_keys: Vec::new(),
            island: Island::new(),
            locked: false,
            step_complete: true,
            has_new_shapes: false,
            inv_dt0: 0.0,
            begin_contact: None,
            end_contact: None,
            pre_solve: None,
            post_solve: None,
            joint_destruction: None,
            shape_destruction: None,
        }
    }
}

impl World {
    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    pub fn new(gravity: Vec2) -> Self {
        Self::builder().gravity(gravity).build()
    }

    fn check_unlocked(&self) -> WorldResult<()> {
        if self.locked {
            Err(WorldError::WrongState)
        } else {
            Ok(())
        }
    }

    // ---- listeners -----------------------------------------------------

    pub fn on_begin_contact(&mut self, listener: impl FnMut(EntityId) + 'static) {
        self.begin_contact = Some(Box::new(listener));
    }

    pub fn on_end_contact(&mut self, listener: impl FnMut(EntityId) + 'static) {
        self.end_contact = Some(Box::new(listener));
    }

    pub fn on_pre_solve(&mut self, listener: impl FnMut(EntityId, &Manifold) + 'static) {
        self.pre_solve = Some(Box::new(listener));
    }

    pub fn on_post_solve(
        &mut self,
        listener: impl FnMut(EntityId, &[ContactImpulse], u32) + 'static,
    ) {
        self.post_solve = Some(Box::new(listener));
    }

    pub fn on_joint_destroyed(&mut self, listener: impl FnMut(EntityId) + 'static) {
        self.joint_destruction = Some(Box::new(listener));
    }

    pub fn on_shape_destroyed(&mut self, listener: impl FnMut(EntityId) + 'static) {
        self.shape_destruction = Some(Box::new(listener));
    }

    // ---- bodies --------------------------------------------------------

    pub fn create_body(&mut self, body: Body) -> WorldResult<EntityId> {
        self.check_unlocked()?;
        if self.bodies.len() >= MAX_BODIES {
            return Err(WorldError::LengthError("bodies"));
        }
        Ok(self.bodies.insert(body))
    }

    /// Removes a body, cascading destruction of its joints, contacts, and
    /// broad-phase proxies.
    pub fn destroy_body(&mut self, id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        if self.bodies.get(id).is_none() {
            return Err(WorldError::OutOfRange("body id"));
        }

        let joint_ids: Vec<EntityId> = self
            .bodies
            .get(id)
            .map(|b| b.joints.iter().map(|(_, j)| *j).collect())
            .unwrap_or_default();
        for joint in joint_ids {
            self.destroy_joint(joint)?;
        }

        let contact_ids: Vec<EntityId> = self
            .bodies
            .get(id)
            .map(|b| b.contacts.iter().map(|(_, c)| *c).collect())
            .unwrap_or_default();
        for contact in contact_ids {
            self.destroy_contact(contact, Some(id));
        }

        let proxies: Vec<u32> = self
            .bodies
            .get(id)
            .map(|b| b.proxies.clone())
            .unwrap_or_default();
        for leaf in proxies {
            self.tree.destroy_leaf(leaf);
            self.moved_proxies.retain(|p| *p != leaf);
        }
        self.pending_proxies.retain(|(b, _)| *b != id);
        self.bodies_for_proxy_sync.retain(|b| *b != id);

        self.bodies.remove(id);
        Ok(())
    }

    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body_ids(&self) -> Vec<EntityId> {
        self.bodies.ids().collect()
    }

    /// Teleports a body; proxies re-synchronize on the next step.
    pub fn set_transform(&mut self, id: EntityId, position: Vec2, angle: f32) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.set_transform(position, angle);
        let contact_ids: Vec<EntityId> = body.contacts.iter().map(|(_, c)| *c).collect();
        self.bodies_for_proxy_sync.push(id);
        self.flag_contacts_for_updating(&contact_ids);
        Ok(())
    }

    pub fn transformation(&self, id: EntityId) -> Option<Transform> {
        self.bodies.get(id).map(|b| b.transform)
    }

    /// Changes a body's simulation role. Moving to `Static` clears velocity
    /// and drops every attached contact.
    pub fn set_type(&mut self, id: EntityId, body_type: BodyType) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        if body.body_type == body_type {
            return Ok(());
        }
        body.body_type = body_type;
        if !body_type.is_speedable() {
            body.velocity = Velocity::default();
            body.force = Vec2::ZERO;
            body.torque = 0.0;
            body.is_awake = false;
            body.sweep.pos0 = body.sweep.pos1;
        } else {
            body.set_awake();
        }
        let contact_ids: Vec<EntityId> = body.contacts.iter().map(|(_, c)| *c).collect();
        let proxies = body.proxies.clone();
        for contact in contact_ids {
            self.destroy_contact(contact, None);
        }
        self.refresh_mass_data(id)?;
        // Touch the proxies so the next step looks for fresh pairs.
        self.moved_proxies.extend(proxies);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: EntityId, enabled: bool) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        if body.is_enabled == enabled {
            return Ok(());
        }
        body.is_enabled = enabled;
        let shapes: Vec<EntityId> = body.shapes.clone();
        for shape in shapes {
            self.pending_proxies.push((id, shape));
        }
        Ok(())
    }

    pub fn set_awake(&mut self, id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.set_awake();
        Ok(())
    }

    pub fn unset_awake(&mut self, id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.unset_awake();
        Ok(())
    }

    pub fn apply_force(&mut self, id: EntityId, force: Vec2, point: Vec2) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.apply_force(force, point);
        Ok(())
    }

    pub fn apply_torque(&mut self, id: EntityId, torque: f32) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.apply_torque(torque);
        Ok(())
    }

    pub fn apply_linear_impulse(
        &mut self,
        id: EntityId,
        impulse: Vec2,
        point: Vec2,
    ) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.apply_linear_impulse(impulse, point);
        Ok(())
    }

    pub fn apply_angular_impulse(&mut self, id: EntityId, impulse: f32) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.apply_angular_impulse(impulse);
        Ok(())
    }

    pub fn set_velocity(&mut self, id: EntityId, velocity: Velocity) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        if body.is_speedable() {
            body.velocity = velocity;
            body.set_awake();
        }
        Ok(())
    }

    // ---- shapes --------------------------------------------------------

    pub fn create_shape(&mut self, shape: Shape) -> WorldResult<EntityId> {
        self.check_unlocked()?;
        if self.shapes.len() >= MAX_SHAPES {
            return Err(WorldError::LengthError("shapes"));
        }
        if shape.is_degenerate() {
            return Err(WorldError::InvalidArgument("degenerate shape geometry"));
        }
        for child in 0..shape.child_count() {
            let vr = shape.vertex_radius(child);
            if vr < self.min_vertex_radius {
                return Err(WorldError::InvalidArgument("vertex radius below minimum"));
            }
            if vr > self.max_vertex_radius {
                return Err(WorldError::InvalidArgument("vertex radius above maximum"));
            }
        }
        Ok(self.shapes.insert(shape))
    }

    /// Removes a shape, detaching it from every body that references it.
    pub fn destroy_shape(&mut self, id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        if self.shapes.get(id).is_none() {
            return Err(WorldError::OutOfRange("shape id"));
        }
        let holders: Vec<EntityId> = self
            .bodies
            .ids()
            .filter(|b| {
                self.bodies
                    .get(*b)
                    .map(|body| body.shapes.contains(&id))
                    .unwrap_or(false)
            })
            .collect();
        for body in holders {
            self.detach(body, id)?;
        }
        if let Some(mut listener) = self.shape_destruction.take() {
            listener(id);
            self.shape_destruction = Some(listener);
        }
        self.shapes.remove(id);
        Ok(())
    }

    pub fn shape(&self, id: EntityId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Binds a shape to a body and schedules proxy creation.
    pub fn attach(&mut self, body_id: EntityId, shape_id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        if self.shapes.get(shape_id).is_none() {
            return Err(WorldError::OutOfRange("shape id"));
        }
        let body = self
            .bodies
            .get_mut(body_id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.shapes.push(shape_id);
        body.set_awake();
        self.pending_proxies.push((body_id, shape_id));
        self.has_new_shapes = true;
        self.refresh_mass_data(body_id)
    }

    /// Unbinds a shape from a body, destroying its proxies and contacts.
    pub fn detach(&mut self, body_id: EntityId, shape_id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        {
            let body = self
                .bodies
                .get_mut(body_id)
                .ok_or(WorldError::OutOfRange("body id"))?;
            let before = body.shapes.len();
            if let Some(pos) = body.shapes.iter().position(|s| *s == shape_id) {
                body.shapes.remove(pos);
            }
            if body.shapes.len() == before {
                return Err(WorldError::InvalidArgument("shape not attached to body"));
            }
        }

        // Contacts referencing this attachment are stale now.
        let contact_ids: Vec<EntityId> = self
            .bodies
            .get(body_id)
            .map(|b| b.contacts.iter().map(|(_, c)| *c).collect())
            .unwrap_or_default();
        for contact in contact_ids {
            let involves = self
                .contact_arena
                .get(contact)
                .map(|c| {
                    (c.body_a == body_id && c.shape_a == shape_id)
                        || (c.body_b == body_id && c.shape_b == shape_id)
                })
                .unwrap_or(false);
            if involves {
                self.destroy_contact(contact, None);
            }
        }

        self.destroy_proxies_for(body_id, shape_id);
        self.pending_proxies
            .retain(|(b, s)| !(*b == body_id && *s == shape_id));
        self.refresh_mass_data(body_id)
    }

    pub fn set_sensor(&mut self, shape_id: EntityId, sensor: bool) -> WorldResult<()> {
        self.check_unlocked()?;
        let shape = self
            .shapes
            .get_mut(shape_id)
            .ok_or(WorldError::OutOfRange("shape id"))?;
        if shape.is_sensor == sensor {
            return Ok(());
        }
        shape.is_sensor = sensor;
        self.touch_shape_contacts(shape_id, false);
        Ok(())
    }

    pub fn set_filter(
        &mut self,
        shape_id: EntityId,
        filter: crate::core::shapes::Filter,
    ) -> WorldResult<()> {
        self.check_unlocked()?;
        let shape = self
            .shapes
            .get_mut(shape_id)
            .ok_or(WorldError::OutOfRange("shape id"))?;
        shape.filter = filter;
        self.touch_shape_contacts(shape_id, true);
        Ok(())
    }

    /// Re-runs filtering on every contact involving the shape.
    pub fn refilter(&mut self, shape_id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        if self.shapes.get(shape_id).is_none() {
            return Err(WorldError::OutOfRange("shape id"));
        }
        self.touch_shape_contacts(shape_id, true);
        Ok(())
    }

    fn touch_shape_contacts(&mut self, shape_id: EntityId, filtering: bool) {
        let mut touched_bodies = Vec::new();
        for (_, contact_id) in self.contacts.clone() {
            if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                if contact.shape_a == shape_id || contact.shape_b == shape_id {
                    contact.needs_updating = true;
                    if filtering {
                        contact.needs_filtering = true;
                    }
                    touched_bodies.push(contact.body_a);
                    touched_bodies.push(contact.body_b);
                }
            }
        }
        for body in touched_bodies {
            if let Some(b) = self.bodies.get_mut(body) {
                b.set_awake();
            }
        }
    }

    /// Aggregated mass data of a body's attached shapes, about the body
    /// origin.
    pub fn compute_mass_data(&self, body_id: EntityId) -> WorldResult<MassData> {
        let body = self
            .bodies
            .get(body_id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        let mut mass = 0.0;
        let mut inertia = 0.0;
        let mut center = Vec2::ZERO;
        for shape_id in &body.shapes {
            if let Some(shape) = self.shapes.get(*shape_id) {
                let md = shape.mass_data();
                mass += md.mass;
                center += md.mass * md.center;
                inertia += md.inertia;
            }
        }
        if mass > 0.0 {
            center /= mass;
        }
        Ok(MassData::new(mass, inertia, center))
    }

    pub fn set_mass_data(&mut self, body_id: EntityId, data: &MassData) -> WorldResult<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(body_id)
            .ok_or(WorldError::OutOfRange("body id"))?;
        body.set_mass_data(data);
        Ok(())
    }

    pub(crate) fn refresh_mass_data(&mut self, body_id: EntityId) -> WorldResult<()> {
        let data = self.compute_mass_data(body_id)?;
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.set_mass_data(&data);
        }
        Ok(())
    }

    // ---- joints --------------------------------------------------------

    pub fn create_joint(&mut self, mut joint: Joint) -> WorldResult<EntityId> {
        self.check_unlocked()?;
        if self.joints.len() >= MAX_JOINTS {
            return Err(WorldError::LengthError("joints"));
        }
        let body_a = joint.body_a();
        let body_b = joint.body_b();
        if self.bodies.get(body_b).is_none() {
            return Err(WorldError::OutOfRange("joint body"));
        }
        if !body_a.is_null() && self.bodies.get(body_a).is_none() {
            return Err(WorldError::OutOfRange("joint body"));
        }

        // Gears capture their coordinate constant from the current poses.
        if let Joint::Gear(gear) = &mut joint {
            let snapshot = |bodies: &Arena<Body>, id: EntityId| {
                bodies
                    .get(id)
                    .map(|b| (b.sweep.pos1, b.local_center()))
                    .unwrap_or_default()
            };
            gear.reset_constant(
                snapshot(&self.bodies, gear.body_a),
                snapshot(&self.bodies, gear.body_b),
                snapshot(&self.bodies, gear.body_c),
                snapshot(&self.bodies, gear.body_d),
            );
        }

        let collide_connected = joint.collide_connected();
        let id = self.joints.insert(joint);

        if !body_a.is_null() {
            if let Some(body) = self.bodies.get_mut(body_a) {
                body.insert_joint(body_b, id);
                body.set_awake();
            }
        }
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.insert_joint(body_a, id);
            body.set_awake();
        }

        if !collide_connected && !body_a.is_null() {
            self.flag_pair_contacts_for_filtering(body_a, body_b);
        }
        Ok(id)
    }

    pub fn destroy_joint(&mut self, id: EntityId) -> WorldResult<()> {
        self.check_unlocked()?;
        let (body_a, body_b, collide_connected) = {
            let joint = self
                .joints
                .get(id)
                .ok_or(WorldError::OutOfRange("joint id"))?;
            (joint.body_a(), joint.body_b(), joint.collide_connected())
        };

        if let Some(mut listener) = self.joint_destruction.take() {
            listener(id);
            self.joint_destruction = Some(listener);
        }

        if !body_a.is_null() {
            if let Some(body) = self.bodies.get_mut(body_a) {
                body.erase_joint(id);
                body.set_awake();
            }
        }
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.erase_joint(id);
            body.set_awake();
        }

        self.joints.remove(id);

        if !collide_connected && !body_a.is_null() {
            self.flag_pair_contacts_for_filtering(body_a, body_b);
        }
        Ok(())
    }

    pub fn joint(&self, id: EntityId) -> Option<&Joint> {
        self.joints.get(id)
    }

    pub fn joint_mut(&mut self, id: EntityId) -> Option<&mut Joint> {
        self.joints.get_mut(id)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn flag_pair_contacts_for_filtering(&mut self, body_a: EntityId, body_b: EntityId) {
        let contact_ids: Vec<EntityId> = self
            .bodies
            .get(body_a)
            .map(|b| {
                b.contacts
                    .iter()
                    .filter(|(_, c)| {
                        self.contact_arena
                            .get(*c)
                            .map(|contact| contact.other_body(body_a) == body_b)
                            .unwrap_or(false)
                    })
                    .map(|(_, c)| *c)
                    .collect()
            })
            .unwrap_or_default();
        for id in contact_ids {
            if let Some(contact) = self.contact_arena.get_mut(id) {
                contact.needs_filtering = true;
                contact.needs_updating = true;
            }
        }
    }

    // ---- contacts ------------------------------------------------------

    pub fn contact(&self, id: EntityId) -> Option<&Contact> {
        self.contact_arena.get(id)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn contact_ids(&self) -> Vec<EntityId> {
        self.contacts.iter().map(|(_, id)| *id).collect()
    }

    pub(crate) fn flag_contacts_for_updating(&mut self, ids: &[EntityId]) {
        for id in ids {
            if let Some(contact) = self.contact_arena.get_mut(*id) {
                contact.needs_updating = true;
            }
        }
    }

    // ---- queries -------------------------------------------------------

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) -> WorldResult<()> {
        self.check_unlocked()?;
        if gravity != self.gravity {
            // A gravity change has to reach sleeping islands too.
            let ids: Vec<EntityId> = self.bodies.ids().collect();
            for id in ids {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.set_awake();
                }
            }
        }
        self.gravity = gravity;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn tree(&self) -> &DynamicTree {
        &self.tree
    }

    /// Emits every shape child whose fattened AABB overlaps the query box.
    /// Return false from the callback to stop early.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(EntityId, EntityId, usize) -> bool) {
        self.tree.query(aabb, |leaf| {
            if let Some(data) = self.tree.get_leaf_data(leaf) {
                callback(data.body, data.shape, data.child_index)
            } else {
                true
            }
        });
    }

    /// Casts a ray through the broad phase, refining hits against actual
    /// shape geometry. The callback returns the new maximum fraction: 0
    /// stops the cast, smaller values clip it.
    pub fn ray_cast(&self, input: &RayCastInput, mut callback: impl FnMut(RayCastHit) -> f32) {
        self.tree.ray_cast(input, |sub_input, leaf| {
            let Some(data) = self.tree.get_leaf_data(leaf) else {
                return sub_input.max_fraction;
            };
            let Some(body) = self.bodies.get(data.body) else {
                return sub_input.max_fraction;
            };
            let Some(shape) = self.shapes.get(data.shape) else {
                return sub_input.max_fraction;
            };
            let Some(proxy) = shape.child(data.child_index) else {
                return sub_input.max_fraction;
            };
            match ray_cast_proxy(&proxy, &body.transform, sub_input) {
                Some(RayCastOutput { normal, fraction }) => callback(RayCastHit {
                    body: data.body,
                    shape: data.shape,
                    child_index: data.child_index,
                    point: sub_input.point_at(fraction),
                    normal,
                    fraction,
                }),
                None => sub_input.max_fraction,
            }
        });
    }

    /// Closest hit of a ray, if any.
    pub fn ray_cast_closest(&self, input: &RayCastInput) -> Option<RayCastHit> {
        let mut closest: Option<RayCastHit> = None;
        self.ray_cast(input, |hit| {
            let fraction = hit.fraction;
            closest = Some(hit);
            fraction
        });
        closest
    }

    /// Translates every body, joint frame, and tree node by `-delta`.
    pub fn shift_origin(&mut self, delta: Vec2) -> WorldResult<()> {
        self.check_unlocked()?;
        let body_ids: Vec<EntityId> = self.bodies.ids().collect();
        let mut touched_contacts = Vec::new();
        for id in body_ids {
            if let Some(body) = self.bodies.get_mut(id) {
                body.transform.p -= delta;
                body.sweep.pos0.linear -= delta;
                body.sweep.pos1.linear -= delta;
                touched_contacts.extend(body.contacts.iter().map(|(_, c)| *c));
            }
        }
        self.flag_contacts_for_updating(&touched_contacts);
        let joint_ids: Vec<EntityId> = self.joints.ids().collect();
        for id in joint_ids {
            if let Some(joint) = self.joints.get_mut(id) {
                joint.shift_origin(delta);
            }
        }
        self.tree.shift_origin(delta);
        Ok(())
    }

    /// Drops every entity and resets the broad phase.
    pub fn clear(&mut self) -> WorldResult<()> {
        self.check_unlocked()?;
        self.bodies.clear();
        self.shapes.clear();
        self.joints.clear();
        self.contact_arena.clear();
        self.contacts.clear();
        self.tree.clear();
        self.moved_proxies.clear();
        self.pending_proxies.clear();
        self.bodies_for_proxy_sync.clear();
        self.proxy_keys.clear();
        self.island.clear();
        self.step_complete = true;
        self.has_new_shapes = false;
        self.inv_dt0 = 0.0;
        Ok(())
    }
}
