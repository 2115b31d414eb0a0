//! Contact pair lifecycle: proxy maintenance, pair discovery, destruction
//! of stale pairs, and narrow-phase refresh of live ones.

use crate::collision::aabb::Aabb;
use crate::collision::broadphase::LeafData;
use crate::collision::contact::{Contact, ContactKey};
use crate::collision::distance::{distance, DistanceConf, SimplexCache};
use crate::collision::manifold::{collide_shapes, Manifold};
use crate::config::MAX_CONTACTS;
use crate::core::types::Transform;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::world::World;

/// Counters from one update-contacts pass.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct UpdateContactsStats {
    pub ignored: u32,
    pub updated: u32,
    pub skipped: u32,
}

impl World {
    /// Creates or destroys proxies for attachments registered since the
    /// last step (new shapes, enable/disable toggles).
    pub(crate) fn create_and_destroy_proxies(&mut self, extension: f32) {
        let pending = std::mem::take(&mut self.pending_proxies);
        for (body_id, shape_id) in pending {
            let Some(body) = self.bodies.get(body_id) else {
                continue;
            };
            let enabled = body.is_enabled;
            let attached = body.shapes.contains(&shape_id);
            let has_proxies = body.proxies.iter().any(|leaf| {
                self.tree
                    .get_leaf_data(*leaf)
                    .map(|d| d.shape == shape_id)
                    .unwrap_or(false)
            });

            if enabled && attached {
                if !has_proxies {
                    self.create_proxies_for(body_id, shape_id, extension);
                }
            } else if has_proxies {
                self.destroy_proxies_for(body_id, shape_id);
                // Contacts on the disabled attachment die with it.
                let stale: Vec<EntityId> = self
                    .bodies
                    .get(body_id)
                    .map(|b| {
                        b.contacts
                            .iter()
                            .filter(|(_, c)| {
                                self.contact_arena
                                    .get(*c)
                                    .map(|contact| {
                                        (contact.body_a == body_id
                                            && contact.shape_a == shape_id)
                                            || (contact.body_b == body_id
                                                && contact.shape_b == shape_id)
                                    })
                                    .unwrap_or(false)
                            })
                            .map(|(_, c)| *c)
                            .collect()
                    })
                    .unwrap_or_default();
                for contact in stale {
                    self.destroy_contact(contact, None);
                }
            }
        }
    }

    pub(crate) fn create_proxies_for(
        &mut self,
        body_id: EntityId,
        shape_id: EntityId,
        extension: f32,
    ) {
        let Some(xf) = self.bodies.get(body_id).map(|b| b.transform) else {
            return;
        };
        let Some(shape) = self.shapes.get(shape_id) else {
            return;
        };
        let child_count = shape.child_count();
        let mut created = Vec::with_capacity(child_count);
        for child_index in 0..child_count {
            if let Some(proxy) = shape.child(child_index) {
                let aabb = Aabb::for_proxy(&proxy, &xf).fattened(extension);
                created.push((aabb, child_index));
            }
        }
        for (aabb, child_index) in created {
            let leaf = self.tree.create_leaf(
                aabb,
                LeafData {
                    body: body_id,
                    shape: shape_id,
                    child_index,
                },
            );
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.proxies.push(leaf);
            }
            self.moved_proxies.push(leaf);
        }
    }

    pub(crate) fn destroy_proxies_for(&mut self, body_id: EntityId, shape_id: EntityId) {
        let Some(body) = self.bodies.get(body_id) else {
            return;
        };
        let doomed: Vec<u32> = body
            .proxies
            .iter()
            .copied()
            .filter(|leaf| {
                self.tree
                    .get_leaf_data(*leaf)
                    .map(|d| d.shape == shape_id)
                    .unwrap_or(false)
            })
            .collect();
        for leaf in &doomed {
            self.tree.destroy_leaf(*leaf);
            self.moved_proxies.retain(|p| p != leaf);
        }
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.proxies.retain(|p| !doomed.contains(p));
        }
    }

    /// Re-fits the proxies of bodies teleported through the API.
    pub(crate) fn synchronize_proxies(&mut self, conf: &StepConf) -> u32 {
        let mut moved = 0;
        let pending = std::mem::take(&mut self.bodies_for_proxy_sync);
        for body_id in pending {
            if let Some(xf) = self.bodies.get(body_id).map(|b| b.transform) {
                moved += self.synchronize(body_id, xf, xf, conf);
            }
        }
        moved
    }

    /// Installs union AABBs covering a body's motion from `xf0` to `xf1`,
    /// growing moved leaves by the displacement prediction. Returns the
    /// number of leaves that had to be re-inserted.
    pub(crate) fn synchronize(
        &mut self,
        body_id: EntityId,
        xf0: Transform,
        xf1: Transform,
        conf: &StepConf,
    ) -> u32 {
        let displacement = conf.displace_multiplier * (xf1.p - xf0.p);
        let Some(body) = self.bodies.get(body_id) else {
            return 0;
        };
        let leaves: Vec<u32> = body.proxies.clone();
        let mut moved = 0;
        for leaf in leaves {
            let Some(data) = self.tree.get_leaf_data(leaf) else {
                continue;
            };
            let Some(shape) = self.shapes.get(data.shape) else {
                continue;
            };
            let Some(proxy) = shape.child(data.child_index) else {
                continue;
            };
            let tight = Aabb::for_proxy(&proxy, &xf0).union(&Aabb::for_proxy(&proxy, &xf1));
            if self
                .tree
                .update_leaf(leaf, tight, displacement, conf.aabb_extension)
            {
                self.moved_proxies.push(leaf);
                moved += 1;
            }
        }
        moved
    }

    /// Queries the tree around every moved leaf, sorts and de-duplicates
    /// the found pair keys, and registers contacts for new pairs.
    /// Returns the number of contacts added.
    pub(crate) fn find_new_contacts(&mut self) -> u32 {
        let mut keys = std::mem::take(&mut self.proxy_keys);
        keys.clear();

        let moved = std::mem::take(&mut self.moved_proxies);
        for pid in &moved {
            let Some(data) = self.tree.get_leaf_data(*pid) else {
                continue;
            };
            let Some(aabb) = self.tree.get_aabb(*pid) else {
                continue;
            };
            let tree = &self.tree;
            tree.query(&aabb, |other| {
                if other != *pid {
                    if let Some(other_data) = tree.get_leaf_data(other) {
                        // Children of one body never collide with each other.
                        if other_data.body != data.body {
                            keys.push(ContactKey::new(*pid, other));
                        }
                    }
                }
                true
            });
        }

        keys.sort_unstable();
        keys.dedup();

        let mut added = 0;
        for key in &keys {
            if self.add_contact(*key) {
                added += 1;
            }
        }

        self.proxy_keys = keys;
        added
    }

    /// Registers a contact for a pair key unless filtered or already known.
    pub(crate) fn add_contact(&mut self, key: ContactKey) -> bool {
        let Some(data_min) = self.tree.get_leaf_data(key.min) else {
            return false;
        };
        let Some(data_max) = self.tree.get_leaf_data(key.max) else {
            return false;
        };

        // Order endpoints by body index so `body_a` ≤ `body_b` holds.
        let (data_a, data_b) = if data_min.body.index() <= data_max.body.index() {
            (data_min, data_max)
        } else {
            (data_max, data_min)
        };

        if !self.should_collide(data_a.body, data_b.body, data_a.shape, data_b.shape) {
            return false;
        }

        // Search the body with fewer contacts for an existing pair.
        let (body_a, body_b) = match (self.bodies.get(data_a.body), self.bodies.get(data_b.body))
        {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        let search = if body_a.contacts.len() < body_b.contacts.len() {
            body_a
        } else {
            body_b
        };
        if search.find_contact(key).is_some() {
            return false;
        }

        if self.contacts.len() >= MAX_CONTACTS {
            return false;
        }

        let (shape_a, shape_b) = match (self.shapes.get(data_a.shape), self.shapes.get(data_b.shape))
        {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };

        let mut contact = Contact::new(
            data_a.body,
            data_a.shape,
            data_a.child_index,
            data_b.body,
            data_b.shape,
            data_b.child_index,
            Contact::mix_friction(shape_a.friction, shape_b.friction),
            Contact::mix_restitution(shape_a.restitution, shape_b.restitution),
        );
        let sensor = shape_a.is_sensor || shape_b.is_sensor;
        contact.is_sensor = sensor;
        contact.is_impenetrable =
            body_a.is_impenetrable || body_b.is_impenetrable;
        contact.is_active = body_a.is_awake || body_b.is_awake;

        let id = self.contact_arena.insert(contact);
        self.contacts.push((key, id));

        if let Some(body) = self.bodies.get_mut(data_a.body) {
            body.insert_contact(key, id);
            if !sensor && body.is_speedable() {
                body.set_awake();
            }
        }
        if let Some(body) = self.bodies.get_mut(data_b.body) {
            body.insert_contact(key, id);
            if !sensor && body.is_speedable() {
                body.set_awake();
            }
        }
        true
    }

    /// May the two attachments produce a contact?
    pub(crate) fn should_collide(
        &self,
        body_a: EntityId,
        body_b: EntityId,
        shape_a: EntityId,
        shape_b: EntityId,
    ) -> bool {
        let (Some(a), Some(b)) = (self.bodies.get(body_a), self.bodies.get(body_b)) else {
            return false;
        };
        // At least one side has to be able to respond.
        if !a.is_accelerable() && !b.is_accelerable() {
            return false;
        }
        // A joint with collision disabled overrides everything else.
        let joined = a.is_joined_excluding_collision(body_b, |joint| {
            self.joints
                .get(joint)
                .map(|j| j.collide_connected())
                .unwrap_or(true)
        });
        if joined {
            return false;
        }
        let (Some(sa), Some(sb)) = (self.shapes.get(shape_a), self.shapes.get(shape_b)) else {
            return false;
        };
        sa.filter.should_collide(&sb.filter)
    }

    /// Drops contacts whose leaves stopped overlapping and contacts whose
    /// filter now forbids them. Returns the number destroyed.
    pub(crate) fn destroy_stale_contacts(&mut self) -> u32 {
        let entries: Vec<(ContactKey, EntityId)> = self.contacts.clone();
        let mut destroyed = 0;
        for (key, id) in entries {
            if !self.tree.test_overlap(key.min, key.max) {
                self.destroy_contact(id, None);
                destroyed += 1;
                continue;
            }
            let needs_filtering = self
                .contact_arena
                .get(id)
                .map(|c| c.needs_filtering)
                .unwrap_or(false);
            if needs_filtering {
                let allowed = self
                    .contact_arena
                    .get(id)
                    .map(|c| self.should_collide(c.body_a, c.body_b, c.shape_a, c.shape_b))
                    .unwrap_or(false);
                if !allowed {
                    self.destroy_contact(id, None);
                    destroyed += 1;
                    continue;
                }
                if let Some(c) = self.contact_arena.get_mut(id) {
                    c.needs_filtering = false;
                }
            }
        }
        destroyed
    }

    /// Frees one contact, notifying the end listener when it was touching
    /// and waking bodies it may have been propping up.
    pub(crate) fn destroy_contact(&mut self, id: EntityId, from: Option<EntityId>) {
        let Some(contact) = self.contact_arena.get(id) else {
            return;
        };
        let body_a = contact.body_a;
        let body_b = contact.body_b;
        let was_touching = contact.is_touching;
        let had_points = contact.manifold.point_count() > 0;
        let sensor = contact.is_sensor;

        if was_touching {
            if let Some(mut listener) = self.end_contact.take() {
                listener(id);
                self.end_contact = Some(listener);
            }
        }

        if Some(body_a) != from {
            if let Some(body) = self.bodies.get_mut(body_a) {
                body.erase_contact(id);
            }
        }
        if Some(body_b) != from {
            if let Some(body) = self.bodies.get_mut(body_b) {
                body.erase_contact(id);
            }
        }

        if had_points && !sensor {
            // The pair may have been holding these bodies in place.
            if let Some(body) = self.bodies.get_mut(body_a) {
                body.set_awake();
            }
            if let Some(body) = self.bodies.get_mut(body_b) {
                body.set_awake();
            }
        }

        self.contact_arena.remove(id);
        self.contacts.retain(|(_, c)| *c != id);
    }

    /// Refreshes touching state on awake contacts flagged for updating.
    pub(crate) fn update_contacts(&mut self, conf: &StepConf) -> UpdateContactsStats {
        let mut stats = UpdateContactsStats::default();
        let entries: Vec<EntityId> = self.contacts.iter().map(|(_, id)| *id).collect();
        for id in entries {
            let Some(contact) = self.contact_arena.get(id) else {
                continue;
            };
            let awake_a = self
                .bodies
                .get(contact.body_a)
                .map(|b| b.is_awake)
                .unwrap_or(false);
            let awake_b = self
                .bodies
                .get(contact.body_b)
                .map(|b| b.is_awake)
                .unwrap_or(false);
            if !awake_a && !awake_b {
                if let Some(contact) = self.contact_arena.get_mut(id) {
                    contact.is_active = false;
                }
                stats.ignored += 1;
                continue;
            }

            let mut needs_updating = false;
            if let Some(contact) = self.contact_arena.get_mut(id) {
                contact.is_enabled = true;
                contact.is_active = true;
                needs_updating = contact.needs_updating;
            }
            if needs_updating {
                self.update_contact(id, conf);
                stats.updated += 1;
            } else {
                stats.skipped += 1;
            }
        }
        stats
    }

    /// Recomputes one contact's manifold, fires begin/end transitions, and
    /// reports pre-solve on touching non-sensor contacts.
    pub(crate) fn update_contact(&mut self, id: EntityId, conf: &StepConf) {
        let Some(contact) = self.contact_arena.get(id) else {
            return;
        };
        let (body_a, shape_a, child_a) = (contact.body_a, contact.shape_a, contact.child_a);
        let (body_b, shape_b, child_b) = (contact.body_b, contact.shape_b, contact.child_b);
        // Sensor state lives on the shapes and may have been toggled.
        let sensor = self.shapes.get(shape_a).map(|s| s.is_sensor).unwrap_or(false)
            || self.shapes.get(shape_b).map(|s| s.is_sensor).unwrap_or(false);

        let (Some(xf_a), Some(xf_b)) = (
            self.bodies.get(body_a).map(|b| b.transform),
            self.bodies.get(body_b).map(|b| b.transform),
        ) else {
            return;
        };
        let (Some(proxy_a), Some(proxy_b)) = (
            self.shapes.get(shape_a).and_then(|s| s.child(child_a)),
            self.shapes.get(shape_b).and_then(|s| s.child(child_b)),
        ) else {
            return;
        };

        let old_manifold = self.contact_arena.get(id).map(|c| c.manifold.clone());
        let (old_touching, new_touching) = if sensor {
            // Sensors track overlap but never build manifolds.
            let mut cache = SimplexCache::default();
            let out = distance(
                &proxy_a,
                &xf_a,
                &proxy_b,
                &xf_b,
                &mut cache,
                DistanceConf {
                    max_iterations: conf.max_dist_iters,
                },
            );
            let touching = out.distance <= proxy_a.vertex_radius + proxy_b.vertex_radius;
            let Some(contact) = self.contact_arena.get_mut(id) else {
                return;
            };
            let old = contact.is_touching;
            contact.is_sensor = true;
            contact.manifold = Manifold::default();
            contact.is_touching = touching;
            contact.needs_updating = false;
            (old, touching)
        } else {
            let new_manifold = collide_shapes(&proxy_a, &xf_a, &proxy_b, &xf_b);
            let Some(contact) = self.contact_arena.get_mut(id) else {
                return;
            };
            contact.is_sensor = false;
            contact.update_manifold(new_manifold)
        };

        if !old_touching && new_touching {
            if let Some(mut listener) = self.begin_contact.take() {
                listener(id);
                self.begin_contact = Some(listener);
            }
        } else if old_touching && !new_touching {
            if let Some(mut listener) = self.end_contact.take() {
                listener(id);
                self.end_contact = Some(listener);
            }
        }

        if !sensor && new_touching {
            if let Some(mut listener) = self.pre_solve.take() {
                if let Some(old) = &old_manifold {
                    listener(id, old);
                }
                self.pre_solve = Some(listener);
            }
        }
    }
}
