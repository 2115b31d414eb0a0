//! The step pipeline: proxy sync, contact refresh, regular island solving,
//! continuous collision sub-stepping, and sleep management.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use log::debug;

use crate::collision::ccd::time_of_impact;
use crate::dynamics::island::Island;
use crate::dynamics::solver::{
    assign_impulses, integrate_positions, solve_position_constraints, solve_velocity_constraints,
    solve_reg_island_gs, BodyConstraint, PositionConstraint, RegIslandJob, VelocityConstraint,
};
use crate::dynamics::step_conf::{
    IslandStats, RegStepStats, StepConf, StepStats, ToiStepStats,
};
use crate::errors::{WorldError, WorldResult};
use crate::utils::allocator::EntityId;
use crate::utils::logging::{warn_if_frame_budget_exceeded, ScopedTimer};
use crate::utils::math::next_before;
use crate::utils::stack::GrowableStack;
use crate::world::{ContactImpulse, World};

#[derive(Debug, Default, Clone, Copy)]
struct ToiUpdateData {
    updated: u32,
    at_max_sub_steps: u32,
    max_dist_iters: u32,
    max_toi_iters: u32,
    max_root_iters: u32,
}

impl World {
    /// Advances the world by one step, holding the world locked for the
    /// duration. Mutating API calls made from listeners fail with
    /// [`WorldError::WrongState`].
    pub fn step(&mut self, conf: &StepConf) -> WorldResult<StepStats> {
        if self.locked {
            return Err(WorldError::WrongState);
        }
        let _timer = ScopedTimer::new("world::step");
        let started = std::time::Instant::now();

        // Warm-start impulses scale by how much the step length changed.
        let mut conf = *conf;
        conf.dt_ratio = self.inv_dt0 * conf.delta_time;

        let mut stats = StepStats::default();
        self.locked = true;

        self.create_and_destroy_proxies(conf.aabb_extension);
        stats.pre.proxies_moved = self.synchronize_proxies(&conf);
        stats.pre.contacts_destroyed = self.destroy_stale_contacts();

        if self.has_new_shapes {
            self.has_new_shapes = false;
            stats.pre.contacts_added = self.find_new_contacts();
        }

        if conf.delta_time != 0.0 {
            self.inv_dt0 = conf.inv_time();

            let update = self.update_contacts(&conf);
            stats.pre.contacts_ignored = update.ignored;
            stats.pre.contacts_updated = update.updated;
            stats.pre.contacts_skipped = update.skipped;

            if self.step_complete {
                stats.reg = self.solve_reg(&conf);
            }
            if conf.do_toi {
                stats.toi = self.solve_toi(&conf);
            }

            // External inputs only act for the step they were applied in.
            let body_ids: Vec<EntityId> = self.bodies.ids().collect();
            for id in body_ids {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.force = Vec2::ZERO;
                    body.torque = 0.0;
                }
            }

            debug!(
                "step: islands={} contacts={} slept={} toi_islands={}",
                stats.reg.islands_found,
                self.contacts.len(),
                stats.reg.bodies_slept,
                stats.toi.islands_found,
            );
        }

        self.locked = false;
        if conf.delta_time > 0.0 {
            // A real-time caller needs the step to fit inside the simulated
            // interval.
            warn_if_frame_budget_exceeded(started.elapsed(), conf.delta_time * 1000.0);
        }
        Ok(stats)
    }

    // ---- regular phase -------------------------------------------------

    fn solve_reg(&mut self, conf: &StepConf) -> RegStepStats {
        let mut stats = RegStepStats::default();

        let body_ids: Vec<EntityId> = self.bodies.ids().collect();
        for id in &body_ids {
            if let Some(body) = self.bodies.get_mut(*id) {
                body.is_islanded = false;
            }
        }
        let contact_ids: Vec<EntityId> = self.contacts.iter().map(|(_, c)| *c).collect();
        for id in &contact_ids {
            if let Some(contact) = self.contact_arena.get_mut(*id) {
                contact.is_islanded = false;
            }
        }
        let mut islanded_joints: HashSet<EntityId> = HashSet::new();

        #[cfg(feature = "parallel")]
        let mut staged: Vec<(Island, RegIslandJob)> = Vec::new();

        for seed in body_ids {
            let eligible = self
                .bodies
                .get(seed)
                .map(|b| !b.is_islanded && b.is_awake && b.is_enabled && b.is_speedable())
                .unwrap_or(false);
            if !eligible {
                continue;
            }
            stats.islands_found += 1;

            let mut island = std::mem::take(&mut self.island);
            island.clear();
            island.reserve(
                self.bodies.len(),
                self.contacts.len(),
                self.joints.len(),
            );
            self.add_to_island(seed, &mut island, &mut islanded_joints);

            // Static bodies bridge islands without merging them.
            for id in &island.bodies {
                if let Some(body) = self.bodies.get_mut(*id) {
                    if !body.is_speedable() {
                        body.is_islanded = false;
                    }
                }
            }

            let job = self.build_reg_job(&island, conf);

            #[cfg(not(feature = "parallel"))]
            {
                let mut job = job;
                let results = solve_reg_island_gs(&mut job, conf);
                stats.absorb(&results);
                stats.bodies_slept += self.writeback_reg_island(&island, job, &results, conf);
                self.island = island;
            }
            #[cfg(feature = "parallel")]
            {
                self.island = Island::new();
                staged.push((island, job));
            }
        }

        #[cfg(feature = "parallel")]
        {
            let mut jobs: Vec<RegIslandJob> =
                staged.iter_mut().map(|(_, job)| std::mem::replace(job, RegIslandJob {
                    bodies: Vec::new(),
                    slots: HashMap::new(),
                    velocity_constraints: Vec::new(),
                    position_constraints: Vec::new(),
                    joints: Vec::new(),
                })).collect();
            let results = crate::dynamics::parallel::solve_reg_island_jobs(&mut jobs, conf);
            for (((island, _), job), island_stats) in
                staged.into_iter().zip(jobs.into_iter()).zip(results.iter())
            {
                stats.absorb(island_stats);
                stats.bodies_slept +=
                    self.writeback_reg_island(&island, job, island_stats, conf);
            }
        }

        // Moved bodies need their broad-phase leaves refreshed.
        let body_ids: Vec<EntityId> = self.bodies.ids().collect();
        for id in body_ids {
            let sync = self
                .bodies
                .get(id)
                .filter(|b| b.is_islanded && b.is_speedable())
                .map(|b| (b.sweep.transform0(), b.transform));
            if let Some((xf0, xf1)) = sync {
                stats.proxies_moved += self.synchronize(id, xf0, xf1, conf);
            }
        }

        stats.contacts_added = self.find_new_contacts();
        stats
    }

    /// Depth-first flood from a seed body over touching contacts and
    /// joints. Non-speedable bodies join islands but never propagate.
    fn add_to_island(
        &mut self,
        seed: EntityId,
        island: &mut Island,
        islanded_joints: &mut HashSet<EntityId>,
    ) {
        let mut stack: GrowableStack<EntityId, 64> = GrowableStack::new();
        stack.push(seed);
        if let Some(body) = self.bodies.get_mut(seed) {
            body.is_islanded = true;
        }

        while let Some(body_id) = stack.pop() {
            island.bodies.push(body_id);

            let Some(body) = self.bodies.get(body_id) else {
                continue;
            };
            if !body.is_speedable() {
                continue;
            }
            let contacts: Vec<EntityId> = body.contacts.iter().map(|(_, c)| *c).collect();
            let joints: Vec<(EntityId, EntityId)> = body.joints.clone();

            // Islanded bodies get solved, so they must be awake.
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.is_awake = true;
            }

            for contact_id in contacts {
                let Some(contact) = self.contact_arena.get(contact_id) else {
                    continue;
                };
                if contact.is_islanded
                    || !contact.is_enabled
                    || !contact.is_touching
                    || contact.is_sensor
                {
                    continue;
                }
                let other = contact.other_body(body_id);
                if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                    contact.is_islanded = true;
                }
                island.contacts.push(contact_id);

                let other_islanded = self
                    .bodies
                    .get(other)
                    .map(|b| b.is_islanded)
                    .unwrap_or(true);
                if !other_islanded {
                    if let Some(b) = self.bodies.get_mut(other) {
                        b.is_islanded = true;
                    }
                    stack.push(other);
                }
            }

            for (other, joint_id) in joints {
                if islanded_joints.contains(&joint_id) {
                    continue;
                }
                if other.is_null() {
                    // Single-body joints have no other side to pull in.
                    islanded_joints.insert(joint_id);
                    island.joints.push(joint_id);
                    continue;
                }
                let other_enabled = self
                    .bodies
                    .get(other)
                    .map(|b| b.is_enabled)
                    .unwrap_or(false);
                if !other_enabled {
                    continue;
                }
                islanded_joints.insert(joint_id);
                island.joints.push(joint_id);

                let other_islanded = self
                    .bodies
                    .get(other)
                    .map(|b| b.is_islanded)
                    .unwrap_or(true);
                if !other_islanded {
                    if let Some(b) = self.bodies.get_mut(other) {
                        b.is_islanded = true;
                    }
                    stack.push(other);
                }
            }
        }
    }

    /// Stages an island into dense solver state.
    fn build_reg_job(&mut self, island: &Island, conf: &StepConf) -> RegIslandJob {
        let h = conf.delta_time;
        let gravity = self.gravity;

        let mut bodies = Vec::with_capacity(island.bodies.len());
        let mut slots = HashMap::with_capacity(island.bodies.len());
        for (slot, id) in island.bodies.iter().enumerate() {
            if let Some(body) = self.bodies.get_mut(*id) {
                // The sweep restarts from the current end position.
                body.sweep.pos0 = body.sweep.pos1;
                bodies.push(BodyConstraint::from_body(*id, body, h, gravity));
                slots.insert(*id, slot);
            }
        }

        let mut velocity_constraints = Vec::with_capacity(island.contacts.len());
        let mut position_constraints = Vec::with_capacity(island.contacts.len());
        for contact_id in &island.contacts {
            let Some(contact) = self.contact_arena.get(*contact_id) else {
                continue;
            };
            let radius_a = self
                .shapes
                .get(contact.shape_a)
                .map(|s| s.vertex_radius(contact.child_a))
                .unwrap_or(0.0);
            let radius_b = self
                .shapes
                .get(contact.shape_b)
                .map(|s| s.vertex_radius(contact.child_b))
                .unwrap_or(0.0);
            let (Some(&ia), Some(&ib)) =
                (slots.get(&contact.body_a), slots.get(&contact.body_b))
            else {
                continue;
            };
            velocity_constraints.push(VelocityConstraint::new(
                *contact_id,
                &contact.manifold,
                radius_a,
                radius_b,
                contact.friction,
                contact.restitution,
                contact.tangent_speed,
                ia,
                ib,
                &bodies,
                conf,
            ));
            position_constraints.push(PositionConstraint {
                index_a: ia,
                index_b: ib,
                manifold: contact.manifold.clone(),
                radius_a,
                radius_b,
            });
        }

        let joints = island
            .joints
            .iter()
            .filter_map(|id| self.joints.get(*id).map(|j| (*id, j.clone())))
            .collect();

        RegIslandJob {
            bodies,
            slots,
            velocity_constraints,
            position_constraints,
            joints,
        }
    }

    /// Installs solved island state back into the world and runs the sleep
    /// pass. Returns how many bodies fell asleep.
    fn writeback_reg_island(
        &mut self,
        island: &Island,
        job: RegIslandJob,
        results: &IslandStats,
        conf: &StepConf,
    ) -> u32 {
        // Manifold impulses feed the next step's warm start.
        for vc in &job.velocity_constraints {
            if let Some(contact) = self.contact_arena.get_mut(vc.contact) {
                assign_impulses(&mut contact.manifold, vc);
            }
        }
        for (joint_id, joint) in job.joints {
            if let Some(slot) = self.joints.get_mut(joint_id) {
                *slot = joint;
            }
        }

        let mut touched_contacts = Vec::new();
        for bc in &job.bodies {
            if let Some(body) = self.bodies.get_mut(bc.body) {
                body.velocity = bc.velocity;
                if body.update_from_position(bc.position) {
                    touched_contacts.extend(body.contacts.iter().map(|(_, c)| *c));
                }
            }
        }
        self.flag_contacts_for_updating(&touched_contacts);

        if let Some(mut listener) = self.post_solve.take() {
            let iterations = if results.solved {
                results.position_iterations
            } else {
                u32::MAX
            };
            for vc in &job.velocity_constraints {
                let impulses: Vec<ContactImpulse> = vc
                    .points
                    .iter()
                    .map(|p| ContactImpulse {
                        normal: p.normal_impulse,
                        tangent: p.tangent_impulse,
                    })
                    .collect();
                listener(vc.contact, &impulses, iterations);
            }
            self.post_solve = Some(listener);
        }

        // Under-active-time accounting and the coordinated sleep decision.
        let h = conf.delta_time;
        let mut min_under_active = f32::INFINITY;
        for id in &island.bodies {
            if let Some(body) = self.bodies.get_mut(*id) {
                if !body.is_speedable() {
                    continue;
                }
                let still = body.velocity.linear.length_squared()
                    <= conf.linear_sleep_tolerance * conf.linear_sleep_tolerance
                    && body.velocity.angular.abs() <= conf.angular_sleep_tolerance;
                if body.allow_sleep && still {
                    body.under_active_time += h;
                } else {
                    body.under_active_time = 0.0;
                }
                min_under_active = min_under_active.min(body.under_active_time);
            }
        }

        let mut slept = 0;
        if min_under_active >= conf.min_still_time_to_sleep && results.solved {
            for id in &island.bodies {
                if let Some(body) = self.bodies.get_mut(*id) {
                    if body.is_speedable() && body.is_awake {
                        body.unset_awake();
                        slept += 1;
                    }
                }
            }
        }
        slept
    }

    // ---- TOI phase -----------------------------------------------------

    fn solve_toi(&mut self, conf: &StepConf) -> ToiStepStats {
        let mut stats = ToiStepStats::default();

        if self.step_complete {
            let body_ids: Vec<EntityId> = self.bodies.ids().collect();
            for id in body_ids {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.is_islanded = false;
                    body.sweep.reset_alpha0();
                }
            }
            let contact_ids: Vec<EntityId> = self.contacts.iter().map(|(_, c)| *c).collect();
            for id in contact_ids {
                if let Some(contact) = self.contact_arena.get_mut(id) {
                    contact.is_islanded = false;
                    contact.unset_toi();
                    contact.toi_count = 0;
                }
            }
        }

        loop {
            let update = self.update_contact_tois(conf);
            stats.contacts_updated_toi += update.updated;
            stats.contacts_at_max_sub_steps += update.at_max_sub_steps;
            stats.max_dist_iters = stats.max_dist_iters.max(update.max_dist_iters);
            stats.max_toi_iters = stats.max_toi_iters.max(update.max_toi_iters);
            stats.max_root_iters = stats.max_root_iters.max(update.max_root_iters);

            let Some((contact_id, _toi, simultaneous)) = self.soonest_contact() else {
                // No TOI events left inside this step.
                self.step_complete = true;
                break;
            };
            stats.max_simul_contacts = stats.max_simul_contacts.max(simultaneous);
            stats.contacts_found += simultaneous;

            let already_islanded = self
                .contact_arena
                .get(contact_id)
                .map(|c| c.is_islanded)
                .unwrap_or(true);
            if !already_islanded {
                let results = self.solve_toi_contact(contact_id, conf);
                stats.min_separation = stats.min_separation.min(results.min_separation);
                stats.max_inc_impulse = stats.max_inc_impulse.max(results.max_inc_impulse);
                stats.islands_solved += results.solved as u32;
                stats.sum_pos_iters += results.position_iterations;
                stats.sum_vel_iters += results.velocity_iterations;
                stats.contacts_updated_touching += results.contacts_updated;
                stats.contacts_skipped_touching += results.contacts_skipped;
                if results.position_iterations > 0 || results.velocity_iterations > 0 {
                    stats.islands_found += 1;
                }
            }

            // Clear island flags, refresh the broad phase for displaced
            // bodies, and invalidate their cached TOIs.
            let body_ids: Vec<EntityId> = self.bodies.ids().collect();
            for id in body_ids {
                let Some(body) = self.bodies.get_mut(id) else {
                    continue;
                };
                if !body.is_islanded {
                    continue;
                }
                body.is_islanded = false;
                let (accelerable, xf0, xf1, contact_ids) = (
                    body.is_accelerable(),
                    body.sweep.transform0(),
                    body.transform,
                    body.contacts.iter().map(|(_, c)| *c).collect::<Vec<_>>(),
                );
                if accelerable {
                    stats.proxies_moved += self.synchronize(id, xf0, xf1, conf);
                    for contact_id in contact_ids {
                        if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                            contact.is_islanded = false;
                            contact.unset_toi();
                        }
                    }
                }
            }

            stats.contacts_added += self.find_new_contacts();

            if conf.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
        stats
    }

    /// Refreshes stale cached TOIs on eligible contacts, aligning both
    /// bodies' sweeps onto a common interval start first.
    fn update_contact_tois(&mut self, conf: &StepConf) -> ToiUpdateData {
        let mut data = ToiUpdateData::default();
        let toi_conf = conf.toi_conf();

        let entries: Vec<EntityId> = self.contacts.iter().map(|(_, c)| *c).collect();
        for contact_id in entries {
            let Some(contact) = self.contact_arena.get(contact_id) else {
                continue;
            };
            if contact.has_valid_toi() {
                continue;
            }
            if !contact.is_enabled
                || contact.is_sensor
                || !contact.is_active
                || !contact.is_impenetrable
            {
                continue;
            }
            if contact.toi_count >= conf.max_sub_steps {
                data.at_max_sub_steps += 1;
                continue;
            }

            let (body_a, body_b) = (contact.body_a, contact.body_b);
            let (shape_a, child_a) = (contact.shape_a, contact.child_a);
            let (shape_b, child_b) = (contact.shape_b, contact.child_b);

            // Put both sweeps onto the same remaining interval. Unresolved
            // collisions cannot predate the later of the two alpha0s as
            // long as the soonest TOI is always handled first.
            let alpha0 = {
                let a0 = self.bodies.get(body_a).map(|b| b.sweep.alpha0).unwrap_or(0.0);
                let b0 = self.bodies.get(body_b).map(|b| b.sweep.alpha0).unwrap_or(0.0);
                a0.max(b0)
            };
            debug_assert!((0.0..1.0).contains(&alpha0));
            for id in [body_a, body_b] {
                if let Some(body) = self.bodies.get_mut(id) {
                    if body.sweep.alpha0 < alpha0 {
                        body.sweep.advance0(alpha0);
                    }
                }
            }

            let (Some(proxy_a), Some(proxy_b)) = (
                self.shapes.get(shape_a).and_then(|s| s.child(child_a)),
                self.shapes.get(shape_b).and_then(|s| s.child(child_b)),
            ) else {
                continue;
            };
            // Large rotations break the root finder.
            let sweep_a = self
                .bodies
                .get(body_a)
                .map(|b| b.sweep.normalized())
                .unwrap_or_default();
            let sweep_b = self
                .bodies
                .get(body_b)
                .map(|b| b.sweep.normalized())
                .unwrap_or_default();

            let output = time_of_impact(&proxy_a, &sweep_a, &proxy_b, &sweep_b, toi_conf);

            // Min guards against floating-point overshoot past 1.
            let toi = if output.state.is_valid_for_time() {
                (alpha0 + (1.0 - alpha0) * output.time).min(1.0)
            } else {
                1.0
            };
            if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                contact.toi = Some(toi);
            }

            data.updated += 1;
            data.max_dist_iters = data.max_dist_iters.max(output.stats.max_dist_iters);
            data.max_toi_iters = data.max_toi_iters.max(output.stats.toi_iters);
            data.max_root_iters = data.max_root_iters.max(output.stats.max_root_iters);
        }
        data
    }

    /// The contact with the least cached TOI strictly inside the step,
    /// along with how many contacts share that exact time.
    fn soonest_contact(&self) -> Option<(EntityId, f32, u32)> {
        let mut min_toi = next_before(1.0);
        let mut found = None;
        let mut count = 0;
        for (_, contact_id) in &self.contacts {
            let Some(contact) = self.contact_arena.get(*contact_id) else {
                continue;
            };
            if let Some(toi) = contact.toi {
                if min_toi > toi {
                    min_toi = toi;
                    found = Some(*contact_id);
                    count = 1;
                } else if min_toi == toi && found.is_some() {
                    count += 1;
                }
            }
        }
        found.map(|id| (id, min_toi, count))
    }

    /// Handles one TOI event: advance the pair, confirm touching, build a
    /// local island, and solve the remainder of the step for it.
    fn solve_toi_contact(&mut self, contact_id: EntityId, conf: &StepConf) -> IslandStats {
        let mut contacts_updated = 0;
        let mut contacts_skipped = 0;

        let Some((toi, body_id_a, body_id_b)) = self
            .contact_arena
            .get(contact_id)
            .map(|c| (c.toi.unwrap_or(0.0), c.body_a, c.body_b))
        else {
            return IslandStats::default();
        };

        let backup_a = self.bodies.get(body_id_a).map(|b| b.sweep);
        let backup_b = self.bodies.get(body_id_b).map(|b| b.sweep);

        // Advance both bodies to the impact time. The manifold needs
        // re-evaluation regardless of whether the TOI is zero.
        for id in [body_id_a, body_id_b] {
            let contact_ids: Vec<EntityId> = {
                let Some(body) = self.bodies.get_mut(id) else {
                    continue;
                };
                body.advance(toi);
                body.contacts.iter().map(|(_, c)| *c).collect()
            };
            self.flag_contacts_for_updating(&contact_ids);
        }

        let mut needs_updating = false;
        if let Some(contact) = self.contact_arena.get_mut(contact_id) {
            contact.is_enabled = true;
            needs_updating = contact.needs_updating;
        }
        if needs_updating {
            self.update_contact(contact_id, conf);
            contacts_updated += 1;
        } else {
            contacts_skipped += 1;
        }
        if let Some(contact) = self.contact_arena.get_mut(contact_id) {
            contact.unset_toi();
            contact.toi_count += 1;
        }

        // Occasionally the advanced pair is no longer touching (seen with
        // large vertex radii). Treat it as a spurious event: restore the
        // sweeps and skip.
        let still_touching = self
            .contact_arena
            .get(contact_id)
            .map(|c| c.is_enabled && c.is_touching)
            .unwrap_or(false);
        if !still_touching {
            if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                contact.is_enabled = false;
            }
            if let (Some(backup), Some(body)) = (backup_a, self.bodies.get_mut(body_id_a)) {
                body.restore_sweep(backup);
            }
            if let (Some(backup), Some(body)) = (backup_b, self.bodies.get_mut(body_id_b)) {
                body.restore_sweep(backup);
            }
            return IslandStats {
                contacts_updated,
                contacts_skipped,
                ..Default::default()
            };
        }

        for id in [body_id_a, body_id_b] {
            if let Some(body) = self.bodies.get_mut(id) {
                if body.is_speedable() {
                    body.is_awake = true;
                }
            }
        }

        // Seed the TOI island with the pair and grow it over impenetrable
        // neighbourhoods.
        let mut island = std::mem::take(&mut self.island);
        island.clear();
        for id in [body_id_a, body_id_b] {
            if let Some(body) = self.bodies.get_mut(id) {
                body.is_islanded = true;
            }
            island.bodies.push(id);
        }
        island.contacts.push(contact_id);
        if let Some(contact) = self.contact_arena.get_mut(contact_id) {
            contact.is_islanded = true;
        }

        for id in [body_id_a, body_id_b] {
            let accelerable = self
                .bodies
                .get(id)
                .map(|b| b.is_accelerable())
                .unwrap_or(false);
            if accelerable {
                let (updated, skipped) =
                    self.process_contacts_for_toi(id, toi, conf, &mut island);
                contacts_updated += updated;
                contacts_skipped += skipped;
            }
        }

        for id in &island.bodies {
            if let Some(body) = self.bodies.get_mut(*id) {
                if !body.is_speedable() {
                    body.is_islanded = false;
                }
            }
        }
        self.island = island;

        // Solve for what remains of the step after the impact.
        let sub_conf = StepConf {
            delta_time: (1.0 - toi) * conf.delta_time,
            ..*conf
        };
        let mut results = self.solve_toi_island(&sub_conf);
        results.contacts_updated += contacts_updated;
        results.contacts_skipped += contacts_skipped;
        results
    }

    /// Pulls an advanced body's other contacts into the TOI island,
    /// advancing and validating their other bodies, with rollback when a
    /// contact turns out not to be touching at the TOI.
    fn process_contacts_for_toi(
        &mut self,
        body_id: EntityId,
        toi: f32,
        conf: &StepConf,
        island: &mut Island,
    ) -> (u32, u32) {
        let mut updated = 0;
        let mut skipped = 0;

        let body_impenetrable = self
            .bodies
            .get(body_id)
            .map(|b| b.is_impenetrable)
            .unwrap_or(false);
        let contacts: Vec<EntityId> = self
            .bodies
            .get(body_id)
            .map(|b| b.contacts.iter().map(|(_, c)| *c).collect())
            .unwrap_or_default();

        for contact_id in contacts {
            let Some(contact) = self.contact_arena.get(contact_id) else {
                continue;
            };
            if contact.is_islanded || contact.is_sensor {
                continue;
            }
            let other = contact.other_body(body_id);
            let other_impenetrable = self
                .bodies
                .get(other)
                .map(|b| b.is_impenetrable)
                .unwrap_or(false);
            if !body_impenetrable && !other_impenetrable {
                continue;
            }

            let other_islanded = self
                .bodies
                .get(other)
                .map(|b| b.is_islanded)
                .unwrap_or(true);
            let backup = self.bodies.get(other).map(|b| b.sweep);
            if !other_islanded {
                let contact_ids: Vec<EntityId> = {
                    let Some(body) = self.bodies.get_mut(other) else {
                        continue;
                    };
                    body.advance(toi);
                    body.contacts.iter().map(|(_, c)| *c).collect()
                };
                self.flag_contacts_for_updating(&contact_ids);
            }

            if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                contact.is_enabled = true;
            }
            let needs_updating = self
                .contact_arena
                .get(contact_id)
                .map(|c| c.needs_updating)
                .unwrap_or(false);
            if needs_updating {
                self.update_contact(contact_id, conf);
                updated += 1;
            } else {
                skipped += 1;
            }

            let still_touching = self
                .contact_arena
                .get(contact_id)
                .map(|c| c.is_enabled && c.is_touching)
                .unwrap_or(false);
            if !still_touching {
                if !other_islanded {
                    if let (Some(backup), Some(body)) = (backup, self.bodies.get_mut(other)) {
                        body.restore_sweep(backup);
                    }
                }
                continue;
            }

            island.contacts.push(contact_id);
            if let Some(contact) = self.contact_arena.get_mut(contact_id) {
                contact.is_islanded = true;
            }
            if !other_islanded {
                if let Some(body) = self.bodies.get_mut(other) {
                    if body.is_speedable() {
                        body.is_awake = true;
                    }
                    body.is_islanded = true;
                }
                island.bodies.push(other);
            }
        }
        (updated, skipped)
    }

    /// Solves the staged TOI island for the remaining sub-step: positions
    /// first, then the leap of faith onto `pos0`, then velocities without
    /// warm starting, then integration.
    fn solve_toi_island(&mut self, conf: &StepConf) -> IslandStats {
        let island = std::mem::take(&mut self.island);
        let mut results = IslandStats {
            position_iterations: conf.toi_position_iterations,
            velocity_iterations: conf.toi_velocity_iterations,
            ..Default::default()
        };

        // Velocities were already integrated by the regular phase; capture
        // state as-is.
        let mut bodies = Vec::with_capacity(island.bodies.len());
        let mut slots: HashMap<EntityId, usize> = HashMap::with_capacity(island.bodies.len());
        for (slot, id) in island.bodies.iter().enumerate() {
            if let Some(body) = self.bodies.get(*id) {
                bodies.push(BodyConstraint::from_body(*id, body, 0.0, self.gravity));
                slots.insert(*id, slot);
            }
        }

        let mut constraint_contacts = Vec::with_capacity(island.contacts.len());
        let mut position_constraints = Vec::with_capacity(island.contacts.len());
        for contact_id in &island.contacts {
            let Some(contact) = self.contact_arena.get(*contact_id) else {
                continue;
            };
            let (Some(&ia), Some(&ib)) =
                (slots.get(&contact.body_a), slots.get(&contact.body_b))
            else {
                continue;
            };
            constraint_contacts.push(*contact_id);
            position_constraints.push(PositionConstraint {
                index_a: ia,
                index_b: ib,
                manifold: contact.manifold.clone(),
                radius_a: self
                    .shapes
                    .get(contact.shape_a)
                    .map(|s| s.vertex_radius(contact.child_a))
                    .unwrap_or(0.0),
                radius_b: self
                    .shapes
                    .get(contact.shape_b)
                    .map(|s| s.vertex_radius(contact.child_b))
                    .unwrap_or(0.0),
            });
        }

        for i in 0..conf.toi_position_iterations {
            let min_separation = solve_position_constraints(&position_constraints, &mut bodies, conf);
            results.min_separation = results.min_separation.min(min_separation);
            if min_separation >= conf.toi_min_separation {
                results.position_iterations = i + 1;
                results.solved = true;
                break;
            }
        }

        // Leap of faith: commit the corrected positions as the new safe
        // sweep starts. Not doing this makes simulations much slower.
        for bc in &bodies {
            if let Some(body) = self.bodies.get_mut(bc.body) {
                body.sweep.pos0 = bc.position;
            }
        }

        // No warm starting here; the regular phase already applied the
        // accumulated impulses.
        let toi_conf = StepConf {
            do_warm_start: false,
            ..*conf
        };
        let mut velocity_constraints = Vec::with_capacity(constraint_contacts.len());
        for (pc, contact_id) in position_constraints.iter().zip(constraint_contacts.iter()) {
            let Some(contact) = self.contact_arena.get(*contact_id) else {
                continue;
            };
            velocity_constraints.push(VelocityConstraint::new(
                *contact_id,
                &contact.manifold,
                pc.radius_a,
                pc.radius_b,
                contact.friction,
                contact.restitution,
                contact.tangent_speed,
                pc.index_a,
                pc.index_b,
                &bodies,
                &toi_conf,
            ));
        }

        for i in 0..conf.toi_velocity_iterations {
            let incremental = solve_velocity_constraints(&mut velocity_constraints, &mut bodies);
            if incremental <= conf.toi_min_momentum {
                results.velocity_iterations = i + 1;
                break;
            }
            results.max_inc_impulse = results.max_inc_impulse.max(incremental);
        }

        // TOI impulses are not stored for warm starting; they can be huge.
        integrate_positions(&mut bodies, conf.delta_time, conf);

        let mut touched_contacts = Vec::new();
        for bc in &bodies {
            if let Some(body) = self.bodies.get_mut(bc.body) {
                body.velocity = bc.velocity;
                if body.update_from_position(bc.position) {
                    touched_contacts.extend(body.contacts.iter().map(|(_, c)| *c));
                }
            }
        }
        self.flag_contacts_for_updating(&touched_contacts);

        if let Some(mut listener) = self.post_solve.take() {
            for vc in &velocity_constraints {
                let impulses: Vec<ContactImpulse> = vc
                    .points
                    .iter()
                    .map(|p| ContactImpulse {
                        normal: p.normal_impulse,
                        tangent: p.tangent_impulse,
                    })
                    .collect();
                listener(vc.contact, &impulses, results.position_iterations);
            }
            self.post_solve = Some(listener);
        }

        self.island = island;
        results
    }
}
