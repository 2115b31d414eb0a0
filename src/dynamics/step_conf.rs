use serde::{Deserialize, Serialize};

use crate::collision::ccd::ToiConf;
use crate::config;

/// Per-step tuning: time step, iteration budgets, and solver tolerances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepConf {
    /// Step duration in seconds.
    pub delta_time: f32,
    /// Ratio of this step's duration to the previous one, used to rescale
    /// warm-start impulses.
    pub dt_ratio: f32,

    pub reg_velocity_iterations: u32,
    pub reg_position_iterations: u32,
    pub toi_velocity_iterations: u32,
    pub toi_position_iterations: u32,

    pub min_still_time_to_sleep: f32,
    pub linear_sleep_tolerance: f32,
    pub angular_sleep_tolerance: f32,

    pub linear_slop: f32,
    pub angular_slop: f32,
    pub max_linear_correction: f32,
    pub max_angular_correction: f32,

    /// Early-out threshold for the regular position solver.
    pub reg_min_separation: f32,
    /// Early-out threshold for the TOI position solver.
    pub toi_min_separation: f32,
    /// Early-out threshold on incremental momentum, regular phase.
    pub reg_min_momentum: f32,
    /// Early-out threshold on incremental momentum, TOI phase.
    pub toi_min_momentum: f32,

    pub max_translation: f32,
    pub max_rotation: f32,
    pub max_sub_steps: u32,

    pub do_warm_start: bool,
    pub do_toi: bool,
    /// Stop after the first TOI event and leave the step incomplete.
    pub sub_stepping: bool,

    pub displace_multiplier: f32,
    pub aabb_extension: f32,
    pub tolerance: f32,
    pub target_depth: f32,
    pub velocity_threshold: f32,
    /// Fraction of the position error corrected per iteration.
    pub resolution_rate: f32,

    pub max_toi_iters: u32,
    pub max_root_iters: u32,
    pub max_dist_iters: u32,
}

impl Default for StepConf {
    fn default() -> Self {
        Self {
            delta_time: config::DEFAULT_TIME_STEP,
            dt_ratio: 1.0,
            reg_velocity_iterations: config::DEFAULT_REG_VELOCITY_ITERATIONS,
            reg_position_iterations: config::DEFAULT_REG_POSITION_ITERATIONS,
            toi_velocity_iterations: config::DEFAULT_TOI_VELOCITY_ITERATIONS,
            toi_position_iterations: config::DEFAULT_TOI_POSITION_ITERATIONS,
            min_still_time_to_sleep: config::DEFAULT_MIN_STILL_TIME_TO_SLEEP,
            linear_sleep_tolerance: config::DEFAULT_LINEAR_SLEEP_TOLERANCE,
            angular_sleep_tolerance: config::DEFAULT_ANGULAR_SLEEP_TOLERANCE,
            linear_slop: config::LINEAR_SLOP,
            angular_slop: config::ANGULAR_SLOP,
            max_linear_correction: config::MAX_LINEAR_CORRECTION,
            max_angular_correction: config::MAX_ANGULAR_CORRECTION,
            reg_min_separation: -config::LINEAR_SLOP * 3.0,
            toi_min_separation: -config::LINEAR_SLOP * 1.5,
            reg_min_momentum: 1e-4,
            toi_min_momentum: 1e-4,
            max_translation: config::MAX_TRANSLATION,
            max_rotation: config::MAX_ROTATION,
            max_sub_steps: config::DEFAULT_MAX_SUB_STEPS,
            do_warm_start: true,
            do_toi: true,
            sub_stepping: false,
            displace_multiplier: config::DEFAULT_DISPLACE_MULTIPLIER,
            aabb_extension: config::DEFAULT_AABB_EXTENSION,
            tolerance: config::DEFAULT_TOLERANCE,
            target_depth: config::DEFAULT_TARGET_DEPTH,
            velocity_threshold: config::DEFAULT_VELOCITY_THRESHOLD,
            resolution_rate: config::DEFAULT_RESOLUTION_RATE,
            max_toi_iters: config::DEFAULT_MAX_TOI_ITERS,
            max_root_iters: config::DEFAULT_MAX_ROOT_ITERS,
            max_dist_iters: config::DEFAULT_MAX_DIST_ITERS,
        }
    }
}

impl StepConf {
    pub fn with_time(mut self, dt: f32) -> Self {
        self.delta_time = dt;
        self
    }

    pub fn inv_time(&self) -> f32 {
        if self.delta_time != 0.0 {
            1.0 / self.delta_time
        } else {
            0.0
        }
    }

    /// TOI tuning derived from the step tuning.
    pub fn toi_conf(&self) -> ToiConf {
        ToiConf {
            t_max: 1.0,
            target_depth: self.target_depth,
            tolerance: self.tolerance,
            max_toi_iters: self.max_toi_iters,
            max_root_iters: self.max_root_iters,
            max_dist_iters: self.max_dist_iters,
        }
    }
}

/// Counts from the pre-solve portion of a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreStepStats {
    pub proxies_moved: u32,
    pub contacts_destroyed: u32,
    pub contacts_added: u32,
    pub contacts_ignored: u32,
    pub contacts_updated: u32,
    pub contacts_skipped: u32,
}

/// Aggregates from the regular-phase solver.
#[derive(Debug, Clone, Copy)]
pub struct RegStepStats {
    pub min_separation: f32,
    pub max_inc_impulse: f32,
    pub islands_found: u32,
    pub islands_solved: u32,
    pub contacts_added: u32,
    pub bodies_slept: u32,
    pub proxies_moved: u32,
    pub sum_pos_iters: u32,
    pub sum_vel_iters: u32,
}

impl Default for RegStepStats {
    fn default() -> Self {
        Self {
            min_separation: f32::INFINITY,
            max_inc_impulse: 0.0,
            islands_found: 0,
            islands_solved: 0,
            contacts_added: 0,
            bodies_slept: 0,
            proxies_moved: 0,
            sum_pos_iters: 0,
            sum_vel_iters: 0,
        }
    }
}

/// Aggregates from the TOI-phase solver.
#[derive(Debug, Clone, Copy)]
pub struct ToiStepStats {
    pub min_separation: f32,
    pub max_inc_impulse: f32,
    pub islands_found: u32,
    pub islands_solved: u32,
    pub contacts_found: u32,
    pub contacts_added: u32,
    pub contacts_updated_toi: u32,
    pub contacts_updated_touching: u32,
    pub contacts_skipped_touching: u32,
    pub contacts_at_max_sub_steps: u32,
    pub proxies_moved: u32,
    pub sum_pos_iters: u32,
    pub sum_vel_iters: u32,
    pub max_dist_iters: u32,
    pub max_toi_iters: u32,
    pub max_root_iters: u32,
    pub max_simul_contacts: u32,
}

impl Default for ToiStepStats {
    fn default() -> Self {
        Self {
            min_separation: f32::INFINITY,
            max_inc_impulse: 0.0,
            islands_found: 0,
            islands_solved: 0,
            contacts_found: 0,
            contacts_added: 0,
            contacts_updated_toi: 0,
            contacts_updated_touching: 0,
            contacts_skipped_touching: 0,
            contacts_at_max_sub_steps: 0,
            proxies_moved: 0,
            sum_pos_iters: 0,
            sum_vel_iters: 0,
            max_dist_iters: 0,
            max_toi_iters: 0,
            max_root_iters: 0,
            max_simul_contacts: 0,
        }
    }
}

/// Everything a single `World::step` reports back.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStats {
    pub pre: PreStepStats,
    pub reg: RegStepStats,
    pub toi: ToiStepStats,
}

/// Result of solving one island.
#[derive(Debug, Clone, Copy)]
pub struct IslandStats {
    pub min_separation: f32,
    pub max_inc_impulse: f32,
    pub solved: bool,
    pub position_iterations: u32,
    pub velocity_iterations: u32,
    pub contacts_updated: u32,
    pub contacts_skipped: u32,
    pub bodies_slept: u32,
}

impl Default for IslandStats {
    fn default() -> Self {
        Self {
            min_separation: f32::INFINITY,
            max_inc_impulse: 0.0,
            solved: false,
            position_iterations: 0,
            velocity_iterations: 0,
            contacts_updated: 0,
            contacts_skipped: 0,
            bodies_slept: 0,
        }
    }
}

impl RegStepStats {
    pub fn absorb(&mut self, island: &IslandStats) {
        self.min_separation = self.min_separation.min(island.min_separation);
        self.max_inc_impulse = self.max_inc_impulse.max(island.max_inc_impulse);
        self.islands_solved += island.solved as u32;
        self.bodies_slept += island.bodies_slept;
        self.sum_pos_iters += island.position_iterations;
        self.sum_vel_iters += island.velocity_iterations;
    }
}
