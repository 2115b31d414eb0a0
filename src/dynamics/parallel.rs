//! Intra-step island parallelism.
//!
//! Islands are disjoint by construction, so once their solve jobs are
//! staged they can run on the rayon pool. Island discovery and the
//! write-back of solved state stay serial; determinism is only guaranteed
//! on the single-threaded path.

use rayon::prelude::*;

use crate::dynamics::solver::{solve_reg_island_gs, RegIslandJob};
use crate::dynamics::step_conf::{IslandStats, StepConf};

/// Solves every staged island job on the rayon pool.
pub fn solve_reg_island_jobs(jobs: &mut [RegIslandJob], conf: &StepConf) -> Vec<IslandStats> {
    jobs.par_iter_mut()
        .map(|job| solve_reg_island_gs(job, conf))
        .collect()
}
