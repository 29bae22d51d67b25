//! Engine Configuration
//!
//! Signal range and timing constants shared by the baker and the tick
//! scheduler, plus the options a scheduler session can be created with.

use serde::{Deserialize, Serialize};

/// Lowest value a signal can carry.
pub const SIGNAL_MIN: f64 = -100.0;

/// Highest value a signal can carry.
pub const SIGNAL_MAX: f64 = 100.0;

/// Scheduler ticks in one wire transit step (WTS).
pub const TICKS_PER_WTS: u32 = 16;

/// Upper bound on a Delay node's `subdivisions` param.
pub const MAX_DELAY_SUBDIVISIONS: usize = 256;

/// Convert a length in wire transit steps to scheduler ticks.
pub fn wts_to_ticks(steps: u32) -> u32 {
    steps.saturating_mul(TICKS_PER_WTS)
}

/// Options for a [`TickScheduler`](crate::graph::TickScheduler) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Only evaluate nodes on a path from an input to an output.
    pub skip_dead_nodes: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            skip_dead_nodes: true,
        }
    }
}
