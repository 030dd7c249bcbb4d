//! Aggregate metrics over a cycle history

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::CycleRecord;

/// Convergence change smaller than this counts as steady.
pub const TREND_DEAD_BAND: f64 = 0.05;

/// Direction of convergence between the first and last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Mutation and stabilization are drawing closer
    Converging,
    /// Mutation and stabilization are drifting apart
    Diverging,
    /// No meaningful change
    Steady,
}

impl Trend {
    /// Classify the change from `first` to `last` convergence.
    #[must_use]
    pub fn between(first: f64, last: f64) -> Self {
        let change = last - first;
        if change > TREND_DEAD_BAND {
            Self::Converging
        } else if change < -TREND_DEAD_BAND {
            Self::Diverging
        } else {
            Self::Steady
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Converging => "converging",
            Self::Diverging => "diverging",
            Self::Steady => "steady",
        })
    }
}

/// Aggregate view of a finished (or partial) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of records summarized
    pub cycles_completed: u32,
    /// Mean mutation entropy
    pub mean_heat_entropy: f64,
    /// Mean stabilization stability
    pub mean_cool_stability: f64,
    /// Mean convergence
    pub mean_convergence: f64,
    /// Mean RSI
    pub mean_rsi: f64,
    /// RSI of the last cycle
    pub final_rsi: f64,
    /// Cycle number with the highest RSI (earliest on ties)
    pub best_cycle: u32,
    /// Sum of per-cycle line deltas
    pub net_delta_lines: i64,
    /// First vs last convergence
    pub trend: Trend,
}

impl RunSummary {
    /// Summarize `history`. Returns `None` when it is empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_history(history: &[CycleRecord]) -> Option<Self> {
        let first = history.first()?;
        let last = history.last()?;
        let count = history.len() as f64;

        let mean = |f: fn(&CycleRecord) -> f64| history.iter().map(f).sum::<f64>() / count;

        let mut best = first;
        for record in history {
            if record.rsi() > best.rsi() {
                best = record;
            }
        }

        Some(Self {
            cycles_completed: u32::try_from(history.len()).unwrap_or(u32::MAX),
            mean_heat_entropy: mean(|r| r.metrics.heat_entropy),
            mean_cool_stability: mean(|r| r.metrics.cool_stability),
            mean_convergence: mean(|r| r.metrics.convergence),
            mean_rsi: mean(CycleRecord::rsi),
            final_rsi: last.rsi(),
            best_cycle: best.cycle_number,
            net_delta_lines: history.iter().map(|r| r.metrics.delta_lines).sum(),
            trend: Trend::between(first.metrics.convergence, last.metrics.convergence),
        })
    }
}
