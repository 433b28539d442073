//! Rolling tick execution statistics

use std::collections::VecDeque;

use serde::Serialize;

/// Ticks kept in the rolling window
const WINDOW: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct TickStats {
    total_ticks: u64,
    recent: VecDeque<u64>,
    recent_sum: u64,
    max_micros: u64,
    over_budget: u64,
}

/// Serializable view of [`TickStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total_ticks: u64,
    pub average_ms: f64,
    pub max_ms: f64,
    pub over_budget: u64,
}

impl TickStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick. Returns true if it went over `budget_micros`.
    pub fn record(&mut self, elapsed_micros: u64, budget_micros: u64) -> bool {
        self.total_ticks += 1;
        self.recent.push_back(elapsed_micros);
        self.recent_sum += elapsed_micros;
        if self.recent.len() > WINDOW {
            if let Some(oldest) = self.recent.pop_front() {
                self.recent_sum -= oldest;
            }
        }
        self.max_micros = self.max_micros.max(elapsed_micros);

        let over = elapsed_micros > budget_micros;
        if over {
            self.over_budget += 1;
        }
        over
    }

    pub fn average_micros(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        self.recent_sum as f64 / self.recent.len() as f64
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            total_ticks: self.total_ticks,
            average_ms: self.average_micros() / 1_000.0,
            max_ms: self.max_micros as f64 / 1_000.0,
            over_budget: self.over_budget,
        }
    }
}
