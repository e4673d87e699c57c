//! Health State Machine (C7).
//!
//! Consumes aggregate ingest statistics on a fixed interval, computes a
//! smoothed health score, and reports state transitions (§4.7).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fieldmux_common::models::HealthState;

const WINDOW: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub degraded: u8,
    pub critical: u8,
    pub down: u8,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded: 70,
            critical: 40,
            down: 10,
        }
    }
}

/// One cycle's worth of inputs to the scoring rubric.
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs {
    pub active_links: u32,
    pub total_links: u32,
    pub bitrate_kbps: f64,
    pub rtt_avg: f64,
    pub loss_avg: f64,
    pub max_link_score: u8,
    pub staleness: Duration,
}

fn raw_score(inputs: &HealthInputs) -> u8 {
    if inputs.active_links == 0 {
        return 0;
    }
    let mut score: i32 = 100;

    let ratio = inputs.active_links as f64 / inputs.total_links.max(1) as f64;
    if ratio < 0.5 {
        score -= 30;
    } else if ratio < 1.0 {
        score -= 10;
    }

    if inputs.bitrate_kbps < 1000.0 {
        score -= 30;
    } else if inputs.bitrate_kbps < 2000.0 {
        score -= 15;
    }

    if inputs.rtt_avg > 200.0 {
        score -= 20;
    } else if inputs.rtt_avg > 100.0 {
        score -= 10;
    }

    if inputs.loss_avg > 5.0 {
        score -= 25;
    } else if inputs.loss_avg > 1.0 {
        score -= 10;
    }

    if inputs.max_link_score < 50 {
        score -= 15;
    }

    if inputs.staleness > Duration::from_secs(10) {
        score -= 30;
    } else if inputs.staleness > Duration::from_secs(5) {
        score -= 15;
    }

    score.clamp(0, 100) as u8
}

fn state_for(score: u8, thresholds: &HealthThresholds) -> HealthState {
    if score <= thresholds.down {
        HealthState::Down
    } else if score <= thresholds.critical {
        HealthState::Critical
    } else if score <= thresholds.degraded {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

/// Tracks one streamer's smoothed health score across evaluation cycles.
/// Initial state is DOWN (§4.7) until the first cycle runs.
pub struct HealthMonitor {
    thresholds: HealthThresholds,
    window: VecDeque<u8>,
    state: HealthState,
    started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthTransition {
    pub old: HealthState,
    pub new: HealthState,
    pub score: u8,
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            window: VecDeque::with_capacity(WINDOW),
            state: HealthState::Down,
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn since_started(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Run one evaluation cycle. Returns `Some(transition)` if the
    /// smoothed state changed from the prior cycle.
    pub fn evaluate(&mut self, inputs: &HealthInputs) -> Option<HealthTransition> {
        let raw = raw_score(inputs);
        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(raw);

        let smoothed = (self.window.iter().map(|&s| s as u32).sum::<u32>()
            / self.window.len() as u32) as u8;

        let new_state = state_for(smoothed, &self.thresholds);
        if new_state != self.state {
            let transition = HealthTransition {
                old: self.state,
                new: new_state,
                score: smoothed,
            };
            self.state = new_state;
            Some(transition)
        } else {
            None
        }
    }
}
