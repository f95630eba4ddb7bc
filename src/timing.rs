//! Per-node wall timers for load-balancing diagnostics.
//!
//! Each node owns one `NodeTimers` value, touched only by its own
//! advance calls; nothing here is shared across nodes.

use std::time::{Duration, Instant};

/// Step and cumulative wall timers around a node's advance calls.
///
/// The step timer covers the most recently completed advance; the
/// cumulative timer only ever increases. Both start at zero.
#[derive(Debug, Default)]
pub struct NodeTimers {
    step: Duration,
    total: Duration,
    started: Option<Instant>,
}

impl NodeTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the step timer at the top of an advance.
    pub fn start_step(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Stop the step timer and fold the elapsed time into the total.
    pub fn stop_step(&mut self) {
        if let Some(t0) = self.started.take() {
            self.step = t0.elapsed();
            self.total += self.step;
        }
    }

    /// Record an externally measured step duration.
    ///
    /// Used when the caller brackets the work itself (and by tests that
    /// need deterministic durations).
    pub fn record_step(&mut self, elapsed: Duration) {
        self.started = None;
        self.step = elapsed;
        self.total += elapsed;
    }

    /// Wall time of the most recently completed advance, in seconds.
    pub fn step_time(&self) -> f64 {
        self.step.as_secs_f64()
    }

    /// Cumulative wall time across all advances, in seconds.
    pub fn total_time(&self) -> f64 {
        self.total.as_secs_f64()
    }

    pub fn step_duration(&self) -> Duration {
        self.step
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }
}
