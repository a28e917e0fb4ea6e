#![allow(unused)]
//! Per-thread timers for assembly and linear solves, active with the
//! `timing` feature and free otherwise.

use std::cell::RefCell;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Residual,
    Jacobian,
    LinearSolve,
    AdjointSolve,
}

#[derive(Default, Clone, Debug)]
pub struct TimingStats {
    pub residual_times: Vec<Duration>,
    pub jacobian_times: Vec<Duration>,
    pub linear_solve_times: Vec<Duration>,
    pub adjoint_solve_times: Vec<Duration>,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&mut self, phase: Phase) -> &mut Vec<Duration> {
        match phase {
            Phase::Residual => &mut self.residual_times,
            Phase::Jacobian => &mut self.jacobian_times,
            Phase::LinearSolve => &mut self.linear_solve_times,
            Phase::AdjointSolve => &mut self.adjoint_solve_times,
        }
    }

    pub fn times(&self, phase: Phase) -> &[Duration] {
        match phase {
            Phase::Residual => &self.residual_times,
            Phase::Jacobian => &self.jacobian_times,
            Phase::LinearSolve => &self.linear_solve_times,
            Phase::AdjointSolve => &self.adjoint_solve_times,
        }
    }

    pub fn total(&self, phase: Phase) -> Duration {
        self.times(phase).iter().sum()
    }

    pub fn log_summary(&self) {
        for (label, times) in [
            ("residual assembly", &self.residual_times),
            ("jacobian assembly", &self.jacobian_times),
            ("linear solve", &self.linear_solve_times),
            ("adjoint solve", &self.adjoint_solve_times),
        ] {
            if times.is_empty() {
                continue;
            }
            let total: Duration = times.iter().sum();
            log::info!(
                "{label:<18} {:>9.3}ms over {:>4} calls (avg {:>9.3}ms)",
                total.as_secs_f64() * 1e3,
                times.len(),
                total.as_secs_f64() * 1e3 / times.len() as f64
            );
        }
    }
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::new());
}

#[cfg(feature = "timing")]
pub fn reset_timing() {
    TIMING_STATS.with(|stats| {
        *stats.borrow_mut() = TimingStats::new();
    });
}

#[cfg(not(feature = "timing"))]
pub fn reset_timing() {}

#[cfg(feature = "timing")]
pub fn record<F, R>(phase: Phase, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| {
        stats.borrow_mut().bucket(phase).push(elapsed);
    });
    result
}

#[cfg(not(feature = "timing"))]
#[inline]
pub fn record<F, R>(_phase: Phase, f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn snapshot() -> TimingStats {
    TIMING_STATS.with(|stats| stats.borrow().clone())
}

#[cfg(not(feature = "timing"))]
pub fn snapshot() -> TimingStats {
    TimingStats::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_returns_closure_value() {
        reset_timing();
        let v = record(Phase::Jacobian, || 41 + 1);
        assert_eq!(v, 42);
        let stats = snapshot();
        #[cfg(feature = "timing")]
        assert_eq!(stats.jacobian_times.len(), 1);
        #[cfg(not(feature = "timing"))]
        assert!(stats.jacobian_times.is_empty());
    }
}
