//! Hooks observing a pipeline run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_ir::IRModule;
use parking_lot::Mutex;

/// Callbacks invoked around every pass of an `optimize` run.
///
/// Instruments observe only; they cannot change the module.
pub trait PassInstrument: Send + Sync {
    fn before_all_passes(&self, _module: &IRModule) {}

    fn before_pass(&self, _pass: &str, _module: &IRModule) {}

    fn after_pass(&self, _pass: &str, _module: &IRModule) {}

    fn after_all_passes(&self, _module: &IRModule) {}
}

#[derive(Debug, Default)]
struct ProfileState {
    pass_started: Option<Instant>,
    timings: Vec<(String, Duration)>,
}

/// Records wall time per pass.
///
/// Clones share their records, so a clone can be handed to a context and
/// the original read afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProfileInstrument {
    state: Arc<Mutex<ProfileState>>,
}

impl ProfileInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(pass name, duration)` for each completed pass, in run order.
    pub fn timings(&self) -> Vec<(String, Duration)> {
        self.state.lock().timings.clone()
    }

    pub fn total(&self) -> Duration {
        self.state.lock().timings.iter().map(|(_, d)| *d).sum()
    }

    pub fn clear(&self) {
        self.state.lock().timings.clear();
    }
}

impl PassInstrument for ProfileInstrument {
    fn before_pass(&self, _pass: &str, _module: &IRModule) {
        self.state.lock().pass_started = Some(Instant::now());
    }

    fn after_pass(&self, pass: &str, _module: &IRModule) {
        let mut state = self.state.lock();
        if let Some(started) = state.pass_started.take() {
            state.timings.push((pass.to_string(), started.elapsed()));
        }
    }
}

/// Logs each pass at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInstrument;

impl PassInstrument for LoggingInstrument {
    fn before_all_passes(&self, module: &IRModule) {
        tracing::info!(functions = module.len(), kernels = module.kernels().count(), "optimize started");
    }

    fn after_pass(&self, pass: &str, module: &IRModule) {
        tracing::info!(pass, functions = module.len(), "pass finished");
    }

    fn after_all_passes(&self, module: &IRModule) {
        tracing::info!(functions = module.len(), "optimize finished");
    }
}
