//! Host resource arbitration.
//!
//! The resource manager is the sole arbiter of how much concurrency is
//! available. It is initialized once per run, queried (never mutated) by
//! the phase executor during concurrency resolution, and cleaned up when
//! the run ends. Cleanup runs even when the phase loop errors.

use sysinfo::System;
use tracing::{debug, info};

/// Reports the available concurrency budget for external test processes.
#[derive(Debug)]
pub struct ResourceManager {
    /// Hard ceiling from configuration.
    cap: usize,
    /// Probed budget; set by `init`.
    available: usize,
    initialized: bool,
}

impl ResourceManager {
    /// Create a manager with a configured ceiling. Call `init` before use.
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            available: 1,
            initialized: false,
        }
    }

    /// Probe the host and fix the concurrency budget for this run.
    ///
    /// One CPU is left for the coordinating process and the services under
    /// test; the configured cap still wins when lower.
    pub fn init(&mut self) {
        let mut system = System::new();
        system.refresh_cpu_all();
        let cpus = system.cpus().len().max(1);
        self.available = cpus.saturating_sub(1).clamp(1, self.cap);
        self.initialized = true;
        info!(cpus, budget = self.available, "resource manager initialized");
    }

    /// Concurrency budget available to a phase. Defaults to 1 before `init`.
    pub fn available(&self) -> usize {
        if self.initialized { self.available } else { 1 }
    }

    /// Release the budget at the end of the run.
    pub fn cleanup(&mut self) {
        if self.initialized {
            debug!("resource manager cleaned up");
            self.initialized = false;
        }
    }
}
