use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Wall time and memory for one phase of a run.
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub elapsed: Duration,
    pub memory_mb: Option<u64>,
}

/// Records per-phase timings for a batch run. Memory sampling needs the
/// `cli` feature; without it only timings are kept.
pub struct RunMonitor {
    enabled: bool,
    started: Instant,
    phase_started: Instant,
    phases: Vec<PhaseStats>,
    peak_memory_mb: u64,
    #[cfg(feature = "cli")]
    sampler: Option<(Mutex<System>, Pid)>,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            phase_started: now,
            phases: Vec::new(),
            peak_memory_mb: 0,
            #[cfg(feature = "cli")]
            sampler: if enabled {
                sysinfo::get_current_pid()
                    .ok()
                    .map(|pid| (Mutex::new(System::new()), pid))
            } else {
                None
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn sample_memory_mb(&self) -> Option<u64> {
        let (system, pid) = self.sampler.as_ref()?;
        let mut system = system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[*pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(*pid).map(|p| p.memory() / 1024 / 1024)
    }

    #[cfg(not(feature = "cli"))]
    fn sample_memory_mb(&self) -> Option<u64> {
        None
    }

    /// Closes the current phase and starts timing the next one.
    pub fn end_phase(&mut self, phase: &str) {
        if !self.enabled {
            return;
        }
        let stats = PhaseStats {
            phase: phase.to_string(),
            elapsed: self.phase_started.elapsed(),
            memory_mb: self.sample_memory_mb(),
        };
        if let Some(mb) = stats.memory_mb {
            self.peak_memory_mb = self.peak_memory_mb.max(mb);
        }

        match stats.memory_mb {
            Some(mb) => tracing::info!("📊 {} - Time: {:?}, Memory: {}MB", phase, stats.elapsed, mb),
            None => tracing::info!("📊 {} - Time: {:?}", phase, stats.elapsed),
        }

        self.phases.push(stats);
        self.phase_started = Instant::now();
    }

    pub fn phases(&self) -> &[PhaseStats] {
        &self.phases
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.started.elapsed(),
            self.peak_memory_mb
        );
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
