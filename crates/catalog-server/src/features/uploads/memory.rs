//! Process memory guard
//!
//! Samples the resident set size of the server process and compares it with
//! the configured ceiling. A measurement failure never blocks an upload: the
//! guard logs a warning and reports the process as safe.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::config::UploadConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of process memory measurements
pub trait MemoryProbe: Send + Sync {
    /// Resident memory of this process in bytes, `None` when unavailable
    fn resident_bytes(&self) -> Option<u64>;

    /// Hand freed memory back before a re-measurement.
    ///
    /// The default does nothing, so the follow-up reading sees the same
    /// resident set unless an implementation can actually release memory.
    fn reclaim(&self) {}
}

/// [`MemoryProbe`] backed by `sysinfo`.
///
/// Keeps the no-op [`MemoryProbe::reclaim`]: upload buffers are freed when
/// they drop, and there is no allocator hook to trim the heap further. A
/// reading over the ceiling therefore stays over it on re-measurement.
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|err| tracing::warn!(error = %err, "Cannot resolve own pid"))
            .ok();
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> Option<u64> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return None;
        }
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(pid).map(|process| process.memory())
    }
}

/// Result of a memory check
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryStatus {
    pub is_safe: bool,
    pub used_percent: f64,
    pub used_mb: f64,
}

impl MemoryStatus {
    fn unmeasured() -> Self {
        Self {
            is_safe: true,
            used_percent: 0.0,
            used_mb: 0.0,
        }
    }
}

#[derive(Clone)]
pub struct MemoryGuard {
    probe: Arc<dyn MemoryProbe>,
    limit_mb: f64,
    warn_percent: f64,
}

impl MemoryGuard {
    pub fn new(probe: Arc<dyn MemoryProbe>, limit_mb: f64, warn_percent: f64) -> Self {
        Self {
            probe,
            limit_mb,
            warn_percent,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            Arc::new(SysinfoProbe::new()),
            config.memory_limit_mb,
            config.memory_warn_percent,
        )
    }

    fn sample_mb(&self) -> Option<f64> {
        self.probe
            .resident_bytes()
            .map(|bytes| bytes as f64 / BYTES_PER_MB)
    }

    fn status(&self, used_mb: f64) -> MemoryStatus {
        MemoryStatus {
            is_safe: used_mb < self.limit_mb,
            used_percent: used_mb / self.limit_mb * 100.0,
            used_mb,
        }
    }

    /// Measure current usage against the ceiling.
    ///
    /// Above the warning threshold one reclamation pass runs. At or above the
    /// ceiling the guard reclaims, re-measures, and reports unsafe only if the
    /// second reading is still at or above the ceiling.
    pub fn check_limit(&self) -> MemoryStatus {
        let Some(used_mb) = self.sample_mb() else {
            tracing::warn!("Memory usage unavailable, allowing request");
            return MemoryStatus::unmeasured();
        };

        let status = self.status(used_mb);

        if !status.is_safe {
            tracing::warn!(
                used_mb,
                limit_mb = self.limit_mb,
                "Memory at ceiling, reclaiming"
            );
            self.probe.reclaim();

            let status = self.status(self.sample_mb().unwrap_or(used_mb));
            if !status.is_safe {
                tracing::error!(
                    used_mb = status.used_mb,
                    limit_mb = self.limit_mb,
                    "Memory still at ceiling after reclamation"
                );
            }
            return status;
        }

        if status.used_percent >= self.warn_percent {
            tracing::info!(
                used_mb,
                used_percent = status.used_percent,
                "Memory above warning threshold, reclaiming"
            );
            self.probe.reclaim();
        }

        status
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProbe;
    use super::*;

    fn guard(probe: Arc<ScriptedProbe>) -> MemoryGuard {
        MemoryGuard::new(probe, 100.0, 80.0)
    }

    #[test]
    fn test_below_warning_is_safe_without_reclaim() {
        let probe = ScriptedProbe::constant(50.0);
        let status = guard(probe.clone()).check_limit();

        assert!(status.is_safe);
        assert!((status.used_percent - 50.0).abs() < 0.01);
        assert_eq!(probe.reclaims(), 0);
    }

    #[test]
    fn test_warning_threshold_reclaims_once() {
        let probe = ScriptedProbe::constant(85.0);
        let status = guard(probe.clone()).check_limit();

        assert!(status.is_safe);
        assert_eq!(probe.reclaims(), 1);
    }

    #[test]
    fn test_over_limit_recovers_after_reclaim() {
        let probe = ScriptedProbe::new([Some(120.0), Some(60.0)]);
        let status = guard(probe.clone()).check_limit();

        assert!(status.is_safe);
        assert!((status.used_mb - 60.0).abs() < 0.01);
        assert_eq!(probe.reclaims(), 1);
    }

    #[test]
    fn test_over_limit_stays_unsafe() {
        let probe = ScriptedProbe::constant(150.0);
        let status = guard(probe.clone()).check_limit();

        assert!(!status.is_safe);
        assert!(status.used_percent >= 100.0);
    }

    #[test]
    fn test_exactly_at_limit_is_unsafe() {
        let status = guard(ScriptedProbe::constant(100.0)).check_limit();
        assert!(!status.is_safe);
    }

    #[test]
    fn test_measurement_failure_fails_open() {
        let probe = ScriptedProbe::new([None]);
        let status = guard(probe.clone()).check_limit();

        assert!(status.is_safe);
        assert_eq!(probe.reclaims(), 0);
    }

    #[test]
    fn test_sysinfo_probe_reports_something() {
        let probe = SysinfoProbe::new();
        if sysinfo::IS_SUPPORTED_SYSTEM {
            assert!(probe.resident_bytes().unwrap_or(0) > 0);
        }
    }
}
