use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use sysinfo::{Pid, System};

use crate::error::{Error, Result};

static RECLAIM_HINTS: AtomicU64 = AtomicU64::new(0);

/// Note that a producer finished with its jobs and their memory could be
/// reclaimed. There is no collector to run; the hint is only counted and
/// shows up as `gc_cycles` in `MemStats`.
pub fn reclaim_hint() {
    RECLAIM_HINTS.fetch_add(1, Ordering::Relaxed);
}

fn reclaim_hints() -> u64 {
    RECLAIM_HINTS.load(Ordering::Relaxed)
}

/// Memory figures for the running process, in bytes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemStats {
    /// Resident memory right now.
    pub allocated: u64,
    /// Sum of every increase in resident memory seen by the reporter.
    pub total_allocated: u64,
    /// Virtual memory reserved by the process.
    pub reserved: u64,
    /// Reclaim hints issued so far.
    pub gc_cycles: u64,
}

fn b_to_mb(b: u64) -> u64 {
    b / 1024 / 1024
}

impl fmt::Display for MemStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Alloc = {} MiB\tTotalAlloc = {} MiB\tSys = {} MiB\tNumGC = {}",
            b_to_mb(self.allocated),
            b_to_mb(self.total_allocated),
            b_to_mb(self.reserved),
            self.gc_cycles,
        )
    }
}

/// Reads memory statistics for the current process.
pub struct StatsReporter {
    system: System,
    pid: Pid,
    last_resident: u64,
    total_growth: u64,
}

impl StatsReporter {
    pub fn new() -> Result<StatsReporter> {
        let pid = sysinfo::get_current_pid().map_err(|e| Error::Stats(e.to_string()))?;
        Ok(StatsReporter {
            system: System::new(),
            pid,
            last_resident: 0,
            total_growth: 0,
        })
    }

    pub fn snapshot(&mut self) -> Result<MemStats> {
        let pid = self.pid;
        if !self.system.refresh_process(pid) {
            return Err(Error::Stats(format!("process {} not found", pid)));
        }
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| Error::Stats(format!("process {} not found", pid)))?;
        let resident = process.memory();
        let reserved = process.virtual_memory();

        self.total_growth += resident.saturating_sub(self.last_resident);
        self.last_resident = resident;
        Ok(MemStats {
            allocated: resident,
            total_allocated: self.total_growth,
            reserved,
            gc_cycles: reclaim_hints(),
        })
    }
}

impl fmt::Debug for StatsReporter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StatsReporter")
            .field("pid", &self.pid)
            .field("total_growth", &self.total_growth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{reclaim_hint, reclaim_hints, MemStats, StatsReporter};

    #[test]
    fn display_in_mib() {
        let stats = MemStats {
            allocated: 3 * 1024 * 1024 + 10,
            total_allocated: 7 * 1024 * 1024,
            reserved: 1024,
            gc_cycles: 4,
        };
        assert_eq!(
            stats.to_string(),
            "Alloc = 3 MiB\tTotalAlloc = 7 MiB\tSys = 0 MiB\tNumGC = 4"
        );
    }

    #[test]
    fn snapshot_reads_this_process() {
        let mut reporter = StatsReporter::new().unwrap();
        let first = reporter.snapshot().unwrap();
        assert!(first.allocated > 0);
        assert_eq!(first.total_allocated, first.allocated);

        let ballast = vec![1u8; 8 * 1024 * 1024];
        let second = reporter.snapshot().unwrap();
        assert!(second.total_allocated >= first.total_allocated);
        assert!(second.total_allocated >= second.allocated);
        drop(ballast);
    }

    #[test]
    fn hints_are_counted() {
        let before = reclaim_hints();
        reclaim_hint();
        assert!(reclaim_hints() > before);
    }
}
