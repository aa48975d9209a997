//! Process Memory Sampling
//!
//! Feeds the memory-pressure check of the cache primitive.

use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// Source of the current process memory usage
pub trait MemoryProbe: Send + Sync {
    /// Fraction (0.0-1.0) of available memory in use, `None` if unknown
    fn usage_ratio(&self) -> Option<f64>;
}

// =============================================================================
// System Probe
// =============================================================================

/// Probe reporting resident memory of this process over total system memory
pub struct SystemMemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn usage_ratio(&self) -> Option<f64> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        system.refresh_memory();
        if !system.refresh_process(pid) {
            return None;
        }

        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        let used = system.process(pid)?.memory();
        Some(used as f64 / total as f64)
    }
}

// =============================================================================
// Fixed Probe
// =============================================================================

/// Probe that always reports the same ratio
///
/// Useful to disable pressure handling (`0.0`) or to force it (`1.0`).
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(pub f64);

impl MemoryProbe for FixedMemoryProbe {
    fn usage_ratio(&self) -> Option<f64> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_probe_in_range() {
        let probe = SystemMemoryProbe::new();
        if let Some(ratio) = probe.usage_ratio() {
            assert!(ratio >= 0.0);
            assert!(ratio <= 1.0);
        }
    }

    #[test]
    fn test_fixed_probe() {
        assert_eq!(FixedMemoryProbe(0.42).usage_ratio(), Some(0.42));
    }
}
