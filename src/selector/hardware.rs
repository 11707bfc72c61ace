//! Hardware probing

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::System;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Host resources relevant to model choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub total_memory_mb: u64,
    pub available_memory_mb: u64,
    pub cpu_cores: usize,
    pub has_gpu: bool,
}

/// Source of hardware profiles
pub trait HardwareProbe: Send + Sync {
    fn probe(&self) -> HardwareProfile;
}

/// Probe backed by `sysinfo`
pub struct SystemHardwareProbe {
    system: Mutex<System>,
    assume_gpu: bool,
}

impl SystemHardwareProbe {
    pub fn new(assume_gpu: bool) -> Self {
        Self {
            system: Mutex::new(System::new()),
            assume_gpu,
        }
    }
}

impl HardwareProbe for SystemHardwareProbe {
    fn probe(&self) -> HardwareProfile {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        sys.refresh_cpu();
        
        HardwareProfile {
            total_memory_mb: sys.total_memory() / BYTES_PER_MB,
            available_memory_mb: sys.available_memory() / BYTES_PER_MB,
            cpu_cores: sys.cpus().len().max(1),
            has_gpu: self.assume_gpu,
        }
    }
}

/// Fixed profile, for tests and pinned deployments
#[derive(Debug, Clone, Copy)]
pub struct StaticHardwareProbe(pub HardwareProfile);

impl HardwareProbe for StaticHardwareProbe {
    fn probe(&self) -> HardwareProfile {
        self.0
    }
}
