//! System load probing

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Load features used to predict batch size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSnapshot {
    /// CPU utilization in [0, 1]
    pub cpu_utilization: f64,
    
    /// Queries waiting or in flight
    pub queue_depth: usize,
    
    /// Free memory fraction in [0, 1]
    pub memory_headroom: f64,
}

impl LoadSnapshot {
    pub const FEATURES: usize = 3;
    
    pub fn features(&self) -> [f64; Self::FEATURES] {
        [
            self.cpu_utilization,
            self.queue_depth as f64,
            self.memory_headroom,
        ]
    }
}

/// Source of load snapshots
pub trait LoadProbe: Send + Sync {
    fn snapshot(&self, queue_depth: usize) -> LoadSnapshot;
}

/// Probe backed by `sysinfo`
pub struct SystemLoadProbe {
    system: Mutex<System>,
}

impl SystemLoadProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemLoadProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProbe for SystemLoadProbe {
    fn snapshot(&self, queue_depth: usize) -> LoadSnapshot {
        let mut sys = self.system.lock();
        sys.refresh_cpu();
        sys.refresh_memory();
        
        let total = sys.total_memory();
        let memory_headroom = if total > 0 {
            sys.available_memory() as f64 / total as f64
        } else {
            0.0
        };
        
        LoadSnapshot {
            cpu_utilization: (sys.global_cpu_info().cpu_usage() as f64 / 100.0).clamp(0.0, 1.0),
            queue_depth,
            memory_headroom,
        }
    }
}

/// Fixed CPU and memory readings; queue depth is passed through
#[derive(Debug, Clone, Copy)]
pub struct StaticLoadProbe {
    pub cpu_utilization: f64,
    pub memory_headroom: f64,
}

impl StaticLoadProbe {
    pub fn new(cpu_utilization: f64, memory_headroom: f64) -> Self {
        Self {
            cpu_utilization,
            memory_headroom,
        }
    }
}

impl LoadProbe for StaticLoadProbe {
    fn snapshot(&self, queue_depth: usize) -> LoadSnapshot {
        LoadSnapshot {
            cpu_utilization: self.cpu_utilization,
            queue_depth,
            memory_headroom: self.memory_headroom,
        }
    }
}
