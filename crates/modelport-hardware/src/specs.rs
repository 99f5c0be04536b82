//! Hardware snapshot data model

use serde::{Deserialize, Serialize};

/// Immutable snapshot of host capabilities, recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareSpecs {
    /// GPU facts
    pub gpu: GpuSpecs,
    /// Memory facts
    pub ram: RamSpecs,
    /// Processor facts
    pub cpu: CpuSpecs,
}

/// GPU presence and capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuSpecs {
    /// Whether a discrete GPU was detected
    pub available: bool,
    /// GPU model name, when known
    pub name: Option<String>,
    /// Video memory in megabytes, when known
    pub vram_mb: Option<u64>,
    /// Whether CUDA is usable, when known
    pub cuda_support: Option<bool>,
}

/// System memory in megabytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamSpecs {
    /// Total installed memory
    pub total_mb: u64,
    /// Currently available memory
    pub free_mb: u64,
}

/// Processor facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSpecs {
    /// Number of logical cores
    pub cores: usize,
    /// CPU brand string, when known
    pub model: Option<String>,
}

impl HardwareSpecs {
    /// Convenience constructor for a CPU-only host, used widely in tests.
    pub fn cpu_only(total_mb: u64, free_mb: u64, cores: usize) -> Self {
        Self {
            gpu: GpuSpecs::default(),
            ram: RamSpecs { total_mb, free_mb },
            cpu: CpuSpecs { cores, model: None },
        }
    }
}
