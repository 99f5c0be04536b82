//! Hardware probing via sysinfo and nvidia-smi

use std::process::Command;

use sysinfo::System;
use tracing::{debug, warn};

use crate::specs::{CpuSpecs, GpuSpecs, HardwareSpecs, RamSpecs};

/// Probes host capabilities into `HardwareSpecs` snapshots.
///
/// Each call to [`HardwareProbe::probe`] refreshes system counters, so free
/// memory reflects the moment of the call. Probing never fails: facts that
/// cannot be read degrade to `None`/zero rather than erroring.
pub struct HardwareProbe {
    system: System,
}

impl HardwareProbe {
    /// Create a new probe
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
        }
    }

    /// Take a fresh snapshot of the host
    pub fn probe(&mut self) -> HardwareSpecs {
        self.system.refresh_memory();
        self.system.refresh_cpu();

        let ram = RamSpecs {
            total_mb: self.system.total_memory() / (1024 * 1024),
            free_mb: self.system.available_memory() / (1024 * 1024),
        };

        let cpu = CpuSpecs {
            cores: self.system.cpus().len(),
            model: self
                .system
                .cpus()
                .first()
                .map(|c| c.brand().trim().to_string())
                .filter(|b| !b.is_empty()),
        };

        let gpu = probe_nvidia_gpu();

        debug!(
            total_mb = ram.total_mb,
            free_mb = ram.free_mb,
            cores = cpu.cores,
            gpu = gpu.available,
            "probed hardware"
        );

        HardwareSpecs { gpu, ram, cpu }
    }
}

impl Default for HardwareProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Query `nvidia-smi` for GPU name and VRAM. A present, working nvidia-smi
/// implies CUDA support; anything else reports no GPU.
fn probe_nvidia_gpu() -> GpuSpecs {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            match parse_nvidia_smi(&stdout) {
                Some(gpu) => gpu,
                None => {
                    warn!("nvidia-smi produced unparseable output");
                    GpuSpecs::default()
                }
            }
        }
        Ok(out) => {
            debug!(status = %out.status, "nvidia-smi exited non-zero, assuming no GPU");
            GpuSpecs::default()
        }
        Err(_) => GpuSpecs::default(),
    }
}

/// Parse the first line of `nvidia-smi --query-gpu=name,memory.total` output.
fn parse_nvidia_smi(stdout: &str) -> Option<GpuSpecs> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let (name, vram) = line.rsplit_once(',')?;
    let vram_mb = vram.trim().parse::<u64>().ok()?;

    Some(GpuSpecs {
        available: true,
        name: Some(name.trim().to_string()),
        vram_mb: Some(vram_mb),
        cuda_support: Some(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_reports_plausible_facts() {
        let mut probe = HardwareProbe::new();
        let specs = probe.probe();
        assert!(specs.ram.total_mb > 0);
        assert!(specs.ram.free_mb <= specs.ram.total_mb);
        assert!(specs.cpu.cores > 0);
    }

    #[test]
    fn parses_nvidia_smi_line() {
        let gpu = parse_nvidia_smi("NVIDIA GeForce RTX 3080, 10240\n").unwrap();
        assert!(gpu.available);
        assert_eq!(gpu.name.as_deref(), Some("NVIDIA GeForce RTX 3080"));
        assert_eq!(gpu.vram_mb, Some(10240));
        assert_eq!(gpu.cuda_support, Some(true));
    }

    #[test]
    fn model_names_containing_commas_keep_the_name_intact() {
        let gpu = parse_nvidia_smi("Tesla V100-SXM2-16GB, 16160").unwrap();
        assert_eq!(gpu.vram_mb, Some(16160));
    }

    #[test]
    fn garbage_output_yields_no_gpu() {
        assert!(parse_nvidia_smi("").is_none());
        assert!(parse_nvidia_smi("not a gpu line").is_none());
    }
}
