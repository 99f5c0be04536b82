//! Suitability scoring and ranking

use modelport_hardware::HardwareSpecs;
use modelport_providers::ModelInfo;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::requirements::SystemRequirements;

/// A scored catalog entry. Derived data: recomputed whenever hardware or
/// catalog changes, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecommendation {
    /// The catalog entry
    pub model: ModelInfo,
    /// 0..=100 estimate of how well the model runs on this hardware
    pub suitability: u8,
    /// Human-readable description of the dominant limiting factor
    pub reason: String,
    /// Requirements the score was computed against
    pub requirements: SystemRequirements,
}

/// Scores catalog entries against a hardware snapshot.
pub struct RecommendationEngine;

impl RecommendationEngine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Score and rank `catalog` against `hardware`. Sorted by suitability
    /// descending, ties broken by larger context size, then catalog order.
    pub fn recommend(
        &self,
        catalog: &[ModelInfo],
        hardware: &HardwareSpecs,
    ) -> Vec<ModelRecommendation> {
        let mut recommendations: Vec<ModelRecommendation> = catalog
            .iter()
            .map(|model| {
                let requirements = SystemRequirements::for_model(model);
                let (suitability, reason) = score(&requirements, hardware);
                debug!(model = %model.id, suitability, "scored model");
                ModelRecommendation {
                    model: model.clone(),
                    suitability,
                    reason,
                    requirements,
                }
            })
            .collect();

        // Stable sort keeps catalog order for full ties.
        recommendations.sort_by(|a, b| {
            b.suitability.cmp(&a.suitability).then(
                b.model
                    .context_size
                    .unwrap_or(0)
                    .cmp(&a.model.context_size.unwrap_or(0)),
            )
        });

        recommendations
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the 0..=100 suitability and the dominant-factor reason.
fn score(req: &SystemRequirements, hw: &HardwareSpecs) -> (u8, String) {
    // Exceeding installed RAM means the model cannot run at all; the score
    // collapses toward zero instead of accumulating penalties.
    if req.min_ram_mb > hw.ram.total_mb {
        let residual = (hw.ram.total_mb * 10 / req.min_ram_mb.max(1)).min(10) as u8;
        return (
            residual,
            format!(
                "requires ~{} MB RAM but only {} MB is installed; this model cannot run here",
                req.min_ram_mb, hw.ram.total_mb
            ),
        );
    }

    let mut penalties: Vec<(u64, String)> = Vec::new();

    if req.min_ram_mb > hw.ram.free_mb {
        let shortfall = req.min_ram_mb - hw.ram.free_mb;
        let penalty = (shortfall * 60 / req.min_ram_mb).max(1);
        penalties.push((
            penalty,
            format!(
                "requires ~{} MB RAM but only {} MB is currently free; close other applications before loading",
                req.min_ram_mb, hw.ram.free_mb
            ),
        ));
    }

    if req.cuda_required && !hw.gpu.cuda_support.unwrap_or(false) {
        penalties.push((
            40,
            "requires CUDA, which this host does not support; expect unusably slow responses"
                .to_string(),
        ));
    }

    if let Some(min_vram) = req.min_vram_mb {
        let available = if hw.gpu.available {
            hw.gpu.vram_mb.unwrap_or(0)
        } else {
            0
        };
        if min_vram > available {
            let shortfall = min_vram - available;
            let penalty = (shortfall * 30 / min_vram).max(1);
            penalties.push((
                penalty,
                "requires more VRAM than available; will run on CPU, expect slower responses"
                    .to_string(),
            ));
        }
    }

    if let Some(min_cores) = req.min_cpu_cores {
        if min_cores > hw.cpu.cores {
            penalties.push((
                10,
                format!(
                    "prefers {} CPU cores but only {} are available",
                    min_cores, hw.cpu.cores
                ),
            ));
        }
    }

    let total: u64 = penalties.iter().map(|(p, _)| p).sum();
    let suitability = 100_u64.saturating_sub(total).min(100) as u8;

    let reason = penalties
        .into_iter()
        .max_by_key(|(p, _)| *p)
        .map(|(_, msg)| msg)
        .unwrap_or_else(|| "fits comfortably on this hardware".to_string());

    (suitability, reason)
}
