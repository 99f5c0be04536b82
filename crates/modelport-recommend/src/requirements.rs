//! System requirement derivation per model

use modelport_providers::ModelInfo;
use serde::{Deserialize, Serialize};

/// Assumed parameter count when a model declares nothing
const DEFAULT_PARAMETER_BILLIONS: f64 = 7.0;

/// Fixed runtime overhead on top of model weights
const BASE_RAM_MB: u64 = 2048;

/// What a model needs from the host to run acceptably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRequirements {
    /// Minimum RAM in megabytes
    pub min_ram_mb: u64,
    /// Minimum VRAM in megabytes, when the model wants a GPU
    pub min_vram_mb: Option<u64>,
    /// Minimum logical CPU cores
    pub min_cpu_cores: Option<usize>,
    /// Whether CUDA is required for acceptable speed
    pub cuda_required: bool,
}

impl SystemRequirements {
    /// Derive requirements for a catalog entry. Explicit `parameters` keys
    /// (`min_ram_mb`, `min_vram_mb`, `min_cpu_cores`, `cuda_required`) win;
    /// otherwise RAM is estimated from parameter count and context size.
    pub fn for_model(model: &ModelInfo) -> Self {
        let explicit_ram = read_u64(model, "min_ram_mb");

        let min_ram_mb = explicit_ram.unwrap_or_else(|| {
            let billions = parameter_billions(model);
            // Roughly 1 GB per billion parameters at 4-bit quantization,
            // plus KV-cache overhead growing with the context window.
            let weights_mb = (billions * 1024.0) as u64;
            let context_mb = u64::from(model.context_size.unwrap_or(4096)) / 8;
            BASE_RAM_MB + weights_mb + context_mb
        });

        Self {
            min_ram_mb,
            min_vram_mb: read_u64(model, "min_vram_mb"),
            min_cpu_cores: read_u64(model, "min_cpu_cores").map(|n| n as usize),
            cuda_required: model
                .parameters
                .get("cuda_required")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }
}

fn read_u64(model: &ModelInfo, key: &str) -> Option<u64> {
    model.parameters.get(key).and_then(|v| v.as_u64())
}

/// Best-effort parameter count in billions: a numeric
/// `parameter_count_b`, then a `parameter_size` string like "7B", then a
/// tag like "13b", then the default.
fn parameter_billions(model: &ModelInfo) -> f64 {
    if let Some(n) = model
        .parameters
        .get("parameter_count_b")
        .and_then(|v| v.as_f64())
    {
        return n;
    }

    if let Some(size) = model
        .parameters
        .get("parameter_size")
        .and_then(|v| v.as_str())
    {
        if let Some(n) = parse_billions(size) {
            return n;
        }
    }

    for tag in &model.tags {
        if let Some(n) = parse_billions(tag) {
            return n;
        }
    }

    DEFAULT_PARAMETER_BILLIONS
}

fn parse_billions(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let number = trimmed
        .strip_suffix(['b', 'B'])?
        .trim();
    let value: f64 = number.parse().ok()?;
    (value > 0.0).then_some(value)
}
