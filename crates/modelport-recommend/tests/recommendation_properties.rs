//! Property-based tests for recommendation scoring

use modelport_hardware::HardwareSpecs;
use modelport_providers::ModelInfo;
use modelport_recommend::RecommendationEngine;
use proptest::prelude::*;

fn model_with_min_ram(id: &str, context: Option<u32>, min_ram_mb: u64) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: id.to_string(),
        provider: "test".to_string(),
        description: String::new(),
        tags: Vec::new(),
        context_size: context,
        parameters: [(
            "min_ram_mb".to_string(),
            serde_json::Value::from(min_ram_mb),
        )]
        .into_iter()
        .collect(),
    }
}

proptest! {
    /// Suitability stays within 0..=100 for arbitrary hardware and
    /// requirement combinations.
    #[test]
    fn suitability_is_always_in_range(
        total_mb in 512u64..262_144,
        free_ratio in 0.0f64..=1.0,
        cores in 1usize..128,
        min_ram_mb in 1u64..524_288,
        context in proptest::option::of(512u32..1_048_576),
    ) {
        let free_mb = (total_mb as f64 * free_ratio) as u64;
        let hw = HardwareSpecs::cpu_only(total_mb, free_mb, cores);
        let catalog = [model_with_min_ram("m", context, min_ram_mb)];

        let recs = RecommendationEngine::new().recommend(&catalog, &hw);
        prop_assert_eq!(recs.len(), 1);
        prop_assert!(recs[0].suitability <= 100);
    }

    /// With everything else equal, freeing RAM never lowers a score, and a
    /// host satisfying the requirement strictly beats one that falls short.
    #[test]
    fn ram_penalty_is_monotonic(
        min_ram_mb in 1024u64..32_768,
        short_mb in 1u64..1024,
        cores in 1usize..32,
    ) {
        let total_mb = min_ram_mb * 2;
        let short = HardwareSpecs::cpu_only(total_mb, min_ram_mb - short_mb, cores);
        let satisfied = HardwareSpecs::cpu_only(total_mb, min_ram_mb, cores);

        let catalog = [model_with_min_ram("m", Some(4096), min_ram_mb)];
        let engine = RecommendationEngine::new();

        let short_score = engine.recommend(&catalog, &short)[0].suitability;
        let satisfied_score = engine.recommend(&catalog, &satisfied)[0].suitability;

        prop_assert!(short_score < satisfied_score);
        prop_assert_eq!(satisfied_score, 100);
    }

    /// Output ordering: suitability descending, ties broken by context size
    /// descending.
    #[test]
    fn output_is_ranked(
        entries in proptest::collection::vec(
            (1u64..65_536, proptest::option::of(512u32..262_144)),
            1..12,
        ),
        total_mb in 4096u64..65_536,
        free_ratio in 0.0f64..=1.0,
    ) {
        let free_mb = (total_mb as f64 * free_ratio) as u64;
        let hw = HardwareSpecs::cpu_only(total_mb, free_mb, 8);

        let catalog: Vec<ModelInfo> = entries
            .iter()
            .enumerate()
            .map(|(i, (ram, ctx))| model_with_min_ram(&format!("m{i}"), *ctx, *ram))
            .collect();

        let recs = RecommendationEngine::new().recommend(&catalog, &hw);

        for pair in recs.windows(2) {
            prop_assert!(pair[0].suitability >= pair[1].suitability);
            if pair[0].suitability == pair[1].suitability {
                prop_assert!(
                    pair[0].model.context_size.unwrap_or(0)
                        >= pair[1].model.context_size.unwrap_or(0)
                );
            }
        }
    }
}
