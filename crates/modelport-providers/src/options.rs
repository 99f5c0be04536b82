//! Generation options and boundary validation

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Tunables accepted by completion calls. Validated at the router boundary
/// before they reach a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature, 0.0 to 1.0
    pub temperature: Option<f32>,
    /// Maximum tokens to generate, must be positive when set
    pub max_tokens: Option<u32>,
    /// Sequences that stop generation
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Whether the caller intends to stream
    #[serde(default)]
    pub stream: bool,
}

impl GenerationOptions {
    /// Reject out-of-range values before dispatch
    pub fn validate(&self) -> Result<(), ProviderError> {
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) || t.is_nan() {
                return Err(ProviderError::Validation(format!(
                    "temperature must be within 0.0..=1.0, got {t}"
                )));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(ProviderError::Validation(
                "max_tokens must be a positive integer".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(GenerationOptions::default().validate().is_ok());
    }

    #[test]
    fn temperature_bounds_are_inclusive() {
        let mut opts = GenerationOptions {
            temperature: Some(0.0),
            ..Default::default()
        };
        assert!(opts.validate().is_ok());

        opts.temperature = Some(1.0);
        assert!(opts.validate().is_ok());

        opts.temperature = Some(1.01);
        assert!(matches!(
            opts.validate(),
            Err(ProviderError::Validation(_))
        ));

        opts.temperature = Some(-0.1);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let opts = GenerationOptions {
            max_tokens: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(ProviderError::Validation(_))
        ));
    }
}
