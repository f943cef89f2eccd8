use serde::{Deserialize, Serialize};

/// Runtime knobs of a form instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Evaluate computations without dependencies once and keep the result.
    pub constant_folding: bool,
    /// Upper bound on effect runs within a single flush.
    pub max_effect_iterations: usize,
    /// Most instances a count expression may ask a repeat for. Larger counts
    /// are clamped.
    pub max_repeat_count: usize,
    /// Expose an empty value for leaves that are not relevant.
    pub blank_non_relevant: bool,
    pub required_message: String,
    pub constraint_message: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
            max_effect_iterations: 10_000,
            max_repeat_count: 1_000,
            blank_non_relevant: true,
            required_message: "This field is required.".to_owned(),
            constraint_message: "Value does not satisfy the constraint.".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "constant_folding": false }"#).unwrap();
        assert!(!config.constant_folding);
        assert_eq!(config.max_effect_iterations, 10_000);
        assert_eq!(config.max_repeat_count, 1_000);
        assert!(config.blank_non_relevant);
    }
}
