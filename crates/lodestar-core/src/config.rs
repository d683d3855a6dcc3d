//! Top-level Lodestar configuration
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`LODESTAR_*`)
//! 2. TOML file or string
//! 3. Compiled defaults

use crate::error::ConfigError;
use crate::orchestrator::OrchestratorPolicy;
use lodestar_knowledge::KnowledgeConfig;
use lodestar_router::RouterConfig;
use lodestar_validation::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the knowledge store root
pub const ENV_KNOWLEDGE_ROOT: &str = "LODESTAR_KNOWLEDGE_ROOT";
/// Overrides the explosion threshold
pub const ENV_EXPLOSION_THRESHOLD: &str = "LODESTAR_EXPLOSION_THRESHOLD";
/// Overrides `orchestrator.require_zero_warnings`
pub const ENV_REQUIRE_ZERO_WARNINGS: &str = "LODESTAR_REQUIRE_ZERO_WARNINGS";

/// All configuration sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LodestarConfig {
    /// Router weights, thresholds and tables
    pub router: RouterConfig,
    /// Knowledge store
    pub knowledge: KnowledgeConfig,
    /// Validation tables and threshold
    pub validation: ValidationConfig,
    /// Confirmation policy
    pub orchestrator: OrchestratorPolicy,
}

impl LodestarConfig {
    /// Load a TOML file, apply environment overrides, then validate
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or a value is
    /// out of range
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.apply_env_overrides();
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse TOML text without environment overrides
    ///
    /// # Errors
    /// Returns error on malformed TOML, unknown keys or out-of-range values
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LODESTAR_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    ///
    /// Unparsable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ENV_KNOWLEDGE_ROOT).filter(|v| !v.is_empty()) {
            self.knowledge.root = Some(PathBuf::from(root));
        }
        if let Some(raw) = lookup(ENV_EXPLOSION_THRESHOLD) {
            match raw.trim().parse::<f64>() {
                Ok(v) => self.validation.explosion_threshold = Some(v),
                Err(_) => tracing::warn!(key = ENV_EXPLOSION_THRESHOLD, value = %raw, "ignoring unparsable override"),
            }
        }
        if let Some(raw) = lookup(ENV_REQUIRE_ZERO_WARNINGS) {
            match parse_bool(&raw) {
                Some(v) => self.orchestrator.require_zero_warnings = v,
                None => tracing::warn!(key = ENV_REQUIRE_ZERO_WARNINGS, value = %raw, "ignoring unparsable override"),
            }
        }
    }

    /// Validate every section
    ///
    /// # Errors
    /// [`ConfigError::ValidationFailed`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.router.validate().map_err(|e| failed("router", &e))?;
        self.knowledge.validate().map_err(|e| failed("knowledge", &e))?;
        if let Some(threshold) = self.validation.explosion_threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ConfigError::ValidationFailed {
                    field: "validation.explosion_threshold".to_string(),
                    message: format!("{threshold} must be positive and finite"),
                });
            }
        }
        Ok(())
    }
}

fn failed(section: &str, error: &dyn std::fmt::Display) -> ConfigError {
    ConfigError::ValidationFailed {
        field: section.to_string(),
        message: error.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(LodestarConfig::from_toml("").unwrap(), LodestarConfig::default());
    }

    #[test]
    fn sections_parse() {
        let config = LodestarConfig::from_toml(
            r#"
[router.thresholds]
explore_below = 0.5

[knowledge]
root = "/var/lib/lodestar"
merge_overlap = 0.8

[validation]
explosion_threshold = 250.0

[orchestrator]
require_zero_warnings = true
"#,
        )
        .unwrap();
        assert!((config.router.thresholds.explore_below - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.knowledge.root, Some(PathBuf::from("/var/lib/lodestar")));
        assert_eq!(config.validation.explosion_threshold, Some(250.0));
        assert!(config.orchestrator.require_zero_warnings);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = LodestarConfig::from_toml("[telemetry]\nenabled = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn out_of_range_values_name_the_section() {
        let err = LodestarConfig::from_toml("[knowledge]\nmerge_overlap = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed { ref field, .. } if field == "knowledge"));

        let err = LodestarConfig::from_toml("[validation]\nexplosion_threshold = -1.0\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationFailed { ref field, .. } if field == "validation.explosion_threshold")
        );
    }

    #[test]
    fn overrides_apply() {
        let vars: BTreeMap<&str, &str> = [
            (ENV_KNOWLEDGE_ROOT, "/tmp/knowledge"),
            (ENV_EXPLOSION_THRESHOLD, "500"),
            (ENV_REQUIRE_ZERO_WARNINGS, "yes"),
        ]
        .into_iter()
        .collect();
        let mut config = LodestarConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.knowledge.root, Some(PathBuf::from("/tmp/knowledge")));
        assert_eq!(config.validation.explosion_threshold, Some(500.0));
        assert!(config.orchestrator.require_zero_warnings);
    }

    #[test]
    fn bad_overrides_are_ignored() {
        let mut config = LodestarConfig::default();
        config.apply_overrides(|key| match key {
            ENV_EXPLOSION_THRESHOLD => Some("lots".to_string()),
            ENV_REQUIRE_ZERO_WARNINGS => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config, LodestarConfig::default());
    }

    #[test]
    fn load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lodestar.toml");
        std::fs::write(&path, "[orchestrator]\nconfirm_on_warning = false\n").unwrap();
        let config = LodestarConfig::load(&path).unwrap();
        assert!(!config.orchestrator.confirm_on_warning);

        let missing = LodestarConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
