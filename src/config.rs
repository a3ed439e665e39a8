//! Pipeline configuration loaded from a TOML file.

use crate::features::Recipe;
use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration; every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnConfig,
    pub filter: FilterConfig,
    pub identity: IdentityConfig,
    pub correlation: CorrelationConfig,
    pub reduction: ReductionConfig,
    pub recipe: Recipe,
    pub auxiliary: AuxiliaryConfig,
}

/// Column roles in the per-match stat exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub identity: String,
    pub exposure: String,
    pub period: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            identity: "Player".to_string(),
            exposure: "BasedOnMinutes".to_string(),
            period: "scouting_period".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Rows below this many minutes are not a representative sample.
    pub min_exposure: f64,
    pub excluded_periods: Vec<String>,
    /// Columns whose name contains any of these are dropped.
    pub drop_column_patterns: Vec<String>,
    /// Blank cells here mean "never attempted" and read as 0.
    pub zero_fill_columns: Vec<String>,
    /// Fallback for any other blank cell.
    pub default_fill: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            min_exposure: 450.0,
            excluded_periods: vec!["Last 365 Days Men's Big 5 Leagues".to_string()],
            drop_column_patterns: vec!["Percentile".to_string()],
            zero_fill_columns: [
                "Per90_Goals/Shot on Target",
                "Per90_npxG/Shot",
                "Per90_Average Shot Distance",
                "Per90_Goals/Shot",
                "Per90_Shots on Target %",
                "Per90_Successful Take-On %",
                "Per90_Tackled During Take-On Percentage",
                "Per90_% of Dribblers Tackled",
                "Per90_% of Aerials Won",
                "Per90_Pass Completion % (Long)",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_fill: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Minimum fuzzy score (0-100) to accept a name match.
    pub threshold: u8,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig { threshold: 70 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub threshold: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig { threshold: 0.9 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    pub enabled: bool,
    /// Fraction of total variance the retained components must explain.
    pub target_variance: f64,
    pub component_prefix: String,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        ReductionConfig {
            enabled: true,
            target_variance: 0.95,
            component_prefix: "PCA_".to_string(),
        }
    }
}

/// Keeps only registry rows whose `column` equals `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub column: String,
    pub value: String,
}

/// How to read one auxiliary registry file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySpec {
    pub label: String,
    pub identity: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxiliaryConfig {
    /// Value for attributes of players missing from a registry.
    pub default_fill: f64,
    pub age: RegistrySpec,
    pub valuation: RegistrySpec,
}

impl Default for AuxiliaryConfig {
    fn default() -> Self {
        AuxiliaryConfig {
            default_fill: 0.0,
            age: RegistrySpec {
                label: "age".to_string(),
                identity: "Player".to_string(),
                columns: vec!["age".to_string()],
                selector: None,
            },
            valuation: RegistrySpec {
                label: "valuation".to_string(),
                identity: "player_name".to_string(),
                columns: vec!["player_market_value_euro".to_string()],
                selector: Some(Selector {
                    column: "season_start_year".to_string(),
                    value: "2024".to_string(),
                }),
            },
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: PipelineConfig = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rejects thresholds outside their meaningful ranges.
    pub fn validate(&self) -> Result<()> {
        if self.identity.threshold > 100 {
            return Err(PipelineError::Config(format!(
                "identity.threshold must be within 0..=100, got {}",
                self.identity.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.correlation.threshold) {
            return Err(PipelineError::Config(format!(
                "correlation.threshold must be within 0..=1, got {}",
                self.correlation.threshold
            )));
        }
        let target = self.reduction.target_variance;
        if !(target > 0.0 && target <= 1.0) {
            return Err(PipelineError::Config(format!(
                "reduction.target_variance must be within (0, 1], got {}",
                target
            )));
        }
        if !self.filter.min_exposure.is_finite() || self.filter.min_exposure < 0.0 {
            return Err(PipelineError::Config(format!(
                "filter.min_exposure must be a non-negative number, got {}",
                self.filter.min_exposure
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let path = path.to_str().unwrap();

        let config = PipelineConfig::default();
        config.save(path).unwrap();
        let loaded = PipelineConfig::load(path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [identity]
            threshold = 85

            [reduction]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.identity.threshold, 85);
        assert!(!config.reduction.enabled);
        assert_eq!(config.reduction.target_variance, 0.95);
        assert_eq!(config.filter.min_exposure, 450.0);
        assert_eq!(config.recipe.ratios.len(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_target() {
        let mut config = PipelineConfig::default();
        config.reduction.target_variance = 1.5;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        config.reduction.target_variance = 0.95;
        config.identity.threshold = 101;
        assert!(config.validate().is_err());
    }
}
