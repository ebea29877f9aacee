//! Resolved runtime configuration for the recruiting pipeline.
//!
//! Settings are read from `scout.toml` under the `[tools.recruiting]` table,
//! with environment-variable overrides for deployment knobs. Every numeric
//! setting is clamped into its documented range at load time, so the rest of
//! the engine never re-validates.
//!
//! ```toml
//! [tools.recruiting]
//! enabled = true
//!
//! [tools.recruiting.store]
//! path = ".scout/recruiting.db"
//!
//! [tools.recruiting.identity]
//! min_confidence_for_shortlist = 0.8
//!
//! [tools.recruiting.run]
//! target_candidates_per_role = 300
//! default_cadence = "0 6 * * *"
//!
//! [tools.recruiting.browser_verification]
//! enabled = false
//! mode = "high_only"
//!
//! [tools.recruiting.daily_quotas]
//! promoted_target = 10
//! reviewed_target = 30
//! verification_budget = 20
//!
//! [tools.recruiting.promotion]
//! min_proof_links = 2
//! allow_unverified_promotion = false
//!
//! [tools.recruiting.lane_targeting]
//! g1_percentage = 0.6
//! g2_percentage = 0.4
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "scout.toml";
pub const DEFAULT_STORE_PATH: &str = ".scout/recruiting.db";

/// When browser verification applies to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserVerificationMode {
    /// Flag only candidates whose identity band is HIGH.
    #[default]
    HighOnly,
    /// Flag every enriched candidate.
    Always,
}

impl BrowserVerificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighOnly => "high_only",
            Self::Always => "always",
        }
    }
}

impl std::str::FromStr for BrowserVerificationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high_only" => Ok(Self::HighOnly),
            "always" => Ok(Self::Always),
            _ => anyhow::bail!(
                "Invalid browser verification mode '{}'. Valid values: high_only, always",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub min_confidence_for_shortlist: f64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            min_confidence_for_shortlist: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub target_candidates_per_role: u32,
    pub default_cadence: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_candidates_per_role: 300,
            default_cadence: "0 6 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserVerificationConfig {
    pub enabled: bool,
    pub mode: BrowserVerificationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyQuotaConfig {
    pub promoted_target: u32,
    pub reviewed_target: u32,
    pub verification_budget: u32,
}

impl Default for DailyQuotaConfig {
    fn default() -> Self {
        Self {
            promoted_target: 10,
            reviewed_target: 30,
            verification_budget: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    pub min_proof_links: u32,
    /// Accepted and surfaced but not consulted by the promotion check; a
    /// future knob, not a current contract.
    pub allow_unverified_promotion: bool,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            min_proof_links: 2,
            allow_unverified_promotion: false,
        }
    }
}

/// Sourcing lane split. Configured and validated, read by no pipeline step
/// yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneTargetingConfig {
    pub g1_percentage: f64,
    pub g2_percentage: f64,
}

impl Default for LaneTargetingConfig {
    fn default() -> Self {
        Self {
            g1_percentage: 0.6,
            g2_percentage: 0.4,
        }
    }
}

/// The resolved `[tools.recruiting]` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecruitingConfig {
    pub enabled: bool,
    pub store: StoreConfig,
    pub identity: IdentityConfig,
    pub run: RunConfig,
    pub browser_verification: BrowserVerificationConfig,
    pub daily_quotas: DailyQuotaConfig,
    pub promotion: PromotionConfig,
    pub lane_targeting: LaneTargetingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    tools: ToolsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolsSection {
    recruiting: RecruitingConfig,
}

fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    value.clamp(min, max)
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

impl RecruitingConfig {
    /// Load the config from `scout.toml` in the given directory, falling back
    /// to defaults when the file is absent. Environment variables
    /// `SCOUT_RECRUITING_ENABLED` and `SCOUT_STORE_PATH` override the file.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };

        if let Ok(env_val) = std::env::var("SCOUT_RECRUITING_ENABLED") {
            config.enabled = env_val != "false" && env_val != "0";
        }
        if let Ok(env_path) = std::env::var("SCOUT_STORE_PATH") {
            config.store.path = PathBuf::from(env_path);
        }

        config.resolve();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(file.tools.recruiting)
    }

    /// Clamp every numeric setting into its documented range.
    pub fn resolve(&mut self) {
        self.identity.min_confidence_for_shortlist =
            clamp_unit(self.identity.min_confidence_for_shortlist);
        self.run.target_candidates_per_role =
            clamp_u32(self.run.target_candidates_per_role, 1, 2000);
        self.daily_quotas.promoted_target = clamp_u32(self.daily_quotas.promoted_target, 1, 100);
        self.daily_quotas.reviewed_target = clamp_u32(self.daily_quotas.reviewed_target, 1, 200);
        self.daily_quotas.verification_budget =
            clamp_u32(self.daily_quotas.verification_budget, 1, 100);
        self.promotion.min_proof_links = clamp_u32(self.promotion.min_proof_links, 1, 10);
        self.lane_targeting.g1_percentage = clamp_unit(self.lane_targeting.g1_percentage);
        self.lane_targeting.g2_percentage = clamp_unit(self.lane_targeting.g2_percentage);
    }

    /// Clamp a per-run target override into range, defaulting to the
    /// configured per-role target.
    pub fn clamp_target_candidates(&self, requested: Option<u32>) -> u32 {
        clamp_u32(
            requested.unwrap_or(self.run.target_candidates_per_role),
            1,
            2000,
        )
    }

    /// Validate and return human-readable warnings. Never fails the load.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.run.default_cadence.split_whitespace().count() != 5 {
            warnings.push(format!(
                "default_cadence '{}' does not look like a 5-field cron expression",
                self.run.default_cadence
            ));
        }

        let lane_sum = self.lane_targeting.g1_percentage + self.lane_targeting.g2_percentage;
        if (lane_sum - 1.0).abs() > 1e-9 {
            warnings.push(format!(
                "lane_targeting percentages sum to {:.2}, expected 1.00",
                lane_sum
            ));
        }

        if self.store.path.as_os_str().is_empty() {
            warnings.push("store.path is empty".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RecruitingConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.identity.min_confidence_for_shortlist, 0.8);
        assert_eq!(config.run.target_candidates_per_role, 300);
        assert_eq!(config.run.default_cadence, "0 6 * * *");
        assert_eq!(config.daily_quotas.promoted_target, 10);
        assert_eq!(config.daily_quotas.reviewed_target, 30);
        assert_eq!(config.daily_quotas.verification_budget, 20);
        assert_eq!(config.promotion.min_proof_links, 2);
        assert!(!config.promotion.allow_unverified_promotion);
        assert_eq!(config.browser_verification.mode, BrowserVerificationMode::HighOnly);
    }

    #[test]
    fn resolve_clamps_out_of_range_values() {
        let mut config = RecruitingConfig {
            identity: IdentityConfig {
                min_confidence_for_shortlist: 1.7,
            },
            run: RunConfig {
                target_candidates_per_role: 50_000,
                ..RunConfig::default()
            },
            promotion: PromotionConfig {
                min_proof_links: 0,
                allow_unverified_promotion: false,
            },
            ..RecruitingConfig::default()
        };
        config.daily_quotas.promoted_target = 0;
        config.resolve();

        assert_eq!(config.identity.min_confidence_for_shortlist, 1.0);
        assert_eq!(config.run.target_candidates_per_role, 2000);
        assert_eq!(config.promotion.min_proof_links, 1);
        assert_eq!(config.daily_quotas.promoted_target, 1);
    }

    #[test]
    fn clamp_target_candidates_defaults_and_bounds() {
        let config = RecruitingConfig::default();
        assert_eq!(config.clamp_target_candidates(None), 300);
        assert_eq!(config.clamp_target_candidates(Some(0)), 1);
        assert_eq!(config.clamp_target_candidates(Some(9999)), 2000);
        assert_eq!(config.clamp_target_candidates(Some(25)), 25);
    }

    #[test]
    fn parses_nested_toml_table() {
        let raw = r#"
            [tools.recruiting]
            enabled = true

            [tools.recruiting.run]
            target_candidates_per_role = 120

            [tools.recruiting.browser_verification]
            enabled = true
            mode = "always"
        "#;
        let file: ConfigFile = toml::from_str(raw).unwrap();
        let config = file.tools.recruiting;
        assert!(config.enabled);
        assert_eq!(config.run.target_candidates_per_role, 120);
        assert_eq!(config.browser_verification.mode, BrowserVerificationMode::Always);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.promotion.min_proof_links, 2);
    }

    #[test]
    fn validate_flags_bad_cadence_and_lane_sum() {
        let mut config = RecruitingConfig::default();
        config.run.default_cadence = "whenever".to_string();
        config.lane_targeting.g1_percentage = 0.9;
        config.lane_targeting.g2_percentage = 0.9;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("cron"));
        assert!(warnings[1].contains("sum"));
    }

    #[test]
    fn validate_clean_config_has_no_warnings() {
        let config = RecruitingConfig::default();
        assert!(config.validate().is_empty());
    }
}
