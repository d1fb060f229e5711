use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FusionResult, GeofuseError};

/// Tunable thresholds for the fusion stages, loadable from TOML.
/// Every field defaults to the reference policy, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FusionConfig {
    pub merge: MergeConfig,
    pub consolidation: ConsolidationConfig,
    pub explanation: ExplanationConfig,
    /// Extra regions merged into the built-in geofence table at startup.
    pub geofences: Vec<GeofenceSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// A top candidate at or above this priority...
    pub short_circuit_priority: u8,
    /// ...and at or above this confidence is returned without blending.
    pub short_circuit_confidence: f64,
    /// How many top-ranked candidates take part in the coherence check.
    pub top_k: usize,
    /// Mean pairwise distance under which the winner is boosted.
    pub boost_radius_m: f64,
    /// Boost is `(boost_radius_m - avg) / boost_scale_m`, capped at `max_boost`.
    pub boost_scale_m: f64,
    pub max_boost: f64,
    /// Mean pairwise distance under which coordinates are blended.
    pub blend_radius_m: f64,
    /// Mean pairwise distance over which the winner is penalised.
    pub divergence_radius_m: f64,
    pub divergence_penalty: f64,
    /// The divergence penalty never takes confidence below this.
    pub confidence_floor: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            short_circuit_priority: 80,
            short_circuit_confidence: 0.85,
            top_k: 3,
            boost_radius_m: 100.0,
            boost_scale_m: 1000.0,
            max_boost: 0.15,
            blend_radius_m: 200.0,
            divergence_radius_m: 500.0,
            divergence_penalty: 0.2,
            confidence_floor: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationMode {
    /// Consolidate only when the candidates look like independent
    /// measurements of one place.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsolidationConfig {
    pub mode: ConsolidationMode,
    /// Category representatives further apart than this are treated as
    /// competing alternatives rather than one measured place.
    pub max_spread_m: f64,
    pub confidence_cap: f64,
    /// Any candidate at or above this priority sends the set to the merger.
    pub hard_evidence_priority: u8,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            mode: ConsolidationMode::Auto,
            max_spread_m: 500.0,
            confidence_cap: 0.95,
            hard_evidence_priority: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplanationConfig {
    pub rich_evidence_count: usize,
    pub rich_bonus: f64,
    pub rich_cap: f64,
    pub extensive_evidence_count: usize,
    pub extensive_bonus: f64,
    pub extensive_cap: f64,
    /// Street-view winners strictly above this confidence earn a bonus.
    pub street_view_threshold: f64,
    pub street_view_bonus: f64,
    pub street_view_cap: f64,
    pub ocr_shop_sign_bonus: f64,
    pub ocr_shop_sign_cap: f64,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            rich_evidence_count: 3,
            rich_bonus: 0.10,
            rich_cap: 0.95,
            extensive_evidence_count: 5,
            extensive_bonus: 0.05,
            extensive_cap: 0.98,
            street_view_threshold: 0.88,
            street_view_bonus: 0.10,
            street_view_cap: 0.98,
            ocr_shop_sign_bonus: 0.10,
            ocr_shop_sign_cap: 0.95,
        }
    }
}

/// A named containment region as written in configuration.
/// Each ring is a list of `[lng, lat]` vertices; closing the ring is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeofenceSpec {
    pub code: String,
    pub name: String,
    pub polygons: Vec<Vec<[f64; 2]>>,
}

impl FusionConfig {
    /// Load from the file named by `GEOFUSE_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        match env::var("GEOFUSE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => load_config(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Reject thresholds that would break the confidence invariants.
    pub fn validate(&self) -> FusionResult<()> {
        let unit_fields = [
            ("merge.short_circuit_confidence", self.merge.short_circuit_confidence),
            ("merge.max_boost", self.merge.max_boost),
            ("merge.divergence_penalty", self.merge.divergence_penalty),
            ("merge.confidence_floor", self.merge.confidence_floor),
            ("consolidation.confidence_cap", self.consolidation.confidence_cap),
            ("explanation.rich_bonus", self.explanation.rich_bonus),
            ("explanation.rich_cap", self.explanation.rich_cap),
            ("explanation.extensive_bonus", self.explanation.extensive_bonus),
            ("explanation.extensive_cap", self.explanation.extensive_cap),
            ("explanation.street_view_threshold", self.explanation.street_view_threshold),
            ("explanation.street_view_bonus", self.explanation.street_view_bonus),
            ("explanation.street_view_cap", self.explanation.street_view_cap),
            ("explanation.ocr_shop_sign_bonus", self.explanation.ocr_shop_sign_bonus),
            ("explanation.ocr_shop_sign_cap", self.explanation.ocr_shop_sign_cap),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(GeofuseError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let distance_fields = [
            ("merge.boost_radius_m", self.merge.boost_radius_m),
            ("merge.boost_scale_m", self.merge.boost_scale_m),
            ("merge.blend_radius_m", self.merge.blend_radius_m),
            ("merge.divergence_radius_m", self.merge.divergence_radius_m),
            ("consolidation.max_spread_m", self.consolidation.max_spread_m),
        ];
        for (name, value) in distance_fields {
            if !value.is_finite() || value < 0.0 {
                return Err(GeofuseError::Config(format!(
                    "{name} must be a non-negative distance, got {value}"
                )));
            }
        }
        if self.merge.boost_scale_m == 0.0 {
            return Err(GeofuseError::Config(
                "merge.boost_scale_m must be greater than zero".to_string(),
            ));
        }
        if self.merge.top_k < 2 {
            return Err(GeofuseError::Config(format!(
                "merge.top_k must be at least 2, got {}",
                self.merge.top_k
            )));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            short_circuit_priority = self.merge.short_circuit_priority,
            short_circuit_confidence = self.merge.short_circuit_confidence,
            top_k = self.merge.top_k,
            consolidation_mode = ?self.consolidation.mode,
            extra_geofences = self.geofences.len(),
            "Fusion config loaded"
        );
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FusionConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FusionConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}
