//! One fusion call, end to end.
//!
//! sanitize → geofence → reprioritize → consolidate or merge → explain →
//! confidence bonuses. The engine holds only read-only state and can be
//! shared across threads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use geofuse_common::{
    clamp_unit, ConsolidatedResult, FusionConfig, FusionContext, FusionResult, FusionTables,
    LocationCandidate,
};

use crate::address;
use crate::consolidate::{consolidate, should_consolidate};
use crate::explain::{apply_confidence_bonuses, explain};
use crate::geofence::{filter_candidates, GeofenceRegistry};
use crate::merge::merge;
use crate::reprioritize::reprioritize;
use crate::sanitize::sanitize_candidates;

/// Caller-supplied context for one fusion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FusionRequest {
    /// Code of the mandatory containment region.
    pub region_code: String,
    #[serde(default)]
    pub context: FusionContext,
}

impl FusionRequest {
    pub fn new(region_code: impl Into<String>) -> Self {
        Self {
            region_code: region_code.into(),
            context: FusionContext::default(),
        }
    }

    pub fn with_context(mut self, context: FusionContext) -> Self {
        self.context = context;
        self
    }
}

/// Which stage produced the final position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FusionStage {
    Consolidated,
    Merged,
}

/// Bookkeeping for one call, returned alongside the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FusionReport {
    pub received: usize,
    pub unlocated: u32,
    pub malformed: u32,
    pub clamped: u32,
    pub outside_region: u32,
    pub considered: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<FusionStage>,
    pub critical_landmark_detected: bool,
}

/// Result of a fusion call. `result` is `None` when nothing could be located.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FusionOutcome {
    pub result: Option<ConsolidatedResult>,
    pub report: FusionReport,
}

impl FusionOutcome {
    pub fn is_localized(&self) -> bool {
        self.result.is_some()
    }

    /// The result address, unless it is too vague to show.
    pub fn display_address(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| address::displayable(r.address.as_deref()))
    }
}

/// Fusion engine with its process-lifetime tables.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
    tables: FusionTables,
    geofences: GeofenceRegistry,
}

impl FusionEngine {
    /// Validate config and build the geofence registry (built-ins plus
    /// configured regions). Call once at startup.
    pub fn new(config: FusionConfig) -> FusionResult<Self> {
        config.validate()?;
        let geofences = GeofenceRegistry::with_specs(&config.geofences)?;
        Ok(Self {
            config,
            tables: FusionTables::STANDARD,
            geofences,
        })
    }

    pub fn with_tables(mut self, tables: FusionTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn tables(&self) -> &FusionTables {
        &self.tables
    }

    pub fn geofences(&self) -> &GeofenceRegistry {
        &self.geofences
    }

    /// Fuse detector candidates into one located result.
    ///
    /// Errors only for an unknown region code. An empty or fully filtered
    /// candidate list yields an outcome with `result: None`.
    pub fn fuse(
        &self,
        candidates: Vec<LocationCandidate>,
        request: &FusionRequest,
    ) -> FusionResult<FusionOutcome> {
        let mut report = FusionReport {
            received: candidates.len(),
            ..FusionReport::default()
        };

        let (candidates, sanitize_stats) = sanitize_candidates(candidates);
        report.unlocated = sanitize_stats.unlocated;
        report.malformed = sanitize_stats.malformed;
        report.clamped = sanitize_stats.clamped;

        let (candidates, geofence_stats) =
            filter_candidates(candidates, &self.geofences, &request.region_code)?;
        report.outside_region = geofence_stats.outside;
        report.considered = candidates.len();

        if candidates.is_empty() {
            info!(
                region = request.region_code.as_str(),
                received = report.received,
                outside_region = report.outside_region,
                "No locatable candidates"
            );
            return Ok(FusionOutcome {
                result: None,
                report,
            });
        }

        let mut context = request.context;
        if !context.critical_landmark_detected
            && self.tables.references_critical_landmark(&candidates)
        {
            debug!("Critical landmark referenced in evidence");
            context.critical_landmark_detected = true;
        }
        report.critical_landmark_detected = context.critical_landmark_detected;

        let candidates = reprioritize(candidates, &context);

        let consolidation = &self.config.consolidation;
        let consolidated = if should_consolidate(&candidates, &self.tables, consolidation) {
            consolidate(&candidates, &self.tables, consolidation)
        } else {
            None
        };

        let (mut result, stage) = match consolidated {
            Some(result) => (result, FusionStage::Consolidated),
            None => match merge(&candidates, &self.tables, &self.config.merge) {
                Some(result) => (result, FusionStage::Merged),
                None => {
                    return Ok(FusionOutcome {
                        result: None,
                        report,
                    })
                }
            },
        };
        report.stage = Some(stage);

        let explanation = explain(&candidates);
        let before_bonus = result.confidence;
        result.confidence = clamp_unit(apply_confidence_bonuses(
            result.confidence,
            &explanation,
            result.source,
            &self.config.explanation,
        ));
        result.explanation = explanation;

        info!(
            region = request.region_code.as_str(),
            source = %result.source,
            ?stage,
            considered = report.considered,
            confidence = result.confidence,
            bonus = result.confidence - before_bonus,
            evidence = result.explanation.evidence.len(),
            "Location fused"
        );

        Ok(FusionOutcome {
            result: Some(result),
            report,
        })
    }
}
