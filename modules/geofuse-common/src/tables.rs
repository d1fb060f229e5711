//! Process-wide constant tables consulted by every fusion stage.
//!
//! Nothing here is mutable. Stages take a `&FusionTables` so tests can
//! swap in alternates without touching global state.

use std::cmp::Ordering;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{EvidenceKind, LocationCandidate, LocationMethod, MethodTag};

// --- Source Priority ---

/// Trust ranking per detection method. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityTable {
    pub map_screenshot: u8,
    pub exif_gps: u8,
    pub landmark: u8,
    pub street_view_match: u8,
    pub ocr_geocoding: u8,
    pub manual_correction: u8,
    pub context_fallback: u8,
    pub model_reasoning: u8,
}

impl PriorityTable {
    pub const STANDARD: Self = Self {
        map_screenshot: 100,
        exif_gps: 90,
        landmark: 80,
        street_view_match: 70,
        ocr_geocoding: 60,
        manual_correction: 50,
        context_fallback: 40,
        model_reasoning: 30,
    };

    pub fn priority(&self, method: LocationMethod) -> u8 {
        match method {
            LocationMethod::MapScreenshot => self.map_screenshot,
            LocationMethod::ExifGps => self.exif_gps,
            LocationMethod::Landmark => self.landmark,
            LocationMethod::StreetViewMatch => self.street_view_match,
            LocationMethod::OcrGeocoding => self.ocr_geocoding,
            LocationMethod::ManualCorrection => self.manual_correction,
            LocationMethod::ContextFallback => self.context_fallback,
            LocationMethod::ModelReasoning => self.model_reasoning,
        }
    }

    /// Ranking order: source priority descending, then confidence descending.
    /// Use with a stable sort.
    pub fn rank_order(&self, a: &LocationCandidate, b: &LocationCandidate) -> Ordering {
        self.priority(b.method)
            .cmp(&self.priority(a.method))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

// --- Signal Categories ---

/// Independent families of signal that the weighted consolidator blends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    StreetView,
    Text,
    Architecture,
    LandmarkDistance,
    General,
}

impl SignalCategory {
    /// Classification order. First match wins.
    pub const ORDERED: [SignalCategory; 5] = [
        SignalCategory::StreetView,
        SignalCategory::Text,
        SignalCategory::Architecture,
        SignalCategory::LandmarkDistance,
        SignalCategory::General,
    ];

    fn matches(self, method: LocationMethod, tag: Option<MethodTag>) -> bool {
        match self {
            SignalCategory::StreetView => {
                method == LocationMethod::StreetViewMatch
                    || matches!(
                        tag,
                        Some(
                            MethodTag::StructuralSimilarity
                                | MethodTag::EmbeddingSimilarity
                                | MethodTag::FeatureMatching
                        )
                    )
            }
            SignalCategory::Text => {
                method == LocationMethod::OcrGeocoding || tag == Some(MethodTag::TextGeocoding)
            }
            SignalCategory::Architecture => tag == Some(MethodTag::ArchitectureStyle),
            SignalCategory::LandmarkDistance => {
                method == LocationMethod::Landmark || tag == Some(MethodTag::LandmarkDistance)
            }
            SignalCategory::General => true,
        }
    }

    pub fn classify(candidate: &LocationCandidate) -> Self {
        Self::ORDERED
            .into_iter()
            .find(|c| c.matches(candidate.method, candidate.method_metadata))
            .unwrap_or(SignalCategory::General)
    }
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalCategory::StreetView => write!(f, "street_view"),
            SignalCategory::Text => write!(f, "text"),
            SignalCategory::Architecture => write!(f, "architecture"),
            SignalCategory::LandmarkDistance => write!(f, "landmark_distance"),
            SignalCategory::General => write!(f, "general"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryWeights {
    pub street_view: f64,
    pub text: f64,
    pub architecture: f64,
    pub landmark_distance: f64,
    pub general: f64,
}

impl CategoryWeights {
    pub const STANDARD: Self = Self {
        street_view: 0.40,
        text: 0.20,
        architecture: 0.20,
        landmark_distance: 0.10,
        general: 0.10,
    };

    pub fn weight(&self, category: SignalCategory) -> f64 {
        match category {
            SignalCategory::StreetView => self.street_view,
            SignalCategory::Text => self.text,
            SignalCategory::Architecture => self.architecture,
            SignalCategory::LandmarkDistance => self.landmark_distance,
            SignalCategory::General => self.general,
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

// --- Critical Landmarks ---

/// Places distinctive enough that a positive recognition is almost never
/// ambiguous. Matched case-insensitively as substrings of evidence labels.
pub const CRITICAL_LANDMARKS: &[&str] = &[
    "eiffel tower",
    "tour eiffel",
    "arc de triomphe",
    "notre-dame de paris",
    "notre dame de paris",
    "sacré-cœur",
    "sacre-coeur",
    "sacre coeur",
    "louvre pyramid",
    "pyramide du louvre",
    "mont-saint-michel",
    "mont saint-michel",
    "basilique notre-dame de fourvière",
    "fourvière",
    "fourviere",
    "notre-dame de la garde",
    "vieux-port de marseille",
    "mucem",
];

// --- Bundle ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionTables {
    pub priorities: PriorityTable,
    pub category_weights: CategoryWeights,
    pub critical_landmarks: &'static [&'static str],
}

impl FusionTables {
    pub const STANDARD: Self = Self {
        priorities: PriorityTable::STANDARD,
        category_weights: CategoryWeights::STANDARD,
        critical_landmarks: CRITICAL_LANDMARKS,
    };

    pub fn is_critical_landmark(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.critical_landmarks
            .iter()
            .any(|name| label.contains(name))
    }

    /// True if any landmark evidence on any candidate names a critical landmark.
    pub fn references_critical_landmark(&self, candidates: &[LocationCandidate]) -> bool {
        candidates
            .iter()
            .flat_map(|c| c.evidence.iter())
            .filter(|e| e.kind == EvidenceKind::Landmark)
            .any(|e| self.is_critical_landmark(&e.label))
    }
}

impl Default for FusionTables {
    fn default() -> Self {
        Self::STANDARD
    }
}
