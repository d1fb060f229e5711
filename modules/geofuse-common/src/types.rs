use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Geo Helpers ---

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine great-circle distance between two lat/lng points in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Clamp a confidence or weight into [0, 1]. NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// --- Evidence ---

/// What kind of observation an evidence item records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    ShopSign,
    RoadMarking,
    ArchitectureStyle,
    Landmark,
    MapScreenshot,
    MetadataCoordinates,
    ModelReasoning,
    DepartmentLock,
    StreetViewMatch,
}

impl EvidenceKind {
    /// Evidence read off text in the scene (signage, painted markings).
    pub fn is_textual(&self) -> bool {
        match self {
            EvidenceKind::ShopSign | EvidenceKind::RoadMarking => true,
            EvidenceKind::ArchitectureStyle
            | EvidenceKind::Landmark
            | EvidenceKind::MapScreenshot
            | EvidenceKind::MetadataCoordinates
            | EvidenceKind::ModelReasoning
            | EvidenceKind::DepartmentLock
            | EvidenceKind::StreetViewMatch => false,
        }
    }
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceKind::ShopSign => write!(f, "shop_sign"),
            EvidenceKind::RoadMarking => write!(f, "road_marking"),
            EvidenceKind::ArchitectureStyle => write!(f, "architecture_style"),
            EvidenceKind::Landmark => write!(f, "landmark"),
            EvidenceKind::MapScreenshot => write!(f, "map_screenshot"),
            EvidenceKind::MetadataCoordinates => write!(f, "metadata_coordinates"),
            EvidenceKind::ModelReasoning => write!(f, "model_reasoning"),
            EvidenceKind::DepartmentLock => write!(f, "department_lock"),
            EvidenceKind::StreetViewMatch => write!(f, "street_view_match"),
        }
    }
}

/// One atomic justification attached to a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    /// Short name, e.g. "Boulangerie Dupont" or "Eiffel Tower".
    pub label: String,
    #[serde(default)]
    pub detail: String,
    /// Strength of this item (0.0-1.0)
    pub weight: f64,
}

impl EvidenceItem {
    pub fn new(kind: EvidenceKind, label: impl Into<String>, weight: f64) -> Self {
        Self {
            kind,
            label: label.into(),
            detail: String::new(),
            weight,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

// --- Detection Methods ---

/// Which detector produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationMethod {
    /// Coordinates read from a screen-captured map.
    MapScreenshot,
    /// GPS tags embedded in the image metadata.
    ExifGps,
    Landmark,
    StreetViewMatch,
    OcrGeocoding,
    ManualCorrection,
    ContextFallback,
    ModelReasoning,
}

impl std::fmt::Display for LocationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationMethod::MapScreenshot => write!(f, "map_screenshot"),
            LocationMethod::ExifGps => write!(f, "exif_gps"),
            LocationMethod::Landmark => write!(f, "landmark"),
            LocationMethod::StreetViewMatch => write!(f, "street_view_match"),
            LocationMethod::OcrGeocoding => write!(f, "ocr_geocoding"),
            LocationMethod::ManualCorrection => write!(f, "manual_correction"),
            LocationMethod::ContextFallback => write!(f, "context_fallback"),
            LocationMethod::ModelReasoning => write!(f, "model_reasoning"),
        }
    }
}

/// Sub-method reported by a detector. Only used to classify a candidate
/// into a signal category during consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MethodTag {
    StructuralSimilarity,
    EmbeddingSimilarity,
    FeatureMatching,
    TextGeocoding,
    ArchitectureStyle,
    LandmarkDistance,
    GeneralSimilarity,
}

/// Opaque street-level preview passed through from the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StreetViewPreview {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

// --- Candidates ---

/// Output of one detector: a proposed location plus its justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocationCandidate {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub method: LocationMethod,
    /// Detector's self-reported reliability (0.0-1.0)
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_view_preview: Option<StreetViewPreview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_metadata: Option<MethodTag>,
}

impl LocationCandidate {
    pub fn new(method: LocationMethod, latitude: f64, longitude: f64, confidence: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            address: None,
            method,
            confidence,
            evidence: Vec::new(),
            street_view_preview: None,
            method_metadata: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_evidence(mut self, item: EvidenceItem) -> Self {
        self.evidence.push(item);
        self
    }

    pub fn with_tag(mut self, tag: MethodTag) -> Self {
        self.method_metadata = Some(tag);
        self
    }

    pub fn with_preview(mut self, preview: StreetViewPreview) -> Self {
        self.street_view_preview = Some(preview);
        self
    }

    /// Coordinates as `(lat, lng)` when both are present and finite.
    pub fn point(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.point().is_some()
    }

    pub fn has_evidence(&self, kind: EvidenceKind) -> bool {
        self.evidence.iter().any(|e| e.kind == kind)
    }
}

// --- Results ---

/// Where the final position came from: a single detector, or a blend
/// across signal categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Consolidated,
    #[serde(untagged)]
    Detector(LocationMethod),
}

impl ResultSource {
    pub fn method(&self) -> Option<LocationMethod> {
        match self {
            ResultSource::Consolidated => None,
            ResultSource::Detector(m) => Some(*m),
        }
    }
}

// Serialized as a bare string: "consolidated" or the detector method name.
impl JsonSchema for ResultSource {
    fn schema_name() -> String {
        "ResultSource".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSource::Consolidated => write!(f, "consolidated"),
            ResultSource::Detector(m) => write!(f, "{m}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Explanation {
    pub summary: String,
    /// Deduplicated, sorted by weight descending.
    pub evidence: Vec<EvidenceItem>,
}

/// Final output of one fusion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedResult {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub confidence: f64,
    pub source: ResultSource,
    pub explanation: Explanation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_view_preview: Option<StreetViewPreview>,
}

impl ConsolidatedResult {
    /// Lift a single valid candidate into a result, verbatim.
    pub fn from_candidate(candidate: &LocationCandidate) -> Option<Self> {
        let (latitude, longitude) = candidate.point()?;
        Some(Self {
            latitude,
            longitude,
            address: candidate.address.clone(),
            confidence: candidate.confidence,
            source: ResultSource::Detector(candidate.method),
            explanation: Explanation::default(),
            street_view_preview: candidate.street_view_preview.clone(),
        })
    }
}

// --- Request Context ---

/// Situational flags derived by the caller after running the screenshot
/// and landmark detectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FusionContext {
    pub map_screenshot_detected: bool,
    pub critical_landmark_detected: bool,
}

// --- Address Components ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    StreetNumber,
    Route,
    Locality,
    PostalCode,
    AdministrativeArea,
    Country,
    Other,
}

/// One structured piece of a geocoder response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddressComponent {
    pub kind: ComponentKind,
    pub value: String,
}
