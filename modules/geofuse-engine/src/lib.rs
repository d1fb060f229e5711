//! Evidence fusion for property geolocation.
//!
//! Candidates from independent detectors flow through
//! sanitize → geofence → reprioritize → consolidate/merge → explain.
//! Every stage is a pure function over its inputs; the only shared state is
//! the read-only geofence registry and the constant tables.

pub mod address;
pub mod consolidate;
pub mod explain;
pub mod geofence;
pub mod merge;
pub mod pipeline;
pub mod reprioritize;
pub mod sanitize;

pub use address::{components_too_vague, displayable, is_too_vague};
pub use consolidate::{consolidate, should_consolidate};
pub use explain::{apply_confidence_bonuses, explain};
pub use geofence::{filter_candidates, Geofence, GeofenceRegistry, GeofenceStats};
pub use merge::merge;
pub use pipeline::{FusionEngine, FusionOutcome, FusionReport, FusionRequest, FusionStage};
pub use reprioritize::reprioritize;
pub use sanitize::{sanitize_candidates, SanitizeStats};
