//! Confidence re-weighting by evidence strength and known failure modes.
//!
//! Hard-to-fake signals (GPS tags, map screenshots, unmistakable landmarks)
//! are boosted. Street-level visual matching is penalised when a stronger
//! contradicting signal is present in the request.
//!
//! This stage only re-sorts by adjusted confidence; source priority is
//! applied afterwards, when the merger ranks candidates.

use tracing::debug;

use geofuse_common::{clamp_unit, EvidenceKind, FusionContext, LocationCandidate, LocationMethod};

const LANDMARK_BOOST: f64 = 0.3;
const CRITICAL_LANDMARK_BOOST: f64 = 0.6;
const TEXTUAL_EVIDENCE_BOOST: f64 = 0.4;
const EXIF_GPS_BOOST: f64 = 0.2;
const MAP_SCREENSHOT_BOOST: f64 = 0.3;
const STREET_VIEW_LANDMARK_PENALTY: f64 = 0.5;
const STREET_VIEW_SCREENSHOT_PENALTY: f64 = 0.4;

/// Confidence for one candidate after all adjustments, clamped to [0, 1].
pub fn adjusted_confidence(candidate: &LocationCandidate, context: &FusionContext) -> f64 {
    let mut confidence = candidate.confidence;

    if candidate.has_evidence(EvidenceKind::Landmark) {
        confidence += if context.critical_landmark_detected {
            CRITICAL_LANDMARK_BOOST
        } else {
            LANDMARK_BOOST
        };
    }

    if candidate.evidence.iter().any(|e| e.kind.is_textual()) {
        confidence += TEXTUAL_EVIDENCE_BOOST;
    }

    match candidate.method {
        LocationMethod::ExifGps => confidence += EXIF_GPS_BOOST,
        LocationMethod::MapScreenshot => confidence += MAP_SCREENSHOT_BOOST,
        LocationMethod::StreetViewMatch => {
            // Both penalties stack when both signals are present.
            if context.critical_landmark_detected {
                confidence -= STREET_VIEW_LANDMARK_PENALTY;
            }
            if context.map_screenshot_detected {
                confidence -= STREET_VIEW_SCREENSHOT_PENALTY;
            }
        }
        LocationMethod::Landmark
        | LocationMethod::OcrGeocoding
        | LocationMethod::ManualCorrection
        | LocationMethod::ContextFallback
        | LocationMethod::ModelReasoning => {}
    }

    clamp_unit(confidence)
}

/// Re-score every candidate and sort by adjusted confidence, descending.
/// The sort is stable: equal confidences keep their input order.
pub fn reprioritize(candidates: Vec<LocationCandidate>, context: &FusionContext) -> Vec<LocationCandidate> {
    let mut rescored: Vec<LocationCandidate> = candidates
        .into_iter()
        .map(|mut c| {
            let adjusted = adjusted_confidence(&c, context);
            if adjusted != c.confidence {
                debug!(
                    method = %c.method,
                    before = c.confidence,
                    after = adjusted,
                    "Reprioritized candidate"
                );
            }
            c.confidence = adjusted;
            c
        })
        .collect();

    rescored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    rescored
}
