//! First pass over raw detector output: drop what cannot be located, clamp
//! what is merely out of range.

use tracing::{debug, warn};

use geofuse_common::{clamp_unit, LocationCandidate};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeStats {
    /// Candidates with no coordinates at all.
    pub unlocated: u32,
    /// Candidates dropped as malformed (half pair, NaN, out of range).
    pub malformed: u32,
    /// Confidences or evidence weights pulled back into [0, 1].
    pub clamped: u32,
}

impl SanitizeStats {
    pub fn dropped(&self) -> u32 {
        self.unlocated + self.malformed
    }
}

enum Verdict {
    Keep,
    Unlocated,
    Malformed(&'static str),
}

fn check_coordinates(candidate: &LocationCandidate) -> Verdict {
    match (candidate.latitude, candidate.longitude) {
        (None, None) => Verdict::Unlocated,
        (Some(_), None) | (None, Some(_)) => Verdict::Malformed("inconsistent coordinate pair"),
        (Some(lat), Some(lng)) if !lat.is_finite() || !lng.is_finite() => {
            Verdict::Malformed("non-finite coordinates")
        }
        (Some(lat), Some(lng)) if lat.abs() > 90.0 || lng.abs() > 180.0 => {
            Verdict::Malformed("coordinates out of range")
        }
        _ => Verdict::Keep,
    }
}

/// Drop unlocatable candidates and clamp confidences and evidence weights.
/// Order of survivors is preserved.
pub fn sanitize_candidates(candidates: Vec<LocationCandidate>) -> (Vec<LocationCandidate>, SanitizeStats) {
    let mut stats = SanitizeStats::default();
    let mut kept = Vec::with_capacity(candidates.len());

    for mut candidate in candidates {
        match check_coordinates(&candidate) {
            Verdict::Keep => {}
            Verdict::Unlocated => {
                debug!(method = %candidate.method, "Dropping candidate without coordinates");
                stats.unlocated += 1;
                continue;
            }
            Verdict::Malformed(reason) => {
                warn!(
                    method = %candidate.method,
                    latitude = ?candidate.latitude,
                    longitude = ?candidate.longitude,
                    reason,
                    "Dropping malformed candidate"
                );
                stats.malformed += 1;
                continue;
            }
        }

        let confidence = clamp_unit(candidate.confidence);
        if confidence != candidate.confidence {
            warn!(
                method = %candidate.method,
                raw = candidate.confidence,
                clamped = confidence,
                "Candidate confidence out of range"
            );
            candidate.confidence = confidence;
            stats.clamped += 1;
        }

        for item in &mut candidate.evidence {
            let weight = clamp_unit(item.weight);
            if weight != item.weight {
                warn!(
                    kind = %item.kind,
                    label = item.label.as_str(),
                    raw = item.weight,
                    "Evidence weight out of range"
                );
                item.weight = weight;
                stats.clamped += 1;
            }
        }

        kept.push(candidate);
    }

    (kept, stats)
}
