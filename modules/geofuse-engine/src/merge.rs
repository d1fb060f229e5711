//! Select or blend a final position from competing candidates.
//!
//! 1. Invalid candidates are dropped; none → no result, one → returned verbatim.
//! 2. Rank by source priority, then confidence.
//! 3. A single very strong top candidate short-circuits.
//! 4. Otherwise the mean pairwise distance of the top-k decides: tight
//!    agreement boosts the winner and blends coordinates, wide disagreement
//!    penalises it.

use tracing::debug;

use geofuse_common::config::MergeConfig;
use geofuse_common::{clamp_unit, haversine_m, ConsolidatedResult, FusionTables, LocationCandidate};

/// How the top candidates relate spatially.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coherence {
    /// Mean distance under the boost radius.
    Tight { avg_distance_m: f64 },
    Neutral { avg_distance_m: f64 },
    /// Mean distance over the divergence radius.
    Divergent { avg_distance_m: f64 },
}

impl Coherence {
    pub fn classify(avg_distance_m: f64, config: &MergeConfig) -> Self {
        if avg_distance_m < config.boost_radius_m {
            Coherence::Tight { avg_distance_m }
        } else if avg_distance_m > config.divergence_radius_m {
            Coherence::Divergent { avg_distance_m }
        } else {
            Coherence::Neutral { avg_distance_m }
        }
    }

    /// Winner confidence after the coherence adjustment, clamped to [0, 1].
    pub fn adjust(&self, confidence: f64, config: &MergeConfig) -> f64 {
        let adjusted = match *self {
            Coherence::Tight { avg_distance_m } => {
                let boost = ((config.boost_radius_m - avg_distance_m) / config.boost_scale_m)
                    .min(config.max_boost);
                confidence + boost
            }
            Coherence::Neutral { .. } => confidence,
            Coherence::Divergent { .. } => {
                (confidence - config.divergence_penalty).max(config.confidence_floor)
            }
        };
        clamp_unit(adjusted)
    }
}

/// Mean great-circle distance over every pair of points, in meters.
/// Zero for fewer than two points.
pub fn mean_pairwise_distance(points: &[(f64, f64)]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0u32;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            total += haversine_m(a.0, a.1, b.0, b.1);
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / f64::from(pairs)
    }
}

/// Confidence-weighted centroid. `None` when every weight is zero.
pub fn weighted_centroid(points: &[(f64, f64, f64)]) -> Option<(f64, f64)> {
    let total: f64 = points.iter().map(|(_, _, w)| w).sum();
    if !(total > 0.0) {
        return None;
    }
    let lat = points.iter().map(|(lat, _, w)| w * lat).sum::<f64>() / total;
    let lng = points.iter().map(|(_, lng, w)| w * lng).sum::<f64>() / total;
    Some((lat, lng))
}

/// A candidate taken as-is, with its confidence held to [0, 1].
fn unblended(candidate: &LocationCandidate) -> Option<ConsolidatedResult> {
    let mut result = ConsolidatedResult::from_candidate(candidate)?;
    result.confidence = clamp_unit(result.confidence);
    Some(result)
}

/// Merge competing candidates into one result.
pub fn merge(
    candidates: &[LocationCandidate],
    tables: &FusionTables,
    config: &MergeConfig,
) -> Option<ConsolidatedResult> {
    let mut ranked: Vec<&LocationCandidate> = candidates.iter().filter(|c| c.is_valid()).collect();

    match ranked.len() {
        0 => return None,
        1 => return unblended(ranked[0]),
        _ => {}
    }

    ranked.sort_by(|a, b| tables.priorities.rank_order(a, b));
    let winner = ranked[0];
    let winner_priority = tables.priorities.priority(winner.method);

    if winner_priority >= config.short_circuit_priority
        && winner.confidence >= config.short_circuit_confidence
    {
        debug!(
            method = %winner.method,
            priority = winner_priority,
            confidence = winner.confidence,
            "Strong top candidate, skipping blend"
        );
        return unblended(winner);
    }

    let top: Vec<(f64, f64, f64)> = ranked
        .iter()
        .take(config.top_k)
        .filter_map(|c| c.point().map(|(lat, lng)| (lat, lng, c.confidence)))
        .collect();
    let points: Vec<(f64, f64)> = top.iter().map(|(lat, lng, _)| (*lat, *lng)).collect();
    let avg_distance_m = mean_pairwise_distance(&points);

    let coherence = Coherence::classify(avg_distance_m, config);
    let confidence = coherence.adjust(winner.confidence, config);

    let mut result = ConsolidatedResult::from_candidate(winner)?;
    if avg_distance_m < config.blend_radius_m {
        if let Some((lat, lng)) = weighted_centroid(&top) {
            result.latitude = lat;
            result.longitude = lng;
        }
    }
    result.confidence = confidence;

    debug!(
        method = %winner.method,
        considered = top.len(),
        avg_distance_m,
        ?coherence,
        before = winner.confidence,
        after = confidence,
        "Merged top candidates"
    );

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geofuse_common::{LocationMethod, ResultSource, StreetViewPreview};

    fn tables() -> FusionTables {
        FusionTables::STANDARD
    }

    fn config() -> MergeConfig {
        MergeConfig::default()
    }

    fn c(method: LocationMethod, lat: f64, lng: f64, confidence: f64) -> LocationCandidate {
        LocationCandidate::new(method, lat, lng, confidence)
    }

    /// Offset a latitude northward by roughly `meters`.
    fn north(lat: f64, meters: f64) -> f64 {
        lat + meters / 111_195.0
    }

    #[test]
    fn empty_input_is_no_result() {
        assert!(merge(&[], &tables(), &config()).is_none());
    }

    #[test]
    fn all_invalid_is_no_result() {
        let mut a = c(LocationMethod::ExifGps, 48.0, 2.0, 0.9);
        a.latitude = None;
        let b = c(LocationMethod::ExifGps, f64::NAN, 2.0, 0.9);
        assert!(merge(&[a, b], &tables(), &config()).is_none());
    }

    #[test]
    fn single_candidate_passes_through() {
        let only = c(LocationMethod::ModelReasoning, 48.8566, 2.3522, 0.42)
            .with_address("Place de l'Hôtel de Ville, Paris")
            .with_preview(StreetViewPreview {
                url: "https://example.com/pano".to_string(),
                heading: None,
            });
        let r = merge(std::slice::from_ref(&only), &tables(), &config()).unwrap();
        assert_eq!(r, ConsolidatedResult::from_candidate(&only).unwrap());
    }

    #[test]
    fn invalid_candidates_do_not_count_toward_single_pass_through() {
        let mut broken = c(LocationMethod::MapScreenshot, 0.0, 0.0, 1.0);
        broken.longitude = None;
        let only = c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, 0.4);
        let r = merge(&[broken, only.clone()], &tables(), &config()).unwrap();
        assert_eq!(r.confidence, 0.4);
        assert_eq!(r.source, ResultSource::Detector(LocationMethod::OcrGeocoding));
    }

    #[test]
    fn strong_gps_short_circuits_over_confident_reasoning() {
        let gps = c(LocationMethod::ExifGps, 48.8566, 2.3522, 0.9);
        let reasoning = c(LocationMethod::ModelReasoning, 48.9000, 2.4000, 0.95);
        let r = merge(&[reasoning, gps], &tables(), &config()).unwrap();
        assert_eq!(r.source, ResultSource::Detector(LocationMethod::ExifGps));
        assert_eq!(r.latitude, 48.8566);
        assert_eq!(r.longitude, 2.3522);
        assert_eq!(r.confidence, 0.9);
    }

    #[test]
    fn coherent_cluster_is_blended_and_boosted() {
        let base = 48.8566;
        let candidates = vec![
            c(LocationMethod::StreetViewMatch, base, 2.3522, 0.7),
            c(LocationMethod::StreetViewMatch, north(base, 30.0), 2.3522, 0.72),
            c(LocationMethod::StreetViewMatch, north(base, 15.0), 2.3522, 0.69),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();

        let expected_lat = (0.7 * base + 0.72 * north(base, 30.0) + 0.69 * north(base, 15.0))
            / (0.7 + 0.72 + 0.69);
        assert!((r.latitude - expected_lat).abs() < 1e-9);
        assert!(r.confidence > 0.72, "boosted above input max, got {}", r.confidence);
        assert!(r.confidence <= 0.72 + 0.15 + 1e-9);
    }

    #[test]
    fn identical_locations_get_positive_boost() {
        let candidates = vec![
            c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, 0.5),
            c(LocationMethod::ModelReasoning, 48.8566, 2.3522, 0.4),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        // avg distance 0 → boost min(0.15, 0.1) = 0.1
        assert!((r.confidence - 0.6).abs() < 1e-9, "got {}", r.confidence);
    }

    #[test]
    fn divergent_top_candidates_are_penalised_without_blending() {
        let candidates = vec![
            c(LocationMethod::StreetViewMatch, 48.8566, 2.3522, 0.8),
            c(LocationMethod::OcrGeocoding, north(48.8566, 600.0), 2.3522, 0.7),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert!((r.confidence - 0.6).abs() < 1e-9, "got {}", r.confidence);
        assert_eq!(r.latitude, 48.8566);
        assert_eq!(r.longitude, 2.3522);
        assert_eq!(r.source, ResultSource::Detector(LocationMethod::StreetViewMatch));
    }

    #[test]
    fn divergence_penalty_floors_at_minimum() {
        let candidates = vec![
            c(LocationMethod::StreetViewMatch, 48.8566, 2.3522, 0.4),
            c(LocationMethod::OcrGeocoding, north(48.8566, 900.0), 2.3522, 0.3),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert!((r.confidence - 0.3).abs() < 1e-9, "got {}", r.confidence);
    }

    #[test]
    fn divergent_winner_below_floor_is_raised_to_floor() {
        for start in [0.3, 0.25, 0.0] {
            let candidates = vec![
                c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, start),
                c(LocationMethod::OcrGeocoding, north(48.8566, 900.0), 2.3522, 0.2),
            ];
            let r = merge(&candidates, &tables(), &config()).unwrap();
            assert!((r.confidence - 0.3).abs() < 1e-9, "start {start}: got {}", r.confidence);
        }
    }

    #[test]
    fn neutral_band_keeps_confidence_and_raw_coordinates() {
        // 300m: no boost, no penalty, beyond the blend radius.
        let candidates = vec![
            c(LocationMethod::Landmark, 48.8566, 2.3522, 0.6),
            c(LocationMethod::OcrGeocoding, north(48.8566, 300.0), 2.3522, 0.7),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert_eq!(r.confidence, 0.6);
        assert_eq!(r.latitude, 48.8566);
    }

    #[test]
    fn blend_band_between_boost_and_blend_radius() {
        // 150m: no boost, but coordinates are blended.
        let candidates = vec![
            c(LocationMethod::Landmark, 48.8566, 2.3522, 0.6),
            c(LocationMethod::OcrGeocoding, north(48.8566, 150.0), 2.3522, 0.6),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert_eq!(r.confidence, 0.6);
        assert!(r.latitude > 48.8566);
        assert_eq!(r.source, ResultSource::Detector(LocationMethod::Landmark));
    }

    #[test]
    fn only_top_k_take_part_in_coherence() {
        // A far-away fourth candidate must not influence the result.
        let candidates = vec![
            c(LocationMethod::Landmark, 48.8566, 2.3522, 0.6),
            c(LocationMethod::StreetViewMatch, 48.8566, 2.3522, 0.6),
            c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, 0.6),
            c(LocationMethod::ModelReasoning, 43.2965, 5.3698, 0.99),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert!((r.confidence - 0.7).abs() < 1e-9, "got {}", r.confidence);
        assert!((r.latitude - 48.8566).abs() < 1e-9);
    }

    #[test]
    fn higher_priority_always_dominates_at_equal_confidence() {
        let methods = [
            LocationMethod::MapScreenshot,
            LocationMethod::ExifGps,
            LocationMethod::Landmark,
            LocationMethod::StreetViewMatch,
            LocationMethod::OcrGeocoding,
            LocationMethod::ManualCorrection,
            LocationMethod::ContextFallback,
            LocationMethod::ModelReasoning,
        ];
        for (i, strong) in methods.iter().enumerate() {
            for weak in &methods[i + 1..] {
                let candidates = vec![
                    c(*weak, 48.8566, 2.3522, 0.5),
                    c(*strong, north(48.8566, 2_000.0), 2.3522, 0.5),
                ];
                let r = merge(&candidates, &tables(), &config()).unwrap();
                assert_eq!(
                    r.source,
                    ResultSource::Detector(*strong),
                    "{strong} should dominate {weak}"
                );
            }
        }
    }

    #[test]
    fn adversarial_confidence_stays_in_bounds() {
        let candidates = vec![
            c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, 2.0),
            c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, -1.0),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert!((0.0..=1.0).contains(&r.confidence), "got {}", r.confidence);
    }

    #[test]
    fn short_circuit_confidence_is_clamped() {
        let candidates = vec![
            c(LocationMethod::ExifGps, 48.8566, 2.3522, 2.0),
            c(LocationMethod::ModelReasoning, 48.8566, 2.3522, 0.5),
        ];
        let r = merge(&candidates, &tables(), &config()).unwrap();
        assert_eq!(r.source, ResultSource::Detector(LocationMethod::ExifGps));
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn single_candidate_confidence_is_clamped() {
        for (raw, expected) in [(2.0, 1.0), (-1.0, 0.0), (f64::NAN, 0.0)] {
            let only = c(LocationMethod::OcrGeocoding, 48.8566, 2.3522, raw);
            let r = merge(std::slice::from_ref(&only), &tables(), &config()).unwrap();
            assert_eq!(r.confidence, expected, "raw {raw}");
            assert_eq!(r.latitude, 48.8566);
        }
    }

    #[test]
    fn mean_pairwise_distance_basics() {
        assert_eq!(mean_pairwise_distance(&[]), 0.0);
        assert_eq!(mean_pairwise_distance(&[(48.0, 2.0)]), 0.0);
        assert!(mean_pairwise_distance(&[(48.0, 2.0), (48.0, 2.0)]) < 1e-9);
    }

    #[test]
    fn centroid_guards_zero_weight() {
        assert!(weighted_centroid(&[(48.0, 2.0, 0.0), (49.0, 3.0, 0.0)]).is_none());
        let (lat, lng) = weighted_centroid(&[(48.0, 2.0, 1.0), (50.0, 4.0, 1.0)]).unwrap();
        assert_eq!((lat, lng), (49.0, 3.0));
    }
}
