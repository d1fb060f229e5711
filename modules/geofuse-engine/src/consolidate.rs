//! Weighted blend across independent signal categories.
//!
//! Used when the candidate set reads as several families of signal measuring
//! one place (street-level match, signage, architecture...) rather than
//! competing alternatives. Each non-empty category contributes its most
//! confident candidate, weighted by `category_weight * confidence`.

use tracing::debug;

use geofuse_common::config::{ConsolidationConfig, ConsolidationMode};
use geofuse_common::{
    clamp_unit, haversine_m, ConsolidatedResult, Explanation, FusionTables, LocationCandidate,
    ResultSource, SignalCategory,
};

/// The candidate chosen to speak for one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPick<'a> {
    pub category: SignalCategory,
    pub candidate: &'a LocationCandidate,
    pub lat: f64,
    pub lng: f64,
    /// `category_weight * candidate.confidence`
    pub weight: f64,
}

/// Most confident valid candidate per non-empty category, in category order.
/// Ties keep the earlier candidate.
pub fn pick_representatives<'a>(
    candidates: &'a [LocationCandidate],
    tables: &FusionTables,
) -> Vec<CategoryPick<'a>> {
    let mut best: [Option<&'a LocationCandidate>; 5] = [None; 5];

    for candidate in candidates.iter().filter(|c| c.is_valid()) {
        let slot = category_slot(SignalCategory::classify(candidate));
        match best[slot] {
            Some(current) if current.confidence >= candidate.confidence => {}
            _ => best[slot] = Some(candidate),
        }
    }

    SignalCategory::ORDERED
        .into_iter()
        .zip(best)
        .filter_map(|(category, chosen)| {
            let candidate = chosen?;
            let (lat, lng) = candidate.point()?;
            Some(CategoryPick {
                category,
                candidate,
                lat,
                lng,
                weight: tables.category_weights.weight(category) * candidate.confidence,
            })
        })
        .collect()
}

fn category_slot(category: SignalCategory) -> usize {
    match category {
        SignalCategory::StreetView => 0,
        SignalCategory::Text => 1,
        SignalCategory::Architecture => 2,
        SignalCategory::LandmarkDistance => 3,
        SignalCategory::General => 4,
    }
}

/// Whether the set should go through the weighted blend instead of the merger.
pub fn should_consolidate(
    candidates: &[LocationCandidate],
    tables: &FusionTables,
    config: &ConsolidationConfig,
) -> bool {
    match config.mode {
        ConsolidationMode::Never => false,
        ConsolidationMode::Always => candidates.iter().any(|c| c.is_valid()),
        ConsolidationMode::Auto => {
            let has_hard_evidence = candidates
                .iter()
                .any(|c| tables.priorities.priority(c.method) >= config.hard_evidence_priority);
            if has_hard_evidence {
                return false;
            }

            let picks = pick_representatives(candidates, tables);
            if picks.len() < 2 {
                return false;
            }

            // Representatives that disagree by more than the spread limit are
            // competing answers, not one place measured several ways.
            picks.iter().enumerate().all(|(i, a)| {
                picks[i + 1..]
                    .iter()
                    .all(|b| haversine_m(a.lat, a.lng, b.lat, b.lng) <= config.max_spread_m)
            })
        }
    }
}

/// Weighted average of the category representatives.
/// Returns `None` when there is nothing to weigh (total weight zero).
pub fn consolidate(
    candidates: &[LocationCandidate],
    tables: &FusionTables,
    config: &ConsolidationConfig,
) -> Option<ConsolidatedResult> {
    let picks = pick_representatives(candidates, tables);

    let total_weight: f64 = picks.iter().map(|p| p.weight).sum();
    if !(total_weight > 0.0) {
        debug!(categories = picks.len(), "Consolidation has zero total weight");
        return None;
    }

    let latitude = picks.iter().map(|p| p.weight * p.lat).sum::<f64>() / total_weight;
    let longitude = picks.iter().map(|p| p.weight * p.lng).sum::<f64>() / total_weight;

    // Highest-confidence pick leads; first in category order on ties.
    let mut ranked: Vec<&CategoryPick> = picks.iter().collect();
    ranked.sort_by(|a, b| b.candidate.confidence.total_cmp(&a.candidate.confidence));
    let lead = ranked[0].candidate;

    let address = lead
        .address
        .clone()
        .or_else(|| ranked.iter().find_map(|p| p.candidate.address.clone()));
    let street_view_preview = lead
        .street_view_preview
        .clone()
        .or_else(|| ranked.iter().find_map(|p| p.candidate.street_view_preview.clone()));

    let confidence = clamp_unit(total_weight.min(config.confidence_cap));

    debug!(
        categories = picks.len(),
        total_weight,
        confidence,
        lead = %lead.method,
        "Consolidated across signal categories"
    );

    Some(ConsolidatedResult {
        latitude,
        longitude,
        address,
        confidence,
        source: ResultSource::Consolidated,
        explanation: Explanation::default(),
        street_view_preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geofuse_common::{LocationMethod, MethodTag, StreetViewPreview};

    fn tables() -> FusionTables {
        FusionTables::STANDARD
    }

    fn sv(lat: f64, lng: f64, confidence: f64) -> LocationCandidate {
        LocationCandidate::new(LocationMethod::StreetViewMatch, lat, lng, confidence)
    }

    fn ocr(lat: f64, lng: f64, confidence: f64) -> LocationCandidate {
        LocationCandidate::new(LocationMethod::OcrGeocoding, lat, lng, confidence)
    }

    fn arch(lat: f64, lng: f64, confidence: f64) -> LocationCandidate {
        LocationCandidate::new(LocationMethod::ModelReasoning, lat, lng, confidence)
            .with_tag(MethodTag::ArchitectureStyle)
    }

    #[test]
    fn picks_best_per_category() {
        let candidates = vec![sv(48.0, 2.0, 0.5), sv(48.1, 2.1, 0.8), ocr(48.2, 2.2, 0.6)];
        let picks = pick_representatives(&candidates, &tables());
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].category, SignalCategory::StreetView);
        assert_eq!(picks[0].candidate.confidence, 0.8);
        assert!((picks[0].weight - 0.32).abs() < 1e-9);
        assert_eq!(picks[1].category, SignalCategory::Text);
        assert!((picks[1].weight - 0.12).abs() < 1e-9);
    }

    #[test]
    fn weighted_average_position_and_confidence() {
        let candidates = vec![sv(48.0, 2.0, 0.5), ocr(49.0, 3.0, 0.5)];
        let r = consolidate(&candidates, &tables(), &ConsolidationConfig::default()).unwrap();

        // weights 0.2 and 0.1 → lat = (0.2*48 + 0.1*49) / 0.3
        let expected_lat = (0.2 * 48.0 + 0.1 * 49.0) / 0.3;
        let expected_lng = (0.2 * 2.0 + 0.1 * 3.0) / 0.3;
        assert!((r.latitude - expected_lat).abs() < 1e-9);
        assert!((r.longitude - expected_lng).abs() < 1e-9);
        assert!((r.confidence - 0.3).abs() < 1e-9);
        assert_eq!(r.source, ResultSource::Consolidated);
    }

    #[test]
    fn confidence_capped() {
        let candidates = vec![
            sv(48.0, 2.0, 1.0),
            ocr(48.0, 2.0, 1.0),
            arch(48.0, 2.0, 1.0),
            LocationCandidate::new(LocationMethod::Landmark, 48.0, 2.0, 1.0),
            LocationCandidate::new(LocationMethod::ContextFallback, 48.0, 2.0, 1.0),
        ];
        let r = consolidate(&candidates, &tables(), &ConsolidationConfig::default()).unwrap();
        assert!((r.confidence - 0.95).abs() < 1e-9, "got {}", r.confidence);
    }

    #[test]
    fn zero_total_weight_is_no_result() {
        let candidates = vec![sv(48.0, 2.0, 0.0), ocr(48.0, 2.0, 0.0)];
        assert!(consolidate(&candidates, &tables(), &ConsolidationConfig::default()).is_none());
        assert!(consolidate(&[], &tables(), &ConsolidationConfig::default()).is_none());
    }

    #[test]
    fn address_and_preview_from_most_confident_pick() {
        let preview = StreetViewPreview {
            url: "https://example.com/pano/7".to_string(),
            heading: Some(180.0),
        };
        let candidates = vec![
            sv(48.0, 2.0, 0.6).with_preview(preview.clone()),
            ocr(48.0, 2.0, 0.9).with_address("3 Rue Oberkampf, 75011 Paris"),
        ];
        let r = consolidate(&candidates, &tables(), &ConsolidationConfig::default()).unwrap();
        assert_eq!(r.address.as_deref(), Some("3 Rue Oberkampf, 75011 Paris"));
        assert_eq!(r.street_view_preview, Some(preview));
    }

    #[test]
    fn auto_mode_requires_two_coherent_categories() {
        let config = ConsolidationConfig::default();
        let t = tables();

        let single = vec![sv(48.8566, 2.3522, 0.7), sv(48.8567, 2.3523, 0.6)];
        assert!(!should_consolidate(&single, &t, &config));

        let coherent = vec![sv(48.8566, 2.3522, 0.7), ocr(48.8570, 2.3530, 0.6)];
        assert!(should_consolidate(&coherent, &t, &config));

        // ~1.3km apart: competing answers
        let spread = vec![sv(48.8566, 2.3522, 0.7), ocr(48.8680, 2.3522, 0.6)];
        assert!(!should_consolidate(&spread, &t, &config));
    }

    #[test]
    fn auto_mode_defers_to_hard_evidence() {
        let candidates = vec![
            sv(48.8566, 2.3522, 0.7),
            ocr(48.8566, 2.3522, 0.6),
            LocationCandidate::new(LocationMethod::ExifGps, 48.8566, 2.3522, 0.9),
        ];
        assert!(!should_consolidate(&candidates, &tables(), &ConsolidationConfig::default()));
    }

    #[test]
    fn explicit_modes() {
        let candidates = vec![sv(48.0, 2.0, 0.7)];
        let always = ConsolidationConfig {
            mode: ConsolidationMode::Always,
            ..ConsolidationConfig::default()
        };
        let never = ConsolidationConfig {
            mode: ConsolidationMode::Never,
            ..ConsolidationConfig::default()
        };
        assert!(should_consolidate(&candidates, &tables(), &always));
        assert!(!should_consolidate(&candidates, &tables(), &never));
    }
}
