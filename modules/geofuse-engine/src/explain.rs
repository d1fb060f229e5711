//! Human-readable justification for a fused location.
//!
//! Evidence from every candidate is pooled, deduplicated by (kind, label)
//! keeping the heavier entry, and ranked by weight. The summary special-cases
//! the two unambiguous kinds (map screenshot, embedded GPS) and otherwise
//! stitches the visible clues into one sentence.

use std::collections::HashMap;

use geofuse_common::config::ExplanationConfig;
use geofuse_common::{
    clamp_unit, EvidenceItem, EvidenceKind, Explanation, LocationCandidate, LocationMethod,
    ResultSource,
};

const MAP_SCREENSHOT_SUMMARY: &str =
    "Coordinates were read directly from the map visible in the screenshot.";
const METADATA_SUMMARY: &str =
    "Coordinates come from the GPS position embedded in the photo's metadata.";
const FALLBACK_SUMMARY: &str = "Location estimated based on visual analysis of the image.";

/// Pool, deduplicate and rank evidence from every candidate.
pub fn dedup_evidence<'a>(items: impl IntoIterator<Item = &'a EvidenceItem>) -> Vec<EvidenceItem> {
    let mut slots: HashMap<(EvidenceKind, String), usize> = HashMap::new();
    let mut kept: Vec<EvidenceItem> = Vec::new();

    for item in items {
        let key = (item.kind, item.label.trim().to_lowercase());
        match slots.get(&key) {
            Some(&i) => {
                if item.weight > kept[i].weight {
                    kept[i] = item.clone();
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(item.clone());
            }
        }
    }

    // Stable: equal weights keep first-seen order.
    kept.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    kept
}

/// Build the summary sentence and ranked evidence list for a candidate set.
pub fn explain(candidates: &[LocationCandidate]) -> Explanation {
    let evidence = dedup_evidence(candidates.iter().flat_map(|c| c.evidence.iter()));
    let summary = summarize(&evidence);
    Explanation { summary, evidence }
}

/// One-sentence summary of already-ranked evidence.
pub fn summarize(evidence: &[EvidenceItem]) -> String {
    let has = |kind: EvidenceKind| evidence.iter().any(|e| e.kind == kind);

    if has(EvidenceKind::MapScreenshot) {
        return MAP_SCREENSHOT_SUMMARY.to_string();
    }
    if has(EvidenceKind::MetadataCoordinates) {
        return METADATA_SUMMARY.to_string();
    }

    let clauses: Vec<String> = [
        EvidenceKind::ShopSign,
        EvidenceKind::RoadMarking,
        EvidenceKind::Landmark,
        EvidenceKind::StreetViewMatch,
        EvidenceKind::ArchitectureStyle,
    ]
    .into_iter()
    .filter_map(|kind| {
        let labels: Vec<&str> = evidence
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.label.trim())
            .filter(|l| !l.is_empty())
            .collect();
        clause(kind, &labels)
    })
    .collect();

    if clauses.is_empty() {
        return FALLBACK_SUMMARY.to_string();
    }
    format!("Location identified from {}.", join_natural(&clauses))
}

fn clause(kind: EvidenceKind, labels: &[&str]) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    let quoted: Vec<String> = labels.iter().map(|l| format!("\"{l}\"")).collect();
    let list = join_natural(&quoted);
    let plural = labels.len() > 1;

    let text = match kind {
        EvidenceKind::ShopSign => {
            format!("the shop sign{} {list}", if plural { "s" } else { "" })
        }
        EvidenceKind::RoadMarking => format!("road markings reading {list}"),
        EvidenceKind::Landmark => {
            format!("the nearby landmark{} {list}", if plural { "s" } else { "" })
        }
        EvidenceKind::StreetViewMatch => format!("a street-level imagery match ({list})"),
        EvidenceKind::ArchitectureStyle => format!("{list} architecture"),
        EvidenceKind::MapScreenshot
        | EvidenceKind::MetadataCoordinates
        | EvidenceKind::ModelReasoning
        | EvidenceKind::DepartmentLock => return None,
    };
    Some(text)
}

/// "a", "a and b", "a, b and c"
fn join_natural(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

fn raise(confidence: f64, bonus: f64, cap: f64) -> f64 {
    if confidence >= cap {
        confidence
    } else {
        (confidence + bonus).min(cap)
    }
}

/// Evidence- and method-driven confidence bonuses on the final result.
/// A bonus never lowers a confidence already above its cap.
pub fn apply_confidence_bonuses(
    confidence: f64,
    explanation: &Explanation,
    source: ResultSource,
    config: &ExplanationConfig,
) -> f64 {
    let count = explanation.evidence.len();
    let mut boosted = confidence;

    if count >= config.rich_evidence_count {
        boosted = raise(boosted, config.rich_bonus, config.rich_cap);
    }
    if count >= config.extensive_evidence_count {
        boosted = raise(boosted, config.extensive_bonus, config.extensive_cap);
    }

    match source.method() {
        Some(LocationMethod::StreetViewMatch) if confidence > config.street_view_threshold => {
            boosted = raise(boosted, config.street_view_bonus, config.street_view_cap);
        }
        Some(LocationMethod::OcrGeocoding)
            if explanation
                .evidence
                .iter()
                .any(|e| e.kind == EvidenceKind::ShopSign) =>
        {
            boosted = raise(boosted, config.ocr_shop_sign_bonus, config.ocr_shop_sign_cap);
        }
        _ => {}
    }

    clamp_unit(boosted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: EvidenceKind, label: &str, weight: f64) -> EvidenceItem {
        EvidenceItem::new(kind, label, weight)
    }

    fn with_evidence(items: Vec<EvidenceItem>) -> LocationCandidate {
        let mut c = LocationCandidate::new(LocationMethod::OcrGeocoding, 48.8566, 2.3522, 0.5);
        c.evidence = items;
        c
    }

    fn explanation_with(n: usize) -> Explanation {
        Explanation {
            summary: String::new(),
            evidence: (0..n)
                .map(|i| item(EvidenceKind::Landmark, &format!("landmark {i}"), 0.5))
                .collect(),
        }
    }

    #[test]
    fn duplicates_keep_heavier_entry() {
        let a = with_evidence(vec![item(EvidenceKind::ShopSign, "Boulangerie Dupont", 0.4)]);
        let b = with_evidence(vec![
            item(EvidenceKind::ShopSign, "Boulangerie Dupont", 0.9).with_detail("sharper crop"),
            item(EvidenceKind::Landmark, "Boulangerie Dupont", 0.3),
        ]);
        let e = explain(&[a, b]);

        assert_eq!(e.evidence.len(), 2, "same label, different kind is kept");
        assert_eq!(e.evidence[0].kind, EvidenceKind::ShopSign);
        assert_eq!(e.evidence[0].weight, 0.9);
        assert_eq!(e.evidence[0].detail, "sharper crop");
    }

    #[test]
    fn dedup_key_ignores_case_and_padding() {
        let items = [
            item(EvidenceKind::Landmark, "Eiffel Tower", 0.5),
            item(EvidenceKind::Landmark, "  eiffel tower ", 0.7),
        ];
        let out = dedup_evidence(items.iter());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].weight, 0.7);
    }

    #[test]
    fn no_duplicate_kind_label_pairs() {
        let items: Vec<EvidenceItem> = (0..20)
            .map(|i| item(EvidenceKind::ShopSign, &format!("sign {}", i % 4), i as f64 / 20.0))
            .collect();
        let out = dedup_evidence(items.iter());
        let mut seen = std::collections::HashSet::new();
        for e in &out {
            assert!(seen.insert((e.kind, e.label.to_lowercase())), "duplicate {}", e.label);
        }
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn evidence_sorted_by_weight() {
        let e = explain(&[with_evidence(vec![
            item(EvidenceKind::ArchitectureStyle, "Haussmannian", 0.3),
            item(EvidenceKind::Landmark, "Sacré-Cœur", 0.95),
            item(EvidenceKind::ShopSign, "Tabac", 0.6),
        ])]);
        let weights: Vec<f64> = e.evidence.iter().map(|i| i.weight).collect();
        assert_eq!(weights, vec![0.95, 0.6, 0.3]);
    }

    #[test]
    fn map_screenshot_summary_wins() {
        let e = explain(&[with_evidence(vec![
            item(EvidenceKind::ShopSign, "Tabac", 0.6),
            item(EvidenceKind::MapScreenshot, "Google Maps pin", 0.9),
            item(EvidenceKind::MetadataCoordinates, "EXIF", 0.9),
        ])]);
        assert_eq!(e.summary, MAP_SCREENSHOT_SUMMARY);
    }

    #[test]
    fn metadata_summary() {
        let e = explain(&[with_evidence(vec![item(
            EvidenceKind::MetadataCoordinates,
            "EXIF GPS",
            0.9,
        )])]);
        assert_eq!(e.summary, METADATA_SUMMARY);
    }

    #[test]
    fn summary_joins_visible_clues() {
        let e = explain(&[with_evidence(vec![
            item(EvidenceKind::ShopSign, "Boulangerie Dupont", 0.7),
            item(EvidenceKind::ShopSign, "Pharmacie Centrale", 0.6),
            item(EvidenceKind::Landmark, "Sacré-Cœur", 0.8),
            item(EvidenceKind::ArchitectureStyle, "Haussmannian", 0.4),
            item(EvidenceKind::ModelReasoning, "Looks Parisian", 0.2),
        ])]);
        assert_eq!(
            e.summary,
            "Location identified from the shop signs \"Boulangerie Dupont\" and \
             \"Pharmacie Centrale\", the nearby landmark \"Sacré-Cœur\" and \
             \"Haussmannian\" architecture."
        );
    }

    #[test]
    fn summary_falls_back_without_visible_clues() {
        let e = explain(&[with_evidence(vec![item(
            EvidenceKind::ModelReasoning,
            "Vegetation suggests southern France",
            0.3,
        )])]);
        assert_eq!(e.summary, FALLBACK_SUMMARY);
        assert_eq!(explain(&[]).summary, FALLBACK_SUMMARY);
    }

    #[test]
    fn join_natural_forms() {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        assert_eq!(join_natural(&s(&[])), "");
        assert_eq!(join_natural(&s(&["a"])), "a");
        assert_eq!(join_natural(&s(&["a", "b"])), "a and b");
        assert_eq!(join_natural(&s(&["a", "b", "c"])), "a, b and c");
    }

    #[test]
    fn evidence_count_bonuses() {
        let config = ExplanationConfig::default();
        let source = ResultSource::Detector(LocationMethod::Landmark);

        let two = apply_confidence_bonuses(0.5, &explanation_with(2), source, &config);
        assert_eq!(two, 0.5);

        let three = apply_confidence_bonuses(0.5, &explanation_with(3), source, &config);
        assert!((three - 0.6).abs() < 1e-9);

        let five = apply_confidence_bonuses(0.5, &explanation_with(5), source, &config);
        assert!((five - 0.65).abs() < 1e-9);

        let capped = apply_confidence_bonuses(0.9, &explanation_with(3), source, &config);
        assert!((capped - 0.95).abs() < 1e-9);

        let capped_extensive = apply_confidence_bonuses(0.9, &explanation_with(5), source, &config);
        assert!((capped_extensive - 0.98).abs() < 1e-9, "got {capped_extensive}");
    }

    #[test]
    fn bonus_never_lowers_confidence() {
        let config = ExplanationConfig::default();
        let source = ResultSource::Detector(LocationMethod::Landmark);
        let out = apply_confidence_bonuses(0.97, &explanation_with(3), source, &config);
        assert_eq!(out, 0.97);
    }

    #[test]
    fn strong_street_view_bonus() {
        let config = ExplanationConfig::default();
        let sv = ResultSource::Detector(LocationMethod::StreetViewMatch);
        let strong = apply_confidence_bonuses(0.89, &explanation_with(0), sv, &config);
        assert!((strong - 0.98).abs() < 1e-9, "got {strong}");
        let weak = apply_confidence_bonuses(0.88, &explanation_with(0), sv, &config);
        assert_eq!(weak, 0.88);
    }

    #[test]
    fn ocr_with_shop_sign_bonus() {
        let config = ExplanationConfig::default();
        let ocr = ResultSource::Detector(LocationMethod::OcrGeocoding);
        let with_sign = Explanation {
            summary: String::new(),
            evidence: vec![item(EvidenceKind::ShopSign, "Tabac", 0.6)],
        };
        let out = apply_confidence_bonuses(0.6, &with_sign, ocr, &config);
        assert!((out - 0.7).abs() < 1e-9);

        let without = apply_confidence_bonuses(0.6, &explanation_with(1), ocr, &config);
        assert_eq!(without, 0.6);
    }

    #[test]
    fn consolidated_source_gets_no_method_bonus() {
        let config = ExplanationConfig::default();
        let out = apply_confidence_bonuses(
            0.9,
            &explanation_with(0),
            ResultSource::Consolidated,
            &config,
        );
        assert_eq!(out, 0.9);
    }
}
