//! Score fusion utilities (SPEC_FULL §C.3, grounded on
//! `retrieval-pipeline/src/scoring.rs`'s `clamp_unit`/`distance_to_similarity`/
//! `min_max_normalize`) and the composite-score formula itself (spec §4.4).

/// Clamps a score into `[0, 1]`.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Converts a distance (e.g. cosine distance) into a bounded similarity in
/// `[0, 1]`; non-finite input maps to `0.0`.
#[must_use]
pub fn distance_to_similarity(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    clamp_unit(1.0 / (1.0 + distance.max(0.0)))
}

/// Min-max normalizes `scores` into `[0, 1]`; non-finite entries normalize to
/// `0.0`, and a zero-range input (all scores equal) normalizes to all `1.0`.
#[must_use]
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for s in scores {
        if !s.is_finite() {
            continue;
        }
        if *s < min {
            min = *s;
        }
        if *s > max {
            max = *s;
        }
    }

    if !min.is_finite() || !max.is_finite() {
        return scores.iter().map(|_| 0.0).collect();
    }
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }

    scores
        .iter()
        .map(|score| if score.is_finite() { clamp_unit((score - min) / (max - min)) } else { 0.0 })
        .collect()
}

/// The source weight term of the composite formula: web-search provenance is
/// discounted slightly relative to every other knowledge source (spec §4.4).
#[must_use]
pub fn source_weight(knowledge_source: &str) -> f32 {
    if knowledge_source == "web_search" {
        0.95
    } else {
        1.0
    }
}

/// The position-prior term: chunks near the start of their source document
/// get a small boost, chunks near the end a small penalty, within
/// `[-0.05, +0.05]`; a negative `start` (unknown span) disables the prior.
#[must_use]
pub fn position_prior(start_at: i64, end_at: i64) -> f32 {
    if start_at < 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = 1.0 - (start_at as f32) / (end_at as f32 + 1.0);
    1.0 + ratio.clamp(-0.05, 0.05)
}

/// The composite score formula (spec §4.4):
/// `(0.6*model_score + 0.3*base_score + 0.1*source_weight) * position_prior`,
/// clamped to `[0, 1]`.
#[must_use]
pub fn composite_score(model_score: f32, base_score: f32, knowledge_source: &str, start_at: i64, end_at: i64) -> f32 {
    let weighted = 0.6 * model_score + 0.3 * base_score + 0.1 * source_weight(knowledge_source);
    clamp_unit(weighted * position_prior(start_at, end_at))
}

#[cfg(test)]
mod tests {
    use super::{clamp_unit, composite_score, distance_to_similarity, min_max_normalize, position_prior, source_weight};

    #[test]
    fn clamp_unit_bounds_both_sides() {
        assert_eq!(clamp_unit(-1.0), 0.0);
        assert_eq!(clamp_unit(2.0), 1.0);
        assert_eq!(clamp_unit(0.5), 0.5);
    }

    #[test]
    fn distance_to_similarity_handles_non_finite() {
        assert_eq!(distance_to_similarity(f32::NAN), 0.0);
        assert!(distance_to_similarity(0.0) > 0.99);
    }

    #[test]
    fn min_max_normalize_handles_zero_range() {
        assert_eq!(min_max_normalize(&[0.5, 0.5, 0.5]), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn min_max_normalize_spans_full_range() {
        let out = min_max_normalize(&[1.0, 2.0, 3.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn web_search_source_is_discounted() {
        assert_eq!(source_weight("web_search"), 0.95);
        assert_eq!(source_weight("kb"), 1.0);
    }

    #[test]
    fn negative_start_disables_position_prior() {
        assert_eq!(position_prior(-1, 100), 1.0);
    }

    #[test]
    fn position_prior_is_bounded() {
        let p = position_prior(0, 10);
        assert!((0.95..=1.05).contains(&p));
    }

    #[test]
    fn composite_score_is_clamped_to_unit_interval() {
        let c = composite_score(1.0, 1.0, "kb", 0, 100);
        assert!((0.0..=1.0).contains(&c));
        let c_low = composite_score(0.0, 0.0, "web_search", 0, 100);
        assert!((0.0..=1.0).contains(&c_low));
    }
}
