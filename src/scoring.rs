//! Performance-vs-target scoring
//!
//! Every dashboard classifies an `(actual, target)` pair the same way:
//! the ratio as a percentage, bucketed at fixed cut points.
//!
//! A zero target (or any pair whose ratio is not finite) scores `0` and
//! `Poor`; there is no meaningful attainment against nothing.

use serde::{Deserialize, Serialize};

/// At or above this percentage of target is `Excellent`
pub const EXCELLENT_THRESHOLD: f64 = 95.0;
/// At or above this percentage of target is `Good`
pub const GOOD_THRESHOLD: f64 = 80.0;
/// At or above this percentage of target is `Warning`
pub const WARNING_THRESHOLD: f64 = 60.0;

/// Qualitative attainment bucket, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLevel {
    Poor,
    Warning,
    Good,
    Excellent,
}

impl ScoreLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreLevel::Poor => "poor",
            ScoreLevel::Warning => "warning",
            ScoreLevel::Good => "good",
            ScoreLevel::Excellent => "excellent",
        }
    }

    /// Bucket for an already-computed percentage of target
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= EXCELLENT_THRESHOLD {
            ScoreLevel::Excellent
        } else if percentage >= GOOD_THRESHOLD {
            ScoreLevel::Good
        } else if percentage >= WARNING_THRESHOLD {
            ScoreLevel::Warning
        } else {
            ScoreLevel::Poor
        }
    }
}

/// `actual / target * 100`, or `None` when the target is zero or the
/// result is not finite
pub fn attainment(actual: f64, target: f64) -> Option<f64> {
    if target == 0.0 {
        return None;
    }
    let percentage = actual / target * 100.0;
    percentage.is_finite().then_some(percentage)
}

/// Classify `actual` against `target`
pub fn score_level(actual: f64, target: f64) -> ScoreLevel {
    attainment(actual, target).map_or(ScoreLevel::Poor, ScoreLevel::from_percentage)
}

/// Whole-number percentage of target; may exceed 100 or go negative
pub fn score_percentage(actual: f64, target: f64) -> i64 {
    attainment(actual, target).map_or(0, |p| js_round(p) as i64)
}

/// Display color for a level
pub fn score_color(level: ScoreLevel) -> &'static str {
    match level {
        ScoreLevel::Excellent => "#10B981",
        ScoreLevel::Good => "#3B82F6",
        ScoreLevel::Warning => "#F59E0B",
        ScoreLevel::Poor => "#EF4444",
    }
}

/// Round half toward positive infinity (`Math.round` semantics)
pub fn js_round(value: f64) -> f64 {
    // `round` sends halves away from zero; negative halves go back up by one
    let rounded = value.round();
    if value - rounded == 0.5 { rounded + 1.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(score_level(95.0, 100.0), ScoreLevel::Excellent);
        assert_eq!(score_level(94.99, 100.0), ScoreLevel::Good);
        assert_eq!(score_level(80.0, 100.0), ScoreLevel::Good);
        assert_eq!(score_level(79.99, 100.0), ScoreLevel::Warning);
        assert_eq!(score_level(60.0, 100.0), ScoreLevel::Warning);
        assert_eq!(score_level(59.99, 100.0), ScoreLevel::Poor);
    }

    #[test]
    fn test_over_achievement_not_clamped() {
        assert_eq!(score_percentage(150.0, 100.0), 150);
        assert_eq!(score_level(150.0, 100.0), ScoreLevel::Excellent);
    }

    #[test]
    fn test_negative_actual() {
        assert_eq!(score_percentage(-20.0, 100.0), -20);
        assert_eq!(score_level(-20.0, 100.0), ScoreLevel::Poor);
    }

    #[test]
    fn test_zero_target_policy() {
        assert_eq!(score_percentage(50.0, 0.0), 0);
        assert_eq!(score_percentage(0.0, 0.0), 0);
        assert_eq!(score_level(50.0, 0.0), ScoreLevel::Poor);
        assert_eq!(score_level(f64::NAN, 100.0), ScoreLevel::Poor);
    }

    #[test]
    fn test_rounding_matches_math_round() {
        assert_eq!(score_percentage(1.0, 8.0), 13); // 12.5
        assert_eq!(score_percentage(-1.0, 8.0), -12); // -12.5
        assert_eq!(score_percentage(2.0, 3.0), 67);
    }

    #[test]
    fn test_js_round_near_half() {
        assert_eq!(js_round(0.49999999999999994), 0.0);
        assert_eq!(js_round(-0.49999999999999994), 0.0);
        assert_eq!(js_round(-0.5), 0.0);
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert_eq!(js_round(-2.6), -3.0);
        assert_eq!(js_round(4_503_599_627_370_497.0), 4_503_599_627_370_497.0);
        assert!(js_round(f64::NAN).is_nan());
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(ScoreLevel::Poor < ScoreLevel::Warning);
        assert!(ScoreLevel::Warning < ScoreLevel::Good);
        assert!(ScoreLevel::Good < ScoreLevel::Excellent);
    }

    #[test]
    fn test_colors_are_distinct() {
        let colors = [
            ScoreLevel::Poor,
            ScoreLevel::Warning,
            ScoreLevel::Good,
            ScoreLevel::Excellent,
        ]
        .map(score_color);
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ScoreLevel::Warning).unwrap(), "\"warning\"");
    }

    proptest! {
        #[test]
        fn prop_level_monotonic_in_actual(a in 0.0f64..500.0, b in 0.0f64..500.0, target in 1.0f64..1000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(score_level(lo, target) <= score_level(hi, target));
        }

        #[test]
        fn prop_percentage_tracks_ratio(actual in -1.0e6f64..1.0e6, target in 1.0f64..1.0e6) {
            let exact = actual / target * 100.0;
            prop_assert!((score_percentage(actual, target) as f64 - exact).abs() <= 0.5 + 1e-9);
        }
    }
}
