//! Composite candidate scoring and ranking.

use crate::engine::Analysis;
use geodesy::{haversine_m, LatLng};
use serde::Serialize;
use solar::SunMode;

/// Context the score depends on beyond the candidate itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoreParams {
    /// Search center; scores reward proximity to it. Without one,
    /// every candidate gets a flat middle proximity component.
    pub center: Option<LatLng>,

    /// Search radius used to normalize the proximity component.
    pub max_radius_m: f64,
}

/// A ranked pipeline result.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub analysis: Analysis,

    /// Composite quality, 0-100.
    pub score: u8,

    /// 1-based position in the ranked list.
    pub rank: u32,
}

/// Scores one candidate.
///
/// Four components summed then clamped into [0, 100]:
/// obstruction (0-40), elevation (0-30), proximity to the search
/// center (0-15), and how far below the horizon the terrain sits
/// (0-15).
pub fn score(analysis: &Analysis, params: &ScoreParams) -> u8 {
    let angle = analysis.obstruction.obstruction_angle_deg;

    // Deeper sub-horizon terrain scores higher; for candidates that
    // already cleared the margin this saturates at the full 40.
    let obstruction_pts = if analysis.obstruction.is_clear {
        (40.0 + 4.0 * -angle).clamp(0.0, 40.0)
    } else {
        (20.0 - 4.0 * angle).max(0.0)
    };

    let elevation_pts = 30.0 * (analysis.candidate.elevation_m / 1_000.0).clamp(0.0, 1.0);

    let proximity_pts = match params.center {
        Some(center) => {
            let d = haversine_m(center, analysis.candidate.point);
            15.0 * (1.0 - (d / params.max_radius_m).min(1.0))
        }
        None => 10.0,
    };

    let margin_pts = if angle < 0.0 {
        (5.0 * angle.abs()).min(15.0)
    } else {
        0.0
    };

    (obstruction_pts + elevation_pts + proximity_pts + margin_pts)
        .clamp(0.0, 100.0)
        .round() as u8
}

/// Scores every analysis and returns them ordered best-first with
/// dense 1..=N ranks. Ties keep their incoming relative order.
pub fn rank(analyses: Vec<Analysis>, params: &ScoreParams) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = analyses
        .into_iter()
        .map(|analysis| {
            let score = score(&analysis, params);
            ScoredCandidate {
                analysis,
                score,
                rank: 0,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, candidate) in scored.iter_mut().enumerate() {
        candidate.rank = i as u32 + 1;
    }
    scored
}

/// One-line human explanation of a candidate's result.
pub fn verdict(candidate: &ScoredCandidate, mode: SunMode) -> String {
    let obstruction = &candidate.analysis.obstruction;
    if obstruction.is_clear {
        format!(
            "Unobstructed {} view from {:.0}m elevation",
            mode.label(),
            candidate.analysis.candidate.elevation_m
        )
    } else {
        format!(
            "Blocked by terrain {} away ({:.1}\u{b0} obstruction)",
            format_distance(obstruction.max_blocker_distance_m),
            obstruction.obstruction_angle_deg
        )
    }
}

fn format_distance(meters: f64) -> String {
    if meters < 1_000.0 {
        format!("{meters:.0}m")
    } else {
        format!("{:.1}km", meters / 1_000.0)
    }
}

/// Display color for a score, one of four quality bands.
pub fn score_color(score: u8) -> &'static str {
    match score {
        70..=u8::MAX => "#22c55e",
        50..=69 => "#eab308",
        30..=49 => "#f97316",
        _ => "#ef4444",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Obstruction, ViewQuality};
    use crate::Candidate;

    const CENTER: LatLng = LatLng {
        lat: 45.5231,
        lng: -122.6765,
    };

    fn analysis(point: LatLng, elevation_m: f64, angle_deg: f64) -> Analysis {
        let is_clear = angle_deg < 0.5;
        Analysis {
            candidate: Candidate { point, elevation_m },
            obstruction: Obstruction {
                obstruction_angle_deg: angle_deg,
                max_blocker_distance_m: if angle_deg > -90.0 { 1_000.0 } else { 0.0 },
                max_blocker_elevation_m: elevation_m + 10.0,
                is_clear,
            },
            sun_azimuth_deg: 300.0,
            sun_altitude_deg: -0.3,
            view_quality: if is_clear {
                ViewQuality::Clear
            } else {
                ViewQuality::Obstructed
            },
        }
    }

    fn params() -> ScoreParams {
        ScoreParams {
            center: Some(CENTER),
            max_radius_m: 10_000.0,
        }
    }

    #[test]
    fn test_score_stays_in_range() {
        let params = params();
        for elevation in [-100.0, 0.0, 500.0, 3_000.0] {
            for angle in [-90.0, -3.0, 0.0, 0.4, 2.0, 45.0] {
                let s = score(&analysis(CENTER, elevation, angle), &params);
                assert!(s <= 100);
            }
        }
    }

    #[test]
    fn test_clear_beats_obstructed() {
        let params = params();
        let clear = score(&analysis(CENTER, 200.0, -1.0), &params);
        let blocked = score(&analysis(CENTER, 200.0, 5.0), &params);
        assert!(clear > blocked);
    }

    #[test]
    fn test_higher_elevation_wins_at_equal_clearance() {
        let params = params();
        let high = score(&analysis(CENTER, 800.0, -1.0), &params);
        let low = score(&analysis(CENTER, 100.0, -1.0), &params);
        assert!(high > low);
    }

    #[test]
    fn test_closer_to_center_wins() {
        let params = params();
        let far_point = geodesy::destination_point(CENTER, 90.0, 9_000.0);
        let near = score(&analysis(CENTER, 200.0, -1.0), &params);
        let far = score(&analysis(far_point, 200.0, -1.0), &params);
        assert!(near > far);
    }

    #[test]
    fn test_no_center_uses_flat_proximity() {
        let no_center = ScoreParams {
            center: None,
            max_radius_m: 10_000.0,
        };
        let a = analysis(CENTER, 0.0, 10.0);
        // Obstructed at 10°: 0 obstruction pts, 0 elevation, 0 margin,
        // flat 10 proximity.
        assert_eq!(score(&a, &no_center), 10);
    }

    #[test]
    fn test_rank_is_dense_and_descending() {
        let params = params();
        let analyses = vec![
            analysis(CENTER, 100.0, 5.0),
            analysis(CENTER, 900.0, -2.0),
            analysis(CENTER, 400.0, -0.5),
            analysis(CENTER, 0.0, 30.0),
        ];
        let ranked = rank(analyses, &params);

        let ranks: Vec<u32> = ranked.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // The 900 m clear candidate dominates every component.
        assert_eq!(ranked[0].analysis.candidate.elevation_m, 900.0);
    }

    #[test]
    fn test_verdict_formats_distance() {
        let params = params();
        let mut ranked = rank(vec![analysis(CENTER, 100.0, 2.5)], &params);
        ranked[0].analysis.obstruction.max_blocker_distance_m = 3_200.0;
        let text = verdict(&ranked[0], SunMode::Sunset);
        assert!(text.contains("Blocked"));
        assert!(text.contains("3.2km"));

        ranked[0].analysis.obstruction.max_blocker_distance_m = 500.0;
        let text = verdict(&ranked[0], SunMode::Sunset);
        assert!(text.contains("500m"));
    }

    #[test]
    fn test_verdict_when_clear() {
        let params = params();
        let ranked = rank(vec![analysis(CENTER, 320.0, -1.2)], &params);
        let text = verdict(&ranked[0], SunMode::Sunset);
        assert!(text.contains("Unobstructed sunset view"));
        assert!(text.contains("320m"));
    }

    #[test]
    fn test_score_color_bands() {
        assert_eq!(score_color(80), "#22c55e");
        assert_eq!(score_color(55), "#eab308");
        assert_eq!(score_color(35), "#f97316");
        assert_eq!(score_color(10), "#ef4444");
    }
}
