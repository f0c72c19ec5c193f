//! Result rendering for the terminal.

use anyhow::Result;
use geodesy::azimuth_to_compass;
use serde::Serialize;
use solar::SunMode;
use viewshed::{score_color, verdict, PipelineOutput, ScoredCandidate};

pub fn print_table(output: &PipelineOutput, top: usize, mode: SunMode) {
    let sun = &output.sun;
    println!(
        "{} {} UTC, azimuth {:.1}\u{b0} ({}), altitude {:+.1}\u{b0}",
        mode.label(),
        sun.target_time.format("%Y-%m-%d %H:%M"),
        sun.azimuth_deg,
        azimuth_to_compass(sun.azimuth_deg),
        sun.altitude_deg,
    );
    if let (Some(start), Some(end)) = (sun.golden_hour_start, sun.golden_hour_end) {
        println!(
            "golden hour {} \u{2013} {} UTC",
            start.format("%H:%M"),
            end.format("%H:%M")
        );
    }
    println!();

    println!(
        "{:>4} {:>5}  {:>10} {:>11} {:>7}  {}",
        "rank", "score", "lat", "lng", "elev", "verdict"
    );
    for candidate in output.candidates.iter().take(top) {
        let point = candidate.analysis.candidate.point;
        println!(
            "{:>4} {:>5}  {:>10.5} {:>11.5} {:>6.0}m  {}",
            candidate.rank,
            candidate.score,
            point.lat,
            point.lng,
            candidate.analysis.candidate.elevation_m,
            verdict(candidate, mode),
        );
    }
    if output.candidates.len() > top {
        println!("... and {} more", output.candidates.len() - top);
    }
}

#[derive(Serialize)]
struct JsonCandidate<'a> {
    #[serde(flatten)]
    candidate: &'a ScoredCandidate,
    color: &'static str,
    verdict: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    sun: &'a solar::SunData,
    candidates: Vec<JsonCandidate<'a>>,
}

pub fn print_json(output: &PipelineOutput, top: usize, mode: SunMode) -> Result<()> {
    let report = JsonReport {
        sun: &output.sun,
        candidates: output
            .candidates
            .iter()
            .take(top)
            .map(|candidate| JsonCandidate {
                candidate,
                color: score_color(candidate.score),
                verdict: verdict(candidate, mode),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
