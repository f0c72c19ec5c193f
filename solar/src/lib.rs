//! Sun times and position oracle.
//!
//! Wraps the NREL SPA implementation from [`solar_positioning`] and
//! reduces it to the handful of facts the pipeline needs: the event
//! times around the requested date and the sun's compass azimuth and
//! altitude at the moment it meets the horizon.
//!
//! Azimuth convention everywhere in this crate: degrees clockwise from
//! true north, normalized into [0, 360).

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use solar_positioning::{
    spa,
    time::DeltaT,
    types::{RefractionCorrection, SunriseResult},
    Horizon,
};
use std::str::FromStr;
use thiserror::Error;

/// Sun elevation marking the edge of golden hour, in degrees.
const GOLDEN_HOUR_ELEVATION_DEG: f64 = 6.0;

#[derive(Error, Debug)]
pub enum SolarError {
    /// The requested event does not happen on this date (polar day or
    /// polar night).
    #[error("no {0} on the requested date at this latitude")]
    NoEvent(&'static str),

    #[error("ephemeris failure: {0}")]
    Ephemeris(String),
}

/// Which horizon crossing the user cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SunMode {
    Sunset,
    Sunrise,
}

impl SunMode {
    pub fn label(self) -> &'static str {
        match self {
            SunMode::Sunset => "sunset",
            SunMode::Sunrise => "sunrise",
        }
    }
}

impl FromStr for SunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sunset" => Ok(SunMode::Sunset),
            "sunrise" => Ok(SunMode::Sunrise),
            other => Err(format!("unknown mode {other:?}, expected sunset or sunrise")),
        }
    }
}

/// Solar facts for one location and date.
#[derive(Debug, Clone, Serialize)]
pub struct SunData {
    pub mode: SunMode,

    /// The instant analyzed by the viewshed: sunset or sunrise
    /// depending on `mode`.
    pub target_time: DateTime<Utc>,

    pub sunrise_time: DateTime<Utc>,
    pub sunset_time: DateTime<Utc>,
    pub solar_noon: DateTime<Utc>,

    /// Civil twilight boundaries. Absent when the sun never crosses
    /// -6° on this date.
    pub dawn: Option<DateTime<Utc>>,
    pub dusk: Option<DateTime<Utc>>,

    /// Golden hour around the target event. Absent when the sun never
    /// climbs above +6° on this date.
    pub golden_hour_start: Option<DateTime<Utc>>,
    pub golden_hour_end: Option<DateTime<Utc>>,

    /// Compass azimuth of the sun at `target_time`, [0, 360).
    pub azimuth_deg: f64,

    /// Altitude of the sun at `target_time`, degrees above the
    /// horizon.
    pub altitude_deg: f64,
}

/// Solver context for one location and date.
///
/// Mirrors the usual SPA calling sequence: resolve ΔT once, then reuse
/// it for transit, event, and position queries.
struct SolarCalc {
    lat: f64,
    lng: f64,
    delta_t: f64,
}

impl SolarCalc {
    fn new(lat: f64, lng: f64, date: DateTime<Utc>) -> Result<Self, SolarError> {
        let delta_t = DeltaT::estimate_from_date(date.year(), date.month())
            .map_err(|e| SolarError::Ephemeris(e.to_string()))?;
        Ok(Self { lat, lng, delta_t })
    }

    fn events_for_horizon(
        &self,
        date: DateTime<Utc>,
        horizon: Horizon,
    ) -> Result<SunriseResult<DateTime<Utc>>, SolarError> {
        spa::sunrise_sunset_for_horizon(date, self.lat, self.lng, self.delta_t, horizon)
            .map_err(|e| SolarError::Ephemeris(e.to_string()))
    }

    /// Sun altitude above the horizon at `t`, in degrees.
    fn altitude_deg(&self, t: DateTime<Utc>) -> Result<f64, SolarError> {
        self.position(t).map(|(_, altitude)| altitude)
    }

    /// (compass azimuth, altitude) at `t`, in degrees.
    fn position(&self, t: DateTime<Utc>) -> Result<(f64, f64), SolarError> {
        let position = spa::solar_position(
            t,
            self.lat,
            self.lng,
            0.0,
            self.delta_t,
            Some(RefractionCorrection::standard()),
        )
        .map_err(|e| SolarError::Ephemeris(e.to_string()))?;
        Ok((
            position.azimuth().rem_euclid(360.0),
            position.elevation_angle(),
        ))
    }

    /// Finds the instant in (a, b) where the sun crosses
    /// `target_deg`, by bisection on altitude. Returns `None` when
    /// the altitude does not change sign over the interval.
    fn crossing(
        &self,
        target_deg: f64,
        mut a: DateTime<Utc>,
        mut b: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SolarError> {
        let mut fa = self.altitude_deg(a)? - target_deg;
        let fb = self.altitude_deg(b)? - target_deg;

        if !fa.is_finite() || !fb.is_finite() || fa.signum() == fb.signum() {
            return Ok(None);
        }

        for _ in 0..60 {
            let m = a + (b - a) / 2;
            let fm = self.altitude_deg(m)? - target_deg;
            if !fm.is_finite() {
                return Ok(None);
            }
            if fm.abs() < 1e-7 {
                return Ok(Some(m));
            }
            if fm.signum() == fa.signum() {
                a = m;
                fa = fm;
            } else {
                b = m;
            }
        }

        Ok(Some(a))
    }
}

/// Computes [`SunData`] for the given location, date, and mode.
///
/// `date` should be around local noon of the day of interest so the
/// SPA event search lands on the intended calendar day.
pub fn sun_data(
    lat: f64,
    lng: f64,
    date: DateTime<Utc>,
    mode: SunMode,
) -> Result<SunData, SolarError> {
    let calc = SolarCalc::new(lat, lng, date)?;

    let (sunrise_time, solar_noon, sunset_time) =
        match calc.events_for_horizon(date, Horizon::SunriseSunset)? {
            SunriseResult::RegularDay {
                sunrise,
                transit,
                sunset,
            } => (sunrise, transit, sunset),
            SunriseResult::AllDay { .. } | SunriseResult::AllNight { .. } => {
                return Err(SolarError::NoEvent(mode.label()));
            }
        };

    let (dawn, dusk) = match calc.events_for_horizon(date, Horizon::CivilTwilight)? {
        SunriseResult::RegularDay {
            sunrise, sunset, ..
        } => (Some(sunrise), Some(sunset)),
        _ => (None, None),
    };

    // The sun crosses +6° twice on a regular day: once climbing after
    // sunrise, once descending before sunset.
    let morning_golden_end =
        calc.crossing(GOLDEN_HOUR_ELEVATION_DEG, sunrise_time, solar_noon)?;
    let evening_golden_start =
        calc.crossing(GOLDEN_HOUR_ELEVATION_DEG, solar_noon, sunset_time + Duration::hours(1))?;

    let (target_time, golden_hour_start, golden_hour_end) = match mode {
        SunMode::Sunset => (sunset_time, evening_golden_start, Some(sunset_time)),
        SunMode::Sunrise => (sunrise_time, Some(sunrise_time), morning_golden_end),
    };

    let (azimuth_deg, altitude_deg) = calc.position(target_time)?;

    Ok(SunData {
        mode,
        target_time,
        sunrise_time,
        sunset_time,
        solar_noon,
        dawn,
        dusk,
        golden_hour_start,
        golden_hour_end,
        azimuth_deg,
        altitude_deg,
    })
}
