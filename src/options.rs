use anyhow::{anyhow, Error as AnyError};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use geodesy::LatLng;
use solar::SunMode;
use std::str::FromStr;

/// Find terrain-clear sunset and sunrise viewpoints around a location.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Center "lat,lng" in decimal degrees.
    #[arg(long, conflicts_with = "place")]
    pub center: Option<CenterArg>,

    /// Free-text place query, resolved through the geocoder.
    #[arg(long)]
    pub place: Option<String>,

    /// Search radius in kilometers.
    #[arg(short, long, default_value_t = 10.0)]
    pub radius_km: f64,

    /// Date to analyze (YYYY-MM-DD). Defaults to today.
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Which horizon crossing to analyze.
    #[arg(short, long, default_value = "sunset")]
    pub mode: SunMode,

    /// Where elevations come from.
    #[arg(long, value_enum, default_value_t = BackendChoice::Tiles)]
    pub backend: BackendChoice,

    /// Candidate grid spacing in meters.
    #[arg(long, default_value_t = viewshed::DEFAULT_GRID_SPACING_M)]
    pub spacing: f64,

    /// How many ranked candidates to print.
    #[arg(short, long, default_value_t = 10)]
    pub top: usize,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendChoice {
    /// Terrarium terrain tiles.
    Tiles,
    /// Batched elevation APIs.
    Api,
}

#[derive(Debug, Subcommand, Clone, Copy)]
pub enum Command {
    /// Print a ranked table (default).
    Table,

    /// Print the full result as JSON.
    Json,
}

#[derive(Clone, Copy, Debug)]
pub struct CenterArg(pub LatLng);

impl FromStr for CenterArg {
    type Err = AnyError;

    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_str, lng_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lng"))?;
        let lat = f64::from_str(lat_str.trim())?;
        let lng = f64::from_str(lng_str.trim())?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(anyhow!("latitude {lat} out of [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(anyhow!("longitude {lng} out of [-180, 180]"));
        }
        Ok(Self(LatLng::new(lat, lng)))
    }
}
