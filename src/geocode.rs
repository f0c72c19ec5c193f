//! Free-text place lookup through Nominatim.
//!
//! Rate limiting is the service's concern (1 req/s); the CLI issues a
//! single lookup per invocation.

use geodesy::LatLng;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("no results for {0:?}")]
    LocationNotFound(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("malformed geocoder response: {0}")]
    Payload(String),
}

pub struct Place {
    pub point: LatLng,
    pub display_name: String,
}

#[derive(Deserialize)]
struct NominatimResult {
    // Nominatim serializes coordinates as strings.
    lat: String,
    lon: String,
    display_name: String,
}

pub async fn search(query: &str) -> Result<Place, GeocodeError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("sunscout/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()?;

    let results: Vec<NominatimResult> = client
        .get(NOMINATIM_URL)
        .query(&[("q", query), ("format", "json"), ("limit", "1")])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| GeocodeError::LocationNotFound(query.to_string()))?;

    let lat = first
        .lat
        .parse()
        .map_err(|_| GeocodeError::Payload(format!("latitude {:?}", first.lat)))?;
    let lng = first
        .lon
        .parse()
        .map_err(|_| GeocodeError::Payload(format!("longitude {:?}", first.lon)))?;

    Ok(Place {
        point: LatLng::new(lat, lng),
        display_name: first.display_name,
    })
}
