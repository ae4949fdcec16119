//! HTTP client for a Yandex-style geocoder.
//!
//! The provider answers with
//! `response.GeoObjectCollection.featureMember[].GeoObject.Point.pos`, where
//! `pos` is `"<lon> <lat>"`.

use crate::error::ScrapeError;
use crate::models::Coords;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GEOCODER_URL: &str = "https://geocode-maps.yandex.ru/1.x/";

#[derive(Debug, Deserialize)]
struct GeocodeEnvelope {
    response: GeocodeResponse,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Debug, Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    pos: String,
}

/// Geocoding collaborator: free-text address in, coordinates out
pub struct Geocoder {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Geocoder {
    /// # Errors
    ///
    /// Returns [`ScrapeError::GeocodeUnavailable`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::GeocodeUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Look up `address`. `Ok(None)` means the provider found nothing.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::GeocodeUnavailable`] for network failures and non-2xx
    /// statuses, [`ScrapeError::Parse`] for a malformed body or position.
    pub async fn geocode(&self, address: &str) -> Result<Option<Coords>, ScrapeError> {
        debug!("Geocoding {:?}", address);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("geocode", address),
                ("format", "json"),
                ("results", "1"),
            ])
            .send()
            .await
            .map_err(|e| ScrapeError::GeocodeUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::GeocodeUnavailable(format!(
                "geocoder returned status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::GeocodeUnavailable(e.to_string()))?;
        let envelope: GeocodeEnvelope = serde_json::from_str(&body)
            .map_err(|e| ScrapeError::Parse(format!("unexpected geocoder response: {e}")))?;

        match envelope.response.collection.members.first() {
            Some(member) => parse_pos(&member.geo_object.point.pos).map(Some),
            None => Ok(None),
        }
    }
}

/// Parse a `"<lon> <lat>"` position string into `(lat, lon)`.
pub fn parse_pos(pos: &str) -> Result<Coords, ScrapeError> {
    let mut parts = pos.split_whitespace();
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ScrapeError::Parse(format!("malformed position {pos:?}")));
    };

    let lon = parse_finite(lon)?;
    let lat = parse_finite(lat)?;
    Ok(Coords(lat, lon))
}

pub(crate) fn parse_finite(value: &str) -> Result<f64, ScrapeError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScrapeError::Parse(format!("not a finite number: {value:?}")))
}
