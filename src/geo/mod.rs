pub mod geocoder;

pub use geocoder::{Geocoder, DEFAULT_GEOCODER_URL};

use crate::error::ScrapeError;
use crate::models::{Coords, Position, RawListing};
use geocoder::parse_finite;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Marker-group tag the target page puts in front of its position tokens
pub const DEFAULT_TOKEN_PREFIX: &str = "group_";

/// Decode a marker position token into `(lat, lon)`.
///
/// After stripping `prefix`, the token is comma separated and its last two
/// fields are longitude then latitude. A tag glued to the longitude field
/// (`cluster_39.70`) is dropped as well.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] for fewer than two fields or non-finite numbers.
pub fn parse_position_token(token: &str, prefix: &str) -> Result<Coords, ScrapeError> {
    let body = token.trim();
    let body = body.strip_prefix(prefix).unwrap_or(body);

    let fields: Vec<&str> = body.split(',').collect();
    let [.., lon, lat] = fields.as_slice() else {
        return Err(ScrapeError::Parse(format!("malformed position token {token:?}")));
    };
    let lon = lon.rsplit('_').next().unwrap_or(*lon);

    let lon = parse_finite(lon)?;
    let lat = parse_finite(lat)?;
    Ok(Coords(lat, lon))
}

/// Turns extracted positions into coordinates.
///
/// Every failure degrades to `None`; nothing here aborts a refresh.
pub struct CoordinateResolver {
    geocoder: Option<Geocoder>,
    token_prefix: String,
}

impl CoordinateResolver {
    pub fn new(geocoder: Option<Geocoder>, token_prefix: impl Into<String>) -> Self {
        Self {
            geocoder,
            token_prefix: token_prefix.into(),
        }
    }

    /// Resolve a single position.
    pub async fn resolve(&self, position: &Position) -> Option<Coords> {
        match position {
            Position::Token(token) => match parse_position_token(token, &self.token_prefix) {
                Ok(coords) => Some(coords),
                Err(e) => {
                    warn!("Ignoring position token {:?}: {}", token, e);
                    None
                }
            },
            Position::Address(address) => self.geocode(address).await,
            Position::Unknown => None,
        }
    }

    /// Resolve coordinates for a whole scrape, in order.
    ///
    /// Each distinct address is geocoded at most once; a `None` result is
    /// reused rather than retried.
    pub async fn resolve_all(&self, listings: &[RawListing]) -> Vec<Option<Coords>> {
        if self.geocoder.is_none()
            && listings
                .iter()
                .any(|l| matches!(l.position, Position::Address(_)))
        {
            info!("No geocoder API key configured; address listings keep null coordinates");
        }

        let mut memo: HashMap<&str, Option<Coords>> = HashMap::new();
        let mut resolved = Vec::with_capacity(listings.len());

        for listing in listings {
            let coords = match &listing.position {
                Position::Address(address) => {
                    if let Some(cached) = memo.get(address.as_str()) {
                        *cached
                    } else {
                        let coords = self.geocode(address).await;
                        memo.insert(address.as_str(), coords);
                        coords
                    }
                }
                other => self.resolve(other).await,
            };
            resolved.push(coords);
        }

        resolved
    }

    async fn geocode(&self, address: &str) -> Option<Coords> {
        let geocoder = self.geocoder.as_ref()?;

        match geocoder.geocode(address).await {
            Ok(Some(coords)) => {
                debug!("Geocoded {:?} -> {:?}", address, coords);
                Some(coords)
            }
            Ok(None) => {
                warn!("Geocoder found nothing for {:?}", address);
                None
            }
            Err(e) => {
                warn!("Geocoding {:?} failed: {}", address, e);
                None
            }
        }
    }
}
