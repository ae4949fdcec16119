use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair, serialized as `[lat, lon]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coords(pub f64, pub f64);

/// Where a listing sits, as found on the page
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    /// Encoded marker identifier, e.g. `group_39.70,55.75`
    Token(String),
    /// Free-text street address
    Address(String),
    /// Nothing usable on the page
    Unknown,
}

/// Listing as extracted from the page, before coordinates are resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RawListing {
    pub title: String,
    pub price: String,
    pub image_urls: Vec<String>,
    pub position: Position,
}

/// Core listing data model served by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: u32,
    pub title: String,
    pub price: String,
    pub image_urls: Vec<String>,
    pub coords: Option<Coords>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Listing {
    /// Build a listing from its raw form. `index` is the zero-based position
    /// after skipped containers were removed.
    pub fn from_raw(index: usize, raw: RawListing, coords: Option<Coords>) -> Self {
        let address = match raw.position {
            Position::Address(address) => Some(address),
            Position::Token(_) | Position::Unknown => None,
        };

        Self {
            id: u32::try_from(index + 1).unwrap_or(u32::MAX),
            title: raw.title,
            price: raw.price,
            image_urls: raw.image_urls,
            coords,
            address,
        }
    }
}

/// The full set of listings considered current
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub listings: Vec<Listing>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(listings: Vec<Listing>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            listings,
            fetched_at: Some(fetched_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(position: Position) -> RawListing {
        RawListing {
            title: "Cottage".to_string(),
            price: "5 000 ₽".to_string(),
            image_urls: vec!["https://cdn.example.com/1.jpg".to_string()],
            position,
        }
    }

    #[test]
    fn listing_ids_are_one_based() {
        let listing = Listing::from_raw(0, raw(Position::Unknown), None);
        assert_eq!(listing.id, 1);
    }

    #[test]
    fn address_is_kept_only_for_address_positions() {
        let with_address = Listing::from_raw(
            2,
            raw(Position::Address("Lenina 1".to_string())),
            None,
        );
        assert_eq!(with_address.address.as_deref(), Some("Lenina 1"));

        let with_token = Listing::from_raw(2, raw(Position::Token("group_1,2".to_string())), None);
        assert!(with_token.address.is_none());
    }

    #[test]
    fn listing_serializes_in_camel_case_with_null_coords() {
        let listing = Listing::from_raw(0, raw(Position::Unknown), None);
        let json = serde_json::to_value(&listing).expect("serialize");

        assert_eq!(json["id"], 1);
        assert_eq!(json["imageUrls"][0], "https://cdn.example.com/1.jpg");
        assert!(json["coords"].is_null());
        assert!(json.get("address").is_none());
    }

    #[test]
    fn coords_serialize_as_lat_lon_pair() {
        let listing = Listing::from_raw(0, raw(Position::Unknown), Some(Coords(55.75, 39.70)));
        let json = serde_json::to_value(&listing).expect("serialize");
        assert_eq!(json["coords"], serde_json::json!([55.75, 39.70]));
    }

    #[test]
    fn default_snapshot_is_empty_and_unfetched() {
        let snapshot = Snapshot::default();
        assert!(snapshot.listings.is_empty());
        assert!(snapshot.fetched_at.is_none());
    }
}
