use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A resolved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedAddress {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Resolves free-form addresses and zipcodes to coordinates.
///
/// Abstracted as a trait so tests can run without network access.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, AppError>;
}

fn no_match(address: &str) -> AppError {
    AppError::BadRequest(format!("Could not geocode address '{}'", address))
}

/// The request URL carries the API key, so it is stripped before logging and
/// the client only sees a generic message.
fn unavailable(context: &str, err: reqwest::Error) -> AppError {
    tracing::warn!(error = %err.without_url(), "{}", context);
    AppError::Upstream("Geocoding service unavailable".into())
}

/// MapQuest geocoding API client.
pub struct MapQuestGeocoder {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

pub const MAPQUEST_URL: &str = "https://www.mapquestapi.com/geocoding/v1/address";

impl MapQuestGeocoder {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, MAPQUEST_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MapQuestResponse {
    #[serde(default)]
    results: Vec<MapQuestResult>,
}

#[derive(Debug, Deserialize)]
struct MapQuestResult {
    #[serde(default)]
    locations: Vec<MapQuestLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapQuestLocation {
    #[serde(default)]
    street: String,
    /// City.
    #[serde(default)]
    admin_area5: String,
    /// State.
    #[serde(default)]
    admin_area3: String,
    /// Country code.
    #[serde(default)]
    admin_area1: String,
    #[serde(default)]
    postal_code: String,
    lat_lng: MapQuestLatLng,
}

#[derive(Debug, Deserialize)]
struct MapQuestLatLng {
    lat: f64,
    lng: f64,
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

impl From<MapQuestLocation> for GeocodedAddress {
    fn from(location: MapQuestLocation) -> Self {
        let state_zip = [location.admin_area3.trim(), location.postal_code.trim()]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let formatted = [
            location.street.trim(),
            location.admin_area5.trim(),
            state_zip.as_str(),
            location.admin_area1.trim(),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        Self {
            latitude: location.lat_lng.lat,
            longitude: location.lat_lng.lng,
            formatted_address: non_empty(formatted),
            street: non_empty(location.street),
            city: non_empty(location.admin_area5),
            state: non_empty(location.admin_area3),
            zipcode: non_empty(location.postal_code),
            country: non_empty(location.admin_area1),
        }
    }
}

#[async_trait]
impl Geocoder for MapQuestGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, AppError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("location", address)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable("Geocoding request failed", e))?;

        let body: MapQuestResponse = response
            .json()
            .await
            .map_err(|e| unavailable("Invalid geocoder response", e))?;

        body.results
            .into_iter()
            .flat_map(|r| r.locations)
            .next()
            .map(GeocodedAddress::from)
            .ok_or_else(|| no_match(address))
    }
}

/// One entry of a [`StaticGeocoder`] table.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticEntry {
    /// Address or zipcode this entry answers for.
    pub query: String,
    #[serde(flatten)]
    pub address: GeocodedAddress,
}

/// Offline geocoder backed by a fixed lookup table.
///
/// A query matches an entry when, ignoring case, it equals the entry's key or
/// contains it (so a full street address containing a known zipcode resolves).
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    entries: Vec<(String, GeocodedAddress)>,
}

impl StaticGeocoder {
    pub fn new(entries: impl IntoIterator<Item = StaticEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.query.trim().to_lowercase(), e.address))
                .collect(),
        }
    }

    /// Load a JSON array of entries.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<StaticEntry> = serde_json::from_str(&raw)?;
        Ok(Self::new(entries))
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, AppError> {
        let query = address.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| *key == query)
            .or_else(|| self.entries.iter().find(|(key, _)| query.contains(key.as_str())))
            .map(|(_, address)| address.clone())
            .ok_or_else(|| no_match(address))
    }
}
