//! Address lookup and reverse geocoding for the library map.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use shared::{domain::Coordinates, protocol::server_message};
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_GEOCODER_URL: &str = "https://geocode-maps.yandex.ru/1.x/";
pub const DEFAULT_LANG: &str = "uz_UZ";
pub const TASHKENT: Coordinates = Coordinates::new(41.2995, 69.2401);

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub description: Option<String>,
    pub coordinates: Coordinates,
}

impl Place {
    /// `name, description`, or just the name.
    pub fn label(&self) -> String {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!("{}, {description}", self.name),
            None => self.name.clone(),
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, address: &str) -> Result<Option<Place>, ClientError>;
    async fn reverse(&self, at: Coordinates) -> Result<Option<Place>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    response: GeocodeBody,
}

#[derive(Debug, Deserialize)]
struct GeocodeBody {
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
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    pos: String,
}

/// Parses a `"lon lat"` position string.
fn parse_pos(pos: &str) -> Option<Coordinates> {
    let mut parts = pos.split_whitespace();
    let longitude = parts.next()?.parse().ok()?;
    let latitude = parts.next()?.parse().ok()?;
    Some(Coordinates::new(latitude, longitude))
}

pub struct YandexGeocoder {
    http: Client,
    endpoint: Url,
    api_key: String,
    lang: String,
}

impl YandexGeocoder {
    pub fn new(endpoint: &str, api_key: Option<&str>, lang: &str) -> Result<Self, ClientError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ClientError::Configuration(
                    "geocoder API key is not set (YANDEX_API_KEY)".to_string(),
                )
            })?;
        let endpoint = Url::parse(endpoint).map_err(|err| {
            ClientError::Configuration(format!("invalid geocoder url `{endpoint}`: {err}"))
        })?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            lang: lang.to_string(),
        })
    }

    async fn first_match(&self, geocode: &str) -> Result<Option<Place>, ClientError> {
        debug!(geocode, "geocoder request");
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("geocode", geocode),
                ("format", "json"),
                ("lang", self.lang.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            return Err(ClientError::ServerRejected {
                status: status.as_u16(),
                message: body.as_ref().and_then(server_message),
            });
        }

        let body: GeocodeResponse = response.json().await?;
        Ok(body
            .response
            .collection
            .members
            .into_iter()
            .next()
            .and_then(|member| {
                let object = member.geo_object;
                let coordinates = parse_pos(&object.point.pos)?;
                Some(Place {
                    name: object.name,
                    description: object.description,
                    coordinates,
                })
            }))
    }
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn locate(&self, address: &str) -> Result<Option<Place>, ClientError> {
        self.first_match(address.trim()).await
    }

    async fn reverse(&self, at: Coordinates) -> Result<Option<Place>, ClientError> {
        self.first_match(&format!("{},{}", at.longitude, at.latitude))
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapLabel {
    Place(String),
    NotFound,
    Failed,
}

impl fmt::Display for MapLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Place(text) => f.write_str(text),
            Self::NotFound => f.write_str("Place name not found"),
            Self::Failed => f.write_str("Could not look up the place name"),
        }
    }
}

/// Marker, centre and caption of the library map.
pub struct MapView {
    geocoder: Arc<dyn Geocoder>,
    center: Coordinates,
    marker: Option<Coordinates>,
    label: Option<MapLabel>,
}

impl MapView {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            center: TASHKENT,
            marker: None,
            label: None,
        }
    }

    pub fn center(&self) -> Coordinates {
        self.center
    }

    pub fn marker(&self) -> Option<Coordinates> {
        self.marker
    }

    pub fn label(&self) -> Option<&MapLabel> {
        self.label.as_ref()
    }

    /// Centres the map on a library address. When the lookup fails or finds
    /// nothing the marker stays on the default centre under the library name.
    pub async fn show_address(&mut self, address: &str, library_name: &str) -> &MapLabel {
        let fallback = MapLabel::Place(library_name.to_string());
        let label = match self.geocoder.locate(address).await {
            Ok(Some(place)) => {
                self.center = place.coordinates;
                self.marker = Some(place.coordinates);
                if place.name.is_empty() {
                    fallback
                } else {
                    MapLabel::Place(place.name)
                }
            }
            Ok(None) => {
                warn!(address, "geocoder: address not found");
                self.marker = Some(self.center);
                fallback
            }
            Err(err) => {
                warn!(address, "geocoder: lookup failed: {err}");
                self.marker = Some(self.center);
                fallback
            }
        };
        self.label.insert(label)
    }

    /// Moves the marker to a clicked point and names it.
    pub async fn click(&mut self, at: Coordinates) -> &MapLabel {
        self.center = at;
        self.marker = Some(at);
        let label = match self.geocoder.reverse(at).await {
            Ok(Some(place)) => MapLabel::Place(place.label()),
            Ok(None) => MapLabel::NotFound,
            Err(err) => {
                warn!(%at, "geocoder: reverse lookup failed: {err}");
                MapLabel::Failed
            }
        };
        self.label.insert(label)
    }
}

#[cfg(test)]
#[path = "tests/geocode_tests.rs"]
mod tests;
