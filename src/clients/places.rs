use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    cache::{normalize_key, Cache, CacheTable, RESTAURANT_TTL},
    http_error, read_json, ClientError, PlaceQuery, PlacesApi,
};
use crate::pipeline::types::Restaurant;

const SERVICE: &str = "google_places";
const BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const MIN_RATING: f64 = 3.5;
const MAX_PRICE_LEVEL: u8 = 3;
pub const METERS_PER_MILE: f64 = 1609.34;

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct PlaceResult {
    place_id: String,
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    price_level: Option<u8>,
    #[serde(default)]
    business_status: Option<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    result: Option<PlaceDetails>,
}

#[derive(Deserialize)]
struct PlaceDetails {
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

pub fn miles_to_meters(miles: f64) -> u32 {
    (miles * METERS_PER_MILE).round() as u32
}

/// Drops permanently closed, poorly rated and very expensive places. An
/// unrated place is kept.
pub fn is_acceptable(place: &Restaurant) -> bool {
    if place.business_status.as_deref() == Some("CLOSED_PERMANENTLY") {
        return false;
    }
    if place.rating.is_some_and(|r| r < MIN_RATING) {
        return false;
    }
    !place.price_level.is_some_and(|p| p > MAX_PRICE_LEVEL)
}

pub struct GooglePlaces {
    http: reqwest::Client,
    api_key: String,
    cache: Cache,
}

impl GooglePlaces {
    pub fn new(http: reqwest::Client, api_key: String, cache: Cache) -> Self {
        Self {
            http,
            api_key,
            cache,
        }
    }

    async fn geocode(&self, location: &str) -> Result<Option<LatLng>, ClientError> {
        let response = self
            .http
            .get(format!("{BASE_URL}/geocode/json"))
            .query(&[("address", location), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: GeocodeResponse = read_json(SERVICE, response).await?;
        Ok(parsed.results.into_iter().next().map(|r| r.geometry.location))
    }

    async fn nearby(&self, at: LatLng, query: &PlaceQuery) -> Result<Vec<PlaceResult>, ClientError> {
        let location = format!("{},{}", at.lat, at.lng);
        let radius = query.radius_meters.to_string();
        let response = self
            .http
            .get(format!("{BASE_URL}/place/nearbysearch/json"))
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("keyword", query.keyword.as_str()),
                ("type", "restaurant"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: NearbyResponse = read_json(SERVICE, response).await?;
        match parsed.status.as_str() {
            "OK" => Ok(parsed.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            other => Err(ClientError::Payload {
                service: SERVICE,
                message: format!(
                    "{other}: {}",
                    parsed.error_message.unwrap_or_default()
                ),
            }),
        }
    }

    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>, ClientError> {
        let response = self
            .http
            .get(format!("{BASE_URL}/place/details/json"))
            .query(&[
                ("place_id", place_id),
                ("fields", "website,formatted_address,address_components"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: DetailsResponse = read_json(SERVICE, response).await?;
        Ok(parsed.result)
    }

    async fn enrich(&self, mut restaurant: Restaurant) -> Restaurant {
        match self.details(&restaurant.place_id).await {
            Ok(Some(details)) => {
                if let Some(address) = details.formatted_address {
                    restaurant.address = address;
                }
                restaurant.website = details.website;
                for component in details.address_components {
                    if component.types.iter().any(|t| t == "locality") {
                        restaurant.city = Some(component.long_name);
                    } else if component.types.iter().any(|t| t == "postal_code") {
                        restaurant.zip_code = Some(component.long_name);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(place_id = %restaurant.place_id, error = %e, "place details failed"),
        }
        restaurant
    }
}

#[async_trait]
impl PlacesApi for GooglePlaces {
    async fn search_restaurants(&self, query: &PlaceQuery) -> Result<Vec<Restaurant>, ClientError> {
        if self.api_key.is_empty() {
            debug!("places api key not set; skipping search");
            return Ok(Vec::new());
        }

        let key = normalize_key(&format!(
            "{} {} {} {}",
            query.location, query.keyword, query.radius_meters, query.limit
        ));
        if let Some(hit) = self.cache.get::<Vec<Restaurant>>(CacheTable::Restaurants, &key).await {
            return Ok(hit);
        }

        let Some(at) = self.geocode(&query.location).await? else {
            warn!(location = %query.location, "location could not be geocoded");
            return Ok(Vec::new());
        };

        let candidates: Vec<Restaurant> = self
            .nearby(at, query)
            .await?
            .into_iter()
            .map(|p| Restaurant {
                place_id: p.place_id,
                name: p.name,
                address: p.vicinity.unwrap_or_default(),
                rating: p.rating,
                price_level: p.price_level,
                business_status: p.business_status,
                ..Default::default()
            })
            .filter(is_acceptable)
            .take(query.limit)
            .collect();

        let restaurants = join_all(candidates.into_iter().map(|r| self.enrich(r))).await;
        debug!(keyword = %query.keyword, found = restaurants.len(), "places search done");

        self.cache
            .put(CacheTable::Restaurants, &key, &restaurants, Some(RESTAURANT_TTL))
            .await;
        Ok(restaurants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(rating: Option<f64>, price: Option<u8>, status: Option<&str>) -> Restaurant {
        Restaurant {
            place_id: "p".into(),
            name: "n".into(),
            rating,
            price_level: price,
            business_status: status.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn filters_closed_low_rated_and_expensive_places() {
        assert!(is_acceptable(&place(Some(4.2), Some(2), Some("OPERATIONAL"))));
        assert!(is_acceptable(&place(Some(3.5), None, None)));
        assert!(is_acceptable(&place(None, None, None)));
        assert!(!is_acceptable(&place(Some(3.4), Some(1), None)));
        assert!(!is_acceptable(&place(Some(4.8), Some(4), None)));
        assert!(!is_acceptable(&place(Some(4.8), Some(1), Some("CLOSED_PERMANENTLY"))));
    }

    #[test]
    fn converts_miles_to_meters() {
        assert_eq!(miles_to_meters(2.0), 3219);
        assert_eq!(miles_to_meters(10.0), 16093);
    }
}
