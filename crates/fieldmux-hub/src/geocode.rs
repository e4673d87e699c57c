//! Reverse geocoder collaborator: resolves GPS coordinates to a
//! human-readable place name via Nominatim, with a distance/time-gated
//! cache so a streamer sitting still doesn't re-query on every fix.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;

const USER_AGENT: &str = "fieldmux/1.0 (+https://github.com/fieldmux/fieldmux)";
const DISTANCE_THRESHOLD_M: f64 = 150.0;
const TIME_THRESHOLD: Duration = Duration::from_secs(300);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CacheEntry {
    lat: f64,
    lng: f64,
    fetched_at: Instant,
    location_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: NominatimAddress,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    suburb: Option<String>,
    neighbourhood: Option<String>,
    city_district: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
}

impl NominatimAddress {
    fn format(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(area) = self
            .suburb
            .clone()
            .or_else(|| self.neighbourhood.clone())
            .or_else(|| self.city_district.clone())
        {
            parts.push(area);
        }
        if let Some(city) = self
            .city
            .clone()
            .or_else(|| self.town.clone())
            .or_else(|| self.village.clone())
            .or_else(|| self.municipality.clone())
        {
            parts.push(city);
        }
        if let Some(state) = self.state.clone() {
            parts.push(state);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Haversine distance in meters between two lat/lng points.
fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

pub struct GeoResolver {
    client: reqwest::Client,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl GeoResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client builds with static config");

        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn should_update(&self, streamer_id: &str, lat: f64, lng: f64) -> bool {
        let cache = self.cache.lock().unwrap();
        match cache.get(streamer_id) {
            None => true,
            Some(entry) => {
                let distance = haversine_m(entry.lat, entry.lng, lat, lng);
                distance > DISTANCE_THRESHOLD_M || entry.fetched_at.elapsed() > TIME_THRESHOLD
            }
        }
    }

    pub fn cached_location(&self, streamer_id: &str) -> Option<String> {
        self.cache
            .lock()
            .unwrap()
            .get(streamer_id)
            .map(|e| e.location_name.clone())
    }

    /// Resolve a place name for `(lat, lng)`. Best-effort: any failure
    /// (network, parse, timeout) is logged and swallowed, falling back to
    /// the last cached name if one exists.
    pub async fn reverse_geocode(&self, streamer_id: &str, lat: f64, lng: f64) -> Option<String> {
        if lat == 0.0 && lng == 0.0 {
            return None;
        }

        if !self.should_update(streamer_id, lat, lng) {
            return self.cached_location(streamer_id);
        }

        match self.fetch(lat, lng).await {
            Ok(name) => {
                self.cache.lock().unwrap().insert(
                    streamer_id.to_string(),
                    CacheEntry {
                        lat,
                        lng,
                        fetched_at: Instant::now(),
                        location_name: name.clone(),
                    },
                );
                Some(name)
            }
            Err(e) => {
                tracing::debug!(streamer_id, error = %e, "reverse geocode failed");
                self.cached_location(streamer_id)
            }
        }
    }

    async fn fetch(&self, lat: f64, lng: f64) -> anyhow::Result<String> {
        let response = self
            .client
            .get("https://nominatim.openstreetmap.org/reverse")
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("format", "json".to_string()),
                ("zoom", "14".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<NominatimResponse>()
            .await?;

        Ok(response
            .address
            .format()
            .unwrap_or(response.display_name))
    }
}

impl Default for GeoResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_of_identical_points_is_zero() {
        assert_eq!(haversine_m(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn haversine_one_degree_latitude_is_about_111km() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1000.0);
    }

    #[tokio::test]
    async fn zero_coordinates_short_circuit_without_network() {
        let resolver = GeoResolver::new();
        assert_eq!(resolver.reverse_geocode("s1", 0.0, 0.0).await, None);
    }

    #[test]
    fn unseen_streamer_should_always_update() {
        let resolver = GeoResolver::new();
        assert!(resolver.should_update("never-seen", 1.0, 2.0));
    }

    #[test]
    fn address_format_prefers_suburb_city_state_order() {
        let address = NominatimAddress {
            suburb: Some("Downtown".into()),
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            ..Default::default()
        };
        assert_eq!(address.format(), Some("Downtown, Springfield, IL".to_string()));
    }

    #[test]
    fn address_format_is_none_when_empty() {
        assert_eq!(NominatimAddress::default().format(), None);
    }
}
