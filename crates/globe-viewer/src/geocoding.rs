//! Place search via OpenStreetMap Nominatim.
//!
//! A search resolves a free-text name to a handful of places. Each result
//! carries a viewing altitude sized to the place, so picking one can go
//! straight into a flight.

use bevy::prelude::*;
use globe_flight::Coordinate;
use globe_flight::geo::{distance_km, optimal_altitude};
use serde::Deserialize;

use crate::async_runtime::{RunningTasks, TaskSpawner};

/// Plugin for place search.
pub struct GeocodingPlugin;

impl Plugin for GeocodingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GeocodingState>()
            .add_systems(Update, poll_geocoding_results);
    }
}

/// User agent for API requests.
const USER_AGENT: &str = concat!("globe-viewer/", env!("CARGO_PKG_VERSION"));

/// Throttle duration between geocoding requests (per Nominatim usage policy).
pub const GEOCODING_THROTTLE_SECS: f64 = 5.0;

/// Most results asked for per search.
const RESULT_LIMIT: usize = 5;

/// A place found by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodingResult {
    pub display_name: String,
    /// Where to fly; the altitude is sized to the place when it is known.
    pub coordinate: Coordinate,
}

impl GeocodingResult {
    /// The first two parts of the display name ("Paris, Ile-de-France").
    pub fn short_name(&self) -> String {
        self.display_name
            .split(',')
            .map(str::trim)
            .take(2)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// State for place search.
#[derive(Resource)]
pub struct GeocodingState {
    pub search_text: String,
    pub results: Vec<GeocodingResult>,
    pub is_loading: bool,
    /// Elapsed time (in seconds) since start when last request was made.
    pub last_request_time: Option<f64>,
    pub error: Option<String>,
    result_rx: async_channel::Receiver<Result<Vec<GeocodingResult>, String>>,
    result_tx: async_channel::Sender<Result<Vec<GeocodingResult>, String>>,
}

impl Default for GeocodingState {
    fn default() -> Self {
        let (result_tx, result_rx) = async_channel::bounded(1);
        Self {
            search_text: String::new(),
            results: Vec::new(),
            is_loading: false,
            last_request_time: None,
            error: None,
            result_rx,
            result_tx,
        }
    }
}

impl GeocodingState {
    /// Whether a search for the current text may start at `current_time`.
    pub fn can_request(&self, current_time: f64) -> bool {
        let throttled = self
            .last_request_time
            .is_some_and(|t| current_time - t < GEOCODING_THROTTLE_SECS);
        !throttled && !self.is_loading && !self.search_text.trim().is_empty()
    }

    /// Start an async search for the current text.
    pub fn start_request(
        &mut self,
        current_time: f64,
        spawner: &TaskSpawner<'_, '_>,
        running: &mut RunningTasks,
    ) {
        if !self.can_request(current_time) {
            return;
        }

        self.is_loading = true;
        self.error = None;
        self.last_request_time = Some(current_time);

        let query = self.search_text.trim().to_string();
        let tx = self.result_tx.clone();
        tracing::debug!("Searching for {query:?}");

        running.push(spawner.spawn(async move {
            let result = fetch_geocoding_results(&query).await;
            let _ = tx.send(result).await;
        }));
    }

    /// Forget results and any search in progress.
    pub fn reset(&mut self) {
        self.results.clear();
        self.is_loading = false;
        self.error = None;
        while self.result_rx.try_recv().is_ok() {}
    }
}

/// Poll for geocoding results from background task.
fn poll_geocoding_results(mut geocoding_state: ResMut<GeocodingState>) {
    while let Ok(result) = geocoding_state.result_rx.try_recv() {
        geocoding_state.is_loading = false;
        match result {
            Ok(results) => {
                if results.is_empty() {
                    geocoding_state.error = Some("No places found".to_string());
                } else {
                    geocoding_state.error = None;
                }
                geocoding_state.results = results;
            }
            Err(e) => {
                tracing::warn!("Place search failed: {e}");
                geocoding_state.results.clear();
                geocoding_state.error = Some(e);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
    /// South, north, west and east edges in degrees.
    #[serde(default)]
    boundingbox: Option<Vec<String>>,
}

impl NominatimPlace {
    fn into_result(self) -> Option<GeocodingResult> {
        let latitude = self.lat.parse().ok()?;
        let longitude = self.lon.parse().ok()?;
        let coordinate = Coordinate::new(latitude, longitude).validated().ok()?;
        let coordinate = match self.extent_km() {
            Some(extent) => coordinate.with_altitude(optimal_altitude(extent)),
            None => coordinate,
        };
        Some(GeocodingResult {
            display_name: self.display_name,
            coordinate,
        })
    }

    /// Diagonal of the bounding box in kilometers.
    fn extent_km(&self) -> Option<f64> {
        let [south, north, west, east] = self.boundingbox.as_deref()? else {
            return None;
        };
        let parse = |edge: &String| edge.parse::<f64>().ok();
        let south_west = Coordinate::new(parse(south)?, parse(west)?);
        let north_east = Coordinate::new(parse(north)?, parse(east)?);
        Some(distance_km(&south_west, &north_east))
    }
}

/// Parse a Nominatim JSON response, skipping places with unusable coordinates.
fn parse_places(body: &str) -> Result<Vec<GeocodingResult>, String> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;
    Ok(places
        .into_iter()
        .filter_map(NominatimPlace::into_result)
        .collect())
}

/// Fetch geocoding results from Nominatim API.
async fn fetch_geocoding_results(query: &str) -> Result<Vec<GeocodingResult>, String> {
    let url = format!(
        "https://nominatim.openstreetmap.org/search?q={}&format=json&limit={RESULT_LIMIT}",
        urlencoding::encode(query)
    );

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| format!("Failed to create client: {e}"))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Request failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {e}"))?;
    parse_places(&body)
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;

    use super::*;

    const PARIS_RESPONSE: &str = r#"[
        {
            "place_id": 88066702,
            "display_name": "Paris, Ile-de-France, Metropolitan France, France",
            "lat": "48.8534951",
            "lon": "2.3483915",
            "boundingbox": ["48.8155755", "48.9021560", "2.2241220", "2.4697602"]
        },
        {
            "display_name": "Broken, Nowhere",
            "lat": "not a number",
            "lon": "2.0"
        },
        {
            "display_name": "Paris, Lamar County, Texas, United States",
            "lat": "33.6617962",
            "lon": "-95.5555130"
        }
    ]"#;

    #[test]
    fn test_parse_places() {
        let results = parse_places(PARIS_RESPONSE).unwrap();
        assert_eq!(results.len(), 2);

        let paris = &results[0];
        assert_eq!(paris.short_name(), "Paris, Ile-de-France");
        assert!((paris.coordinate.latitude - 48.853_495_1).abs() < 1e-9);
        // About 20 km corner to corner: a regional view.
        assert_eq!(paris.coordinate.altitude, Some(15_000.0));

        let texas = &results[1];
        assert!((texas.coordinate.longitude + 95.555_513).abs() < 1e-9);
        assert_eq!(texas.coordinate.altitude, None);
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(parse_places("<html>rate limited</html>").is_err());
        assert_eq!(parse_places("[]").unwrap(), Vec::new());
    }

    #[test]
    fn test_out_of_range_place_is_skipped() {
        let body = r#"[{ "display_name": "Bad", "lat": "91.0", "lon": "0.0" }]"#;
        assert!(parse_places(body).unwrap().is_empty());
    }

    #[test]
    fn test_requests_are_throttled() {
        let mut state = GeocodingState::default();
        assert!(!state.can_request(0.0));

        state.search_text = "Paris".to_string();
        assert!(state.can_request(0.0));

        state.last_request_time = Some(10.0);
        assert!(!state.can_request(12.0));
        assert!(state.can_request(10.0 + GEOCODING_THROTTLE_SECS));

        state.is_loading = true;
        assert!(!state.can_request(100.0));
    }

    #[test]
    fn test_poll_stores_results_and_errors() {
        let mut world = World::new();
        world.init_resource::<GeocodingState>();
        {
            let mut state = world.resource_mut::<GeocodingState>();
            state.is_loading = true;
            state
                .result_tx
                .try_send(parse_places(PARIS_RESPONSE))
                .unwrap();
        }
        world.run_system_once(poll_geocoding_results).unwrap();
        {
            let state = world.resource::<GeocodingState>();
            assert!(!state.is_loading);
            assert_eq!(state.results.len(), 2);
            assert!(state.error.is_none());
        }

        world
            .resource::<GeocodingState>()
            .result_tx
            .try_send(Err("HTTP 503 Service Unavailable".to_string()))
            .unwrap();
        world.run_system_once(poll_geocoding_results).unwrap();
        let state = world.resource::<GeocodingState>();
        assert!(state.results.is_empty());
        assert_eq!(state.error.as_deref(), Some("HTTP 503 Service Unavailable"));
    }
}
