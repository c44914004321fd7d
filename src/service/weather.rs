use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Geocoder, WeatherService};
use crate::error::WeatherError;

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Endpoints and timeout for the Open-Meteo compatible APIs
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout: Duration,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for geocoding and daily forecasts
#[derive(Clone)]
pub struct OpenMeteoClient {
    config: OpenMeteoConfig,
    http_client: Client,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

/// Error body Open-Meteo sends with 4xx responses
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ForecastResponse {
    daily: DailyForecast,
}

#[derive(Debug, Serialize, Deserialize)]
struct DailyForecast {
    time: Vec<String>,
    weather_code: Vec<Option<u8>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    /// Create a new client
    pub fn new(config: OpenMeteoConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// GET a JSON document, mapping transport and status failures through `wrap`
    async fn get_json<T, F>(&self, url: &str, query: &[(&str, String)], wrap: F) -> Result<T, WeatherError>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn(String) -> WeatherError,
    {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| wrap(format!("request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| wrap(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::warn!(url, status = %status, body = %response_text, "Upstream request failed");

            let reason = serde_json::from_str::<ApiError>(&response_text)
                .ok()
                .and_then(|e| e.reason);
            return Err(wrap(match reason {
                Some(reason) => format!("HTTP {}: {}", status.as_u16(), reason),
                None => format!("HTTP {}", status.as_u16()),
            }));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::warn!(url, error = %e, "Undecodable upstream response");
            wrap("unexpected response".to_string())
        })
    }
}

#[async_trait]
impl Geocoder for OpenMeteoClient {
    async fn text_to_coordinate(&self, location: &str) -> Result<(f64, f64), WeatherError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(WeatherError::MissingLocation);
        }

        let query = [
            ("name", location.to_string()),
            ("count", "1".to_string()),
            ("format", "json".to_string()),
        ];
        let response: GeocodingResponse = self
            .get_json(&self.config.geocoding_url, &query, WeatherError::Geocoding)
            .await?;

        let place = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::UnknownLocation(location.to_string()))?;

        tracing::debug!(
            location,
            matched = %place.name,
            latitude = place.latitude,
            longitude = place.longitude,
            "Geocoded location"
        );

        Ok((place.latitude, place.longitude))
    }
}

#[async_trait]
impl WeatherService for OpenMeteoClient {
    async fn weather_text(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
        date_text: &str,
        location_text: &str,
    ) -> Result<String, WeatherError> {
        let day = date.format("%Y-%m-%d").to_string();
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            (
                "daily",
                "weather_code,temperature_2m_max,temperature_2m_min".to_string(),
            ),
            ("timezone", "auto".to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ];
        let response: ForecastResponse = self
            .get_json(&self.config.forecast_url, &query, WeatherError::Service)
            .await?;

        format_forecast(&response.daily, date, date_text, location_text)
    }
}

/// Render the forecast row for `date` as a sentence
fn format_forecast(
    daily: &DailyForecast,
    date: NaiveDate,
    date_text: &str,
    location_text: &str,
) -> Result<String, WeatherError> {
    let day = date.format("%Y-%m-%d").to_string();
    let index = daily
        .time
        .iter()
        .position(|t| *t == day)
        .ok_or_else(|| WeatherError::Service(format!("no forecast available for {}", day)))?;

    let code = daily.weather_code.get(index).copied().flatten();
    let high = daily.temperature_2m_max.get(index).copied().flatten();
    let low = daily.temperature_2m_min.get(index).copied().flatten();

    let description = code.map(describe_weather_code).unwrap_or("unknown conditions");

    let mut text = format!(
        "Weather in {} {} ({}): {}",
        location_text, date_text, day, description
    );
    if let (Some(low), Some(high)) = (low, high) {
        text.push_str(&format!(", {:.0}°C to {:.0}°C", low, high));
    }
    text.push('.');

    Ok(text)
}

/// Short description for a WMO weather interpretation code
fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 => "light rain",
        63 => "rain",
        65 => "heavy rain",
        66 | 67 => "freezing rain",
        71 => "light snow",
        73 => "snow",
        75 => "heavy snow",
        77 => "snow grains",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown conditions",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_forecast() {
        let response = r#"{
  "latitude": 52.52,
  "longitude": 13.41,
  "daily": {
    "time": ["2024-01-11"],
    "weather_code": [61],
    "temperature_2m_max": [4.4],
    "temperature_2m_min": [-1.2]
  }
}"#;
        let parsed: ForecastResponse = serde_json::from_str(response).unwrap();

        let text = format_forecast(&parsed.daily, date(2024, 1, 11), "tomorrow", "Berlin").unwrap();
        assert_eq!(
            text,
            "Weather in Berlin tomorrow (2024-01-11): light rain, -1°C to 4°C."
        );
    }

    #[test]
    fn test_format_forecast_with_missing_values() {
        let response = r#"{"daily": {
    "time": ["2024-01-11"],
    "weather_code": [null],
    "temperature_2m_max": [null],
    "temperature_2m_min": [null]
}}"#;
        let parsed: ForecastResponse = serde_json::from_str(response).unwrap();

        let text = format_forecast(&parsed.daily, date(2024, 1, 11), "today", "Oslo").unwrap();
        assert_eq!(text, "Weather in Oslo today (2024-01-11): unknown conditions.");
    }

    #[test]
    fn test_format_forecast_for_other_day_is_service_error() {
        let parsed: ForecastResponse = serde_json::from_str(
            r#"{"daily": {"time": [], "weather_code": [], "temperature_2m_max": [], "temperature_2m_min": []}}"#,
        )
        .unwrap();

        let err = format_forecast(&parsed.daily, date(2024, 1, 11), "today", "Oslo").unwrap_err();
        assert_eq!(err.kind(), "service");
    }

    #[test]
    fn test_geocoding_response_without_results() {
        let parsed: GeocodingResponse = serde_json::from_str(r#"{"generationtime_ms": 0.5}"#).unwrap();
        assert!(parsed.results.is_empty());
    }

    /// Serve `router` on an ephemeral local port and return its base URL
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn client_for(geocoding_path: &str, forecast_path: &str) -> OpenMeteoClient {
        let router = Router::new()
            .route(
                "/search",
                get(|| async {
                    Json(json!({
                        "results": [{"name": "Berlin", "latitude": 52.52, "longitude": 13.41}]
                    }))
                }),
            )
            .route(
                "/forecast",
                get(|| async {
                    Json(json!({
                        "daily": {
                            "time": ["2024-01-11"],
                            "weather_code": [0],
                            "temperature_2m_max": [3.0],
                            "temperature_2m_min": [-2.0]
                        }
                    }))
                }),
            )
            .route(
                "/unavailable",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
            )
            .route(
                "/bad-request",
                get(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "error": true,
                            "reason": "Parameter 'start_date' is out of allowed range"
                        })),
                    )
                }),
            )
            .route("/junk", get(|| async { "<html>not json</html>" }));

        let base = spawn_upstream(router).await;
        OpenMeteoClient::new(OpenMeteoConfig {
            geocoding_url: format!("{}{}", base, geocoding_path),
            forecast_url: format!("{}{}", base, forecast_path),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_geocode_and_forecast_over_http() {
        let client = client_for("/search", "/forecast").await;

        let (lat, lon) = client.text_to_coordinate("Berlin").await.unwrap();
        assert_eq!((lat, lon), (52.52, 13.41));

        let text = client
            .weather_text(lat, lon, date(2024, 1, 11), "tomorrow", "Berlin")
            .await
            .unwrap();
        assert_eq!(text, "Weather in Berlin tomorrow (2024-01-11): clear sky, -2°C to 3°C.");
    }

    #[tokio::test]
    async fn test_geocoding_error_status() {
        let client = client_for("/unavailable", "/forecast").await;

        let err = client.text_to_coordinate("Berlin").await.unwrap_err();
        assert_eq!(err.kind(), "geocoding");
        assert_eq!(err.to_string(), "Location lookup failed: HTTP 503");
    }

    #[tokio::test]
    async fn test_forecast_error_uses_reason_not_body() {
        let client = client_for("/search", "/bad-request").await;

        let err = client
            .weather_text(52.52, 13.41, date(2030, 1, 1), "someday", "Berlin")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Weather service error: HTTP 400: Parameter 'start_date' is out of allowed range"
        );
    }

    #[tokio::test]
    async fn test_forecast_with_undecodable_body() {
        let client = client_for("/search", "/junk").await;

        let err = client
            .weather_text(52.52, 13.41, date(2024, 1, 11), "today", "Berlin")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Weather service error: unexpected response");
    }

    #[tokio::test]
    async fn test_empty_location_is_rejected_before_any_request() {
        let client = OpenMeteoClient::new(OpenMeteoConfig::default()).unwrap();

        let err = client.text_to_coordinate("  ").await.unwrap_err();
        assert_eq!(err.kind(), "missing_location");
    }
}
