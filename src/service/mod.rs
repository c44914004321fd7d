//! Outbound collaborators of the weather form: date normalization,
//! geocoding and the weather lookup itself.

pub mod normalization;
pub mod weather;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::WeatherError;

pub use normalization::CalendarNormalizer;
pub use weather::{OpenMeteoClient, OpenMeteoConfig};

/// Turns free text such as "tomorrow" into a calendar date
pub trait DateNormalizer: Send + Sync {
    fn text_to_date(&self, text: &str) -> Option<NaiveDate>;
}

/// Resolves a place name into (latitude, longitude)
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn text_to_coordinate(&self, location: &str) -> Result<(f64, f64), WeatherError>;
}

/// Produces a human readable weather report for one day at one place
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn weather_text(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
        date_text: &str,
        location_text: &str,
    ) -> Result<String, WeatherError>;
}
