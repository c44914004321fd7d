use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use super::{Action, Dispatcher, Domain, Event, Tracker};
use crate::error::WeatherError;
use crate::service::{DateNormalizer, Geocoder, WeatherService};

/// Submits the weather form: resolves `date-time` and `address`,
/// then asks the weather service.
pub struct ActionWeatherFormSubmit {
    normalizer: Arc<dyn DateNormalizer>,
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherService>,
}

impl ActionWeatherFormSubmit {
    pub fn new(
        normalizer: Arc<dyn DateNormalizer>,
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherService>,
    ) -> Self {
        Self {
            normalizer,
            geocoder,
            weather,
        }
    }

    async fn fetch(&self, city: Option<&str>, date: NaiveDate, date_text: &str) -> Result<String, WeatherError> {
        let city = city.ok_or(WeatherError::MissingLocation)?;
        let (lat, lon) = self.geocoder.text_to_coordinate(city).await?;

        self.weather
            .weather_text(lat, lon, date, date_text, city)
            .await
    }
}

/// Render a raw slot value the way it is echoed back to the user
fn quote_slot(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v),
        None => "None".to_string(),
    }
}

#[async_trait]
impl Action for ActionWeatherFormSubmit {
    fn name(&self) -> &'static str {
        "action_weather_form_submit"
    }

    async fn run(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        _domain: &Domain,
    ) -> Result<Vec<Event>> {
        let city = tracker.get_slot("address");
        let date_text = tracker.get_slot("date-time");

        let date = match date_text.and_then(|t| self.normalizer.text_to_date(t)) {
            Some(date) => date,
            None => {
                dispatcher.utter_text(format!(
                    "Not support weather query for [{}, {}]",
                    quote_slot(city),
                    quote_slot(date_text)
                ));
                return Ok(Vec::new());
            }
        };

        // The lookup can be slow, let the user know first
        dispatcher.utter_response("utter_working_on_it");

        match self.fetch(city, date, date_text.unwrap_or_default()).await {
            Ok(report) => dispatcher.utter_text(report),
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Weather query failed");
                dispatcher.utter_text(e.to_string());
            }
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::FixedClock;
    use crate::actions::Message;
    use crate::service::CalendarNormalizer;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGeocoder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn text_to_coordinate(&self, location: &str) -> Result<(f64, f64), WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(WeatherError::UnknownLocation(location.to_string()))
            } else {
                Ok((52.52, 13.41))
            }
        }
    }

    struct FakeWeather {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WeatherService for FakeWeather {
        async fn weather_text(
            &self,
            _latitude: f64,
            _longitude: f64,
            date: NaiveDate,
            date_text: &str,
            location_text: &str,
        ) -> Result<String, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(WeatherError::Service("HTTP 503".to_string()));
            }
            Ok(format!("{} {} {}: sunny", location_text, date_text, date))
        }
    }

    struct Fixture {
        geocoder: Arc<FakeGeocoder>,
        weather: Arc<FakeWeather>,
        action: ActionWeatherFormSubmit,
    }

    fn fixture(geocoder_fails: bool, weather_fails: bool) -> Fixture {
        let clock = Arc::new(FixedClock::at(2024, 1, 10, 9, 0));
        let geocoder = Arc::new(FakeGeocoder {
            calls: AtomicUsize::new(0),
            fail: geocoder_fails,
        });
        let weather = Arc::new(FakeWeather {
            calls: AtomicUsize::new(0),
            fail: weather_fails,
        });
        let action = ActionWeatherFormSubmit::new(
            Arc::new(CalendarNormalizer::new(clock)),
            geocoder.clone(),
            weather.clone(),
        );

        Fixture {
            geocoder,
            weather,
            action,
        }
    }

    async fn run(fixture: &Fixture, tracker: &Tracker) -> Vec<Message> {
        let mut dispatcher = Dispatcher::new();
        let events = fixture
            .action
            .run(&mut dispatcher, tracker, &Value::Null)
            .await
            .unwrap();
        assert!(events.is_empty());
        dispatcher.into_messages()
    }

    fn working_on_it() -> Message {
        Message::Response {
            response: "utter_working_on_it".to_string(),
        }
    }

    fn text(s: &str) -> Message {
        Message::Text {
            text: s.to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_sends_ack_then_report() {
        let fixture = fixture(false, false);
        let tracker = Tracker::with_slots([("address", "Berlin"), ("date-time", "tomorrow")]);

        let messages = run(&fixture, &tracker).await;
        assert_eq!(
            messages,
            vec![working_on_it(), text("Berlin tomorrow 2024-01-11: sunny")]
        );
        assert_eq!(fixture.geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.weather.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_date_makes_no_calls() {
        let fixture = fixture(false, false);
        let tracker = Tracker::with_slots([("address", "Berlin"), ("date-time", "someday")]);

        let messages = run(&fixture, &tracker).await;
        assert_eq!(
            messages,
            vec![text("Not support weather query for ['Berlin', 'someday']")]
        );
        assert_eq!(fixture.geocoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.weather.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_slots_render_as_none() {
        let fixture = fixture(false, false);

        let messages = run(&fixture, &Tracker::default()).await;
        assert_eq!(messages, vec![text("Not support weather query for [None, None]")]);
    }

    #[tokio::test]
    async fn test_geocoding_failure_skips_weather_call() {
        let fixture = fixture(true, false);
        let tracker = Tracker::with_slots([("address", "Atlantis"), ("date-time", "today")]);

        let messages = run(&fixture, &tracker).await;
        assert_eq!(
            messages,
            vec![
                working_on_it(),
                text("Sorry, I can't find a place called 'Atlantis'.")
            ]
        );
        assert_eq!(fixture.weather.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_service_failure_is_reported_as_text() {
        let fixture = fixture(false, true);
        let tracker = Tracker::with_slots([("address", "Berlin"), ("date-time", "today")]);

        let messages = run(&fixture, &tracker).await;
        assert_eq!(
            messages,
            vec![working_on_it(), text("Weather service error: HTTP 503")]
        );
    }

    #[tokio::test]
    async fn test_missing_address_after_valid_date() {
        let fixture = fixture(false, false);
        let tracker = Tracker::with_slots([("date-time", "today")]);

        let messages = run(&fixture, &tracker).await;
        assert_eq!(
            messages,
            vec![
                working_on_it(),
                text("Please tell me which city you want the weather for.")
            ]
        );
        assert_eq!(fixture.geocoder.calls.load(Ordering::SeqCst), 0);
    }
}
