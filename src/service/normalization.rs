use chrono::{DateTime, Duration, NaiveDate};
use std::sync::Arc;

use super::DateNormalizer;
use crate::actions::dates::resolve_relative_date;
use crate::actions::Clock;

/// Resolves relative day words, ISO dates and RFC 3339 timestamps
/// against the injected clock.
pub struct CalendarNormalizer {
    clock: Arc<dyn Clock>,
}

impl CalendarNormalizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn relative_offset(text: &str) -> Option<i64> {
        let text = text.strip_prefix("the ").unwrap_or(text);

        match text {
            "day after tomorrow" => Some(2),
            "day before yesterday" => Some(-2),
            other => resolve_relative_date(other),
        }
    }
}

impl DateNormalizer for CalendarNormalizer {
    fn text_to_date(&self, text: &str) -> Option<NaiveDate> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        if let Some(offset) = Self::relative_offset(&normalized) {
            return Some(self.clock.now().date() + Duration::days(offset));
        }

        if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
            return Some(date);
        }

        // Timestamps keep the calendar day the extractor meant, in its own offset
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.date_naive())
    }
}
