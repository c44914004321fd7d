use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDateTime};
use std::sync::Arc;

use super::{Action, Clock, Dispatcher, Domain, Event, Tracker};

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Day offset for a relative date word, or `None` if the word is not supported
pub fn resolve_relative_date(token: &str) -> Option<i64> {
    match token {
        "today" => Some(0),
        "tomorrow" => Some(1),
        "yesterday" => Some(-1),
        _ => None,
    }
}

/// Weekday name for an index counted from Monday = 0
pub fn weekday_name(index: u32) -> &'static str {
    WEEKDAY_NAMES[(index % 7) as usize]
}

/// Resolve the `date` slot against `now`.
///
/// Returns the raw token on failure so it can be echoed back to the user.
fn target_datetime<'a>(
    tracker: &'a Tracker,
    clock: &dyn Clock,
) -> std::result::Result<NaiveDateTime, &'a str> {
    let token = tracker.get_slot("date").unwrap_or("today");
    let now = clock.now();

    match resolve_relative_date(token) {
        Some(offset) => Ok(now + Duration::days(offset)),
        None => Err(token),
    }
}

fn unsupported(kind: &str, token: &str) -> String {
    format!(
        "The system currently doesn't support {} query for '{}'",
        kind, token
    )
}

/// Tells the current time
pub struct ActionQueryTime {
    clock: Arc<dyn Clock>,
}

impl ActionQueryTime {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Action for ActionQueryTime {
    fn name(&self) -> &'static str {
        "action_query_time"
    }

    async fn run(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        _domain: &Domain,
    ) -> Result<Vec<Event>> {
        match target_datetime(tracker, self.clock.as_ref()) {
            Ok(target) => dispatcher.utter_text(target.format("It's %I:%M %p.").to_string()),
            Err(token) => dispatcher.utter_text(unsupported("time", token)),
        }

        Ok(Vec::new())
    }
}

/// Tells the date, optionally shifted by a relative day word
pub struct ActionQueryDate {
    clock: Arc<dyn Clock>,
}

impl ActionQueryDate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Action for ActionQueryDate {
    fn name(&self) -> &'static str {
        "action_query_date"
    }

    async fn run(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        _domain: &Domain,
    ) -> Result<Vec<Event>> {
        match target_datetime(tracker, self.clock.as_ref()) {
            Ok(target) => dispatcher.utter_text(target.format("It's %B %d, %Y.").to_string()),
            Err(token) => dispatcher.utter_text(unsupported("date", token)),
        }

        Ok(Vec::new())
    }
}

/// Tells the day of the week
pub struct ActionQueryWeekday {
    clock: Arc<dyn Clock>,
}

impl ActionQueryWeekday {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Action for ActionQueryWeekday {
    fn name(&self) -> &'static str {
        "action_query_weekday"
    }

    async fn run(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        _domain: &Domain,
    ) -> Result<Vec<Event>> {
        match target_datetime(tracker, self.clock.as_ref()) {
            Ok(target) => {
                dispatcher.utter_text(weekday_name(target.weekday().num_days_from_monday()))
            }
            Err(token) => dispatcher.utter_text(unsupported("day of week", token)),
        }

        Ok(Vec::new())
    }
}
