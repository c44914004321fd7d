//! Custom actions and the small protocol surface they share: the tracker
//! view of slots, the collecting dispatcher and the events they return.

pub mod dates;
pub mod knowledge;
pub mod weather;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub use dates::{ActionQueryDate, ActionQueryTime, ActionQueryWeekday};
pub use knowledge::ActionQueryKnowledgeBase;
pub use weather::ActionWeatherFormSubmit;

/// Read-only view of the conversation state for the current turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub slots: HashMap<String, Value>,
    #[serde(default)]
    pub latest_message: Option<Value>,
}

impl Tracker {
    pub fn with_slots<I, K, V>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            slots: slots
                .into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
            ..Default::default()
        }
    }

    /// String value of a slot. Non-string and empty values count as unset.
    pub fn get_slot(&self, name: &str) -> Option<&str> {
        self.slots
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Static domain description sent along with each call
pub type Domain = Value;

/// A single outgoing message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Text { text: String },
    Response { response: String },
}

/// Collects the messages an action wants to send
#[derive(Debug, Default)]
pub struct Dispatcher {
    messages: Vec<Message>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn utter_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::Text { text: text.into() });
    }

    /// Queue a templated response defined in the domain
    pub fn utter_response(&mut self, name: impl Into<String>) {
        self.messages.push(Message::Response {
            response: name.into(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// State mutation returned to the dialogue manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    #[serde(rename = "slot")]
    SlotSet { name: String, value: Value },
}

impl Event {
    pub fn reset_slot(name: impl Into<String>) -> Self {
        Event::SlotSet {
            name: name.into(),
            value: Value::Null,
        }
    }
}

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A custom action invoked by name, once per turn
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        domain: &Domain,
    ) -> Result<Vec<Event>>;
}

/// Registered actions keyed by name
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        tracing::debug!(action = action.name(), "Registered action");
        self.actions.insert(action.name(), action);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }
}
