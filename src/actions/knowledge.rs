use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Action, Dispatcher, Domain, Event, Tracker};
use crate::graph::schema::is_identifier;
use crate::graph::KnowledgeBase;

/// Attribute that uniquely identifies an object in the graph
const KEY_ATTRIBUTE: &str = "id";

/// Answers "which songs ..." and "what is the album of ..." style questions
/// from the graph knowledge base.
pub struct ActionQueryKnowledgeBase {
    knowledge_base: Arc<KnowledgeBase>,
    limit: usize,
}

impl ActionQueryKnowledgeBase {
    pub fn new(knowledge_base: Arc<KnowledgeBase>) -> Self {
        Self {
            knowledge_base,
            limit: 5,
        }
    }

    /// List objects of a type, filtered by any slot named after one of its attributes
    async fn query_objects(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        object_type: &str,
    ) -> Result<()> {
        let kb = &self.knowledge_base;

        let filters: BTreeMap<String, String> = kb
            .attributes_of_type(object_type)
            .await?
            .into_iter()
            .filter(|attribute| is_identifier(attribute))
            .filter_map(|attribute| {
                let value = tracker.get_slot(&attribute)?.to_string();
                Some((attribute, value))
            })
            .collect();
        let (attributes, relations) = kb.split_attributes(object_type, &filters)?;

        let objects = kb
            .get_objects(object_type, &attributes, &relations, self.limit)
            .await?;

        if objects.is_empty() {
            dispatcher.utter_text(format!(
                "I could not find any objects of type '{}'.",
                object_type
            ));
            return Ok(());
        }

        let repr = kb.representation_attribute(object_type)?;
        dispatcher.utter_text(format!(
            "Found the following objects of type '{}':",
            object_type
        ));
        for (i, object) in objects.iter().enumerate() {
            let label = object.get(&repr).map(render).unwrap_or_default();
            dispatcher.utter_text(format!("{}: {}", i + 1, label));
        }

        Ok(())
    }

    /// Read one attribute of the mentioned object
    async fn query_attribute(
        &self,
        dispatcher: &mut Dispatcher,
        object_type: &str,
        mention: &str,
        attribute: &str,
    ) -> Result<()> {
        let kb = &self.knowledge_base;
        let repr = kb.representation_attribute(object_type)?;

        let object = kb
            .get_object(object_type, mention, KEY_ATTRIBUTE, &repr)
            .await?;

        let answer = object.as_ref().and_then(|object| {
            let value = object.get(attribute).filter(|v| !v.is_null())?;
            let label = object.get(&repr).map(render).unwrap_or_else(|| mention.to_string());
            Some((label, render(value)))
        });

        match answer {
            Some((label, value)) => dispatcher.utter_text(format!(
                "'{}' has the value '{}' for attribute '{}'.",
                label, value, attribute
            )),
            None => dispatcher.utter_text(format!(
                "Did not find a valid value for attribute '{}' for entity '{}'.",
                attribute, mention
            )),
        }

        Ok(())
    }
}

/// Display form of a stored value: strings without quotes, anything else as JSON
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Action for ActionQueryKnowledgeBase {
    fn name(&self) -> &'static str {
        "action_query_knowledge_base"
    }

    async fn run(
        &self,
        dispatcher: &mut Dispatcher,
        tracker: &Tracker,
        _domain: &Domain,
    ) -> Result<Vec<Event>> {
        let object_type = tracker.get_slot("object_type");
        let attribute = tracker.get_slot("attribute");
        let mention = tracker.get_slot("mention");

        match (object_type, mention, attribute) {
            (Some(object_type), _, None) => {
                self.query_objects(dispatcher, tracker, object_type).await?
            }
            (Some(object_type), Some(mention), Some(attribute)) => {
                self.query_attribute(dispatcher, object_type, mention, attribute)
                    .await?
            }
            _ => dispatcher.utter_response("utter_ask_rephrase"),
        }

        Ok(vec![Event::reset_slot("mention"), Event::reset_slot("attribute")])
    }
}
