use std::collections::BTreeMap;
use std::sync::Arc;

use super::operations::GraphStore;
use super::query::{self, RelationFilter, RelationProjection};
use super::schema::KnowledgeBaseSchema;
use super::KbObject;
use crate::error::KnowledgeBaseError;

/// Knowledge base lookups over a graph store.
///
/// Answers the fixed questions the knowledge base action asks, using the
/// schema to tell literal properties from edges.
pub struct KnowledgeBase {
    store: Arc<dyn GraphStore>,
    schema: KnowledgeBaseSchema,
}

impl KnowledgeBase {
    /// Wrap a store; the schema is validated here, once
    pub fn new(store: Arc<dyn GraphStore>, schema: KnowledgeBaseSchema) -> Result<Self, KnowledgeBaseError> {
        schema.validate()?;

        Ok(Self { store, schema })
    }

    pub fn schema(&self) -> &KnowledgeBaseSchema {
        &self.schema
    }

    /// Property keys seen on one sample node, followed by the relation attributes.
    ///
    /// With no node of the type this is just the relation attributes.
    pub async fn attributes_of_type(&self, object_type: &str) -> Result<Vec<String>, KnowledgeBaseError> {
        let (label, _) = self.schema.resolve_type(object_type)?;

        let sample = self
            .store
            .fetch_objects(&query::sample_object(label)?)
            .await?
            .into_iter()
            .next();

        let mut attributes: Vec<String> = sample
            .map(|object| object.into_keys().collect())
            .unwrap_or_default();

        for relation in self.schema.relation_attributes(object_type)? {
            if !attributes.iter().any(|a| a == relation) {
                attributes.push(relation.to_string());
            }
        }

        Ok(attributes)
    }

    pub fn representation_attribute(&self, object_type: &str) -> Result<String, KnowledgeBaseError> {
        self.schema
            .representation_attribute(object_type)
            .map(str::to_string)
    }

    /// Split filters into literal properties and relation attributes
    pub fn split_attributes(
        &self,
        object_type: &str,
        filters: &BTreeMap<String, String>,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>), KnowledgeBaseError> {
        let (_, type_schema) = self.schema.resolve_type(object_type)?;

        Ok(filters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .partition(|(k, _)| !type_schema.relations.contains_key(k)))
    }

    /// Up to `limit` objects matching every attribute and every relation.
    ///
    /// `relations` is keyed by relation attribute (e.g. `singer`), its value
    /// is compared to the related node's representation attribute.
    pub async fn get_objects(
        &self,
        object_type: &str,
        attributes: &BTreeMap<String, String>,
        relations: &BTreeMap<String, String>,
        limit: usize,
    ) -> Result<Vec<KbObject>, KnowledgeBaseError> {
        let (label, type_schema) = self.schema.resolve_type(object_type)?;

        let mut filters = Vec::with_capacity(relations.len());
        for (attribute, value) in relations {
            let relation = type_schema.relations.get(attribute).ok_or_else(|| {
                KnowledgeBaseError::UnknownRelation {
                    object_type: label.to_string(),
                    attribute: attribute.clone(),
                }
            })?;

            filters.push(RelationFilter {
                edge: relation.label.as_str(),
                target_attribute: self.schema.representation_attribute(&relation.target)?,
                value: value.as_str(),
            });
        }

        let attributes: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let cypher = query::find_objects(label, &attributes, &filters, limit)?;
        let objects = self.store.fetch_objects(&cypher).await?;

        tracing::debug!(object_type = label, found = objects.len(), "Fetched objects");

        Ok(objects)
    }

    /// A single object identified by `key_attribute`, falling back to
    /// `representation_attribute`, with relation attributes filled in.
    pub async fn get_object(
        &self,
        object_type: &str,
        identifier: &str,
        key_attribute: &str,
        representation_attribute: &str,
    ) -> Result<Option<KbObject>, KnowledgeBaseError> {
        let (label, type_schema) = self.schema.resolve_type(object_type)?;

        let mut projections = Vec::with_capacity(type_schema.relations.len());
        for (attribute, relation) in &type_schema.relations {
            projections.push(RelationProjection {
                attribute: attribute.as_str(),
                edge: relation.label.as_str(),
                target_attribute: self.schema.representation_attribute(&relation.target)?,
            });
        }

        let cypher = query::find_object(
            label,
            identifier,
            key_attribute,
            representation_attribute,
            &projections,
        )?;

        Ok(self.store.fetch_objects(&cypher).await?.into_iter().next())
    }

    /// Release the store; later lookups fail with a store error
    pub async fn close(&self) {
        self.store.close().await;
    }
}
