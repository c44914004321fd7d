use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::KnowledgeBaseError;

// Knowledge base schema
// Declares, per node label, which attributes are stored as outgoing edges
// and which attribute names an object for display.

fn default_representation_attribute() -> String {
    "name".to_string()
}

/// Attribute stored as an edge `(o)-[:label]->(:target)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSchema {
    pub label: String,
    pub target: String,
}

/// Schema of one node label
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectTypeSchema {
    #[serde(default)]
    pub representation_attribute: Option<String>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseSchema {
    #[serde(default = "default_representation_attribute")]
    pub default_representation_attribute: String,
    pub types: BTreeMap<String, ObjectTypeSchema>,
}

impl Default for KnowledgeBaseSchema {
    /// Singers, albums and the songs linking them
    fn default() -> Self {
        let song = ObjectTypeSchema {
            representation_attribute: None,
            relations: BTreeMap::from([
                (
                    "singer".to_string(),
                    RelationSchema {
                        label: "SUNG_BY".to_string(),
                        target: "Singer".to_string(),
                    },
                ),
                (
                    "album".to_string(),
                    RelationSchema {
                        label: "INCLUDED_IN".to_string(),
                        target: "Album".to_string(),
                    },
                ),
            ]),
        };

        Self {
            default_representation_attribute: default_representation_attribute(),
            types: BTreeMap::from([
                ("Singer".to_string(), ObjectTypeSchema::default()),
                ("Album".to_string(), ObjectTypeSchema::default()),
                ("Song".to_string(), song),
            ]),
        }
    }
}

/// Plain Cypher identifier: letters, digits and underscores, not starting with a digit
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn ensure_identifier(s: &str) -> Result<&str, KnowledgeBaseError> {
    if is_identifier(s) {
        Ok(s)
    } else {
        Err(KnowledgeBaseError::InvalidIdentifier(s.to_string()))
    }
}

impl KnowledgeBaseSchema {
    /// Load a schema from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file {}", path.display()))?;
        let schema: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse schema file {}", path.display()))?;

        schema.validate()?;

        Ok(schema)
    }

    /// Check every name that ends up inside query text
    pub fn validate(&self) -> Result<(), KnowledgeBaseError> {
        let invalid = |msg: String| KnowledgeBaseError::InvalidSchema(msg);

        if !is_identifier(&self.default_representation_attribute) {
            return Err(invalid(format!(
                "default representation attribute '{}' is not an identifier",
                self.default_representation_attribute
            )));
        }

        let mut seen = HashSet::new();
        for (name, object_type) in &self.types {
            if !is_identifier(name) {
                return Err(invalid(format!("type name '{}' is not an identifier", name)));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(invalid(format!("type '{}' is declared more than once", name)));
            }

            if let Some(attr) = &object_type.representation_attribute {
                if !is_identifier(attr) {
                    return Err(invalid(format!(
                        "representation attribute '{}' of '{}' is not an identifier",
                        attr, name
                    )));
                }
            }

            for (attribute, relation) in &object_type.relations {
                if !is_identifier(attribute) || !is_identifier(&relation.label) {
                    return Err(invalid(format!(
                        "relation '{}' -> '{}' of '{}' is not an identifier",
                        attribute, relation.label, name
                    )));
                }
                if !self.types.contains_key(&relation.target) {
                    return Err(invalid(format!(
                        "relation '{}' of '{}' points at undeclared type '{}'",
                        attribute, name, relation.target
                    )));
                }
            }
        }

        Ok(())
    }

    /// Declared label for a type name, matched case-insensitively ("song" -> "Song")
    pub fn resolve_type(&self, object_type: &str) -> Result<(&str, &ObjectTypeSchema), KnowledgeBaseError> {
        self.types
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(object_type))
            .map(|(name, schema)| (name.as_str(), schema))
            .ok_or_else(|| KnowledgeBaseError::UnknownType(object_type.to_string()))
    }

    pub fn representation_attribute(&self, object_type: &str) -> Result<&str, KnowledgeBaseError> {
        let (_, schema) = self.resolve_type(object_type)?;

        Ok(schema
            .representation_attribute
            .as_deref()
            .unwrap_or(self.default_representation_attribute.as_str()))
    }

    pub fn relation_attributes(&self, object_type: &str) -> Result<Vec<&str>, KnowledgeBaseError> {
        let (_, schema) = self.resolve_type(object_type)?;

        Ok(schema.relations.keys().map(String::as_str).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_is_valid() {
        let schema = KnowledgeBaseSchema::default();
        schema.validate().unwrap();

        assert_eq!(schema.relation_attributes("Song").unwrap(), vec!["album", "singer"]);
        assert!(schema.relation_attributes("Singer").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_type_is_case_insensitive() {
        let schema = KnowledgeBaseSchema::default();

        let (label, _) = schema.resolve_type("song").unwrap();
        assert_eq!(label, "Song");

        let err = schema.resolve_type("Movie").unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::UnknownType(t) if t == "Movie"));
    }

    #[test]
    fn test_representation_attribute_override() {
        let mut schema = KnowledgeBaseSchema::default();
        schema
            .types
            .get_mut("Album")
            .unwrap()
            .representation_attribute = Some("title".to_string());

        assert_eq!(schema.representation_attribute("album").unwrap(), "title");
        assert_eq!(schema.representation_attribute("Singer").unwrap(), "name");
    }

    #[test]
    fn test_validate_rejects_bad_schemas() {
        let mut schema = KnowledgeBaseSchema::default();
        schema
            .types
            .get_mut("Song")
            .unwrap()
            .relations
            .insert(
                "label".to_string(),
                RelationSchema {
                    label: "RELEASED_BY".to_string(),
                    target: "Label".to_string(),
                },
            );
        assert!(matches!(
            schema.validate(),
            Err(KnowledgeBaseError::InvalidSchema(_))
        ));

        let mut schema = KnowledgeBaseSchema::default();
        schema.types.insert("song".to_string(), ObjectTypeSchema::default());
        assert!(schema.validate().is_err());

        let mut schema = KnowledgeBaseSchema::default();
        schema
            .types
            .insert("Bad Label".to_string(), ObjectTypeSchema::default());
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_schema_from_json() {
        let raw = r#"{
  "types": {
    "Person": {"representation_attribute": "full_name"},
    "Company": {"relations": {"ceo": {"label": "LED_BY", "target": "Person"}}}
  }
}"#;
        let schema: KnowledgeBaseSchema = serde_json::from_str(raw).unwrap();
        schema.validate().unwrap();

        assert_eq!(schema.default_representation_attribute, "name");
        assert_eq!(schema.representation_attribute("person").unwrap(), "full_name");
        assert_eq!(schema.relation_attributes("Company").unwrap(), vec!["ceo"]);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("name"));
        assert!(is_identifier("_release_year2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2nd"));
        assert!(!is_identifier("name}) DETACH DELETE (o"));
    }
}
