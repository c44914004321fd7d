//! Cypher construction for the knowledge base lookups.
//!
//! Values always travel as parameters. Labels, edge types and property keys
//! cannot be parameterized in Cypher, so every one of them is checked with
//! [`ensure_identifier`] before it is written into the query text.

use super::schema::ensure_identifier;
use crate::error::KnowledgeBaseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
}

/// Query text plus its named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub text: String,
    pub params: Vec<(String, Param)>,
}

impl CypherQuery {
    fn new() -> Self {
        Self {
            text: String::new(),
            params: Vec::new(),
        }
    }

    /// Register a text parameter and return its placeholder
    fn bind_text(&mut self, value: &str) -> String {
        let name = format!("p{}", self.params.len());
        self.params.push((name.clone(), Param::Text(value.to_string())));
        format!("${}", name)
    }

    fn bind_int(&mut self, name: &str, value: i64) -> String {
        self.params.push((name.to_string(), Param::Int(value)));
        format!("${}", name)
    }
}

/// Existence filter on an outgoing edge: `(o)-[:edge]->(t)` with `t.target_attribute = value`
#[derive(Debug, Clone, Copy)]
pub struct RelationFilter<'a> {
    pub edge: &'a str,
    pub target_attribute: &'a str,
    pub value: &'a str,
}

/// Projection of a related node's attribute into the returned object
#[derive(Debug, Clone, Copy)]
pub struct RelationProjection<'a> {
    pub attribute: &'a str,
    pub edge: &'a str,
    pub target_attribute: &'a str,
}

/// One arbitrary node of a label
pub fn sample_object(label: &str) -> Result<CypherQuery, KnowledgeBaseError> {
    let label = ensure_identifier(label)?;

    let mut query = CypherQuery::new();
    query.text = format!("MATCH (o:{}) RETURN properties(o) AS o LIMIT 1", label);

    Ok(query)
}

/// Nodes of a label matching every attribute and every relation filter.
///
/// Slot values are text, so properties are compared through `toString`.
pub fn find_objects(
    label: &str,
    attributes: &[(&str, &str)],
    relations: &[RelationFilter<'_>],
    limit: usize,
) -> Result<CypherQuery, KnowledgeBaseError> {
    let label = ensure_identifier(label)?;
    let mut query = CypherQuery::new();
    let mut conditions = Vec::new();

    for (key, value) in attributes {
        let key = ensure_identifier(key)?;
        let placeholder = query.bind_text(value);
        conditions.push(format!("toString(o.{}) = {}", key, placeholder));
    }

    for (i, relation) in relations.iter().enumerate() {
        let edge = ensure_identifier(relation.edge)?;
        let target_attribute = ensure_identifier(relation.target_attribute)?;
        let placeholder = query.bind_text(relation.value);
        conditions.push(format!(
            "EXISTS {{ MATCH (o)-[:{}]->(t{}) WHERE t{}.{} = {} }}",
            edge, i, i, target_attribute, placeholder
        ));
    }

    let mut text = format!("MATCH (o:{})", label);
    if !conditions.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&conditions.join(" AND "));
    }
    let limit = query.bind_int("limit", limit as i64);
    text.push_str(&format!(" RETURN properties(o) AS o LIMIT {}", limit));

    query.text = text;
    Ok(query)
}

/// The node whose key attribute, or failing that its representation
/// attribute, equals `identifier`, with related attributes projected in.
pub fn find_object(
    label: &str,
    identifier: &str,
    key_attribute: &str,
    representation_attribute: &str,
    projections: &[RelationProjection<'_>],
) -> Result<CypherQuery, KnowledgeBaseError> {
    let label = ensure_identifier(label)?;
    let key = ensure_identifier(key_attribute)?;
    let repr = ensure_identifier(representation_attribute)?;

    let mut query = CypherQuery::new();
    let id = query.bind_text(identifier);

    let mut parts = vec![
        format!(
            "MATCH (o:{}) WHERE toString(o.{}) = {} OR o.{} = {}",
            label, key, id, repr, id
        ),
        format!(
            "WITH o ORDER BY CASE WHEN toString(o.{}) = {} THEN 0 ELSE 1 END LIMIT 1",
            key, id
        ),
    ];

    let mut fields = vec![".*".to_string()];
    for (i, projection) in projections.iter().enumerate() {
        let attribute = ensure_identifier(projection.attribute)?;
        let edge = ensure_identifier(projection.edge)?;
        let target_attribute = ensure_identifier(projection.target_attribute)?;

        parts.push(format!("OPTIONAL MATCH (o)-[:{}]->(r{})", edge, i));
        fields.push(format!("{}: r{}.{}", attribute, i, target_attribute));
    }
    parts.push(format!("RETURN o{{{}}} AS o LIMIT 1", fields.join(", ")));

    query.text = parts.join(" ");
    Ok(query)
}
