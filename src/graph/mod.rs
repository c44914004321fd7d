pub mod knowledge_base;
pub mod operations;
pub mod query;
pub mod schema;

use serde_json::Value;
use std::collections::BTreeMap;

pub use knowledge_base::KnowledgeBase;
pub use operations::{GraphStore, Neo4jConfig, Neo4jStore};
pub use schema::KnowledgeBaseSchema;

/// A node's attributes as returned by the store
pub type KbObject = BTreeMap<String, Value>;
