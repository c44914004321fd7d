use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{query, Graph};
use std::sync::Mutex;

use super::query::{CypherQuery, Param};
use super::KbObject;
use crate::error::KnowledgeBaseError;

/// Anything that can run a knowledge base query and hand back the `o` column
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn fetch_objects(&self, query: &CypherQuery) -> Result<Vec<KbObject>, KnowledgeBaseError>;

    /// Release the underlying connections
    async fn close(&self);
}

/// Connection parameters for Neo4j
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Neo4j wrapper used by the knowledge base
///
/// Holds the driver's connection pool until `close` is called; every query
/// borrows a pooled connection only for its own duration.
pub struct Neo4jStore {
    graph: Mutex<Option<Graph>>,
}

impl Neo4jStore {
    /// Connect to the database
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", config.uri))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");

        Ok(Self {
            graph: Mutex::new(Some(graph)),
        })
    }

    fn handle(&self) -> Result<Graph, KnowledgeBaseError> {
        self.graph
            .lock()
            .map_err(|_| KnowledgeBaseError::Store("connection lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| KnowledgeBaseError::Store("connection is closed".to_string()))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn fetch_objects(&self, cypher: &CypherQuery) -> Result<Vec<KbObject>, KnowledgeBaseError> {
        let graph = self.handle()?;

        tracing::debug!(query = %cypher.text, params = cypher.params.len(), "Running Cypher");

        let mut q = query(&cypher.text);
        for (name, value) in &cypher.params {
            q = match value {
                Param::Text(s) => q.param(name, s.clone()),
                Param::Int(i) => q.param(name, *i),
            };
        }

        let mut rows = graph
            .execute(q)
            .await
            .map_err(|e| KnowledgeBaseError::Store(e.to_string()))?;

        let mut objects = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| KnowledgeBaseError::Store(e.to_string()))?
        {
            match row.get::<KbObject>("o") {
                Ok(object) => objects.push(object),
                // Rows that don't decode are dropped, never fatal
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable row"),
            }
        }

        Ok(objects)
    }

    async fn close(&self) {
        let graph = match self.graph.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if graph.is_some() {
            tracing::info!("Closed Neo4j connection pool");
        }
    }
}
