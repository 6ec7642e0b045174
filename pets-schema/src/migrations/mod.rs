//! Versioned schema migrations.
//!
//! Each migration is a named, ordered list of declarative steps. Names are
//! timestamp-prefixed so lexical order is application order.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::SchemaError;
use crate::schema;
use crate::types::{CollectionDescriptor, IndexDescriptor};

/// One declarative change applied to the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateCollection(CollectionDescriptor),
    CreateIndex(IndexDescriptor),
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Step::CreateCollection(collection) => format!("create collection {}", collection.name),
            Step::CreateIndex(index) if index.unique || index.sparse => format!(
                "create index {}.{} ({})",
                index.collection,
                index.name(),
                index.options_label()
            ),
            Step::CreateIndex(index) => format!("create index {}.{}", index.collection, index.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Migration {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Migration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps,
        }
    }

    /// SHA-256 over the canonical JSON of the steps.
    pub fn checksum(&self) -> Result<String, SchemaError> {
        let canonical = serde_json::to_string(&self.steps)?;
        Ok(calculate_checksum(&canonical))
    }
}

/// Calculate a stable hex checksum for migration content.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Every declared migration in application order.
pub fn all() -> Vec<Migration> {
    let mut migrations = vec![
        Migration::new(
            "20250301_120000_create_collections",
            "Create users, listings and events with validators",
            schema::collections().into_iter().map(Step::CreateCollection).collect(),
        ),
        Migration::new(
            "20250301_120100_create_indexes",
            "Create secondary indexes",
            schema::indexes().into_iter().map(Step::CreateIndex).collect(),
        ),
    ];
    migrations.sort_by(|a, b| a.name.cmp(&b.name));
    migrations
}

/// Finds a declared migration by name.
pub fn find(name: &str) -> Result<Migration, SchemaError> {
    all()
        .into_iter()
        .find(|migration| migration.name == name)
        .ok_or_else(|| SchemaError::UnknownMigration { name: name.to_string() })
}
