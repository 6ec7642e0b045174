//! Migration state tracking in a MongoDB history collection.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;

/// Applied migration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Migration name (e.g., "20250301_120000_create_collections")
    pub name: String,
    /// When the migration was applied
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub applied_at: DateTime<Utc>,
    /// Checksum of the migration steps at the time they were applied
    pub checksum: String,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Number of steps that changed the database
    pub steps_applied: u32,
    /// Number of steps skipped because the target already existed
    pub steps_skipped: u32,
}

/// Migration state manager.
pub struct MigrationState {
    collection: Collection<AppliedMigration>,
}

impl MigrationState {
    pub fn new(db: &Database, history_collection: &str) -> Self {
        Self {
            collection: db.collection(history_collection),
        }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Create the unique index on `name`. Creates the history collection as a side effect.
    pub async fn ensure_index(&self) -> Result<(), SchemaError> {
        let model = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(model, None).await?;
        Ok(())
    }

    /// List all applied migrations ordered by name.
    pub async fn list_applied(&self) -> Result<Vec<AppliedMigration>, SchemaError> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.collection.find(None, options).await?;
        let applied: Vec<AppliedMigration> = cursor.try_collect().await?;
        Ok(applied)
    }

    /// Check if a migration has been applied.
    pub async fn is_applied(&self, name: &str) -> Result<bool, SchemaError> {
        let count = self.collection.count_documents(doc! { "name": name }, None).await?;
        Ok(count > 0)
    }

    /// Record a migration as applied.
    pub async fn record_applied(&self, migration: &AppliedMigration) -> Result<(), SchemaError> {
        self.ensure_index().await?;
        self.collection.insert_one(migration, None).await?;
        Ok(())
    }

    /// Remove a migration record. Returns false when no record existed.
    pub async fn remove_applied(&self, name: &str) -> Result<bool, SchemaError> {
        let result = self.collection.delete_one(doc! { "name": name }, None).await?;
        Ok(result.deleted_count > 0)
    }

    /// Mark a migration as applied without running it (for resolve command).
    pub async fn mark_applied(&self, name: &str, checksum: &str) -> Result<(), SchemaError> {
        let migration = AppliedMigration {
            name: name.to_string(),
            applied_at: Utc::now(),
            checksum: checksum.to_string(),
            execution_time_ms: 0,
            steps_applied: 0,
            steps_skipped: 0,
        };
        self.record_applied(&migration).await
    }

    /// Mark a migration as rolled back (remove from applied).
    pub async fn mark_rolled_back(&self, name: &str) -> Result<bool, SchemaError> {
        self.remove_applied(name).await
    }

    /// Get the last applied migration.
    pub async fn last_applied(&self) -> Result<Option<AppliedMigration>, SchemaError> {
        Ok(self.list_applied().await?.into_iter().last())
    }
}
