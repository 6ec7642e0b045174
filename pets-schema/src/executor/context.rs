//! Migration context providing MongoDB access during migration execution.

use futures::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{Document, doc};
use mongodb::options::{
    ClientOptions, CreateCollectionOptions, IndexOptions, ValidationAction, ValidationLevel,
};
use mongodb::{Client, Database, IndexModel};

use crate::config::MongoSettings;
use crate::errors::SchemaError;
use crate::migrations::Step;
use crate::schema::LiveState;
use crate::types::{CollectionDescriptor, IndexDescriptor};

/// What happened when a step was applied or reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The change was made.
    Applied,
    /// Nothing to do; the reason says why.
    Skipped(String),
    /// Dry-run mode: the change would have been made.
    Planned,
}

/// Context for executing migrations against one database.
pub struct MigrationContext {
    db: Database,
    dry_run: bool,
}

impl MigrationContext {
    /// Connect to the configured server and select the target database.
    ///
    /// `${VAR}` references left in `settings` are expanded first.
    pub async fn connect(settings: &MongoSettings) -> Result<Self, SchemaError> {
        let settings = settings.resolved()?;
        let mut options = ClientOptions::parse(&settings.uri).await?;
        options.app_name = Some(settings.app_name.clone());
        let client = Client::with_options(options)?;

        // Fail fast on an unreachable server instead of on the first step.
        client.database("admin").run_command(doc! { "ping": 1 }, None).await?;

        Ok(Self::from_database(client.database(&settings.database)))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db, dry_run: false }
    }

    /// Enable dry-run mode (no writes).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn collection_names(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self.db.list_collection_names(None).await?)
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool, SchemaError> {
        Ok(self.collection_names().await?.iter().any(|existing| existing == name))
    }

    /// Index names on `collection`; empty when the collection does not exist.
    pub async fn index_names(&self, collection: &str) -> Result<Vec<String>, SchemaError> {
        if !self.collection_exists(collection).await? {
            return Ok(Vec::new());
        }
        Ok(self.db.collection::<Document>(collection).list_index_names().await?)
    }

    /// Full index specifications on `collection`; empty when the collection does not exist.
    pub async fn indexes(&self, collection: &str) -> Result<Vec<IndexModel>, SchemaError> {
        if !self.collection_exists(collection).await? {
            return Ok(Vec::new());
        }
        let cursor = self.db.collection::<Document>(collection).list_indexes(None).await?;
        let indexes: Vec<IndexModel> = cursor.try_collect().await?;
        Ok(indexes)
    }

    /// Compares a live collection's validator with its declaration.
    pub async fn inspect_collection(&self, collection: &CollectionDescriptor) -> Result<LiveState, SchemaError> {
        let mut cursor = self
            .db
            .list_collections(doc! { "name": collection.name.as_str() }, None)
            .await?;
        let Some(live) = cursor.try_next().await? else {
            return Ok(LiveState::Missing);
        };
        Ok(collection.validator_state(live.options.validator.as_ref()))
    }

    /// Compares a live index with its declaration.
    pub async fn inspect_index(&self, index: &IndexDescriptor) -> Result<LiveState, SchemaError> {
        Ok(index.state_in(&self.indexes(&index.collection).await?))
    }

    pub async fn apply(&self, step: &Step) -> Result<StepOutcome, SchemaError> {
        match step {
            Step::CreateCollection(collection) => self.create_collection(collection).await,
            Step::CreateIndex(index) => self.create_index(index).await,
        }
    }

    /// Undo a step. Missing targets are skipped.
    pub async fn revert(&self, step: &Step) -> Result<StepOutcome, SchemaError> {
        match step {
            Step::CreateCollection(collection) => self.drop_collection(&collection.name).await,
            Step::CreateIndex(index) => self.drop_index(index).await,
        }
    }

    async fn create_collection(&self, collection: &CollectionDescriptor) -> Result<StepOutcome, SchemaError> {
        match self.inspect_collection(collection).await? {
            LiveState::Missing => {}
            LiveState::Matches => {
                debug!("collection {} already exists", collection.name);
                return Ok(StepOutcome::Skipped("collection exists".to_string()));
            }
            LiveState::Differs(detail) => {
                return Err(SchemaError::Conflict {
                    collection: collection.name.clone(),
                    object: "validator".to_string(),
                    detail,
                });
            }
        }
        if self.dry_run {
            return Ok(StepOutcome::Planned);
        }

        let options = CreateCollectionOptions::builder()
            .validator(collection.validator())
            .validation_level(ValidationLevel::Strict)
            .validation_action(ValidationAction::Error)
            .build();
        self.db.create_collection(&collection.name, options).await?;

        info!("created collection {}", collection.name);
        Ok(StepOutcome::Applied)
    }

    async fn create_index(&self, index: &IndexDescriptor) -> Result<StepOutcome, SchemaError> {
        let name = index.name();
        match self.inspect_index(index).await? {
            LiveState::Missing => {}
            LiveState::Matches => {
                debug!("index {}.{} already exists", index.collection, name);
                return Ok(StepOutcome::Skipped("index exists".to_string()));
            }
            LiveState::Differs(detail) => {
                return Err(SchemaError::Conflict {
                    collection: index.collection.clone(),
                    object: format!("index {name}"),
                    detail,
                });
            }
        }
        if self.dry_run {
            return Ok(StepOutcome::Planned);
        }

        let mut options = IndexOptions::builder().name(name.clone()).build();
        if index.unique {
            options.unique = Some(true);
        }
        if index.sparse {
            options.sparse = Some(true);
        }

        let model = IndexModel::builder().keys(index.keys()).options(options).build();
        self.db
            .collection::<Document>(&index.collection)
            .create_index(model, None)
            .await?;

        info!("created index {}.{}", index.collection, name);
        Ok(StepOutcome::Applied)
    }

    async fn drop_collection(&self, name: &str) -> Result<StepOutcome, SchemaError> {
        if !self.collection_exists(name).await? {
            return Ok(StepOutcome::Skipped("collection missing".to_string()));
        }
        if self.dry_run {
            return Ok(StepOutcome::Planned);
        }

        self.db.collection::<Document>(name).drop(None).await?;
        info!("dropped collection {name}");
        Ok(StepOutcome::Applied)
    }

    async fn drop_index(&self, index: &IndexDescriptor) -> Result<StepOutcome, SchemaError> {
        let name = index.name();
        if !self.index_names(&index.collection).await?.contains(&name) {
            return Ok(StepOutcome::Skipped("index missing".to_string()));
        }
        if self.dry_run {
            return Ok(StepOutcome::Planned);
        }

        self.db
            .collection::<Document>(&index.collection)
            .drop_index(name.as_str(), None)
            .await?;
        info!("dropped index {}.{}", index.collection, name);
        Ok(StepOutcome::Applied)
    }
}
