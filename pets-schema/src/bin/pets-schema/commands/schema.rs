use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use mongodb::bson::Bson;
use serde::Serialize;
use serde_json::Value;

use pets_schema::executor::{MigrationContext, MigrationState};
use pets_schema::schema::LiveState;
use pets_schema::{CollectionDescriptor, IndexDescriptor, Settings, schema};

use crate::help::Example;
use crate::output::{GlobalOptions, OutputFormat, OutputManager, TableDisplay, add_table_header, themed_table};

pub const EXAMPLES: &[Example] = &[
    Example {
        command: "pets-schema schema show",
        note: "Fields and indexes of every collection",
    },
    Example {
        command: "pets-schema schema show listings",
        note: "Only the listings collection",
    },
    Example {
        command: "pets-schema --output json schema show",
        note: "Rendered $jsonSchema validators",
    },
    Example {
        command: "pets-schema schema status",
        note: "Missing and drifted collections or indexes",
    },
];

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Show declared collections, validators and indexes
    #[command(name = "show")]
    Show {
        /// Collection to show (optional, shows all if omitted)
        collection: Option<String>,
    },

    /// Compare the live database with the declared schema
    #[command(name = "status")]
    Status,
}

pub async fn handle_schema_commands(
    command: SchemaCommands,
    settings: &Settings,
    output: &OutputManager,
) -> Result<()> {
    match command {
        SchemaCommands::Show { collection } => handle_show(collection.as_deref(), settings, output),
        SchemaCommands::Status => handle_status(settings, output).await,
    }
}

#[derive(Serialize)]
struct CollectionView {
    name: String,
    validator: Value,
    indexes: Vec<IndexDescriptor>,
    #[serde(skip)]
    descriptor: CollectionDescriptor,
}

impl CollectionView {
    fn new(descriptor: CollectionDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            validator: Bson::Document(descriptor.validator()).into_relaxed_extjson(),
            indexes: schema::indexes_for(&descriptor.name),
            descriptor,
        }
    }
}

impl TableDisplay for CollectionView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(&mut table, options, &["Field", "BSON Type", "Required", "Allowed", "Description"]);

        for field in &self.descriptor.fields {
            table.add_row(vec![
                Cell::new(&field.name),
                Cell::new(field.kind.as_str()),
                Cell::new(if field.required { "yes" } else { "" }),
                Cell::new(field.allowed.as_ref().map(|values| values.join(", ")).unwrap_or_default()),
                Cell::new(&field.description),
            ]);
        }

        table
    }

    fn to_compact(&self) -> String {
        format!(
            "{}: {} field(s), {} required, {} index(es)",
            self.name,
            self.descriptor.fields.len(),
            self.descriptor.required_fields().len(),
            self.indexes.len()
        )
    }
}

/// Index overview across the requested collections.
#[derive(Serialize)]
struct SchemaView {
    database: String,
    collections: Vec<CollectionView>,
}

impl SchemaView {
    fn new(collection: Option<&str>, settings: &Settings) -> Result<Self> {
        let descriptors = match collection {
            Some(name) => vec![schema::collection(name)?],
            None => schema::collections(),
        };
        Ok(Self {
            database: settings.mongodb.database.clone(),
            collections: descriptors.into_iter().map(CollectionView::new).collect(),
        })
    }
}

impl TableDisplay for SchemaView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(&mut table, options, &["Collection", "Index", "Key", "Options"]);

        for collection in &self.collections {
            for index in &collection.indexes {
                table.add_row(vec![
                    Cell::new(&collection.name),
                    Cell::new(index.name()),
                    Cell::new(format!("{} {}", index.field, index.direction.arrow())),
                    Cell::new(index.options_label()),
                ]);
            }
        }

        table
    }

    fn to_compact(&self) -> String {
        self.collections
            .iter()
            .map(|collection| format!("{}.{}", self.database, collection.to_compact()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn handle_show(collection: Option<&str>, settings: &Settings, output: &OutputManager) -> Result<()> {
    let view = SchemaView::new(collection, settings)?;

    if output.is_json() || output.options.output_format == OutputFormat::Compact {
        return output.display(&view);
    }

    output.key_value("Database", &settings.mongodb.database);
    for collection in &view.collections {
        output.heading(&format!("Collection: {}", collection.name));
        output.display(collection)?;
    }

    output.heading("Indexes");
    output.display(&view)
}

#[derive(Serialize)]
struct IndexState {
    name: String,
    state: LiveState,
}

#[derive(Serialize)]
struct CollectionState {
    name: String,
    validator: LiveState,
    indexes: Vec<IndexState>,
}

impl CollectionState {
    fn index_names(&self, wanted: impl Fn(&LiveState) -> bool) -> Vec<&str> {
        self.indexes
            .iter()
            .filter(|index| wanted(&index.state))
            .map(|index| index.name.as_str())
            .collect()
    }

    fn drift(&self) -> Vec<String> {
        let mut drift = Vec::new();
        if let LiveState::Differs(detail) = &self.validator {
            drift.push(format!("validator: {detail}"));
        }
        for index in &self.indexes {
            if let LiveState::Differs(detail) = &index.state {
                drift.push(format!("{}: {detail}", index.name));
            }
        }
        drift
    }
}

#[derive(Serialize)]
struct LiveView {
    database: String,
    collections: Vec<CollectionState>,
    history_collection: String,
    applied_migrations: usize,
}

impl LiveView {
    fn is_complete(&self) -> bool {
        self.collections
            .iter()
            .all(|collection| collection.validator.matches() && collection.indexes.iter().all(|i| i.state.matches()))
    }

    fn has_drift(&self) -> bool {
        self.collections.iter().any(|collection| !collection.drift().is_empty())
    }
}

impl TableDisplay for LiveView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(
            &mut table,
            options,
            &["Collection", "Exists", "Indexes Present", "Indexes Missing", "Drift"],
        );

        for collection in &self.collections {
            table.add_row(vec![
                Cell::new(&collection.name),
                Cell::new(if collection.validator.is_missing() { "no" } else { "yes" }),
                Cell::new(collection.index_names(LiveState::matches).join(", ")),
                Cell::new(collection.index_names(LiveState::is_missing).join(", ")),
                Cell::new(collection.drift().join("\n")),
            ]);
        }

        table
    }

    fn to_compact(&self) -> String {
        let state = if self.is_complete() {
            "complete"
        } else if self.has_drift() {
            "drifted"
        } else {
            "incomplete"
        };
        format!(
            "{}: {state}, {} migration(s) applied",
            self.database, self.applied_migrations
        )
    }
}

async fn handle_status(settings: &Settings, output: &OutputManager) -> Result<()> {
    output.heading("Schema Status");
    output.key_value("Database", &settings.mongodb.database);

    output.progress("Connecting to MongoDB");
    let ctx = MigrationContext::connect(&settings.mongodb)
        .await
        .context("Failed to connect to MongoDB")?;
    output.clear_line();

    let mut collections = Vec::new();
    for descriptor in schema::collections() {
        let validator = ctx.inspect_collection(&descriptor).await?;
        let live = ctx.indexes(&descriptor.name).await?;
        let indexes = schema::indexes_for(&descriptor.name)
            .iter()
            .map(|index| IndexState {
                name: index.name(),
                state: index.state_in(&live),
            })
            .collect();

        collections.push(CollectionState {
            name: descriptor.name,
            validator,
            indexes,
        });
    }

    let history = MigrationState::new(ctx.database(), &settings.migrations.history_collection);
    let view = LiveView {
        database: settings.mongodb.database.clone(),
        collections,
        history_collection: history.collection_name().to_string(),
        applied_migrations: history.list_applied().await?.len(),
    };

    output.display(&view)?;

    if view.is_complete() {
        output.success("Database matches the declared schema");
    } else if view.has_drift() {
        output.warning("Existing collections or indexes differ from their declarations");
        output.info("'migrate deploy' refuses to continue until they are fixed or dropped");
    } else {
        output.warning("Database is missing declared collections or indexes");
        output.info("Run 'pets-schema migrate deploy' to create them");
    }

    Ok(())
}
