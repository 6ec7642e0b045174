use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use serde::Serialize;

use pets_schema::executor::{DeployReport, MigrationRunner, MigrationStatus, StepOutcome, StepReport};
use pets_schema::{COMPLETION_MESSAGE, Settings, migrations};

use crate::help::Example;
use crate::output::{
    GlobalOptions, OutputFormat, OutputManager, TableDisplay, add_table_header, format_datetime, themed_table,
};
use crate::theme::Icon;

pub const EXAMPLES: &[Example] = &[
    Example {
        command: "pets-schema migrate deploy",
        note: "Create collections, validators and indexes",
    },
    Example {
        command: "pets-schema migrate deploy --dry-run",
        note: "List the steps without touching the database",
    },
    Example {
        command: "pets-schema --output json migrate status",
        note: "Applied and pending migrations as JSON",
    },
    Example {
        command: "pets-schema migrate rollback",
        note: "Drop what the newest migration created",
    },
    Example {
        command: "pets-schema migrate resolve <NAME> --applied",
        note: "Record a migration that was applied by hand",
    },
];

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Apply pending migrations (the database initializer)
    #[command(name = "deploy")]
    Deploy {
        /// Preview what would be migrated without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Show which migrations are applied and which are pending
    #[command(name = "status")]
    Status,

    /// Revert the most recently applied migration
    #[command(name = "rollback")]
    Rollback {
        /// Preview what would be reverted without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Manually mark a migration as applied or rolled back
    #[command(name = "resolve")]
    Resolve {
        /// Migration name to resolve
        migration_name: String,

        /// Mark the migration as applied
        #[arg(long, conflicts_with = "rolled_back")]
        applied: bool,

        /// Mark the migration as rolled back
        #[arg(long, conflicts_with = "applied")]
        rolled_back: bool,
    },
}

pub async fn handle_migrate_commands(
    command: MigrateCommands,
    settings: &Settings,
    output: &OutputManager,
) -> Result<()> {
    match command {
        MigrateCommands::Deploy { dry_run } => handle_deploy(settings, dry_run, output).await,
        MigrateCommands::Status => handle_status(settings, output).await,
        MigrateCommands::Rollback { dry_run } => handle_rollback(settings, dry_run, output).await,
        MigrateCommands::Resolve {
            migration_name,
            applied,
            rolled_back,
        } => handle_resolve(settings, &migration_name, applied, rolled_back, output).await,
    }
}

async fn connect(settings: &Settings, dry_run: bool, output: &OutputManager) -> Result<MigrationRunner> {
    output.key_value("Database", &settings.mongodb.database);
    output.progress("Connecting to MongoDB");
    let runner = MigrationRunner::connect(settings, dry_run)
        .await
        .context("Failed to connect to MongoDB")?;
    output.clear_line();
    output.success("Connected to MongoDB");
    Ok(runner)
}

fn step_icon(outcome: &StepOutcome, reverting: bool) -> Icon {
    match outcome {
        StepOutcome::Applied if reverting => Icon::Dropped,
        StepOutcome::Applied => Icon::Created,
        StepOutcome::Skipped(_) => Icon::Unchanged,
        StepOutcome::Planned => Icon::Planned,
    }
}

fn format_step(step: &StepReport) -> String {
    match &step.outcome {
        StepOutcome::Skipped(reason) => format!("{} (skipped: {reason})", step.description),
        StepOutcome::Planned => format!("{} (planned)", step.description),
        StepOutcome::Applied => step.description.clone(),
    }
}

/// Machine-readable summary of `migrate deploy`.
#[derive(Serialize)]
struct DeployView {
    database: String,
    applied: Vec<String>,
    already_applied: u32,
    steps_applied: u32,
    steps_planned: u32,
    steps_skipped: u32,
    drifted: Vec<String>,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl DeployView {
    fn new(database: &str, report: &DeployReport) -> Self {
        Self {
            database: database.to_string(),
            applied: report.runs.iter().map(|run| run.name.clone()).collect(),
            already_applied: report.stats.migrations_skipped,
            steps_applied: report.stats.steps_applied,
            steps_planned: report.stats.steps_planned,
            steps_skipped: report.stats.steps_skipped,
            drifted: report.drifted.clone(),
            dry_run: report.dry_run,
            message: (!report.dry_run).then_some(COMPLETION_MESSAGE),
        }
    }
}

impl TableDisplay for DeployView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(&mut table, options, &["Migration", "Result"]);
        for name in &self.applied {
            let result = if self.dry_run { "planned" } else { "applied" };
            table.add_row(vec![Cell::new(name), Cell::new(result)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "{}: {} applied, {} already applied, {} step(s) skipped",
            self.database,
            self.applied.len(),
            self.already_applied,
            self.steps_skipped
        )
    }
}

async fn handle_deploy(settings: &Settings, dry_run: bool, output: &OutputManager) -> Result<()> {
    output.heading("Deploy Migrations");

    if dry_run {
        output.warning("DRY RUN MODE - No changes will be made");
    }

    let runner = connect(settings, dry_run, output).await?;
    let declared = migrations::all();
    output.info(&format!("Found {} migration(s)", declared.len()));

    let report = runner.deploy(&declared).await?;

    if output.options.output_format != OutputFormat::Table {
        return output.display(&DeployView::new(&settings.mongodb.database, &report));
    }

    for run in &report.runs {
        output.heading(&format!("Applying: {}", run.name));
        for step in &run.steps {
            output.indented(step_icon(&step.outcome, false), &format_step(step));
        }
        output.verbose(&format!("{} finished in {}ms", run.name, run.execution_time_ms));
    }

    for name in &report.drifted {
        output.warning(&format!("Migration '{name}' changed after it was applied"));
    }

    output.heading("Summary");

    if report.is_up_to_date() {
        output.success("All migrations are up to date");
    } else {
        output.success(&format!(
            "{} migration(s) applied in {}ms",
            report.stats.migrations_applied, report.stats.total_time_ms
        ));
        let changed = if report.dry_run {
            format!("{} step(s) planned", report.stats.steps_planned)
        } else {
            format!("{} step(s) applied", report.stats.steps_applied)
        };
        output.bullet(&format!("{changed}, {} already present", report.stats.steps_skipped));
    }

    if report.stats.migrations_skipped > 0 {
        output.info(&format!("{} migration(s) already applied", report.stats.migrations_skipped));
    }

    if dry_run {
        output.warning("DRY RUN - No actual changes were made");
    } else {
        output.success(COMPLETION_MESSAGE);
    }

    Ok(())
}

/// Serializable view of `migrate status`.
#[derive(Serialize)]
struct StatusView {
    database: String,
    migrations: Vec<MigrationStatus>,
}

impl TableDisplay for StatusView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(&mut table, options, &["Migration", "Status", "Applied At", "Checksum"]);

        for migration in &self.migrations {
            let (status, applied_at) = match migration.applied_at {
                Some(at) => ("applied", format_datetime(at)),
                None => ("pending", String::new()),
            };
            let checksum = match migration.checksum_matches {
                Some(true) => "ok",
                Some(false) => "changed",
                None => "",
            };
            table.add_row(vec![
                Cell::new(&migration.name),
                Cell::new(status),
                Cell::new(applied_at),
                Cell::new(checksum),
            ]);
        }

        table
    }

    fn to_compact(&self) -> String {
        let applied = self.migrations.iter().filter(|m| m.is_applied()).count();
        format!(
            "{}: {applied} applied, {} pending",
            self.database,
            self.migrations.len() - applied
        )
    }
}

async fn handle_status(settings: &Settings, output: &OutputManager) -> Result<()> {
    output.heading("Migration Status");
    let runner = connect(settings, false, output).await?;

    let view = StatusView {
        database: settings.mongodb.database.clone(),
        migrations: runner.status(&migrations::all()).await?,
    };
    output.display(&view)
}

async fn handle_rollback(settings: &Settings, dry_run: bool, output: &OutputManager) -> Result<()> {
    output.heading("Rollback Migration");

    if dry_run {
        output.warning("DRY RUN MODE - No changes will be made");
    }

    let runner = connect(settings, dry_run, output).await?;

    match runner.rollback_last(&migrations::all()).await? {
        None => output.info("No applied migrations to roll back"),
        Some(report) => {
            output.heading(&format!("Reverting: {}", report.name));
            for step in &report.steps {
                output.indented(step_icon(&step.outcome, true), &format_step(step));
            }
            if report.dry_run {
                output.warning("DRY RUN - No actual changes were made");
            } else {
                output.success(&format!("Rolled back '{}'", report.name));
            }
        }
    }

    Ok(())
}

async fn handle_resolve(
    settings: &Settings,
    migration_name: &str,
    applied: bool,
    rolled_back: bool,
    output: &OutputManager,
) -> Result<()> {
    if !applied && !rolled_back {
        output.error("Must specify either --applied or --rolled-back");
        anyhow::bail!("Missing resolution flag");
    }

    let status = if applied { "applied" } else { "rolled-back" };

    output.heading(&format!("Resolve Migration: {migration_name}"));
    output.info(&format!("Marking migration as: {status}"));

    let runner = connect(settings, false, output).await?;
    let state = runner.state();

    if applied {
        let checksum = migrations::find(migration_name)?.checksum()?;

        if state.is_applied(migration_name).await? {
            output.warning(&format!("Migration '{migration_name}' is already marked as applied"));
            return Ok(());
        }

        state.mark_applied(migration_name, &checksum).await?;
        output.success(&format!("Marked '{migration_name}' as applied"));
    } else {
        if !state.mark_rolled_back(migration_name).await? {
            output.warning(&format!("Migration '{migration_name}' is not marked as applied"));
            return Ok(());
        }

        output.success(&format!("Marked '{migration_name}' as rolled back"));
    }

    Ok(())
}
