mod commands;
mod help;
mod output;
mod theme;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::control::ShouldColorize;

use commands::{
    migrate::{MigrateCommands, handle_migrate_commands},
    schema::{SchemaCommands, handle_schema_commands},
};
use output::{GlobalOptions, OutputFormat, OutputManager};
use pets_schema::Settings;

#[derive(Parser)]
#[command(name = "pets-schema")]
#[command(version)]
#[command(
    about = "Schema bootstrap and migration tool for the pets_search database",
    long_about = "Creates the users, listings and events collections of the pets_search \
                  database with their $jsonSchema validators and indexes, and records every \
                  applied migration so that repeated runs are safe."
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Config file (defaults to ./pets-schema.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// MongoDB connection string, overrides the config file
    #[arg(long, env = "MONGODB_URI")]
    uri: Option<String>,

    /// Target database, overrides the config file
    #[arg(long, env = "MONGODB_DATABASE")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Clap command with themed help, examples under each subcommand and the
/// environment variables under the top-level help.
fn cli_command(color: bool) -> Command {
    Cli::command()
        .styles(help::styles())
        .color(if color { ColorChoice::Auto } else { ColorChoice::Never })
        .after_long_help(help::environment_section(color))
        .mut_subcommand("migrate", |sub| {
            sub.after_long_help(help::examples_section(commands::migrate::EXAMPLES, color))
        })
        .mut_subcommand("schema", |sub| {
            sub.after_long_help(help::examples_section(commands::schema::EXAMPLES, color))
        })
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy, inspect and roll back schema migrations
    #[command(subcommand)]
    Migrate(MigrateCommands),

    /// Show the declared schema and compare it with a live database
    #[command(subcommand)]
    Schema(SchemaCommands),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let color = ShouldColorize::from_env().should_colorize();
    let matches = cli_command(color).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let global_options = GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };

    if global_options.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(global_options);

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(cli.uri, cli.database);
    output.verbose(&format!("Using database '{}'", settings.mongodb.database));

    match cli.command {
        Commands::Migrate(migrate_cmd) => {
            handle_migrate_commands(migrate_cmd, &settings, &output).await?;
        }
        Commands::Schema(schema_cmd) => {
            handle_schema_commands(schema_cmd, &settings, &output).await?;
        }
    }

    Ok(())
}
