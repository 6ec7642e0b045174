//! Migration execution engine.
//!
//! This module provides runtime components for executing migrations:
//! - `MigrationContext` - MongoDB database access and step execution
//! - `MigrationRunner` - Applies pending migrations and rolls back the newest
//! - `MigrationState` - Tracks applied migrations in a history collection

mod context;
mod runner;
mod state;

pub use context::{MigrationContext, StepOutcome};
pub use runner::{
    DeployReport, MigrationRun, MigrationRunner, MigrationStats, MigrationStatus, RollbackReport,
    StepReport,
};
pub use state::{AppliedMigration, MigrationState};
