//! Migration runner for executing pending migrations.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use super::context::{MigrationContext, StepOutcome};
use super::state::{AppliedMigration, MigrationState};
use crate::config::Settings;
use crate::errors::SchemaError;
use crate::migrations::Migration;

/// Statistics from a migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationStats {
    /// Number of migrations applied
    pub migrations_applied: u32,
    /// Migrations that were skipped (already applied)
    pub migrations_skipped: u32,
    /// Steps that changed the database
    pub steps_applied: u32,
    /// Steps whose target already existed
    pub steps_skipped: u32,
    /// Steps a dry run would have applied
    pub steps_planned: u32,
    /// Total execution time in milliseconds
    pub total_time_ms: u64,
}

impl MigrationStats {
    /// Count one step outcome.
    pub fn record_step(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Applied => self.steps_applied += 1,
            StepOutcome::Skipped(_) => self.steps_skipped += 1,
            StepOutcome::Planned => self.steps_planned += 1,
        }
    }

    fn absorb(&mut self, other: &MigrationStats) {
        self.steps_applied += other.steps_applied;
        self.steps_skipped += other.steps_skipped;
        self.steps_planned += other.steps_planned;
    }
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub description: String,
    pub outcome: StepOutcome,
}

/// One migration executed during a deploy.
#[derive(Debug, Clone)]
pub struct MigrationRun {
    pub name: String,
    pub steps: Vec<StepReport>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub runs: Vec<MigrationRun>,
    /// Applied migrations whose current checksum no longer matches the record.
    pub drifted: Vec<String>,
    pub stats: MigrationStats,
    pub dry_run: bool,
}

impl DeployReport {
    pub fn is_up_to_date(&self) -> bool {
        self.runs.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RollbackReport {
    pub name: String,
    pub steps: Vec<StepReport>,
    pub dry_run: bool,
}

/// Applied/pending state of a declared migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub description: String,
    pub applied_at: Option<DateTime<Utc>>,
    /// `None` while pending.
    pub checksum_matches: Option<bool>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Migration runner.
pub struct MigrationRunner {
    ctx: MigrationContext,
    state: MigrationState,
    dry_run: bool,
}

impl MigrationRunner {
    /// Connect using `settings` and prepare a runner.
    pub async fn connect(settings: &Settings, dry_run: bool) -> Result<Self, SchemaError> {
        let settings = settings.resolved()?;
        let ctx = MigrationContext::connect(&settings.mongodb)
            .await?
            .with_dry_run(dry_run);
        Ok(Self::new(ctx, &settings.migrations.history_collection))
    }

    pub fn new(ctx: MigrationContext, history_collection: &str) -> Self {
        let state = MigrationState::new(ctx.database(), history_collection);
        let dry_run = ctx.is_dry_run();
        Self { ctx, state, dry_run }
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    /// Report each declared migration as applied or pending.
    pub async fn status(&self, migrations: &[Migration]) -> Result<Vec<MigrationStatus>, SchemaError> {
        let applied = self.applied_by_name().await?;
        let mut statuses = Vec::with_capacity(migrations.len());

        for migration in migrations {
            let record = applied.get(&migration.name);
            let checksum_matches = match record {
                Some(record) => Some(record.checksum == migration.checksum()?),
                None => None,
            };
            statuses.push(MigrationStatus {
                name: migration.name.clone(),
                description: migration.description.clone(),
                applied_at: record.map(|r| r.applied_at),
                checksum_matches,
            });
        }

        Ok(statuses)
    }

    /// Apply every pending migration in order.
    ///
    /// A failing step aborts the deploy. The migration it belongs to is not
    /// recorded, so the next deploy retries it; steps that did succeed are
    /// then skipped because their targets exist.
    pub async fn deploy(&self, migrations: &[Migration]) -> Result<DeployReport, SchemaError> {
        let start_time = Instant::now();
        let applied = self.applied_by_name().await?;
        let mut report = DeployReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        for migration in migrations {
            let checksum = migration.checksum()?;

            if let Some(record) = applied.get(&migration.name) {
                if record.checksum != checksum {
                    warn!(
                        "migration {} changed since it was applied (recorded {}, current {})",
                        migration.name, record.checksum, checksum
                    );
                    report.drifted.push(migration.name.clone());
                }
                report.stats.migrations_skipped += 1;
                continue;
            }

            let migration_start = Instant::now();
            let mut steps = Vec::with_capacity(migration.steps.len());
            let mut tally = MigrationStats::default();

            for step in &migration.steps {
                let outcome = self.ctx.apply(step).await?;
                tally.record_step(&outcome);
                steps.push(StepReport {
                    description: step.describe(),
                    outcome,
                });
            }

            let execution_time_ms = migration_start.elapsed().as_millis() as u64;

            if !self.dry_run {
                self.state
                    .record_applied(&AppliedMigration {
                        name: migration.name.clone(),
                        applied_at: Utc::now(),
                        checksum,
                        execution_time_ms,
                        steps_applied: tally.steps_applied,
                        steps_skipped: tally.steps_skipped,
                    })
                    .await?;
                info!("applied migration {} in {execution_time_ms}ms", migration.name);
            }

            report.stats.migrations_applied += 1;
            report.stats.absorb(&tally);
            report.runs.push(MigrationRun {
                name: migration.name.clone(),
                steps,
                execution_time_ms,
            });
        }

        report.stats.total_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Revert the most recently applied migration, if any.
    pub async fn rollback_last(&self, migrations: &[Migration]) -> Result<Option<RollbackReport>, SchemaError> {
        let Some(last) = self.state.last_applied().await? else {
            return Ok(None);
        };

        let migration = migrations
            .iter()
            .find(|migration| migration.name == last.name)
            .ok_or_else(|| SchemaError::UnknownMigration { name: last.name.clone() })?;

        let mut steps = Vec::with_capacity(migration.steps.len());
        for step in migration.steps.iter().rev() {
            let outcome = self.ctx.revert(step).await?;
            steps.push(StepReport {
                description: step.describe(),
                outcome,
            });
        }

        if !self.dry_run {
            self.state.remove_applied(&migration.name).await?;
            info!("rolled back migration {}", migration.name);
        }

        Ok(Some(RollbackReport {
            name: migration.name.clone(),
            steps,
            dry_run: self.dry_run,
        }))
    }

    async fn applied_by_name(&self) -> Result<HashMap<String, AppliedMigration>, SchemaError> {
        Ok(self
            .state
            .list_applied()
            .await?
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect())
    }
}
