use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::migrator::dispatch;
use super::{
    MigrationContext, MigrationError, MigrationMode, MigrationObserver, Migrator, TracingObserver,
};
use crate::source::ConnectionSource;
use crate::transaction::{SqlTransaction, TransactionOptions};

/// How one step ended in a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { duration_seconds: f64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Summary of a run in which no step failed.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub mode: MigrationMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    /// One entry per registered step, in execution order.
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Succeeded { .. }))
            .count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Skipped { .. }))
            .count()
    }

    #[must_use]
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == step).map(|s| &s.outcome)
    }
}

/// Runs registered steps in order, one unit of work per step.
///
/// Nothing records which steps already ran; steps guard themselves, typically
/// through [`MigrationContext::helper`], or return [`MigrationError::skip`].
pub struct MigrationManager<S> {
    source: S,
    migrators: Vec<Box<dyn Migrator>>,
    observer: Box<dyn MigrationObserver>,
    tx_options: TransactionOptions,
}

impl<S: ConnectionSource> MigrationManager<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            migrators: Vec::new(),
            observer: Box::new(TracingObserver),
            tx_options: TransactionOptions::default(),
        }
    }

    /// Replace the default [`TracingObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: impl MigrationObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Options used to begin each step's unit of work.
    #[must_use]
    pub fn with_transaction_options(mut self, options: TransactionOptions) -> Self {
        self.tx_options = options;
        self
    }

    /// Append a step; steps run in registration order.
    pub fn register(&mut self, migrator: impl Migrator + 'static) -> &mut Self {
        self.migrators.push(Box::new(migrator));
        self
    }

    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.migrators.iter().map(|m| m.name()).collect()
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run every registered step for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::StepFailed`] for the first step that fails with
    /// anything but a skip. Steps after it do not run; steps before it stay committed.
    pub fn execute(&self, mode: MigrationMode) -> Result<MigrationReport, MigrationError> {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(mode = %mode, steps = self.migrators.len(), "starting migration run");

        let mut steps = Vec::with_capacity(self.migrators.len());
        for migrator in &self.migrators {
            let name = migrator.name();
            match self.run_step(migrator.as_ref(), mode) {
                Ok(elapsed) => {
                    self.observer.on_step_succeeded(name, mode, elapsed);
                    steps.push(StepReport {
                        name: name.to_owned(),
                        outcome: StepOutcome::Succeeded {
                            duration_seconds: elapsed.as_secs_f64(),
                        },
                    });
                }
                Err(MigrationError::Skipped { reason }) => {
                    self.observer.on_step_skipped(name, mode, &reason);
                    steps.push(StepReport {
                        name: name.to_owned(),
                        outcome: StepOutcome::Skipped { reason },
                    });
                }
                Err(err) => {
                    self.observer.on_step_failed(name, mode, &err);
                    return Err(MigrationError::StepFailed {
                        step: name.to_owned(),
                        mode,
                        source: Box::new(err),
                    });
                }
            }
        }

        let report = MigrationReport {
            mode,
            started_at,
            completed_at: Utc::now(),
            duration_seconds: start.elapsed().as_secs_f64(),
            steps,
        };
        self.observer.on_run_finished(&report);
        Ok(report)
    }

    /// Commit only when the step returns `Ok`; otherwise the unit of work is
    /// dropped and its connection closed, discarding the step's writes.
    fn run_step(&self, migrator: &dyn Migrator, mode: MigrationMode) -> Result<Duration, MigrationError> {
        let start = Instant::now();
        let mut tx = SqlTransaction::begin_with_options(&self.source, self.tx_options)?;
        {
            let ctx = MigrationContext::new(&tx, mode, migrator.name())?;
            dispatch(migrator, mode, &ctx)?;
        }
        tx.commit()?;
        debug!(step = migrator.name(), mode = %mode, "committed migration step");
        Ok(start.elapsed())
    }
}

impl<S> std::fmt::Debug for MigrationManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field(
                "steps",
                &self.migrators.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("tx_options", &self.tx_options)
            .finish_non_exhaustive()
    }
}
