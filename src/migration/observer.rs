use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{MigrationError, MigrationMode, MigrationReport};

/// Receives the outcome of every step of a migration run.
///
/// All callbacks default to doing nothing, so observers only implement what they need.
pub trait MigrationObserver {
    fn on_step_succeeded(&self, _step: &str, _mode: MigrationMode, _elapsed: Duration) {}

    fn on_step_skipped(&self, _step: &str, _mode: MigrationMode, _reason: &str) {}

    fn on_step_failed(&self, _step: &str, _mode: MigrationMode, _error: &MigrationError) {}

    fn on_run_finished(&self, _report: &MigrationReport) {}
}

impl<O: MigrationObserver + ?Sized> MigrationObserver for Arc<O> {
    fn on_step_succeeded(&self, step: &str, mode: MigrationMode, elapsed: Duration) {
        (**self).on_step_succeeded(step, mode, elapsed);
    }

    fn on_step_skipped(&self, step: &str, mode: MigrationMode, reason: &str) {
        (**self).on_step_skipped(step, mode, reason);
    }

    fn on_step_failed(&self, step: &str, mode: MigrationMode, error: &MigrationError) {
        (**self).on_step_failed(step, mode, error);
    }

    fn on_run_finished(&self, report: &MigrationReport) {
        (**self).on_run_finished(report);
    }
}

/// Default observer writing `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_step_succeeded(&self, step: &str, mode: MigrationMode, elapsed: Duration) {
        info!(step, mode = %mode, elapsed = ?elapsed, "migration step succeeded");
    }

    fn on_step_skipped(&self, step: &str, mode: MigrationMode, reason: &str) {
        warn!(step, mode = %mode, reason, "migration step skipped");
    }

    fn on_step_failed(&self, step: &str, mode: MigrationMode, error: &MigrationError) {
        error!(step, mode = %mode, error = %error, "migration step failed");
    }

    fn on_run_finished(&self, report: &MigrationReport) {
        info!(
            mode = %report.mode,
            succeeded = report.succeeded_count(),
            skipped = report.skipped_count(),
            duration_seconds = report.duration_seconds,
            "migration run succeeded"
        );
    }
}
