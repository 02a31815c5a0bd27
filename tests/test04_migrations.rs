use std::sync::{Arc, Mutex};
use std::time::Duration;

use sql_access::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn source(prefix: &str) -> Result<SqliteSource, SqlAccessError> {
    init_tracing();
    SqliteSource::builder(unique_db_path(prefix)).build()
}

fn table_exists(source: &SqliteSource, table: &str) -> Result<bool, SqlAccessError> {
    let tx = SqlTransaction::begin(source)?;
    tx.helper()?.table_exists(table)
}

fn create_users() -> MigrationStep {
    MigrationStep::new("create-users").normal(|ctx| {
        ctx.runner().execute_batch(
            "CREATE TABLE USERS (UUID VARCHAR(36) PRIMARY KEY, NAME VARCHAR(128) NOT NULL)",
        )?;
        Ok(())
    })
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn push(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl MigrationObserver for RecordingObserver {
    fn on_step_succeeded(&self, step: &str, mode: MigrationMode, _elapsed: Duration) {
        self.push(format!("succeeded:{step}:{mode}"));
    }

    fn on_step_skipped(&self, step: &str, _mode: MigrationMode, reason: &str) {
        self.push(format!("skipped:{step}:{reason}"));
    }

    fn on_step_failed(&self, step: &str, _mode: MigrationMode, _error: &MigrationError) {
        self.push(format!("failed:{step}"));
    }

    fn on_run_finished(&self, report: &MigrationReport) {
        self.push(format!("finished:{}", report.mode));
    }
}

#[test]
fn users_table_appears_only_in_normal_mode() -> Result<(), Box<dyn std::error::Error>> {
    let source = source("users")?;
    let mut manager = MigrationManager::new(source);
    manager.register(create_users());

    let report = manager.execute(MigrationMode::LiveBefore)?;
    assert_eq!(report.mode, MigrationMode::LiveBefore);
    assert_eq!(report.succeeded_count(), 1);
    assert!(!table_exists(manager.source(), "USERS")?);

    manager.execute(MigrationMode::Normal)?;
    assert!(table_exists(manager.source(), "USERS")?);

    manager.execute(MigrationMode::LiveAfter)?;
    assert!(table_exists(manager.source(), "USERS")?);

    let tx = SqlTransaction::begin(manager.source())?;
    let helper = tx.helper()?;
    assert!(helper.column_exists("USERS", "NAME")?);
    assert!(!helper.column_exists("USERS", "EMAIL")?);
    assert_eq!(helper.table_names()?, vec!["USERS".to_string()]);
    Ok(())
}

#[test]
fn unguarded_step_fails_on_second_run() -> Result<(), Box<dyn std::error::Error>> {
    let source = source("rerun")?;
    let mut manager = MigrationManager::new(source);
    manager.register(create_users());

    manager.execute(MigrationMode::Normal)?;
    let err = manager.execute(MigrationMode::Normal).unwrap_err();
    assert_eq!(err.failed_step(), Some("create-users"));
    assert!(matches!(
        err,
        MigrationError::StepFailed {
            mode: MigrationMode::Normal,
            ..
        }
    ));
    assert!(err.sql_error().is_some_and(SqlAccessError::is_fault));
    assert!(err.format_detailed().contains("Caused by:"));
    Ok(())
}

#[test]
fn skipped_step_discards_its_writes_and_the_run_continues() -> Result<(), Box<dyn std::error::Error>> {
    let source = source("skip")?;
    {
        let mut tx = SqlTransaction::begin(&source)?;
        tx.runner()?
            .execute_batch("CREATE TABLE AUDIT (STEP TEXT NOT NULL)")?;
        tx.commit()?;
    }

    let observer = Arc::new(RecordingObserver::default());
    let mut manager = MigrationManager::new(source).with_observer(Arc::clone(&observer));
    manager
        .register(MigrationStep::new("partial").normal(|ctx| {
            ctx.runner().execute(&SqlQuery::with_params(
                "INSERT INTO AUDIT (STEP) VALUES (?)",
                [ctx.step_name()],
            ))?;
            Err(MigrationError::skip("not applicable"))
        }))
        .register(MigrationStep::new("record").normal(|ctx| {
            ctx.runner().execute(&SqlQuery::with_params(
                "INSERT INTO AUDIT (STEP) VALUES (?)",
                [ctx.step_name()],
            ))?;
            Ok(())
        }));
    assert_eq!(manager.step_names(), vec!["partial", "record"]);

    let report = manager.execute(MigrationMode::Normal)?;
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.succeeded_count(), 1);
    assert_eq!(
        report.outcome("partial"),
        Some(&StepOutcome::Skipped {
            reason: "not applicable".into()
        })
    );
    assert!(matches!(
        report.outcome("record"),
        Some(StepOutcome::Succeeded { .. })
    ));
    assert!(report.completed_at >= report.started_at);

    let tx = SqlTransaction::begin(manager.source())?;
    let steps = tx.runner()?.query(
        &|r: &SqlRecord<'_>| r.get_string("STEP"),
        &SqlQuery::new("SELECT STEP FROM AUDIT"),
    )?;
    assert_eq!(steps, vec![Some("record".to_string())]);

    assert_eq!(
        observer.events(),
        vec![
            "skipped:partial:not applicable",
            "succeeded:record:NORMAL",
            "finished:NORMAL",
        ]
    );
    Ok(())
}

#[test]
fn failure_stops_the_run_and_keeps_earlier_commits() -> Result<(), Box<dyn std::error::Error>> {
    let source = source("fail_fast")?;
    let observer = Arc::new(RecordingObserver::default());
    let mut manager = MigrationManager::new(source).with_observer(Arc::clone(&observer));
    manager
        .register(MigrationStep::new("first").live_before(|ctx| {
            ctx.runner().execute_batch("CREATE TABLE FIRST (ID INTEGER)")?;
            Ok(())
        }))
        .register(MigrationStep::new("broken").live_before(|ctx| {
            ctx.runner().execute_batch("CREATE TABLE HALF_DONE (ID INTEGER)")?;
            Err(MigrationError::msg("lookup data missing"))
        }))
        .register(MigrationStep::new("never").live_before(|ctx| {
            ctx.runner().execute_batch("CREATE TABLE NEVER (ID INTEGER)")?;
            Ok(())
        }));

    let err = manager.execute(MigrationMode::LiveBefore).unwrap_err();
    assert_eq!(err.failed_step(), Some("broken"));
    assert!(err.sql_error().is_none());
    assert_eq!(
        err.to_string(),
        "Migration step 'broken' failed in LIVE_BEFORE mode: lookup data missing"
    );

    assert!(table_exists(manager.source(), "FIRST")?);
    assert!(!table_exists(manager.source(), "HALF_DONE")?);
    assert!(!table_exists(manager.source(), "NEVER")?);
    assert_eq!(
        observer.events(),
        vec!["succeeded:first:LIVE_BEFORE", "failed:broken"]
    );
    Ok(())
}

/// Adds an EMAIL column while the old version is live, and backfills it afterwards.
struct AddEmailColumn;

impl Migrator for AddEmailColumn {
    fn name(&self) -> &str {
        "add-email"
    }

    fn migrate_live_before(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        if ctx.helper().column_exists("USERS", "EMAIL")? {
            return Err(MigrationError::skip("EMAIL already present"));
        }
        ctx.runner()
            .execute_batch("ALTER TABLE USERS ADD COLUMN EMAIL VARCHAR(256)")?;
        Ok(())
    }

    fn migrate_live_after(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        assert_eq!(ctx.mode(), MigrationMode::LiveAfter);
        ctx.runner().execute(&SqlQuery::new(
            "UPDATE USERS SET EMAIL = lower(NAME) || '@example.com' WHERE EMAIL IS NULL",
        ))?;
        Ok(())
    }
}

#[test]
fn trait_migrators_run_per_mode() -> Result<(), Box<dyn std::error::Error>> {
    let source = source("trait")?;
    let mut bootstrap = MigrationManager::new(source);
    bootstrap
        .register(create_users())
        .register(MigrationStep::new("seed").normal(|ctx| {
            ctx.runner().execute(&SqlQuery::with_params(
                "INSERT INTO USERS (UUID, NAME) VALUES (?, ?)",
                ["u-1", "Alice"],
            ))?;
            Ok(())
        }));
    bootstrap.execute(MigrationMode::Normal)?;

    let mut manager = MigrationManager::new(bootstrap.source().clone());
    manager.register(AddEmailColumn);

    let first = manager.execute(MigrationMode::LiveBefore)?;
    assert_eq!(first.succeeded_count(), 1);
    let again = manager.execute(MigrationMode::LiveBefore)?;
    assert_eq!(again.skipped_count(), 1);
    // NORMAL has no procedure for this step, which counts as success.
    assert_eq!(manager.execute(MigrationMode::Normal)?.succeeded_count(), 1);
    manager.execute(MigrationMode::LiveAfter)?;

    let tx = SqlTransaction::begin(manager.source())?;
    let email = tx.runner()?.query_single(
        &|r: &SqlRecord<'_>| r.get_string("EMAIL"),
        &SqlQuery::new("SELECT EMAIL FROM USERS WHERE UUID = 'u-1'"),
    )?;
    assert_eq!(email, Some(Some("alice@example.com".to_string())));
    Ok(())
}

#[test]
fn report_serializes_for_tooling() -> Result<(), Box<dyn std::error::Error>> {
    let source = source("report")?;
    let mut manager = MigrationManager::new(source);
    manager.register(MigrationStep::new("noop"));
    let report = manager.execute(MigrationMode::LiveAfter)?;

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["mode"], "LIVE_AFTER");
    assert_eq!(json["steps"][0]["name"], "noop");
    assert_eq!(json["steps"][0]["outcome"]["status"], "succeeded");
    Ok(())
}
