use std::fmt;

use super::{MigrationContext, MigrationError, MigrationMode};

/// A named migration step with one optional procedure per mode.
///
/// Every procedure defaults to doing nothing. Return
/// [`MigrationError::skip`] to signal that the step does not apply.
pub trait Migrator {
    fn name(&self) -> &str;

    /// # Errors
    /// Step-specific; see the trait docs for skip handling.
    fn migrate_live_before(&self, _ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Ok(())
    }

    /// # Errors
    /// Step-specific; see the trait docs for skip handling.
    fn migrate_normal(&self, _ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Ok(())
    }

    /// # Errors
    /// Step-specific; see the trait docs for skip handling.
    fn migrate_live_after(&self, _ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Ok(())
    }
}

pub(super) fn dispatch(
    migrator: &dyn Migrator,
    mode: MigrationMode,
    ctx: &MigrationContext<'_>,
) -> Result<(), MigrationError> {
    match mode {
        MigrationMode::LiveBefore => migrator.migrate_live_before(ctx),
        MigrationMode::Normal => migrator.migrate_normal(ctx),
        MigrationMode::LiveAfter => migrator.migrate_live_after(ctx),
    }
}

type Procedure = Box<dyn Fn(&MigrationContext<'_>) -> Result<(), MigrationError>>;

/// [`Migrator`] assembled from closures.
///
/// ```rust
/// use sql_access::prelude::*;
///
/// let step = MigrationStep::new("add-email")
///     .live_before(|ctx| {
///         if ctx.helper().column_exists("USERS", "EMAIL")? {
///             return Err(MigrationError::skip("EMAIL already present"));
///         }
///         ctx.runner().execute_batch("ALTER TABLE USERS ADD COLUMN EMAIL TEXT")?;
///         Ok(())
///     });
/// assert_eq!(step.name(), "add-email");
/// ```
pub struct MigrationStep {
    name: String,
    live_before: Option<Procedure>,
    normal: Option<Procedure>,
    live_after: Option<Procedure>,
}

impl MigrationStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            live_before: None,
            normal: None,
            live_after: None,
        }
    }

    #[must_use]
    pub fn live_before<F>(mut self, procedure: F) -> Self
    where
        F: Fn(&MigrationContext<'_>) -> Result<(), MigrationError> + 'static,
    {
        self.live_before = Some(Box::new(procedure));
        self
    }

    #[must_use]
    pub fn normal<F>(mut self, procedure: F) -> Self
    where
        F: Fn(&MigrationContext<'_>) -> Result<(), MigrationError> + 'static,
    {
        self.normal = Some(Box::new(procedure));
        self
    }

    #[must_use]
    pub fn live_after<F>(mut self, procedure: F) -> Self
    where
        F: Fn(&MigrationContext<'_>) -> Result<(), MigrationError> + 'static,
    {
        self.live_after = Some(Box::new(procedure));
        self
    }

    fn run(procedure: Option<&Procedure>, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        procedure.map_or(Ok(()), |p| p(ctx))
    }
}

impl Migrator for MigrationStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn migrate_live_before(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Self::run(self.live_before.as_ref(), ctx)
    }

    fn migrate_normal(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Self::run(self.normal.as_ref(), ctx)
    }

    fn migrate_live_after(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Self::run(self.live_after.as_ref(), ctx)
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("live_before", &self.live_before.is_some())
            .field("normal", &self.normal.is_some())
            .field("live_after", &self.live_after.is_some())
            .finish()
    }
}
