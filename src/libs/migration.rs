//! Versioned schema migrations.
//!
//! The schema version is stored in a single row of the `_migration` table.
//! [`migrate`] compares it with the version the code declares and applies
//! the migration groups in between. Versions compare as plain strings, so
//! `"1.10"` sorts before `"1.9"`; pad version components when that matters.
//!
//! A failing migration aborts the run without touching the stored version,
//! and migrations applied earlier in the same run are not rolled back. A
//! failed run needs manual attention before it is retried.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::queryer::Queryer;
use crate::table::{Table, Tabler};
use crate::types::DateTime;

/// Name of the bookkeeping table.
pub const MIGRATION_TABLE: &str = "_migration";

/// The stored schema version.
#[derive(Debug, Clone, Default, PartialEq, tabler::Record)]
pub struct MigrationInfo {
    pub id: i64,
    #[sql(override, raw = "VARCHAR(64)")]
    pub version: String,
    pub migration_date: DateTime,
}

/// One step of a version group.
#[async_trait]
pub trait Migration: Send + Sync {
    async fn migrate(&self, queryer: &mut dyn Queryer) -> Result<()>;
}

/// Migrates by executing a single sql statement.
#[derive(Debug, Clone)]
pub struct QueryMigration {
    query: String,
}

impl QueryMigration {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

#[async_trait]
impl Migration for QueryMigration {
    async fn migrate(&self, queryer: &mut dyn Queryer) -> Result<()> {
        queryer.execute(&self.query, &[]).await?;
        Ok(())
    }
}

/// Migrates by executing the sql statement stored in a file.
#[derive(Debug, Clone)]
pub struct ScriptMigration {
    path: PathBuf,
}

impl ScriptMigration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Migration for ScriptMigration {
    async fn migrate(&self, queryer: &mut dyn Queryer) -> Result<()> {
        let query = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| Error::Script {
                path: self.path.clone(),
                source,
            })?;
        queryer.execute(&query, &[]).await?;
        Ok(())
    }
}

type CustomFn = dyn for<'q> Fn(&'q mut dyn Queryer) -> BoxFuture<'q, Result<()>> + Send + Sync;

/// Migrates by calling a function.
pub struct CustomMigration {
    func: Box<CustomFn>,
}

impl CustomMigration {
    /// ```ignore
    /// CustomMigration::new(|q| Box::pin(async move {
    ///     q.execute("UPDATE `users` SET `locale`='en' WHERE `locale` IS NULL", &[]).await?;
    ///     Ok(())
    /// }))
    /// ```
    pub fn new<F>(func: F) -> Self
    where
        F: for<'q> Fn(&'q mut dyn Queryer) -> BoxFuture<'q, Result<()>> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Migration for CustomMigration {
    async fn migrate(&self, queryer: &mut dyn Queryer) -> Result<()> {
        (self.func)(queryer).await
    }
}

/// The migrations that bring the schema to one version.
pub struct Version {
    version: String,
    migrations: Vec<Box<dyn Migration>>,
}

impl Version {
    pub fn new(version: impl Into<String>, migrations: Vec<Box<dyn Migration>>) -> Self {
        Self {
            version: version.into(),
            migrations,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Applies the migrations in order, stopping at the first failure.
    pub async fn migrate(&self, queryer: &mut dyn Queryer) -> Result<()> {
        for migration in &self.migrations {
            migration.migrate(queryer).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Version")
            .field("version", &self.version)
            .field("migrations", &self.migrations.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Uninitialized,
    /// The stored version has been read.
    Checked,
    /// The stored version already matches.
    NoOp,
    Migrating,
    Migrated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Stored version before the run.
    pub from: String,
    /// Stored version after the run.
    pub to: String,
    /// Number of version groups applied.
    pub applied: usize,
    pub state: MigrationState,
}

/// Runs migrations against the bookkeeping table and tracks its progress.
pub struct Migrator {
    table: Table<MigrationInfo>,
    state: MigrationState,
}

impl Migrator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: Table::new(MIGRATION_TABLE)?,
            state: MigrationState::Uninitialized,
        })
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    pub fn table(&self) -> &Table<MigrationInfo> {
        &self.table
    }

    /// Brings the database from its stored version to `target`.
    ///
    /// `Failed` is terminal: once a run fails, later runs return
    /// [`Error::MigrationHalted`] without touching the database.
    pub async fn run(
        &mut self,
        queryer: &mut dyn Queryer,
        target: &str,
        versions: &[Version],
    ) -> Result<MigrationReport> {
        if self.state == MigrationState::Failed {
            return Err(Error::MigrationHalted);
        }
        let result = self.run_inner(queryer, target, versions).await;
        if let Err(err) = &result {
            self.state = MigrationState::Failed;
            error!(error = %err, target, "migration failed");
        }
        result
    }

    async fn run_inner(
        &mut self,
        queryer: &mut dyn Queryer,
        target: &str,
        versions: &[Version],
    ) -> Result<MigrationReport> {
        queryer.execute(&self.table.create_statement(), &[]).await?;

        let stored = self.table.select("*").first(queryer, &[]).await?;
        let mut info = match stored {
            Some(info) => info,
            None => {
                let info = MigrationInfo {
                    id: 1,
                    version: "0".to_string(),
                    migration_date: DateTime::now(),
                };
                self.table.insert(std::slice::from_ref(&info), queryer).await?;
                info
            }
        };
        self.state = MigrationState::Checked;

        let from = info.version.clone();
        if target < from.as_str() {
            return Err(Error::MigrationOrder {
                stored: from,
                target: target.to_string(),
            });
        }
        if target == from {
            self.state = MigrationState::NoOp;
            info!(version = %from, "schema is up to date");
            return Ok(MigrationReport {
                to: from.clone(),
                from,
                applied: 0,
                state: self.state,
            });
        }

        self.state = MigrationState::Migrating;
        let mut applied = 0;
        for version in versions
            .iter()
            .filter(|v| from.as_str() < v.version() && v.version() <= target)
        {
            info!(version = %version.version, migrations = version.len(), "migrating");
            version
                .migrate(queryer)
                .await
                .map_err(|source| Error::Migration {
                    version: version.version.clone(),
                    source: Box::new(source),
                })?;
            applied += 1;
        }

        info.version = target.to_string();
        info.migration_date = DateTime::now();
        self.table.update(&info, queryer).await?;
        self.state = MigrationState::Migrated;
        info!(from = %from, to = target, applied, "schema migrated");

        Ok(MigrationReport {
            from,
            to: info.version,
            applied,
            state: self.state,
        })
    }
}

/// Migrates the database to `target` with a fresh [`Migrator`].
pub async fn migrate(
    queryer: &mut dyn Queryer,
    target: &str,
    versions: &[Version],
) -> Result<MigrationReport> {
    Migrator::new()?.run(queryer, target, versions).await
}
