use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while deriving schemas, building statements, talking to
/// the database or migrating it.
#[derive(Debug, Error)]
pub enum Error {
    /// A field has no inferable column type and is not marked `override`.
    #[error("unmappable field `{field}`: no column type can be inferred, mark it `override` and give the type as raw sql")]
    UnmappableField { field: String },

    /// A field is declared embedded but does not describe a record.
    #[error("embedded field `{field}` is not a record")]
    NotARecord { field: String },

    /// Two fields resolve to the same physical column name.
    #[error("fields `{first}` and `{second}` both map to column `{column}`")]
    DuplicateColumn {
        column: String,
        first: String,
        second: String,
    },

    /// Two fields share a logical name, e.g. an embedded field and a parent
    /// field of the same name.
    #[error("field `{field}` is declared more than once")]
    DuplicateField { field: String },

    /// More than one field carries the `primary` directive.
    #[error("fields `{first}` and `{second}` are both marked primary")]
    MultiplePrimary { first: String, second: String },

    /// The statement needs a primary column but the table has no columns.
    #[error("table `{table}` has no primary column")]
    MissingPrimary { table: String },

    /// Every column of the table is either primary or auto generated.
    #[error("table `{table}` has no updatable columns")]
    NothingToUpdate { table: String },

    /// `INSERT` was asked to write zero records.
    #[error("insert into `{table}` needs at least one record")]
    EmptyInsert { table: String },

    /// A record does not expose a value for one of its own columns.
    #[error("record has no value for field `{field}`")]
    MissingField { field: String },

    /// A `{{Field}}` template reference did not resolve to a column.
    #[error("template field `{0}` does not resolve to a column")]
    UnresolvedField(String),

    /// A column value could not be converted into the field type.
    #[error("cannot decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },

    #[error("no rows returned")]
    RowNotFound,

    /// The stored schema version is ahead of the version the code expects.
    #[error("database migration version {stored} is greater than current version {target}")]
    MigrationOrder { stored: String, target: String },

    /// The migrator already failed once and refuses to run again.
    #[error("migrator failed on a previous run, create a new one after fixing the schema")]
    MigrationHalted,

    /// A migration of a version group failed. Earlier migrations of the run stay applied.
    #[error("migration to version {version} failed: {source}")]
    Migration {
        version: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to read migration script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rolling back failed while recovering from another error.
    #[error("rollback error: {rollback} - when trying to rollback from error: {source}")]
    Rollback {
        #[source]
        source: Box<Error>,
        rollback: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn decode(column: impl Into<String>, reason: impl ToString) -> Self {
        Error::Decode {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the record definition itself. These are
    /// programming errors and retrying cannot fix them.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::UnmappableField { .. }
                | Error::NotARecord { .. }
                | Error::DuplicateColumn { .. }
                | Error::DuplicateField { .. }
                | Error::MultiplePrimary { .. }
                | Error::MissingPrimary { .. }
                | Error::NothingToUpdate { .. }
        )
    }
}
