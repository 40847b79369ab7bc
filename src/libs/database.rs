use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Row as _, TypeInfo};
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::migration::{Version, migrate};
use crate::queryer::{ExecResult, Queryer, Transaction, transactional};
use crate::registry::Registry;
use crate::value::{Row, Value};

/// A MySQL connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    pub async fn connect(config: &Configuration) -> Result<Self> {
        config.validate()?;
        info!(host = %config.host, port = config.port, database = %config.database, "connecting");
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options()?)
            .await?;
        Ok(Self { pool })
    }

    /// Connects, creates every registered table that does not exist yet and
    /// migrates the schema to `version`.
    pub async fn open(
        config: &Configuration,
        version: &str,
        versions: &[Version],
        registry: &Registry,
    ) -> Result<Self> {
        let mut db = Self::connect(config).await?;
        registry.create_all(&mut db).await?;
        migrate(&mut db, version, versions).await?;
        Ok(db)
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Tx> {
        Ok(Tx {
            inner: self.pool.begin().await?,
        })
    }

    /// Runs `f` in a transaction, committing only when it returns `Ok(true)`.
    pub async fn transactional<F>(&self, f: F) -> Result<bool>
    where
        F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<bool>>,
    {
        transactional(self.begin().await?, f).await
    }
}

#[async_trait]
impl Queryer for Database {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        execute_on(&self.pool, sql, args).await
    }

    async fn fetch_all(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        fetch_all_on(&self.pool, sql, args).await
    }
}

/// An open MySQL transaction.
#[derive(Debug)]
pub struct Tx {
    inner: sqlx::Transaction<'static, MySql>,
}

#[async_trait]
impl Queryer for Tx {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        execute_on(&mut *self.inner, sql, args).await
    }

    async fn fetch_all(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        fetch_all_on(&mut *self.inner, sql, args).await
    }
}

#[async_trait]
impl Transaction for Tx {
    async fn commit(self) -> Result<()> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.inner.rollback().await?;
        Ok(())
    }
}

fn bind_args<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg.clone() {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::I8(v) => query.bind(v),
            Value::I16(v) => query.bind(v),
            Value::I32(v) => query.bind(v),
            Value::I64(v) => query.bind(v),
            Value::U8(v) => query.bind(v),
            Value::U16(v) => query.bind(v),
            Value::U32(v) => query.bind(v),
            Value::U64(v) => query.bind(v),
            Value::F32(v) => query.bind(v),
            Value::F64(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Blob(v) => query.bind(v),
            Value::Date(v) => query.bind(v),
            Value::DateTime(v) => query.bind(v),
        };
    }
    query
}

async fn execute_on<'c, E>(executor: E, sql: &str, args: &[Value]) -> Result<ExecResult>
where
    E: Executor<'c, Database = MySql>,
{
    debug!(sql, args = args.len(), "execute");
    let result = bind_args(sqlx::query(sql), args).execute(executor).await?;
    let last_insert_id = result.last_insert_id();
    Ok(ExecResult {
        rows_affected: result.rows_affected(),
        last_insert_id: (last_insert_id != 0).then_some(last_insert_id),
    })
}

async fn fetch_all_on<'c, E>(executor: E, sql: &str, args: &[Value]) -> Result<Vec<Row>>
where
    E: Executor<'c, Database = MySql>,
{
    debug!(sql, args = args.len(), "fetch");
    let rows = bind_args(sqlx::query(sql), args).fetch_all(executor).await?;
    rows.iter().map(decode_row).collect()
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_ascii_uppercase();
        let value = decode_column(row, index, &type_name)
            .map_err(|e| Error::decode(column.name(), e))?;
        out.push(column.name(), value);
    }
    Ok(out)
}

fn or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, wrap)
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "NULL" => Value::Null,
        "BOOLEAN" => or_null(row.try_get(index)?, Value::Bool),
        "TINYINT" => or_null(row.try_get(index)?, Value::I8),
        "TINYINT UNSIGNED" => or_null(row.try_get(index)?, Value::U8),
        "SMALLINT" => or_null(row.try_get(index)?, Value::I16),
        "SMALLINT UNSIGNED" => or_null(row.try_get(index)?, Value::U16),
        "INT" | "MEDIUMINT" => or_null(row.try_get(index)?, Value::I32),
        "INT UNSIGNED" | "MEDIUMINT UNSIGNED" => or_null(row.try_get(index)?, Value::U32),
        "BIGINT" => or_null(row.try_get(index)?, Value::I64),
        "BIGINT UNSIGNED" => or_null(row.try_get(index)?, Value::U64),
        "FLOAT" => or_null(row.try_get(index)?, Value::F32),
        "DOUBLE" => or_null(row.try_get(index)?, Value::F64),
        "DATE" => or_null(row.try_get(index)?, Value::Date),
        "DATETIME" | "TIMESTAMP" => or_null(row.try_get(index)?, Value::DateTime),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            or_null(row.try_get(index)?, Value::Blob)
        }
        _ => text_or_blob(row.try_get(index), || row.try_get(index))?,
    };
    Ok(value)
}

/// Other column types are read as text, then as raw bytes. When neither
/// works the blob error is returned; the column is never read as NULL.
fn text_or_blob(
    text: Result<Option<String>, sqlx::Error>,
    blob: impl FnOnce() -> Result<Option<Vec<u8>>, sqlx::Error>,
) -> Result<Value, sqlx::Error> {
    match text {
        Ok(value) => Ok(or_null(value, Value::Text)),
        Err(_) => blob().map(|value| or_null(value, Value::Blob)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch() -> sqlx::Error {
        sqlx::Error::ColumnDecode {
            index: "0".to_string(),
            source: "mismatched types".into(),
        }
    }

    #[test]
    fn unknown_types_fall_back_to_text_then_blob() {
        let text = text_or_blob(Ok(Some("12:30:00".into())), || unreachable!()).unwrap();
        assert_eq!(text, Value::Text("12:30:00".into()));

        let blob = text_or_blob(Err(mismatch()), || Ok(Some(vec![1, 2]))).unwrap();
        assert_eq!(blob, Value::Blob(vec![1, 2]));

        let null = text_or_blob(Ok(None), || unreachable!()).unwrap();
        assert_eq!(null, Value::Null);
    }

    #[test]
    fn undecodable_column_is_an_error() {
        let err = text_or_blob(Err(mismatch()), || Err(mismatch())).unwrap_err();
        assert!(matches!(err, sqlx::Error::ColumnDecode { .. }));

        let err = Error::decode("starts", err);
        assert!(matches!(err, Error::Decode { ref column, .. } if column == "starts"));
    }
}
