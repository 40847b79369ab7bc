use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::warn;

use crate::descriptor::Record;
use crate::error::{Error, Result};
use crate::schema::TableDescriptor;
use crate::value::{Row, RowReader, Value};

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

/// Executes sql, either on a plain connection pool or inside a transaction.
#[async_trait]
pub trait Queryer: Send {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult>;

    async fn fetch_all(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>>;

    async fn fetch_optional(&mut self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        Ok(self.fetch_all(sql, args).await?.into_iter().next())
    }
}

/// Typed helpers on top of [`Queryer`].
#[async_trait]
pub trait QueryerExt: Queryer {
    /// Runs a query and appends every row, materialized as `T`, to `dest`.
    async fn query_into<T: Record>(&mut self, dest: &mut Vec<T>, sql: &str, args: &[Value]) -> Result<()> {
        let descriptor = TableDescriptor::of::<T>()?;
        for row in self.fetch_all(sql, args).await? {
            dest.push(T::from_row(&RowReader::new(&row, &descriptor))?);
        }
        Ok(())
    }

    /// Runs a query and overwrites `dest` with its first row.
    async fn query_one_into<T: Record>(&mut self, dest: &mut T, sql: &str, args: &[Value]) -> Result<()> {
        let descriptor = TableDescriptor::of::<T>()?;
        let row = self
            .fetch_optional(sql, args)
            .await?
            .ok_or(Error::RowNotFound)?;
        *dest = T::from_row(&RowReader::new(&row, &descriptor))?;
        Ok(())
    }
}

#[async_trait]
impl<Q: Queryer + ?Sized> QueryerExt for Q {}

/// A transactional [`Queryer`] that ends by commit or rollback.
#[async_trait]
pub trait Transaction: Queryer + Sized {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Runs `f` inside `tx`. The transaction is committed only when `f` returns
/// `Ok(true)`; `Ok(false)` and errors roll it back.
///
/// ```ignore
/// let committed = transactional(db.begin().await?, |tx| {
///     Box::pin(async move {
///         users.insert(&[user], tx).await?;
///         Ok(true)
///     })
/// })
/// .await?;
/// ```
pub async fn transactional<Tx, F>(mut tx: Tx, f: F) -> Result<bool>
where
    Tx: Transaction,
    F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<bool>>,
{
    let outcome = f(&mut tx).await;
    match outcome {
        Ok(true) => {
            tx.commit().await?;
            Ok(true)
        }
        Ok(false) => {
            tx.rollback().await?;
            Ok(false)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => {
                warn!(error = %rollback, "rollback failed");
                Err(Error::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                })
            }
        },
    }
}
