#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tabler::{Error, ExecResult, Queryer, Result, Row, Transaction, Value};

/// One statement seen by a [`MemoryQueryer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub args: Vec<Value>,
}

/// A queryer that records every statement and answers fetches from a queue
/// of canned results. Statements containing `fail_on` fail.
#[derive(Debug, Default)]
pub struct MemoryQueryer {
    pub log: Vec<Executed>,
    pub results: VecDeque<Vec<Row>>,
    pub fail_on: Option<String>,
}

impl MemoryQueryer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.results.push_back(rows);
        self
    }

    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn statements(&self) -> Vec<&str> {
        self.log.iter().map(|e| e.sql.as_str()).collect()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.log.iter().filter(|e| e.sql.starts_with(prefix)).count()
    }

    fn record(&mut self, sql: &str, args: &[Value]) -> Result<()> {
        self.log.push(Executed {
            sql: sql.to_string(),
            args: args.to_vec(),
        });
        match &self.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(Error::Config(format!("statement failed: {sql}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Queryer for MemoryQueryer {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.record(sql, args)?;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn fetch_all(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, args)?;
        Ok(self.results.pop_front().unwrap_or_default())
    }
}

/// How a [`MemoryTx`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Committed,
    RolledBack,
}

/// A transaction over a [`MemoryQueryer`] that reports how it ended.
pub struct MemoryTx {
    pub inner: MemoryQueryer,
    pub outcome: Arc<Mutex<Option<Outcome>>>,
    pub fail_rollback: bool,
}

impl MemoryTx {
    pub fn new() -> (Self, Arc<Mutex<Option<Outcome>>>) {
        let outcome = Arc::new(Mutex::new(None));
        let tx = Self {
            inner: MemoryQueryer::new(),
            outcome: Arc::clone(&outcome),
            fail_rollback: false,
        };
        (tx, outcome)
    }
}

#[async_trait]
impl Queryer for MemoryTx {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.inner.execute(sql, args).await
    }

    async fn fetch_all(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        self.inner.fetch_all(sql, args).await
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self) -> Result<()> {
        *self.outcome.lock().unwrap() = Some(Outcome::Committed);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        if self.fail_rollback {
            return Err(Error::Config("connection lost".to_string()));
        }
        *self.outcome.lock().unwrap() = Some(Outcome::RolledBack);
        Ok(())
    }
}
