use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::Record;
use crate::error::{Error, Result};
use crate::queryer::{ExecResult, Queryer};
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::select::{Select, Selectable, resolve_templates};
use crate::value::Value;

pub const DEFAULT_ENGINE: &str = "InnoDB";
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Sql text with its positional `?` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub async fn execute<Q: Queryer + ?Sized>(&self, queryer: &mut Q) -> Result<ExecResult> {
        queryer.execute(&self.sql, &self.args).await
    }
}

/// The type-erased side of a table, enough to create it and resolve
/// templates against it.
pub trait Tabler: Send + Sync {
    fn engine(&self) -> &str;
    fn charset(&self) -> &str;
    fn name(&self) -> &str;
    /// Raw `KEY`, `INDEX` and `CONSTRAINT` clauses added to `CREATE TABLE`.
    fn keys_and_constraints(&self) -> &[String];
    fn descriptor(&self) -> &TableDescriptor;

    /// `CREATE TABLE IF NOT EXISTS` statement for the table.
    fn create_statement(&self) -> String {
        let desc = self.descriptor();

        let mut entries: Vec<String> = desc.columns().iter().map(|c| c.definition()).collect();
        if let Some(primary) = desc.primary() {
            entries.push(format!("PRIMARY KEY (`{}`)", primary.name));
        }
        entries.extend(self.keys_and_constraints().iter().cloned());

        let body: Vec<String> = entries.iter().map(|e| format!("\t{e}")).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\n{}\n) ENGINE={} DEFAULT CHARSET={};",
            self.name(),
            body.join(",\n"),
            self.engine(),
            self.charset()
        )
    }

    /// Replaces `{{Field}}` references with quoted column names.
    fn resolve_query_templates(&self, query: &str) -> String {
        resolve_templates(query, self.descriptor())
    }
}

/// A typed handle to a database table whose rows are `T` records.
pub struct Table<T> {
    engine: String,
    charset: String,
    name: String,
    keys_and_constraints: Vec<String>,
    descriptor: Arc<TableDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            charset: self.charset.clone(),
            name: self.name.clone(),
            keys_and_constraints: self.keys_and_constraints.clone(),
            descriptor: Arc::clone(&self.descriptor),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("charset", &self.charset)
            .field("columns", &self.descriptor.len())
            .finish()
    }
}

impl<T: Record> Table<T> {
    /// Create a new table handle, deriving its columns from `T`.
    /// ```ignore
    /// let users = Table::<User>::new("users")?;
    /// ```
    pub fn new(name: &str) -> Result<Self> {
        let descriptor = TableDescriptor::of::<T>()?;
        Ok(Self {
            engine: DEFAULT_ENGINE.to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            name: name.to_string(),
            keys_and_constraints: Vec::new(),
            descriptor: Arc::new(descriptor),
            _marker: PhantomData,
        })
    }

    pub fn with_engine(mut self, engine: &str) -> Self {
        self.engine = engine.to_string();
        self
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = charset.to_string();
        self
    }

    /// Adds a raw key or constraint clause to `CREATE TABLE`.
    /// ```ignore
    /// let users = Table::<User>::new("users")?.with_key("UNIQUE KEY `email` (`email`(191))");
    /// ```
    pub fn with_key(mut self, clause: &str) -> Self {
        self.keys_and_constraints.push(clause.to_string());
        self
    }

    pub fn shared_descriptor(&self) -> Arc<TableDescriptor> {
        Arc::clone(&self.descriptor)
    }

    fn value_of(record: &T, column: &ColumnDescriptor) -> Result<Value> {
        record
            .field_value(&column.logical_name)
            .ok_or_else(|| Error::MissingField {
                field: column.logical_name.clone(),
            })
    }

    fn primary_column(&self) -> Result<&ColumnDescriptor> {
        self.descriptor.primary().ok_or_else(|| Error::MissingPrimary {
            table: self.name.clone(),
        })
    }

    /// One multi-row `INSERT` for `records`. Auto columns are left to the
    /// database; arguments follow column order, record by record.
    pub fn insert_statement(&self, records: &[T]) -> Result<Statement> {
        if records.is_empty() {
            return Err(Error::EmptyInsert {
                table: self.name.clone(),
            });
        }

        let columns: Vec<&ColumnDescriptor> = self
            .descriptor
            .columns()
            .iter()
            .filter(|c| c.is_insertable())
            .collect();

        let names: Vec<String> = columns.iter().map(|c| format!("`{}`", c.name)).collect();
        let group = format!("({})", vec!["?"; columns.len()].join(","));

        let mut args = Vec::with_capacity(records.len() * columns.len());
        for record in records {
            for column in &columns {
                args.push(Self::value_of(record, column)?);
            }
        }

        let sql = format!(
            "INSERT INTO `{}` ({}) VALUES {}",
            self.name,
            names.join(","),
            vec![group.as_str(); records.len()].join(",")
        );
        Ok(Statement::new(sql, args))
    }

    /// `UPDATE` of every updatable column, matched on the primary key.
    pub fn update_statement(&self, record: &T) -> Result<Statement> {
        let primary = self.primary_column()?;

        let mut sets = Vec::new();
        let mut args = Vec::new();
        for column in self.descriptor.columns().iter().filter(|c| c.is_updatable()) {
            sets.push(format!("`{}`=?", column.name));
            args.push(Self::value_of(record, column)?);
        }
        if sets.is_empty() {
            return Err(Error::NothingToUpdate {
                table: self.name.clone(),
            });
        }
        args.push(Self::value_of(record, primary)?);

        let sql = format!(
            "UPDATE `{}` SET {} WHERE `{}`=?",
            self.name,
            sets.join(","),
            primary.name
        );
        Ok(Statement::new(sql, args))
    }

    /// `DELETE` matched on the primary key.
    pub fn delete_statement(&self, record: &T) -> Result<Statement> {
        let primary = self.primary_column()?;
        let sql = format!("DELETE FROM `{}` WHERE `{}`=?", self.name, primary.name);
        Ok(Statement::new(sql, vec![Self::value_of(record, primary)?]))
    }

    /// Insert records into the table.
    ///
    /// # Example
    /// ```ignore
    /// users.insert(&[ada, grace], &mut db).await?;
    /// ```
    pub async fn insert<Q: Queryer + ?Sized>(&self, records: &[T], queryer: &mut Q) -> Result<ExecResult> {
        let statement = self.insert_statement(records)?;
        debug!(table = %self.name, records = records.len(), sql = %statement.sql, "insert");
        statement.execute(queryer).await
    }

    /// Update a record, using the primary key for the where clause.
    pub async fn update<Q: Queryer + ?Sized>(&self, record: &T, queryer: &mut Q) -> Result<ExecResult> {
        let statement = self.update_statement(record)?;
        debug!(table = %self.name, sql = %statement.sql, args = ?statement.args, "update");
        statement.execute(queryer).await
    }

    pub async fn delete<Q: Queryer + ?Sized>(&self, record: &T, queryer: &mut Q) -> Result<ExecResult> {
        let statement = self.delete_statement(record)?;
        debug!(table = %self.name, sql = %statement.sql, "delete");
        statement.execute(queryer).await
    }

    /// Create the table if it does not exist yet.
    pub async fn create<Q: Queryer + ?Sized>(&self, queryer: &mut Q) -> Result<ExecResult> {
        let sql = self.create_statement();
        debug!(table = %self.name, "create table");
        queryer.execute(&sql, &[]).await
    }

    /// Start a select from this table. `fields` may use `{{Field}}` references.
    ///
    /// # Example
    /// ```ignore
    /// let adults = users
    ///     .select("*")
    ///     .r#where("{{age}} >= ?")
    ///     .order_by("{{name}} ASC")
    ///     .limit(0, 10)
    ///     .run(&mut db, &[18.into()])
    ///     .await?;
    /// ```
    pub fn select(&self, fields: &str) -> Select<T> {
        Select::new(fields, self.source())
    }

    /// This table as the source of a select.
    pub fn source(&self) -> TableSource {
        TableSource {
            name: self.name.clone(),
            descriptor: Arc::clone(&self.descriptor),
        }
    }
}

impl<T: Record> Tabler for Table<T> {
    fn engine(&self) -> &str {
        &self.engine
    }

    fn charset(&self) -> &str {
        &self.charset
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn keys_and_constraints(&self) -> &[String] {
        &self.keys_and_constraints
    }

    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }
}

/// A table used as a select source.
#[derive(Debug, Clone)]
pub struct TableSource {
    name: String,
    descriptor: Arc<TableDescriptor>,
}

impl Selectable for TableSource {
    fn from_statement(&self) -> String {
        format!("`{}`", self.name)
    }

    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }
}
