use std::marker::PhantomData;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::descriptor::Record;
use crate::error::{Error, Result};
use crate::queryer::Queryer;
use crate::schema::TableDescriptor;
use crate::value::{RowReader, Value};

/// Anything a select can read from: a table or another select.
pub trait Selectable: Send + Sync {
    /// Sql for the `FROM` clause.
    fn from_statement(&self) -> String;

    /// Columns of the rows this source produces; maps logical field names to
    /// physical column names and shapes the materialized records.
    fn descriptor(&self) -> &TableDescriptor;
}

static TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("valid regex"));

fn template_field(caps: &Captures<'_>) -> String {
    caps[1].trim_matches(|c| c == '{' || c == '}').trim().to_string()
}

/// Replaces every `{{Field}}` with the quoted column name of that field.
///
/// References that do not resolve are replaced by nothing and logged as a
/// warning. Use [`resolve_templates_strict`] to reject them instead.
pub fn resolve_templates(template: &str, descriptor: &TableDescriptor) -> String {
    TEMPLATE
        .replace_all(template, |caps: &Captures<'_>| {
            let field = template_field(caps);
            match descriptor.physical_name(&field) {
                Some(name) => format!("`{name}`"),
                None => {
                    warn!(field = %field, template, "dropping unresolved template field");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Like [`resolve_templates`] but fails on the first unresolved reference.
pub fn resolve_templates_strict(template: &str, descriptor: &TableDescriptor) -> Result<String> {
    if let Some(missing) = TEMPLATE
        .captures_iter(template)
        .map(|caps| template_field(&caps))
        .find(|field| descriptor.physical_name(field).is_none())
    {
        return Err(Error::UnresolvedField(missing));
    }
    Ok(resolve_templates(template, descriptor))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: u64,
    pub row_count: u64,
}

/// A select statement under construction. Results materialize as `T`.
pub struct Select<T> {
    fields: String,
    from: Box<dyn Selectable>,
    alias: Option<String>,
    where_condition: Option<String>,
    group_by: Option<String>,
    order_by: Option<String>,
    limit: Option<Limit>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Select<T> {
    pub fn new(fields: &str, from: impl Selectable + 'static) -> Self {
        let fields = resolve_templates(fields, from.descriptor());
        Self {
            fields,
            from: Box::new(from),
            alias: None,
            where_condition: None,
            group_by: None,
            order_by: None,
            limit: None,
            _marker: PhantomData,
        }
    }

    fn resolve(&self, template: &str) -> String {
        resolve_templates(template, self.from.descriptor())
    }

    /// Alias for the `FROM` source.
    pub fn r#as(mut self, alias: &str) -> Self {
        self.alias = Some(self.resolve(alias));
        self
    }

    pub fn r#where(mut self, condition: &str) -> Self {
        self.where_condition = Some(self.resolve(condition));
        self
    }

    pub fn group_by(mut self, expression: &str) -> Self {
        self.group_by = Some(self.resolve(expression));
        self
    }

    pub fn order_by(mut self, expression: &str) -> Self {
        self.order_by = Some(self.resolve(expression));
        self
    }

    pub fn limit(mut self, offset: u64, row_count: u64) -> Self {
        self.limit = Some(Limit { offset, row_count });
        self
    }

    /// Select from this select as a subquery.
    /// ```ignore
    /// let recent = users.select("*").order_by("{{created_at}} DESC").limit(0, 100);
    /// let names = recent.select("{{name}}").r#as("recent").run(&mut db, &[]).await?;
    /// ```
    pub fn select(self, fields: &str) -> Select<T> {
        Select::new(fields, self)
    }

    /// The rendered sql.
    pub fn query(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.fields, self.from.from_statement());

        if let Some(alias) = non_empty(&self.alias) {
            sql += &format!(" AS {alias}");
        }
        if let Some(condition) = non_empty(&self.where_condition) {
            sql += &format!(" WHERE {condition}");
        }
        if let Some(group_by) = non_empty(&self.group_by) {
            sql += &format!(" GROUP BY {group_by}");
        }
        if let Some(order_by) = non_empty(&self.order_by) {
            sql += &format!(" ORDER BY {order_by}");
        }
        if let Some(limit) = self.limit {
            sql += &format!(" LIMIT {}, {}", limit.offset, limit.row_count);
        }
        sql
    }

    /// Run the query and materialize every row as `T`.
    pub async fn run<Q: Queryer + ?Sized>(&self, queryer: &mut Q, args: &[Value]) -> Result<Vec<T>> {
        let sql = self.query();
        debug!(sql = %sql, "select");
        let rows = queryer.fetch_all(&sql, args).await?;
        let descriptor = self.from.descriptor();
        rows.iter()
            .map(|row| T::from_row(&RowReader::new(row, descriptor)))
            .collect()
    }

    /// Run the query limited to one row and return it, if any. An offset set
    /// with [`Select::limit`] is kept.
    pub async fn first<Q: Queryer + ?Sized>(self, queryer: &mut Q, args: &[Value]) -> Result<Option<T>> {
        let offset = self.limit.map_or(0, |l| l.offset);
        let select = self.limit(offset, 1);
        Ok(select.run(queryer, args).await?.into_iter().next())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl<T: Record> Selectable for Select<T> {
    fn from_statement(&self) -> String {
        format!("({})", self.query())
    }

    fn descriptor(&self) -> &TableDescriptor {
        self.from.descriptor()
    }
}

impl<T: Record> std::fmt::Debug for Select<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Select").field("query", &self.query()).finish()
    }
}
