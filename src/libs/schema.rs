// schema.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::descriptor::{FieldDescriptor, Record, StructDescriptor};
use crate::error::{Error, Result};

/// Column types that can be inferred from a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    UnsignedTinyInt,
    UnsignedSmallInt,
    UnsignedInt,
    UnsignedBigInt,
    Float,
    Double,
    Bool,
    Text,
    Blob,
    Date,
    DateTime,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::TinyInt => "tinyint",
            ColumnType::SmallInt => "smallint",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::UnsignedTinyInt => "tinyint unsigned",
            ColumnType::UnsignedSmallInt => "smallint unsigned",
            ColumnType::UnsignedInt => "int unsigned",
            ColumnType::UnsignedBigInt => "bigint unsigned",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Bool => "tinyint(1)",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One metadata directive attached to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Leave the field out of the schema.
    Skip,
    /// The raw fragment is the complete column type; nothing is inferred.
    Override,
    /// The column is the primary key.
    Primary,
    /// The value is generated by the database, never inserted or updated.
    Auto,
    /// Explicit column name.
    Name(String),
    /// Sql appended after the column type, or the type itself with `Override`.
    Raw(String),
}

/// Parses the textual annotation form: comma separated components where `-`
/// or `skip`, `override`, `primary` and `auto` are keywords, `name=x` names
/// the column and anything else is raw sql.
pub fn parse_annotation(annotation: &str) -> Vec<Directive> {
    annotation
        .split(',')
        .filter(|c| !c.is_empty())
        .map(|component| match component {
            "-" | "skip" => Directive::Skip,
            "override" => Directive::Override,
            "primary" => Directive::Primary,
            "auto" => Directive::Auto,
            _ => match component.split_once('=') {
                Some((key, name)) if key.trim() == "name" => Directive::Name(name.trim().to_string()),
                _ => Directive::Raw(component.to_string()),
            },
        })
        .collect()
}

/// The explicit column name layer, applied before directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOverride {
    Named(String),
    Skip,
}

impl NameOverride {
    /// `-` is the skip sentinel, anything else a column name.
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            NameOverride::Skip
        } else {
            NameOverride::Named(value.to_string())
        }
    }
}

static FIRST_CAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(.)([A-Z][a-z]+)").expect("valid regex"));
static ALL_CAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-z0-9])([A-Z])").expect("valid regex"));

/// Default column name for a field: `UserID` → `user_id`,
/// `HTTPServer` → `http_server`. Snake case names are returned as is.
pub fn snake_case(name: &str) -> String {
    let snake = FIRST_CAP.replace_all(name, "${1}_${2}");
    let snake = ALL_CAP.replace_all(&snake, "${1}_${2}");
    snake.to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Field name, used in `{{...}}` query templates.
    pub logical_name: String,
    /// Column name in sql.
    pub name: String,
    pub column_type: Option<ColumnType>,
    pub raw: Option<String>,
    pub is_override: bool,
    pub is_primary: bool,
    pub is_auto: bool,
}

impl ColumnDescriptor {
    /// Column definition as used in `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let raw = self.raw.as_deref().unwrap_or("");
        if self.is_override {
            if raw.is_empty() {
                return format!("`{}`", self.name);
            }
            return format!("`{}` {}", self.name, raw);
        }

        // Non override columns always have a type, the builder checks it.
        let ty = self.column_type.map(|t| t.as_sql()).unwrap_or("");
        if raw.is_empty() {
            format!("`{}` {}", self.name, ty)
        } else {
            format!("`{}` {} {}", self.name, ty, raw)
        }
    }

    /// Included in `INSERT` column lists.
    pub fn is_insertable(&self) -> bool {
        !self.is_auto
    }

    /// Included in `UPDATE ... SET`.
    pub fn is_updatable(&self) -> bool {
        !self.is_primary && !self.is_auto
    }
}

/// Columns derived from a record type, in field declaration order.
#[derive(Debug, Clone, Default)]
pub struct TableDescriptor {
    columns: Vec<ColumnDescriptor>,
    by_logical_name: HashMap<String, usize>,
    primary: Option<usize>,
}

impl TableDescriptor {
    pub fn of<R: Record>() -> Result<Self> {
        Self::build(&R::describe())
    }

    /// Derives the columns of a record.
    ///
    /// Exported fields are scanned with embedded records flattened. Each
    /// field gets a snake case column name and a column type inferred from
    /// its kind, then the explicit name layer and the directives are applied
    /// in that order. Without a `primary` directive the first column is the
    /// primary key.
    pub fn build(descriptor: &StructDescriptor) -> Result<Self> {
        let mut table = TableDescriptor::default();
        let mut names: HashMap<String, usize> = HashMap::new();

        descriptor.scan_fields(true, true, |field| {
            let Some(column) = column_from_field(field)? else {
                return Ok(());
            };

            if table.by_logical_name.contains_key(&column.logical_name) {
                return Err(Error::DuplicateField {
                    field: column.logical_name,
                });
            }
            if let Some(&other) = names.get(&column.name) {
                return Err(Error::DuplicateColumn {
                    column: column.name,
                    first: table.columns[other].logical_name.clone(),
                    second: field.name().to_string(),
                });
            }

            let index = table.columns.len();
            if column.is_primary {
                if let Some(first) = table.primary {
                    return Err(Error::MultiplePrimary {
                        first: table.columns[first].logical_name.clone(),
                        second: column.logical_name,
                    });
                }
                table.primary = Some(index);
            }

            names.insert(column.name.clone(), index);
            table
                .by_logical_name
                .insert(column.logical_name.clone(), index);
            table.columns.push(column);
            Ok(())
        })?;

        if table.primary.is_none() {
            if let Some(first) = table.columns.first_mut() {
                first.is_primary = true;
                table.primary = Some(0);
            }
        }

        Ok(table)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Column of the field with the given logical name.
    pub fn column(&self, logical_name: &str) -> Option<&ColumnDescriptor> {
        self.by_logical_name
            .get(logical_name)
            .map(|&i| &self.columns[i])
    }

    pub fn physical_name(&self, logical_name: &str) -> Option<&str> {
        self.column(logical_name).map(|c| c.name.as_str())
    }

    pub fn primary(&self) -> Option<&ColumnDescriptor> {
        self.primary.map(|i| &self.columns[i])
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn column_from_field(field: &FieldDescriptor) -> Result<Option<ColumnDescriptor>> {
    let mut column = ColumnDescriptor {
        logical_name: field.name().to_string(),
        name: snake_case(field.name()),
        column_type: field.column_type(),
        raw: None,
        is_override: false,
        is_primary: false,
        is_auto: false,
    };

    let mut skip = false;
    match field.get_name_override() {
        Some(NameOverride::Skip) => skip = true,
        Some(NameOverride::Named(name)) => column.name = name.clone(),
        None => {}
    }

    for directive in field.get_directives() {
        match directive {
            Directive::Skip => skip = true,
            Directive::Override => column.is_override = true,
            Directive::Primary => column.is_primary = true,
            Directive::Auto => column.is_auto = true,
            Directive::Name(name) => column.name = name.clone(),
            Directive::Raw(raw) => column.raw = Some(raw.clone()),
        }
    }

    if skip {
        return Ok(None);
    }
    if column.column_type.is_none() && !column.is_override {
        return Err(Error::UnmappableField {
            field: field.name().to_string(),
        });
    }
    Ok(Some(column))
}
