//! Explicit description of a record type: its fields, in declaration order,
//! with everything the schema builder needs to derive columns from them.
//!
//! Descriptors are normally produced by `#[derive(Record)]`, but can be
//! assembled by hand with [`StructDescriptor::new`] and the
//! [`FieldDescriptor`] builder methods.
//!
//! Embedding is assumed to be acyclic: a record never embeds itself, directly
//! or through another record, so scanning does not guard against cycles.

use crate::error::{Error, Result};
use crate::schema::{ColumnType, Directive, NameOverride, parse_annotation};
use crate::value::{RowReader, Value};

/// A type that maps onto a table row.
pub trait Record: Send + Sync + Sized + 'static {
    /// Describes the fields of the record.
    fn describe() -> StructDescriptor;

    /// Current value of the field with the given logical name, looking into
    /// embedded records as well.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Builds a record from a result row.
    fn from_row(row: &RowReader<'_>) -> Result<Self>;
}

/// What a field holds.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A single value with an inferred column type, if one exists.
    Value(Option<ColumnType>),
    /// A nested record; scanning can flatten its fields into the parent.
    Record(fn() -> StructDescriptor),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    exported: bool,
    embedded: bool,
    name_override: Option<NameOverride>,
    directives: Vec<Directive>,
}

impl FieldDescriptor {
    /// A public value field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            exported: true,
            embedded: false,
            name_override: None,
            directives: Vec::new(),
        }
    }

    /// A value field whose column type is inferred from `T`.
    pub fn of<T: crate::value::FieldValue>(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Value(T::COLUMN_TYPE))
    }

    /// An embedded record whose fields are flattened into the parent.
    pub fn embed<R: Record>(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Record(R::describe)).embedded(true)
    }

    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn embedded(mut self, embedded: bool) -> Self {
        self.embedded = embedded;
        self
    }

    /// Sets the explicit column name layer; `-` skips the field.
    pub fn db(mut self, name: &str) -> Self {
        self.name_override = Some(NameOverride::parse(name));
        self
    }

    pub fn name_override(mut self, name_override: NameOverride) -> Self {
        self.name_override = Some(name_override);
        self
    }

    /// Appends directives parsed from their textual form, e.g.
    /// `"auto,NOT NULL AUTO_INCREMENT"`.
    pub fn sql(mut self, annotation: &str) -> Self {
        self.directives.extend(parse_annotation(annotation));
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn directives(mut self, directives: impl IntoIterator<Item = Directive>) -> Self {
        self.directives.extend(directives);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Inferred column type; `None` for records and types without inference.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self.kind {
            FieldKind::Value(ty) => ty,
            FieldKind::Record(_) => None,
        }
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Fields that are not exported cannot be set from a row.
    pub fn can_set(&self) -> bool {
        self.exported
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn get_name_override(&self) -> Option<&NameOverride> {
        self.name_override.as_ref()
    }

    pub fn get_directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Descriptor of the nested record.
    pub fn struct_descriptor(&self) -> Result<StructDescriptor> {
        match self.kind {
            FieldKind::Record(describe) => Ok(describe()),
            FieldKind::Value(_) => Err(Error::NotARecord {
                field: self.name.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn of<R: Record>() -> Self {
        R::describe()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Visits fields in declaration order.
    ///
    /// With `only_exported`, fields that are not exported are passed over.
    /// With `flatten_embedded`, embedded fields are not visited themselves;
    /// their record's fields are scanned in their place.
    pub fn scan_fields<F>(&self, only_exported: bool, flatten_embedded: bool, mut visit: F) -> Result<()>
    where
        F: FnMut(&FieldDescriptor) -> Result<()>,
    {
        self.scan_with(only_exported, flatten_embedded, &mut visit)
    }

    fn scan_with(
        &self,
        only_exported: bool,
        flatten_embedded: bool,
        visit: &mut dyn FnMut(&FieldDescriptor) -> Result<()>,
    ) -> Result<()> {
        for field in &self.fields {
            if only_exported && !field.exported {
                continue;
            }
            if flatten_embedded && field.embedded {
                field
                    .struct_descriptor()?
                    .scan_with(only_exported, flatten_embedded, visit)?;
            } else {
                visit(field)?;
            }
        }
        Ok(())
    }
}
