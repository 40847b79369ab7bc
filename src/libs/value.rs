use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::schema::{ColumnType, TableDescriptor};
use crate::types::{DATE_FORMAT, DATETIME_FORMAT, Date, DateTime};

/// A value bound to a statement placeholder or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Bool(v) => Some(v as i128),
            Value::I8(v) => Some(v as i128),
            Value::I16(v) => Some(v as i128),
            Value::I32(v) => Some(v as i128),
            Value::I64(v) => Some(v as i128),
            Value::U8(v) => Some(v as i128),
            Value::U16(v) => Some(v as i128),
            Value::U32(v) => Some(v as i128),
            Value::U64(v) => Some(v as i128),
            Value::Text(ref s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            Value::Text(ref s) => s.trim().parse().ok(),
            ref other => other.as_i128().map(|v| v as f64),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "\"{}\"", v.format(DATE_FORMAT)),
            Value::DateTime(v) => write!(f, "\"{}\"", v.format(DATETIME_FORMAT)),
        }
    }
}

/// Conversion between a record field type and [`Value`].
///
/// `COLUMN_TYPE` is the column type inferred for fields of this type. Types
/// without an inference must be marked `override` and give their column type
/// as raw sql.
pub trait FieldValue: Sized {
    const COLUMN_TYPE: Option<ColumnType>;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(value: &Value) -> Error {
    Error::decode(
        std::any::type_name::<T>(),
        format!("unexpected value {value}"),
    )
}

macro_rules! integer_field {
    ($($ty:ty => $variant:ident, $column:expr;)*) => {
        $(
            impl FieldValue for $ty {
                const COLUMN_TYPE: Option<ColumnType> = Some($column);

                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn from_value(value: Value) -> Result<Self> {
                    value
                        .as_i128()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| mismatch::<$ty>(&value))
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

integer_field! {
    i8 => I8, ColumnType::TinyInt;
    i16 => I16, ColumnType::SmallInt;
    i32 => I32, ColumnType::Int;
    i64 => I64, ColumnType::BigInt;
    u8 => U8, ColumnType::UnsignedTinyInt;
    u16 => U16, ColumnType::UnsignedSmallInt;
    u32 => U32, ColumnType::UnsignedInt;
    u64 => U64, ColumnType::UnsignedBigInt;
}

impl FieldValue for isize {
    #[cfg(target_pointer_width = "32")]
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Int);
    #[cfg(not(target_pointer_width = "32"))]
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::BigInt);

    fn to_value(&self) -> Value {
        Value::I64(*self as i64)
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i128()
            .and_then(|v| isize::try_from(v).ok())
            .ok_or_else(|| mismatch::<isize>(&value))
    }
}

impl FieldValue for usize {
    #[cfg(target_pointer_width = "32")]
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::UnsignedInt);
    #[cfg(not(target_pointer_width = "32"))]
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::UnsignedBigInt);

    fn to_value(&self) -> Value {
        Value::U64(*self as u64)
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i128()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| mismatch::<usize>(&value))
    }
}

impl FieldValue for f32 {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Float);

    fn to_value(&self) -> Value {
        Value::F32(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::F32(v) => Ok(v),
            ref other => other
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| mismatch::<f32>(other)),
        }
    }
}

impl FieldValue for f64 {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Double);

    fn to_value(&self) -> Value {
        Value::F64(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch::<f64>(&value))
    }
}

impl FieldValue for bool {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Bool);

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            ref other => other
                .as_i128()
                .map(|v| v != 0)
                .ok_or_else(|| mismatch::<bool>(other)),
        }
    }
}

impl FieldValue for String {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Text);

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Blob(v) => String::from_utf8(v).map_err(|e| Error::decode("String", e)),
            other => Err(mismatch::<String>(&other)),
        }
    }
}

impl FieldValue for Vec<u8> {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Blob);

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(mismatch::<Vec<u8>>(&other)),
        }
    }
}

impl FieldValue for Date {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::Date);

    fn to_value(&self) -> Value {
        Value::Date(self.0)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(Date(v)),
            Value::DateTime(v) => Ok(Date(v.date())),
            Value::Text(v) => v.parse(),
            Value::Blob(v) => String::from_utf8_lossy(&v).parse(),
            other => Err(mismatch::<Date>(&other)),
        }
    }
}

impl FieldValue for DateTime {
    const COLUMN_TYPE: Option<ColumnType> = Some(ColumnType::DateTime);

    fn to_value(&self) -> Value {
        Value::DateTime(self.0)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(DateTime(v)),
            Value::Text(v) => v.parse(),
            Value::Blob(v) => String::from_utf8_lossy(&v).parse(),
            other => Err(mismatch::<DateTime>(&other)),
        }
    }
}

// Uuid has no inferred column type, declare it with `override` (e.g. `CHAR(36)`).
impl FieldValue for Uuid {
    const COLUMN_TYPE: Option<ColumnType> = None;

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Uuid::parse_str(&v).map_err(|e| Error::decode("Uuid", e)),
            Value::Blob(v) if v.len() == 16 => {
                Uuid::from_slice(&v).map_err(|e| Error::decode("Uuid", e))
            }
            Value::Blob(v) => {
                Uuid::parse_str(&String::from_utf8_lossy(&v)).map_err(|e| Error::decode("Uuid", e))
            }
            other => Err(mismatch::<Uuid>(&other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const COLUMN_TYPE: Option<ColumnType> = T::COLUMN_TYPE;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v.0)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v.0)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        v.to_value()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: physical column names with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Reads record fields out of a [`Row`] by logical field name, using the
/// descriptor to find each field's physical column.
pub struct RowReader<'a> {
    row: &'a Row,
    descriptor: &'a TableDescriptor,
}

impl<'a> RowReader<'a> {
    pub fn new(row: &'a Row, descriptor: &'a TableDescriptor) -> Self {
        Self { row, descriptor }
    }

    /// Value of a field. Fields that are not columns, or whose column was not
    /// selected, read as `T::default()`.
    pub fn get<T>(&self, field: &str) -> Result<T>
    where
        T: FieldValue + Default,
    {
        let Some(column) = self.descriptor.column(field) else {
            return Ok(T::default());
        };
        match self.row.get(&column.name) {
            Some(value) => T::from_value(value.clone()).map_err(|err| match err {
                Error::Decode { reason, .. } => Error::Decode {
                    column: column.name.clone(),
                    reason,
                },
                other => other,
            }),
            None => Ok(T::default()),
        }
    }

    pub fn row(&self) -> &Row {
        self.row
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        self.descriptor
    }
}
