//! Captured values
//!
//! [`Value`] is the object graph rebuilt from a message body. It carries its
//! own runtime types so the code generator can reconcile them against the
//! declared parameter and member types.

use crate::registry::{TypeKind, TypeRegistry};
use crate::typeref::{PrimitiveKind, TypeRef};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use soapreplay_trace::XmlElement;
use uuid::Uuid;

/// Ticks (100 ns units) per second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Clock kind of a date-time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    /// No offset on the wire
    Unspecified,
    /// `Z` on the wire
    Utc,
    /// Explicit offset on the wire
    Local,
}

/// Scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    /// `bool`
    Bool(bool),
    /// `byte`
    Byte(u8),
    /// `sbyte`
    SByte(i8),
    /// `short`
    Int16(i16),
    /// `ushort`
    UInt16(u16),
    /// `int`
    Int32(i32),
    /// `uint`
    UInt32(u32),
    /// `long`
    Int64(i64),
    /// `ulong`
    UInt64(u64),
    /// `float`
    Single(f32),
    /// `double`
    Double(f64),
    /// `decimal`, kept in its lexical form
    Decimal(String),
    /// `char`
    Char(char),
    /// `string`
    String(String),
    /// Date and time of day
    DateTime {
        /// Clock value
        value: NaiveDateTime,
        /// Clock kind
        kind: DateTimeKind,
    },
    /// Duration in ticks
    TimeSpan(i64),
    /// Unique identifier
    Guid(Uuid),
    /// Qualified XML name
    QName {
        /// Namespace URI
        namespace: String,
        /// Local name
        name: String,
    },
    /// Absolute or relative URI
    Uri(String),
}

impl PrimitiveValue {
    /// Kind of this value
    #[must_use]
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Bool(_) => PrimitiveKind::Bool,
            Self::Byte(_) => PrimitiveKind::Byte,
            Self::SByte(_) => PrimitiveKind::SByte,
            Self::Int16(_) => PrimitiveKind::Int16,
            Self::UInt16(_) => PrimitiveKind::UInt16,
            Self::Int32(_) => PrimitiveKind::Int32,
            Self::UInt32(_) => PrimitiveKind::UInt32,
            Self::Int64(_) => PrimitiveKind::Int64,
            Self::UInt64(_) => PrimitiveKind::UInt64,
            Self::Single(_) => PrimitiveKind::Single,
            Self::Double(_) => PrimitiveKind::Double,
            Self::Decimal(_) => PrimitiveKind::Decimal,
            Self::Char(_) => PrimitiveKind::Char,
            Self::String(_) => PrimitiveKind::String,
            Self::DateTime { .. } => PrimitiveKind::DateTime,
            Self::TimeSpan(_) => PrimitiveKind::TimeSpan,
            Self::Guid(_) => PrimitiveKind::Guid,
            Self::QName { .. } => PrimitiveKind::QName,
            Self::Uri(_) => PrimitiveKind::Uri,
        }
    }

    /// Zero value of a value-type kind; `None` for reference kinds
    #[must_use]
    pub fn zero(kind: PrimitiveKind) -> Option<Self> {
        Some(match kind {
            PrimitiveKind::Bool => Self::Bool(false),
            PrimitiveKind::Byte => Self::Byte(0),
            PrimitiveKind::SByte => Self::SByte(0),
            PrimitiveKind::Int16 => Self::Int16(0),
            PrimitiveKind::UInt16 => Self::UInt16(0),
            PrimitiveKind::Int32 => Self::Int32(0),
            PrimitiveKind::UInt32 => Self::UInt32(0),
            PrimitiveKind::Int64 => Self::Int64(0),
            PrimitiveKind::UInt64 => Self::UInt64(0),
            PrimitiveKind::Single => Self::Single(0.0),
            PrimitiveKind::Double => Self::Double(0.0),
            PrimitiveKind::Decimal => Self::Decimal("0".to_string()),
            PrimitiveKind::Char => Self::Char('\0'),
            PrimitiveKind::DateTime => Self::DateTime {
                value: epoch(),
                kind: DateTimeKind::Unspecified,
            },
            PrimitiveKind::TimeSpan => Self::TimeSpan(0),
            PrimitiveKind::Guid => Self::Guid(Uuid::nil()),
            PrimitiveKind::String | PrimitiveKind::QName | PrimitiveKind::Uri => return None,
        })
    }
}

/// `0001-01-01T00:00:00`, the origin of date-time ticks
#[must_use]
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Ticks since [`epoch`] for a date-time
#[must_use]
pub fn ticks_of(value: NaiveDateTime) -> i64 {
    let span = value - epoch();
    span.num_seconds() * TICKS_PER_SECOND + i64::from(value.nanosecond() / 100)
}

/// Column of a captured table
#[derive(Debug, Clone, PartialEq)]
pub struct DataColumnValue {
    /// Column name
    pub name: String,
    /// Column data type
    pub ty: TypeRef,
}

/// Captured table
#[derive(Debug, Clone, PartialEq)]
pub struct DataTableValue {
    /// Table name
    pub name: String,
    /// Table namespace
    pub namespace: String,
    /// Columns in schema order
    pub columns: Vec<DataColumnValue>,
    /// Rows; `None` cells are column-null
    pub rows: Vec<Vec<Option<Value>>>,
}

/// Captured dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetValue {
    /// Runtime type (`DataSet` or a typed subclass)
    pub ty: TypeRef,
    /// Whether the schema is fixed by a typed subclass
    pub typed: bool,
    /// Dataset name
    pub name: String,
    /// Dataset namespace
    pub namespace: String,
    /// Locale name, when recorded
    pub locale: Option<String>,
    /// Tables in schema order
    pub tables: Vec<DataTableValue>,
}

/// Name the framework gives a dataset created without one
pub const DEFAULT_DATASET_NAME: &str = "NewDataSet";

impl DataSetValue {
    /// Whether the dataset name is the framework default
    #[inline]
    #[must_use]
    pub fn has_default_name(&self) -> bool {
        self.name == DEFAULT_DATASET_NAME
    }
}

impl DataTableValue {
    /// Whether the table name is one the framework generates (`Table`, `Table1`, ...)
    #[must_use]
    pub fn has_default_name(&self) -> bool {
        self.name
            .strip_prefix("Table")
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Captured object graph
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,
    /// Scalar
    Primitive(PrimitiveValue),
    /// Enumeration value (flags joined by spaces)
    Enum {
        /// Enumeration type
        ty: TypeRef,
        /// Member name(s)
        member: String,
    },
    /// Array
    Array {
        /// Array type
        ty: TypeRef,
        /// Items in order
        items: Vec<Value>,
    },
    /// List-like collection
    Collection {
        /// Concrete collection type
        ty: TypeRef,
        /// Items in order
        items: Vec<Value>,
    },
    /// Dictionary
    Dictionary {
        /// Concrete dictionary type
        ty: TypeRef,
        /// Entries in order
        entries: Vec<(Value, Value)>,
    },
    /// Compound object
    Object {
        /// Runtime type
        ty: TypeRef,
        /// Member values by member name, in wire order
        fields: IndexMap<String, Value>,
    },
    /// XML fragment
    Xml(XmlElement),
    /// Tabular dataset
    DataSet(DataSetValue),
    /// Stream placeholder (content is never captured)
    Stream,
}

impl Value {
    /// String value
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Primitive(PrimitiveValue::String(s.into()))
    }

    /// `int` value
    #[must_use]
    pub fn int(i: i32) -> Self {
        Self::Primitive(PrimitiveValue::Int32(i))
    }

    /// Compound value with no members set
    #[must_use]
    pub fn empty_object(ty: TypeRef) -> Self {
        Self::Object {
            ty,
            fields: IndexMap::new(),
        }
    }

    /// Check for `null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type; `None` for `null`
    #[must_use]
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Self::Null => None,
            Self::Primitive(p) => Some(TypeRef::Primitive(p.kind())),
            Self::Enum { ty, .. }
            | Self::Array { ty, .. }
            | Self::Collection { ty, .. }
            | Self::Dictionary { ty, .. }
            | Self::Object { ty, .. } => Some(ty.clone()),
            Self::Xml(_) => Some(TypeRef::named("System.Xml.XmlElement")),
            Self::DataSet(ds) => Some(ds.ty.clone()),
            Self::Stream => Some(TypeRef::named("System.IO.MemoryStream")),
        }
    }

    /// Language default for `ty`
    ///
    /// Zero for primitive value types, the first member for enumerations,
    /// an empty instance for structs and `null` for everything else.
    #[must_use]
    pub fn default_for(ty: &TypeRef, registry: &TypeRegistry) -> Self {
        match ty.effective() {
            TypeRef::Primitive(kind) => PrimitiveValue::zero(*kind).map_or(Self::Null, Self::Primitive),
            TypeRef::Nullable(_) | TypeRef::Array { .. } | TypeRef::ByRef(_) => Self::Null,
            named @ TypeRef::Named { .. } => match registry.find_ref(named) {
                Some(def) if def.kind == TypeKind::Enum => def
                    .enum_members
                    .first()
                    .map_or(Self::Null, |m| Self::Enum {
                        ty: named.clone(),
                        member: m.clone(),
                    }),
                Some(def) if def.kind == TypeKind::Struct => Self::empty_object(named.clone()),
                _ => Self::Null,
            },
        }
    }

    /// Nesting depth of the graph (a scalar is 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        let nested = match self {
            Self::Array { items, .. } | Self::Collection { items, .. } => {
                items.iter().map(Value::depth).max().unwrap_or(0)
            }
            Self::Dictionary { entries, .. } => entries
                .iter()
                .map(|(k, v)| k.depth().max(v.depth()))
                .max()
                .unwrap_or(0),
            Self::Object { fields, .. } => fields.values().map(Value::depth).max().unwrap_or(0),
            _ => 0,
        };
        nested + 1
    }
}

impl From<PrimitiveValue> for Value {
    fn from(p: PrimitiveValue) -> Self {
        Self::Primitive(p)
    }
}
