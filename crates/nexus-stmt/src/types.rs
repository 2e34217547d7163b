//! SQL-level types shared by the compiler seam, the parameter binder and
//! result sinks.

use std::fmt;

use nexus_wire::packet::{ColumnDefinition, NOT_NULL_FLAG, UNSIGNED_FLAG};
use nexus_wire::{FieldType, Value};

/// A result row.
pub type Row = Vec<Value>;

// =============================================================================
// SqlType
// =============================================================================

/// Declared SQL type of a placeholder or result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// 64-bit integer.
    Integer {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// Bit string; compares as an unsigned integer.
    Bit,
    /// Boolean; compares as a signed integer.
    Bool,
    /// Four digit year.
    Year,
    /// Fixed-point decimal.
    Decimal,
    /// Double precision float.
    Float,
    /// Calendar date.
    Date,
    /// Time of day or duration.
    Time,
    /// Date and time.
    DateTime,
    /// Character string.
    String,
    /// Binary string.
    Blob,
}

impl SqlType {
    /// Signed 64-bit integer.
    pub const BIGINT: Self = Self::Integer { unsigned: false };
    /// Unsigned 64-bit integer.
    pub const BIGINT_UNSIGNED: Self = Self::Integer { unsigned: true };

    /// Returns true for integer, bit, boolean, year, decimal and float.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Integer { .. } | Self::Bit | Self::Bool | Self::Year | Self::Decimal | Self::Float
        )
    }

    /// Returns true for string and blob.
    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Blob)
    }

    /// Returns true for date, time and datetime.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::DateTime)
    }

    /// Returns true if in-range non-negative literals should be read as
    /// unsigned for this type.
    #[must_use]
    pub const fn prefers_unsigned(self) -> bool {
        matches!(self, Self::Integer { unsigned: true } | Self::Bit)
    }

    /// Wire type and unsigned flag used to send values of this type.
    #[must_use]
    pub const fn field_type(self) -> (FieldType, bool) {
        match self {
            Self::Integer { unsigned } => (FieldType::LongLong, unsigned),
            Self::Bit => (FieldType::Bit, true),
            Self::Bool => (FieldType::Tiny, false),
            Self::Year => (FieldType::Year, true),
            Self::Decimal => (FieldType::NewDecimal, false),
            Self::Float => (FieldType::Double, false),
            Self::Date => (FieldType::Date, false),
            Self::Time => (FieldType::Time, false),
            Self::DateTime => (FieldType::DateTime, false),
            Self::String => (FieldType::VarString, false),
            Self::Blob => (FieldType::Blob, false),
        }
    }

    /// Maps a wire type to the SQL type a value bound with it carries.
    #[must_use]
    pub const fn from_field_type(field_type: FieldType, unsigned: bool) -> Self {
        match field_type {
            FieldType::Tiny
            | FieldType::Short
            | FieldType::Long
            | FieldType::Int24
            | FieldType::LongLong => Self::Integer { unsigned },
            FieldType::Year => Self::Year,
            FieldType::Bit => Self::Bit,
            FieldType::Float | FieldType::Double => Self::Float,
            FieldType::Decimal | FieldType::NewDecimal => Self::Decimal,
            FieldType::Date => Self::Date,
            FieldType::Time => Self::Time,
            FieldType::DateTime | FieldType::Timestamp => Self::DateTime,
            FieldType::TinyBlob
            | FieldType::MediumBlob
            | FieldType::LongBlob
            | FieldType::Blob
            | FieldType::Geometry => Self::Blob,
            _ => Self::String,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer { unsigned: false } => "BIGINT",
            Self::Integer { unsigned: true } => "BIGINT UNSIGNED",
            Self::Bit => "BIT",
            Self::Bool => "BOOLEAN",
            Self::Year => "YEAR",
            Self::Decimal => "DECIMAL",
            Self::Float => "DOUBLE",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::String => "VARCHAR",
            Self::Blob => "BLOB",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ActualKind
// =============================================================================

/// The kind of value actually bound to a placeholder, derived at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActualKind {
    /// NULL, or not bound yet.
    #[default]
    Null,
    /// Integer.
    Integer {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// Decimal.
    Decimal,
    /// Float.
    Float,
    /// Date.
    Date,
    /// Time.
    Time,
    /// Date and time.
    DateTime,
    /// String or bytes.
    String,
}

impl ActualKind {
    /// Returns the SQL type a reprepare should declare for this kind.
    #[must_use]
    pub const fn as_sql_type(self) -> Option<SqlType> {
        match self {
            Self::Null => None,
            Self::Integer { unsigned } => Some(SqlType::Integer { unsigned }),
            Self::Decimal => Some(SqlType::Decimal),
            Self::Float => Some(SqlType::Float),
            Self::Date => Some(SqlType::Date),
            Self::Time => Some(SqlType::Time),
            Self::DateTime => Some(SqlType::DateTime),
            Self::String => Some(SqlType::String),
        }
    }
}

impl fmt::Display for ActualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_sql_type() {
            Some(t) => write!(f, "{t}"),
            None => f.write_str("NULL"),
        }
    }
}

// =============================================================================
// Result columns
// =============================================================================

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name or alias.
    pub name: String,
    /// Source table, if any.
    pub table: Option<String>,
    /// Column type.
    pub sql_type: SqlType,
    /// Whether the column may hold NULL.
    pub nullable: bool,
}

impl ColumnMeta {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            table: None,
            sql_type,
            nullable: true,
        }
    }

    /// Sets the source table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Wire type and unsigned flag of this column.
    #[must_use]
    pub fn wire_type(&self) -> (FieldType, bool) {
        self.sql_type.field_type()
    }

    /// Builds the protocol column definition.
    #[must_use]
    pub fn to_definition(&self) -> ColumnDefinition {
        let (field_type, unsigned) = self.wire_type();
        let mut def = ColumnDefinition::new(self.name.clone(), field_type);
        if let Some(table) = &self.table {
            def.table.clone_from(table);
        }
        if unsigned {
            def.flags |= UNSIGNED_FLAG;
        }
        if !self.nullable {
            def.flags |= NOT_NULL_FLAG;
        }
        def
    }
}

// =============================================================================
// Objects, engines, commands
// =============================================================================

/// A schema-qualified object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    /// Schema, if qualified.
    pub schema: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectName {
    /// Creates an unqualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Creates a qualified name.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Execution engine a plan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Engine {
    /// Primary row-store engine.
    #[default]
    Primary,
    /// Secondary (offload) engine.
    Secondary,
}

impl Engine {
    /// Returns the other engine.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// Broad class of a compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    /// Query producing rows.
    Select,
    /// Row insertion.
    Insert,
    /// Row update.
    Update,
    /// Row deletion.
    Delete,
    /// Stored procedure call.
    Call,
    /// Informational statement.
    Show,
    /// Schema change.
    Ddl,
    /// Anything else.
    Other,
}

impl CommandClass {
    /// Returns true if a stale-metadata failure may be retried after a
    /// reprepare.
    #[must_use]
    pub const fn allows_retry(self) -> bool {
        !matches!(self, Self::Ddl | Self::Other)
    }

    /// Returns true if results may be delivered through a cursor.
    #[must_use]
    pub const fn supports_cursor(self) -> bool {
        matches!(self, Self::Select)
    }
}
