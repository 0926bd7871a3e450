//! Column metadata types for db-conduit.
//!
//! `ColumnDescriptor` is what the transport reports for one column of a
//! result set. `LogicalType` is the host-side type it is translated into.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MySQL server-side column types, as reported in column definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerType {
    Decimal,
    NewDecimal,
    Tiny,
    Short,
    Int24,
    Long,
    LongLong,
    Float,
    Double,
    Null,
    Timestamp,
    Date,
    NewDate,
    Time,
    DateTime,
    Year,
    Bit,
    Json,
    Enum,
    Set,
    VarChar,
    VarString,
    String,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    Geometry,
}

impl ServerType {
    /// Returns the server's name for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decimal | Self::NewDecimal => "DECIMAL",
            Self::Tiny => "TINYINT",
            Self::Short => "SMALLINT",
            Self::Int24 => "MEDIUMINT",
            Self::Long => "INT",
            Self::LongLong => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Null => "NULL",
            Self::Timestamp => "TIMESTAMP",
            Self::Date | Self::NewDate => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Year => "YEAR",
            Self::Bit => "BIT",
            Self::Json => "JSON",
            Self::Enum => "ENUM",
            Self::Set => "SET",
            Self::VarChar | Self::VarString => "VARCHAR",
            Self::String => "CHAR",
            Self::TinyBlob => "TINYBLOB",
            Self::MediumBlob => "MEDIUMBLOB",
            Self::LongBlob => "LONGBLOB",
            Self::Blob => "BLOB",
            Self::Geometry => "GEOMETRY",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column definition flags relevant to type translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFlags {
    /// UNSIGNED numeric column.
    pub unsigned: bool,
    /// Binary collation (byte strings rather than text).
    pub binary: bool,
}

/// Per-column metadata reported by the transport for a response handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name, absent if the server omitted it.
    pub name: Option<String>,

    /// Server-side type.
    pub server_type: ServerType,

    #[serde(default)]
    pub flags: ColumnFlags,

    /// Display length, if known.
    #[serde(default)]
    pub length: Option<u64>,

    /// Number of decimals for fixed-point columns, if known.
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl ColumnDescriptor {
    /// Creates a descriptor with the given name and type and no flags.
    pub fn new(name: impl Into<String>, server_type: ServerType) -> Self {
        Self {
            name: Some(name.into()),
            server_type,
            flags: ColumnFlags::default(),
            length: None,
            decimals: None,
        }
    }

    /// Creates a descriptor for a column the server did not name.
    pub fn unnamed(server_type: ServerType) -> Self {
        Self {
            name: None,
            ..Self::new("", server_type)
        }
    }

    pub fn unsigned(mut self) -> Self {
        self.flags.unsigned = true;
        self
    }

    pub fn binary(mut self) -> Self {
        self.flags.binary = true;
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }

    /// Returns the name if it is present and non-empty.
    pub fn field_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Returns the precision of a fixed-point column.
    ///
    /// The display length of a DECIMAL includes one character for the
    /// decimal point (when there is a fractional part) and one for the sign
    /// (when the column is signed).
    pub fn decimal_precision(&self) -> Option<u64> {
        let length = self.length?;
        let decimals = self.decimals.unwrap_or(0);
        let mut overhead = 0;
        if decimals > 0 {
            overhead += 1;
        }
        if !self.flags.unsigned {
            overhead += 1;
        }
        length.checked_sub(overhead)
    }
}

/// Host-side logical types that remote columns are translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,
    Float,
    Double,
    Decimal { width: u8, scale: u8 },
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::TinyInt => f.write_str("TINYINT"),
            Self::SmallInt => f.write_str("SMALLINT"),
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::UTinyInt => f.write_str("UTINYINT"),
            Self::USmallInt => f.write_str("USMALLINT"),
            Self::UInteger => f.write_str("UINTEGER"),
            Self::UBigInt => f.write_str("UBIGINT"),
            Self::Float => f.write_str("FLOAT"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Decimal { width, scale } => write!(f, "DECIMAL({width},{scale})"),
            Self::Varchar => f.write_str("VARCHAR"),
            Self::Blob => f.write_str("BLOB"),
            Self::Date => f.write_str("DATE"),
            Self::Time => f.write_str("TIME"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::TimestampTz => f.write_str("TIMESTAMP WITH TIME ZONE"),
        }
    }
}
