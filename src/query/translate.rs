//! Translation of remote column types into host logical types.

use crate::config::TypeOptions;
use crate::db::{ColumnDescriptor, LogicalType, ServerType};
use crate::error::Result;

/// Widest DECIMAL the host can represent exactly.
pub const MAX_DECIMAL_WIDTH: u64 = 38;

/// Maps a server-native column type to a host logical type.
///
/// Supplied to `Connection::query_with_types`; invoked once per column when a
/// result set is produced.
pub trait TypeTranslator {
    fn translate(&self, column: &ColumnDescriptor) -> Result<LogicalType>;
}

impl<F> TypeTranslator for F
where
    F: Fn(&ColumnDescriptor) -> Result<LogicalType>,
{
    fn translate(&self, column: &ColumnDescriptor) -> Result<LogicalType> {
        self(column)
    }
}

/// Default translator for MySQL column definitions.
#[derive(Debug, Clone, Default)]
pub struct MySqlTypeTranslator {
    options: TypeOptions,
}

impl MySqlTypeTranslator {
    pub fn new(options: TypeOptions) -> Self {
        Self { options }
    }
}

impl TypeTranslator for MySqlTypeTranslator {
    fn translate(&self, column: &ColumnDescriptor) -> Result<LogicalType> {
        let unsigned = column.flags.unsigned;

        let ty = match column.server_type {
            ServerType::Tiny => {
                if self.options.tinyint1_as_boolean && column.length == Some(1) {
                    LogicalType::Boolean
                } else if unsigned {
                    LogicalType::UTinyInt
                } else {
                    LogicalType::TinyInt
                }
            }
            ServerType::Short if unsigned => LogicalType::USmallInt,
            ServerType::Short => LogicalType::SmallInt,
            ServerType::Int24 | ServerType::Long if unsigned => LogicalType::UInteger,
            ServerType::Int24 | ServerType::Long => LogicalType::Integer,
            ServerType::LongLong if unsigned => LogicalType::UBigInt,
            ServerType::LongLong => LogicalType::BigInt,
            ServerType::Year => LogicalType::Integer,
            ServerType::Float => LogicalType::Float,
            ServerType::Double => LogicalType::Double,
            ServerType::Decimal | ServerType::NewDecimal => decimal_type(column),
            ServerType::Null => LogicalType::Null,
            ServerType::Date | ServerType::NewDate => LogicalType::Date,
            ServerType::Time => LogicalType::Time,
            ServerType::DateTime => LogicalType::Timestamp,
            ServerType::Timestamp => LogicalType::TimestampTz,
            ServerType::Bit => {
                if self.options.bit1_as_boolean && column.length == Some(1) {
                    LogicalType::Boolean
                } else {
                    LogicalType::Blob
                }
            }
            ServerType::Json => LogicalType::Varchar,
            ServerType::Geometry => LogicalType::Blob,
            ServerType::Enum
            | ServerType::Set
            | ServerType::VarChar
            | ServerType::VarString
            | ServerType::String
            | ServerType::TinyBlob
            | ServerType::MediumBlob
            | ServerType::LongBlob
            | ServerType::Blob => {
                if column.flags.binary {
                    LogicalType::Blob
                } else {
                    LogicalType::Varchar
                }
            }
        };

        Ok(ty)
    }
}

fn decimal_type(column: &ColumnDescriptor) -> LogicalType {
    let scale = u64::from(column.decimals.unwrap_or(0));
    match column.decimal_precision() {
        Some(width) if width <= MAX_DECIMAL_WIDTH && scale <= width => LogicalType::Decimal {
            width: width as u8,
            scale: scale as u8,
        },
        _ => LogicalType::Double,
    }
}
