//! Query results for db-conduit.
//!
//! A submitted statement either produced a result set or only changed rows.
//! `QueryResult` records which of the two happened, and `TabularResult` owns
//! the transport's result set handle until it is dropped.

use crate::db::{LogicalType, ResponseHandle};
use crate::error::{ConduitError, Result};
use crate::query::TypeTranslator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a result set may be read lazily from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStreaming {
    /// Rows may be pulled from the server as they are consumed.
    AllowStreaming,
    /// All rows are fetched and buffered before the query returns.
    #[default]
    ForceMaterialization,
}

impl ResultStreaming {
    pub fn allows_streaming(&self) -> bool {
        matches!(self, Self::AllowStreaming)
    }
}

/// Name and translated type of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name, `None` if the server sent none.
    pub name: Option<String>,

    /// Host type the column translates to.
    pub logical_type: LogicalType,
}

/// Outcome of a query.
pub enum QueryResult {
    /// The statement produced no result set and changed this many rows.
    AffectedRows(u64),

    /// The statement produced a result set.
    Rows(TabularResult),
}

impl QueryResult {
    /// Rows changed, for statements without a result set.
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::AffectedRows(count) => Some(*count),
            Self::Rows(_) => None,
        }
    }

    pub fn is_tabular(&self) -> bool {
        matches!(self, Self::Rows(_))
    }

    pub fn as_tabular(&self) -> Option<&TabularResult> {
        match self {
            Self::Rows(result) => Some(result),
            Self::AffectedRows(_) => None,
        }
    }

    pub fn into_tabular(self) -> Option<TabularResult> {
        match self {
            Self::Rows(result) => Some(result),
            Self::AffectedRows(_) => None,
        }
    }

    /// Translated column descriptors; empty for affected-row results.
    pub fn fields(&self) -> &[FieldDescriptor] {
        match self {
            Self::Rows(result) => result.fields(),
            Self::AffectedRows(_) => &[],
        }
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AffectedRows(count) => f.debug_tuple("AffectedRows").field(count).finish(),
            Self::Rows(result) => f.debug_tuple("Rows").field(result).finish(),
        }
    }
}

/// A result set handed back by the transport.
///
/// Rows are read forward-only through the handle by a reader for the
/// specific transport. If the result is streaming, no other statement may be
/// issued on the same connection until the rows are drained or the result is
/// dropped.
pub struct TabularResult {
    handle: Box<dyn ResponseHandle>,
    field_count: usize,
    fields: Vec<FieldDescriptor>,
    streaming: bool,
}

impl TabularResult {
    /// Wraps a handle without resolving field descriptors.
    pub(crate) fn new(handle: Box<dyn ResponseHandle>, field_count: usize, streaming: bool) -> Self {
        Self {
            handle,
            field_count,
            fields: Vec::new(),
            streaming,
        }
    }

    /// Wraps a handle and resolves one field descriptor per column.
    ///
    /// On failure the handle is dropped, which returns it to the transport.
    pub(crate) fn with_fields(
        handle: Box<dyn ResponseHandle>,
        field_count: usize,
        streaming: bool,
        translator: &dyn TypeTranslator,
    ) -> Result<Self> {
        let fields = (0..field_count)
            .map(|index| {
                let column = handle.column_descriptor(index).ok_or_else(|| {
                    ConduitError::connection(format!(
                        "Failed to fetch column {index} of {field_count} from result set"
                    ))
                })?;
                Ok(FieldDescriptor {
                    name: column.field_name().map(str::to_string),
                    logical_type: translator.translate(&column)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            handle,
            field_count,
            fields,
            streaming,
        })
    }

    /// Column count reported by the server.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Field descriptors; empty unless a translator was supplied.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn handle(&self) -> &dyn ResponseHandle {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> &mut dyn ResponseHandle {
        self.handle.as_mut()
    }

    /// Gives up the wrapper, handing ownership of the raw handle to the caller.
    pub fn into_handle(self) -> Box<dyn ResponseHandle> {
        self.handle
    }
}

impl fmt::Debug for TabularResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularResult")
            .field("field_count", &self.field_count)
            .field("fields", &self.fields)
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}
