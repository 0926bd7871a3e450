//! Catalog metadata types for db-conduit.

use serde::{Deserialize, Serialize};

/// Describes one index on a remote table.
///
/// Index introspection is not performed yet; `Connection::get_index_info`
/// always returns an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,

    /// Table the index belongs to.
    pub table: String,

    /// Column names included in the index, in key order.
    pub columns: Vec<String>,

    /// Whether this is a unique index.
    pub is_unique: bool,

    /// Whether this index backs the primary key.
    pub is_primary: bool,
}
