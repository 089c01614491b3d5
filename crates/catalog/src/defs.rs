use chrono::{DateTime, Utc};
use record::{Schema, TypeTag};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One table: its schema, backing heap file, and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub schema: Schema,
    /// Id the file set resolves to the heap file.
    pub file_id: u32,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// One secondary index over a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub table_name: String,
    /// Position of the indexed column within the table schema.
    pub column_index: usize,
    pub key_type: TypeTag,
    pub unique: bool,
    /// Id the file set resolves to the index file.
    pub file_id: u32,
    pub file_path: PathBuf,
}
