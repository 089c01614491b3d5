use crate::errors::RecordError;
use crate::types::TypeTag;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Maximum columns per schema, bounded by the u16 null bitmap.
pub const MAX_COLUMNS: usize = 16;

/// One column of a table: name, type, nullability. Column identity is by
/// position; renames are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeTag,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: TypeTag, nullable: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable,
        }
    }
}

/// Ordered column list describing the layout of every tuple in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    /// Builds a schema, rejecting column counts past the bitmap width.
    pub fn new(columns: Vec<Column>) -> Result<Self, RecordError> {
        if columns.len() > MAX_COLUMNS {
            return Err(RecordError::TooManyColumns(columns.len()));
        }
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Validates a row against this schema: arity, per-column type, and
    /// NOT NULL constraints.
    pub fn check_row(&self, values: &[Value]) -> Result<(), RecordError> {
        if values.len() != self.columns.len() {
            return Err(RecordError::ArityMismatch {
                values: values.len(),
                columns: self.columns.len(),
            });
        }
        for (idx, (value, column)) in values.iter().zip(&self.columns).enumerate() {
            if value.is_null() {
                if !column.nullable {
                    return Err(RecordError::NotNullViolation { column: idx });
                }
                continue;
            }
            if !value.matches_type(column.ty) {
                return Err(RecordError::TypeMismatch {
                    column: idx,
                    expected: column.ty,
                    found: value.type_name(),
                });
            }
        }
        Ok(())
    }
}
