use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("table '{0}' already exists")]
    DuplicateTable(String),
    #[error("unknown index '{0}'")]
    UnknownIndex(String),
    #[error("index '{0}' already exists")]
    DuplicateIndex(String),
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("malformed catalog file")]
    Json(#[from] serde_json::Error),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
