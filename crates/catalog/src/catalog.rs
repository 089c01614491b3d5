use crate::defs::{IndexDef, TableDef};
use crate::errors::{CatalogError, CatalogResult};
use chrono::Utc;
use record::{Schema, TypeTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// On-disk form of the whole catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogData {
    tables: HashMap<String, TableDef>,
    indexes: HashMap<String, IndexDef>,
    /// Next file id to hand out; ids are never reused.
    next_file_id: u32,
}

/// The schema registry, held in memory behind a reader-writer lock and
/// rewritten to `catalog.dat` on every DDL statement.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    data_dir: PathBuf,
    data: RwLock<CatalogData>,
}

impl Catalog {
    /// Loads the catalog from `<data_dir>/catalog.dat`, starting empty when
    /// the file does not exist yet.
    pub fn open(data_dir: impl AsRef<Path>) -> CatalogResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        let path = data_dir.join("catalog.dat");

        let data = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            CatalogData {
                next_file_id: 1,
                ..CatalogData::default()
            }
        };

        Ok(Self {
            path,
            data_dir,
            data: RwLock::new(data),
        })
    }

    /// Registers a table, assigns it a file id and `<name>.tbl` path, and
    /// persists the catalog.
    pub fn create_table(&self, name: &str, schema: Schema) -> CatalogResult<TableDef> {
        let mut data = self.data.write().expect("catalog poisoned");
        if data.tables.contains_key(name) {
            return Err(CatalogError::DuplicateTable(name.to_string()));
        }

        let file_id = data.next_file_id;
        data.next_file_id += 1;

        let def = TableDef {
            name: name.to_string(),
            schema,
            file_id,
            file_path: self.data_dir.join(format!("{name}.tbl")),
            created_at: Utc::now(),
        };
        data.tables.insert(name.to_string(), def.clone());
        self.persist(&data)?;
        tracing::info!(table = name, file_id, "created table");
        Ok(def)
    }

    /// Unregisters a table and every index on it, returning what was dropped
    /// so the engine can remove the files.
    pub fn drop_table(&self, name: &str) -> CatalogResult<(TableDef, Vec<IndexDef>)> {
        let mut data = self.data.write().expect("catalog poisoned");
        let table = data
            .tables
            .remove(name)
            .ok_or_else(|| CatalogError::UnknownTable(name.to_string()))?;

        let dropped: Vec<String> = data
            .indexes
            .values()
            .filter(|ix| ix.table_name == name)
            .map(|ix| ix.name.clone())
            .collect();
        let indexes = dropped
            .iter()
            .filter_map(|ix_name| data.indexes.remove(ix_name))
            .collect();

        self.persist(&data)?;
        tracing::info!(table = name, "dropped table");
        Ok((table, indexes))
    }

    /// Registers an index over one column of an existing table; the key type
    /// comes from the column.
    pub fn create_index(
        &self,
        name: &str,
        table_name: &str,
        column: &str,
        unique: bool,
    ) -> CatalogResult<IndexDef> {
        let mut data = self.data.write().expect("catalog poisoned");
        if data.indexes.contains_key(name) {
            return Err(CatalogError::DuplicateIndex(name.to_string()));
        }
        let table = data
            .tables
            .get(table_name)
            .ok_or_else(|| CatalogError::UnknownTable(table_name.to_string()))?;
        let column_index =
            table
                .schema
                .column_index(column)
                .ok_or_else(|| CatalogError::UnknownColumn {
                    table: table_name.to_string(),
                    column: column.to_string(),
                })?;
        let key_type: TypeTag = table.schema.columns[column_index].ty;

        let file_id = data.next_file_id;
        data.next_file_id += 1;

        let def = IndexDef {
            name: name.to_string(),
            table_name: table_name.to_string(),
            column_index,
            key_type,
            unique,
            file_id,
            file_path: self.data_dir.join(format!("{name}.idx")),
        };
        data.indexes.insert(name.to_string(), def.clone());
        self.persist(&data)?;
        tracing::info!(index = name, table = table_name, "created index");
        Ok(def)
    }

    /// Unregisters an index, returning its definition so the engine can
    /// remove the file.
    pub fn drop_index(&self, name: &str) -> CatalogResult<IndexDef> {
        let mut data = self.data.write().expect("catalog poisoned");
        let def = data
            .indexes
            .remove(name)
            .ok_or_else(|| CatalogError::UnknownIndex(name.to_string()))?;
        self.persist(&data)?;
        tracing::info!(index = name, "dropped index");
        Ok(def)
    }

    pub fn get_table(&self, name: &str) -> CatalogResult<TableDef> {
        let data = self.data.read().expect("catalog poisoned");
        data.tables
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownTable(name.to_string()))
    }

    pub fn get_index(&self, name: &str) -> CatalogResult<IndexDef> {
        let data = self.data.read().expect("catalog poisoned");
        data.indexes
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownIndex(name.to_string()))
    }

    pub fn list_tables(&self) -> Vec<TableDef> {
        let data = self.data.read().expect("catalog poisoned");
        let mut tables: Vec<TableDef> = data.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    pub fn list_indexes(&self) -> Vec<IndexDef> {
        let data = self.data.read().expect("catalog poisoned");
        let mut indexes: Vec<IndexDef> = data.indexes.values().cloned().collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        indexes
    }

    /// Every index defined over `table`.
    pub fn indexes_of(&self, table: &str) -> Vec<IndexDef> {
        let data = self.data.read().expect("catalog poisoned");
        let mut indexes: Vec<IndexDef> = data
            .indexes
            .values()
            .filter(|ix| ix.table_name == table)
            .cloned()
            .collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        indexes
    }

    /// Atomic rewrite: serialize to a temp file, fsync it, rename over the
    /// live catalog.
    fn persist(&self, data: &CatalogData) -> CatalogResult<()> {
        let tmp_path = self.path.with_extension("dat.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(serde_json::to_string_pretty(data)?.as_bytes())?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
