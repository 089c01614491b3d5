//! A registry mapping `FileId`s to open pagers.

use crate::errors::{PagerError, PagerResult};
use crate::pager::Pager;
use page::PAGE_SIZE;
use page::page_id::{FileId, PageId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Backing store abstraction the buffer pool loads pages from and flushes
/// pages to. Implemented by [`FileSet`]; tests may substitute their own.
pub trait PageStore {
    /// Read the page identified by `page_id` into `destination`, verifying
    /// its checksum.
    fn read_page(&self, page_id: PageId, destination: &mut [u8; PAGE_SIZE]) -> PagerResult<()>;

    /// Stamp the checksum into `data` and write it as the page for `page_id`.
    fn write_page(&self, page_id: PageId, data: &mut [u8; PAGE_SIZE]) -> PagerResult<()>;
}

/// Holds every open paged file, addressed by `FileId`.
///
/// Files are registered by the catalog (which owns the id ↔ path mapping on
/// disk) and opened lazily on first access. A double-checked read/write lock
/// sequence keeps the common path uncontended.
#[derive(Debug, Default)]
pub struct FileSet {
    mappings: RwLock<HashMap<FileId, PathBuf>>,
    open: RwLock<HashMap<FileId, Arc<Pager>>>,
}

impl FileSet {
    /// Creates a new empty `FileSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new mapping for the provided file id. The file itself is
    /// created on first access.
    pub fn add_file(&self, file_id: FileId, path: PathBuf) {
        let mut mappings = self.mappings.write().expect("FileSet poisoned");
        mappings.insert(file_id, path);
    }

    /// Unregisters a file, closes it, and removes it from disk. Used by
    /// DROP TABLE / DROP INDEX.
    pub fn remove_file(&self, file_id: FileId) -> PagerResult<()> {
        let path = {
            let mut mappings = self.mappings.write().expect("FileSet poisoned");
            mappings.remove(&file_id)
        };
        {
            let mut open = self.open.write().expect("FileSet poisoned");
            open.remove(&file_id);
        }
        if let Some(path) = path
            && path.exists()
        {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Resolves a file id to its open pager, opening the file on first use.
    pub fn pager(&self, file_id: FileId) -> PagerResult<Arc<Pager>> {
        // 1. Fast path — read lock
        {
            let open = self.open.read().expect("FileSet poisoned");
            if let Some(pager) = open.get(&file_id) {
                return Ok(Arc::clone(pager));
            }
        }

        // 2. Slow path — write lock
        let mut open = self.open.write().expect("FileSet poisoned");

        // 3. Double-check
        if let Some(pager) = open.get(&file_id) {
            return Ok(Arc::clone(pager));
        }

        // 4. Actually open the file
        let path = {
            let mappings = self.mappings.read().expect("FileSet poisoned");
            mappings
                .get(&file_id)
                .cloned()
                .ok_or(PagerError::UnknownFile { file_id })?
        };

        let pager = Arc::new(Pager::open(path)?);
        open.insert(file_id, Arc::clone(&pager));
        Ok(pager)
    }

    /// Appends a zeroed page to the given file and returns its page number.
    pub fn allocate(&self, file_id: FileId) -> PagerResult<u32> {
        self.pager(file_id)?.allocate()
    }

    /// Fsyncs one file.
    pub fn flush(&self, file_id: FileId) -> PagerResult<()> {
        self.pager(file_id)?.flush()
    }

    /// Fsyncs every open file.
    pub fn flush_all(&self) -> PagerResult<()> {
        let pagers: Vec<Arc<Pager>> = {
            let open = self.open.read().expect("FileSet poisoned");
            open.values().cloned().collect()
        };
        for pager in pagers {
            pager.flush()?;
        }
        Ok(())
    }
}

impl PageStore for FileSet {
    fn read_page(&self, page_id: PageId, destination: &mut [u8; PAGE_SIZE]) -> PagerResult<()> {
        self.pager(page_id.file_id)?
            .read_into(page_id.page_no, destination)
    }

    fn write_page(&self, page_id: PageId, data: &mut [u8; PAGE_SIZE]) -> PagerResult<()> {
        self.pager(page_id.file_id)?.write(page_id.page_no, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unknown_file_id_is_an_error() {
        let files = FileSet::new();
        assert!(matches!(
            files.pager(9),
            Err(PagerError::UnknownFile { file_id: 9 })
        ));
    }

    #[test]
    fn pages_round_trip_across_files() {
        let dir = tempdir().unwrap();
        let files = FileSet::new();
        files.add_file(1, dir.path().join("a.tbl"));
        files.add_file(2, dir.path().join("b.tbl"));

        let a1 = files.allocate(1).unwrap();
        let b1 = files.allocate(2).unwrap();

        let mut page_a = [0xAAu8; PAGE_SIZE];
        let mut page_b = [0xBBu8; PAGE_SIZE];
        files.write_page(PageId::new(1, a1), &mut page_a).unwrap();
        files.write_page(PageId::new(2, b1), &mut page_b).unwrap();

        let mut read_back = [0u8; PAGE_SIZE];
        files.read_page(PageId::new(1, a1), &mut read_back).unwrap();
        assert_eq!(&read_back[4..], &page_a[4..]);
        files.read_page(PageId::new(2, b1), &mut read_back).unwrap();
        assert_eq!(&read_back[4..], &page_b[4..]);
    }

    #[test]
    fn remove_file_deletes_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.tbl");
        let files = FileSet::new();
        files.add_file(1, path.clone());
        files.allocate(1).unwrap();
        assert!(path.exists());

        files.remove_file(1).unwrap();
        assert!(!path.exists());
        assert!(matches!(
            files.pager(1),
            Err(PagerError::UnknownFile { file_id: 1 })
        ));
    }
}
