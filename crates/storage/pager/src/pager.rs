//! Single-file pager: positional page reads and writes with CRC32
//! verification, plus allocation of new pages at the end of the file.

use crate::errors::{PagerError, PagerResult};
use crate::{FORMAT_VERSION, HEADER_PAGE_CHECKSUM_OFFSET, MAGIC};
use page::PAGE_SIZE;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

/// Byte offset of the checksum field for a given page number. Data pages
/// keep it at offset 0 (the slotted header); the file header page keeps
/// magic and version there instead, pushing the checksum to offset 4.
fn checksum_offset(page_no: u32) -> usize {
    if page_no == 0 { HEADER_PAGE_CHECKSUM_OFFSET } else { 0 }
}

/// CRC32 of a page image with its checksum field treated as zero.
fn page_checksum(page_no: u32, data: &[u8; PAGE_SIZE]) -> u32 {
    let at = checksum_offset(page_no);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[..at]);
    hasher.update(&[0u8; 4]);
    hasher.update(&data[at + 4..]);
    hasher.finalize()
}

fn read_checksum_field(page_no: u32, data: &[u8; PAGE_SIZE]) -> u32 {
    let at = checksum_offset(page_no);
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn write_checksum_field(page_no: u32, data: &mut [u8; PAGE_SIZE], checksum: u32) {
    let at = checksum_offset(page_no);
    data[at..at + 4].copy_from_slice(&checksum.to_be_bytes());
}

/// Random-access page I/O against a single file.
///
/// The pager is the only component that touches checksum fields: `read`
/// verifies, `write` stamps. Writes are not individually fsynced; callers
/// batch durability through [`Pager::flush`].
#[derive(Debug)]
pub struct Pager {
    file: File,
    path: PathBuf,
    /// Number of pages currently in the file. Guarded so concurrent
    /// allocations hand out distinct page numbers.
    page_count: Mutex<u32>,
}

impl Pager {
    /// Opens the file at `path`, creating it with a fresh header page when it
    /// does not exist yet. Existing files have their magic, version and
    /// header checksum verified before any page is served.
    pub fn open(path: impl AsRef<Path>) -> PagerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        let pager = Self {
            file,
            path,
            page_count: Mutex::new((len / PAGE_SIZE as u64) as u32),
        };

        if len == 0 {
            pager.initialize_header_page()?;
        } else {
            pager.verify_header_page()?;
        }

        Ok(pager)
    }

    /// Reads the page into a caller-provided buffer, verifying its checksum.
    pub fn read_into(&self, page_no: u32, destination: &mut [u8; PAGE_SIZE]) -> PagerResult<()> {
        let page_count = *self.page_count.lock().expect("pager poisoned");
        if page_no >= page_count {
            return Err(PagerError::PageOutOfBounds {
                page_no,
                page_count,
            });
        }

        let offset = page_no as u64 * PAGE_SIZE as u64;
        Self::read_exact_at(&self.file, destination, offset)?;

        let stored = read_checksum_field(page_no, destination);
        let computed = page_checksum(page_no, destination);
        if stored != computed {
            return Err(PagerError::CorruptPage {
                page_no,
                stored,
                computed,
            });
        }

        Ok(())
    }

    /// Reads the page into a fresh buffer, verifying its checksum.
    pub fn read(&self, page_no: u32) -> PagerResult<Box<[u8; PAGE_SIZE]>> {
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        self.read_into(page_no, &mut buf)?;
        Ok(buf)
    }

    /// Stamps the checksum into `data` and writes the page. Does not fsync;
    /// callers batch durability through [`Pager::flush`].
    pub fn write(&self, page_no: u32, data: &mut [u8; PAGE_SIZE]) -> PagerResult<()> {
        let page_count = *self.page_count.lock().expect("pager poisoned");
        if page_no >= page_count {
            return Err(PagerError::PageOutOfBounds {
                page_no,
                page_count,
            });
        }

        let checksum = page_checksum(page_no, data);
        write_checksum_field(page_no, data, checksum);

        let offset = page_no as u64 * PAGE_SIZE as u64;
        Self::write_all_at(&self.file, data, offset)?;
        Ok(())
    }

    /// Appends a zero-initialized page and returns its page number.
    pub fn allocate(&self) -> PagerResult<u32> {
        let mut page_count = self.page_count.lock().expect("pager poisoned");
        let page_no = *page_count;

        let mut zeroed = [0u8; PAGE_SIZE];
        let checksum = page_checksum(page_no, &zeroed);
        write_checksum_field(page_no, &mut zeroed, checksum);

        let offset = page_no as u64 * PAGE_SIZE as u64;
        Self::write_all_at(&self.file, &zeroed, offset)?;

        *page_count = page_no + 1;
        tracing::trace!(path = %self.path.display(), page_no, "allocated page");
        Ok(page_no)
    }

    /// Fsyncs the underlying file.
    pub fn flush(&self) -> PagerResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of pages currently in the file, header page included.
    pub fn page_count(&self) -> u32 {
        *self.page_count.lock().expect("pager poisoned")
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_header_page(&self) -> PagerResult<()> {
        let mut header = [0u8; PAGE_SIZE];
        header[0..2].copy_from_slice(&MAGIC.to_be_bytes());
        header[2..4].copy_from_slice(&FORMAT_VERSION.to_be_bytes());

        let checksum = page_checksum(0, &header);
        write_checksum_field(0, &mut header, checksum);
        Self::write_all_at(&self.file, &header, 0)?;

        *self.page_count.lock().expect("pager poisoned") = 1;
        tracing::debug!(path = %self.path.display(), "initialized new paged file");
        Ok(())
    }

    fn verify_header_page(&self) -> PagerResult<()> {
        let mut header = [0u8; PAGE_SIZE];
        Self::read_exact_at(&self.file, &mut header, 0)?;

        let magic = u16::from_be_bytes([header[0], header[1]]);
        if magic != MAGIC {
            return Err(PagerError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }

        let version = u16::from_be_bytes([header[2], header[3]]);
        if version != FORMAT_VERSION {
            return Err(PagerError::VersionMismatch {
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let stored = read_checksum_field(0, &header);
        let computed = page_checksum(0, &header);
        if stored != computed {
            return Err(PagerError::CorruptPage {
                page_no: 0,
                stored,
                computed,
            });
        }

        Ok(())
    }

    #[inline]
    fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            file.read_exact_at(buf, offset)
        }

        #[cfg(windows)]
        {
            let mut read = 0;
            while read < buf.len() {
                let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
                if n == 0 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                read += n;
            }
            Ok(())
        }
    }

    #[inline]
    fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            file.write_all_at(buf, offset)
        }

        #[cfg(windows)]
        {
            let mut written = 0;
            while written < buf.len() {
                let n = file.seek_write(&buf[written..], offset + written as u64)?;
                if n == 0 {
                    return Err(std::io::ErrorKind::WriteZero.into());
                }
                written += n;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_header_page() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("t.tbl")).unwrap();
        assert_eq!(pager.page_count(), 1);

        let header = pager.read(0).unwrap();
        assert_eq!(u16::from_be_bytes([header[0], header[1]]), MAGIC);
        assert_eq!(u16::from_be_bytes([header[2], header[3]]), FORMAT_VERSION);
    }

    #[test]
    fn reopen_verifies_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        drop(Pager::open(&path).unwrap());
        assert!(Pager::open(&path).is_ok());
    }

    #[test]
    fn open_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        std::fs::write(&path, vec![0xABu8; PAGE_SIZE]).unwrap();
        assert!(matches!(
            Pager::open(&path),
            Err(PagerError::BadMagic { .. })
        ));
    }

    #[test]
    fn open_rejects_wrong_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        let mut bytes = vec![0u8; PAGE_SIZE];
        bytes[0..2].copy_from_slice(&MAGIC.to_be_bytes());
        bytes[2..4].copy_from_slice(&2u16.to_be_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            Pager::open(&path),
            Err(PagerError::VersionMismatch { found: 2, .. })
        ));
    }

    #[test]
    fn allocate_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("t.tbl")).unwrap();

        let page_no = pager.allocate().unwrap();
        assert_eq!(page_no, 1);

        let mut data = [7u8; PAGE_SIZE];
        pager.write(page_no, &mut data).unwrap();
        pager.flush().unwrap();

        let read_back = pager.read(page_no).unwrap();
        // Checksum was stamped into the first four bytes; the payload is intact.
        assert_eq!(&read_back[4..], &data[4..]);
    }

    #[test]
    fn read_detects_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        let pager = Pager::open(&path).unwrap();
        let page_no = pager.allocate().unwrap();
        let mut data = [9u8; PAGE_SIZE];
        pager.write(page_no, &mut data).unwrap();
        drop(pager);

        // Flip one payload byte on disk.
        let mut raw = std::fs::read(&path).unwrap();
        raw[PAGE_SIZE + 100] ^= 0xFF;
        std::fs::write(&path, raw).unwrap();

        let pager = Pager::open(&path).unwrap();
        assert!(matches!(
            pager.read(page_no),
            Err(PagerError::CorruptPage { page_no: 1, .. })
        ));
    }

    #[test]
    fn read_past_end_is_out_of_bounds() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("t.tbl")).unwrap();
        assert!(matches!(
            pager.read(5),
            Err(PagerError::PageOutOfBounds { page_no: 5, .. })
        ));
    }
}
