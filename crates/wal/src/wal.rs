//! The log writer and reader.

use crate::errors::WalResult;
use crate::record::{DataPayload, Lsn, TxnId, WalOp, WalRecord};
use crate::sync_policy::SyncPolicy;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

struct WalInner {
    writer: BufWriter<File>,
    next_lsn: Lsn,
}

/// Append-only mutation journal.
///
/// A single internal mutex serializes appends; append order defines LSN
/// order. Reads (`iter_from`) open their own file handle and never touch the
/// writer.
pub struct Wal {
    path: PathBuf,
    policy: SyncPolicy,
    inner: Mutex<WalInner>,
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Wal {
    /// Opens (or creates) the log at `path`. The existing record stream is
    /// scanned to find the highest LSN so new appends continue the sequence;
    /// a torn tail simply ends the scan.
    pub fn open(path: impl AsRef<Path>, policy: SyncPolicy) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut max_lsn = 0;
        if path.exists() {
            for record in WalIterator::open(&path, 0)? {
                max_lsn = record.lsn;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            policy,
            inner: Mutex::new(WalInner {
                writer: BufWriter::new(file),
                next_lsn: max_lsn + 1,
            }),
        })
    }

    /// Appends a data record (INSERT/UPDATE/DELETE) and returns its LSN.
    /// Buffered unless the sync policy is `always`.
    pub fn append(&self, txn_id: TxnId, op: WalOp, payload: DataPayload) -> WalResult<Lsn> {
        debug_assert!(op.is_data());
        self.append_record(txn_id, op, Some(payload))
    }

    /// Appends a COMMIT record and makes it durable. Only after this returns
    /// may the caller acknowledge the commit.
    pub fn commit(&self, txn_id: TxnId) -> WalResult<Lsn> {
        let lsn = self.append_record(txn_id, WalOp::Commit, None)?;
        self.flush()?;
        Ok(lsn)
    }

    /// Appends a ROLLBACK marker. Durability is not required: an unmarked
    /// transaction is indistinguishable from an aborted one at recovery.
    pub fn rollback(&self, txn_id: TxnId) -> WalResult<Lsn> {
        self.append_record(txn_id, WalOp::Rollback, None)
    }

    /// Appends a CHECKPOINT record and makes it durable.
    pub fn checkpoint(&self) -> WalResult<Lsn> {
        let lsn = self.append_record(0, WalOp::Checkpoint, None)?;
        self.flush()?;
        Ok(lsn)
    }

    /// Flushes buffered records and fsyncs (unless the policy is `off`).
    pub fn flush(&self) -> WalResult<()> {
        let mut inner = self.inner.lock().expect("wal poisoned");
        inner.writer.flush()?;
        if self.policy != SyncPolicy::Off {
            inner.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Lazy sequence of records with `lsn >= from`, in log order. Stops at
    /// the first torn or corrupt record.
    pub fn iter_from(&self, from: Lsn) -> WalResult<WalIterator> {
        // Make buffered records visible to the reader.
        {
            let mut inner = self.inner.lock().expect("wal poisoned");
            inner.writer.flush()?;
        }
        WalIterator::open(&self.path, from)
    }

    /// Drops all records with `lsn < keep_from`, typically after a
    /// checkpoint. Rewrites the log through a temp file and atomic rename.
    pub fn truncate_to(&self, keep_from: Lsn) -> WalResult<()> {
        let mut inner = self.inner.lock().expect("wal poisoned");
        inner.writer.flush()?;

        let tmp_path = self.path.with_extension("log.tmp");
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            for record in WalIterator::open(&self.path, keep_from)? {
                tmp.write_all(&record.encode())?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        // Reopen the writer against the new file.
        let file = OpenOptions::new().append(true).open(&self.path)?;
        inner.writer = BufWriter::new(file);
        tracing::debug!(keep_from, "truncated wal");
        Ok(())
    }

    /// The LSN the next append will receive.
    pub fn next_lsn(&self) -> Lsn {
        self.inner.lock().expect("wal poisoned").next_lsn
    }

    fn append_record(
        &self,
        txn_id: TxnId,
        op: WalOp,
        payload: Option<DataPayload>,
    ) -> WalResult<Lsn> {
        let mut inner = self.inner.lock().expect("wal poisoned");
        let lsn = inner.next_lsn;
        let record = WalRecord {
            lsn,
            txn_id,
            op,
            payload,
        };
        inner.writer.write_all(&record.encode())?;
        inner.next_lsn = lsn + 1;

        if self.policy == SyncPolicy::Always {
            inner.writer.flush()?;
            inner.writer.get_ref().sync_all()?;
        }
        Ok(lsn)
    }
}

/// Forward scan over the log. Malformed or incomplete records end the
/// iteration silently: they are the torn tail of a crashed run.
pub struct WalIterator {
    reader: BufReader<File>,
    offset: u64,
    from: Lsn,
    done: bool,
}

impl std::fmt::Debug for WalIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalIterator")
            .field("offset", &self.offset)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl WalIterator {
    fn open(path: &Path, from: Lsn) -> WalResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            offset: 0,
            from,
            done: false,
        })
    }

    fn read_one(&mut self) -> Option<WalRecord> {
        let mut len_buf = [0u8; 4];
        if self.reader.read_exact(&mut len_buf).is_err() {
            return None;
        }
        let body_len = u32::from_be_bytes(len_buf) as usize;
        // An absurd length means we are reading garbage.
        if body_len < 13 || body_len > 1 << 24 {
            return None;
        }

        let mut body = vec![0u8; body_len];
        if self.reader.read_exact(&mut body).is_err() {
            return None;
        }
        let mut crc_buf = [0u8; 4];
        if self.reader.read_exact(&mut crc_buf).is_err() {
            return None;
        }
        if u32::from_be_bytes(crc_buf) != crc32fast::hash(&body) {
            return None;
        }

        let record = WalRecord::decode_body(&body, self.offset).ok()?;
        self.offset += 4 + body_len as u64 + 4;
        Some(record)
    }
}

impl Iterator for WalIterator {
    type Item = WalRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.read_one() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(record) if record.lsn < self.from => continue,
                Some(record) => return Some(record),
            }
        }
    }
}
