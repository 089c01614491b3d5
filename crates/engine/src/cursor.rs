//! Pull-based row cursor handed to executor operators.

use crate::errors::{EngineError, EngineResult};
use heap::HeapScan;
use page::rid::Rid;
use record::{Schema, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lazy sequence of decoded rows from a table scan.
///
/// Cancellation is cooperative: the flag is checked on every `next` call, so
/// a session can abandon a long scan between rows. Restart by asking the
/// engine for a fresh cursor.
#[derive(Debug)]
pub struct ScanCursor {
    scan: HeapScan,
    schema: Schema,
    cancel: Arc<AtomicBool>,
    closed: bool,
}

impl ScanCursor {
    pub(crate) fn new(scan: HeapScan, schema: Schema, cancel: Arc<AtomicBool>) -> Self {
        Self {
            scan,
            schema,
            cancel,
            closed: false,
        }
    }

    /// Stops the cursor; subsequent `next` calls return `None`.
    pub fn close(&mut self) {
        self.closed = true;
        self.scan.close();
    }
}

impl Iterator for ScanCursor {
    type Item = EngineResult<(Rid, Vec<Value>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        if self.cancel.load(Ordering::Acquire) {
            self.close();
            return Some(Err(EngineError::Cancelled));
        }

        match self.scan.next()? {
            Ok((rid, bytes)) => match record::decode(&self.schema, &bytes) {
                Ok(values) => Some(Ok((rid, values))),
                Err(err) => {
                    self.close();
                    Some(Err(err.into()))
                }
            },
            Err(err) => {
                self.close();
                Some(Err(err.into()))
            }
        }
    }
}
