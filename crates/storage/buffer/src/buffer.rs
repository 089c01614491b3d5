//! Provides the implementation for the main buffer leveraged by the engine

use crate::errors::BufferError;
use crate::frame::{BufferFrame, FrameId};
use crate::guards::{PageReadGuard, PageWriteGuard};
use page::page_id::{FileId, PageId};
use pager::PageStore;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, RwLock, TryLockError};

/// The state of the page in the buffer
#[derive(Debug)]
enum PageState {
    /// Page is currently being loaded from disk
    Loading,
    /// Page has been loaded and available at the provided FrameId
    Ready(FrameId),
    /// The load failed; waiters bail out with an error
    Failed,
}

/// An entry in the `PageId`->`FrameId` map.
#[derive(Debug)]
struct PageEntry {
    /// State of the page (loaded or loading)
    state: Mutex<PageState>,
    /// Synchronization conditional variable
    cond_var: Condvar,
}

/// The buffer manager responsible for handling the cache pool of data pages.
///
/// Eviction only ever considers unpinned, clean frames (no-steal): a dirty
/// frame stays in memory until [`BufferManager::flush_dirty`] writes it back,
/// so bytes of uncommitted transactions never reach disk.
#[derive(Debug)]
pub struct BufferManager<P: PageStore> {
    store: Arc<P>,
    page_map: RwLock<HashMap<PageId, Arc<PageEntry>>>,
    frames: Vec<BufferFrame>,
    /// Logical clock driving the LRU ordering; bumped per guard acquisition.
    tick: std::sync::atomic::AtomicU64,
}

impl<P: PageStore> BufferManager<P> {
    /// Creates a new empty buffer manager.
    /// Allocates a predefined number of buffer frames.
    /// Sets up internal structures required for managing the pool.
    pub fn new(store: Arc<P>, pool_size: usize) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            frames.push(BufferFrame::default());
        }
        Self {
            store,
            frames,
            page_map: RwLock::new(HashMap::new()),
            tick: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Retrieves a page from the buffer pool based on its page ID.
    /// If the page cannot be found in the buffer, it is first loaded from disk, cached, then returned.
    ///
    /// # Params
    /// - `page_id`: The identifier of the page to be retrieved.
    ///
    /// # Returns
    /// A `Result` where the `Ok` contains a `PageReadGuard`. A `PageReadGuard` encapsulates the
    /// latch needed to access the underlying `&Page`; the frame stays pinned until it drops.
    pub fn read_page(&self, page_id: PageId) -> Result<PageReadGuard<'_>, BufferError> {
        loop {
            let frame_id = self.lookup_or_load(page_id)?;
            let frame = &self.frames[frame_id];

            frame.pin_count.fetch_add(1, Ordering::Acquire);
            let guard = frame.page.read().expect("page latch poisoned");

            // The frame may have been evicted and reused between lookup and
            // latch; the page's own id only changes under the write latch, so
            // it is the reliable witness.
            if guard.page_id() == page_id {
                self.touch(frame_id);
                return Ok(PageReadGuard { guard, frame });
            }

            drop(guard);
            frame.pin_count.fetch_sub(1, Ordering::Release);
        }
    }

    /// Write-latched variant of [`BufferManager::read_page`]. Marks the frame
    /// dirty, since the caller is going to mutate the page image.
    pub fn read_page_mut(&self, page_id: PageId) -> Result<PageWriteGuard<'_>, BufferError> {
        loop {
            let frame_id = self.lookup_or_load(page_id)?;
            let frame = &self.frames[frame_id];

            frame.pin_count.fetch_add(1, Ordering::Acquire);
            let guard = frame.page.write().expect("page latch poisoned");

            if guard.page_id() == page_id {
                frame.dirty.store(true, Ordering::Release);
                self.touch(frame_id);
                return Ok(PageWriteGuard { guard, frame });
            }

            drop(guard);
            frame.pin_count.fetch_sub(1, Ordering::Release);
        }
    }

    /// Claims a frame for a page that was just allocated on disk and is about
    /// to be initialized. The frame might contain either a zeroed page or a
    /// previous page that was evicted; the caller is responsible for
    /// initializing it. The page becomes visible to concurrent readers
    /// immediately, so initialize before publishing the page number.
    pub fn allocate_new_page(&self, page_id: PageId) -> Result<PageWriteGuard<'_>, BufferError> {
        let frame_id = self.claim_frame(page_id).ok_or(BufferError::BufferFull)?;
        let frame = &self.frames[frame_id];

        frame.pin_count.fetch_add(1, Ordering::Acquire);
        let mut guard = frame.page.write().expect("page latch poisoned");
        guard.set_page_id(page_id);
        frame.dirty.store(true, Ordering::Release);

        // Publish the mapping so subsequent lookups land on this frame.
        {
            let mut map = self.page_map.write().expect("page map poisoned");
            map.insert(
                page_id,
                Arc::new(PageEntry {
                    state: Mutex::new(PageState::Ready(frame_id)),
                    cond_var: Condvar::new(),
                }),
            );
        }

        // Release the claim pin; the guard's pin keeps the frame.
        frame.pin_count.fetch_sub(1, Ordering::Release);
        self.touch(frame_id);
        Ok(PageWriteGuard { guard, frame })
    }

    /// Writes every dirty frame back through the page store and clears the
    /// dirty flags. Called after a commit record is durable, and at
    /// checkpoints.
    pub fn flush_dirty(&self) -> Result<(), BufferError> {
        for frame_id in 0..self.frames.len() {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Flushes every dirty frame belonging to one file. DDL uses this to
    /// make freshly built structures durable without touching the pages of
    /// in-flight transactions on other files.
    pub fn flush_file(&self, file_id: FileId) -> Result<(), BufferError> {
        for frame_id in 0..self.frames.len() {
            let belongs = {
                let pid = self.frames[frame_id].page_id.read().expect("frame poisoned");
                matches!(*pid, Some(p) if p.file_id == file_id)
            };
            if belongs {
                self.flush_frame(frame_id)?;
            }
        }
        Ok(())
    }

    /// Flushes one page if it is resident and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferError> {
        let entry = {
            let map = self.page_map.read().expect("page map poisoned");
            map.get(&page_id).cloned()
        };
        if let Some(entry) = entry
            && let PageState::Ready(frame_id) = *entry.state.lock().expect("page entry poisoned")
        {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Drops every frame belonging to `file_id`, dirty or not. Used when the
    /// file itself is being removed; requires that no frame of the file is
    /// pinned.
    pub fn discard_file(&self, file_id: FileId) -> Result<(), BufferError> {
        let mut map = self.page_map.write().expect("page map poisoned");
        for frame in &self.frames {
            let mut pid_slot = match frame.page_id.try_write() {
                Ok(slot) => slot,
                Err(_) => return Err(BufferError::BufferFull),
            };
            if let Some(pid) = *pid_slot
                && pid.file_id == file_id
            {
                if frame.pin_count.load(Ordering::Acquire) != 0 {
                    return Err(BufferError::BufferFull);
                }
                map.remove(&pid);
                *pid_slot = None;
                frame.dirty.store(false, Ordering::Release);
            }
        }
        Ok(())
    }

    /// Number of frames currently holding a page.
    pub fn frames_in_use(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.page_id.read().expect("frame poisoned").is_some())
            .count()
    }

    /// Number of frames holding unflushed mutations.
    pub fn dirty_frames(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.dirty.load(Ordering::Acquire))
            .count()
    }

    /// Total number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Resolves a page id to a resident frame, loading from disk on a miss.
    fn lookup_or_load(&self, page_id: PageId) -> Result<FrameId, BufferError> {
        // Check if there is a frame that holds this page
        let possible_page_entry = {
            let map_guard = self.page_map.read().expect("page map poisoned");
            map_guard.get(&page_id).cloned()
        };

        // Happiest of flows - the page is already cached.
        if let Some(page_entry) = possible_page_entry {
            return Self::wait_until_ready(&page_entry, page_id);
        }

        // From this point, we only have logic for cache miss.

        // First we have to lock the map again, this time for write, and check if no one added the
        // entry in the meantime. This will only temporarily lock the entire map.
        let (entry, is_loader_thread) = {
            let mut map = self.page_map.write().expect("page map poisoned");

            if let Some(existing) = map.get(&page_id).cloned() {
                // Someone else is about to load it into memory right now.
                // We will declare ourselves as not_loaders, and only wait for the other thread.
                (existing, false)
            } else {
                // No one else inserted it. We will insert it ourselves, and mark it as Loading,
                // so others will know to wait in case they want this page.
                let new_entry = Arc::new(PageEntry {
                    state: Mutex::new(PageState::Loading),
                    cond_var: Condvar::new(),
                });
                map.insert(page_id, new_entry.clone());
                (new_entry, true)
            }
        };

        // Someone else is doing the work, just wait here until they are done
        if !is_loader_thread {
            return Self::wait_until_ready(&entry, page_id);
        }

        // We gotta do the load from disk work ourselves.
        let Some(frame_id) = self.claim_frame(page_id) else {
            self.abort_load(page_id, &entry);
            return Err(BufferError::BufferFull);
        };

        {
            let mut page = self.frames[frame_id].page.write().expect("page latch poisoned");

            // Ask the page store to load data from disk directly into the byte array of the page
            // instance from the buffer frame
            if let Err(err) = self.store.read_page(page_id, page.data_mut()) {
                drop(page);
                // rollback claim
                *self.frames[frame_id].page_id.write().expect("frame poisoned") = None;
                self.frames[frame_id].pin_count.store(0, Ordering::Release);
                self.abort_load(page_id, &entry);
                return Err(BufferError::IoReadFailed(page_id, err));
            }

            // Also update the page's internal `page_id` field.
            page.set_page_id(page_id);
        }

        // Frame is loaded with page contents. Flip the entry to Ready and
        // notify all waiters that the condition has changed.
        {
            let mut st = entry.state.lock().expect("page entry poisoned");
            *st = PageState::Ready(frame_id);
            entry.cond_var.notify_all();
        }

        // Release the claim pin; callers re-pin through the guard path.
        self.frames[frame_id].pin_count.fetch_sub(1, Ordering::Release);

        Ok(frame_id)
    }

    /// Removes a failed load from the map and wakes every waiter.
    fn abort_load(&self, page_id: PageId, entry: &Arc<PageEntry>) {
        {
            let mut map = self.page_map.write().expect("page map poisoned");
            map.remove(&page_id);
        }
        let mut st = entry.state.lock().expect("page entry poisoned");
        *st = PageState::Failed;
        entry.cond_var.notify_all();
    }

    /// Claims a frame for `for_page_id`, preferring empty frames and falling
    /// back to evicting the least-recently-used unpinned *clean* frame.
    /// The claimed frame has `pin_count == 1` so it cannot be re-claimed
    /// before the caller finishes with it.
    fn claim_frame(&self, for_page_id: PageId) -> Option<FrameId> {
        // Pass 1: empty frames, no eviction needed.
        for (frame_id, frame) in self.frames.iter().enumerate() {
            match frame.page_id.try_write() {
                Ok(mut page_id) => {
                    if page_id.is_none() {
                        *page_id = Some(for_page_id);
                        frame.pin_count.store(1, Ordering::Release);
                        frame.dirty.store(false, Ordering::Release);
                        return Some(frame_id);
                    }
                }
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => continue,
            }
        }

        // Pass 2: evict the least-recently-used unpinned clean frame. The
        // page map is locked for the whole pass so lookups cannot race the
        // un-mapping.
        let mut map = self.page_map.write().expect("page map poisoned");

        let mut candidates: Vec<(u64, FrameId)> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                f.pin_count.load(Ordering::Acquire) == 0 && !f.dirty.load(Ordering::Acquire)
            })
            .map(|(id, f)| (f.last_used.load(Ordering::Acquire), id))
            .collect();
        candidates.sort_unstable();

        for (_, frame_id) in candidates {
            let frame = &self.frames[frame_id];
            let Ok(mut pid_slot) = frame.page_id.try_write() else {
                continue;
            };
            // Re-check under the frame lock; a guard may have raced us.
            if frame.pin_count.load(Ordering::Acquire) != 0 || frame.dirty.load(Ordering::Acquire)
            {
                continue;
            }
            let Some(old_pid) = *pid_slot else { continue };

            map.remove(&old_pid);
            *pid_slot = Some(for_page_id);
            frame.pin_count.store(1, Ordering::Release);
            frame.dirty.store(false, Ordering::Release);
            tracing::trace!(%old_pid, new = %for_page_id, frame_id, "evicted clean frame");
            return Some(frame_id);
        }

        None
    }

    /// Writes one frame back if dirty. The dirty flag is cleared before the
    /// copy so a concurrent writer re-dirties the frame for the next flush.
    fn flush_frame(&self, frame_id: FrameId) -> Result<(), BufferError> {
        let frame = &self.frames[frame_id];
        if !frame.dirty.load(Ordering::Acquire) {
            return Ok(());
        }

        let (page_id, mut image) = {
            let guard = frame.page.read().expect("page latch poisoned");
            let Some(page_id) = *frame.page_id.read().expect("frame poisoned") else {
                frame.dirty.store(false, Ordering::Release);
                return Ok(());
            };
            frame.dirty.store(false, Ordering::Release);
            (page_id, Box::new(*guard.data()))
        };

        if let Err(err) = self.store.write_page(page_id, &mut image) {
            frame.dirty.store(true, Ordering::Release);
            return Err(BufferError::IoWriteFailed(page_id, err));
        }
        Ok(())
    }

    /// Stamps the LRU clock for a frame.
    fn touch(&self, frame_id: FrameId) {
        let now = self.tick.fetch_add(1, Ordering::Relaxed);
        self.frames[frame_id].last_used.store(now, Ordering::Relaxed);
    }

    /// Waits for the `Mutex` on a `PageEntry` to be free to access and the page is loaded into
    /// memory (`PageState = Ready(FrameId)`)
    fn wait_until_ready(entry: &Arc<PageEntry>, page_id: PageId) -> Result<FrameId, BufferError> {
        let mut state = entry.state.lock().expect("page entry poisoned");
        loop {
            match *state {
                PageState::Ready(fid) => return Ok(fid),
                PageState::Failed => {
                    return Err(BufferError::IoReadFailed(
                        page_id,
                        pager::PagerError::Io(std::io::ErrorKind::Other.into()),
                    ));
                }
                PageState::Loading => {
                    state = entry.cond_var.wait(state).expect("page entry poisoned");
                }
            }
        }
    }
}
