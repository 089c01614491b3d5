use crate::frame::BufferFrame;
use page::Page;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

/// Provides read access to a `Page` instance stored in one of the buffer's frames.
/// Shared latch, allowing concurrent reads.
/// Free as soon as possible. Dropping the guard releases the frame pin.
#[derive(Debug)]
pub struct PageReadGuard<'a> {
    /// The underlying `RwLockReadGuard` which will be dereferenced to `&Page`
    pub(crate) guard: RwLockReadGuard<'a, Page>,
    pub(crate) frame: &'a BufferFrame,
}

impl<'a> Deref for PageReadGuard<'a> {
    type Target = Page;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.frame.pin_count.fetch_sub(1, Ordering::Release);
    }
}

/// Provides exclusive access to a `Page` instance stored in one of the buffer's frames.
/// The frame is marked dirty at acquisition time; dropping the guard releases the pin.
#[derive(Debug)]
pub struct PageWriteGuard<'a> {
    /// The underlying `RwLockWriteGuard` which will be dereferenced to `&mut Page`
    pub(crate) guard: RwLockWriteGuard<'a, Page>,
    pub(crate) frame: &'a BufferFrame,
}

impl<'a> Deref for PageWriteGuard<'a> {
    type Target = Page;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.frame.pin_count.fetch_sub(1, Ordering::Release);
    }
}
