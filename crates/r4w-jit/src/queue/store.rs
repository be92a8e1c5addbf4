//! Fixed-capacity backing store for queued frames.
//!
//! Entries live in a `Vec` allocated once at construction and never grown.
//! Removal moves the last entry into the freed slot, so indices are only
//! stable until the next mutation. Nothing here relies on the entries being
//! sorted.

use crate::collision::Window;
use crate::timing::CountUs;
use crate::types::{FrameClass, JitError, JitResult};

/// A frame held by the queue, with its reserved window.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<P> {
    pub count_us: CountUs,
    pub class: FrameClass,
    /// Reserved time before `count_us`
    pub pre_delay: u32,
    /// Reserved time after `count_us` (time on air for downlinks)
    pub post_delay: u32,
    pub payload: P,
}

impl<P> Entry<P> {
    #[inline]
    pub fn window(&self) -> Window {
        Window::new(self.count_us, self.pre_delay, self.post_delay)
    }
}

#[derive(Debug)]
pub struct EntryStore<P> {
    entries: Vec<Entry<P>>,
    capacity: usize,
    beacon_count: usize,
}

impl<P> EntryStore<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            beacon_count: 0,
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.beacon_count = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn beacon_count(&self) -> usize {
        self.beacon_count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[Entry<P>] {
        &self.entries
    }

    /// Append an entry at the end of the occupied range.
    pub fn push(&mut self, entry: Entry<P>) -> JitResult<()> {
        if self.is_full() {
            return Err(JitError::Full);
        }
        if entry.class.is_beacon() {
            self.beacon_count += 1;
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove the entry at `index`, moving the last entry into its slot.
    pub fn swap_remove(&mut self, index: usize) -> JitResult<Entry<P>> {
        if index >= self.entries.len() {
            return Err(JitError::Invalid);
        }
        if self.entries[index].class.is_beacon() {
            self.beacon_count = self
                .beacon_count
                .checked_sub(1)
                .ok_or(JitError::Internal)?;
        }
        Ok(self.entries.swap_remove(index))
    }
}
