use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};

/// Single slot mailbox. Every publish overwrites the stored value, readers peek without consuming.
///
/// The lock is only held while copying the value in or out, so neither side can block the other
/// for longer than one copy of `T`. Use `CriticalSectionRawMutex` when producer and consumer run on
/// different cores.
pub struct Mailbox<M: RawMutex, T: Copy> {
    slot: Mutex<M, Cell<Option<T>>>,
}

impl<M: RawMutex, T: Copy> Mailbox<M, T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Store a new value. An unread older value is lost.
    pub fn publish(&self, value: T) {
        self.slot.lock(|slot| slot.set(Some(value)));
    }

    /// Copy of the latest value or `None` if nothing was published yet.
    pub fn peek(&self) -> Option<T> {
        self.slot.lock(Cell::get)
    }

    /// Returns `true` once the first value was published.
    pub fn is_published(&self) -> bool {
        self.peek().is_some()
    }

    /// Empty the slot so the next peek returns `None` until a new publish.
    pub fn clear(&self) {
        self.slot.lock(|slot| slot.set(None));
    }
}

impl<M: RawMutex, T: Copy> Default for Mailbox<M, T> {
    fn default() -> Self {
        Self::new()
    }
}
