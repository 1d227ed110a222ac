//! Thread-local magazine cache.
//!
//! Each (thread, slab) pair gets a bounded LIFO chain of freed slots so
//! that most acquire/release pairs are a non-atomic pointer swing
//! (spec.md §4.4). Grounded on
//! `src/memory/allocator/slab_allocator.rs`'s `thread_local! { static
//! THREAD_CACHE: RefCell<Option<ThreadLocalCache>> }` pattern, generalized
//! from "one cache per thread" to "one cache per (thread, slab)" keyed by
//! the slab's address, since this crate supports more than one `Allocator`
//! instance (the teacher's is a single process-wide table).

use crate::slab::Slab;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr::NonNull;

struct Entry {
    head: *mut u8,
    len: usize,
    /// Raw pointer back to the owning slab, used only by the thread-exit
    /// flush. Safe to dereference as long as the `Allocator` that owns
    /// this `Slab` outlives every thread that allocated from it — true
    /// for the process-wide singleton (`'static`), and the caller's
    /// responsibility for an explicitly constructed `Allocator`.
    slab: *const Slab,
}

struct ThreadMagazines {
    entries: RefCell<HashMap<usize, Entry>>,
}

impl ThreadMagazines {
    fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl Drop for ThreadMagazines {
    fn drop(&mut self) {
        for (_, entry) in self.entries.borrow_mut().drain() {
            flush_entry(entry);
        }
    }
}

thread_local! {
    static MAGAZINES: ThreadMagazines = ThreadMagazines::new();
}

fn key_for(slab: &Slab) -> usize {
    slab as *const Slab as usize
}

/// Reads the `next` link embedded in a free slot.
///
/// # Safety
/// `slot` must currently be on a free structure, not in use by a caller.
unsafe fn read_next(slot: *mut u8) -> *mut u8 {
    *(slot as *mut *mut u8)
}

unsafe fn write_next(slot: *mut u8, next: *mut u8) {
    *(slot as *mut *mut u8) = next;
}

fn flush_entry(entry: Entry) {
    let Some(head) = NonNull::new(entry.head) else {
        return;
    };
    // Walk to the tail; O(chain length), amortized across MAGAZINE_CAP
    // releases (spec.md §4.3).
    let mut tail = head;
    loop {
        let next = unsafe { read_next(tail.as_ptr()) };
        match NonNull::new(next) {
            Some(n) => tail = n,
            None => break,
        }
    }
    // Safety: `entry.slab` outlives this call per the `Entry` doc comment.
    let slab = unsafe { &*entry.slab };
    slab.flush_chain(head, tail, entry.len);
}

/// Thread-magazine hit path: detach the head, no atomics. Returns `None`
/// on a miss (caller falls back to `Slab::allocate_slow`).
pub(crate) fn acquire(slab: &Slab) -> Option<NonNull<u8>> {
    MAGAZINES.with(|m| {
        let mut entries = m.entries.borrow_mut();
        let entry = entries.get_mut(&key_for(slab))?;
        let head = NonNull::new(entry.head)?;
        entry.head = unsafe { read_next(head.as_ptr()) };
        entry.len -= 1;
        Some(head)
    })
}

/// Pushes `slot` onto this thread's magazine for `slab`, flushing the
/// whole chain to the slab's global free stack if the magazine overflows
/// `MAGAZINE_CAP` (spec.md §4.2/§4.4).
pub(crate) fn release(slab: &Slab, slot: NonNull<u8>) {
    MAGAZINES.with(|m| {
        let mut entries = m.entries.borrow_mut();
        let entry = entries.entry(key_for(slab)).or_insert_with(|| Entry {
            head: std::ptr::null_mut(),
            len: 0,
            slab: slab as *const Slab,
        });

        unsafe { write_next(slot.as_ptr(), entry.head) };
        entry.head = slot.as_ptr();
        entry.len += 1;

        if entry.len > slab.magazine_cap() {
            let flushed = Entry {
                head: entry.head,
                len: entry.len,
                slab: entry.slab,
            };
            entry.head = std::ptr::null_mut();
            entry.len = 0;
            flush_entry(flushed);
        }
    })
}
