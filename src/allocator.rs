//! Dispatch façade: the public `acquire`/`release` entry points, routing
//! through the size-class table to the correct slab or to the system
//! allocator for oversize requests (spec.md §4.1).

use crate::config::AllocatorConfig;
use crate::error::Result;
use crate::magazine;
use crate::size_class;
use crate::slab::Slab;
use once_cell::sync::Lazy;
use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment used for the system-allocator passthrough on oversize
/// requests (> `max_slot`). The caller only ever supplies a size, not an
/// alignment, on `release`, so both paths must agree on a fixed value —
/// this mirrors the alignment guarantee `malloc`/`operator new` give any
/// request without an explicit over-alignment, per spec.md §4.1's
/// "delegate to the system allocator" wording.
const OVERSIZE_ALIGN: usize = 16;

/// A size-classed slab allocator (spec.md §2).
///
/// Most applications should use the free functions at the crate root,
/// which route through [`global`]. Construct an `Allocator` directly only
/// when you need an instance isolated from the process-wide singleton
/// (tests, or embedding more than one independently-tuned allocator).
pub struct Allocator {
    config: AllocatorConfig,
    size_table: Vec<usize>,
    slabs: Vec<Box<Slab>>,
}

impl Allocator {
    /// Builds the size-class table and one slab per class (spec.md §4.1
    /// "Init"). Idempotent in the sense that calling it twice produces
    /// byte-equal tables (spec.md §8); it is not a mutate-in-place
    /// singleton initializer — construct once and share via `&Allocator`
    /// or [`global`].
    pub fn new(config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        let size_table = config.build_size_table();
        let slabs = size_table
            .iter()
            .map(|&slot_size| {
                let block_size = config.block_size_for(slot_size);
                Box::new(Slab::with_magazine_cap(
                    slot_size,
                    block_size,
                    config.cache_line,
                    config.magazine_cap,
                ))
            })
            .collect();
        Ok(Self {
            config,
            size_table,
            slabs,
        })
    }

    fn class_for(&self, size: usize) -> Option<usize> {
        size_class::class_for(&self.size_table, size)
    }

    /// Returns a pointer to `size` bytes of uninitialized memory, or null
    /// if `size == 0` (spec.md §6). Sizes over `max_slot` defer to the
    /// system allocator.
    pub fn acquire(&self, size: usize) -> *mut u8 {
        if size == 0 {
            return std::ptr::null_mut();
        }
        if size > self.config.max_slot {
            return oversize_acquire(size);
        }

        let class = self
            .class_for(size)
            .expect("size <= max_slot always has a covering class");
        let slab = &self.slabs[class];

        if let Some(slot) = magazine::acquire(slab) {
            return slot.as_ptr();
        }
        slab.allocate_slow().as_ptr()
    }

    /// Returns a slot previously obtained from `acquire(size)` with the
    /// same `size`. `ptr` may be null (no-op). Passing a `size` that
    /// differs from the one used at `acquire` violates the class-soundness
    /// invariant and is a caller bug (spec.md §7 item 5), not something
    /// this function detects.
    pub fn release(&self, ptr: *mut u8, size: usize) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        if size > self.config.max_slot {
            oversize_release(ptr, size);
            return;
        }

        let class = self
            .class_for(size)
            .expect("size <= max_slot always has a covering class");
        magazine::release(&self.slabs[class], ptr);
    }

    /// Allocates room for a `T` and moves `value` into it in place
    /// (spec.md §6 `typedAcquire`). Modeled on
    /// `original_source/MemPool.h`'s `newElement<T>`.
    pub fn typed_acquire<T>(&self, value: T) -> *mut T {
        debug_assert!(
            std::mem::size_of::<T>() <= self.config.max_slot,
            "type too large for the slab allocator"
        );
        let raw = self.acquire(std::mem::size_of::<T>()) as *mut T;
        unsafe { raw.write(value) };
        raw
    }

    /// Runs `T`'s destructor, then returns the slot (spec.md §6
    /// `typedRelease`). Modeled on `original_source/MemPool.h`'s
    /// `deleteElement<T>`.
    ///
    /// # Safety
    /// `ptr` must have come from `typed_acquire::<T>` on this allocator
    /// (or an allocator with an identical size-class table) and must not
    /// be used again afterward.
    pub unsafe fn typed_release<T>(&self, ptr: *mut T) {
        if ptr.is_null() {
            return;
        }
        std::ptr::drop_in_place(ptr);
        self.release(ptr as *mut u8, std::mem::size_of::<T>());
    }
}

fn oversize_acquire(size: usize) -> *mut u8 {
    let layout = Layout::from_size_align(size, OVERSIZE_ALIGN).unwrap_or_else(|_| Layout::new::<u8>());
    unsafe { alloc(layout) }
}

fn oversize_release(ptr: NonNull<u8>, size: usize) {
    let layout = Layout::from_size_align(size, OVERSIZE_ALIGN).unwrap_or_else(|_| Layout::new::<u8>());
    unsafe { dealloc(ptr.as_ptr(), layout) };
}

static GLOBAL: Lazy<Allocator> = Lazy::new(|| {
    Allocator::new(AllocatorConfig::default()).expect("default allocator configuration is always valid")
});

/// The process-wide allocator singleton, lazily built on first use
/// (spec.md §4.5 "process init"). Building it is idempotent by
/// construction of `once_cell::sync::Lazy`.
pub fn global() -> &'static Allocator {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_returns_null() {
        let a = Allocator::new(AllocatorConfig::default()).unwrap();
        assert!(a.acquire(0).is_null());
    }

    #[test]
    fn null_release_is_noop() {
        let a = Allocator::new(AllocatorConfig::default()).unwrap();
        a.release(std::ptr::null_mut(), 64); // must not panic
    }

    #[test]
    fn oversize_roundtrip_bypasses_slabs() {
        let a = Allocator::new(AllocatorConfig::default()).unwrap();
        let p = a.acquire(4096);
        assert!(!p.is_null());
        unsafe {
            p.write_bytes(0xAB, 4096);
        }
        a.release(p, 4096);
    }

    #[test]
    fn small_allocations_are_aligned_and_distinct() {
        let a = Allocator::new(AllocatorConfig::default()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let p = a.acquire(8);
            assert_eq!(p as usize % 64, 0);
            assert!(seen.insert(p as usize));
        }
    }

    #[test]
    fn acquire_release_roundtrip_reuses_slot() {
        let a = Allocator::new(AllocatorConfig::default()).unwrap();
        let p = a.acquire(24);
        a.release(p, 24);
        let q = a.acquire(24);
        assert_eq!(p, q);
    }

    #[test]
    fn typed_roundtrip_runs_drop() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        struct Counted(u32);
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let a = Allocator::new(AllocatorConfig::default()).unwrap();
        let p = a.typed_acquire(Counted(7));
        assert_eq!(unsafe { (*p).0 }, 7);
        unsafe { a.typed_release(p) };
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn global_singleton_is_idempotent() {
        let a = global();
        let b = global();
        assert!(std::ptr::eq(a, b));
    }
}
