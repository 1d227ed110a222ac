//! Per-size-class slab: block chain, bump cursor, and global free stack.
//!
//! Grounded on `src/memory/slab.rs`'s `Slab`/`SizeClass` split (kept here
//! as one type per spec.md §3, which puts `firstBlock`/`curSlot`/`lastSlot`
//! and the free stack on a single `Slab` per size class) and on
//! `src/memory/allocator/slab_allocator.rs`'s bump-then-freelist allocate
//! path.

use crate::block::{self, BlockHeader};
use parking_lot::Mutex;
use std::alloc::{handle_alloc_error, Layout};
use std::ptr::NonNull;

use crate::free_stack::FreeStack;

struct BumpState {
    first_block: *mut BlockHeader,
    cur: *mut u8,
    last: *mut u8,
}

// Safety: `BumpState` is only ever touched through `Slab::bump`'s mutex.
unsafe impl Send for BumpState {}

pub(crate) struct Slab {
    pub(crate) slot_size: usize,
    block_size: usize,
    align_floor: usize,
    magazine_cap: usize,
    bump: Mutex<BumpState>,
    free_stack: FreeStack,
}

impl Slab {
    pub(crate) fn new(slot_size: usize, block_size: usize, align_floor: usize) -> Self {
        Self::with_magazine_cap(slot_size, block_size, align_floor, crate::config::MAGAZINE_CAP)
    }

    pub(crate) fn with_magazine_cap(
        slot_size: usize,
        block_size: usize,
        align_floor: usize,
        magazine_cap: usize,
    ) -> Self {
        Self {
            slot_size,
            block_size,
            align_floor,
            magazine_cap,
            bump: Mutex::new(BumpState {
                first_block: std::ptr::null_mut(),
                cur: std::ptr::null_mut(),
                last: std::ptr::null_mut(),
            }),
            free_stack: FreeStack::new(),
        }
    }

    pub(crate) fn magazine_cap(&self) -> usize {
        self.magazine_cap
    }

    /// Pops a slot from the global free stack, falling back to bump
    /// allocation (carving a new block if the current one is exhausted).
    /// This is the path taken after a thread-magazine miss — see
    /// `crate::magazine`.
    pub(crate) fn allocate_slow(&self) -> NonNull<u8> {
        if let Some(slot) = self.free_stack.pop() {
            return slot;
        }

        let mut bump = self.bump.lock();
        if (bump.cur as usize) >= (bump.last as usize) {
            self.allocate_new_block(&mut bump);
        }

        let slot = bump.cur;
        bump.cur = unsafe { bump.cur.add(self.slot_size) };
        NonNull::new(slot).expect("bump cursor is never null after allocate_new_block")
    }

    /// Carves a fresh block and installs it as the bump-allocation source.
    /// Must be called with `bump` already locked. On backing-allocator OOM
    /// the bump state is left untouched (spec.md §7 item 1) and the
    /// process aborts the same way `std::alloc::handle_alloc_error` aborts
    /// any other failed allocation in this process.
    fn allocate_new_block(&self, bump: &mut BumpState) {
        match block::allocate(self.block_size, self.slot_size, self.align_floor, bump.first_block) {
            Ok(nb) => {
                tracing::debug!(
                    slot_size = self.slot_size,
                    block_size = self.block_size,
                    "allocated new slab block"
                );
                bump.first_block = nb.header.as_ptr();
                bump.cur = nb.first_slot;
                bump.last = nb.end_sentinel;
            }
            Err(err) => {
                tracing::warn!(slot_size = self.slot_size, %err, "backing allocator exhausted");
                let layout = Layout::from_size_align(self.block_size, self.align_floor)
                    .unwrap_or_else(|_| Layout::new::<u8>());
                handle_alloc_error(layout);
            }
        }
    }

    /// Splices a magazine's entire chain onto the global free stack in one
    /// CAS (spec.md §4.2's flush-on-overflow policy).
    pub(crate) fn flush_chain(&self, head: NonNull<u8>, tail: NonNull<u8>, count: usize) {
        self.free_stack.push_chain(head, tail, count);
        tracing::trace!(slot_size = self.slot_size, count, "flushed magazine to global stack");
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        let bump = self.bump.get_mut();
        let mut header = bump.first_block;
        bump.first_block = std::ptr::null_mut();
        while let Some(h) = NonNull::new(header) {
            let next = unsafe { block::next_of(h) };
            unsafe { block::deallocate(h, self.block_size, self.align_floor) };
            header = next;
        }
    }
}

#[cfg(test)]
impl Slab {
    /// Counts blocks currently chained off this slab. Test-only: production
    /// code has no use for block introspection (spec.md's non-goal on an
    /// allocation-statistics surface).
    fn block_count(&self) -> usize {
        let bump = self.bump.lock();
        let mut count = 0;
        let mut header = bump.first_block;
        while let Some(h) = NonNull::new(header) {
            count += 1;
            header = unsafe { block::next_of(h) };
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_thread_churn_reuses_one_block() {
        // spec.md §8 scenario 1: repeatedly acquiring and releasing one
        // slot must settle into reusing the same block forever, not carve
        // a new one each round.
        let slab = Slab::new(8, 4096, 64);
        let first = slab.allocate_slow();
        assert_eq!(slab.block_count(), 1);

        for _ in 0..10_000 {
            let p = slab.allocate_slow();
            assert_eq!(p.as_ptr() as usize % 64, 0);
            slab.flush_chain(p, p, 1);
        }

        assert_eq!(
            slab.block_count(),
            1,
            "round-tripping through acquire/release must never carve a second block"
        );
        slab.flush_chain(first, first, 1);
    }

    #[test]
    fn distinct_bump_allocations_never_alias() {
        let slab = Slab::new(8, 4096, 64);
        let mut ptrs = Vec::new();
        for _ in 0..10_000 {
            ptrs.push(slab.allocate_slow());
        }
        let mut seen = std::collections::HashSet::new();
        for p in &ptrs {
            assert!(seen.insert(p.as_ptr() as usize), "duplicate slot handed out");
        }
    }

    #[test]
    fn bump_then_reuse_via_free_stack() {
        let slab = Slab::new(32, 4096, 64);
        let a = slab.allocate_slow();
        let b = slab.allocate_slow();
        assert_ne!(a, b);
        slab.flush_chain(a, a, 1);
        let c = slab.allocate_slow();
        assert_eq!(a, c, "freed slot should be reused before bumping further");
    }
}
