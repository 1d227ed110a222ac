//! Block allocation and carving.
//!
//! A block is a contiguous region from the system allocator: a small
//! header followed by a padded, aligned slot array (spec.md §3). Blocks
//! form a singly linked LIFO chain owned by the slab and are only ever
//! freed at slab teardown — grounded on the "arena ownership" guidance in
//! spec.md §9 and on `original_source/MemPool.cpp::allocateNewBlock`,
//! whose header-link-then-slots layout this mirrors (with the header-size
//! bug from spec.md §9 fixed: padding starts after `size_of::<BlockHeader>()`,
//! not after `size_of::<Slot*>()`).

use crate::error::{AllocError, Result};
use std::alloc::{alloc, dealloc, Layout};
use std::mem::size_of;
use std::ptr::NonNull;

#[repr(C)]
pub(crate) struct BlockHeader {
    next: *mut BlockHeader,
}

/// Raw allocation plus the two cursors bump allocation needs, computed
/// once when the block is carved.
pub(crate) struct NewBlock {
    pub(crate) header: NonNull<BlockHeader>,
    pub(crate) first_slot: *mut u8,
    pub(crate) end_sentinel: *mut u8,
}

/// Allocates and carves a new block for `slot_size`-byte slots.
///
/// `prev_head` becomes this block's `next` link, so the caller can splice
/// it onto the chain head in one assignment after this returns.
pub(crate) fn allocate(
    block_size: usize,
    slot_size: usize,
    align_floor: usize,
    prev_head: *mut BlockHeader,
) -> Result<NewBlock> {
    let layout = Layout::from_size_align(block_size, align_floor)?;
    let raw = unsafe { alloc(layout) };
    let raw = NonNull::new(raw).ok_or(AllocError::BackingAllocatorOom { layout })?;

    let header = raw.cast::<BlockHeader>();
    unsafe {
        header.as_ptr().write(BlockHeader { next: prev_head });
    }

    let body = unsafe { raw.as_ptr().add(size_of::<BlockHeader>()) };
    let align = slot_size.max(align_floor);
    let padded = pad_to(body, align);

    // blockStart + blockSize - slotSize + 1: the first address for which
    // "no room for another whole slot" becomes true (spec.md §4.2).
    let end_sentinel = unsafe { raw.as_ptr().add(block_size).sub(slot_size).add(1) };

    Ok(NewBlock {
        header,
        first_slot: padded,
        end_sentinel,
    })
}

/// Deallocates one block. The caller is responsible for walking the chain;
/// this only frees the block `header` itself points at.
///
/// # Safety
/// `header` must have been produced by [`allocate`] with this exact
/// `block_size`/`align_floor`, and must not be used again afterward.
pub(crate) unsafe fn deallocate(header: NonNull<BlockHeader>, block_size: usize, align_floor: usize) {
    let layout = Layout::from_size_align_unchecked(block_size, align_floor);
    dealloc(header.as_ptr() as *mut u8, layout);
}

/// # Safety
/// `header` must be a valid, currently-allocated block header.
pub(crate) unsafe fn next_of(header: NonNull<BlockHeader>) -> *mut BlockHeader {
    header.as_ref().next
}

fn pad_to(p: *mut u8, align: usize) -> *mut u8 {
    let addr = p as usize;
    let mis = addr % align;
    if mis == 0 {
        p
    } else {
        unsafe { p.add(align - mis) }
    }
}
