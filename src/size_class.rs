//! Binary-search dispatch from a requested byte size to a size class.
//!
//! Grounded on `original_source/MemPool.cpp`'s `HashBucket::getIndexBySize`,
//! which does the same `std::lower_bound` over a sorted `g_slotSizes[]`
//! table; here the table lives on the `Allocator` rather than behind a
//! process-global `static`.

/// Returns the smallest index `i` with `table[i] >= size`, or `None` if no
/// class is large enough (caller's responsibility to have already checked
/// `size <= MAX_SLOT`).
pub(crate) fn class_for(table: &[usize], size: usize) -> Option<usize> {
    match table.binary_search(&size) {
        Ok(i) => Some(i),
        Err(i) => {
            if i < table.len() {
                Some(i)
            } else {
                None
            }
        }
    }
}
