use std::alloc::{Layout, LayoutError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocError {
    #[error("invalid block layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("system allocator returned null for layout {layout:?}")]
    BackingAllocatorOom { layout: Layout },

    #[error("invalid allocator configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = std::result::Result<T, AllocError>;
