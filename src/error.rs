use thiserror::Error;

/// Errors reported by the paged maps.
///
/// Looking up or deleting a key that is not present is not an error; those
/// operations return `Option`/`bool`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagedMapError {
    /// The map geometry or item size cannot be used.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The key's page index does not fit in the directory.
    #[error("key {key:#x} is out of range: page index {page_index} exceeds directory of {pages} pages")]
    KeyOutOfRange {
        key: u32,
        page_index: u64,
        pages: u64,
    },

    /// A value slice handed to a byte-slot map has the wrong length.
    #[error("value is {actual} bytes, the map stores {expected}-byte items")]
    ValueSize { expected: usize, actual: usize },

    /// The allocator could not provide memory for a directory or a page.
    #[error("failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },
}

impl PagedMapError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        PagedMapError::Configuration {
            reason: reason.into(),
        }
    }
}
