//! Allocation helpers

use crate::PagedMapError;

/// Converts a slot count computed in 64-bit arithmetic into a `usize`.
///
/// A count that does not fit the address space can never be allocated.
pub(crate) fn slot_count(n: u64) -> Result<usize, PagedMapError> {
    usize::try_from(n).map_err(|_| PagedMapError::Allocation { bytes: usize::MAX })
}

/// Allocates a boxed slice of `len` elements, reporting allocator failure
/// instead of aborting.
pub(crate) fn try_alloc_slice<T>(
    len: usize,
    fill: impl FnMut() -> T,
) -> Result<Box<[T]>, PagedMapError> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(len)
        .map_err(|_| PagedMapError::Allocation {
            bytes: len.saturating_mul(core::mem::size_of::<T>()),
        })?;
    slots.resize_with(len, fill);
    Ok(slots.into_boxed_slice())
}
