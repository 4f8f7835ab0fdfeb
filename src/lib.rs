//! Paged maps keyed by `u32`.
//!
//! A key is split into a page index (its high `page_bits`) and a cell index
//! (its low `cell_bits`). The page directory is allocated once with
//! `2^page_bits` empty slots; a page of `2^cell_bits` cells is allocated the
//! first time a key in its range is set. Set, get and delete are O(1) and
//! memory grows with the number of distinct pages touched, not with the size
//! of the key space.
//!
//! - [`PagedMap`] stores typed values and is mutated through `&mut self`.
//! - [`RawPagedMap`] stores fixed-size byte items in page-contiguous buffers.
//! - [`ShardedPagedMap`] splits the directory into lock-protected shards so it
//!   can be shared between threads.
//!
//! ```
//! use pagemap::{PagedMap, PagedMapConfig, ReclaimPolicy};
//!
//! let config = PagedMapConfig::new(16, 16).reclaim(ReclaimPolicy::ReleaseEmpty);
//! let mut map = PagedMap::with_config(config).unwrap();
//!
//! map.set(0xdead_beef, "value").unwrap();
//! assert_eq!(map.get(0xdead_beef), Some(&"value"));
//! assert_eq!(map.allocated_pages(), 1);
//!
//! assert!(map.delete(0xdead_beef));
//! assert_eq!(map.allocated_pages(), 0);
//! ```

#![forbid(unsafe_code)]

mod config;
mod directory;
mod error;
mod lock;
mod map;
pub mod mapref;
mod page;
mod raw;
mod sharded;
mod table;
mod util;

#[cfg(test)]
mod proptests;

use std::sync::OnceLock;

pub use config::{Geometry, KeyIndex, PagedMapConfig, ReclaimPolicy, KEY_BITS};
pub use error::PagedMapError;
pub use map::PagedMap;
pub use raw::RawPagedMap;
pub use sharded::ShardedPagedMap;

#[cfg(feature = "raw-api")]
pub use lock::{RawRwLock, RwLock};
#[cfg(feature = "raw-api")]
pub use table::PageTable;

pub(crate) fn default_shard_amount() -> usize {
    static DEFAULT_SHARD_AMOUNT: OnceLock<usize> = OnceLock::new();
    *DEFAULT_SHARD_AMOUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}
