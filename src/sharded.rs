use crate::config::{Geometry, KeyIndex, PagedMapConfig, ReclaimPolicy};
use crate::lock::RwLock;
use crate::mapref::one::{Ref, RefMut};
use crate::table::PageTable;
use crate::util::slot_count;
use crate::{default_shard_amount, PagedMapError};
use core::fmt;
use crossbeam_utils::CachePadded;
use lock_api::{RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// A [`PagedMap`](crate::PagedMap) that can be shared between threads.
///
/// The directory is split by the high bits of the page index into a
/// power-of-two number of shards, each behind its own cache-padded `RwLock`.
/// Keys whose pages fall in different shards never contend.
///
/// Documentation mentioning locking behaviour acts in the reference frame of the calling thread.
/// This means that it is safe to ignore it across multiple threads.
pub struct ShardedPagedMap<V> {
    geometry: Geometry,
    reclaim: ReclaimPolicy,
    shift: u32,
    shards: Box<[CachePadded<RwLock<PageTable<V>>>]>,
}

#[cfg(feature = "raw-api")]
impl<V> ShardedPagedMap<V> {
    /// Allows you to peek at the inner shards that store your data.
    /// You should probably not use this unless you know what you are doing.
    ///
    /// Requires the `raw-api` feature to be enabled.
    pub fn shards(&self) -> &[CachePadded<RwLock<PageTable<V>>>] {
        &self.shards
    }

    /// Provides mutable access to the inner shards that store your data.
    /// You should probably not use this unless you know what you are doing.
    ///
    /// Requires the `raw-api` feature to be enabled.
    pub fn shards_mut(&mut self) -> &mut [CachePadded<RwLock<PageTable<V>>>] {
        &mut self.shards
    }

    /// Finds which shard a page index is stored in.
    ///
    /// Requires the `raw-api` feature to be enabled.
    pub fn determine_shard(&self, page_index: usize) -> usize {
        self._determine_shard(page_index)
    }
}

impl<V> ShardedPagedMap<V> {
    /// Creates a new `ShardedPagedMap` with the default shard amount.
    pub fn new(page_bits: u8, cell_bits: u8) -> Result<Self, PagedMapError> {
        Self::with_shard_amount(page_bits, cell_bits, default_shard_amount())
    }

    /// Creates a new `ShardedPagedMap` with a specified shard amount.
    ///
    /// `shard_amount` must be a power of two. It is capped at the number of
    /// directory slots, so a map with few pages may end up with fewer shards.
    pub fn with_shard_amount(
        page_bits: u8,
        cell_bits: u8,
        shard_amount: usize,
    ) -> Result<Self, PagedMapError> {
        Self::with_config_and_shard_amount(PagedMapConfig::new(page_bits, cell_bits), shard_amount)
    }

    pub fn with_config(config: PagedMapConfig) -> Result<Self, PagedMapError> {
        Self::with_config_and_shard_amount(config, default_shard_amount())
    }

    pub fn with_config_and_shard_amount(
        config: PagedMapConfig,
        shard_amount: usize,
    ) -> Result<Self, PagedMapError> {
        if !shard_amount.is_power_of_two() {
            return Err(PagedMapError::configuration(format!(
                "shard amount {shard_amount} is not a power of two"
            )));
        }

        let geometry = config.validate()?;
        let shard_bits = shard_amount.trailing_zeros().min(u32::from(geometry.page_bits()));
        let shift = u32::from(geometry.page_bits()) - shard_bits;

        let pages_per_shard = slot_count(1u64 << shift)?;
        let cells_per_page = slot_count(geometry.cells_per_page())?;

        let shards = (0..1usize << shard_bits)
            .map(|_| {
                PageTable::try_new(pages_per_shard, cells_per_page, config.reclaim)
                    .map(|table| CachePadded::new(RwLock::new(table)))
            })
            .collect::<Result<_, _>>()?;

        debug!(
            page_bits = geometry.page_bits(),
            cell_bits = geometry.cell_bits(),
            shards = 1usize << shard_bits,
            reclaim = ?config.reclaim,
            "created sharded paged map"
        );

        Ok(Self {
            geometry,
            reclaim: config.reclaim,
            shift,
            shards,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn reclaim_policy(&self) -> ReclaimPolicy {
        self.reclaim
    }

    pub fn shard_amount(&self) -> usize {
        self.shards.len()
    }

    #[inline(always)]
    pub(crate) fn _determine_shard(&self, page_index: usize) -> usize {
        let idx = page_index >> self.shift;
        debug_assert!(idx < self.shards.len(), "invalid shard index");
        idx
    }

    /// Splits a global key index into its shard and the index local to that
    /// shard's directory.
    #[inline]
    fn route(&self, index: KeyIndex) -> (usize, KeyIndex) {
        let shard = self._determine_shard(index.page);
        let local_mask = (1usize << self.shift) - 1;
        (
            shard,
            KeyIndex {
                page: index.page & local_mask,
                cell: index.cell,
            },
        )
    }

    /// Sets `key` to `value`, replacing any previous value.
    ///
    /// **Locking behaviour:** May deadlock if called when holding any sort of reference into the map.
    pub fn set(&self, key: u32, value: V) -> Result<(), PagedMapError> {
        self.replace(key, value).map(drop)
    }

    /// Like [`set`](Self::set), returning the previous value.
    ///
    /// **Locking behaviour:** May deadlock if called when holding any sort of reference into the map.
    pub fn replace(&self, key: u32, value: V) -> Result<Option<V>, PagedMapError> {
        let (idx, index) = self.route(self.geometry.split(key)?);
        self.shards[idx].write().replace(index, value)
    }

    /// Get an immutable reference to the value stored under `key`.
    ///
    /// **Locking behaviour:** May deadlock if called when holding a mutable reference into the map.
    pub fn get(&self, key: u32) -> Option<Ref<'_, V>> {
        let (idx, index) = self.route(self.geometry.locate(key)?);

        RwLockReadGuard::try_map(self.shards[idx].read(), |table| table.get(index))
            .ok()
            .map(|guard| Ref::new(key, guard))
    }

    /// Get a mutable reference to the value stored under `key`.
    ///
    /// **Locking behaviour:** May deadlock if called when holding any sort of reference into the map.
    pub fn get_mut(&self, key: u32) -> Option<RefMut<'_, V>> {
        let (idx, index) = self.route(self.geometry.locate(key)?);

        RwLockWriteGuard::try_map(self.shards[idx].write(), |table| table.get_mut(index))
            .ok()
            .map(|guard| RefMut::new(key, guard))
    }

    /// **Locking behaviour:** May deadlock if called when holding a mutable reference into the map.
    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Deletes `key`, returning whether it was present.
    ///
    /// **Locking behaviour:** May deadlock if called when holding any sort of reference into the map.
    pub fn delete(&self, key: u32) -> bool {
        self.remove(key).is_some()
    }

    /// Deletes `key`, returning its value if it was present.
    ///
    /// **Locking behaviour:** May deadlock if called when holding any sort of reference into the map.
    pub fn remove(&self, key: u32) -> Option<V> {
        let (idx, index) = self.route(self.geometry.locate(key)?);
        self.shards[idx].write().remove(index)
    }

    /// Fetches the total number of keys stored in the map.
    ///
    /// **Locking behaviour:** May deadlock if called when holding a mutable reference into the map.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// **Locking behaviour:** May deadlock if called when holding a mutable reference into the map.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pages currently allocated across all shards.
    ///
    /// **Locking behaviour:** May deadlock if called when holding a mutable reference into the map.
    pub fn allocated_pages(&self) -> usize {
        self.shards.iter().map(|s| s.read().allocated_pages()).sum()
    }

    /// Removes every key and frees every page.
    ///
    /// **Locking behaviour:** May deadlock if called when holding any sort of reference into the map.
    pub fn clear(&self) {
        self.shards.iter().for_each(|s| s.write().clear());
    }

    /// Releases every page of every shard, then the shards themselves.
    pub fn destroy(self) {
        debug!(
            pages = self.allocated_pages(),
            len = self.len(),
            "destroying sharded paged map"
        );
    }
}

impl<V> fmt::Debug for ShardedPagedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedPagedMap")
            .field("page_bits", &self.geometry.page_bits())
            .field("cell_bits", &self.geometry.cell_bits())
            .field("shards", &self.shards.len())
            .finish()
    }
}

#[cfg(feature = "typesize")]
impl<V> typesize::TypeSize for ShardedPagedMap<V>
where
    V: typesize::TypeSize,
{
    fn extra_size(&self) -> usize {
        self.shards
            .iter()
            .map(|shard_lock| {
                let shard = shard_lock.read();

                core::mem::size_of::<CachePadded<RwLock<PageTable<V>>>>()
                    + typesize::TypeSize::extra_size(&*shard)
            })
            .sum()
    }

    typesize::if_typesize_details! {
        fn get_collection_item_count(&self) -> Option<usize> {
            Some(self.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_scenario() {
        let map = ShardedPagedMap::with_shard_amount(2, 2, 4).unwrap();

        map.set(0, "a").unwrap();
        map.set(15, "b").unwrap();

        assert!(map.get(5).is_none());
        assert_eq!(*map.get(0).unwrap(), "a");
        assert_eq!(*map.get(15).unwrap(), "b");

        assert!(map.delete(0));
        assert!(map.get(0).is_none());
    }

    #[test]
    fn shard_amount_is_capped_by_directory() {
        let map = ShardedPagedMap::<u8>::with_shard_amount(2, 8, 64).unwrap();
        assert_eq!(map.shard_amount(), 4);

        let map = ShardedPagedMap::<u8>::with_shard_amount(0, 8, 8).unwrap();
        assert_eq!(map.shard_amount(), 1);
        map.set(255, 1).unwrap();
        assert_eq!(*map.get(255).unwrap(), 1);
    }

    #[test]
    fn shard_amount_must_be_power_of_two() {
        assert!(matches!(
            ShardedPagedMap::<u8>::with_shard_amount(8, 8, 3),
            Err(PagedMapError::Configuration { .. })
        ));
        assert!(matches!(
            ShardedPagedMap::<u8>::with_shard_amount(8, 8, 0),
            Err(PagedMapError::Configuration { .. })
        ));
        assert!(matches!(
            ShardedPagedMap::<u8>::with_shard_amount(20, 20, 4),
            Err(PagedMapError::Configuration { .. })
        ));
    }

    #[test]
    fn routes_pages_by_high_bits() {
        let map = ShardedPagedMap::with_shard_amount(4, 4, 4).unwrap();
        assert_eq!(map._determine_shard(0b0011), 0);
        assert_eq!(map._determine_shard(0b0100), 1);
        assert_eq!(map._determine_shard(0b1111), 3);

        for key in 0..=255u32 {
            map.set(key, key).unwrap();
        }
        assert_eq!(map.len(), 256);
        assert_eq!(map.allocated_pages(), 16);
        for key in 0..=255u32 {
            assert_eq!(*map.get(key).unwrap(), key);
        }
        assert!(map.set(256, 0).is_err());
    }

    #[test]
    fn replace_remove_and_clear() {
        let map = ShardedPagedMap::with_shard_amount(8, 8, 16).unwrap();

        assert_eq!(map.replace(1000, 'a').unwrap(), None);
        assert_eq!(map.replace(1000, 'b').unwrap(), Some('a'));
        assert!(map.contains_key(1000));
        assert_eq!(map.remove(1000), Some('b'));
        assert!(!map.contains_key(1000));
        assert_eq!(map.allocated_pages(), 1);

        map.set(1, 'x').unwrap();
        map.set(60000, 'y').unwrap();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.allocated_pages(), 0);
    }

    #[test]
    fn release_empty_applies_per_shard() {
        let config = PagedMapConfig::new(4, 4).reclaim(ReclaimPolicy::ReleaseEmpty);
        let map = ShardedPagedMap::with_config_and_shard_amount(config, 2).unwrap();
        assert_eq!(map.reclaim_policy(), ReclaimPolicy::ReleaseEmpty);

        map.set(0x05, ()).unwrap();
        map.set(0xf5, ()).unwrap();
        assert_eq!(map.allocated_pages(), 2);

        map.delete(0xf5);
        assert_eq!(map.allocated_pages(), 1);
    }

    #[test]
    fn reclaim_policy_does_not_lock_a_shard() {
        let config = PagedMapConfig::new(4, 4).reclaim(ReclaimPolicy::ReleaseEmpty);
        let map = ShardedPagedMap::with_config_and_shard_amount(config, 2).unwrap();
        map.set(0, 7u8).unwrap();

        let mut held = map.get_mut(0).unwrap();
        assert_eq!(map.reclaim_policy(), ReclaimPolicy::ReleaseEmpty);
        *held += 1;
        drop(held);

        assert_eq!(*map.get(0).unwrap(), 8);
    }

    #[test]
    fn get_mut_writes_through() {
        let map = ShardedPagedMap::new(8, 8).unwrap();
        map.set(42, 1u64).unwrap();
        *map.get_mut(42).unwrap() += 1;

        assert_eq!(*map.get(42).unwrap(), 2);
        assert!(map.get_mut(43).is_none());
    }

    #[test]
    fn concurrent_writers_on_disjoint_ranges() {
        let map = ShardedPagedMap::with_shard_amount(8, 8, 8).unwrap();

        std::thread::scope(|s| {
            for t in 0..4u32 {
                let map = &map;
                s.spawn(move || {
                    let base = t << 14;
                    for key in base..base + 4096 {
                        map.set(key, key ^ 0xdead).unwrap();
                    }
                    for key in (base..base + 4096).step_by(2) {
                        assert!(map.delete(key));
                    }
                });
            }
        });

        assert_eq!(map.len(), 4 * 2048);
        for t in 0..4u32 {
            let base = t << 14;
            assert!(map.get(base).is_none());
            assert_eq!(*map.get(base + 1).unwrap(), (base + 1) ^ 0xdead);
        }
    }

    #[test]
    fn readers_share_a_shard() {
        let map = ShardedPagedMap::with_shard_amount(4, 4, 2).unwrap();
        map.set(1, "one").unwrap();
        map.set(2, "two").unwrap();

        let one = map.get(1).unwrap();
        let two = map.get(2).unwrap();
        assert_eq!((one.key(), *one.value()), (1, "one"));
        assert_eq!(two.pair(), (2, &"two"));
    }
}
