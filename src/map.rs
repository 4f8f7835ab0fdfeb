use crate::config::{Geometry, PagedMapConfig, ReclaimPolicy};
use crate::table::PageTable;
use crate::util::slot_count;
use crate::PagedMapError;
use core::fmt;
use tracing::debug;

/// A map from `u32` keys to values of type `V`, stored in lazily allocated
/// pages.
///
/// The high `page_bits` of a key select a slot in a fixed directory, the low
/// `cell_bits` select a cell within the page behind that slot. The directory
/// is allocated up front; a page is only allocated the first time a key in
/// its range is set. Memory is therefore proportional to the number of
/// distinct pages touched rather than to the size of the key space.
///
/// Under the default [`ReclaimPolicy::Retain`] a page that becomes empty stays
/// allocated until the map is cleared or dropped. See
/// [`PagedMapConfig::reclaim`] to free empty pages eagerly instead.
///
/// Mutation requires `&mut self`; share the map across threads behind a lock
/// or use [`ShardedPagedMap`](crate::ShardedPagedMap).
pub struct PagedMap<V> {
    geometry: Geometry,
    table: PageTable<V>,
}

impl<V> PagedMap<V> {
    /// Creates an empty map with the given bit split.
    ///
    /// # Errors
    ///
    /// [`PagedMapError::Configuration`] if `page_bits + cell_bits` exceeds 32,
    /// [`PagedMapError::Allocation`] if the directory cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagemap::PagedMap;
    ///
    /// let mut map = PagedMap::new(2, 2).unwrap();
    /// map.set(0, "a").unwrap();
    /// map.set(15, "b").unwrap();
    ///
    /// assert_eq!(map.get(0), Some(&"a"));
    /// assert_eq!(map.get(5), None);
    /// assert!(map.set(16, "c").is_err());
    /// ```
    pub fn new(page_bits: u8, cell_bits: u8) -> Result<Self, PagedMapError> {
        Self::with_config(PagedMapConfig::new(page_bits, cell_bits))
    }

    /// Creates an empty map from a full configuration.
    pub fn with_config(config: PagedMapConfig) -> Result<Self, PagedMapError> {
        let geometry = config.validate()?;
        let table = PageTable::try_new(
            slot_count(geometry.page_count())?,
            slot_count(geometry.cells_per_page())?,
            config.reclaim,
        )?;

        debug!(
            page_bits = geometry.page_bits(),
            cell_bits = geometry.cell_bits(),
            reclaim = ?config.reclaim,
            "created paged map"
        );

        Ok(Self { geometry, table })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn page_bits(&self) -> u8 {
        self.geometry.page_bits()
    }

    pub fn cell_bits(&self) -> u8 {
        self.geometry.cell_bits()
    }

    pub fn reclaim_policy(&self) -> ReclaimPolicy {
        self.table.reclaim()
    }

    /// Number of keys present.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of pages currently allocated.
    pub fn allocated_pages(&self) -> usize {
        self.table.allocated_pages()
    }

    /// Sets `key` to `value`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// [`PagedMapError::KeyOutOfRange`] if the key's page index does not fit
    /// the directory, [`PagedMapError::Allocation`] if the key's page had to
    /// be allocated and could not be. The map is unchanged on error.
    pub fn set(&mut self, key: u32, value: V) -> Result<(), PagedMapError> {
        self.replace(key, value).map(drop)
    }

    /// Like [`set`](Self::set), returning the value previously stored under
    /// `key`.
    pub fn replace(&mut self, key: u32, value: V) -> Result<Option<V>, PagedMapError> {
        let index = self.geometry.split(key)?;
        self.table.replace(index, value)
    }

    /// Returns the value stored under `key`.
    ///
    /// Out-of-range keys are never present.
    pub fn get(&self, key: u32) -> Option<&V> {
        let index = self.geometry.locate(key)?;
        self.table.get(index)
    }

    pub fn get_mut(&mut self, key: u32) -> Option<&mut V> {
        let index = self.geometry.locate(key)?;
        self.table.get_mut(index)
    }

    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Deletes `key`, returning whether it was present.
    pub fn delete(&mut self, key: u32) -> bool {
        self.remove(key).is_some()
    }

    /// Deletes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: u32) -> Option<V> {
        let index = self.geometry.locate(key)?;
        self.table.remove(index)
    }

    /// Removes every key and frees every page. The directory is kept.
    pub fn clear(&mut self) {
        debug!(pages = self.allocated_pages(), "clearing paged map");
        self.table.clear();
    }

    /// Releases every page and then the directory.
    ///
    /// Dropping the map does the same; this spells it out at call sites that
    /// manage the map's lifetime explicitly.
    pub fn destroy(self) {
        debug!(
            pages = self.allocated_pages(),
            len = self.len(),
            "destroying paged map"
        );
    }
}

impl<V> fmt::Debug for PagedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedMap")
            .field("page_bits", &self.page_bits())
            .field("cell_bits", &self.cell_bits())
            .field("len", &self.len())
            .field("allocated_pages", &self.allocated_pages())
            .finish()
    }
}

#[cfg(feature = "typesize")]
impl<V> typesize::TypeSize for PagedMap<V>
where
    V: typesize::TypeSize,
{
    fn extra_size(&self) -> usize {
        typesize::TypeSize::extra_size(&self.table)
    }

    typesize::if_typesize_details! {
        fn get_collection_item_count(&self) -> Option<usize> {
            Some(self.len())
        }
    }
}
