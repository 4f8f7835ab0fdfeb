use crate::config::{Geometry, KeyIndex, PagedMapConfig, ReclaimPolicy};
use crate::directory::{Directory, PageStorage};
use crate::util::{slot_count, try_alloc_slice};
use crate::PagedMapError;
use core::fmt;
use tracing::debug;

const WORD_BITS: usize = u64::BITS as usize;

/// A page of fixed-size byte cells: one presence bit per cell plus a
/// contiguous `cells * item_size` byte buffer.
struct RawPage {
    present: Box<[u64]>,
    bytes: Box<[u8]>,
    live: usize,
}

impl RawPage {
    fn try_new(cells: usize, item_size: usize) -> Result<Self, PagedMapError> {
        let len = cells
            .checked_mul(item_size)
            .ok_or(PagedMapError::Allocation { bytes: usize::MAX })?;

        Ok(Self {
            present: try_alloc_slice(cells.div_ceil(WORD_BITS), || 0)?,
            bytes: try_alloc_slice(len, || 0)?,
            live: 0,
        })
    }

    #[inline]
    fn is_present(&self, cell: usize) -> bool {
        self.present[cell / WORD_BITS] & (1 << (cell % WORD_BITS)) != 0
    }

    #[inline]
    fn get(&self, cell: usize, item_size: usize) -> Option<&[u8]> {
        if !self.is_present(cell) {
            return None;
        }
        let start = cell * item_size;
        Some(&self.bytes[start..start + item_size])
    }

    #[inline]
    fn get_mut(&mut self, cell: usize, item_size: usize) -> Option<&mut [u8]> {
        if !self.is_present(cell) {
            return None;
        }
        let start = cell * item_size;
        Some(&mut self.bytes[start..start + item_size])
    }

    /// Copies `value` into the cell. Returns whether the cell was already
    /// present.
    fn write(&mut self, cell: usize, value: &[u8]) -> bool {
        let start = cell * value.len();
        self.bytes[start..start + value.len()].copy_from_slice(value);

        let was_present = self.is_present(cell);
        if !was_present {
            self.present[cell / WORD_BITS] |= 1 << (cell % WORD_BITS);
            self.live += 1;
        }
        was_present
    }

    /// Marks the cell absent. Returns whether it was present.
    fn clear(&mut self, cell: usize) -> bool {
        if !self.is_present(cell) {
            return false;
        }
        self.present[cell / WORD_BITS] &= !(1 << (cell % WORD_BITS));
        self.live -= 1;
        true
    }
}

impl PageStorage for RawPage {
    fn live(&self) -> usize {
        self.live
    }
}

/// A paged map whose values are opaque byte items of one fixed size.
///
/// Behaves like [`PagedMap`](crate::PagedMap), but every value is exactly
/// `item_size` bytes copied in and out of page-contiguous storage, with no
/// per-value allocation.
///
/// ```
/// use pagemap::RawPagedMap;
///
/// let mut map = RawPagedMap::new(4, 4, 4).unwrap();
/// map.set(7, &42u32.to_le_bytes()).unwrap();
///
/// assert_eq!(map.get(7), Some(&42u32.to_le_bytes()[..]));
/// assert!(map.delete(7));
/// assert_eq!(map.get(7), None);
/// ```
pub struct RawPagedMap {
    geometry: Geometry,
    item_size: usize,
    cells_per_page: usize,
    directory: Directory<RawPage>,
    len: usize,
}

impl RawPagedMap {
    /// Creates an empty map storing `item_size`-byte values.
    ///
    /// # Errors
    ///
    /// [`PagedMapError::Configuration`] if `page_bits + cell_bits` exceeds 32
    /// or `item_size` is zero, [`PagedMapError::Allocation`] if the directory
    /// cannot be allocated.
    pub fn new(page_bits: u8, cell_bits: u8, item_size: usize) -> Result<Self, PagedMapError> {
        Self::with_config(PagedMapConfig::new(page_bits, cell_bits), item_size)
    }

    pub fn with_config(config: PagedMapConfig, item_size: usize) -> Result<Self, PagedMapError> {
        let geometry = config.validate()?;
        if item_size == 0 {
            return Err(PagedMapError::configuration("item_size must be non-zero"));
        }

        let directory = Directory::try_new(slot_count(geometry.page_count())?, config.reclaim)?;

        debug!(
            page_bits = geometry.page_bits(),
            cell_bits = geometry.cell_bits(),
            item_size,
            reclaim = ?config.reclaim,
            "created raw paged map"
        );

        Ok(Self {
            geometry,
            item_size,
            cells_per_page: slot_count(geometry.cells_per_page())?,
            directory,
            len: 0,
        })
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

    /// Size in bytes of every stored value.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn reclaim_policy(&self) -> ReclaimPolicy {
        self.directory.reclaim()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn allocated_pages(&self) -> usize {
        self.directory.allocated()
    }

    /// Copies `value` into the cell for `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// [`PagedMapError::ValueSize`] unless `value` is exactly
    /// [`item_size`](Self::item_size) bytes,
    /// [`PagedMapError::KeyOutOfRange`] and [`PagedMapError::Allocation`] as
    /// for [`PagedMap::set`](crate::PagedMap::set). The map is unchanged on
    /// error.
    pub fn set(&mut self, key: u32, value: &[u8]) -> Result<(), PagedMapError> {
        if value.len() != self.item_size {
            return Err(PagedMapError::ValueSize {
                expected: self.item_size,
                actual: value.len(),
            });
        }

        let KeyIndex { page, cell } = self.geometry.split(key)?;
        let (cells, item_size) = (self.cells_per_page, self.item_size);
        let page = self
            .directory
            .page_or_try_insert_with(page, || RawPage::try_new(cells, item_size))?;

        if !page.write(cell, value) {
            self.len += 1;
        }
        Ok(())
    }

    /// Returns the `item_size` bytes stored under `key`.
    pub fn get(&self, key: u32) -> Option<&[u8]> {
        let KeyIndex { page, cell } = self.geometry.locate(key)?;
        self.directory.page(page)?.get(cell, self.item_size)
    }

    pub fn get_mut(&mut self, key: u32) -> Option<&mut [u8]> {
        let KeyIndex { page, cell } = self.geometry.locate(key)?;
        self.directory.page_mut(page)?.get_mut(cell, self.item_size)
    }

    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Deletes `key`, returning whether it was present.
    pub fn delete(&mut self, key: u32) -> bool {
        let Some(KeyIndex { page, cell }) = self.geometry.locate(key) else {
            return false;
        };
        let Some(raw) = self.directory.page_mut(page) else {
            return false;
        };
        if !raw.clear(cell) {
            return false;
        }

        self.len -= 1;
        self.directory.release_if_empty(page);
        true
    }

    /// Removes every key and frees every page. The directory is kept.
    pub fn clear(&mut self) {
        debug!(pages = self.allocated_pages(), "clearing raw paged map");
        self.directory.clear();
        self.len = 0;
    }

    /// Releases every page and then the directory.
    pub fn destroy(self) {
        debug!(
            pages = self.allocated_pages(),
            len = self.len,
            "destroying raw paged map"
        );
    }
}

impl fmt::Debug for RawPagedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPagedMap")
            .field("page_bits", &self.page_bits())
            .field("cell_bits", &self.cell_bits())
            .field("item_size", &self.item_size)
            .field("len", &self.len)
            .field("allocated_pages", &self.allocated_pages())
            .finish()
    }
}

#[cfg(feature = "typesize")]
impl typesize::TypeSize for RawPagedMap {
    fn extra_size(&self) -> usize {
        self.directory.slots_size()
            + self
                .directory
                .pages()
                .map(|page| core::mem::size_of_val(&*page.present) + page.bytes.len())
                .sum::<usize>()
    }

    typesize::if_typesize_details! {
        fn get_collection_item_count(&self) -> Option<usize> {
            Some(self.len)
        }
    }
}
