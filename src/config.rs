use crate::PagedMapError;
use tracing::trace;

/// Width of a key in bits.
pub const KEY_BITS: u8 = 32;

/// How a paged map treats a page once its last live cell is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReclaimPolicy {
    /// Pages stay allocated until the map is cleared or dropped.
    ///
    /// Deletes are strictly O(1), at the cost of never giving page memory
    /// back while the map lives.
    #[default]
    Retain,
    /// A page is freed, and its directory slot emptied, as soon as it holds
    /// no live cells.
    ///
    /// Deletes become O(1) amortized: the page that gets freed was paid for
    /// by the set that allocated it.
    ReleaseEmpty,
}

/// The two components a key splits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyIndex {
    /// Directory slot, taken from the high-order bits of the key.
    pub page: usize,
    /// Cell within the page, taken from the low-order bits of the key.
    pub cell: usize,
}

/// The page/cell bit split of a map, fixed for the map's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    page_bits: u8,
    cell_bits: u8,
}

impl Geometry {
    /// Creates a geometry routing `page_bits` high-order key bits to the
    /// directory and `cell_bits` low-order bits to the cell within a page.
    ///
    /// # Errors
    ///
    /// [`PagedMapError::Configuration`] if the two widths add up to more than
    /// [`KEY_BITS`].
    pub fn new(page_bits: u8, cell_bits: u8) -> Result<Self, PagedMapError> {
        let total = u16::from(page_bits) + u16::from(cell_bits);
        if total > u16::from(KEY_BITS) {
            return Err(PagedMapError::configuration(format!(
                "page_bits ({page_bits}) + cell_bits ({cell_bits}) = {total} exceeds the {KEY_BITS}-bit key"
            )));
        }

        Ok(Self {
            page_bits,
            cell_bits,
        })
    }

    pub fn page_bits(&self) -> u8 {
        self.page_bits
    }

    pub fn cell_bits(&self) -> u8 {
        self.cell_bits
    }

    /// Number of directory slots, `2^page_bits`.
    pub fn page_count(&self) -> u64 {
        1u64 << self.page_bits
    }

    /// Number of cells in every page, `2^cell_bits`.
    pub fn cells_per_page(&self) -> u64 {
        1u64 << self.cell_bits
    }

    /// Splits `key` into its page and cell index.
    ///
    /// # Errors
    ///
    /// [`PagedMapError::KeyOutOfRange`] if the page index does not fit in the
    /// directory. Keys are never wrapped.
    #[inline]
    pub fn split(&self, key: u32) -> Result<KeyIndex, PagedMapError> {
        self.locate(key).ok_or_else(|| {
            let page_index = self.page_of(key);
            trace!(key, page_index, "key out of range");
            PagedMapError::KeyOutOfRange {
                key,
                page_index,
                pages: self.page_count(),
            }
        })
    }

    /// Like [`split`](Self::split), for lookups where an out-of-range key is
    /// simply absent. Emits nothing.
    #[inline]
    pub(crate) fn locate(&self, key: u32) -> Option<KeyIndex> {
        let page = self.page_of(key);
        (page < self.page_count()).then(|| KeyIndex {
            page: page as usize,
            cell: (u64::from(key) & (self.cells_per_page() - 1)) as usize,
        })
    }

    // 64-bit so that a 32-bit shift stays defined.
    #[inline]
    fn page_of(&self, key: u32) -> u64 {
        u64::from(key) >> self.cell_bits
    }
}

/// Construction parameters shared by every paged map flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PagedMapConfig {
    pub page_bits: u8,
    pub cell_bits: u8,
    pub reclaim: ReclaimPolicy,
}

impl PagedMapConfig {
    pub fn new(page_bits: u8, cell_bits: u8) -> Self {
        Self {
            page_bits,
            cell_bits,
            reclaim: ReclaimPolicy::default(),
        }
    }

    /// Sets the page reclamation policy.
    pub fn reclaim(mut self, reclaim: ReclaimPolicy) -> Self {
        self.reclaim = reclaim;
        self
    }

    /// Checks the configuration and returns the geometry it describes.
    pub fn validate(&self) -> Result<Geometry, PagedMapError> {
        Geometry::new(self.page_bits, self.cell_bits)
    }
}
