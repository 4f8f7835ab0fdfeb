use crate::config::{KeyIndex, ReclaimPolicy};
use crate::directory::Directory;
use crate::page::Page;
use crate::PagedMapError;
use core::fmt;

/// A directory of typed pages plus its live-cell count.
///
/// This is the storage behind [`PagedMap`](crate::PagedMap) and behind every
/// shard of a [`ShardedPagedMap`](crate::ShardedPagedMap). It addresses pages
/// by their index within its own directory; splitting keys is up to the
/// owner.
pub struct PageTable<V> {
    directory: Directory<Page<V>>,
    cells_per_page: usize,
    len: usize,
}

impl<V> PageTable<V> {
    pub(crate) fn try_new(
        pages: usize,
        cells_per_page: usize,
        reclaim: ReclaimPolicy,
    ) -> Result<Self, PagedMapError> {
        Ok(Self {
            directory: Directory::try_new(pages, reclaim)?,
            cells_per_page,
            len: 0,
        })
    }

    /// Number of present cells.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of pages currently allocated.
    pub fn allocated_pages(&self) -> usize {
        self.directory.allocated()
    }

    pub(crate) fn reclaim(&self) -> ReclaimPolicy {
        self.directory.reclaim()
    }

    #[inline]
    pub(crate) fn get(&self, index: KeyIndex) -> Option<&V> {
        self.directory.page(index.page)?.get(index.cell)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: KeyIndex) -> Option<&mut V> {
        self.directory.page_mut(index.page)?.get_mut(index.cell)
    }

    /// Stores `value`, allocating the page on first write into its range.
    ///
    /// On allocation failure nothing has changed.
    pub(crate) fn replace(&mut self, index: KeyIndex, value: V) -> Result<Option<V>, PagedMapError> {
        let cells = self.cells_per_page;
        let page = self
            .directory
            .page_or_try_insert_with(index.page, || Page::try_new(cells))?;

        let old = page.replace(index.cell, value);
        if old.is_none() {
            self.len += 1;
        }
        Ok(old)
    }

    pub(crate) fn remove(&mut self, index: KeyIndex) -> Option<V> {
        let value = self.directory.page_mut(index.page)?.take(index.cell)?;
        self.len -= 1;
        self.directory.release_if_empty(index.page);
        Some(value)
    }

    /// Frees every page, keeping the directory.
    pub fn clear(&mut self) {
        self.directory.clear();
        self.len = 0;
    }
}

impl<V> fmt::Debug for PageTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTable")
            .field("len", &self.len)
            .field("allocated_pages", &self.allocated_pages())
            .field("cells_per_page", &self.cells_per_page)
            .finish()
    }
}

#[cfg(feature = "typesize")]
impl<V> typesize::TypeSize for PageTable<V>
where
    V: typesize::TypeSize,
{
    fn extra_size(&self) -> usize {
        self.directory.slots_size()
            + self
                .directory
                .pages()
                .map(|page| page.extra_size())
                .sum::<usize>()
    }

    typesize::if_typesize_details! {
        fn get_collection_item_count(&self) -> Option<usize> {
            Some(self.len())
        }
    }
}
