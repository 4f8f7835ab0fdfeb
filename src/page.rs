use crate::directory::PageStorage;
use crate::util::try_alloc_slice;
use crate::PagedMapError;

/// A fixed-size run of cells covering one page-index range.
///
/// `None` marks an absent cell, so a stored zero-like value is still present.
pub(crate) struct Page<V> {
    cells: Box<[Option<V>]>,
    live: usize,
}

impl<V> Page<V> {
    pub(crate) fn try_new(cells: usize) -> Result<Self, PagedMapError> {
        Ok(Self {
            cells: try_alloc_slice(cells, || None)?,
            live: 0,
        })
    }

    #[inline]
    pub(crate) fn get(&self, cell: usize) -> Option<&V> {
        self.cells[cell].as_ref()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, cell: usize) -> Option<&mut V> {
        self.cells[cell].as_mut()
    }

    /// Stores `value`, returning what the cell held before.
    pub(crate) fn replace(&mut self, cell: usize, value: V) -> Option<V> {
        let old = self.cells[cell].replace(value);
        if old.is_none() {
            self.live += 1;
        }
        old
    }

    /// Marks the cell absent, returning its value if it was present.
    pub(crate) fn take(&mut self, cell: usize) -> Option<V> {
        let old = self.cells[cell].take();
        if old.is_some() {
            self.live -= 1;
        }
        old
    }

    #[cfg(feature = "typesize")]
    pub(crate) fn extra_size(&self) -> usize
    where
        V: typesize::TypeSize,
    {
        core::mem::size_of_val(&*self.cells)
            + self
                .cells
                .iter()
                .flatten()
                .map(typesize::TypeSize::extra_size)
                .sum::<usize>()
    }
}

impl<V> PageStorage for Page<V> {
    fn live(&self) -> usize {
        self.live
    }
}
