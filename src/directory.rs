use crate::config::ReclaimPolicy;
use crate::util::try_alloc_slice;
use crate::PagedMapError;
use tracing::trace;

/// What the directory needs to know about the pages it owns.
pub(crate) trait PageStorage {
    /// Number of cells currently marked present.
    fn live(&self) -> usize;
}

/// Fixed-size array of optionally allocated pages, indexed by page index.
///
/// Allocated once at its full size; only the pages behind it are lazy.
pub(crate) struct Directory<P> {
    slots: Box<[Option<P>]>,
    allocated: usize,
    reclaim: ReclaimPolicy,
}

impl<P: PageStorage> Directory<P> {
    pub(crate) fn try_new(len: usize, reclaim: ReclaimPolicy) -> Result<Self, PagedMapError> {
        Ok(Self {
            slots: try_alloc_slice(len, || None)?,
            allocated: 0,
            reclaim,
        })
    }

    pub(crate) fn reclaim(&self) -> ReclaimPolicy {
        self.reclaim
    }

    /// Number of slots holding a page.
    pub(crate) fn allocated(&self) -> usize {
        self.allocated
    }

    #[inline]
    pub(crate) fn page(&self, index: usize) -> Option<&P> {
        self.slots[index].as_ref()
    }

    #[inline]
    pub(crate) fn page_mut(&mut self, index: usize) -> Option<&mut P> {
        self.slots[index].as_mut()
    }

    /// Returns the page at `index`, allocating it with `alloc` if the slot is
    /// empty.
    ///
    /// If `alloc` fails the slot is left empty and the error is returned.
    pub(crate) fn page_or_try_insert_with(
        &mut self,
        index: usize,
        alloc: impl FnOnce() -> Result<P, PagedMapError>,
    ) -> Result<&mut P, PagedMapError> {
        let slot = &mut self.slots[index];
        let page = match slot.take() {
            Some(page) => page,
            None => {
                let page = alloc()?;
                self.allocated += 1;
                trace!(page = index, "allocated page");
                page
            }
        };
        Ok(slot.insert(page))
    }

    /// Frees the page at `index` if the reclaim policy asks for it and the
    /// page has no live cells left. Returns whether the page was freed.
    pub(crate) fn release_if_empty(&mut self, index: usize) -> bool {
        if self.reclaim != ReclaimPolicy::ReleaseEmpty {
            return false;
        }

        let slot = &mut self.slots[index];
        if slot.as_ref().is_some_and(|page| page.live() == 0) {
            *slot = None;
            self.allocated -= 1;
            trace!(page = index, "released empty page");
            return true;
        }

        false
    }

    /// Frees every page, keeping the directory itself.
    pub(crate) fn clear(&mut self) {
        if self.allocated == 0 {
            return;
        }

        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.allocated = 0;
    }

    #[cfg(feature = "typesize")]
    pub(crate) fn pages(&self) -> impl Iterator<Item = &P> {
        self.slots.iter().flatten()
    }

    #[cfg(feature = "typesize")]
    pub(crate) fn slots_size(&self) -> usize {
        core::mem::size_of_val(&*self.slots)
    }
}
