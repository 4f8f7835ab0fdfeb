use crate::lock::{ReadGuard, WriteGuard};
use core::ops::{Deref, DerefMut};
use std::fmt::{self, Debug, Display, Formatter};

/// A shared reference to a value in a [`ShardedPagedMap`](crate::ShardedPagedMap),
/// or to something projected out of one with [`Ref::map`].
///
/// Holds the read lock of the value's shard until dropped.
pub struct Ref<'a, T: ?Sized> {
    key: u32,
    guard: ReadGuard<'a, T>,
}

impl<'a, T: ?Sized> Ref<'a, T> {
    pub(crate) fn new(key: u32, guard: ReadGuard<'a, T>) -> Self {
        Self { key, guard }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn value(&self) -> &T {
        &self.guard
    }

    pub fn pair(&self) -> (u32, &T) {
        (self.key, &self.guard)
    }

    /// Narrows the reference to a part of the value. The shard stays
    /// read-locked.
    pub fn map<F, U: ?Sized>(self, f: F) -> Ref<'a, U>
    where
        F: FnOnce(&T) -> &U,
    {
        Ref {
            key: self.key,
            guard: ReadGuard::map(self.guard, f),
        }
    }

    /// Like [`Ref::map`], handing the reference back when `f` returns `None`.
    pub fn try_map<F, U: ?Sized>(self, f: F) -> Result<Ref<'a, U>, Self>
    where
        F: FnOnce(&T) -> Option<&U>,
    {
        let key = self.key;
        ReadGuard::try_map(self.guard, f)
            .map(|guard| Ref { key, guard })
            .map_err(|guard| Ref { key, guard })
    }
}

impl<T: Debug + ?Sized> Debug for Ref<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("key", &self.key)
            .field("value", &self.value())
            .finish()
    }
}

impl<T: Display + ?Sized> Display for Ref<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self.value(), f)
    }
}

impl<T: ?Sized> Deref for Ref<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}

/// An exclusive reference to a value in a [`ShardedPagedMap`](crate::ShardedPagedMap).
///
/// Holds the write lock of the value's shard until dropped, so the cell
/// cannot be deleted from under it.
pub struct RefMut<'a, T: ?Sized> {
    key: u32,
    guard: WriteGuard<'a, T>,
}

impl<'a, T: ?Sized> RefMut<'a, T> {
    pub(crate) fn new(key: u32, guard: WriteGuard<'a, T>) -> Self {
        Self { key, guard }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn value(&self) -> &T {
        &self.guard
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.guard
    }

    pub fn pair(&self) -> (u32, &T) {
        (self.key, &self.guard)
    }

    pub fn pair_mut(&mut self) -> (u32, &mut T) {
        (self.key, &mut self.guard)
    }

    pub fn map<F, U: ?Sized>(self, f: F) -> RefMut<'a, U>
    where
        F: FnOnce(&mut T) -> &mut U,
    {
        RefMut {
            key: self.key,
            guard: WriteGuard::map(self.guard, f),
        }
    }

    pub fn try_map<F, U: ?Sized>(self, f: F) -> Result<RefMut<'a, U>, Self>
    where
        F: FnOnce(&mut T) -> Option<&mut U>,
    {
        let key = self.key;
        WriteGuard::try_map(self.guard, f)
            .map(|guard| RefMut { key, guard })
            .map_err(|guard| RefMut { key, guard })
    }
}

impl<T: Debug + ?Sized> Debug for RefMut<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefMut")
            .field("key", &self.key)
            .field("value", &self.value())
            .finish()
    }
}

impl<T: ?Sized> Deref for RefMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T: ?Sized> DerefMut for RefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value_mut()
    }
}
