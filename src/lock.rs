pub type RawRwLock = parking_lot::RawRwLock;
pub type RwLock<T> = lock_api::RwLock<RawRwLock, T>;

pub(crate) type ReadGuard<'a, T> = lock_api::MappedRwLockReadGuard<'a, RawRwLock, T>;
pub(crate) type WriteGuard<'a, T> = lock_api::MappedRwLockWriteGuard<'a, RawRwLock, T>;
