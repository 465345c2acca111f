//! Scoped mutable access to an asset payload.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::Asset;
use crate::handle::Handle;
use crate::record::Timestamp;

/// Mutable access to one payload, obtained from
/// [`AssetServer::write_lock`](crate::AssetServer::write_lock).
///
/// Dropping the lock stamps the asset's "modified" time, whether or not the
/// payload was actually changed through it.
pub struct WriteLock<'a, T: Asset> {
    handle: Handle<T>,
    data: &'a mut T,
    modified: &'a mut Timestamp,
}

impl<'a, T: Asset> WriteLock<'a, T> {
    pub(crate) fn new(handle: Handle<T>, data: &'a mut T, modified: &'a mut Timestamp) -> Self {
        Self {
            handle,
            data,
            modified,
        }
    }

    /// The asset this lock writes to.
    pub fn handle(&self) -> Handle<T> {
        self.handle
    }
}

impl<T: Asset> Deref for WriteLock<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.data
    }
}

impl<T: Asset> DerefMut for WriteLock<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}

impl<T: Asset> Drop for WriteLock<'_, T> {
    fn drop(&mut self) {
        *self.modified = Timestamp::now();
    }
}

impl<T: Asset + fmt::Debug> fmt::Debug for WriteLock<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteLock")
            .field("handle", &self.handle)
            .field("data", &self.data)
            .finish()
    }
}
