//! Asset handles - lightweight, non-owning references to assets.
//!
//! A handle is a lookup key into the [`AssetServer`] that issued it: the
//! server's identity plus a generation-checked slot in its record pool. It
//! owns nothing, so it can be copied freely; once the asset is removed the
//! slot generation moves on and every outstanding handle reports itself as
//! invalid.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use cairn_core::alloc::IndexSlot;

use crate::Asset;
use crate::lock::WriteLock;
use crate::record::LoadState;
use crate::server::AssetServer;

/// Integer tag identifying a registered payload type.
///
/// Tags are handed out in registration order, starting at zero. They are
/// stable for the lifetime of one registry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetType(pub(crate) u32);

impl AssetType {
    /// The raw tag value.
    pub fn get(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Externally stable, registry-unique asset key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&AssetId> for AssetId {
    fn from(value: &AssetId) -> Self {
        value.clone()
    }
}

/// Process-unique identity of an [`AssetServer`].
///
/// Zero is never issued, so handles built with it are never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ServerId(u32);

impl ServerId {
    pub(crate) const NONE: ServerId = ServerId(0);

    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A handle that can reference an asset of any type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UntypedHandle {
    pub(crate) server: ServerId,
    pub(crate) slot: Option<IndexSlot>,
}

impl Default for UntypedHandle {
    fn default() -> Self {
        Self::invalid()
    }
}

impl UntypedHandle {
    /// A handle that never resolves.
    pub const fn invalid() -> Self {
        Self {
            server: ServerId::NONE,
            slot: None,
        }
    }

    pub(crate) fn new(server: ServerId, slot: IndexSlot) -> Self {
        Self {
            server,
            slot: Some(slot),
        }
    }

    /// The record slot this handle points at, if any.
    pub fn slot(&self) -> Option<IndexSlot> {
        self.slot
    }

    /// Returns `true` if the handle still resolves to a live asset in `server`.
    pub fn is_valid(&self, server: &AssetServer) -> bool {
        server.is_valid(*self)
    }

    /// Returns `true` if the handle is valid and the asset is loaded.
    pub fn is_loaded(&self, server: &AssetServer) -> bool {
        server.is_loaded(*self)
    }

    pub fn state(&self, server: &AssetServer) -> Option<LoadState> {
        server.state(*self)
    }

    /// Narrow to a typed handle, returning `None` if the asset stores a
    /// different payload type or the handle is invalid.
    pub fn typed<T: Asset>(self, server: &AssetServer) -> Option<Handle<T>> {
        let expected = server.asset_type::<T>()?;
        let record = server.record(self)?;
        (record.asset_type() == expected).then(|| Handle::new(self))
    }
}

impl<T: Asset> From<Handle<T>> for UntypedHandle {
    fn from(handle: Handle<T>) -> Self {
        handle.untyped
    }
}

impl<T: Asset> From<&Handle<T>> for UntypedHandle {
    fn from(handle: &Handle<T>) -> Self {
        handle.untyped
    }
}

/// A typed handle to an asset.
///
/// Typed handles are what consumer code normally holds. They are only handed
/// out by the registry (`add`, `find`, `narrow`) after the asset's type tag has
/// been checked against `T`.
pub struct Handle<T: Asset> {
    pub(crate) untyped: UntypedHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Asset> Handle<T> {
    pub(crate) fn new(untyped: UntypedHandle) -> Self {
        Self {
            untyped,
            _marker: PhantomData,
        }
    }

    /// A handle that never resolves.
    pub fn invalid() -> Self {
        Self::new(UntypedHandle::invalid())
    }

    /// Convert to an untyped handle.
    pub fn untyped(self) -> UntypedHandle {
        self.untyped
    }

    pub fn slot(&self) -> Option<IndexSlot> {
        self.untyped.slot
    }

    /// Get the type name of the asset.
    pub fn type_name(&self) -> &'static str {
        T::type_name()
    }

    pub fn is_valid(&self, server: &AssetServer) -> bool {
        server.is_valid(self.untyped)
    }

    pub fn is_loaded(&self, server: &AssetServer) -> bool {
        server.is_loaded(self.untyped)
    }

    pub fn state(&self, server: &AssetServer) -> Option<LoadState> {
        server.state(self.untyped)
    }

    /// Read the payload, queueing a load if the asset is still unloaded.
    ///
    /// See [`AssetServer::read_lock`].
    pub fn read_lock<'a>(&self, server: &'a AssetServer) -> &'a T {
        server.read_lock(*self)
    }

    /// Acquire scoped mutable access to the payload.
    ///
    /// See [`AssetServer::write_lock`].
    pub fn write_lock<'a>(&self, server: &'a mut AssetServer) -> WriteLock<'a, T> {
        server.write_lock(*self)
    }

    /// The asset's unique id, if the handle is still valid.
    pub fn unique_id<'a>(&self, server: &'a AssetServer) -> Option<&'a AssetId> {
        server.record(self.untyped).map(|record| record.unique_id())
    }

    /// The asset's display name, if the handle is still valid.
    pub fn name<'a>(&self, server: &'a AssetServer) -> Option<&'a str> {
        server.record(self.untyped).map(|record| record.name())
    }
}

impl<T: Asset> Default for Handle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T: Asset> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Handle");
        s.field("type", &T::type_name());
        match self.untyped.slot {
            Some(slot) => s
                .field("index", &slot.index())
                .field("generation", &slot.generation()),
            None => s.field("index", &"invalid"),
        };
        s.finish()
    }
}

impl<T: Asset> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Asset> Copy for Handle<T> {}

impl<T: Asset> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.untyped == other.untyped
    }
}

impl<T: Asset> Eq for Handle<T> {}

impl<T: Asset> PartialEq<UntypedHandle> for Handle<T> {
    fn eq(&self, other: &UntypedHandle) -> bool {
        self.untyped == *other
    }
}

impl<T: Asset> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.untyped.hash(state);
    }
}
