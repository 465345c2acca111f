//! Per-type payload storage.
//!
//! Every registered asset type owns one [`AssetCache`]. The cache is plain
//! storage plus accounting; it never loads anything itself. The registry keeps
//! the caches of all types in an [`AssetCaches`] table indexed by
//! [`AssetType`].

use std::any::Any;
use std::fmt;

use cairn_core::alloc::{IndexSlot, SparseSet};

use crate::Asset;
use crate::handle::{AssetType, Handle};

type SizeEvaluator<T> = Box<dyn Fn(&T) -> usize>;

/// Typed pool of asset payloads.
pub struct AssetCache<T: Asset> {
    pool: SparseSet<T>,
    factory: Box<dyn Fn() -> T>,
    builtin: T,
    placeholder: Option<(Handle<T>, IndexSlot)>,
    size_of: Option<SizeEvaluator<T>>,
}

impl<T: Asset> AssetCache<T> {
    /// Create a cache whose reserved slots and built-in placeholder come
    /// from `factory`.
    pub fn new(factory: impl Fn() -> T + 'static) -> Self {
        let builtin = factory();
        Self {
            pool: SparseSet::new(),
            factory: Box::new(factory),
            builtin,
            placeholder: None,
            size_of: None,
        }
    }

    /// Reserve a slot holding a freshly constructed payload.
    pub fn reserve(&mut self) -> IndexSlot {
        let value = (self.factory)();
        self.pool.push(value)
    }

    /// Free a slot and return its payload.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not live.
    pub fn release(&mut self, slot: IndexSlot) -> T {
        if self.placeholder.is_some_and(|(_, data)| data == slot) {
            self.clear_placeholder();
        }
        self.pool.remove(slot)
    }

    /// # Panics
    ///
    /// Panics if the slot is not live.
    pub fn get(&self, slot: IndexSlot) -> &T {
        self.pool.get(slot)
    }

    /// # Panics
    ///
    /// Panics if the slot is not live.
    pub fn get_mut(&mut self, slot: IndexSlot) -> &mut T {
        self.pool.get_mut(slot)
    }

    pub fn try_get(&self, slot: IndexSlot) -> Option<&T> {
        self.pool.try_get(slot)
    }

    /// Number of live payloads.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pool.iter()
    }

    /// Install the function used by [`allocated_bytes`](Self::allocated_bytes).
    pub fn set_size_evaluator(&mut self, size_of: impl Fn(&T) -> usize + 'static) {
        self.size_of = Some(Box::new(size_of));
    }

    pub fn has_size_evaluator(&self) -> bool {
        self.size_of.is_some()
    }

    /// Sum of the size evaluator over every live payload.
    ///
    /// Returns 0 and logs a warning when no evaluator was installed.
    pub fn allocated_bytes(&self) -> usize {
        let Some(size_of) = &self.size_of else {
            tracing::warn!(
                "No size evaluator set for {}, reporting 0 bytes",
                T::type_name()
            );
            return 0;
        };
        self.pool.iter().map(|value| size_of(value)).sum()
    }

    pub(crate) fn set_placeholder(&mut self, handle: Handle<T>, slot: IndexSlot) {
        self.placeholder = Some((handle, slot));
    }

    /// Go back to the built-in placeholder.
    pub fn clear_placeholder(&mut self) {
        self.placeholder = None;
    }

    /// The asset configured as placeholder, if any.
    pub fn placeholder_handle(&self) -> Option<Handle<T>> {
        self.placeholder.map(|(handle, _)| handle)
    }

    /// The configured placeholder's payload, or the built-in one.
    ///
    /// The registry decides whether the placeholder asset is still loaded;
    /// this only checks that its slot is live.
    pub fn placeholder(&self) -> &T {
        self.placeholder
            .and_then(|(_, slot)| self.pool.try_get(slot))
            .unwrap_or(&self.builtin)
    }

    /// The payload returned while no placeholder is configured.
    pub fn builtin_placeholder(&self) -> &T {
        &self.builtin
    }
}

impl<T: Asset> fmt::Debug for AssetCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("type", &T::type_name())
            .field("len", &self.pool.len())
            .field("placeholder", &self.placeholder_handle())
            .field("size_evaluator", &self.size_of.is_some())
            .finish()
    }
}

/// Type-erased view of an [`AssetCache`], used where the registry only
/// knows an [`AssetType`].
pub(crate) trait ErasedCache {
    fn reserve(&mut self) -> IndexSlot;
    fn release(&mut self, slot: IndexSlot);
    fn len(&self) -> usize;
    fn allocated_bytes(&self) -> usize;
    fn has_size_evaluator(&self) -> bool;
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Asset> ErasedCache for AssetCache<T> {
    fn reserve(&mut self) -> IndexSlot {
        AssetCache::reserve(self)
    }

    fn release(&mut self, slot: IndexSlot) {
        AssetCache::release(self, slot);
    }

    fn len(&self) -> usize {
        AssetCache::len(self)
    }

    fn allocated_bytes(&self) -> usize {
        AssetCache::allocated_bytes(self)
    }

    fn has_size_evaluator(&self) -> bool {
        AssetCache::has_size_evaluator(self)
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Caches of all registered types, indexed by [`AssetType`].
#[derive(Default)]
pub(crate) struct AssetCaches {
    caches: Vec<Box<dyn ErasedCache>>,
}

impl AssetCaches {
    /// Append a cache and return the tag it is stored under.
    pub(crate) fn push<T: Asset>(&mut self, cache: AssetCache<T>) -> AssetType {
        let asset_type = AssetType(self.caches.len() as u32);
        self.caches.push(Box::new(cache));
        asset_type
    }

    pub(crate) fn get(&self, asset_type: AssetType) -> &dyn ErasedCache {
        self.caches[asset_type.index()].as_ref()
    }

    pub(crate) fn get_mut(&mut self, asset_type: AssetType) -> &mut dyn ErasedCache {
        self.caches[asset_type.index()].as_mut()
    }

    pub(crate) fn typed<T: Asset>(&self, asset_type: AssetType) -> Option<&AssetCache<T>> {
        self.caches
            .get(asset_type.index())?
            .as_any()
            .downcast_ref::<AssetCache<T>>()
    }

    pub(crate) fn typed_mut<T: Asset>(
        &mut self,
        asset_type: AssetType,
    ) -> Option<&mut AssetCache<T>> {
        self.caches
            .get_mut(asset_type.index())?
            .as_any_mut()
            .downcast_mut::<AssetCache<T>>()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn ErasedCache> {
        self.caches.iter().map(|cache| cache.as_ref())
    }
}
