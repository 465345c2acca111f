//! Asset server - the registry that owns every asset and drives loading.

use std::any::TypeId;
use std::cell::RefCell;
use std::sync::Arc;

use cairn_core::alloc::{HashMap, IndexSlot, SparseSet};
use cairn_core::profiling::profile_function;

use crate::Asset;
use crate::cache::{AssetCache, AssetCaches};
use crate::config::AssetServerConfig;
use crate::error::{AssetError, AssetResult};
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::handle::{AssetId, AssetType, Handle, ServerId, UntypedHandle};
use crate::lock::WriteLock;
use crate::queue::LoadingQueue;
use crate::record::{AssetRecord, LoadState, Timestamp};
use crate::source::ContentSource;

/// The asset registry.
///
/// Owns one [`AssetCache`] per registered type, the record of every asset
/// and the loading queue. Assets are loaded lazily: reading an unloaded
/// asset queues it, and [`update`](Self::update) (called once per tick)
/// reloads stale assets and drains the queue.
///
/// # Example
///
/// ```ignore
/// let mut assets = AssetServer::new();
/// assets.register::<Texture>();
///
/// let texture = assets.add::<Texture>("tex-1", FileSource::new("a.png", PngFormat));
/// let placeholder = texture.read_lock(&assets); // queues the load
///
/// assets.update();
/// assert!(texture.is_loaded(&assets));
/// ```
pub struct AssetServer {
    id: ServerId,
    config: AssetServerConfig,
    records: SparseSet<AssetRecord>,
    index_by_id: HashMap<AssetId, IndexSlot>,
    types: HashMap<TypeId, AssetType>,
    caches: AssetCaches,
    queue: RefCell<LoadingQueue>,
    events: AssetEventBuffer,
}

impl Default for AssetServer {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetServer {
    pub fn new() -> Self {
        Self::with_config(AssetServerConfig::default())
    }

    pub fn with_config(config: AssetServerConfig) -> Self {
        Self {
            id: ServerId::next(),
            config,
            records: SparseSet::new(),
            index_by_id: HashMap::default(),
            types: HashMap::default(),
            caches: AssetCaches::default(),
            queue: RefCell::new(LoadingQueue::new()),
            events: AssetEventBuffer::new(),
        }
    }

    pub fn config(&self) -> &AssetServerConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------

    /// Register `T`, using `T::default()` for fresh slots and as the
    /// built-in placeholder.
    pub fn register<T: Asset + Default>(&mut self) -> AssetType {
        self.register_with::<T>(T::default)
    }

    /// Register `T` with an explicit payload factory, for types whose
    /// `Default` would not make a sensible placeholder.
    ///
    /// Registering a type twice returns the existing tag.
    pub fn register_with<T: Asset>(&mut self, factory: impl Fn() -> T + 'static) -> AssetType {
        if let Some(existing) = self.asset_type::<T>() {
            tracing::warn!("Asset type {} is already registered", T::type_name());
            return existing;
        }

        let asset_type = self.caches.push(AssetCache::new(factory));
        self.types.insert(TypeId::of::<T>(), asset_type);
        tracing::debug!("Registered asset type {} as {}", T::type_name(), asset_type);
        asset_type
    }

    pub fn asset_type<T: Asset>(&self) -> Option<AssetType> {
        self.types.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a registered type by its [`Asset::type_name`].
    pub fn type_from_name(&self, name: &str) -> Option<AssetType> {
        self.caches
            .iter()
            .position(|cache| cache.type_name() == name)
            .map(|idx| AssetType(idx as u32))
    }

    pub fn asset_type_name(&self, asset_type: AssetType) -> Option<&'static str> {
        self.caches
            .iter()
            .nth(asset_type.index())
            .map(|cache| cache.type_name())
    }

    pub fn cache<T: Asset>(&self) -> Option<&AssetCache<T>> {
        self.caches.typed::<T>(self.asset_type::<T>()?)
    }

    pub fn cache_mut<T: Asset>(&mut self) -> Option<&mut AssetCache<T>> {
        let asset_type = self.asset_type::<T>()?;
        self.caches.typed_mut::<T>(asset_type)
    }

    fn typed_cache<T: Asset>(&self, asset_type: AssetType) -> &AssetCache<T> {
        match self.caches.typed::<T>(asset_type) {
            Some(cache) => cache,
            None => panic!("asset type {} does not store {}", asset_type, T::type_name()),
        }
    }

    // ---------------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------------

    /// Register an asset under `id`. It starts unloaded.
    pub fn try_add<T: Asset>(
        &mut self,
        id: impl Into<AssetId>,
        source: impl ContentSource,
    ) -> AssetResult<Handle<T>> {
        let asset_type = self.asset_type::<T>().ok_or(AssetError::UnregisteredType {
            type_name: T::type_name(),
        })?;
        self.add_untyped(asset_type, id, Box::new(source))
            .map(Handle::new)
    }

    /// Like [`try_add`](Self::try_add), but logs the error and returns an
    /// invalid handle instead.
    pub fn add<T: Asset>(&mut self, id: impl Into<AssetId>, source: impl ContentSource) -> Handle<T> {
        match self.try_add::<T>(id, source) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to add asset: {}", e);
                Handle::invalid()
            }
        }
    }

    pub fn add_untyped(
        &mut self,
        asset_type: AssetType,
        id: impl Into<AssetId>,
        source: Box<dyn ContentSource>,
    ) -> AssetResult<UntypedHandle> {
        let id = id.into();
        let Some(type_name) = self.asset_type_name(asset_type) else {
            return Err(AssetError::UnregisteredType {
                type_name: "<unknown>",
            });
        };
        if self.index_by_id.contains_key(&id) {
            return Err(AssetError::DuplicateId { id: id.to_string() });
        }

        tracing::debug!("Adding {} '{}' from {}", type_name, id, source.describe());
        let record = AssetRecord::new(asset_type, type_name, id.clone(), source);
        let slot = self.records.push(record);
        self.index_by_id.insert(id, slot);
        Ok(UntypedHandle::new(self.id, slot))
    }

    /// Handle of the asset registered under `id`.
    ///
    /// Returns an invalid handle if there is no such asset or it stores a
    /// different type.
    pub fn find<T: Asset>(&self, id: &str) -> Handle<T> {
        let handle = self.find_untyped(id);
        match handle.typed::<T>(self) {
            Some(typed) => typed,
            None => {
                if self.is_valid(handle) {
                    tracing::warn!("Asset '{}' is not a {}", id, T::type_name());
                }
                Handle::invalid()
            }
        }
    }

    pub fn find_untyped(&self, id: &str) -> UntypedHandle {
        self.index_by_id
            .get(id)
            .map(|slot| UntypedHandle::new(self.id, *slot))
            .unwrap_or_default()
    }

    /// Remove the asset registered under `id` and free its payload.
    ///
    /// Outstanding handles become invalid; a pending load is skipped when
    /// it is dequeued. Returns `false` if there was no such asset.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.index_by_id.remove(id) else {
            return false;
        };

        let record = self.records.remove(slot);
        if let Some(data) = record.data {
            self.caches.get_mut(record.asset_type()).release(data);
        }

        tracing::debug!("Removed {} '{}'", record.type_name(), id);
        self.events.push(AssetEvent::Removed {
            handle: UntypedHandle::new(self.id, slot),
            id: record.unique_id().clone(),
            asset_type: record.asset_type(),
        });
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    /// Number of registered assets.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn slot_of(&self, handle: UntypedHandle) -> Option<IndexSlot> {
        let slot = handle.slot.filter(|_| handle.server == self.id)?;
        self.records.contains(slot).then_some(slot)
    }

    pub fn is_valid(&self, handle: impl Into<UntypedHandle>) -> bool {
        self.slot_of(handle.into()).is_some()
    }

    pub fn is_loaded(&self, handle: impl Into<UntypedHandle>) -> bool {
        self.record(handle).is_some_and(|record| record.is_loaded())
    }

    /// Load state, or `None` for an invalid handle.
    pub fn state(&self, handle: impl Into<UntypedHandle>) -> Option<LoadState> {
        self.record(handle).map(|record| record.state())
    }

    pub fn record(&self, handle: impl Into<UntypedHandle>) -> Option<&AssetRecord> {
        let slot = self.slot_of(handle.into())?;
        self.records.try_get(slot)
    }

    pub fn source(&self, handle: impl Into<UntypedHandle>) -> Option<&dyn ContentSource> {
        self.record(handle)?.source()
    }

    pub fn set_name(
        &mut self,
        handle: impl Into<UntypedHandle>,
        name: impl Into<String>,
    ) -> AssetResult<()> {
        let handle = handle.into();
        let Some(slot) = self.slot_of(handle) else {
            return Err(AssetError::InvalidHandle {
                reason: format!("cannot rename {:?}", handle),
            });
        };
        self.records.get_mut(slot).set_name(name.into());
        Ok(())
    }

    /// All live asset handles, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = UntypedHandle> + '_ {
        self.records
            .iter_with_slots()
            .map(|(slot, _)| UntypedHandle::new(self.id, slot))
    }

    /// All live assets with their records, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (UntypedHandle, &AssetRecord)> {
        self.records
            .iter_with_slots()
            .map(|(slot, record)| (UntypedHandle::new(self.id, slot), record))
    }

    /// Reinterpret an untyped handle as a `Handle<T>`.
    ///
    /// The type tag is only checked in debug builds; use
    /// [`UntypedHandle::typed`] for a checked conversion.
    pub fn narrow<T: Asset>(&self, handle: UntypedHandle) -> Handle<T> {
        debug_assert!(
            self.record(handle)
                .is_none_or(|record| Some(record.asset_type()) == self.asset_type::<T>()),
            "asset {:?} is not a {}",
            handle,
            T::type_name()
        );
        Handle::new(handle)
    }

    /// Checked version of [`narrow`](Self::narrow), for sources that write a
    /// payload type they were not registered with.
    pub fn try_narrow<T: Asset>(&self, handle: UntypedHandle) -> AssetResult<Handle<T>> {
        let Some(record) = self.record(handle) else {
            return Err(AssetError::InvalidHandle {
                reason: format!("{:?} does not refer to a live asset", handle),
            });
        };
        match self.asset_type::<T>() {
            Some(asset_type) if asset_type == record.asset_type() => Ok(Handle::new(handle)),
            _ => Err(AssetError::TypeMismatch {
                expected: T::type_name(),
                actual: record.type_name(),
            }),
        }
    }

    // ---------------------------------------------------------------------
    // Data access
    // ---------------------------------------------------------------------

    fn expect_record<T: Asset>(&self, handle: Handle<T>) -> &AssetRecord {
        let Some(record) = self.record(handle) else {
            panic!("invalid {} handle {:?}", T::type_name(), handle);
        };
        record
    }

    fn data_or_placeholder<T: Asset>(&self, record: &AssetRecord) -> &T {
        match record.data {
            Some(data) if record.is_loaded() => self.typed_cache::<T>(record.asset_type()).get(data),
            _ => self.placeholder::<T>(),
        }
    }

    /// Read an asset's payload.
    ///
    /// An unloaded asset is queued for loading as a side effect. Until it is
    /// loaded the type's placeholder is returned. Stamps the asset's "used"
    /// time.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid.
    pub fn read_lock<T: Asset>(&self, handle: Handle<T>) -> &T {
        let record = self.expect_record(handle);
        if record.state() == LoadState::Unloaded {
            self.enqueue(handle.untyped, record);
        }
        record.touch_used();
        self.data_or_placeholder(record)
    }

    /// Read an asset's payload (or placeholder) without queueing a load or
    /// touching its timestamps.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid.
    pub fn read_only_data<T: Asset>(&self, handle: Handle<T>) -> &T {
        let record = self.expect_record(handle);
        self.data_or_placeholder(record)
    }

    /// Mutable access to an asset's payload. The "modified" time is stamped
    /// when the returned lock is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid or the asset was never loaded, so
    /// there is no payload slot to write to.
    pub fn write_lock<T: Asset>(&mut self, handle: Handle<T>) -> WriteLock<'_, T> {
        let Some(slot) = self.slot_of(handle.untyped) else {
            panic!("invalid {} handle {:?}", T::type_name(), handle);
        };
        let record = self.records.get_mut(slot);
        let Some(data) = record.data else {
            panic!("asset '{}' has no payload slot yet", record.unique_id());
        };
        let Some(cache) = self.caches.typed_mut::<T>(record.asset_type()) else {
            panic!("asset '{}' is not a {}", record.unique_id(), T::type_name());
        };
        WriteLock::new(handle, cache.get_mut(data), &mut record.modified)
    }

    // ---------------------------------------------------------------------
    // Placeholders and accounting
    // ---------------------------------------------------------------------

    /// Use a loaded asset as the placeholder for its type.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid or the asset is not loaded.
    pub fn set_placeholder<T: Asset>(&mut self, handle: Handle<T>) {
        let record = self.expect_record(handle);
        assert!(
            record.is_loaded(),
            "placeholder '{}' must be loaded",
            record.unique_id()
        );
        let asset_type = record.asset_type();
        let Some(data) = record.data else {
            panic!("loaded asset '{}' has no payload", record.unique_id());
        };
        if let Some(cache) = self.caches.typed_mut::<T>(asset_type) {
            cache.set_placeholder(handle, data);
        }
    }

    /// The payload shown for unloaded `T` assets: the configured placeholder
    /// while it is loaded, otherwise the built-in one.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn placeholder<T: Asset>(&self) -> &T {
        let Some(cache) = self.cache::<T>() else {
            panic!("asset type {} is not registered", T::type_name());
        };
        match cache.placeholder_handle() {
            Some(handle) if self.is_loaded(handle) => cache.placeholder(),
            _ => cache.builtin_placeholder(),
        }
    }

    /// Bytes used by all `T` payloads, as reported by the cache's size
    /// evaluator.
    pub fn allocated_bytes<T: Asset>(&self) -> usize {
        match self.cache::<T>() {
            Some(cache) => cache.allocated_bytes(),
            None => {
                tracing::error!("Asset type {} is not registered", T::type_name());
                0
            }
        }
    }

    /// Bytes used by the payloads of every type that has a size evaluator.
    pub fn total_bytes_used(&self) -> usize {
        self.caches
            .iter()
            .filter(|cache| cache.has_size_evaluator())
            .map(|cache| cache.allocated_bytes())
            .sum()
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Queue an unloaded asset for loading on the next [`update`](Self::update).
    ///
    /// Returns `false` if the handle is invalid or the asset is not unloaded
    /// (already queued, loading, loaded or failed). Returns `true` whenever
    /// the asset became pending, even if an earlier entry is reused.
    pub fn queue(&self, handle: impl Into<UntypedHandle>) -> bool {
        let handle = handle.into();
        match self.record(handle) {
            Some(record) if record.state() == LoadState::Unloaded => self.enqueue(handle, record),
            _ => false,
        }
    }

    fn enqueue(&self, handle: UntypedHandle, record: &AssetRecord) -> bool {
        record.switch_to_state(LoadState::WaitingForLoading);
        if self.queue.borrow_mut().push(handle) {
            tracing::debug!("Queued '{}' for loading", record.unique_id());
        } else {
            tracing::trace!("'{}' keeps its earlier queue entry", record.unique_id());
        }
        true
    }

    /// Number of queue entries, including entries for removed or already
    /// loaded assets that will be skipped.
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_queued(&self, handle: impl Into<UntypedHandle>) -> bool {
        self.queue.borrow().contains(handle.into())
    }

    /// Run one tick: reload assets whose source changed, then drain the
    /// loading queue up to [`AssetServerConfig::max_loads_per_tick`].
    ///
    /// Returns the number of load attempts made. Entries for removed assets,
    /// or for assets that were force-loaded while queued, are skipped and do
    /// not count against the budget.
    pub fn update(&mut self) -> usize {
        profile_function!();

        let stale: Vec<IndexSlot> = {
            let assets = &*self;
            assets
                .records
                .iter_with_slots()
                .filter(|(_, record)| record.state().is_done() && !record.is_up_to_date(assets))
                .map(|(slot, _)| slot)
                .collect()
        };
        for slot in stale {
            tracing::debug!(
                "'{}' changed on disk, reloading",
                self.records.get(slot).unique_id()
            );
            let handle = UntypedHandle::new(self.id, slot);
            self.unload(slot);
            self.queue(handle);
        }

        let budget = self.config.max_loads_per_tick();
        let mut attempts = 0;
        while attempts < budget {
            let Some(handle) = self.queue.get_mut().pop_front() else {
                break;
            };
            match self.state(handle) {
                Some(LoadState::WaitingForLoading) => {}
                Some(state) => {
                    tracing::trace!("Skipping {:?}, already {}", handle, state);
                    continue;
                }
                None => {
                    tracing::trace!("Skipping removed asset {:?}", handle);
                    continue;
                }
            }
            self.load_to_cache(handle);
            attempts += 1;
        }

        if attempts > 0 {
            tracing::trace!(
                "Asset tick: {} loads, {} pending",
                attempts,
                self.queue.get_mut().len()
            );
        }
        attempts
    }

    /// Load an asset immediately instead of waiting for the queue.
    ///
    /// A failed asset is given another attempt. Returns `true` if the asset
    /// is loaded, or was already loading or loaded.
    pub fn force_load(&mut self, handle: impl Into<UntypedHandle>) -> bool {
        let handle = handle.into();
        let Some(record) = self.record(handle) else {
            return false;
        };
        if record.state() == LoadState::Error {
            tracing::debug!("Retrying failed asset '{}'", record.unique_id());
            record.switch_to_state(LoadState::Unloaded);
        }
        self.load_to_cache(handle)
    }

    /// Move a loaded or failed asset back to unloaded. The payload slot is
    /// kept and reused by the next load.
    ///
    /// Returns `false` if the handle is invalid or the asset is not loaded
    /// or failed.
    pub fn force_unload(&mut self, handle: impl Into<UntypedHandle>) -> bool {
        match self.slot_of(handle.into()) {
            Some(slot) if self.records.get(slot).state().is_done() => {
                self.unload(slot);
                true
            }
            _ => false,
        }
    }

    fn unload(&mut self, slot: IndexSlot) {
        let record = self.records.get(slot);
        let was_loaded = record.is_loaded();
        record.switch_to_state(LoadState::Unloaded);
        if was_loaded {
            self.events.push(AssetEvent::Unloaded {
                handle: UntypedHandle::new(self.id, slot),
                id: record.unique_id().clone(),
                asset_type: record.asset_type(),
            });
        }
    }

    fn load_to_cache(&mut self, handle: UntypedHandle) -> bool {
        profile_function!();

        let Some(slot) = self.slot_of(handle) else {
            return false;
        };
        let record = self.records.get(slot);
        if record.state() == LoadState::Unloaded {
            tracing::warn!("Force-loading '{}' outside the loading queue", record.unique_id());
            record.switch_to_state(LoadState::WaitingForLoading);
        }
        if record.state() != LoadState::WaitingForLoading {
            return true;
        }
        record.switch_to_state(LoadState::Loading);

        let asset_type = record.asset_type();
        let record = self.records.get_mut(slot);
        if record.data.is_none() {
            record.data = Some(self.caches.get_mut(asset_type).reserve());
        }
        let Some(mut source) = record.source.take() else {
            tracing::error!("Asset '{}' has no content source", record.unique_id());
            return false;
        };

        let result = source.construct(self, handle);

        // The source may have removed the asset it was constructing.
        if !self.records.contains(slot) {
            tracing::debug!("Asset {:?} was removed while loading", handle);
            return false;
        }
        let source_modified = source.last_modified(self);
        let record = self.records.get_mut(slot);
        record.source = Some(source);
        record.constructed = Timestamp::now();
        // Covers file times ahead of the local clock, so the asset is not
        // judged stale again right after loading.
        record.modified = record.modified.max(source_modified);

        match result {
            Ok(()) => {
                record.switch_to_state(LoadState::Loaded);
                record.last_error = None;
                record.version += 1;
                tracing::debug!("Loaded {} '{}'", record.type_name(), record.unique_id());
                self.events.push(AssetEvent::Loaded {
                    handle,
                    id: record.unique_id().clone(),
                    asset_type,
                    version: record.version,
                });
                true
            }
            Err(e) => {
                record.switch_to_state(LoadState::Error);
                tracing::error!(
                    "Failed to load {} '{}' from {}: {}",
                    record.type_name(),
                    record.unique_id(),
                    record.source().map(|s| s.describe()).unwrap_or_default(),
                    e
                );
                self.events.push(AssetEvent::LoadFailed {
                    handle,
                    id: record.unique_id().clone(),
                    asset_type,
                    error: e.to_string(),
                });
                record.last_error = Some(Arc::new(e));
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Drain all pending asset events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = AssetEvent> + '_ {
        self.events.drain()
    }

    /// Iterate over pending events without draining.
    pub fn iter_events(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::NullSource;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    struct Texture {
        width: u32,
        height: u32,
    }

    impl Default for Texture {
        fn default() -> Self {
            Self {
                width: 1,
                height: 1,
            }
        }
    }

    impl Asset for Texture {
        fn type_name() -> &'static str {
            "Texture"
        }
    }

    #[derive(Debug, Default)]
    struct Material;

    impl Asset for Material {
        fn type_name() -> &'static str {
            "Material"
        }
    }

    /// Writes a fixed texture; fails while `fail` is set. Its timestamp is
    /// shared with the test so it can simulate edits.
    struct TestSource {
        size: u32,
        fail: Rc<Cell<bool>>,
        modified: Rc<Cell<Timestamp>>,
        calls: Rc<Cell<u32>>,
    }

    impl ContentSource for TestSource {
        fn construct(&mut self, assets: &mut AssetServer, handle: UntypedHandle) -> AssetResult<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(AssetError::parse("test", "broken"));
            }
            let handle = assets.narrow::<Texture>(handle);
            let mut texture = assets.write_lock(handle);
            texture.width = self.size;
            texture.height = self.size;
            Ok(())
        }

        fn last_modified(&self, _assets: &AssetServer) -> Timestamp {
            self.modified.get()
        }

        fn describe(&self) -> String {
            "test".into()
        }
    }

    struct Probe {
        fail: Rc<Cell<bool>>,
        modified: Rc<Cell<Timestamp>>,
        calls: Rc<Cell<u32>>,
    }

    fn source(size: u32) -> (TestSource, Probe) {
        let probe = Probe {
            fail: Rc::new(Cell::new(false)),
            modified: Rc::new(Cell::new(Timestamp::ZERO)),
            calls: Rc::new(Cell::new(0)),
        };
        let source = TestSource {
            size,
            fail: Rc::clone(&probe.fail),
            modified: Rc::clone(&probe.modified),
            calls: Rc::clone(&probe.calls),
        };
        (source, probe)
    }

    fn server() -> AssetServer {
        let mut server = AssetServer::new();
        server.register::<Texture>();
        server.register::<Material>();
        server
    }

    #[test]
    fn test_types_are_tagged_in_registration_order() {
        let mut server = server();
        assert_eq!(server.asset_type::<Texture>(), Some(AssetType(0)));
        assert_eq!(server.asset_type::<Material>(), Some(AssetType(1)));
        assert_eq!(server.register::<Texture>(), AssetType(0));
        assert_eq!(server.type_from_name("Material"), Some(AssetType(1)));
        assert_eq!(server.asset_type_name(AssetType(0)), Some("Texture"));
        assert_eq!(server.asset_type_name(AssetType(9)), None);
    }

    #[test]
    fn test_add_unregistered_type_returns_invalid_handle() {
        #[derive(Default)]
        struct Audio;
        impl Asset for Audio {
            fn type_name() -> &'static str {
                "Audio"
            }
        }

        let mut server = server();
        let handle = server.add::<Audio>("click", NullSource);
        assert!(!handle.is_valid(&server));
        assert!(matches!(
            server.try_add::<Audio>("click", NullSource),
            Err(AssetError::UnregisteredType { type_name: "Audio" })
        ));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut server = server();
        let first = server.add::<Texture>("tex", NullSource);
        let err = server.try_add::<Texture>("tex", NullSource).unwrap_err();

        assert!(matches!(err, AssetError::DuplicateId { .. }));
        assert!(first.is_valid(&server));
        assert_eq!(server.len(), 1);
    }

    #[test]
    fn test_find_checks_type() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", NullSource);

        assert_eq!(server.find::<Texture>("tex"), tex);
        assert!(!server.find::<Material>("tex").is_valid(&server));
        assert!(!server.find::<Texture>("nope").is_valid(&server));
    }

    #[test]
    fn test_read_lock_queues_once_and_returns_placeholder() {
        let mut server = server();
        let (source, probe) = source(64);
        let tex = server.add::<Texture>("tex", source);

        assert_eq!(server.read_lock(tex), &Texture::default());
        assert_eq!(server.read_lock(tex), &Texture::default());
        assert_eq!(server.pending_count(), 1);
        assert_eq!(tex.state(&server), Some(LoadState::WaitingForLoading));
        assert!(server.record(tex).is_some_and(|r| r.timestamps().used > Timestamp::ZERO));

        assert_eq!(server.update(), 1);
        assert_eq!(probe.calls.get(), 1);
        assert_eq!(server.read_lock(tex).width, 64);
        assert_eq!(server.pending_count(), 0);
    }

    #[test]
    fn test_queue_only_accepts_unloaded() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", source(2).0);

        assert!(server.queue(tex));
        assert!(!server.queue(tex));
        assert!(server.is_queued(tex));
        assert_eq!(server.pending_count(), 1);

        server.update();
        assert!(!server.queue(tex));
        assert!(!server.queue(UntypedHandle::invalid()));
    }

    #[test]
    fn test_failed_load_is_not_retried_automatically() {
        let mut server = server();
        let (source, probe) = source(8);
        probe.fail.set(true);
        let tex = server.add::<Texture>("tex", source);

        server.queue(tex);
        server.update();
        server.update();

        assert_eq!(tex.state(&server), Some(LoadState::Error));
        assert_eq!(probe.calls.get(), 1);
        assert!(server.record(tex).is_some_and(|r| r.last_error().is_some()));
        assert_eq!(server.read_lock(tex), &Texture::default());
        assert_eq!(server.pending_count(), 0);

        probe.fail.set(false);
        assert!(server.force_load(tex));
        assert_eq!(tex.state(&server), Some(LoadState::Loaded));
        assert!(server.record(tex).is_some_and(|r| r.last_error().is_none()));
    }

    #[test]
    fn test_stale_asset_reloads_on_update() {
        let mut server = server();
        let (source, probe) = source(16);
        let tex = server.add::<Texture>("tex", source);
        server.force_load(tex);
        server.drain_events().for_each(drop);

        let modified = server.record(tex).map(|r| r.timestamps().modified);
        probe.modified.set(Timestamp::from_millis(u64::MAX / 2));

        assert_eq!(server.update(), 1);
        assert_eq!(probe.calls.get(), 2);
        assert_eq!(tex.state(&server), Some(LoadState::Loaded));
        assert!(server.record(tex).map(|r| r.timestamps().modified) > modified);
        assert_eq!(server.record(tex).map(|r| r.version()), Some(2));

        let events: Vec<_> = server.drain_events().collect();
        assert!(events[0].is_unloaded());
        assert!(events[1].is_loaded());

        // Up to date now, so the next tick does nothing.
        assert_eq!(server.update(), 0);
    }

    #[test]
    fn test_stale_failed_asset_gets_another_attempt() {
        let mut server = server();
        let (source, probe) = source(4);
        probe.fail.set(true);
        let tex = server.add::<Texture>("tex", source);
        server.force_load(tex);
        assert_eq!(tex.state(&server), Some(LoadState::Error));

        probe.fail.set(false);
        probe.modified.set(Timestamp::now());
        server.update();

        assert_eq!(tex.state(&server), Some(LoadState::Loaded));
        assert_eq!(server.read_lock(tex).width, 4);
    }

    #[test]
    fn test_update_respects_load_budget() {
        let mut server =
            AssetServer::with_config(AssetServerConfig::new().with_max_loads_per_tick(2));
        server.register::<Texture>();

        let handles: Vec<_> = (0..5)
            .map(|i| server.add::<Texture>(format!("tex-{}", i), source(i).0))
            .collect();
        for handle in &handles {
            server.queue(*handle);
        }

        assert_eq!(server.update(), 2);
        assert_eq!(server.pending_count(), 3);
        assert!(handles[0].is_loaded(&server));
        assert!(handles[1].is_loaded(&server));
        assert!(!handles[2].is_loaded(&server));

        server.update();
        server.update();
        assert!(handles.iter().all(|h| h.is_loaded(&server)));
    }

    #[test]
    fn test_force_loaded_entry_does_not_use_budget() {
        let mut server =
            AssetServer::with_config(AssetServerConfig::new().with_max_loads_per_tick(1));
        server.register::<Texture>();
        let (source_a, probe_a) = source(1);
        let a = server.add::<Texture>("a", source_a);
        let b = server.add::<Texture>("b", source(2).0);
        server.queue(a);
        server.queue(b);

        assert!(server.force_load(a));
        assert_eq!(server.update(), 1);

        assert!(b.is_loaded(&server));
        assert_eq!(probe_a.calls.get(), 1);
        assert_eq!(server.pending_count(), 0);
    }

    #[test]
    fn test_requeue_reuses_leftover_entry() {
        let mut server = server();
        let (source, probe) = source(4);
        let tex = server.add::<Texture>("tex", source);
        server.queue(tex);
        server.force_load(tex);
        server.force_unload(tex);

        // The entry from the first queue call is still there.
        assert!(server.queue(tex));
        assert_eq!(tex.state(&server), Some(LoadState::WaitingForLoading));
        assert_eq!(server.pending_count(), 1);

        assert_eq!(server.update(), 1);
        assert!(tex.is_loaded(&server));
        assert_eq!(probe.calls.get(), 2);
    }

    #[test]
    fn test_try_narrow_checks_type() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", NullSource);

        assert_eq!(server.try_narrow::<Texture>(tex.untyped()).ok(), Some(tex));
        assert!(matches!(
            server.try_narrow::<Material>(tex.untyped()),
            Err(AssetError::TypeMismatch {
                expected: "Material",
                actual: "Texture"
            })
        ));

        server.remove("tex");
        assert!(matches!(
            server.try_narrow::<Texture>(tex.untyped()),
            Err(AssetError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn test_removed_asset_is_skipped_in_queue() {
        let mut server = server();
        let (source, probe) = source(1);
        let tex = server.add::<Texture>("tex", source);
        server.queue(tex);

        assert!(server.remove("tex"));
        assert_eq!(server.update(), 0);
        assert_eq!(probe.calls.get(), 0);
        assert!(!tex.is_valid(&server));
    }

    #[test]
    fn test_remove_releases_payload_and_invalidates_handles() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", source(3).0);
        server.force_load(tex);
        assert_eq!(server.cache::<Texture>().map(|c| c.len()), Some(1));

        assert!(server.remove("tex"));
        assert!(!server.remove("tex"));
        assert!(!tex.is_valid(&server));
        assert!(!server.find::<Texture>("tex").is_valid(&server));
        assert_eq!(server.cache::<Texture>().map(|c| c.len()), Some(0));
        assert!(server.iter_events().any(|e| e.is_removed()));

        // The slot is reused with a new generation.
        let again = server.add::<Texture>("tex", NullSource);
        assert_eq!(again.slot().map(|s| s.index()), tex.slot().map(|s| s.index()));
        assert_ne!(again, tex);
    }

    #[test]
    fn test_write_lock_stamps_modified() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", NullSource);
        server.force_load(tex);
        let before = server.record(tex).map(|r| r.timestamps().modified);

        std::thread::sleep(std::time::Duration::from_millis(5));
        drop(server.write_lock(tex));

        assert!(server.record(tex).map(|r| r.timestamps().modified) > before);
    }

    #[test]
    #[should_panic(expected = "no payload slot")]
    fn test_write_lock_before_first_load_panics() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", NullSource);
        let _lock = server.write_lock(tex);
    }

    #[test]
    fn test_placeholder_follows_configured_asset() {
        let mut server = server();
        let checker = server.add::<Texture>("checker", source(8).0);
        server.force_load(checker);
        server.set_placeholder(checker);

        let pending = server.add::<Texture>("pending", source(128).0);
        assert_eq!(server.read_lock(pending).width, 8);

        // An unloaded placeholder falls back to the built-in one.
        server.force_unload(checker);
        assert_eq!(server.read_lock(pending), &Texture::default());
    }

    #[test]
    #[should_panic(expected = "must be loaded")]
    fn test_placeholder_must_be_loaded() {
        let mut server = server();
        let checker = server.add::<Texture>("checker", NullSource);
        server.set_placeholder(checker);
    }

    #[test]
    fn test_allocated_bytes() {
        let mut server = server();
        if let Some(cache) = server.cache_mut::<Texture>() {
            cache.set_size_evaluator(|t| (t.width * t.height * 4) as usize);
        }
        let a = server.add::<Texture>("a", source(2).0);
        let b = server.add::<Texture>("b", source(4).0);
        server.force_load(a);
        server.force_load(b);

        assert_eq!(server.allocated_bytes::<Texture>(), 16 + 64);
        assert_eq!(server.allocated_bytes::<Material>(), 0);
        assert_eq!(server.total_bytes_used(), 80);
    }

    #[test]
    fn test_force_unload_only_from_done_states() {
        let mut server = server();
        let tex = server.add::<Texture>("tex", NullSource);
        assert!(!server.force_unload(tex));

        server.force_load(tex);
        assert!(server.force_unload(tex));
        assert_eq!(tex.state(&server), Some(LoadState::Unloaded));
        assert!(server.record(tex).is_some_and(|r| r.data_slot().is_some()));
    }

    #[test]
    fn test_set_name_and_handles() {
        let mut server = server();
        let a = server.add::<Texture>("a", NullSource);
        let b = server.add::<Material>("b", NullSource);

        server.set_name(a, "Albedo").expect("valid handle");
        assert_eq!(a.name(&server), Some("Albedo"));
        assert!(server.set_name(UntypedHandle::invalid(), "x").is_err());

        let all: Vec<_> = server.handles().collect();
        assert_eq!(all, vec![a.untyped(), b.untyped()]);
    }
}
