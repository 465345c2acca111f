//! Per-asset bookkeeping: load state machine and timestamps.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cairn_core::alloc::IndexSlot;

use crate::error::AssetError;
use crate::handle::{AssetId, AssetType};
use crate::server::AssetServer;
use crate::source::ContentSource;

/// Where an asset is in the loading pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// Registered but never loaded, or unloaded after its source changed.
    #[default]
    Unloaded,

    /// Sitting in the loading queue.
    WaitingForLoading,

    /// The content source is constructing the payload.
    Loading,

    /// The payload is available.
    Loaded,

    /// The last load attempt failed.
    Error,
}

impl LoadState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    /// Returns true if loading has completed (successfully or not).
    pub fn is_done(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Error)
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// Loaded and Error only lead back to Unloaded.
    pub fn can_transition_to(&self, next: LoadState) -> bool {
        use LoadState::*;
        matches!(
            (*self, next),
            (Unloaded, WaitingForLoading)
                | (WaitingForLoading, Loading)
                | (Loading, Loaded)
                | (Loading, Error)
                | (Loaded, Unloaded)
                | (Error, Unloaded)
        )
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Unloaded => "unloaded",
            LoadState::WaitingForLoading => "waiting for loading",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Wall-clock time in milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Used by sources that never change.
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Times before the epoch clamp to [`Timestamp::ZERO`].
    pub fn from_system_time(time: SystemTime) -> Self {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Snapshot of a record's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamps {
    /// Last time a load attempt finished, successful or not.
    pub constructed: Timestamp,
    /// Last time the payload was written through a write lock.
    pub modified: Timestamp,
    /// Last time the payload was read.
    pub used: Timestamp,
}

/// Metadata the registry keeps for every asset.
pub struct AssetRecord {
    asset_type: AssetType,
    type_name: &'static str,
    unique_id: AssetId,
    name: String,
    state: Cell<LoadState>,
    pub(crate) data: Option<IndexSlot>,
    // Taken out while the source constructs the payload.
    pub(crate) source: Option<Box<dyn ContentSource>>,
    pub(crate) constructed: Timestamp,
    pub(crate) modified: Timestamp,
    used: Cell<Timestamp>,
    pub(crate) last_error: Option<Arc<AssetError>>,
    pub(crate) version: u32,
}

impl AssetRecord {
    pub(crate) fn new(
        asset_type: AssetType,
        type_name: &'static str,
        unique_id: AssetId,
        source: Box<dyn ContentSource>,
    ) -> Self {
        Self {
            asset_type,
            type_name,
            name: unique_id.to_string(),
            unique_id,
            state: Cell::new(LoadState::Unloaded),
            data: None,
            source: Some(source),
            constructed: Timestamp::ZERO,
            modified: Timestamp::ZERO,
            used: Cell::new(Timestamp::ZERO),
            last_error: None,
            version: 0,
        }
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn unique_id(&self) -> &AssetId {
        &self.unique_id
    }

    /// Display name, the unique id unless renamed.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.get().is_loaded()
    }

    /// Slot of the payload in the type's cache, reserved on the first load attempt.
    pub fn data_slot(&self) -> Option<IndexSlot> {
        self.data
    }

    pub fn source(&self) -> Option<&dyn ContentSource> {
        self.source.as_deref()
    }

    pub fn timestamps(&self) -> Timestamps {
        Timestamps {
            constructed: self.constructed,
            modified: self.modified,
            used: self.used.get(),
        }
    }

    /// The error of the most recent failed load, cleared on success.
    pub fn last_error(&self) -> Option<&AssetError> {
        self.last_error.as_deref()
    }

    /// Number of successful loads.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns `false` once the source reports a change newer than the payload.
    pub fn is_up_to_date(&self, assets: &AssetServer) -> bool {
        match &self.source {
            Some(source) => source.last_modified(assets) <= self.modified,
            None => true,
        }
    }

    /// # Panics
    ///
    /// Panics if `next` equals the current state, and in debug builds if
    /// `next` is not reachable from the current state.
    pub(crate) fn switch_to_state(&self, next: LoadState) {
        let current = self.state.get();
        assert_ne!(
            current, next,
            "asset '{}' is already {}",
            self.unique_id, current
        );
        debug_assert!(
            current.can_transition_to(next),
            "asset '{}' cannot go from {} to {}",
            self.unique_id,
            current,
            next
        );
        self.state.set(next);
    }

    pub(crate) fn touch_used(&self) {
        self.used.set(Timestamp::now());
    }
}

impl fmt::Debug for AssetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRecord")
            .field("type", &self.type_name)
            .field("id", &self.unique_id)
            .field("name", &self.name)
            .field("state", &self.state.get())
            .field("data", &self.data)
            .field("source", &self.source.as_ref().map(|source| source.describe()))
            .field("timestamps", &self.timestamps())
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::NullSource;

    struct ChangedAt(Timestamp);

    impl ContentSource for ChangedAt {
        fn construct(
            &mut self,
            _assets: &mut crate::AssetServer,
            _handle: crate::UntypedHandle,
        ) -> crate::AssetResult<()> {
            Ok(())
        }

        fn last_modified(&self, _assets: &AssetServer) -> Timestamp {
            self.0
        }

        fn describe(&self) -> String {
            "changed-at".into()
        }
    }

    fn record(source: impl ContentSource) -> AssetRecord {
        AssetRecord::new(AssetType(0), "Test", AssetId::from("a"), Box::new(source))
    }

    #[test]
    fn test_new_record_is_unloaded_without_slot() {
        let record = record(NullSource);
        assert_eq!(record.state(), LoadState::Unloaded);
        assert_eq!(record.data_slot(), None);
        assert_eq!(record.name(), "a");
        assert_eq!(record.timestamps(), Timestamps::default());
    }

    #[test]
    fn test_forward_transitions() {
        let record = record(NullSource);
        record.switch_to_state(LoadState::WaitingForLoading);
        record.switch_to_state(LoadState::Loading);
        record.switch_to_state(LoadState::Loaded);
        record.switch_to_state(LoadState::Unloaded);
        assert_eq!(record.state(), LoadState::Unloaded);
    }

    #[test]
    #[should_panic(expected = "already")]
    fn test_same_state_transition_panics() {
        let record = record(NullSource);
        record.switch_to_state(LoadState::Unloaded);
    }

    #[test]
    fn test_transition_table() {
        use LoadState::*;
        assert!(Unloaded.can_transition_to(WaitingForLoading));
        assert!(Loading.can_transition_to(Error));
        assert!(Error.can_transition_to(Unloaded));
        assert!(!Unloaded.can_transition_to(Loaded));
        assert!(!Loaded.can_transition_to(Loading));
        assert!(!Error.can_transition_to(Loaded));
    }

    #[test]
    fn test_up_to_date_compares_source_against_modified() {
        let assets = AssetServer::new();
        let mut record = record(ChangedAt(Timestamp::from_millis(100)));
        assert!(!record.is_up_to_date(&assets));

        record.modified = Timestamp::from_millis(100);
        assert!(record.is_up_to_date(&assets));

        record.modified = Timestamp::from_millis(150);
        assert!(record.is_up_to_date(&assets));
    }

    #[test]
    fn test_timestamp_from_system_time() {
        let time = UNIX_EPOCH + std::time::Duration::from_millis(1500);
        assert_eq!(Timestamp::from_system_time(time).as_millis(), 1500);
        assert!(Timestamp::now() > Timestamp::ZERO);
    }
}
