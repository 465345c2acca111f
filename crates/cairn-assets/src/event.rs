//! Asset events for change detection.
//!
//! The registry records what happened during a tick in an
//! [`AssetEventBuffer`]; systems that cache derived data (GPU uploads,
//! material bindings, ...) drain it once per frame.

use crate::handle::{AssetId, AssetType, UntypedHandle};

/// Events emitted by the asset system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetEvent {
    /// A load attempt succeeded and the payload is available.
    Loaded {
        handle: UntypedHandle,
        id: AssetId,
        asset_type: AssetType,
        /// Number of successful loads so far, 1 for the first one.
        version: u32,
    },

    /// The asset went back to unloaded because its source changed.
    Unloaded {
        handle: UntypedHandle,
        id: AssetId,
        asset_type: AssetType,
    },

    /// A load attempt failed.
    LoadFailed {
        handle: UntypedHandle,
        id: AssetId,
        asset_type: AssetType,
        /// Error message.
        error: String,
    },

    /// The asset was removed from the registry.
    ///
    /// The handle no longer resolves; it is kept so listeners can drop
    /// anything they keyed by it.
    Removed {
        handle: UntypedHandle,
        id: AssetId,
        asset_type: AssetType,
    },
}

impl AssetEvent {
    pub fn handle(&self) -> UntypedHandle {
        match self {
            AssetEvent::Loaded { handle, .. }
            | AssetEvent::Unloaded { handle, .. }
            | AssetEvent::LoadFailed { handle, .. }
            | AssetEvent::Removed { handle, .. } => *handle,
        }
    }

    pub fn id(&self) -> &AssetId {
        match self {
            AssetEvent::Loaded { id, .. }
            | AssetEvent::Unloaded { id, .. }
            | AssetEvent::LoadFailed { id, .. }
            | AssetEvent::Removed { id, .. } => id,
        }
    }

    pub fn asset_type(&self) -> AssetType {
        match self {
            AssetEvent::Loaded { asset_type, .. }
            | AssetEvent::Unloaded { asset_type, .. }
            | AssetEvent::LoadFailed { asset_type, .. }
            | AssetEvent::Removed { asset_type, .. } => *asset_type,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, AssetEvent::Loaded { .. })
    }

    pub fn is_unloaded(&self) -> bool {
        matches!(self, AssetEvent::Unloaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AssetEvent::LoadFailed { .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, AssetEvent::Removed { .. })
    }
}

/// A buffer of asset events that can be drained each frame.
#[derive(Debug, Default)]
pub struct AssetEventBuffer {
    events: Vec<AssetEvent>,
}

impl AssetEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: AssetEvent) {
        self.events.push(event);
    }

    /// Drain all events from the buffer.
    pub fn drain(&mut self) -> impl Iterator<Item = AssetEvent> + '_ {
        self.events.drain(..)
    }

    /// Get an iterator over events without draining.
    pub fn iter(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(id: &str) -> AssetEvent {
        AssetEvent::Removed {
            handle: UntypedHandle::invalid(),
            id: AssetId::from(id),
            asset_type: AssetType(2),
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = removed("tex");
        assert!(event.is_removed());
        assert!(!event.is_loaded());
        assert_eq!(event.id().as_str(), "tex");
        assert_eq!(event.asset_type().get(), 2);
        assert_eq!(event.handle(), UntypedHandle::invalid());
    }

    #[test]
    fn test_buffer_drain_empties() {
        let mut buffer = AssetEventBuffer::new();
        buffer.push(removed("a"));
        buffer.push(removed("b"));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.iter().count(), 2);

        let drained: Vec<_> = buffer.drain().collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id().as_str(), "a");
        assert!(buffer.is_empty());
    }
}
