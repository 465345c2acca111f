//! Cairn Assets
//!
//! Asset registry for the Cairn engine: a large set of named content items
//! (meshes, textures, materials, ...) tracked through cheap generation-checked
//! handles, loaded lazily on first read, cached per type and reloaded when
//! their source changes.
//!
//! # Example
//!
//! ```ignore
//! use cairn_assets::prelude::*;
//!
//! let mut assets = AssetServer::new();
//! assets.register::<Texture>();
//!
//! let texture = assets.add::<Texture>("tex-1", FileSource::new("a.png", PngFormat));
//! assert!(!texture.is_loaded(&assets));
//!
//! // First read returns the placeholder and queues the load.
//! let _ = texture.read_lock(&assets);
//!
//! // Once per tick: reload stale assets, then drain the queue.
//! assets.update();
//! assert!(texture.is_loaded(&assets));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod lock;
pub mod queue;
pub mod record;
pub mod server;
pub mod source;

pub use cache::AssetCache;
pub use config::AssetServerConfig;
pub use error::{AssetError, AssetResult};
pub use event::{AssetEvent, AssetEventBuffer};
pub use handle::{AssetId, AssetType, Handle, UntypedHandle};
pub use lock::WriteLock;
pub use queue::LoadingQueue;
pub use record::{AssetRecord, LoadState, Timestamp, Timestamps};
pub use server::AssetServer;
pub use source::{
    ContentSource, DerivedSource, FileFormat, FileSource, GeneratorSource, LoadContext,
    MemorySource, NullSource,
};

/// A payload type that can be stored in the registry.
///
/// ```ignore
/// #[derive(Default)]
/// struct Texture {
///     width: u32,
///     height: u32,
///     pixels: Vec<u8>,
/// }
///
/// impl Asset for Texture {
///     fn type_name() -> &'static str {
///         "Texture"
///     }
/// }
/// ```
pub trait Asset: 'static {
    /// Human-readable name, used in logs and for name lookups.
    fn type_name() -> &'static str;
}

pub mod prelude {
    pub use crate::{
        Asset, AssetError, AssetEvent, AssetId, AssetResult, AssetServer, AssetServerConfig,
        ContentSource, DerivedSource, FileFormat, FileSource, GeneratorSource, Handle, LoadContext,
        LoadState, MemorySource, NullSource, UntypedHandle,
    };
}
