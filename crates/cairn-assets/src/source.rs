//! Content sources - where asset payloads come from.
//!
//! Every asset record owns exactly one [`ContentSource`]. The registry calls
//! [`construct`](ContentSource::construct) when the asset is dequeued and
//! compares [`last_modified`](ContentSource::last_modified) against the
//! asset's own timestamps to decide when a reload is due.
//!
//! A [`DerivedSource`] builds one asset out of another and reports the
//! upstream asset's last change as its own, so editing the upstream file
//! reloads the upstream first and the derived asset on the following tick.

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Asset;
use crate::error::{AssetError, AssetResult};
use crate::handle::{AssetId, Handle, UntypedHandle};
use crate::record::Timestamp;
use crate::server::AssetServer;

/// Populates an asset payload from some backing medium.
///
/// Implementations write the payload through
/// [`AssetServer::write_lock`]; the slot is already reserved when
/// `construct` runs. Returning `Err` puts the asset into the error state,
/// and `construct` must be safe to call again afterwards.
pub trait ContentSource: 'static {
    fn construct(&mut self, assets: &mut AssetServer, handle: UntypedHandle) -> AssetResult<()>;

    /// When the backing data last changed. Must never decrease.
    ///
    /// The registry is passed in so sources backed by other assets can
    /// report their upstream's timestamps.
    fn last_modified(&self, assets: &AssetServer) -> Timestamp;

    /// Short description for logs, e.g. the file path.
    fn describe(&self) -> String;
}

/// Source for assets created at runtime; construct does nothing and the
/// data never goes stale.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSource;

impl ContentSource for NullSource {
    fn construct(&mut self, _assets: &mut AssetServer, _handle: UntypedHandle) -> AssetResult<()> {
        Ok(())
    }

    fn last_modified(&self, _assets: &AssetServer) -> Timestamp {
        Timestamp::ZERO
    }

    fn describe(&self) -> String {
        "null".to_string()
    }
}

/// Builds a payload from a closure, typically out of other assets.
///
/// ```ignore
/// let source = GeneratorSource::new(|assets: &AssetServer| {
///     let base = assets.find::<Mesh>("meshes/quad");
///     Ok(Mesh::scaled(assets.read_only_data(base), 2.0))
/// });
/// ```
pub struct GeneratorSource<T, G> {
    generator: G,
    _marker: PhantomData<fn() -> T>,
}

impl<T, G> GeneratorSource<T, G>
where
    T: Asset,
    G: FnMut(&AssetServer) -> AssetResult<T> + 'static,
{
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            _marker: PhantomData,
        }
    }
}

impl<T, G> ContentSource for GeneratorSource<T, G>
where
    T: Asset,
    G: FnMut(&AssetServer) -> AssetResult<T> + 'static,
{
    fn construct(&mut self, assets: &mut AssetServer, handle: UntypedHandle) -> AssetResult<()> {
        let handle = assets.try_narrow::<T>(handle)?;
        let value = (self.generator)(&*assets)?;
        *assets.write_lock(handle) = value;
        Ok(())
    }

    fn last_modified(&self, _assets: &AssetServer) -> Timestamp {
        Timestamp::ZERO
    }

    fn describe(&self) -> String {
        format!("generator<{}>", T::type_name())
    }
}

/// Builds an asset from another asset, e.g. a GPU texture from a decoded
/// image or a renderable from a mesh.
///
/// The upstream is read with [`AssetServer::read_lock`], so an unloaded
/// upstream is queued and the builder sees its placeholder. The source
/// reports the upstream's "modified" time as its own, which makes the
/// derived asset stale whenever the upstream is reloaded or written.
///
/// ```ignore
/// let image = assets.add::<Image>("images/stone", FileSource::new("stone.png", PngFormat));
/// let texture = assets.add::<Texture>(
///     "textures/stone",
///     DerivedSource::new(image, |image: &Image, _: &AssetServer| Ok(Texture::upload(image))),
/// );
/// ```
pub struct DerivedSource<T, S: Asset, B> {
    upstream: Handle<S>,
    build: B,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S, B> DerivedSource<T, S, B>
where
    T: Asset,
    S: Asset,
    B: FnMut(&S, &AssetServer) -> AssetResult<T> + 'static,
{
    pub fn new(upstream: Handle<S>, build: B) -> Self {
        Self {
            upstream,
            build,
            _marker: PhantomData,
        }
    }

    pub fn upstream(&self) -> Handle<S> {
        self.upstream
    }
}

impl<T, S, B> ContentSource for DerivedSource<T, S, B>
where
    T: Asset,
    S: Asset,
    B: FnMut(&S, &AssetServer) -> AssetResult<T> + 'static,
{
    fn construct(&mut self, assets: &mut AssetServer, handle: UntypedHandle) -> AssetResult<()> {
        let handle = assets.try_narrow::<T>(handle)?;
        let upstream = assets.try_narrow::<S>(self.upstream.untyped())?;
        let value = {
            let assets = &*assets;
            (self.build)(assets.read_lock(upstream), assets)?
        };
        *assets.write_lock(handle) = value;
        Ok(())
    }

    /// The upstream's "modified" time, or zero once it was removed.
    fn last_modified(&self, assets: &AssetServer) -> Timestamp {
        assets
            .record(self.upstream)
            .map(|record| record.timestamps().modified)
            .unwrap_or(Timestamp::ZERO)
    }

    fn describe(&self) -> String {
        format!("derived<{}>:{:?}", T::type_name(), self.upstream)
    }
}

/// Context provided to a [`FileFormat`] while parsing.
pub struct LoadContext<'a> {
    /// Read-only view of the registry, for formats that reference other assets.
    pub assets: &'a AssetServer,
    /// Id of the asset being loaded.
    pub id: &'a AssetId,
    /// Where the bytes came from, for error messages.
    pub origin: &'a str,
    /// The raw bytes of the asset.
    pub bytes: &'a [u8],
}

impl LoadContext<'_> {
    /// The bytes as UTF-8 text.
    pub fn text(&self) -> AssetResult<&str> {
        std::str::from_utf8(self.bytes).map_err(|e| AssetError::parse(self.origin, e))
    }
}

/// Decodes one asset type from bytes.
///
/// # Example
///
/// ```ignore
/// struct ShaderFormat;
///
/// impl FileFormat for ShaderFormat {
///     type Asset = Shader;
///
///     fn parse(&self, ctx: &LoadContext<'_>) -> AssetResult<Shader> {
///         Ok(Shader { source: ctx.text()?.to_string() })
///     }
/// }
/// ```
pub trait FileFormat: 'static {
    type Asset: Asset;

    fn parse(&self, ctx: &LoadContext<'_>) -> AssetResult<Self::Asset>;
}

fn parse_into<F: FileFormat>(
    format: &F,
    assets: &mut AssetServer,
    handle: UntypedHandle,
    origin: &str,
    bytes: &[u8],
) -> AssetResult<()> {
    let value = {
        let Some(record) = assets.record(handle) else {
            return Err(AssetError::InvalidHandle {
                reason: format!("'{}' was removed while loading", origin),
            });
        };
        let ctx = LoadContext {
            assets: &*assets,
            id: record.unique_id(),
            origin,
            bytes,
        };
        format.parse(&ctx)?
    };
    let handle = assets.try_narrow::<F::Asset>(handle)?;
    *assets.write_lock(handle) = value;
    Ok(())
}

/// Loads an asset from a file on disk.
///
/// The file's modification time is the source timestamp, so touching the
/// file makes the asset stale and it is reloaded on the next tick.
pub struct FileSource<F> {
    path: PathBuf,
    format: F,
}

impl<F: FileFormat> FileSource<F> {
    pub fn new(path: impl Into<PathBuf>, format: F) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> AssetResult<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    path: self.path.display().to_string(),
                }
            } else {
                AssetError::Io {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })
    }
}

impl<F: FileFormat> ContentSource for FileSource<F> {
    fn construct(&mut self, assets: &mut AssetServer, handle: UntypedHandle) -> AssetResult<()> {
        let bytes = self.read()?;
        let origin = self.path.display().to_string();
        parse_into(&self.format, assets, handle, &origin, &bytes)
    }

    /// The file's mtime, or zero while it cannot be read.
    fn last_modified(&self, _assets: &AssetServer) -> Timestamp {
        std::fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .map(Timestamp::from_system_time)
            .unwrap_or(Timestamp::ZERO)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

impl<F> fmt::Debug for FileSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSource").field("path", &self.path).finish()
    }
}

/// Parses an asset from bytes already in memory, e.g. embedded with
/// `include_bytes!`.
pub struct MemorySource<F> {
    label: String,
    bytes: Arc<[u8]>,
    format: F,
    modified: Timestamp,
}

impl<F: FileFormat> MemorySource<F> {
    /// The source never goes stale unless given a timestamp with
    /// [`with_timestamp`](Self::with_timestamp).
    pub fn new(label: impl Into<String>, bytes: impl Into<Arc<[u8]>>, format: F) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
            format,
            modified: Timestamp::ZERO,
        }
    }

    pub fn with_timestamp(mut self, modified: Timestamp) -> Self {
        self.modified = modified;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<F: FileFormat> ContentSource for MemorySource<F> {
    fn construct(&mut self, assets: &mut AssetServer, handle: UntypedHandle) -> AssetResult<()> {
        parse_into(&self.format, assets, handle, &self.label, &self.bytes)
    }

    fn last_modified(&self, _assets: &AssetServer) -> Timestamp {
        self.modified
    }

    fn describe(&self) -> String {
        format!("memory:{} ({} bytes)", self.label, self.bytes.len())
    }
}
