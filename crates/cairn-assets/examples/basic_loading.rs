//! Basic asset loading example demonstrating the asset system.
//!
//! This example shows:
//! - Registering asset types and adding assets with content sources
//! - Lazy loading on first read, with placeholders in the meantime
//! - Driving the registry once per tick
//! - Reloading after the backing file changes
//! - Processing events

use std::io::Write;
use std::time::{Duration, SystemTime};

use cairn_assets::prelude::*;
use cairn_core::profiling;

/// A simple JSON config asset.
#[derive(Debug, Default)]
struct JsonConfig {
    data: serde_json::Value,
}

impl Asset for JsonConfig {
    fn type_name() -> &'static str {
        "JsonConfig"
    }
}

struct JsonFormat;

impl FileFormat for JsonFormat {
    type Asset = JsonConfig;

    fn parse(&self, ctx: &LoadContext<'_>) -> AssetResult<JsonConfig> {
        let data = serde_json::from_slice(ctx.bytes)
            .map_err(|e| AssetError::parse(ctx.origin, format!("JSON parse error: {}", e)))?;
        Ok(JsonConfig { data })
    }
}

/// A simple image asset (just stores dimensions and pixel count).
#[derive(Debug, Default)]
struct SimpleImage {
    width: u32,
    height: u32,
    pixel_count: usize,
}

impl Asset for SimpleImage {
    fn type_name() -> &'static str {
        "SimpleImage"
    }
}

/// Fake image format: width and height as u32 LE, then RGBA pixels.
struct SimpleImageFormat;

impl FileFormat for SimpleImageFormat {
    type Asset = SimpleImage;

    fn parse(&self, ctx: &LoadContext<'_>) -> AssetResult<SimpleImage> {
        let Some((header, pixels)) = ctx.bytes.split_first_chunk::<8>() else {
            return Err(AssetError::parse(ctx.origin, "Image file too small"));
        };
        let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        Ok(SimpleImage {
            width,
            height,
            pixel_count: pixels.len() / 4,
        })
    }
}

/// A single magenta pixel.
const EMBEDDED_IMAGE: &[u8] = &[1, 0, 0, 0, 1, 0, 0, 0, 255, 0, 255, 255];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    cairn_core::logging::init();
    if std::env::var_os("CAIRN_PROFILE").is_some() {
        profiling::init_profiling(profiling::ProfilingBackend::PuffinHttp);
    }

    let temp_dir = tempfile::tempdir()?;
    let assets_path = temp_dir.path();
    println!("Created temp directory: {}", assets_path.display());
    create_test_assets(assets_path)?;

    let mut server = AssetServer::new();
    server.register::<JsonConfig>();
    server.register::<SimpleImage>();
    if let Some(cache) = server.cache_mut::<SimpleImage>() {
        cache.set_size_evaluator(|image| image.pixel_count * 4);
    }

    println!("\n=== Lazy Loading ===\n");

    let config: Handle<JsonConfig> =
        server.add("config", FileSource::new(assets_path.join("config.json"), JsonFormat));
    let sprite: Handle<SimpleImage> = server.add(
        "sprite",
        FileSource::new(assets_path.join("sprite.img"), SimpleImageFormat),
    );
    let embedded: Handle<SimpleImage> = server.add(
        "embedded",
        MemorySource::new("embedded.img", EMBEDDED_IMAGE, SimpleImageFormat),
    );

    // The first read returns the placeholder and queues the load.
    println!("Config before tick: {}", config.read_lock(&server).data);
    println!("Sprite before tick: {:?}", sprite.read_lock(&server));
    server.queue(embedded);
    println!("Pending loads: {}", server.pending_count());

    profiling::new_frame();
    let loaded = server.update();
    println!("Tick loaded {} assets", loaded);

    println!("\nConfig: {}", config.read_lock(&server).data);
    let image = sprite.read_lock(&server);
    println!(
        "Image: {}x{} ({} pixels)",
        image.width, image.height, image.pixel_count
    );
    println!("Embedded: {:?}", embedded.read_lock(&server));
    println!("Image bytes in use: {}", server.allocated_bytes::<SimpleImage>());

    println!("\n=== Hot Reload ===\n");

    let config_path = assets_path.join("config.json");
    std::fs::write(&config_path, br#"{"game_name": "Cairn Demo", "version": "1.1.0"}"#)?;
    // Make sure the change is visible even on filesystems with coarse mtimes.
    std::fs::File::options()
        .write(true)
        .open(&config_path)?
        .set_modified(SystemTime::now() + Duration::from_secs(1))?;

    profiling::new_frame();
    server.update();
    println!("Config after reload: {}", config.read_lock(&server).data);

    println!("\n=== Events ===\n");
    for event in server.drain_events() {
        match event {
            AssetEvent::Loaded { id, version, .. } => {
                println!("'{}' loaded (version {})", id, version);
            }
            AssetEvent::Unloaded { id, .. } => {
                println!("'{}' unloaded, source changed", id);
            }
            AssetEvent::Removed { id, .. } => {
                println!("'{}' removed", id);
            }
            AssetEvent::LoadFailed { id, error, .. } => {
                println!("'{}' failed to load: {}", id, error);
            }
        }
    }

    println!("\n=== Removal ===\n");
    server.remove("sprite");
    println!("Sprite handle still valid: {}", sprite.is_valid(&server));
    println!("Assets left: {}", server.len());

    println!("\n=== Done ===");

    Ok(())
}

fn create_test_assets(path: &std::path::Path) -> std::io::Result<()> {
    let config_path = path.join("config.json");
    let mut config_file = std::fs::File::create(&config_path)?;
    writeln!(
        config_file,
        r#"{{
    "game_name": "Cairn Demo",
    "version": "1.0.0",
    "settings": {{
        "fullscreen": false,
        "vsync": true,
        "volume": 0.8
    }}
}}"#
    )?;
    println!("Created: {}", config_path.display());

    let image_path = path.join("sprite.img");
    let mut image_file = std::fs::File::create(&image_path)?;
    image_file.write_all(&64u32.to_le_bytes())?;
    image_file.write_all(&64u32.to_le_bytes())?;
    let pixels: Vec<u8> = (0..64 * 64 * 4).map(|i| (i % 256) as u8).collect();
    image_file.write_all(&pixels)?;
    println!("Created: {}", image_path.display());

    Ok(())
}
