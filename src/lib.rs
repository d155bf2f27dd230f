//! cogmosaic - Multi-source Cloud Optimized GeoTIFF compositing
//!
//! This library reconciles the internal tile pyramids of several COG
//! rasters into one unified pyramid and composes per-tile pixel buffers
//! from all sources, with radiometric normalization and nodata-driven
//! transparency.
//!
//! # High-Level API
//!
//! Most hosts go through [`engine::MosaicSource`]:
//!
//! ```ignore
//! use cogmosaic::catalog::SourceDescriptor;
//! use cogmosaic::engine::{MosaicOptions, MosaicSource};
//!
//! let sources = vec![
//!     SourceDescriptor::url("https://example.com/red.tif").with_bands(vec![1]),
//!     SourceDescriptor::url("https://example.com/nir.tif").with_bands(vec![1]),
//! ];
//! let mosaic = MosaicSource::configure(sources, fetchers, &reader, MosaicOptions::default()).await;
//!
//! if let Some(view) = mosaic.view() {
//!     let tile = mosaic.load_tile(view.min_zoom, 0, 0).await?;
//! }
//! ```

pub mod catalog;
pub mod compose;
pub mod coord;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod pyramid;
pub mod sample;

pub use catalog::{CatalogReader, SourceDescriptor};
pub use compose::TileBuffer;
pub use coord::TileCoord;
pub use engine::{MosaicOptions, MosaicSource, MosaicState};
pub use fetch::TileFetcher;

/// Version of the cogmosaic library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
