//! Source descriptors and pyramid catalog access.
//!
//! A catalog is the ordered list of resolution-level image descriptors
//! one raster source exposes, finest level first as stored on disk.
//! Fetching the catalog header is delegated to a [`CatalogReader`]
//! implementation; this module owns the descriptor types and the
//! transport-support rules.

use crate::coord::DEFAULT_BLOCK_SIZE;
use crate::fetch::FetchError;
use std::future::Future;
use thiserror::Error;

/// Errors raised while resolving a source's catalog.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The source is described by a transport mode this engine does not
    /// implement (reserved extension points)
    #[error("unsupported source transport: {0} (only url-backed catalogs are implemented)")]
    UnsupportedSource(&'static str),

    /// The byte-range transport could not reach or parse the catalog header
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// How a source's bytes are reached.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceTransport {
    /// Byte-range requests against a URL
    Url(String),
    /// An in-memory blob (reserved, not implemented)
    Blob,
    /// An explicit list of overview URLs (reserved, not implemented)
    Overviews(Vec<String>),
}

/// Identity and per-source rendering configuration for one raster source.
///
/// Immutable after configuration; supplied once at engine construction.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Where the source's catalog and tiles live
    pub transport: SourceTransport,
    /// Explicit minimum source data value; takes precedence over raster
    /// statistics and type-derived ranges when normalizing
    pub min: Option<f64>,
    /// Explicit maximum source data value
    pub max: Option<f64>,
    /// Nodata override; when set, an alpha band is added to the output
    pub nodata: Option<f64>,
    /// 1-based band numbers to read; all bands when absent
    pub bands: Option<Vec<u32>>,
}

impl SourceDescriptor {
    /// Descriptor for a URL-backed source with default settings.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            transport: SourceTransport::Url(url.into()),
            min: None,
            max: None,
            nodata: None,
            bands: None,
        }
    }

    /// Set the explicit minimum data value.
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Set the explicit maximum data value.
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Override the nodata value from the catalog metadata.
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Select the 1-based bands to read from the source.
    pub fn with_bands(mut self, bands: Vec<u32>) -> Self {
        self.bands = Some(bands);
        self
    }

    /// The source URL, or `UnsupportedSource` for reserved transports.
    pub fn source_url(&self) -> Result<&str, CatalogError> {
        match &self.transport {
            SourceTransport::Url(url) => Ok(url),
            SourceTransport::Blob => Err(CatalogError::UnsupportedSource("blob")),
            SourceTransport::Overviews(_) => Err(CatalogError::UnsupportedSource("overviews")),
        }
    }
}

/// Options applied while reading catalogs.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Explicit catalog header size hint in bytes, when known
    pub header_size: Option<u64>,
    /// Nominal tile byte count hint for range sizing, when known
    pub tile_byte_hint: Option<u64>,
    /// Block size used to normalize untiled layouts and to stride the
    /// composed output buffer
    pub default_block_size: u32,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            header_size: None,
            tile_byte_hint: None,
            default_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// GDAL-style raster statistics carried as strings in the catalog
/// metadata and parsed at normalization time.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStats {
    /// `STATISTICS_MINIMUM` tag value
    pub minimum: String,
    /// `STATISTICS_MAXIMUM` tag value
    pub maximum: String,
}

impl RasterStats {
    pub fn new(minimum: impl Into<String>, maximum: impl Into<String>) -> Self {
        Self {
            minimum: minimum.into(),
            maximum: maximum.into(),
        }
    }

    /// Parsed minimum, or `None` when the tag is not a number.
    pub fn parsed_minimum(&self) -> Option<f64> {
        self.minimum.trim().parse().ok()
    }

    /// Parsed maximum, or `None` when the tag is not a number.
    pub fn parsed_maximum(&self) -> Option<f64> {
        self.maximum.trim().parse().ok()
    }
}

/// One resolution level of one source's pyramid.
///
/// All bands within a level share the same sample format and bit depth.
#[derive(Debug, Clone)]
pub struct ImageLevel {
    /// Bounding box `[min_x, min_y, max_x, max_y]` in map units
    pub bbox: [f64; 4],
    /// Top-left origin `[x, y]` in map units
    pub origin: [f64; 2],
    /// Map units per pixel on each axis; y is negative for north-up rasters
    pub resolutions: [f64; 2],
    /// Internal tile width in pixels
    pub tile_width: u32,
    /// Internal tile height in pixels
    pub tile_height: u32,
    /// Samples per pixel
    pub bands: u32,
    /// Bits per sample, shared across bands
    pub bits_per_sample: u16,
    /// TIFF sample format code (1 = unsigned int, 2 = signed int, 3 = float)
    pub sample_format: u16,
    /// Per-band nodata values from the catalog metadata; empty when none
    pub nodata: Vec<Option<f64>>,
    /// Raster statistics tags, when present
    pub stats: Option<RasterStats>,
    /// True when the level is a transparency-mask subfile rather than imagery
    pub is_mask: bool,
}

/// Async access to a source's catalog header.
///
/// Returns the ordered level list, finest level first as stored.
/// Implementations own the byte-range transport and header parsing.
pub trait CatalogReader: Send + Sync {
    /// Fetch the level descriptors for one source.
    fn fetch_catalog(
        &self,
        source: &SourceDescriptor,
        options: &CatalogOptions,
    ) -> impl Future<Output = Result<Vec<ImageLevel>, CatalogError>> + Send;
}

/// A source's catalog split into imagery and mask levels, both finest
/// first as stored.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    pub imagery: Vec<ImageLevel>,
    pub masks: Vec<ImageLevel>,
}

impl SourceCatalog {
    /// Partition a raw level list into imagery and masks.
    pub fn from_levels(levels: Vec<ImageLevel>) -> Self {
        let (masks, imagery) = levels.into_iter().partition(|level| level.is_mask);
        Self { imagery, masks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let source = SourceDescriptor::url("https://example.com/scene.tif")
            .with_min(100.0)
            .with_max(2047.0)
            .with_bands(vec![4]);

        assert_eq!(source.min, Some(100.0));
        assert_eq!(source.max, Some(2047.0));
        assert_eq!(source.bands.as_deref(), Some(&[4][..]));
        assert_eq!(
            source.source_url().unwrap(),
            "https://example.com/scene.tif"
        );
    }

    #[test]
    fn test_reserved_transports_are_unsupported() {
        let blob = SourceDescriptor {
            transport: SourceTransport::Blob,
            min: None,
            max: None,
            nodata: None,
            bands: None,
        };
        assert!(matches!(
            blob.source_url(),
            Err(CatalogError::UnsupportedSource("blob"))
        ));

        let overviews = SourceDescriptor {
            transport: SourceTransport::Overviews(vec!["a.tif".into()]),
            ..blob
        };
        assert!(matches!(
            overviews.source_url(),
            Err(CatalogError::UnsupportedSource("overviews"))
        ));
    }

    #[test]
    fn test_stats_parse_and_reject_garbage() {
        let stats = RasterStats::new(" 12.5 ", "2047");
        assert_eq!(stats.parsed_minimum(), Some(12.5));
        assert_eq!(stats.parsed_maximum(), Some(2047.0));

        let garbage = RasterStats::new("n/a", "");
        assert_eq!(garbage.parsed_minimum(), None);
        assert_eq!(garbage.parsed_maximum(), None);
    }

    #[test]
    fn test_catalog_partition_splits_masks() {
        let imagery = sample_level(false);
        let mask = sample_level(true);
        let catalog = SourceCatalog::from_levels(vec![imagery, mask]);
        assert_eq!(catalog.imagery.len(), 1);
        assert_eq!(catalog.masks.len(), 1);
    }

    fn sample_level(is_mask: bool) -> ImageLevel {
        ImageLevel {
            bbox: [0.0, 0.0, 256.0, 256.0],
            origin: [0.0, 256.0],
            resolutions: [1.0, -1.0],
            tile_width: 256,
            tile_height: 256,
            bands: 1,
            bits_per_sample: 8,
            sample_format: 1,
            nodata: vec![None],
            stats: None,
            is_mask,
        }
    }
}
