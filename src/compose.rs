//! The pixel compositor.
//!
//! A pure function from one tile's raw per-source payloads to a single
//! normalized, band-interleaved-by-pixel output buffer. Grayscale
//! sources contribute one band, multi-band sources contribute their
//! selected bands with the first three treated as R, G, B for the
//! transparency test. No I/O, no shared state, deterministic.

use crate::catalog::{RasterStats, SourceDescriptor};
use crate::fetch::{FetchError, RawTileSample};
use crate::normalize::{resolve_range, GainBias};
use crate::pyramid::CompositeConfig;
use crate::sample::SampleBuffer;
use thiserror::Error;

/// Tile-scoped composition failures.
///
/// Isolated per tile coordinate; other in-flight and future tile
/// requests are unaffected.
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    /// The underlying fan-out failed; no partial tile is surfaced
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The requested level lies outside the unified pyramid
    #[error("level {level} is outside the unified pyramid ({levels} levels)")]
    LevelOutOfRange { level: usize, levels: usize },

    /// A source has no imagery at the requested level (front padding)
    #[error("no imagery for source {source_index} at pyramid level {level}")]
    LevelUnavailable { source_index: usize, level: usize },

    /// A selected band does not exist in the source's interleave
    #[error("band {band} requested from source {source_index} which interleaves {available} samples per pixel")]
    BandOutOfRange {
        source_index: usize,
        band: usize,
        available: usize,
    },

    /// The decoded payload holds fewer samples than the tile needs
    #[error("source {source_index} delivered {got} samples where {expected} are required")]
    SampleShortfall {
        source_index: usize,
        got: usize,
        expected: usize,
    },

    /// Composition attempted before the engine reached the ready state
    #[error("engine is not configured; tile composition is unavailable")]
    NotConfigured,
}

/// One composed output tile.
///
/// 8-bit when normalization is enabled, raw 32-bit float otherwise.
/// Layout is band-interleaved-by-pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum TileBuffer {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl TileBuffer {
    pub fn len(&self) -> usize {
        match self {
            TileBuffer::U8(data) => data.len(),
            TileBuffer::F32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&mut self, index: usize, value: f64) {
        match self {
            TileBuffer::U8(data) => {
                if let Some(slot) = data.get_mut(index) {
                    *slot = value as u8;
                }
            }
            TileBuffer::F32(data) => {
                if let Some(slot) = data.get_mut(index) {
                    *slot = value as f32;
                }
            }
        }
    }
}

/// Everything the compositor needs to place one source's samples.
#[derive(Debug)]
pub struct SourcePlane<'a> {
    /// The source's descriptor (explicit min/max, nodata override)
    pub descriptor: &'a SourceDescriptor,
    /// Statistics for the level being composed, when present
    pub stats: Option<&'a RasterStats>,
    /// Samples per pixel in the source's native interleave
    pub native_bands: usize,
    /// The raw payload fetched for this tile
    pub sample: RawTileSample,
}

/// Compose one output tile from every source's raw payload.
///
/// `tile_width`/`tile_height` is the source tile size at the composed
/// level; `dest_stride` is the configured block size used to address the
/// destination buffer. Writes outside the buffer are dropped rather than
/// panicking, so degenerate widths degrade instead of aborting.
pub fn compose_tile(
    tile_width: u32,
    tile_height: u32,
    dest_stride: u32,
    config: &CompositeConfig,
    planes: Vec<SourcePlane<'_>>,
) -> Result<TileBuffer, ComposeError> {
    let width = tile_width as usize;
    let height = tile_height as usize;
    let stride = dest_stride as usize;
    let band_count = config.band_count;
    let pixel_count = width * height;
    let data_length = pixel_count * band_count;

    let mut data = if config.normalize {
        TileBuffer::U8(vec![0; data_length])
    } else {
        TileBuffer::F32(vec![0.0; data_length])
    };

    // alpha starts opaque; any transparent source clears it per pixel
    let alpha_band = band_count.saturating_sub(1);
    if config.add_alpha {
        for y in 0..height {
            for x in 0..width {
                data.write((y * stride + x) * band_count + alpha_band, 255.0);
            }
        }
    }

    let mut band_offset = 0;
    for (source_index, plane) in planes.into_iter().enumerate() {
        let selected = &config.selected_bands[source_index];
        let native = plane.native_bands;
        if let Some(&band) = selected.iter().find(|&&band| band >= native) {
            return Err(ComposeError::BandOutOfRange {
                source_index,
                band,
                available: native,
            });
        }

        let buffer = SampleBuffer::decode(
            plane.sample.sample_format,
            plane.sample.bits_per_sample,
            &plane.sample.bytes,
        );
        let expected = pixel_count * native;
        if buffer.len() < expected {
            return Err(ComposeError::SampleShortfall {
                source_index,
                got: buffer.len(),
                expected,
            });
        }

        let (min, max) = resolve_range(plane.descriptor, plane.stats, buffer.kind());
        let stretch = GainBias::from_range(min, max);
        let transparent = if config.normalize {
            stretch.transparent()
        } else {
            0.0
        };

        for y in 0..height {
            for x in 0..width {
                let src_base = (y * width + x) * native;
                let dest_base = (y * stride + x) * band_count + band_offset;

                let mut opaque = false;
                for (slot, &band) in selected.iter().enumerate() {
                    let raw = buffer.get(src_base + band).unwrap_or(0.0);
                    let value = if config.normalize {
                        stretch.apply(raw)
                    } else {
                        raw
                    };
                    data.write(dest_base + slot, value);
                    // first three bands decide transparency (R, G, B)
                    if slot < 3 && value != transparent {
                        opaque = true;
                    }
                }

                if config.add_alpha && !opaque {
                    data.write((y * stride + x) * band_count + alpha_band, 0.0);
                }
            }
        }

        band_offset += selected.len();
    }

    Ok(data)
}
