//! Raw tile access traits and the per-tile fetch fan-out.
//!
//! The engine never talks to the network itself. Byte-range transports
//! implement [`TileFetcher`] (one per source), and
//! [`fetch_tile_inputs`] fans out one data request per source plus one
//! mask request per source that carries a mask pyramid, joining on a
//! single barrier. Any rejection fails the whole tile; partial data is
//! never surfaced.

use crate::coord::TileCoord;
use bytes::Bytes;
use futures::future::{try_join, try_join_all};
use std::future::Future;
use thiserror::Error;

/// Errors raised by the underlying byte-range transport.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// A raw tile request failed
    #[error("tile request failed at level {level} ({x}, {y}): {message}")]
    Tile {
        level: usize,
        x: u32,
        y: u32,
        message: String,
    },

    /// A catalog header could not be reached or parsed
    #[error("catalog request failed: {0}")]
    Catalog(String),

    /// Transport-level failure outside a specific request
    #[error("transport error: {0}")]
    Transport(String),
}

/// One source's undecoded tile payload for a single tile coordinate.
///
/// Owned for the duration of one compose call and discarded afterwards.
#[derive(Debug, Clone)]
pub struct RawTileSample {
    /// Raw little-endian sample bytes, band-interleaved-by-pixel
    pub bytes: Bytes,
    /// TIFF sample format code (1 = unsigned int, 2 = signed int, 3 = float)
    pub sample_format: u16,
    /// Bits per sample (8, 16, 32 or 64)
    pub bits_per_sample: u16,
}

/// Async access to one source's raw tile and mask data.
///
/// `level` is the source's own pyramid level index, 0 = coarsest. The
/// engine maps unified pyramid levels onto source levels before calling.
/// Implementations must be thread-safe; tile requests for different
/// coordinates may run with unbounded concurrency.
pub trait TileFetcher: Send + Sync {
    /// Fetch the raw tile bytes at the given level and tile indices.
    fn fetch_raw_tile(
        &self,
        level: usize,
        x: u32,
        y: u32,
    ) -> impl Future<Output = Result<RawTileSample, FetchError>> + Send;

    /// Fetch the mask tile bytes at the given level and tile indices.
    ///
    /// Returns `None` when the source has no mask data for the tile.
    /// Only called for levels where the catalog recorded a mask image.
    fn fetch_mask_tile(
        &self,
        level: usize,
        x: u32,
        y: u32,
    ) -> impl Future<Output = Result<Option<Bytes>, FetchError>> + Send;
}

/// One source's slot in a tile fan-out.
///
/// Shorter pyramids are front-padded in the unified tables, so the
/// level a source is addressed at differs from the unified level; the
/// engine resolves the mapping before fanning out.
#[derive(Debug, Clone, Copy)]
pub struct SourceRequest {
    /// The source's own pyramid level index, 0 = coarsest
    pub level: usize,
    /// Whether the catalog recorded a mask image at that level
    pub has_mask: bool,
}

/// The fan-in result of one tile's fetch fan-out, ordered by source.
#[derive(Debug)]
pub struct TileInputs {
    /// One decoded-later payload per source
    pub samples: Vec<RawTileSample>,
    /// One optional mask payload per source
    pub masks: Vec<Option<Bytes>>,
}

/// Fan out data and mask fetches for one tile coordinate across all
/// sources and join them on a single barrier.
///
/// `coord` carries the shared column and row; each source is addressed
/// at its own level from `requests[i]`. Absent masks resolve
/// immediately without touching the transport. The first rejection
/// fails the whole call.
pub async fn fetch_tile_inputs<F: TileFetcher>(
    fetchers: &[F],
    requests: &[SourceRequest],
    coord: TileCoord,
) -> Result<TileInputs, FetchError> {
    debug_assert_eq!(fetchers.len(), requests.len());

    let calls = fetchers.iter().zip(requests).map(|(fetcher, request)| {
        let data = fetcher.fetch_raw_tile(request.level, coord.x, coord.y);
        let mask = async move {
            if request.has_mask {
                fetcher.fetch_mask_tile(request.level, coord.x, coord.y).await
            } else {
                Ok(None)
            }
        };
        try_join(data, mask)
    });

    let settled = try_join_all(calls).await?;

    let mut samples = Vec::with_capacity(settled.len());
    let mut masks = Vec::with_capacity(settled.len());
    for (sample, mask) in settled {
        samples.push(sample);
        masks.push(mask);
    }

    Ok(TileInputs { samples, masks })
}
