//! The alignment reconciler.
//!
//! Runs once, after all catalogs have resolved. Pure and deterministic:
//! no I/O, no shared state. The first source establishes the baseline
//! origin and resolution ladder; every later source is validated against
//! it under the tolerances below.

use super::{AlignmentError, UnifiedPyramid};
use crate::catalog::{CatalogOptions, ImageLevel, SourceCatalog};
use crate::coord::{Extent, RenderSize, Size};
use tracing::debug;

/// Relative tolerance for comparing scaled resolution ladders.
pub const RESOLUTION_TOLERANCE: f64 = 0.02;

/// Relative tolerance for comparing render tile sizes.
pub const RENDER_TILE_SIZE_TOLERANCE: f64 = 0.01;

/// `|expected - got| > tol * expected`; exactly-at-tolerance passes.
fn relative_mismatch(expected: f64, got: f64, tolerance: f64) -> bool {
    (expected - got).abs() > tolerance * expected
}

struct Baseline {
    extent: Extent,
    origin: [f64; 2],
    resolutions: Vec<f64>,
    render_tile_sizes: Vec<RenderSize>,
    source_tile_sizes: Vec<Size>,
    min_zoom: usize,
}

/// Per-source geometry derived from the catalog, coarsest level first.
struct SourceGeometry {
    extent: Extent,
    origin: [f64; 2],
    resolutions: Vec<f64>,
    render_tile_sizes: Vec<RenderSize>,
    source_tile_sizes: Vec<Size>,
}

impl SourceGeometry {
    fn from_catalog(
        source_index: usize,
        catalog: &SourceCatalog,
        block_size: u32,
    ) -> Result<Self, AlignmentError> {
        let imagery = &catalog.imagery;
        let image_count = imagery.len();
        if image_count == 0 {
            return Err(AlignmentError::EmptyCatalog { source_index });
        }
        if !catalog.masks.is_empty() && catalog.masks.len() != image_count {
            return Err(AlignmentError::MaskCountMismatch {
                source_index,
                masks: catalog.masks.len(),
                images: image_count,
            });
        }

        let mut resolutions = vec![0.0; image_count];
        let mut source_tile_sizes = vec![Size::new(0, 0); image_count];
        let mut render_tile_sizes = vec![RenderSize::new(0.0, 0.0); image_count];

        for (image_index, image) in imagery.iter().enumerate() {
            // finest level first on disk; index 0 = coarsest internally
            let level = image_count - 1 - image_index;
            resolutions[level] = image.resolutions[0];

            // request larger blocks for untiled layouts
            let mut tile_size = Size::new(image.tile_width, image.tile_height);
            if tile_size.width != tile_size.height && tile_size.height < block_size {
                tile_size = Size::new(block_size, block_size);
            }
            source_tile_sizes[level] = tile_size;

            let aspect = image.resolutions[0] / image.resolutions[1].abs();
            render_tile_sizes[level] = RenderSize::new(
                tile_size.width as f64,
                tile_size.height as f64 / aspect,
            );
        }

        Ok(Self {
            extent: Extent::from_bbox(imagery[0].bbox),
            origin: imagery[0].origin,
            resolutions,
            render_tile_sizes,
            source_tile_sizes,
        })
    }
}

/// Validate and align all sources into one [`UnifiedPyramid`].
///
/// The first source's origin and resolution ladder are the baseline.
/// Later sources are scaled by `baseline finest / source finest` before
/// comparison; shorter pyramids raise `min_zoom` and are logically
/// extended at the coarse end.
pub fn reconcile(
    catalogs: &[SourceCatalog],
    options: &CatalogOptions,
) -> Result<UnifiedPyramid, AlignmentError> {
    let source_count = catalogs.len();
    let mut resolution_factors = vec![0.0; source_count];
    let mut baseline: Option<Baseline> = None;

    for (source_index, catalog) in catalogs.iter().enumerate() {
        let geometry =
            SourceGeometry::from_catalog(source_index, catalog, options.default_block_size)?;

        let Some(base) = baseline.as_mut() else {
            resolution_factors[source_index] = 1.0;
            baseline = Some(Baseline {
                extent: geometry.extent,
                origin: geometry.origin,
                resolutions: geometry.resolutions,
                render_tile_sizes: geometry.render_tile_sizes,
                source_tile_sizes: geometry.source_tile_sizes,
                min_zoom: 0,
            });
            continue;
        };

        base.extent = base.extent.intersection(&geometry.extent);

        if base.origin != geometry.origin {
            return Err(AlignmentError::OriginMismatch {
                source_index,
                got: geometry.origin,
                expected: base.origin,
            });
        }

        // a shorter pyramid extends the unified one at the coarse end
        if base.resolutions.len() - base.min_zoom > geometry.resolutions.len() {
            base.min_zoom = base.resolutions.len() - geometry.resolutions.len();
        }

        let factor = base.resolutions[base.resolutions.len() - 1]
            / geometry.resolutions[geometry.resolutions.len() - 1];
        resolution_factors[source_index] = factor;

        let scaled: Vec<f64> = geometry
            .resolutions
            .iter()
            .map(|resolution| resolution * factor)
            .collect();
        let overlap = &base.resolutions[base.min_zoom..];
        if overlap.len() != scaled.len() {
            return Err(AlignmentError::LevelCountMismatch {
                source_index,
                got: scaled.len(),
                expected: overlap.len(),
            });
        }
        if overlap
            .iter()
            .zip(&scaled)
            .any(|(&expected, &got)| relative_mismatch(expected, got, RESOLUTION_TOLERANCE))
        {
            return Err(AlignmentError::ResolutionMismatch {
                source_index,
                got: scaled,
                expected: overlap.to_vec(),
            });
        }

        let render_overlap = &base.render_tile_sizes[base.min_zoom..];
        for (offset, (expected, got)) in render_overlap
            .iter()
            .zip(&geometry.render_tile_sizes)
            .enumerate()
        {
            if relative_mismatch(expected.width, got.width, RENDER_TILE_SIZE_TOLERANCE)
                || relative_mismatch(expected.height, got.height, RENDER_TILE_SIZE_TOLERANCE)
            {
                return Err(AlignmentError::RenderTileSizeMismatch {
                    source_index,
                    level: base.min_zoom + offset,
                    got: (got.width, got.height),
                    expected: (expected.width, expected.height),
                });
            }
        }

        let size_overlap = &base.source_tile_sizes[base.min_zoom..];
        for (offset, (&expected, &got)) in size_overlap
            .iter()
            .zip(&geometry.source_tile_sizes)
            .enumerate()
        {
            if expected != got {
                return Err(AlignmentError::SourceTileSizeMismatch {
                    source_index,
                    level: base.min_zoom + offset,
                    got,
                    expected,
                });
            }
        }
    }

    let Some(base) = baseline else {
        return Err(AlignmentError::NoSources);
    };

    let level_count = base.resolutions.len();
    let mut imagery = Vec::with_capacity(source_count);
    let mut masks = Vec::with_capacity(source_count);
    for catalog in catalogs {
        imagery.push(pad_coarse_end(&catalog.imagery, level_count));
        masks.push(pad_coarse_end(&catalog.masks, level_count));
    }

    debug!(
        sources = source_count,
        levels = level_count,
        min_zoom = base.min_zoom,
        "reconciled unified pyramid"
    );

    Ok(UnifiedPyramid::new_unchecked(
        base.extent,
        base.origin,
        base.resolutions,
        base.render_tile_sizes,
        base.source_tile_sizes,
        base.min_zoom,
        resolution_factors,
        imagery,
        masks,
    ))
}

/// Reverse a finest-first level list and front-pad the coarse end.
fn pad_coarse_end(levels: &[ImageLevel], level_count: usize) -> Vec<Option<ImageLevel>> {
    let mut padded: Vec<Option<ImageLevel>> = Vec::with_capacity(level_count);
    padded.resize(level_count.saturating_sub(levels.len()), None);
    padded.extend(levels.iter().rev().cloned().map(Some));
    padded
}
