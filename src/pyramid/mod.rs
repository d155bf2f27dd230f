//! Unified tile-pyramid reconciliation.
//!
//! After every source's catalog has resolved, the reconciler validates
//! that the sources are spatially and resolution-compatible and folds
//! them into one immutable [`UnifiedPyramid`] description shared
//! read-only by all subsequent tile loads. The [`alpha`] policy and the
//! derived [`CompositeConfig`] decide the output band layout once per
//! configuration.

mod align;
mod alpha;

pub use align::{reconcile, RENDER_TILE_SIZE_TOLERANCE, RESOLUTION_TOLERANCE};
pub use alpha::alpha_required;

use crate::catalog::{ImageLevel, SourceCatalog, SourceDescriptor};
use crate::coord::{Extent, RenderSize, Size};
use thiserror::Error;

/// Origin, resolution or tile-size mismatch beyond tolerance.
///
/// Fatal: the whole configuration fails and the engine enters its
/// terminal error state.
#[derive(Debug, Clone, Error)]
pub enum AlignmentError {
    /// No sources were supplied
    #[error("at least one source is required")]
    NoSources,

    /// A source's catalog contains no imagery levels
    #[error("source {source_index} has an empty catalog")]
    EmptyCatalog { source_index: usize },

    /// A source carries masks but not one per imagery level
    #[error("expected one mask per image for source {source_index}: found {masks} masks and {images} images")]
    MaskCountMismatch {
        source_index: usize,
        masks: usize,
        images: usize,
    },

    /// Origins must match exactly across sources
    #[error("origin mismatch for source {source_index}: got {got:?}, expected {expected:?}")]
    OriginMismatch {
        source_index: usize,
        got: [f64; 2],
        expected: [f64; 2],
    },

    /// Scaled resolution ladder diverges from the baseline beyond tolerance
    #[error("resolution mismatch for source {source_index}: got {got:?}, expected {expected:?}")]
    ResolutionMismatch {
        source_index: usize,
        got: Vec<f64>,
        expected: Vec<f64>,
    },

    /// Render tile sizes diverge beyond tolerance
    #[error("render tile size mismatch for source {source_index} at level {level}: got {got:?}, expected {expected:?}")]
    RenderTileSizeMismatch {
        source_index: usize,
        level: usize,
        got: (f64, f64),
        expected: (f64, f64),
    },

    /// Source tile sizes must match exactly
    #[error("source tile size mismatch for source {source_index} at level {level}: got {got}, expected {expected}")]
    SourceTileSizeMismatch {
        source_index: usize,
        level: usize,
        got: Size,
        expected: Size,
    },

    /// A later source exposes more pyramid levels than the baseline
    #[error("source {source_index} exposes {got} levels where the baseline overlap holds {expected}")]
    LevelCountMismatch {
        source_index: usize,
        got: usize,
        expected: usize,
    },
}

/// The reconciled multi-source pyramid description.
///
/// Built once at configuration time and never mutated afterwards. Level
/// index 0 is the coarsest level; per-source tables are front-padded
/// with `None` where a shorter pyramid has no coarse counterpart.
#[derive(Debug, Clone)]
pub struct UnifiedPyramid {
    /// Intersection of all source extents
    pub extent: Extent,
    /// Shared top-left origin
    pub origin: [f64; 2],
    /// Resolution ladder, coarsest first
    pub resolutions: Vec<f64>,
    /// Render tile size per level (non-square when pixels are non-square)
    pub render_tile_sizes: Vec<RenderSize>,
    /// Source tile size per level
    pub source_tile_sizes: Vec<Size>,
    /// First level index at which every source has imagery
    pub min_zoom: usize,
    /// Multiplier normalizing each source's resolutions onto the baseline
    pub resolution_factors: Vec<f64>,
    /// Imagery per source per level, index-aligned to `resolutions`
    imagery: Vec<Vec<Option<ImageLevel>>>,
    /// Masks per source per level, index-aligned to `resolutions`
    masks: Vec<Vec<Option<ImageLevel>>>,
}

impl UnifiedPyramid {
    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.resolutions.len()
    }

    /// Number of contributing sources.
    pub fn source_count(&self) -> usize {
        self.imagery.len()
    }

    /// The imagery level for a source at a unified level, if present.
    pub fn imagery_at(&self, source: usize, level: usize) -> Option<&ImageLevel> {
        self.imagery.get(source)?.get(level)?.as_ref()
    }

    /// Map a unified level onto the source's own level index.
    ///
    /// Shorter pyramids are front-padded, so the source's own index is
    /// the unified index minus its leading padding. `None` when the
    /// source has no imagery at the unified level.
    pub fn source_level(&self, source: usize, level: usize) -> Option<usize> {
        let levels = self.imagery.get(source)?;
        levels.get(level)?.as_ref()?;
        let padding = levels.iter().take_while(|entry| entry.is_none()).count();
        Some(level - padding)
    }

    /// True when the source carries a mask image at the unified level.
    pub fn has_mask_at(&self, source: usize, level: usize) -> bool {
        self.masks
            .get(source)
            .and_then(|levels| levels.get(level))
            .map(|mask| mask.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn new_unchecked(
        extent: Extent,
        origin: [f64; 2],
        resolutions: Vec<f64>,
        render_tile_sizes: Vec<RenderSize>,
        source_tile_sizes: Vec<Size>,
        min_zoom: usize,
        resolution_factors: Vec<f64>,
        imagery: Vec<Vec<Option<ImageLevel>>>,
        masks: Vec<Vec<Option<ImageLevel>>>,
    ) -> Self {
        Self {
            extent,
            origin,
            resolutions,
            render_tile_sizes,
            source_tile_sizes,
            min_zoom,
            resolution_factors,
            imagery,
            masks,
        }
    }
}

/// The output band layout, derived once per configuration.
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    /// Total output bands: selected bands across sources plus alpha
    pub band_count: usize,
    /// Whether a synthetic alpha band is appended
    pub add_alpha: bool,
    /// Whether samples are stretched to 8-bit (raw floats otherwise)
    pub normalize: bool,
    /// Selected band count per source
    pub samples_per_pixel: Vec<usize>,
    /// 0-based selected band indices per source, in output order
    pub selected_bands: Vec<Vec<usize>>,
}

impl CompositeConfig {
    /// Derive the band layout from the descriptors and catalogs.
    pub fn derive(
        sources: &[SourceDescriptor],
        catalogs: &[SourceCatalog],
        normalize: bool,
    ) -> Self {
        let add_alpha = alpha_required(sources, catalogs);

        let mut samples_per_pixel = Vec::with_capacity(sources.len());
        let mut selected_bands = Vec::with_capacity(sources.len());
        for (source, catalog) in sources.iter().zip(catalogs) {
            let native = catalog
                .imagery
                .first()
                .map(|level| level.bands as usize)
                .unwrap_or(0);
            let selected: Vec<usize> = match &source.bands {
                Some(bands) => bands
                    .iter()
                    .map(|&band| (band as usize).saturating_sub(1))
                    .collect(),
                None => (0..native).collect(),
            };
            samples_per_pixel.push(selected.len());
            selected_bands.push(selected);
        }

        let band_count =
            samples_per_pixel.iter().sum::<usize>() + if add_alpha { 1 } else { 0 };

        Self {
            band_count,
            add_alpha,
            normalize,
            samples_per_pixel,
            selected_bands,
        }
    }
}
