//! The mosaic engine: one-time configuration and per-tile composition.
//!
//! [`MosaicEngine::configure`] fans out every source's catalog fetch,
//! joins on a single barrier, reconciles the pyramids and freezes the
//! result. After that, [`MosaicEngine::compose_tile`] is stateless and
//! repeatable; tile requests for different coordinates are fully
//! independent and may run with unbounded concurrency.
//!
//! [`MosaicSource`] wraps the engine in the lifecycle the host tiling
//! framework expects: `loading → configuring → ready`, or a sticky
//! terminal `error` when any catalog fetch or alignment check fails.

use crate::catalog::{
    CatalogError, CatalogOptions, CatalogReader, SourceCatalog, SourceDescriptor,
};
use crate::compose::{compose_tile, ComposeError, SourcePlane, TileBuffer};
use crate::coord::{Extent, RenderSize, TileCoord};
use crate::fetch::{fetch_tile_inputs, SourceRequest, TileFetcher};
use crate::pyramid::{reconcile, AlignmentError, CompositeConfig, UnifiedPyramid};
use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// Configuration failures.
///
/// Unrecoverable for the lifetime of the configured instance; callers
/// reconstruct the engine to retry.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A source catalog could not be resolved
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Sources are not spatially or resolution-compatible
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    /// One tile fetcher is required per source
    #[error("expected one tile fetcher per source: {fetchers} fetchers for {sources} sources")]
    FetcherCountMismatch { sources: usize, fetchers: usize },
}

/// Engine-wide options supplied once at construction.
#[derive(Debug, Clone)]
pub struct MosaicOptions {
    /// Stretch samples to 8-bit (raw 32-bit floats when disabled)
    pub normalize: bool,
    /// Options applied while reading catalogs
    pub catalog: CatalogOptions,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            catalog: CatalogOptions::default(),
        }
    }
}

/// The synchronously-readable description the host framework consumes
/// once configuration reaches the ready state.
#[derive(Debug, Clone)]
pub struct ViewDescription {
    /// Intersection of all source extents
    pub extent: Extent,
    /// Shared top-left origin
    pub origin: [f64; 2],
    /// Resolution ladder, coarsest first
    pub resolutions: Vec<f64>,
    /// Render tile size per level
    pub render_tile_sizes: Vec<RenderSize>,
    /// Output bands per composed tile
    pub band_count: usize,
    /// First level at which every source has imagery
    pub min_zoom: usize,
}

/// The configured compositing engine.
///
/// Immutable once constructed; the unified pyramid, composite
/// configuration and per-source descriptors are the only state shared
/// across concurrent tile composes.
pub struct MosaicEngine<F> {
    sources: Vec<SourceDescriptor>,
    fetchers: Vec<F>,
    options: MosaicOptions,
    pyramid: UnifiedPyramid,
    config: CompositeConfig,
}

impl<F: TileFetcher> MosaicEngine<F> {
    /// Resolve every source's catalog in parallel, reconcile the
    /// pyramids and derive the output band layout.
    ///
    /// The whole configuration fails if any catalog fetch fails, if a
    /// source uses a reserved transport, or if the sources do not align.
    pub async fn configure<C: CatalogReader>(
        sources: Vec<SourceDescriptor>,
        fetchers: Vec<F>,
        reader: &C,
        options: MosaicOptions,
    ) -> Result<Self, EngineError> {
        if sources.len() != fetchers.len() {
            return Err(EngineError::FetcherCountMismatch {
                sources: sources.len(),
                fetchers: fetchers.len(),
            });
        }

        // reserved transports are rejected before any fetch goes out
        for source in &sources {
            source.source_url().map_err(EngineError::Catalog)?;
        }

        let requests = sources
            .iter()
            .map(|source| reader.fetch_catalog(source, &options.catalog));
        let level_lists = try_join_all(requests).await.map_err(EngineError::Catalog)?;
        let catalogs: Vec<SourceCatalog> = level_lists
            .into_iter()
            .map(SourceCatalog::from_levels)
            .collect();

        let pyramid = reconcile(&catalogs, &options.catalog)?;
        let config = CompositeConfig::derive(&sources, &catalogs, options.normalize);

        debug!(
            sources = sources.len(),
            levels = pyramid.level_count(),
            band_count = config.band_count,
            add_alpha = config.add_alpha,
            "mosaic engine configured"
        );

        Ok(Self {
            sources,
            fetchers,
            options,
            pyramid,
            config,
        })
    }

    /// The reconciled pyramid description.
    pub fn pyramid(&self) -> &UnifiedPyramid {
        &self.pyramid
    }

    /// The derived output band layout.
    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// The view description handed to the host tiling framework.
    pub fn view(&self) -> ViewDescription {
        ViewDescription {
            extent: self.pyramid.extent,
            origin: self.pyramid.origin,
            resolutions: self.pyramid.resolutions.clone(),
            render_tile_sizes: self.pyramid.render_tile_sizes.clone(),
            band_count: self.config.band_count,
            min_zoom: self.pyramid.min_zoom,
        }
    }

    /// Fetch every source's raw tile for one coordinate and synthesize
    /// the composed output buffer.
    ///
    /// No tile-level caching: repeated requests re-fetch and re-compose.
    /// Failures are isolated to this coordinate.
    #[instrument(skip(self), fields(tile = %coord))]
    pub async fn compose_tile(&self, coord: TileCoord) -> Result<TileBuffer, ComposeError> {
        let level = coord.level;
        if level >= self.pyramid.level_count() {
            return Err(ComposeError::LevelOutOfRange {
                level,
                levels: self.pyramid.level_count(),
            });
        }

        let mut native_bands = Vec::with_capacity(self.sources.len());
        let mut requests = Vec::with_capacity(self.sources.len());
        for source_index in 0..self.sources.len() {
            let image = self
                .pyramid
                .imagery_at(source_index, level)
                .ok_or(ComposeError::LevelUnavailable {
                    source_index,
                    level,
                })?;
            native_bands.push(image.bands as usize);

            // front-padded sources are addressed at their own level index
            let source_level = self.pyramid.source_level(source_index, level).ok_or(
                ComposeError::LevelUnavailable {
                    source_index,
                    level,
                },
            )?;
            requests.push(SourceRequest {
                level: source_level,
                has_mask: self.pyramid.has_mask_at(source_index, level),
            });
        }

        let inputs = fetch_tile_inputs(&self.fetchers, &requests, coord).await?;

        // mask payloads ride along with the fan-out; transparency itself
        // comes from the zero-mapped threshold in the compositor
        let planes: Vec<SourcePlane<'_>> = inputs
            .samples
            .into_iter()
            .enumerate()
            .map(|(source_index, sample)| SourcePlane {
                descriptor: &self.sources[source_index],
                stats: self
                    .pyramid
                    .imagery_at(source_index, level)
                    .and_then(|image| image.stats.as_ref()),
                native_bands: native_bands[source_index],
                sample,
            })
            .collect();

        let tile_size = self.pyramid.source_tile_sizes[level];
        compose_tile(
            tile_size.width,
            tile_size.height,
            self.options.catalog.default_block_size,
            &self.config,
            planes,
        )
    }
}

/// Lifecycle states of a [`MosaicSource`].
///
/// `Loading` and `Configuring` only exist while `configure` is being
/// awaited; a constructed source is either `Ready` or `Error`. `Error`
/// is terminal and sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicState {
    Loading,
    Configuring,
    Ready,
    Error,
}

enum SourceState<F> {
    Ready(MosaicEngine<F>),
    Error(EngineError),
}

/// Host-facing wrapper owning the configuration lifecycle.
///
/// The host tiling framework reads [`MosaicSource::view`] once the
/// state is ready and drives rendering through
/// [`MosaicSource::load_tile`], the per-tile data loader.
pub struct MosaicSource<F> {
    state: SourceState<F>,
}

impl<F: TileFetcher> MosaicSource<F> {
    /// Configure the engine, capturing any failure as the terminal
    /// error state instead of propagating it.
    pub async fn configure<C: CatalogReader>(
        sources: Vec<SourceDescriptor>,
        fetchers: Vec<F>,
        reader: &C,
        options: MosaicOptions,
    ) -> Self {
        match MosaicEngine::configure(sources, fetchers, reader, options).await {
            Ok(engine) => Self {
                state: SourceState::Ready(engine),
            },
            Err(err) => {
                error!(error = %err, "mosaic configuration failed");
                Self {
                    state: SourceState::Error(err),
                }
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MosaicState {
        match &self.state {
            SourceState::Ready(_) => MosaicState::Ready,
            SourceState::Error(_) => MosaicState::Error,
        }
    }

    /// The configuration failure, when the state is `Error`.
    pub fn error(&self) -> Option<&EngineError> {
        match &self.state {
            SourceState::Error(err) => Some(err),
            SourceState::Ready(_) => None,
        }
    }

    /// The view description, when the state is `Ready`.
    pub fn view(&self) -> Option<ViewDescription> {
        match &self.state {
            SourceState::Ready(engine) => Some(engine.view()),
            SourceState::Error(_) => None,
        }
    }

    /// The configured engine, when the state is `Ready`.
    pub fn engine(&self) -> Option<&MosaicEngine<F>> {
        match &self.state {
            SourceState::Ready(engine) => Some(engine),
            SourceState::Error(_) => None,
        }
    }

    /// The per-tile data loader consumed by the host framework.
    ///
    /// Rejected without any I/O once the source is in the error state.
    pub async fn load_tile(&self, level: usize, x: u32, y: u32) -> Result<TileBuffer, ComposeError> {
        match &self.state {
            SourceState::Ready(engine) => engine.compose_tile(TileCoord::new(level, x, y)).await,
            SourceState::Error(_) => Err(ComposeError::NotConfigured),
        }
    }
}
