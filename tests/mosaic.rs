//! End-to-end mosaic tests: catalog resolution, pyramid reconciliation
//! and tile composition through the public engine API.

use bytes::Bytes;
use cogmosaic::catalog::{
    CatalogError, CatalogOptions, CatalogReader, ImageLevel, SourceDescriptor,
};
use cogmosaic::compose::ComposeError;
use cogmosaic::engine::{EngineError, MosaicOptions, MosaicSource, MosaicState};
use cogmosaic::fetch::{FetchError, RawTileSample, TileFetcher};
use cogmosaic::TileBuffer;
use std::collections::HashMap;

const BLOCK: u32 = 4;

fn level(resolution: f64, bands: u32) -> ImageLevel {
    ImageLevel {
        bbox: [0.0, 0.0, 1024.0, 1024.0],
        origin: [0.0, 1024.0],
        resolutions: [resolution, -resolution],
        tile_width: BLOCK,
        tile_height: BLOCK,
        bands,
        bits_per_sample: 16,
        sample_format: 1,
        nodata: vec![None; bands as usize],
        stats: None,
        is_mask: false,
    }
}

fn options() -> MosaicOptions {
    MosaicOptions {
        normalize: true,
        catalog: CatalogOptions {
            default_block_size: BLOCK,
            ..CatalogOptions::default()
        },
    }
}

struct MapReader {
    catalogs: HashMap<String, Vec<ImageLevel>>,
    failing: Option<String>,
}

impl MapReader {
    fn new() -> Self {
        Self {
            catalogs: HashMap::new(),
            failing: None,
        }
    }

    fn with(mut self, url: &str, levels: Vec<ImageLevel>) -> Self {
        self.catalogs.insert(url.to_string(), levels);
        self
    }
}

impl CatalogReader for MapReader {
    async fn fetch_catalog(
        &self,
        source: &SourceDescriptor,
        _options: &CatalogOptions,
    ) -> Result<Vec<ImageLevel>, CatalogError> {
        let url = source.source_url()?.to_string();
        if self.failing.as_deref() == Some(url.as_str()) {
            return Err(CatalogError::Fetch(FetchError::Catalog(format!(
                "range request for {url} refused"
            ))));
        }
        Ok(self.catalogs[&url].clone())
    }
}

/// Serves every band of every pixel with the same per-band values.
struct PatternFetcher {
    band_values: Vec<u16>,
}

impl PatternFetcher {
    fn new(band_values: Vec<u16>) -> Self {
        Self { band_values }
    }
}

impl TileFetcher for PatternFetcher {
    async fn fetch_raw_tile(
        &self,
        _level: usize,
        _x: u32,
        _y: u32,
    ) -> Result<RawTileSample, FetchError> {
        let pixels = (BLOCK * BLOCK) as usize;
        let mut bytes = Vec::with_capacity(pixels * self.band_values.len() * 2);
        for _ in 0..pixels {
            for value in &self.band_values {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        Ok(RawTileSample {
            bytes: Bytes::from(bytes),
            sample_format: 1,
            bits_per_sample: 16,
        })
    }

    async fn fetch_mask_tile(
        &self,
        _level: usize,
        _x: u32,
        _y: u32,
    ) -> Result<Option<Bytes>, FetchError> {
        Ok(Some(Bytes::from_static(&[255])))
    }
}

#[tokio::test]
async fn test_two_source_pipeline_composes_expected_bands() {
    // 3-band RGB with nodata on band 1 plus a single-band pan source
    let mut rgb_levels = vec![level(1.0, 3), level(2.0, 3)];
    for lvl in &mut rgb_levels {
        lvl.nodata[0] = Some(0.0);
    }
    let reader = MapReader::new()
        .with("rgb.tif", rgb_levels)
        .with("pan.tif", vec![level(1.0, 1), level(2.0, 1)]);

    let sources = vec![
        SourceDescriptor::url("rgb.tif").with_min(0.0).with_max(255.0),
        SourceDescriptor::url("pan.tif").with_min(0.0).with_max(255.0),
    ];
    let fetchers = vec![
        PatternFetcher::new(vec![10, 20, 30]),
        PatternFetcher::new(vec![40]),
    ];

    let mosaic = MosaicSource::configure(sources, fetchers, &reader, options()).await;
    assert_eq!(mosaic.state(), MosaicState::Ready);

    let view = mosaic.view().expect("ready mosaic exposes a view");
    assert_eq!(view.band_count, 5);
    assert_eq!(view.resolutions, vec![2.0, 1.0]);
    assert_eq!(view.min_zoom, 0);
    assert_eq!(view.origin, [0.0, 1024.0]);

    let tile = mosaic.load_tile(1, 0, 0).await.expect("tile composes");
    let TileBuffer::U8(data) = tile else {
        panic!("normalized pipeline must yield u8 tiles");
    };
    assert_eq!(data.len(), (BLOCK * BLOCK) as usize * 5);
    // every pixel carries R G B Pan Alpha
    for pixel in data.chunks_exact(5) {
        assert_eq!(pixel, &[10, 20, 30, 40, 255]);
    }
}

#[tokio::test]
async fn test_catalog_failure_enters_terminal_error_state() {
    let mut reader = MapReader::new()
        .with("ok.tif", vec![level(1.0, 1)])
        .with("down.tif", vec![level(1.0, 1)]);
    reader.failing = Some("down.tif".to_string());

    let sources = vec![
        SourceDescriptor::url("ok.tif"),
        SourceDescriptor::url("down.tif"),
    ];
    let fetchers = vec![
        PatternFetcher::new(vec![1]),
        PatternFetcher::new(vec![2]),
    ];

    let mosaic = MosaicSource::configure(sources, fetchers, &reader, options()).await;
    assert_eq!(mosaic.state(), MosaicState::Error);
    assert!(mosaic.view().is_none());
    assert!(matches!(
        mosaic.error(),
        Some(EngineError::Catalog(CatalogError::Fetch(_)))
    ));

    let result = mosaic.load_tile(0, 0, 0).await;
    assert!(matches!(result, Err(ComposeError::NotConfigured)));
}

#[tokio::test]
async fn test_shorter_pyramid_front_pads_coarse_levels() {
    let reader = MapReader::new()
        .with(
            "deep.tif",
            vec![level(1.0, 1), level(2.0, 1), level(4.0, 1)],
        )
        .with("shallow.tif", vec![level(1.0, 1)]);

    let sources = vec![
        SourceDescriptor::url("deep.tif").with_min(0.0).with_max(255.0),
        SourceDescriptor::url("shallow.tif").with_min(0.0).with_max(255.0),
    ];
    let fetchers = vec![
        PatternFetcher::new(vec![100]),
        PatternFetcher::new(vec![200]),
    ];

    let mosaic = MosaicSource::configure(sources, fetchers, &reader, options()).await;
    assert_eq!(mosaic.state(), MosaicState::Ready);

    let view = mosaic.view().unwrap();
    assert_eq!(view.resolutions, vec![4.0, 2.0, 1.0]);
    assert_eq!(view.min_zoom, 2);

    // below min zoom the shallow source has no imagery
    let result = mosaic.load_tile(0, 0, 0).await;
    assert!(matches!(
        result,
        Err(ComposeError::LevelUnavailable {
            source_index: 1,
            level: 0,
        })
    ));

    // at min zoom every source contributes
    let tile = mosaic.load_tile(2, 0, 0).await.unwrap();
    let TileBuffer::U8(data) = tile else {
        panic!("normalized pipeline must yield u8 tiles");
    };
    for pixel in data.chunks_exact(2) {
        assert_eq!(pixel, &[100, 200]);
    }
}

#[tokio::test]
async fn test_mask_pyramid_adds_alpha_and_fetches_masks() {
    let mut levels = vec![level(1.0, 1), level(2.0, 1)];
    let mut masks: Vec<ImageLevel> = levels.clone();
    for mask in &mut masks {
        mask.is_mask = true;
    }
    levels.extend(masks);

    let reader = MapReader::new().with("masked.tif", levels);
    let sources = vec![SourceDescriptor::url("masked.tif").with_min(0.0).with_max(255.0)];
    let fetchers = vec![PatternFetcher::new(vec![50])];

    let mosaic = MosaicSource::configure(sources, fetchers, &reader, options()).await;
    assert_eq!(mosaic.state(), MosaicState::Ready);

    let view = mosaic.view().unwrap();
    assert_eq!(view.band_count, 2); // gray + alpha

    let tile = mosaic.load_tile(0, 0, 0).await.unwrap();
    let TileBuffer::U8(data) = tile else {
        panic!("normalized pipeline must yield u8 tiles");
    };
    for pixel in data.chunks_exact(2) {
        assert_eq!(pixel, &[50, 255]);
    }
}

#[tokio::test]
async fn test_raw_mode_yields_float_tiles() {
    let reader = MapReader::new().with("dem.tif", vec![level(1.0, 1)]);
    let sources = vec![SourceDescriptor::url("dem.tif")];
    let fetchers = vec![PatternFetcher::new(vec![1234])];

    let raw = MosaicOptions {
        normalize: false,
        ..options()
    };
    let mosaic = MosaicSource::configure(sources, fetchers, &reader, raw).await;
    assert_eq!(mosaic.state(), MosaicState::Ready);

    let tile = mosaic.load_tile(0, 0, 0).await.unwrap();
    let TileBuffer::F32(data) = tile else {
        panic!("raw pipeline must yield f32 tiles");
    };
    for &value in &data {
        assert_eq!(value, 1234.0);
    }
}
