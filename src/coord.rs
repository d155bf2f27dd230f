//! Coordinate and geometry types shared across the engine.

use std::fmt;

/// Default block size used for untiled-layout normalization and for the
/// destination row stride of composed tiles.
///
/// Overridable via [`CatalogOptions::default_block_size`](crate::catalog::CatalogOptions).
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Tile coordinates in the unified pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Pyramid level, 0 = coarsest
    pub level: usize,
    /// Column index (east-west), 0 at the origin
    pub x: u32,
    /// Row index (north-south), 0 at the origin
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(level: usize, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// Axis-aligned bounding extent in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create an extent from explicit bounds.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create an extent from a `[min_x, min_y, max_x, max_y]` bounding box.
    pub fn from_bbox(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    /// Geometric intersection of two extents.
    ///
    /// The result may be degenerate when the extents do not overlap;
    /// callers decide whether a degenerate extent is acceptable.
    pub fn intersection(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        }
    }

    /// True when the extent encloses no area.
    pub fn is_degenerate(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }
}

/// Integer tile size in pixels, as stored in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by the size.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Fractional render tile size in pixels.
///
/// Non-square-pixel sources render at a height scaled by the pixel aspect
/// ratio, so render sizes are kept as floats and compared with a relative
/// tolerance rather than exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSize {
    pub width: f64,
    pub height: f64,
}

impl RenderSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}
