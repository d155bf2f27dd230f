//! Radiometric normalization: min/max resolution and gain/bias stretch.
//!
//! Every source resolves an effective `(min, max)` per compose call:
//! explicit descriptor values win, then parsed raster statistics tags,
//! then a range derived from the sample encoding. The resulting linear
//! stretch maps samples onto the 0..255 display range.

use crate::catalog::{RasterStats, SourceDescriptor};
use crate::sample::SampleKind;

/// The linear transform mapping a source value range onto 0..255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainBias {
    pub gain: f64,
    pub bias: f64,
}

impl GainBias {
    /// Stretch for an effective `(min, max)` range.
    pub fn from_range(min: f64, max: f64) -> Self {
        let gain = 255.0 / (max - min);
        Self {
            gain,
            bias: -min * gain,
        }
    }

    /// Map a sample value into the clamped display range.
    pub fn apply(&self, value: f64) -> f64 {
        (self.gain * value + self.bias).clamp(0.0, 255.0)
    }

    /// The display value a raw zero maps to; samples equal to this are
    /// treated as transparent when an alpha band is synthesized.
    pub fn transparent(&self) -> f64 {
        self.apply(0.0)
    }
}

/// Resolve the effective `(min, max)` for one source at one level.
///
/// Precedence: explicit descriptor values, then statistics tags parsed
/// as floating point (unparseable tags fall through), then the range
/// derived from the sample encoding.
pub fn resolve_range(
    source: &SourceDescriptor,
    stats: Option<&RasterStats>,
    kind: SampleKind,
) -> (f64, f64) {
    let (type_min, type_max) = kind.display_range();
    let min = source
        .min
        .or_else(|| stats.and_then(RasterStats::parsed_minimum))
        .unwrap_or(type_min);
    let max = source
        .max
        .or_else(|| stats.and_then(RasterStats::parsed_maximum))
        .unwrap_or(type_max);
    (min, max)
}
