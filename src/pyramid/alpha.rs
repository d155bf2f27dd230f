//! The alpha policy.
//!
//! Decides once per configuration whether a synthetic alpha band is
//! appended to the output, short-circuiting on the first match.

use crate::catalog::{SourceCatalog, SourceDescriptor};

/// Whether any source requires nodata-driven transparency.
///
/// Priority order: an explicit nodata override on a descriptor, a
/// parallel mask pyramid, then per-band nodata values in the catalog
/// metadata for the selected (or, if none selected, all) bands.
pub fn alpha_required(sources: &[SourceDescriptor], catalogs: &[SourceCatalog]) -> bool {
    for (source, catalog) in sources.iter().zip(catalogs) {
        if source.nodata.is_some() {
            return true;
        }

        if !catalog.masks.is_empty() {
            return true;
        }

        match &source.bands {
            Some(bands) => {
                let selected_has_nodata = catalog.imagery.iter().any(|level| {
                    bands.iter().any(|&band| {
                        level
                            .nodata
                            .get((band as usize).saturating_sub(1))
                            .copied()
                            .flatten()
                            .is_some()
                    })
                });
                if selected_has_nodata {
                    return true;
                }
            }
            None => {
                let any_band_has_nodata = catalog
                    .imagery
                    .iter()
                    .any(|level| level.nodata.iter().any(Option::is_some));
                if any_band_has_nodata {
                    return true;
                }
            }
        }
    }

    false
}
