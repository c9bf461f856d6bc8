use crate::types::{Band, ChangeResult, IndexRaster, Raster};
use ndarray::Zip;

/// Normalized difference `(a - b) / (a + b)` of two bands.
///
/// Cells where either band has no data, or where `a + b == 0`, become no
/// data in the output; the rest of the raster is still computed. Values are
/// not clamped.
pub fn normalized_difference(raster: &Raster, band_a: &str, band_b: &str) -> ChangeResult<IndexRaster> {
    let a = raster.band(band_a)?;
    let b = raster.band(band_b)?;
    log::debug!("Normalized difference ({} - {}) / ({} + {})", band_a, band_b, band_a, band_b);

    let values = compute(a, b);
    let index = IndexRaster::new(*raster.grid(), values)?;

    let total = raster.grid().rows * raster.grid().cols;
    let valid = index.valid_count();
    if valid < total {
        log::debug!("{} of {} index cells have no data", total - valid, total);
    }
    Ok(index)
}

/// NDVI from near-infrared and red bands
pub fn ndvi(raster: &Raster, nir: &str, red: &str) -> ChangeResult<IndexRaster> {
    normalized_difference(raster, nir, red)
}

fn cell(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    let (a, b) = (a?, b?);
    let sum = a + b;
    if sum == 0.0 {
        return None;
    }
    let value = (a - b) / sum;
    value.is_finite().then_some(value)
}

#[cfg(feature = "parallel")]
fn compute(a: &Band, b: &Band) -> Band {
    Zip::from(a).and(b).par_map_collect(|&a, &b| cell(a, b))
}

#[cfg(not(feature = "parallel"))]
fn compute(a: &Band, b: &Band) -> Band {
    Zip::from(a).and(b).map_collect(|&a, &b| cell(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeError, GeoTransform, GridSpec};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn raster(nir: ndarray::Array2<f32>, red: ndarray::Array2<f32>) -> Raster {
        let grid = GridSpec::new(GeoTransform::north_up(120.0, 24.0, 0.1, 0.1), 2, 2);
        Raster::from_dense(grid, [("NIR", nir), ("RED", red)]).unwrap()
    }

    #[test]
    fn test_ndvi_values() {
        let r = raster(array![[0.5, 0.3], [0.2, 0.0]], array![[0.1, 0.3], [0.4, 0.2]]);
        let index = ndvi(&r, "NIR", "RED").unwrap();

        assert_relative_eq!(index.get(0, 0).unwrap(), 0.4 / 0.6, epsilon = 1e-6);
        assert_relative_eq!(index.get(0, 1).unwrap(), 0.0);
        assert_relative_eq!(index.get(1, 0).unwrap(), -0.2 / 0.6, epsilon = 1e-6);
        assert_relative_eq!(index.get(1, 1).unwrap(), -1.0);
    }

    #[test]
    fn test_zero_sum_cell_is_no_data() {
        let r = raster(array![[0.0, 0.5], [-0.2, f32::NAN]], array![[0.0, 0.1], [0.2, 0.3]]);
        let index = normalized_difference(&r, "NIR", "RED").unwrap();

        assert_eq!(index.get(0, 0), None); // 0 + 0
        assert!(index.get(0, 1).is_some());
        assert_eq!(index.get(1, 0), None); // -0.2 + 0.2
        assert_eq!(index.get(1, 1), None); // input no data
        assert_eq!(index.valid_count(), 1);
    }

    #[test]
    fn test_missing_band() {
        let r = raster(array![[0.5, 0.3], [0.2, 0.0]], array![[0.1, 0.3], [0.4, 0.2]]);
        assert!(matches!(
            normalized_difference(&r, "SR_B4", "RED"),
            Err(ChangeError::BandNotFound { .. })
        ));
    }
}
