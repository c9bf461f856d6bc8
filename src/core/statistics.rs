use crate::types::{ChangeClass, ChangeResult, ClassificationResult, ClassifiedRaster, Region};
use std::collections::BTreeMap;

/// Count classified cells whose centre falls inside `region`.
///
/// The total is the number of counted cells, so no-data cells and cells
/// outside the footprint do not dilute the ratios. An empty footprint gives
/// a zero total and all-zero ratios.
pub fn aggregate(classified: &ClassifiedRaster, region: &Region) -> ChangeResult<ClassificationResult> {
    let grid = classified.grid();
    let bounds = region.bounds();

    let mut counts: BTreeMap<ChangeClass, u64> = ChangeClass::ALL.iter().map(|&c| (c, 0)).collect();
    let mut outside = 0u64;
    let mut no_data = 0u64;

    for ((row, col), class) in classified.classes().indexed_iter() {
        let (lon, lat) = grid.cell_center(row, col);
        if !bounds.contains(lon, lat) || !region.contains(lon, lat) {
            outside += 1;
            continue;
        }
        match class {
            Some(class) => *counts.entry(*class).or_insert(0) += 1,
            None => no_data += 1,
        }
    }

    let total: u64 = counts.values().sum();
    log::debug!(
        "Region statistics: {} classified, {} no data, {} outside footprint",
        total,
        no_data,
        outside
    );
    if total == 0 {
        log::warn!("No classified cells inside {}; ratios default to zero", region);
    }

    let (_, center_lat) = region.centroid();
    ClassificationResult::new(counts, total, grid.cell_area_m2(center_lat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, GridSpec};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn classified(classes: Array2<Option<ChangeClass>>) -> ClassifiedRaster {
        let (rows, cols) = classes.dim();
        let grid = GridSpec::new(GeoTransform::north_up(0.0, 4.0, 1.0, 1.0), rows, cols);
        ClassifiedRaster::new(grid, classes).unwrap()
    }

    #[test]
    fn test_counts_and_ratios() {
        use ChangeClass::*;
        let raster = classified(ndarray::array![
            [Some(Loss), Some(Loss), Some(Neutral), Some(Gain)],
            [Some(Neutral), None, Some(Neutral), Some(Loss)],
        ]);
        let region = Region::polygon(vec![(-1.0, 1.0), (5.0, 1.0), (5.0, 5.0), (-1.0, 5.0)]).unwrap();
        let result = aggregate(&raster, &region).unwrap();

        assert_eq!(result.count(Loss), 3);
        assert_eq!(result.count(Neutral), 3);
        assert_eq!(result.count(Gain), 1);
        assert_eq!(result.total(), 7); // no-data cell excluded
        assert_relative_eq!(result.ratios().values().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.ratio(Gain), 1.0 / 7.0);
    }

    #[test]
    fn test_footprint_restriction() {
        let raster = classified(Array2::from_elem((2, 4), Some(ChangeClass::Gain)));
        // Covers only the two left-most columns
        let region = Region::polygon(vec![(0.0, 2.0), (2.0, 2.0), (2.0, 4.0), (0.0, 4.0)]).unwrap();
        let result = aggregate(&raster, &region).unwrap();
        assert_eq!(result.total(), 4);
        assert_relative_eq!(result.ratio(ChangeClass::Gain), 1.0);
    }

    #[test]
    fn test_all_no_data_gives_zero_ratios() {
        let raster = classified(Array2::from_elem((2, 2), None));
        let region = Region::polygon(vec![(0.0, 2.0), (2.0, 2.0), (2.0, 4.0), (0.0, 4.0)]).unwrap();
        let result = aggregate(&raster, &region).unwrap();

        assert_eq!(result.total(), 0);
        for class in ChangeClass::ALL {
            assert_eq!(result.ratio(class), 0.0);
        }
    }
}
