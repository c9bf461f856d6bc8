use crate::types::{BoundingBox, ChangeError, ChangeResult, Region, Scene, TimeWindow};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;

/// Order in which a query yields its scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOrder {
    /// Lowest cloud cover first, ties broken by the most recent capture
    AscendingCloud,
    /// Catalog order
    Unordered,
}

/// Lazy, single-pass sequence of scenes matched by a query
pub struct SceneStream<'a> {
    matched: usize,
    inner: Box<dyn Iterator<Item = ChangeResult<Scene>> + 'a>,
}

impl<'a> SceneStream<'a> {
    pub fn new<I>(matched: usize, inner: I) -> Self
    where
        I: Iterator<Item = ChangeResult<Scene>> + 'a,
    {
        Self {
            matched,
            inner: Box::new(inner),
        }
    }

    /// Number of catalog entries that passed the filters
    pub fn matched(&self) -> usize {
        self.matched
    }
}

impl Iterator for SceneStream<'_> {
    type Item = ChangeResult<Scene>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A queryable collection of satellite scenes
pub trait ImageSource: Send + Sync {
    /// Scenes intersecting `region`, captured within `window`, with cloud
    /// cover strictly below `max_cloud_cover`. An empty selection is an
    /// error (`NoScenesFound`), never an empty stream.
    fn query(
        &self,
        region: &Region,
        window: &TimeWindow,
        max_cloud_cover: f64,
        order: SceneOrder,
    ) -> ChangeResult<SceneStream<'_>>;
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
    fn query(&self, region: &Region, window: &TimeWindow, max_cloud_cover: f64, order: SceneOrder) -> ChangeResult<SceneStream<'_>> {
        (**self).query(region, window, max_cloud_cover, order)
    }
}

impl<T: ImageSource + ?Sized> ImageSource for Box<T> {
    fn query(&self, region: &Region, window: &TimeWindow, max_cloud_cover: f64, order: SceneOrder) -> ChangeResult<SceneStream<'_>> {
        (**self).query(region, window, max_cloud_cover, order)
    }
}

impl<T: ImageSource + ?Sized> ImageSource for Arc<T> {
    fn query(&self, region: &Region, window: &TimeWindow, max_cloud_cover: f64, order: SceneOrder) -> ChangeResult<SceneStream<'_>> {
        (**self).query(region, window, max_cloud_cover, order)
    }
}

/// Metadata needed to decide whether a scene matches a query
#[derive(Debug, Clone, Copy)]
pub struct SceneFootprint {
    pub acquired: NaiveDate,
    pub cloud_cover: f64,
    pub bounds: BoundingBox,
}

/// Apply the spatial, temporal and cloud filters shared by every backend
pub fn select_scenes<'a, T, F>(
    items: &'a [T],
    footprint: F,
    region: &Region,
    window: &TimeWindow,
    max_cloud_cover: f64,
    order: SceneOrder,
) -> ChangeResult<Vec<&'a T>>
where
    F: Fn(&T) -> SceneFootprint,
{
    if !max_cloud_cover.is_finite() || max_cloud_cover < 0.0 {
        return Err(ChangeError::InvalidConfig(format!(
            "cloud ceiling must be a non-negative fraction, got {}",
            max_cloud_cover
        )));
    }

    let region_bounds = region.bounds();
    let mut selected: Vec<(&T, SceneFootprint)> = items
        .iter()
        .map(|item| (item, footprint(item)))
        .filter(|(_, fp)| {
            fp.bounds.intersects(&region_bounds)
                && window.contains(fp.acquired)
                && fp.cloud_cover < max_cloud_cover
        })
        .collect();

    log::debug!(
        "{} of {} catalog entries match {} within {} below {:.0}% cloud",
        selected.len(),
        items.len(),
        region,
        window,
        max_cloud_cover * 100.0
    );

    if selected.is_empty() {
        return Err(ChangeError::NoScenesFound {
            window: None,
            range: window.to_string(),
            region: region.to_string(),
        });
    }

    if order == SceneOrder::AscendingCloud {
        selected.sort_by(|(_, a), (_, b)| compare_by_cloud(a.cloud_cover, a.acquired, b.cloud_cover, b.acquired));
    }

    Ok(selected.into_iter().map(|(item, _)| item).collect())
}

/// Clearer first, then more recent first
pub fn compare_by_cloud(a_cloud: f64, a_date: NaiveDate, b_cloud: f64, b_date: NaiveDate) -> Ordering {
    a_cloud.total_cmp(&b_cloud).then_with(|| b_date.cmp(&a_date))
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    scenes: Vec<Scene>,
}

impl MemoryCatalog {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl ImageSource for MemoryCatalog {
    fn query(
        &self,
        region: &Region,
        window: &TimeWindow,
        max_cloud_cover: f64,
        order: SceneOrder,
    ) -> ChangeResult<SceneStream<'_>> {
        let selected = select_scenes(
            &self.scenes,
            |scene| SceneFootprint {
                acquired: scene.acquired,
                cloud_cover: scene.cloud_cover,
                bounds: scene.raster.grid().bounds(),
            },
            region,
            window,
            max_cloud_cover,
            order,
        )?;
        let matched = selected.len();
        Ok(SceneStream::new(matched, selected.into_iter().map(|scene| Ok(scene.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, GridSpec, Raster};
    use ndarray::Array2;

    fn scene(id: &str, date: &str, cloud: f64, lon: f64) -> Scene {
        let grid = GridSpec::new(GeoTransform::north_up(lon, 23.5, 0.1, 0.1), 5, 5);
        Scene {
            id: id.to_string(),
            acquired: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            cloud_cover: cloud,
            raster: Raster::from_dense(grid, [("SR_B4", Array2::from_elem((5, 5), 0.3f32))]).unwrap(),
        }
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            scene("a", "2009-02-01", 0.30, 120.4),
            scene("b", "2009-03-01", 0.10, 120.4),
            scene("c", "2009-04-01", 0.10, 120.4),
            scene("cloudy", "2009-05-01", 0.80, 120.4),
            scene("late", "2010-02-01", 0.05, 120.4),
            scene("elsewhere", "2009-02-01", 0.05, 10.0),
        ])
    }

    #[test]
    fn test_query_filters_and_orders() {
        let region = Region::point_buffer(120.63, 23.16, 15000.0).unwrap();
        let window = TimeWindow::parse("2009-01-01", "2009-07-31").unwrap();

        let catalog = catalog();
        let stream = catalog.query(&region, &window, 0.5, SceneOrder::AscendingCloud).unwrap();
        assert_eq!(stream.matched(), 3);
        let ids: Vec<String> = stream.map(|s| s.unwrap().id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_query_unordered_keeps_catalog_order() {
        let region = Region::point_buffer(120.63, 23.16, 15000.0).unwrap();
        let window = TimeWindow::parse("2009-01-01", "2009-07-31").unwrap();
        let catalog = catalog();

        let ids: Vec<String> = catalog
            .query(&region, &window, 1.0, SceneOrder::Unordered)
            .unwrap()
            .map(|s| s.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "cloudy"]);
    }

    #[test]
    fn test_empty_query_is_an_error() {
        let region = Region::point_buffer(120.63, 23.16, 15000.0).unwrap();
        let window = TimeWindow::parse("1970-01-01", "1970-12-31").unwrap();

        let catalog = catalog();
        let result = catalog.query(&region, &window, 0.5, SceneOrder::Unordered);
        assert!(matches!(result, Err(ChangeError::NoScenesFound { window: None, .. })));
    }

    #[test]
    fn test_invalid_cloud_ceiling() {
        let region = Region::point_buffer(120.63, 23.16, 15000.0).unwrap();
        let window = TimeWindow::parse("2009-01-01", "2009-07-31").unwrap();
        let catalog = catalog();
        let result = catalog.query(&region, &window, f64::NAN, SceneOrder::Unordered);
        assert!(matches!(result, Err(ChangeError::InvalidConfig(_))));
    }
}
