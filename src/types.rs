use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mean Earth radius (meters), used for buffer distances and cell areas
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// One band of cell values; `None` marks a no-data cell
pub type Band = Array2<Option<f32>>;

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform from a top-left corner and a square-ish pixel size
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_height.abs(),
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// Geographic position of a fractional (row, col) location
    fn apply(&self, row: f64, col: f64) -> (f64, f64) {
        let x = self.top_left_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.top_left_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }
}

/// Extent and resolution shared by every band of a raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn new(transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self { transform, rows, cols }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// (lon, lat) of the centre of a cell
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.apply(row as f64 + 0.5, col as f64 + 0.5)
    }

    pub fn bounds(&self) -> BoundingBox {
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(0.0, self.cols as f64),
            self.transform.apply(self.rows as f64, 0.0),
            self.transform.apply(self.rows as f64, self.cols as f64),
        ];
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bbox.min_lon = bbox.min_lon.min(x);
            bbox.max_lon = bbox.max_lon.max(x);
            bbox.min_lat = bbox.min_lat.min(y);
            bbox.max_lat = bbox.max_lat.max(y);
        }
        bbox
    }

    /// Whether two grids describe the same cells, up to float noise
    pub fn matches(&self, other: &GridSpec) -> bool {
        let a = &self.transform;
        let b = &other.transform;
        let eps = 1e-9;
        self.rows == other.rows
            && self.cols == other.cols
            && approx::abs_diff_eq!(a.top_left_x, b.top_left_x, epsilon = eps)
            && approx::abs_diff_eq!(a.top_left_y, b.top_left_y, epsilon = eps)
            && approx::abs_diff_eq!(a.pixel_width, b.pixel_width, epsilon = eps)
            && approx::abs_diff_eq!(a.pixel_height, b.pixel_height, epsilon = eps)
            && approx::abs_diff_eq!(a.rotation_x, b.rotation_x, epsilon = eps)
            && approx::abs_diff_eq!(a.rotation_y, b.rotation_y, epsilon = eps)
    }

    fn check_unrotated(&self) -> ChangeResult<()> {
        if self.transform.rotation_x != 0.0 || self.transform.rotation_y != 0.0 {
            return Err(ChangeError::GridMismatch(format!(
                "rotated grids are not supported: {:?}",
                self.transform
            )));
        }
        Ok(())
    }

    /// Grid on this grid's cell lattice holding every cell centred inside
    /// `bbox`. The result may extend past this grid's own extent.
    pub fn lattice_window(&self, bbox: &BoundingBox) -> ChangeResult<GridSpec> {
        self.check_unrotated()?;
        let t = &self.transform;

        // Fractional cell index of a coordinate, shifted so that ceil/floor
        // select the cells whose centres lie within [lo, hi]
        let span = |lo: f64, hi: f64, origin: f64, step: f64| {
            let (a, b) = ((lo - origin) / step - 0.5, (hi - origin) / step - 0.5);
            (a.min(b).ceil(), a.max(b).floor())
        };
        let (first_col, last_col) = span(bbox.min_lon, bbox.max_lon, t.top_left_x, t.pixel_width);
        let (first_row, last_row) = span(bbox.min_lat, bbox.max_lat, t.top_left_y, t.pixel_height);

        if last_col < first_col || last_row < first_row {
            return Err(ChangeError::Processing(format!(
                "no cell of the {}x{} lattice is centred inside {:?}",
                t.pixel_width.abs(),
                t.pixel_height.abs(),
                bbox
            )));
        }

        let (x, y) = t.apply(first_row, first_col);
        Ok(GridSpec {
            transform: GeoTransform {
                top_left_x: x,
                top_left_y: y,
                ..*t
            },
            rows: (last_row - first_row) as usize + 1,
            cols: (last_col - first_col) as usize + 1,
        })
    }

    /// (row, col) of this grid's top-left cell within `target`, which must
    /// share its cell size and cell boundaries
    pub fn lattice_offset(&self, target: &GridSpec) -> ChangeResult<(i64, i64)> {
        self.check_unrotated()?;
        target.check_unrotated()?;
        let a = &self.transform;
        let b = &target.transform;

        let same_size = approx::relative_eq!(a.pixel_width, b.pixel_width, max_relative = 1e-9)
            && approx::relative_eq!(a.pixel_height, b.pixel_height, max_relative = 1e-9);
        let col = (a.top_left_x - b.top_left_x) / b.pixel_width;
        let row = (a.top_left_y - b.top_left_y) / b.pixel_height;
        let aligned = (col - col.round()).abs() < 1e-6 && (row - row.round()).abs() < 1e-6;

        if !same_size || !aligned {
            return Err(ChangeError::GridMismatch(format!(
                "grid {:?} is not aligned with the lattice of {:?}",
                a, b
            )));
        }
        Ok((row.round() as i64, col.round() as i64))
    }

    /// Approximate ground area of one cell at the given latitude (m²)
    pub fn cell_area_m2(&self, lat: f64) -> f64 {
        let meters_per_degree = EARTH_RADIUS_M.to_radians();
        let width = self.transform.pixel_width.abs() * meters_per_degree * lat.to_radians().cos();
        let height = self.transform.pixel_height.abs() * meters_per_degree;
        width * height
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RegionShape {
    PointBuffer { lon: f64, lat: f64, radius_m: f64 },
    Polygon { ring: Vec<(f64, f64)> },
}

/// Area of interest: a buffered point or a simple polygon, lon/lat degrees
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    shape: RegionShape,
}

fn check_coordinate(lon: f64, lat: f64) -> ChangeResult<()> {
    if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(ChangeError::DegenerateRegion(format!(
            "coordinate ({}, {}) is outside the geographic domain",
            lon, lat
        )));
    }
    Ok(())
}

/// Great-circle distance in meters
fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

fn shoelace(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x1, y1) = ring[i];
        let (x2, y2) = ring[(i + 1) % n];
        sum += x1 * y2 - x2 * y1;
    }
    sum / 2.0
}

impl Region {
    /// Circle of `radius_m` meters around a point
    pub fn point_buffer(lon: f64, lat: f64, radius_m: f64) -> ChangeResult<Self> {
        check_coordinate(lon, lat)?;
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ChangeError::DegenerateRegion(format!(
                "buffer radius must be positive, got {}",
                radius_m
            )));
        }
        Ok(Self {
            shape: RegionShape::PointBuffer { lon, lat, radius_m },
        })
    }

    /// Simple polygon from an exterior ring; a closing vertex is optional
    pub fn polygon(mut ring: Vec<(f64, f64)>) -> ChangeResult<Self> {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(ChangeError::DegenerateRegion(format!(
                "polygon needs at least 3 vertices, got {}",
                ring.len()
            )));
        }
        for &(lon, lat) in &ring {
            check_coordinate(lon, lat)?;
        }
        if shoelace(&ring).abs() < 1e-12 {
            return Err(ChangeError::DegenerateRegion("polygon has zero area".to_string()));
        }
        Ok(Self {
            shape: RegionShape::Polygon { ring },
        })
    }

    pub fn rectangle(bbox: &BoundingBox) -> ChangeResult<Self> {
        Self::polygon(vec![
            (bbox.min_lon, bbox.min_lat),
            (bbox.max_lon, bbox.min_lat),
            (bbox.max_lon, bbox.max_lat),
            (bbox.min_lon, bbox.max_lat),
        ])
    }

    /// The bounding rectangle of this region as a region of its own
    pub fn to_bounds_region(&self) -> ChangeResult<Self> {
        Self::rectangle(&self.bounds())
    }

    pub fn bounds(&self) -> BoundingBox {
        match &self.shape {
            RegionShape::PointBuffer { lon, lat, radius_m } => {
                let dlat = (radius_m / EARTH_RADIUS_M).to_degrees();
                let dlon = dlat / lat.to_radians().cos().max(1e-6);
                BoundingBox {
                    min_lon: lon - dlon,
                    max_lon: lon + dlon,
                    min_lat: lat - dlat,
                    max_lat: lat + dlat,
                }
            }
            RegionShape::Polygon { ring } => {
                let mut bbox = BoundingBox {
                    min_lon: f64::INFINITY,
                    max_lon: f64::NEG_INFINITY,
                    min_lat: f64::INFINITY,
                    max_lat: f64::NEG_INFINITY,
                };
                for &(lon, lat) in ring {
                    bbox.min_lon = bbox.min_lon.min(lon);
                    bbox.max_lon = bbox.max_lon.max(lon);
                    bbox.min_lat = bbox.min_lat.min(lat);
                    bbox.max_lat = bbox.max_lat.max(lat);
                }
                bbox
            }
        }
    }

    /// Whether a point lies inside the region footprint
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match &self.shape {
            RegionShape::PointBuffer {
                lon: clon,
                lat: clat,
                radius_m,
            } => haversine_m(*clon, *clat, lon, lat) <= *radius_m,
            RegionShape::Polygon { ring } => {
                // Even-odd ray casting
                let mut inside = false;
                let mut j = ring.len() - 1;
                for i in 0..ring.len() {
                    let (xi, yi) = ring[i];
                    let (xj, yj) = ring[j];
                    if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
                        inside = !inside;
                    }
                    j = i;
                }
                inside
            }
        }
    }

    pub fn centroid(&self) -> (f64, f64) {
        match &self.shape {
            RegionShape::PointBuffer { lon, lat, .. } => (*lon, *lat),
            RegionShape::Polygon { ring } => {
                let n = ring.len() as f64;
                let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
                (sx / n, sy / n)
            }
        }
    }

    /// Approximate footprint area in m²
    pub fn area_m2(&self) -> f64 {
        match &self.shape {
            RegionShape::PointBuffer { radius_m, .. } => std::f64::consts::PI * radius_m * radius_m,
            RegionShape::Polygon { ring } => {
                let (_, lat) = self.centroid();
                let meters_per_degree = EARTH_RADIUS_M.to_radians();
                shoelace(ring).abs() * meters_per_degree * meters_per_degree * lat.to_radians().cos()
            }
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            RegionShape::PointBuffer { lon, lat, radius_m } => {
                write!(f, "buffer(point({}, {}), {}m)", lon, lat, radius_m)
            }
            RegionShape::Polygon { ring } => write!(f, "polygon({} vertices)", ring.len()),
        }
    }
}

/// Calendar date range used to select scenes, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ChangeResult<Self> {
        if start >= end {
            return Err(ChangeError::InvalidWindow(format!(
                "start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> ChangeResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| ChangeError::InvalidWindow(format!("invalid date '{}': {}", s, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Which side of the disturbance a window describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowRole {
    Pre,
    Post,
}

impl fmt::Display for WindowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowRole::Pre => write!(f, "pre"),
            WindowRole::Post => write!(f, "post"),
        }
    }
}

/// Multi-band raster over a fixed grid. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    grid: GridSpec,
    bands: BTreeMap<String, Band>,
}

impl Raster {
    pub fn new(grid: GridSpec, bands: BTreeMap<String, Band>) -> ChangeResult<Self> {
        for (name, band) in &bands {
            if band.dim() != grid.shape() {
                return Err(ChangeError::GridMismatch(format!(
                    "band {} is {:?} but the grid is {:?}",
                    name,
                    band.dim(),
                    grid.shape()
                )));
            }
        }
        Ok(Self { grid, bands })
    }

    /// Build a raster from dense band values, treating NaN as no data
    pub fn from_dense<I, S>(grid: GridSpec, bands: I) -> ChangeResult<Self>
    where
        I: IntoIterator<Item = (S, Array2<f32>)>,
        S: Into<String>,
    {
        let bands = bands
            .into_iter()
            .map(|(name, values)| (name.into(), values.mapv(|v| if v.is_nan() { None } else { Some(v) })))
            .collect();
        Self::new(grid, bands)
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn band(&self, name: &str) -> ChangeResult<&Band> {
        self.bands.get(name).ok_or_else(|| ChangeError::BandNotFound {
            band: name.to_string(),
            available: self.band_names().join(", "),
        })
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.contains_key(name)
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.keys().cloned().collect()
    }

    pub fn bands(&self) -> impl Iterator<Item = (&str, &Band)> {
        self.bands.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_bands(self) -> BTreeMap<String, Band> {
        self.bands
    }

    /// Copy of this raster on `target`, a grid on the same cell lattice.
    /// Target cells this raster does not cover have no data.
    pub fn place_on(&self, target: &GridSpec) -> ChangeResult<Raster> {
        let (row_offset, col_offset) = self.grid.lattice_offset(target)?;

        // (source start, target start, length) of the overlap along one axis
        let overlap = |offset: i64, len: usize, target_len: usize| {
            let start = offset.max(0);
            let end = (offset + len as i64).min(target_len as i64);
            (end > start).then(|| ((start - offset) as usize, start as usize, (end - start) as usize))
        };
        let rows = overlap(row_offset, self.grid.rows, target.rows);
        let cols = overlap(col_offset, self.grid.cols, target.cols);
        if rows.is_none() || cols.is_none() {
            log::debug!("Raster {:?} does not reach the target grid", self.grid.bounds());
        }

        let bands = self
            .bands
            .iter()
            .map(|(name, band)| {
                let mut placed: Band = Array2::from_elem(target.shape(), None);
                if let (Some((src_row, dst_row, n_rows)), Some((src_col, dst_col, n_cols))) = (rows, cols) {
                    placed
                        .slice_mut(ndarray::s![dst_row..dst_row + n_rows, dst_col..dst_col + n_cols])
                        .assign(&band.slice(ndarray::s![src_row..src_row + n_rows, src_col..src_col + n_cols]));
                }
                (name.clone(), placed)
            })
            .collect();
        Ok(Raster { grid: *target, bands })
    }
}

/// One catalog entry with its pixels
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub acquired: NaiveDate,
    /// Cloud-cover fraction in [0, 1]
    pub cloud_cover: f64,
    pub raster: Raster,
}

/// Single-band vegetation index raster, values in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRaster {
    grid: GridSpec,
    values: Band,
}

impl IndexRaster {
    pub fn new(grid: GridSpec, values: Band) -> ChangeResult<Self> {
        if values.dim() != grid.shape() {
            return Err(ChangeError::GridMismatch(format!(
                "index values are {:?} but the grid is {:?}",
                values.dim(),
                grid.shape()
            )));
        }
        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn values(&self) -> &Band {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.values.get((row, col)).copied().flatten()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Per-cell post minus pre index, roughly [-2, 2]
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceRaster {
    grid: GridSpec,
    values: Band,
}

impl DifferenceRaster {
    pub fn new(grid: GridSpec, values: Band) -> ChangeResult<Self> {
        if values.dim() != grid.shape() {
            return Err(ChangeError::GridMismatch(format!(
                "difference values are {:?} but the grid is {:?}",
                values.dim(),
                grid.shape()
            )));
        }
        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn values(&self) -> &Band {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.values.get((row, col)).copied().flatten()
    }

    /// Dense copy for display layers; no data becomes NaN
    pub fn to_nan_array(&self) -> Array2<f32> {
        self.values.mapv(|v| v.unwrap_or(f32::NAN))
    }
}

/// Change category of a classified cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeClass {
    Loss,
    Neutral,
    Gain,
}

impl ChangeClass {
    pub const ALL: [ChangeClass; 3] = [ChangeClass::Loss, ChangeClass::Neutral, ChangeClass::Gain];

    pub fn label(&self) -> &'static str {
        match self {
            ChangeClass::Loss => "loss",
            ChangeClass::Neutral => "neutral",
            ChangeClass::Gain => "gain",
        }
    }
}

impl fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-cell change categories; `None` cells had no data
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRaster {
    grid: GridSpec,
    classes: Array2<Option<ChangeClass>>,
}

impl ClassifiedRaster {
    pub fn new(grid: GridSpec, classes: Array2<Option<ChangeClass>>) -> ChangeResult<Self> {
        if classes.dim() != grid.shape() {
            return Err(ChangeError::GridMismatch(format!(
                "classes are {:?} but the grid is {:?}",
                classes.dim(),
                grid.shape()
            )));
        }
        Ok(Self { grid, classes })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn classes(&self) -> &Array2<Option<ChangeClass>> {
        &self.classes
    }

    pub fn get(&self, row: usize, col: usize) -> Option<ChangeClass> {
        self.classes.get((row, col)).copied().flatten()
    }
}

/// Cell counts per change class over a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    counts: BTreeMap<ChangeClass, u64>,
    total: u64,
    cell_area_m2: f64,
}

impl ClassificationResult {
    /// `total` is the number of classified cells and must cover every count
    pub fn new(counts: BTreeMap<ChangeClass, u64>, total: u64, cell_area_m2: f64) -> ChangeResult<Self> {
        let sum: u64 = counts.values().sum();
        if sum > total {
            return Err(ChangeError::Processing(format!(
                "category counts ({}) exceed the total ({})",
                sum, total
            )));
        }
        Ok(Self {
            counts,
            total,
            cell_area_m2,
        })
    }

    pub fn count(&self, class: ChangeClass) -> u64 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Share of classified cells in `class`; zero when nothing was classified
    pub fn ratio(&self, class: ChangeClass) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(class) as f64 / self.total as f64
        }
    }

    pub fn ratios(&self) -> BTreeMap<ChangeClass, f64> {
        ChangeClass::ALL.iter().map(|&c| (c, self.ratio(c))).collect()
    }

    pub fn cell_area_m2(&self) -> f64 {
        self.cell_area_m2
    }

    pub fn area_m2(&self, class: ChangeClass) -> f64 {
        self.count(class) as f64 * self.cell_area_m2
    }
}

/// Error types for change detection
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    #[error("No scenes found{} in {range} over {region}", describe_window(.window))]
    NoScenesFound {
        window: Option<WindowRole>,
        range: String,
        region: String,
    },

    #[error("Degenerate region: {0}")]
    DegenerateRegion(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Band '{band}' not found (available: {available})")]
    BandNotFound { band: String, available: String },

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Cannot composite an empty scene set")]
    EmptyComposite,

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Catalog metadata error: {0}")]
    Metadata(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "geotiff")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

fn describe_window(window: &Option<WindowRole>) -> String {
    match window {
        Some(role) => format!(" for the {} window", role),
        None => String::new(),
    }
}

impl ChangeError {
    /// Attach the pipeline window to a catalog-level `NoScenesFound`
    pub fn with_window(self, role: WindowRole) -> Self {
        match self {
            ChangeError::NoScenesFound { range, region, .. } => ChangeError::NoScenesFound {
                window: Some(role),
                range,
                region,
            },
            other => other,
        }
    }
}

/// Result type for change detection operations
pub type ChangeResult<T> = Result<T, ChangeError>;
