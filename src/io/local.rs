use crate::io::catalog::{select_scenes, ImageSource, SceneFootprint, SceneOrder, SceneStream};
use crate::types::{BoundingBox, ChangeError, ChangeResult, Region, Scene, TimeWindow};
use chrono::NaiveDate;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root `<catalog>` element of a scene manifest
#[derive(Debug, Deserialize)]
struct ManifestXml {
    #[serde(rename = "collection", default)]
    collection: Option<String>,
    #[serde(rename = "scene", default)]
    scenes: Vec<SceneXml>,
}

#[derive(Debug, Deserialize)]
struct SceneXml {
    #[serde(rename = "id")]
    id: String,
    #[serde(rename = "path")]
    path: String,
    /// Percent, as published in Landsat metadata
    #[serde(rename = "cloudCover")]
    cloud_cover: f64,
    #[serde(rename = "acquired", default)]
    acquired: Option<String>,
    #[serde(rename = "minLon")]
    min_lon: f64,
    #[serde(rename = "maxLon")]
    max_lon: f64,
    #[serde(rename = "minLat")]
    min_lat: f64,
    #[serde(rename = "maxLat")]
    max_lat: f64,
    #[serde(rename = "band", default)]
    bands: Vec<String>,
}

/// One GeoTIFF scene listed in a manifest
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub path: PathBuf,
    pub acquired: NaiveDate,
    /// Fraction in [0, 1]
    pub cloud_cover: f64,
    pub bounds: BoundingBox,
    /// Band names in file order; empty means "use the GDAL descriptions"
    pub bands: Vec<String>,
}

/// Scene catalog backed by an XML manifest of GeoTIFF files
///
/// ```xml
/// <catalog>
///   <collection>LANDSAT/LT05/C02/T1_L2</collection>
///   <scene>
///     <id>LT05_L2SP_117044_20090215_20200827_02_T1</id>
///     <path>scenes/LT05_117044_20090215.tif</path>
///     <cloudCover>12.0</cloudCover>
///     <minLon>120.4</minLon><maxLon>120.9</maxLon>
///     <minLat>22.9</minLat><maxLat>23.4</maxLat>
///     <band>SR_B3</band><band>SR_B4</band><band>QA_PIXEL</band>
///   </scene>
/// </catalog>
/// ```
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    collection: Option<String>,
    entries: Vec<CatalogEntry>,
}

impl LocalCatalog {
    /// Load a manifest; relative scene paths resolve against its directory
    pub fn open<P: AsRef<Path>>(manifest_path: P) -> ChangeResult<Self> {
        let manifest_path = manifest_path.as_ref();
        log::info!("Opening scene manifest: {}", manifest_path.display());
        let xml = std::fs::read_to_string(manifest_path)?;
        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_manifest_str(&xml, base_dir)
    }

    pub fn from_manifest_str(xml: &str, base_dir: &Path) -> ChangeResult<Self> {
        let manifest = from_str::<ManifestXml>(xml)
            .map_err(|e| ChangeError::XmlParsing(format!("Failed to parse scene manifest: {}", e)))?;

        let mut entries = Vec::with_capacity(manifest.scenes.len());
        for scene in manifest.scenes {
            entries.push(Self::entry_from_xml(scene, base_dir)?);
        }

        log::info!(
            "Loaded {} scene(s) from {} manifest",
            entries.len(),
            manifest.collection.as_deref().unwrap_or("unnamed")
        );

        Ok(Self {
            collection: manifest.collection,
            entries,
        })
    }

    fn entry_from_xml(scene: SceneXml, base_dir: &Path) -> ChangeResult<CatalogEntry> {
        if !(0.0..=100.0).contains(&scene.cloud_cover) {
            return Err(ChangeError::Metadata(format!(
                "scene {} has cloud cover {} outside 0-100%",
                scene.id, scene.cloud_cover
            )));
        }
        if scene.min_lon >= scene.max_lon || scene.min_lat >= scene.max_lat {
            return Err(ChangeError::Metadata(format!("scene {} has an empty footprint", scene.id)));
        }

        let acquired = match scene.acquired.as_deref() {
            Some(date) => NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
                ChangeError::Metadata(format!("scene {} has invalid date '{}': {}", scene.id, date, e))
            })?,
            None => acquisition_date_from_id(&scene.id)?,
        };

        let path = PathBuf::from(&scene.path);
        let path = if path.is_absolute() { path } else { base_dir.join(path) };

        Ok(CatalogEntry {
            id: scene.id,
            path,
            acquired,
            cloud_cover: scene.cloud_cover / 100.0,
            bounds: BoundingBox {
                min_lon: scene.min_lon,
                max_lon: scene.max_lon,
                min_lat: scene.min_lat,
                max_lat: scene.max_lat,
            },
            bands: scene.bands,
        })
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// Capture date embedded in a Landsat Collection 2 product identifier,
/// e.g. `LT05_L2SP_117044_20090215_20200827_02_T1`
pub fn acquisition_date_from_id(id: &str) -> ChangeResult<NaiveDate> {
    let pattern = regex::Regex::new(r"^L[A-Z]\d{2}_[A-Z0-9]{4}_\d{6}_(\d{8})_")
        .map_err(|e| ChangeError::Processing(format!("invalid product id pattern: {}", e)))?;
    let captures = pattern.captures(id).ok_or_else(|| {
        ChangeError::Metadata(format!(
            "scene {} has no <acquired> date and is not a Landsat product id",
            id
        ))
    })?;
    NaiveDate::parse_from_str(&captures[1], "%Y%m%d")
        .map_err(|e| ChangeError::Metadata(format!("scene {} has an invalid capture date: {}", id, e)))
}

impl ImageSource for LocalCatalog {
    fn query(
        &self,
        region: &Region,
        window: &TimeWindow,
        max_cloud_cover: f64,
        order: SceneOrder,
    ) -> ChangeResult<SceneStream<'_>> {
        let selected = select_scenes(
            &self.entries,
            |entry| SceneFootprint {
                acquired: entry.acquired,
                cloud_cover: entry.cloud_cover,
                bounds: entry.bounds,
            },
            region,
            window,
            max_cloud_cover,
            order,
        )?;
        let matched = selected.len();
        Ok(SceneStream::new(matched, selected.into_iter().map(read_scene)))
    }
}

#[cfg(feature = "geotiff")]
fn read_scene(entry: &CatalogEntry) -> ChangeResult<Scene> {
    use crate::types::{GeoTransform, GridSpec, Raster};
    use gdal::{Dataset, Metadata};
    use ndarray::Array2;
    use std::collections::BTreeMap;

    log::debug!("Reading scene {} from {}", entry.id, entry.path.display());

    let dataset = Dataset::open(&entry.path)?;
    check_geographic(entry, &dataset)?;
    let geo_transform = dataset.geo_transform()?;
    let (width, height) = dataset.raster_size();
    let grid = GridSpec::new(GeoTransform::from_gdal(geo_transform), height, width);

    let mut bands = BTreeMap::new();
    for index in 1..=dataset.raster_count() {
        let rasterband = dataset.rasterband(index)?;
        let position = (index - 1) as usize;
        let name = match entry.bands.get(position) {
            Some(name) => name.clone(),
            None => match rasterband.description() {
                Ok(description) if !description.trim().is_empty() => description,
                _ => format!("B{}", index),
            },
        };

        let nodata = rasterband.no_data_value();
        let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let values = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| ChangeError::Processing(format!("Failed to reshape band {}: {}", name, e)))?
            .mapv(|v| {
                let is_nodata = v.is_nan() || nodata.map_or(false, |nd| v as f64 == nd);
                if is_nodata {
                    None
                } else {
                    Some(v)
                }
            });
        bands.insert(name, values);
    }

    log::debug!("Scene {}: {}x{} with bands {:?}", entry.id, width, height, bands.keys());

    Ok(Scene {
        id: entry.id.clone(),
        acquired: entry.acquired,
        cloud_cover: entry.cloud_cover,
        raster: Raster::new(grid, bands)?,
    })
}

/// Cell geometry is read as lon/lat degrees, so projected rasters are refused
#[cfg(feature = "geotiff")]
fn check_geographic(entry: &CatalogEntry, dataset: &gdal::Dataset) -> ChangeResult<()> {
    let srs = dataset.spatial_ref().map_err(|e| {
        ChangeError::Metadata(format!("scene {} has no spatial reference: {}", entry.id, e))
    })?;
    if srs.is_geographic() {
        return Ok(());
    }

    let crs = match (srs.auth_name(), srs.auth_code()) {
        (Ok(name), Ok(code)) => format!("{}:{}", name, code),
        _ => srs.to_proj4().unwrap_or_else(|_| "an unidentified CRS".to_string()),
    };
    Err(ChangeError::Metadata(format!(
        "scene {} is in projected {}; reproject it to geographic lon/lat (EPSG:4326)",
        entry.id, crs
    )))
}

#[cfg(not(feature = "geotiff"))]
fn read_scene(entry: &CatalogEntry) -> ChangeResult<Scene> {
    Err(ChangeError::Processing(format!(
        "cannot read {}: built without GeoTIFF support",
        entry.path.display()
    )))
}
