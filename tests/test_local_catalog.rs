use ndchange::core::{ChangeConfig, ChangePipeline, LandsatC2Params};
use ndchange::io::{CatalogClient, CatalogConfig, ImageSource, LocalCatalog, SceneOrder};
use ndchange::types::{ChangeClass, ChangeError, Region, TimeWindow};
use std::path::PathBuf;

const MANIFEST: &str = r#"<catalog>
  <collection>LANDSAT/LT05/C02/T1_L2</collection>
  <scene>
    <id>LT05_L2SP_117044_20090215_20200827_02_T1</id>
    <path>scenes/LT05_117044_20090215.tif</path>
    <cloudCover>12.0</cloudCover>
    <minLon>120.3</minLon><maxLon>121.0</maxLon>
    <minLat>22.8</minLat><maxLat>23.5</maxLat>
    <band>SR_B3</band><band>SR_B4</band><band>QA_PIXEL</band>
  </scene>
  <scene>
    <id>LT05_L2SP_117044_20090504_20200827_02_T1</id>
    <path>scenes/LT05_117044_20090504.tif</path>
    <cloudCover>64.0</cloudCover>
    <minLon>120.3</minLon><maxLon>121.0</maxLon>
    <minLat>22.8</minLat><maxLat>23.5</maxLat>
  </scene>
  <scene>
    <id>LT05_L2SP_117044_20100322_20200825_02_T1</id>
    <path>scenes/LT05_117044_20100322.tif</path>
    <cloudCover>8.5</cloudCover>
    <minLon>120.3</minLon><maxLon>121.0</maxLon>
    <minLat>22.8</minLat><maxLat>23.5</maxLat>
  </scene>
  <scene>
    <id>LT05_L2SP_118043_20100322_20200825_02_T1</id>
    <path>scenes/LT05_118043_20100322.tif</path>
    <cloudCover>3.0</cloudCover>
    <minLon>118.8</minLon><maxLon>119.5</maxLon>
    <minLat>24.2</minLat><maxLat>24.9</maxLat>
  </scene>
</catalog>"#;

fn study_region() -> Region {
    Region::point_buffer(120.63, 23.16, 15000.0).unwrap()
}

fn write_manifest() -> anyhow::Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("catalog.xml");
    std::fs::write(&path, MANIFEST)?;
    Ok((dir, path))
}

#[test]
fn test_manifest_query_filters_and_counts() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let (_dir, path) = write_manifest()?;
    let catalog = LocalCatalog::open(&path)?;

    let pre = TimeWindow::parse("2009-01-01", "2009-07-31")?;
    let stream = catalog.query(&study_region(), &pre, 0.5, SceneOrder::AscendingCloud)?;
    assert_eq!(stream.matched(), 1); // the 64% scene is over the ceiling

    // Other path/row does not intersect the region
    let post = TimeWindow::parse("2010-01-01", "2010-07-31")?;
    let stream = catalog.query(&study_region(), &post, 0.5, SceneOrder::Unordered)?;
    assert_eq!(stream.matched(), 1);
    Ok(())
}

#[test]
fn test_empty_window_reports_no_scenes() -> anyhow::Result<()> {
    let (_dir, path) = write_manifest()?;
    let client = CatalogClient::connect(CatalogConfig::local(&path))?;

    let window = TimeWindow::parse("1984-01-01", "1984-12-31")?;
    let err = client
        .query(&study_region(), &window, 0.5, SceneOrder::AscendingCloud)
        .err()
        .expect("query over an empty window must fail");
    assert!(matches!(err, ChangeError::NoScenesFound { window: None, .. }));
    Ok(())
}

#[test]
fn test_missing_scene_file_fails_the_run() -> anyhow::Result<()> {
    let (_dir, path) = write_manifest()?;
    let pipeline = ChangePipeline::new(LocalCatalog::open(&path)?);
    let pre = TimeWindow::parse("2009-01-01", "2009-07-31")?;
    let post = TimeWindow::parse("2010-01-01", "2010-07-31")?;

    let result = pipeline.run(&study_region(), &pre, &post, &ChangeConfig::default());
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_malformed_manifest_is_an_xml_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("catalog.xml");
    std::fs::write(&path, "<catalog><scene><id>broken")?;
    assert!(matches!(LocalCatalog::open(&path), Err(ChangeError::XmlParsing(_))));
    Ok(())
}

#[cfg(feature = "geotiff")]
#[test]
fn test_change_detection_with_real_data() {
    let _ = env_logger::builder().is_test(true).try_init();
    // Morakot scenes exported as GeoTIFF with a manifest next to them
    let manifest = std::env::var("NDCHANGE_TEST_MANIFEST")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/home/datacube/ndchange/data/morakot/catalog.xml"));

    if !manifest.exists() {
        println!("Test data not found, skipping real data change detection test");
        return;
    }

    let client = CatalogClient::connect(CatalogConfig::local(&manifest)).expect("Failed to open catalog");
    let pipeline = ChangePipeline::new(client);
    let pre = TimeWindow::parse("2009-01-01", "2009-07-31").unwrap();
    let post = TimeWindow::parse("2010-01-01", "2010-07-31").unwrap();
    let config = ChangeConfig {
        preprocess: Some(LandsatC2Params::default()),
        ..ChangeConfig::default()
    };

    let report = pipeline
        .run(&study_region(), &pre, &post, &config)
        .expect("Change detection failed");
    let result = &report.classification;

    println!("Pre scenes: {}, post scenes: {}", report.pre_scene_count, report.post_scene_count);
    for class in ChangeClass::ALL {
        println!(
            "  {}: {:.2}% ({:.1} km²)",
            class,
            result.ratio(class) * 100.0,
            result.area_m2(class) / 1e6
        );
    }

    assert!(result.total() > 0);
    assert!(result.ratio(ChangeClass::Loss) > result.ratio(ChangeClass::Gain));
}
