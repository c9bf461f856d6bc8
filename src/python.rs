use crate::core::{ChangeConfig, ChangePipeline, CompositePolicy, LandsatC2Params};
use crate::io::{CatalogClient, CatalogConfig};
use crate::types::{ChangeClass, ChangeError, Region, TimeWindow};
use ndarray::Array2;
use numpy::{PyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

fn to_py_err(e: ChangeError) -> PyErr {
    match e {
        ChangeError::DegenerateRegion(_)
        | ChangeError::InvalidWindow(_)
        | ChangeError::InvalidConfig(_)
        | ChangeError::BandNotFound { .. } => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyChangeConfig>()?;
    m.add_class::<PyChangeReport>()?;
    m.add_function(wrap_pyfunction!(run_change_detection, m)?)?;
    Ok(())
}

/// Python wrapper for ChangeConfig
#[pyclass(name = "ChangeConfig")]
#[derive(Clone)]
struct PyChangeConfig {
    inner: ChangeConfig,
}

#[pymethods]
impl PyChangeConfig {
    #[new]
    #[pyo3(signature = (
        band_a = "SR_B4",
        band_b = "SR_B3",
        cloud_ceiling = 0.5,
        policy = "median",
        low_threshold = -0.1,
        high_threshold = 0.1,
        landsat_c2 = false
    ))]
    fn new(
        band_a: &str,
        band_b: &str,
        cloud_ceiling: f64,
        policy: &str,
        low_threshold: f32,
        high_threshold: f32,
        landsat_c2: bool,
    ) -> PyResult<Self> {
        let composite_policy = match policy.to_lowercase().as_str() {
            "median" => CompositePolicy::Median,
            "best" | "best_single" => CompositePolicy::BestSingle,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Invalid composite policy: {}",
                    policy
                )))
            }
        };
        let inner = ChangeConfig {
            bands: (band_a.to_string(), band_b.to_string()),
            cloud_ceiling,
            composite_policy,
            low_threshold,
            high_threshold,
            preprocess: landsat_c2.then(LandsatC2Params::default),
        };
        inner.validate().map_err(to_py_err)?;
        Ok(PyChangeConfig { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "ChangeConfig(bands=({}, {}), cloud_ceiling={}, policy={:?}, thresholds=({}, {}))",
            self.inner.bands.0,
            self.inner.bands.1,
            self.inner.cloud_ceiling,
            self.inner.composite_policy,
            self.inner.low_threshold,
            self.inner.high_threshold
        )
    }
}

/// Python view of a ChangeReport; no-data cells are NaN in `difference`
#[pyclass(name = "ChangeReport")]
struct PyChangeReport {
    difference: Array2<f32>,
    #[pyo3(get)]
    ratios: HashMap<String, f64>,
    #[pyo3(get)]
    counts: HashMap<String, u64>,
    #[pyo3(get)]
    total: u64,
    #[pyo3(get)]
    pre_scene_count: usize,
    #[pyo3(get)]
    post_scene_count: usize,
    #[pyo3(get)]
    bounds: (f64, f64, f64, f64),
}

#[pymethods]
impl PyChangeReport {
    #[getter]
    fn difference<'py>(&self, py: Python<'py>) -> &'py PyArray2<f32> {
        self.difference.to_pyarray(py)
    }

    fn __repr__(&self) -> String {
        format!(
            "ChangeReport(total={}, pre_scenes={}, post_scenes={}, ratios={:?})",
            self.total, self.pre_scene_count, self.post_scene_count, self.ratios
        )
    }
}

/// Run a before/after analysis over a buffered point using a local manifest.
/// With `use_bounds` the buffer's bounding rectangle is analysed instead.
#[pyfunction]
#[pyo3(signature = (manifest, lon, lat, radius_m, pre_start, pre_end, post_start, post_end, config = None, use_bounds = false))]
#[allow(clippy::too_many_arguments)]
fn run_change_detection(
    py: Python<'_>,
    manifest: &str,
    lon: f64,
    lat: f64,
    radius_m: f64,
    pre_start: &str,
    pre_end: &str,
    post_start: &str,
    post_end: &str,
    config: Option<PyChangeConfig>,
    use_bounds: bool,
) -> PyResult<PyChangeReport> {
    let config = config.map(|c| c.inner).unwrap_or_default();
    let region = Region::point_buffer(lon, lat, radius_m).map_err(to_py_err)?;
    let region = if use_bounds {
        region.to_bounds_region().map_err(to_py_err)?
    } else {
        region
    };
    let pre = TimeWindow::parse(pre_start, pre_end).map_err(to_py_err)?;
    let post = TimeWindow::parse(post_start, post_end).map_err(to_py_err)?;

    let client = CatalogClient::connect(CatalogConfig::local(manifest)).map_err(to_py_err)?;
    let pipeline = ChangePipeline::new(client);
    let report = py
        .allow_threads(|| pipeline.run(&region, &pre, &post, &config))
        .map_err(to_py_err)?;

    let classification = &report.classification;
    let bounds = report.difference.grid().bounds();
    Ok(PyChangeReport {
        difference: report.difference.to_nan_array(),
        ratios: ChangeClass::ALL
            .iter()
            .map(|c| (c.label().to_string(), classification.ratio(*c)))
            .collect(),
        counts: ChangeClass::ALL
            .iter()
            .map(|c| (c.label().to_string(), classification.count(*c)))
            .collect(),
        total: classification.total(),
        pre_scene_count: report.pre_scene_count,
        post_scene_count: report.post_scene_count,
        bounds: (bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat),
    })
}
