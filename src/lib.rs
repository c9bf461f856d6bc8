//! ndchange: before/after vegetation change detection
//!
//! Builds cloud-filtered composites for two time windows, derives a
//! normalized difference index (NDVI) from each, subtracts them and
//! summarises loss / neutral / gain over a region of interest.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    Band, BoundingBox, ChangeClass, ChangeError, ChangeResult, ClassificationResult, ClassifiedRaster,
    DifferenceRaster, GeoTransform, GridSpec, IndexRaster, Raster, Region, Scene, TimeWindow, WindowRole,
};

pub use io::{CatalogClient, CatalogConfig, Credentials, ImageSource, LocalCatalog, MemoryCatalog, SceneOrder};
pub use core::{ChangeConfig, ChangePipeline, ChangeReport, ChangeThresholds, CompositePolicy, Compositor};
