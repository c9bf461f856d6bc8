use crate::io::catalog::{compare_by_cloud, SceneOrder};
use crate::types::{Band, ChangeError, ChangeResult, GridSpec, Raster, Region, Scene};
use ndarray::Array2;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// How a set of scenes is reduced to one raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositePolicy {
    /// Per-cell, per-band median over every scene covering the cell
    Median,
    /// The clearest scene, most recent on ties
    BestSingle,
}

impl CompositePolicy {
    /// Order the catalog should yield scenes in for this policy
    pub fn scene_order(&self) -> SceneOrder {
        match self {
            CompositePolicy::Median => SceneOrder::Unordered,
            CompositePolicy::BestSingle => SceneOrder::AscendingCloud,
        }
    }
}

/// Reduces a scene sequence to a single raster over a region
pub struct Compositor {
    policy: CompositePolicy,
    ordered_input: bool,
}

impl Compositor {
    pub fn new(policy: CompositePolicy) -> Self {
        Self {
            policy,
            ordered_input: false,
        }
    }

    /// Scenes arrive in `policy.scene_order()`, so BestSingle can stop at
    /// the first one instead of reading the whole sequence
    pub fn assume_ordered(mut self) -> Self {
        self.ordered_input = true;
        self
    }

    pub fn policy(&self) -> CompositePolicy {
        self.policy
    }

    /// Composite `scenes` onto a grid covering the bounds of `region`.
    ///
    /// The output grid lies on the cell lattice of the first scene; every
    /// scene must share that lattice but may cover any part of the region.
    /// Cells no scene covers have no data. An empty sequence is an error,
    /// never an all-empty raster.
    pub fn composite<I>(&self, scenes: I, region: &Region) -> ChangeResult<Raster>
    where
        I: IntoIterator<Item = ChangeResult<Scene>>,
    {
        log::info!("Compositing scenes with {:?} policy", self.policy);
        let bounds = region.bounds();

        match self.policy {
            CompositePolicy::Median => {
                let mut target: Option<GridSpec> = None;
                let mut placed = Vec::new();
                for scene in scenes {
                    let scene = scene?;
                    log::debug!("Adding scene {} ({}, {:.1}% cloud)", scene.id, scene.acquired, scene.cloud_cover * 100.0);
                    let grid = match target {
                        Some(grid) => grid,
                        None => *target.insert(scene.raster.grid().lattice_window(&bounds)?),
                    };
                    placed.push(place_scene(&scene, &grid)?);
                }
                median_composite(&placed)
            }
            CompositePolicy::BestSingle => {
                let best = if self.ordered_input {
                    scenes.into_iter().next().transpose()?
                } else {
                    best_scene(scenes)?
                };
                let best = best.ok_or(ChangeError::EmptyComposite)?;
                log::info!(
                    "Selected scene {} ({}, {:.1}% cloud)",
                    best.id,
                    best.acquired,
                    best.cloud_cover * 100.0
                );
                let grid = best.raster.grid().lattice_window(&bounds)?;
                place_scene(&best, &grid)
            }
        }
    }
}

fn best_scene<I>(scenes: I) -> ChangeResult<Option<Scene>>
where
    I: IntoIterator<Item = ChangeResult<Scene>>,
{
    let mut best: Option<Scene> = None;
    for scene in scenes {
        let scene = scene?;
        let replace = match &best {
            None => true,
            Some(current) => {
                compare_by_cloud(scene.cloud_cover, scene.acquired, current.cloud_cover, current.acquired)
                    == Ordering::Less
            }
        };
        if replace {
            best = Some(scene);
        }
    }
    Ok(best)
}

fn place_scene(scene: &Scene, grid: &GridSpec) -> ChangeResult<Raster> {
    scene.raster.place_on(grid).map_err(|e| match e {
        ChangeError::GridMismatch(msg) => ChangeError::GridMismatch(format!("scene {}: {}", scene.id, msg)),
        other => other,
    })
}

fn median_composite(rasters: &[Raster]) -> ChangeResult<Raster> {
    let first = rasters.first().ok_or(ChangeError::EmptyComposite)?;
    let grid: GridSpec = *first.grid();
    log::debug!("Median of {} scenes on a {}x{} grid", rasters.len(), grid.rows, grid.cols);

    let names: BTreeSet<String> = rasters.iter().flat_map(|r| r.band_names()).collect();
    let mut bands = BTreeMap::new();
    for name in names {
        // Scenes lacking the band contribute no coverage for it
        let layers: Vec<&Band> = rasters.iter().filter_map(|raster| raster.band(&name).ok()).collect();
        let band = median_band(&layers, grid.shape())?;
        bands.insert(name, band);
    }

    Raster::new(grid, bands)
}

fn cell_median(layers: &[&Band], row: usize, col: usize) -> Option<f32> {
    let mut values: Vec<f32> = layers.iter().filter_map(|band| band[[row, col]]).collect();
    median(&mut values)
}

#[cfg(feature = "parallel")]
fn median_band(layers: &[&Band], shape: (usize, usize)) -> ChangeResult<Band> {
    use rayon::prelude::*;

    let (rows, cols) = shape;
    let data: Vec<Option<f32>> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| (0..cols).map(move |col| cell_median(layers, row, col)))
        .collect();

    Array2::from_shape_vec(shape, data)
        .map_err(|e| ChangeError::Processing(format!("Failed to assemble median band: {}", e)))
}

#[cfg(not(feature = "parallel"))]
fn median_band(layers: &[&Band], shape: (usize, usize)) -> ChangeResult<Band> {
    Ok(Array2::from_shape_fn(shape, |(row, col)| cell_median(layers, row, col)))
}

/// Median of the values; the mean of the two middle values for even counts
pub fn median<T: Float>(values: &mut [T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let two = T::one() + T::one();
        Some((values[mid - 1] + values[mid]) / two)
    }
}
