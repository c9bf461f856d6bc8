use crate::types::{Band, ChangeResult, Raster, Scene};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Landsat Collection 2 Level-2 surface reflectance preparation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandsatC2Params {
    /// Multiplicative scale applied to optical DNs
    pub scale: f32,
    /// Additive offset applied after scaling
    pub offset: f32,
    /// Bands whose name starts with this prefix are scaled
    pub optical_prefix: String,
    /// Quality band holding the per-pixel bit flags; `None` disables masking
    pub qa_band: Option<String>,
    /// QA bits that mark a cell as unusable
    pub mask_bits: Vec<u8>,
}

impl Default for LandsatC2Params {
    fn default() -> Self {
        Self {
            scale: 0.0000275,
            offset: -0.2,
            optical_prefix: "SR_B".to_string(),
            qa_band: Some("QA_PIXEL".to_string()),
            mask_bits: vec![3, 4], // cloud, cloud shadow
        }
    }
}

impl LandsatC2Params {
    fn flag_mask(&self) -> u32 {
        self.mask_bits.iter().fold(0u32, |acc, &bit| acc | (1u32 << bit.min(31)))
    }
}

/// Scale optical bands to reflectance and blank out flagged cells
pub fn preprocess_scene(scene: Scene, params: &LandsatC2Params) -> ChangeResult<Scene> {
    let raster = &scene.raster;
    let grid = *raster.grid();

    let valid = match &params.qa_band {
        Some(qa_name) => {
            let qa = raster.band(qa_name)?;
            let flags = params.flag_mask();
            qa.mapv(|word| match word {
                Some(word) if word >= 0.0 => (word as u32) & flags == 0,
                _ => false,
            })
        }
        None => ndarray::Array2::from_elem(grid.shape(), true),
    };

    let masked = valid.iter().filter(|ok| !**ok).count();
    log::debug!(
        "Scene {}: {} of {} cells flagged by QA",
        scene.id,
        masked,
        grid.rows * grid.cols
    );

    let bands = raster
        .bands()
        .map(|(name, band)| {
            let optical = name.starts_with(&params.optical_prefix);
            let out: Band = Zip::from(band).and(&valid).map_collect(|&value, &ok| {
                if !ok {
                    return None;
                }
                if optical {
                    value.map(|v| v * params.scale + params.offset)
                } else {
                    value
                }
            });
            (name.to_string(), out)
        })
        .collect();

    Ok(Scene {
        raster: Raster::new(grid, bands)?,
        ..scene
    })
}
