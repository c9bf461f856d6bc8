use crate::types::{ChangeClass, ChangeError, ChangeResult, ClassifiedRaster, DifferenceRaster, IndexRaster};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Difference thresholds separating loss, neutral and gain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeThresholds {
    low: f32,
    high: f32,
}

impl ChangeThresholds {
    pub fn new(low: f32, high: f32) -> ChangeResult<Self> {
        if !low.is_finite() || !high.is_finite() {
            return Err(ChangeError::InvalidConfig(format!(
                "thresholds must be finite, got ({}, {})",
                low, high
            )));
        }
        if low > high {
            return Err(ChangeError::InvalidConfig(format!(
                "low threshold {} is above high threshold {}",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f32 {
        self.low
    }

    pub fn high(&self) -> f32 {
        self.high
    }

    /// Values equal to a threshold are neutral
    pub fn classify(&self, value: f32) -> ChangeClass {
        if value < self.low {
            ChangeClass::Loss
        } else if value > self.high {
            ChangeClass::Gain
        } else {
            ChangeClass::Neutral
        }
    }
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self { low: -0.1, high: 0.1 }
    }
}

/// Per-cell `post - pre`; no data on either side stays no data
pub fn difference(pre: &IndexRaster, post: &IndexRaster) -> ChangeResult<DifferenceRaster> {
    if !pre.grid().matches(post.grid()) {
        return Err(ChangeError::GridMismatch(format!(
            "pre-window grid {:?} differs from post-window grid {:?}",
            pre.grid(),
            post.grid()
        )));
    }

    let values = Zip::from(pre.values())
        .and(post.values())
        .map_collect(|&before, &after| match (before, after) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        });

    DifferenceRaster::new(*pre.grid(), values)
}

/// Assign every defined cell a change class
pub fn classify(diff: &DifferenceRaster, thresholds: &ChangeThresholds) -> ChangeResult<ClassifiedRaster> {
    log::debug!(
        "Classifying difference with thresholds ({}, {})",
        thresholds.low,
        thresholds.high
    );
    let classes = diff.values().mapv(|value| value.map(|v| thresholds.classify(v)));
    ClassifiedRaster::new(*diff.grid(), classes)
}
