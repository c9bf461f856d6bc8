use crate::core::change::{classify, difference, ChangeThresholds};
use crate::core::composite::{CompositePolicy, Compositor};
use crate::core::index::normalized_difference;
use crate::core::preprocess::{preprocess_scene, LandsatC2Params};
use crate::core::statistics::aggregate;
use crate::io::catalog::ImageSource;
use crate::types::{
    ChangeClass, ChangeError, ChangeResult, ClassificationResult, DifferenceRaster, IndexRaster, Region, TimeWindow,
    WindowRole,
};
use serde::{Deserialize, Serialize};

/// Parameters of a before/after analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeConfig {
    /// (numerator-positive band, numerator-negative band), e.g. (NIR, red)
    pub bands: (String, String),
    /// Scenes must have cloud cover strictly below this fraction
    pub cloud_ceiling: f64,
    pub composite_policy: CompositePolicy,
    pub low_threshold: f32,
    pub high_threshold: f32,
    /// Landsat C2 scaling and QA masking applied to each scene
    #[serde(default)]
    pub preprocess: Option<LandsatC2Params>,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            bands: ("SR_B4".to_string(), "SR_B3".to_string()), // Landsat 5/7 NIR, red
            cloud_ceiling: 0.5,
            composite_policy: CompositePolicy::Median,
            low_threshold: -0.1,
            high_threshold: 0.1,
            preprocess: None,
        }
    }
}

impl ChangeConfig {
    pub fn validate(&self) -> ChangeResult<()> {
        let (a, b) = &self.bands;
        if a.trim().is_empty() || b.trim().is_empty() {
            return Err(ChangeError::InvalidConfig("band names must not be empty".to_string()));
        }
        if a == b {
            return Err(ChangeError::InvalidConfig(format!(
                "index bands must differ, got {} twice",
                a
            )));
        }
        if !self.cloud_ceiling.is_finite() || self.cloud_ceiling <= 0.0 {
            return Err(ChangeError::InvalidConfig(format!(
                "cloud ceiling must be a positive fraction, got {}",
                self.cloud_ceiling
            )));
        }
        self.thresholds()?;
        Ok(())
    }

    pub fn thresholds(&self) -> ChangeResult<ChangeThresholds> {
        ChangeThresholds::new(self.low_threshold, self.high_threshold)
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub difference: DifferenceRaster,
    pub classification: ClassificationResult,
    /// Scenes that fed the pre-window composite
    pub pre_scene_count: usize,
    /// Scenes that fed the post-window composite
    pub post_scene_count: usize,
}

/// Before/after change analysis over an image source
pub struct ChangePipeline<S> {
    source: S,
}

impl<S: ImageSource> ChangePipeline<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run both windows sequentially. Either window without scenes fails the
    /// whole run; no partial result is ever returned.
    pub fn run(
        &self,
        region: &Region,
        pre: &TimeWindow,
        post: &TimeWindow,
        config: &ChangeConfig,
    ) -> ChangeResult<ChangeReport> {
        config.validate()?;
        log::info!("Change analysis over {}: pre {} / post {}", region, pre, post);

        let (pre_index, pre_scene_count) = self.window_index(WindowRole::Pre, region, pre, config)?;
        let (post_index, post_scene_count) = self.window_index(WindowRole::Post, region, post, config)?;

        self.finish(region, config, pre_index, post_index, pre_scene_count, post_scene_count)
    }

    /// Same as [`run`](Self::run) with both windows evaluated concurrently.
    /// If both windows fail, the pre-window error is reported.
    #[cfg(feature = "parallel")]
    pub fn run_parallel(
        &self,
        region: &Region,
        pre: &TimeWindow,
        post: &TimeWindow,
        config: &ChangeConfig,
    ) -> ChangeResult<ChangeReport> {
        config.validate()?;
        log::info!("Parallel change analysis over {}: pre {} / post {}", region, pre, post);

        let (pre_result, post_result) = rayon::join(
            || self.window_index(WindowRole::Pre, region, pre, config),
            || self.window_index(WindowRole::Post, region, post, config),
        );
        let (pre_index, pre_scene_count) = pre_result?;
        let (post_index, post_scene_count) = post_result?;

        self.finish(region, config, pre_index, post_index, pre_scene_count, post_scene_count)
    }

    fn window_index(
        &self,
        role: WindowRole,
        region: &Region,
        window: &TimeWindow,
        config: &ChangeConfig,
    ) -> ChangeResult<(IndexRaster, usize)> {
        let stream = self
            .source
            .query(region, window, config.cloud_ceiling, config.composite_policy.scene_order())
            .map_err(|e| e.with_window(role))?;
        let matched = stream.matched();
        log::info!("{} window {}: {} scene(s) matched", role, window, matched);

        let preprocess = config.preprocess.as_ref();
        let scenes = stream.map(|scene| match preprocess {
            Some(params) => scene.and_then(|s| preprocess_scene(s, params)),
            None => scene,
        });

        // The query above asked for the policy's scene order
        let composite = Compositor::new(config.composite_policy)
            .assume_ordered()
            .composite(scenes, region)?;
        let (band_a, band_b) = &config.bands;
        let index = normalized_difference(&composite, band_a, band_b)?;
        Ok((index, matched))
    }

    fn finish(
        &self,
        region: &Region,
        config: &ChangeConfig,
        pre_index: IndexRaster,
        post_index: IndexRaster,
        pre_scene_count: usize,
        post_scene_count: usize,
    ) -> ChangeResult<ChangeReport> {
        let diff = difference(&pre_index, &post_index)?;
        let classified = classify(&diff, &config.thresholds()?)?;
        let classification = aggregate(&classified, region)?;

        log::info!(
            "Change ratios: loss {:.2}%, neutral {:.2}%, gain {:.2}% of {} cells",
            classification.ratio(ChangeClass::Loss) * 100.0,
            classification.ratio(ChangeClass::Neutral) * 100.0,
            classification.ratio(ChangeClass::Gain) * 100.0,
            classification.total()
        );

        Ok(ChangeReport {
            difference: diff,
            classification,
            pre_scene_count,
            post_scene_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChangeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.composite_policy, CompositePolicy::Median);
    }

    #[test]
    fn test_config_validation() {
        let same_bands = ChangeConfig {
            bands: ("SR_B4".to_string(), "SR_B4".to_string()),
            ..ChangeConfig::default()
        };
        assert!(matches!(same_bands.validate(), Err(ChangeError::InvalidConfig(_))));

        let no_ceiling = ChangeConfig {
            cloud_ceiling: 0.0,
            ..ChangeConfig::default()
        };
        assert!(no_ceiling.validate().is_err());

        let inverted = ChangeConfig {
            low_threshold: 0.3,
            high_threshold: -0.3,
            ..ChangeConfig::default()
        };
        assert!(inverted.validate().is_err());
    }
}
