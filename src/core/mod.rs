//! Change detection processing stages

pub mod preprocess;
pub mod composite;
pub mod index;
pub mod change;
pub mod statistics;
pub mod pipeline;

// Re-export main types
pub use preprocess::{preprocess_scene, LandsatC2Params};
pub use composite::{median, CompositePolicy, Compositor};
pub use index::{ndvi, normalized_difference};
pub use change::{classify, difference, ChangeThresholds};
pub use statistics::aggregate;
pub use pipeline::{ChangeConfig, ChangePipeline, ChangeReport};
