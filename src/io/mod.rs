//! Image catalog access

pub mod catalog;
pub mod local;
pub mod client;

pub use catalog::{ImageSource, MemoryCatalog, SceneOrder, SceneStream};
pub use local::{CatalogEntry, LocalCatalog};
pub use client::{BackendConfig, CatalogClient, CatalogConfig, Credentials};
