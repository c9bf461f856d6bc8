use crate::io::catalog::{ImageSource, SceneOrder, SceneStream};
use crate::io::local::LocalCatalog;
use crate::types::{ChangeError, ChangeResult, Region, TimeWindow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SERVICE_ACCOUNT_VAR: &str = "NDCHANGE_SERVICE_ACCOUNT";
pub const SERVICE_KEY_VAR: &str = "NDCHANGE_SERVICE_KEY";
pub const TOKEN_FILE_VAR: &str = "NDCHANGE_TOKEN_FILE";

/// How the process authenticates against the imagery backend
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ServiceAccount { account: String, key: String },
    TokenFile(PathBuf),
    Anonymous,
}

impl Credentials {
    /// Resolve credentials from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Service account first, then token file, else anonymous
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let (Some(account), Some(key)) = (non_empty(SERVICE_ACCOUNT_VAR), non_empty(SERVICE_KEY_VAR)) {
            return Credentials::ServiceAccount { account, key };
        }
        if let Some(path) = non_empty(TOKEN_FILE_VAR) {
            return Credentials::TokenFile(PathBuf::from(path));
        }
        Credentials::Anonymous
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ServiceAccount { .. } => "service-account",
            Credentials::TokenFile(_) => "token-file",
            Credentials::Anonymous => "anonymous",
        }
    }

    fn validate(&self) -> ChangeResult<()> {
        match self {
            Credentials::ServiceAccount { account, key } => {
                if account.trim().is_empty() || key.trim().is_empty() {
                    return Err(ChangeError::Credentials(
                        "service account and key must both be set".to_string(),
                    ));
                }
            }
            Credentials::TokenFile(path) => {
                if !path.is_file() {
                    return Err(ChangeError::Credentials(format!(
                        "token file {} does not exist",
                        path.display()
                    )));
                }
            }
            Credentials::Anonymous => {}
        }
        Ok(())
    }
}

// Keys never reach the logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount { account, .. } => f
                .debug_struct("ServiceAccount")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Credentials::TokenFile(path) => f.debug_tuple("TokenFile").field(path).finish(),
            Credentials::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// Imagery backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendConfig {
    /// XML manifest of local GeoTIFF scenes
    Local { manifest: PathBuf },
}

impl BackendConfig {
    /// `<data dir>/ndchange/catalog.xml`
    pub fn default_local() -> ChangeResult<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| ChangeError::InvalidConfig("no platform data directory available".to_string()))?;
        Ok(BackendConfig::Local {
            manifest: data_dir.join("ndchange").join("catalog.xml"),
        })
    }
}

/// Everything needed to reach the image catalog, fixed at process start
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub backend: BackendConfig,
    pub credentials: Credentials,
    pub project: Option<String>,
}

impl CatalogConfig {
    /// Local manifest with credentials taken from the environment
    pub fn local<P: AsRef<Path>>(manifest: P) -> Self {
        Self {
            backend: BackendConfig::Local {
                manifest: manifest.as_ref().to_path_buf(),
            },
            credentials: Credentials::from_env(),
            project: None,
        }
    }
}

/// Process-wide handle on the configured imagery backend.
///
/// Credentials are resolved and validated once, when the handle is built.
pub struct CatalogClient {
    source: Box<dyn ImageSource>,
}

impl CatalogClient {
    /// Validate credentials and open the configured backend once
    pub fn connect(config: CatalogConfig) -> ChangeResult<Self> {
        config.credentials.validate()?;
        log::info!(
            "Connecting to image catalog ({} credentials, project {})",
            config.credentials.kind(),
            config.project.as_deref().unwrap_or("<none>")
        );

        let source: Box<dyn ImageSource> = match &config.backend {
            BackendConfig::Local { manifest } => Box::new(LocalCatalog::open(manifest)?),
        };
        Ok(Self { source })
    }

    /// Wrap an already-built backend
    pub fn from_source<S: ImageSource + 'static>(credentials: Credentials, source: S) -> ChangeResult<Self> {
        credentials.validate()?;
        log::debug!("Wrapping image source ({} credentials)", credentials.kind());
        Ok(Self {
            source: Box::new(source),
        })
    }
}

impl ImageSource for CatalogClient {
    fn query(
        &self,
        region: &Region,
        window: &TimeWindow,
        max_cloud_cover: f64,
        order: SceneOrder,
    ) -> ChangeResult<SceneStream<'_>> {
        log::debug!("Catalog query for {} over {} ({:?})", window, region, order);
        self.source.query(region, window, max_cloud_cover, order)
    }
}
