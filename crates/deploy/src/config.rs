//! Configuration file loading.

use std::path::Path;

use arkival_core::ArkivalConfig;
use tracing::debug;

use crate::error::{DeployError, Result};

/// Load `arkival.config.json` from `path`.
///
/// A missing file yields the defaults. A file that does not parse is an
/// error rather than being replaced.
pub fn load_config(path: &Path) -> Result<ArkivalConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config at {}, using defaults", path.display());
            return Ok(ArkivalConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&text).map_err(|source| DeployError::Config {
        path: path.to_path_buf(),
        source,
    })
}
