use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static ORT_BRIDGE_CONFIG: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Path of the backend config file named by `ORT_BRIDGE_CONFIG`, read once per process.
pub(crate) fn config_path() -> Option<&'static Path> {
    ORT_BRIDGE_CONFIG
        .get_or_init(|| match env::var("ORT_BRIDGE_CONFIG") {
            Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value.trim())),
            _ => None,
        })
        .as_deref()
}
