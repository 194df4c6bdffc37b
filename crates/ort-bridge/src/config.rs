//! Backend configuration: which execution provider serves each device index.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{BridgeError, BridgeResult};

/// One backend kind and the provider that implements it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: String,
    /// Registered provider name; defaults to `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl BackendConfig {
    pub fn new(kind: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            provider: Some(provider.into()),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or(&self.kind)
    }
}

/// Device index `i` is served by `backends[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub backends: Vec<BackendConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendConfig::new("cpu", "cpu")],
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(src: &str) -> BridgeResult<Self> {
        let config: BridgeConfig =
            serde_json::from_str(src).map_err(|err| BridgeError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> BridgeResult<Self> {
        let src = fs::read_to_string(path)
            .map_err(|err| BridgeError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&src)
    }

    /// Loads the file named by `ORT_BRIDGE_CONFIG`, or the single-cpu default.
    pub fn load() -> BridgeResult<Self> {
        match env::config_path() {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> BridgeResult<()> {
        if self.backends.is_empty() {
            return Err(BridgeError::Config("no backends configured".to_string()));
        }
        if self.backends.len() > i8::MAX as usize {
            return Err(BridgeError::Config(format!(
                "{} backends configured, at most {} device indices exist",
                self.backends.len(),
                i8::MAX
            )));
        }
        Ok(())
    }

    pub fn backend(&self, index: usize) -> Option<&BackendConfig> {
        self.backends.get(index)
    }

    /// Backend kinds in device-index order, without duplicates.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            if !kinds.contains(&backend.kind) {
                kinds.push(backend.kind.clone());
            }
        }
        kinds
    }
}
