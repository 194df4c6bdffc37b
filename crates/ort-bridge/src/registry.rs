//! Execution provider registry and per-device invoker lookup.
//!
//! Providers are registered by name, either explicitly through [`register_provider`] or by
//! adding a registrar to [`PROVIDER_REGISTRARS`] from any crate linked into the binary.
//! Device index `i` resolves to the provider named by entry `i` of the [`BridgeConfig`];
//! the resulting [`Invoker`] is built once and cached.

use std::collections::HashMap;
use std::sync::{Arc, Once, OnceLock, RwLock};

use tracing::debug;

use crate::config::BridgeConfig;
use crate::engine::{ExecutionProvider, Invoker};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{Device, DeviceType};

/// Factory that creates a new provider instance.
pub type ProviderConstructor = Box<dyn Fn() -> Arc<dyn ExecutionProvider> + Send + Sync>;

/// Registrars run once, before the first registry lookup.
#[linkme::distributed_slice]
pub static PROVIDER_REGISTRARS: [fn()] = [..];

struct ProviderRegistry {
    providers: RwLock<HashMap<String, ProviderConstructor>>,
}

impl ProviderRegistry {
    fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    fn register(&self, name: String, constructor: ProviderConstructor) {
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .insert(name, constructor);
    }

    fn create(&self, name: &str) -> Option<Arc<dyn ExecutionProvider>> {
        let registry = self.providers.read().expect("provider registry lock poisoned");
        let constructor = registry.get(name)?;
        Some(constructor())
    }

    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .expect("provider registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn contains(&self, name: &str) -> bool {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .contains_key(name)
    }
}

static GLOBAL_REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();
static RUN_REGISTRARS: Once = Once::new();

fn registry_storage() -> &'static ProviderRegistry {
    GLOBAL_REGISTRY.get_or_init(ProviderRegistry::new)
}

/// Registry with every linked registrar applied. Registrars themselves go through
/// [`registry_storage`] so they never re-enter the `Once`.
fn global_registry() -> &'static ProviderRegistry {
    RUN_REGISTRARS.call_once(|| {
        for registrar in PROVIDER_REGISTRARS {
            registrar();
        }
    });
    registry_storage()
}

/// Registers a provider under `name`, replacing any earlier registration.
///
/// The constructor runs each time an invoker for an unseen device index needs the provider.
pub fn register_provider<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Arc<dyn ExecutionProvider> + Send + Sync + 'static,
{
    let name = name.into();
    debug!(provider = %name, "registering execution provider");
    registry_storage().register(name, Box::new(constructor));
}

/// Creates a provider instance by name, or `None` if nothing is registered under it.
pub fn create_provider(name: &str) -> Option<Arc<dyn ExecutionProvider>> {
    global_registry().create(name)
}

/// Registered provider names, sorted.
pub fn list_providers() -> Vec<String> {
    global_registry().list()
}

pub fn has_provider(name: &str) -> bool {
    global_registry().contains(name)
}

static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();
static INVOKERS: OnceLock<RwLock<HashMap<i8, Arc<Invoker>>>> = OnceLock::new();

/// Process-wide backend configuration, loaded on first use.
pub fn config() -> BridgeResult<&'static BridgeConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let loaded = BridgeConfig::load()?;
    Ok(CONFIG.get_or_init(|| loaded))
}

fn invokers() -> &'static RwLock<HashMap<i8, Arc<Invoker>>> {
    INVOKERS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn device_index(device: Device) -> BridgeResult<i8> {
    if device.device_type() != DeviceType::Ort {
        return Err(BridgeError::InvalidDevice {
            device,
            reason: "invokers exist only for ort devices",
        });
    }
    match device.index() {
        None => Ok(0),
        Some(index) if index >= 0 => Ok(index),
        Some(_) => Err(BridgeError::InvalidDevice {
            device,
            reason: "negative device index",
        }),
    }
}

/// Returns the invoker serving `device`. An unspecified index means index 0.
pub fn invoker_for(device: Device) -> BridgeResult<Arc<Invoker>> {
    let index = device_index(device)?;
    if let Some(invoker) = invokers()
        .read()
        .expect("invoker table lock poisoned")
        .get(&index)
    {
        return Ok(Arc::clone(invoker));
    }

    let backend = config()?
        .backend(index as usize)
        .ok_or(BridgeError::InvalidDevice {
            device,
            reason: "no backend configured for this index",
        })?;
    let provider_name = backend.provider_name();
    let provider = create_provider(provider_name)
        .ok_or_else(|| BridgeError::UnknownProvider(provider_name.to_string()))?;
    debug!(
        index,
        kind = %backend.kind,
        provider = %provider_name,
        "creating invoker"
    );

    let mut table = invokers().write().expect("invoker table lock poisoned");
    let invoker = table
        .entry(index)
        .or_insert_with(|| Arc::new(Invoker::new(provider, index)));
    Ok(Arc::clone(invoker))
}

/// Installs `invoker` for device index `index`, returning the one it replaces.
pub fn install_invoker(index: i8, invoker: Invoker) -> Option<Arc<Invoker>> {
    debug!(index, provider = %invoker.current_execution_provider().provider_type(), "installing invoker");
    invokers()
        .write()
        .expect("invoker table lock poisoned")
        .insert(index, Arc::new(invoker))
}

/// Drops the cached invoker for `index`; the next lookup rebuilds it from the config.
pub fn uninstall_invoker(index: i8) -> Option<Arc<Invoker>> {
    invokers()
        .write()
        .expect("invoker table lock poisoned")
        .remove(&index)
}
