//! Plugin-based provider registry
//!
//! The registry allows DNS providers and registrars to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::ProviderRegistry;
//! use zonesync_core::config::ProviderConfig;
//!
//! // Create a registry
//! let registry = ProviderRegistry::new();
//!
//! // Register providers
//! registry.register_provider("powerdns", Box::new(powerdns_factory));
//! registry.validate()?;
//!
//! // Create provider from config
//! let config = ProviderConfig::PowerDns { ... };
//! let provider = registry.create_provider(&config)?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! // In zonesync-provider-powerdns crate
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("powerdns", Box::new(PowerDnsFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::capabilities::ProviderFeatures;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, Registrar, RegistrarFactory};

/// A registered DNS provider with the descriptor it published
struct RegisteredProvider {
    factory: Box<dyn DnsProviderFactory>,
    features: ProviderFeatures,
}

/// Provider registry for plugin-based backend creation
///
/// The registry maintains a map of backend type names to factory objects,
/// allowing dynamic instantiation of providers based on configuration. The
/// capability descriptor of each DNS provider is captured at registration,
/// so the table is read-only for the rest of the process.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, RegisteredProvider>>,

    /// Registered registrar factories
    registrars: RwLock<HashMap<String, Box<dyn RegistrarFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "powerdns")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let features = factory.features();
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), RegisteredProvider { factory, features });
    }

    /// Register a registrar factory
    ///
    /// # Parameters
    ///
    /// - `name`: Registrar type name
    /// - `factory`: Factory object for creating registrar instances
    pub fn register_registrar(&self, name: impl Into<String>, factory: Box<dyn RegistrarFactory>) {
        let mut registrars = self.registrars.write().unwrap_or_else(PoisonError::into_inner);
        registrars.insert(name.into(), factory);
    }

    /// Startup check of the registered backends
    ///
    /// # Errors
    ///
    /// Configuration error when nothing is registered or a descriptor names
    /// another backend than the one it was registered under.
    pub fn validate(&self) -> Result<()> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        if providers.is_empty() {
            return Err(Error::config("No DNS providers registered"));
        }
        for (name, registered) in providers.iter() {
            let described = registered.features.provider_name();
            if described != name {
                return Err(Error::config(format!(
                    "Provider {name} registered with the capability descriptor of {described}"
                )));
            }
        }
        Ok(())
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let registered = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        registered.factory.create(config)
    }

    /// Create a registrar from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn Registrar>)`: Created registrar instance
    /// - `Err(Error)`: If registrar type is not registered or creation fails
    pub fn create_registrar(&self, config: &ProviderConfig) -> Result<Arc<dyn Registrar>> {
        let registrar_type = config.type_name();
        let registrars = self.registrars.read().unwrap_or_else(PoisonError::into_inner);

        let factory = registrars
            .get(registrar_type)
            .ok_or_else(|| Error::config(format!("Unknown registrar type: {}", registrar_type)))?;

        factory.create(config)
    }

    /// Capability descriptor of a registered provider
    pub fn features(&self, name: &str) -> Option<ProviderFeatures> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.get(name).map(|registered| registered.features.clone())
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered registrar types, sorted
    pub fn list_registrars(&self) -> Vec<String> {
        let registrars = self.registrars.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = registrars.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a registrar type is registered
    pub fn has_registrar(&self, name: &str) -> bool {
        let registrars = self.registrars.read().unwrap_or_else(PoisonError::into_inner);
        registrars.contains_key(name)
    }
}
