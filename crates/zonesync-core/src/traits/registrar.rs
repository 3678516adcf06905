// # Registrar Trait
//
// The registrar role controls a domain's delegated nameservers. It is
// independent from record management: a domain can be registered with one
// backend and served by another.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for registrar adapters
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Fetch the nameservers currently delegated for `domain`
    async fn fetch_nameservers(&self, domain: &str) -> Result<Vec<String>>;

    /// Replace the delegation of `domain` with `nameservers`
    async fn set_nameservers(&self, domain: &str, nameservers: &[String]) -> Result<()>;

    /// Whether `err` is the registrar's rate-limit signal
    fn is_rate_limited(&self, err: &Error) -> bool {
        err.is_rate_limited()
    }

    /// Registrar name (for logging/debugging)
    fn registrar_name(&self) -> &'static str;
}

/// Helper trait for constructing registrars from configuration
pub trait RegistrarFactory: Send + Sync {
    /// Create a Registrar instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<std::sync::Arc<dyn Registrar>>;
}
