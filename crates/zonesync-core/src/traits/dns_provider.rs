// # DNS Provider Trait
//
// Defines the narrow fetch/apply contract every backend adapter implements.
//
// ## Implementations
//
// - PowerDNS: `zonesync-provider-powerdns` crate
// - Test doubles: `tests/common/mod.rs`
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     // Read the live state of a zone
//     let records = provider.fetch_records("example.com").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::capabilities::ProviderFeatures;
use crate::diff::Modification;
use crate::error::{Error, Result};
use crate::model::Record;

/// TTL substituted when neither the backend nor the declaration sets one
pub const DEFAULT_TTL: u32 = 300;

/// Minimal record changes handed to an incremental backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncrementalChanges {
    /// Records to create
    pub creates: Vec<Record>,
    /// Records to delete
    pub deletes: Vec<Record>,
    /// Records whose TTL or ancillary fields change
    pub modifies: Vec<Modification>,
}

impl IncrementalChanges {
    /// A single creation
    pub fn create(record: Record) -> Self {
        Self {
            creates: vec![record],
            ..Self::default()
        }
    }

    /// A single deletion
    pub fn delete(record: Record) -> Self {
        Self {
            deletes: vec![record],
            ..Self::default()
        }
    }

    /// A single modification
    pub fn modify(modification: Modification) -> Self {
        Self {
            modifies: vec![modification],
            ..Self::default()
        }
    }

    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty() && self.modifies.is_empty()
    }
}

/// Trait for DNS backend adapters
///
/// An adapter is constructed once per configured account and passed to the
/// engine as an explicit value. It owns authentication, pagination and the
/// wire format of its backend; everything else belongs to the engine.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// ## Allowed
/// - Perform API calls to the backend's endpoints
/// - Translate between the backend's wire format and canonical [`Record`]s
/// - Classify backend errors, in particular the rate-limit signal
///
/// ## Forbidden
/// - Retry or back off (owned by the engine's `RetryPolicy`)
/// - Decide which changes are needed (owned by the diff engine)
/// - Cache remote state between calls (every pass fetches fresh)
///
/// **Correct approach**: return [`Error::RateLimited`] (or an error that
/// [`DnsProvider::is_rate_limited`] recognises) and let the engine retry.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch the current records of a zone
    ///
    /// # Parameters
    ///
    /// - `zone`: zone origin, without trailing dot
    ///
    /// # Returns
    ///
    /// Canonical records with labels relative to `zone`. A TTL of 0 means
    /// the backend did not report one.
    async fn fetch_records(&self, zone: &str) -> Result<Vec<Record>>;

    /// Apply creates, deletes and modifications to a zone
    ///
    /// Required when the descriptor declares incremental CRUD.
    async fn apply_incremental(&self, zone: &str, changes: &IncrementalChanges) -> Result<()> {
        let _ = (zone, changes);
        Err(Error::unsupported(format!(
            "{} does not apply incremental changes",
            self.provider_name()
        )))
    }

    /// Replace the whole zone with `records`
    ///
    /// Required for bundle-only backends.
    async fn apply_full_replace(&self, zone: &str, records: &[Record]) -> Result<()> {
        let _ = (zone, records);
        Err(Error::unsupported(format!(
            "{} does not replace whole zones",
            self.provider_name()
        )))
    }

    /// Static capability descriptor of the backend
    fn features(&self) -> &ProviderFeatures;

    /// TTL substituted for fetched records that report none
    fn default_ttl(&self) -> u32 {
        DEFAULT_TTL
    }

    /// Nameservers the backend delegates to by default
    ///
    /// A zone declaring no apex NS records is reconciled as if these were
    /// declared. Declared apex NS records matching one of these need no
    /// notice when the registrar controls the apex.
    fn default_nameservers(&self) -> &[String] {
        &[]
    }

    /// Whether `actual` is the backend's auto-injected placeholder content
    ///
    /// Backends that park empty zones override this; the engine then treats
    /// such a zone as empty when nothing is declared for it.
    fn is_placeholder_zone(&self, actual: &[Record]) -> bool {
        let _ = actual;
        false
    }

    /// Whether `err` is the backend's rate-limit signal
    fn is_rate_limited(&self, err: &Error) -> bool {
        err.is_rate_limited()
    }

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<std::sync::Arc<dyn DnsProvider>>;

    /// Capability descriptor shared by every instance of the backend
    fn features(&self) -> ProviderFeatures;
}
