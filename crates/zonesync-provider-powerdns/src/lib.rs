// # PowerDNS Backend
//
// DNS provider backed by the HTTP API of a PowerDNS authoritative server.
//
// ## Behaviour
//
// - Incremental: every correction becomes one `PATCH` of the affected rrsets
// - Rrsets are always rewritten whole (`REPLACE`), so adding one value to a
//   name re-sends the values already there
// - SOA and disabled records are never reported to the engine
// - HTTP timeout of 30 seconds
// - Status codes are mapped to engine errors (401/403, 404, 429, 5xx)
// - Dry-run mode performs the GETs and logs the PATCH bodies instead of
//   sending them
// - ❌ NO retry logic (owned by the reconcile engine)
// - ❌ NO zone creation
//
// ## Security
//
// - The API key NEVER appears in logs or `Debug` output
// - The provider fails fast if the key is empty
//
// ## API Reference
//
// - Get zone: GET `/api/v1/servers/:server/zones/:zone.`
// - Change rrsets: PATCH `/api/v1/servers/:server/zones/:zone.`

pub mod wire;

use async_trait::async_trait;
use std::time::Duration;
use zonesync_core::capabilities::{Capability, FeatureSupport, ProviderFeatures};
use zonesync_core::config::ProviderConfig;
use zonesync_core::model::Record;
use zonesync_core::traits::{DnsProvider, DnsProviderFactory, IncrementalChanges};
use zonesync_core::{Error, RecordType, Result};

use crate::wire::{PatchBody, RrSet, ZoneBody};

/// Name the backend registers under
pub const PROVIDER_NAME: &str = "powerdns";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability descriptor of the PowerDNS backend
pub fn powerdns_features() -> ProviderFeatures {
    ProviderFeatures::builder(PROVIDER_NAME)
        .incremental(true)
        .with(Capability::GetZones, FeatureSupport::can())
        .with(Capability::Concurrency, FeatureSupport::unimplemented())
        .with(Capability::DualHost, FeatureSupport::can())
        .with(
            Capability::CreateDomains,
            FeatureSupport::unimplemented().with_caveat("Zones must exist on the server"),
        )
        .record_type(
            RecordType::Alias,
            FeatureSupport::can().with_caveat("Needs to be enabled in PowerDNS first"),
        )
        .record_type(RecordType::Caa, FeatureSupport::can())
        .record_type(RecordType::Ptr, FeatureSupport::can())
        .record_type(RecordType::Srv, FeatureSupport::can())
        .build()
}

/// PowerDNS DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider still reads zones but only logs the
/// PATCH bodies it would send.
pub struct PowerDnsProvider {
    /// Base URL, without trailing slash
    api_url: String,

    /// API key sent as `X-API-Key`
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Server id, usually "localhost"
    server_name: String,

    /// Fully-qualified apex nameservers for zones that declare none
    default_ns: Vec<String>,

    client: reqwest::Client,

    dry_run: bool,

    features: ProviderFeatures,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for PowerDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerDnsProvider")
            .field("api_url", &self.api_url)
            .field("api_key", &"<REDACTED>")
            .field("server_name", &self.server_name)
            .field("default_ns", &self.default_ns)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl PowerDnsProvider {
    /// Create a new PowerDNS provider
    ///
    /// # Parameters
    ///
    /// - `api_url`: base URL of the API, e.g. `http://localhost:8081`
    /// - `api_key`: API key
    /// - `server_name`: server id, usually `localhost`
    /// - `default_ns`: nameservers the server delegates to
    /// - `dry_run`: if true, read zones but skip PATCH requests
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required value is empty or the HTTP
    /// client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        server_name: impl Into<String>,
        default_ns: Vec<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        let server_name = server_name.into();

        if api_url.is_empty() {
            return Err(Error::config("PowerDNS API URL is required"));
        }
        if api_key.is_empty() {
            return Err(Error::config("PowerDNS API Key is required"));
        }
        if server_name.is_empty() {
            return Err(Error::config("PowerDNS server name is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let default_ns = default_ns
            .iter()
            .map(|ns| ns.trim().to_ascii_lowercase())
            .filter(|ns| !ns.is_empty())
            .map(|ns| if ns.ends_with('.') { ns } else { format!("{ns}.") })
            .collect();

        Ok(Self {
            api_url,
            api_key,
            server_name,
            default_ns,
            client,
            dry_run,
            features: powerdns_features(),
        })
    }

    fn zone_url(&self, zone: &str) -> String {
        format!(
            "{}/api/v1/servers/{}/zones/{}.",
            self.api_url,
            self.server_name,
            zone.trim_end_matches('.')
        )
    }

    /// Read a zone with all its rrsets
    ///
    /// ```http
    /// GET /api/v1/servers/:server/zones/:zone.
    /// X-API-Key: <key>
    /// ```
    async fn get_zone(&self, zone: &str) -> Result<ZoneBody> {
        let url = self.zone_url(zone);
        tracing::debug!("Fetching zone {} from {}", zone, url);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let response = check_status(response, zone, "Zone lookup failed").await?;

        response
            .json::<ZoneBody>()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e)))
    }

    /// Send changed rrsets
    ///
    /// ```http
    /// PATCH /api/v1/servers/:server/zones/:zone.
    /// X-API-Key: <key>
    /// { "rrsets": [ { "name": ..., "type": ..., "changetype": "REPLACE", ... } ] }
    /// ```
    async fn patch_zone(&self, zone: &str, rrsets: Vec<RrSet>) -> Result<()> {
        if rrsets.is_empty() {
            tracing::debug!("No rrsets to change in {}", zone);
            return Ok(());
        }

        let url = self.zone_url(zone);
        let body = PatchBody { rrsets };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                serde_json::to_string(&body)?
            );
            return Ok(());
        }

        tracing::info!("Changing {} rrset(s) in {}", body.rrsets.len(), zone);

        let response = self
            .client
            .patch(&url)
            .header("X-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        check_status(response, zone, "Failed to change rrsets").await?;
        Ok(())
    }
}

/// Map a non-success status to an engine error
async fn check_status(
    response: reqwest::Response,
    zone: &str,
    context: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    tracing::debug!("PowerDNS responded {} for {}", status, zone);
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    Err(match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API key or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("Zone not found: {}", zone)),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("PowerDNS server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{}: {} - {}", context, status, error_text),
        ),
    })
}

#[async_trait]
impl DnsProvider for PowerDnsProvider {
    async fn fetch_records(&self, zone: &str) -> Result<Vec<Record>> {
        let body = self.get_zone(zone).await?;
        let records = wire::records_from_zone(zone, &body)?;
        tracing::debug!("Fetched {} record(s) for {}", records.len(), zone);
        Ok(records)
    }

    /// Apply changes rrset by rrset
    ///
    /// The zone is read first so that values sharing an rrset with a changed
    /// record survive the `REPLACE`.
    async fn apply_incremental(&self, zone: &str, changes: &IncrementalChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let current = self.fetch_records(zone).await?;
        let merged = wire::merge_changes(zone, &current, changes);
        let rrsets = merged
            .iter()
            .map(|(key, records)| wire::rrset_change(key, records))
            .collect();

        self.patch_zone(zone, rrsets).await
    }

    /// Replace every rrset with the declared content and delete the rest
    ///
    /// SOA is left to the server.
    async fn apply_full_replace(&self, zone: &str, records: &[Record]) -> Result<()> {
        let current = self.fetch_records(zone).await?;
        let desired = wire::group(zone, records);

        let mut rrsets: Vec<RrSet> = desired
            .iter()
            .map(|(key, records)| wire::rrset_change(key, records))
            .collect();
        rrsets.extend(
            wire::group(zone, &current)
                .keys()
                .filter(|key| !desired.contains_key(*key))
                .map(|key| wire::rrset_change(key, &[])),
        );

        self.patch_zone(zone, rrsets).await
    }

    fn features(&self) -> &ProviderFeatures {
        &self.features
    }

    fn default_nameservers(&self) -> &[String] {
        &self.default_ns
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating PowerDNS providers
pub struct PowerDnsFactory;

impl DnsProviderFactory for PowerDnsFactory {
    fn create(&self, config: &ProviderConfig) -> Result<std::sync::Arc<dyn DnsProvider>> {
        match config {
            ProviderConfig::PowerDns {
                api_url,
                api_key,
                server_name,
                default_ns,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!("PowerDNS provider running in DRY-RUN mode - no changes will be made");
                }

                Ok(std::sync::Arc::new(PowerDnsProvider::new(
                    api_url.clone(),
                    api_key.clone(),
                    server_name.clone(),
                    default_ns.clone(),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for PowerDNS provider")),
        }
    }

    fn features(&self) -> ProviderFeatures {
        powerdns_features()
    }
}

/// Register the PowerDNS provider with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// zonesync_provider_powerdns::register(&registry);
/// assert!(registry.has_provider("powerdns"));
/// ```
pub fn register(registry: &zonesync_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(PowerDnsFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::capabilities::Support;

    fn config(api_key: &str) -> ProviderConfig {
        ProviderConfig::PowerDns {
            api_url: "http://localhost:8081/".to_string(),
            api_key: api_key.to_string(),
            server_name: "localhost".to_string(),
            default_ns: vec!["NS1.example.net".to_string(), "ns2.example.net.".to_string()],
            dry_run: false,
        }
    }

    #[test]
    fn test_factory_creation() {
        let provider = PowerDnsFactory.create(&config("secret"));
        assert!(provider.is_ok());
    }

    #[test]
    fn test_factory_missing_key() {
        let provider = PowerDnsFactory.create(&config(""));
        assert!(matches!(provider, Err(Error::Config(msg)) if msg.contains("API Key is required")));
    }

    #[test]
    fn test_factory_rejects_foreign_config() {
        let config = ProviderConfig::Custom {
            factory: "other".to_string(),
            config: serde_json::json!({}),
        };
        assert!(PowerDnsFactory.create(&config).is_err());
    }

    #[test]
    fn test_default_nameservers_are_qualified() {
        let provider = PowerDnsProvider::new(
            "http://localhost:8081",
            "secret",
            "localhost",
            vec!["NS1.example.net".to_string(), " ".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(provider.default_nameservers(), ["ns1.example.net.".to_string()]);
    }

    #[test]
    fn test_zone_url() {
        let provider =
            PowerDnsProvider::new("http://localhost:8081/", "secret", "localhost", Vec::new(), false)
                .unwrap();
        assert_eq!(
            provider.zone_url("example.com"),
            "http://localhost:8081/api/v1/servers/localhost/zones/example.com."
        );
    }

    #[test]
    fn test_features() {
        let features = powerdns_features();
        assert!(features.supports_incremental());
        assert!(!features.registrar_controls_apex_ns());
        assert!(!features.is_concurrency_safe());
        assert_eq!(features.record_type_support(RecordType::Srv), Support::Can);
        assert_eq!(
            features.caveat(Capability::RecordType(RecordType::Alias)),
            Some("Needs to be enabled in PowerDNS first")
        );
        assert_eq!(features.record_type_support(RecordType::Url), Support::Cannot);
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let provider = PowerDnsProvider::new(
            "http://localhost:8081",
            "secret_key_12345",
            "localhost",
            Vec::new(),
            false,
        )
        .unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_key"));
        assert!(debug_str.contains("PowerDnsProvider"));
    }

    #[test]
    fn test_register() {
        let registry = zonesync_core::ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_provider(PROVIDER_NAME));
        assert!(registry.features(PROVIDER_NAME).is_some());
    }
}
