// # Namecheap Backend
//
// DNS provider and registrar backed by the Namecheap XML API.
//
// ## Behaviour
//
// - Bundle-only: the API can only replace a zone's whole host list, so every
//   change is sent as one `setHosts` call carrying the declared zone
// - Apex NS records belong to the registrar and are never transmitted
// - Zones without any hosts are parked by Namecheap with a CNAME and a URL
//   record; that content is reported as an empty zone
// - Rate limiting shows up as HTTP 405, which the engine retries
// - HTTP timeout of 30 seconds
// - Dry-run mode performs the reads and logs the writes instead of sending them
// - ❌ NO retry logic (owned by the reconcile engine)
//
// ## Security
//
// - The API key NEVER appears in logs or `Debug` output
// - The adapter fails fast if the user or key is empty
//
// ## API Reference
//
// - Read hosts: `namecheap.domains.dns.getHosts`
// - Replace hosts: `namecheap.domains.dns.setHosts`
// - Read delegation: `namecheap.domains.getInfo`
// - Change delegation: `namecheap.domains.dns.setCustom`

pub mod wire;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use zonesync_core::capabilities::{Capability, FeatureSupport, ProviderFeatures};
use zonesync_core::config::ProviderConfig;
use zonesync_core::model::Record;
use zonesync_core::traits::{DnsProvider, DnsProviderFactory, Registrar, RegistrarFactory};
use zonesync_core::{Error, RecordType, Result};

use crate::wire::ApiResponse;

/// Name the backend registers under
pub const PROVIDER_NAME: &str = "namecheap";

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.namecheap.com/xml.response";

/// Nameservers of Namecheap's hosted DNS
pub const DEFAULT_NAMESERVERS: [&str; 2] =
    ["dns1.registrar-servers.com", "dns2.registrar-servers.com"];

/// Error text of a throttled call
const RATE_LIMIT_MARKER: &str = "status code from api: 405";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability descriptor of the Namecheap backend
pub fn namecheap_features() -> ProviderFeatures {
    ProviderFeatures::builder(PROVIDER_NAME)
        .incremental(false)
        .registrar_controls_apex_ns(true)
        .with(Capability::GetZones, FeatureSupport::can())
        .with(Capability::Concurrency, FeatureSupport::can())
        .with(
            Capability::DualHost,
            FeatureSupport::cannot().with_caveat("Doesn't allow control of apex NS records"),
        )
        .with(
            Capability::CreateDomains,
            FeatureSupport::cannot().with_caveat("Requires domain registered through their service"),
        )
        .record_type(RecordType::Alias, FeatureSupport::can())
        .record_type(RecordType::Caa, FeatureSupport::can())
        .record_type(RecordType::Ptr, FeatureSupport::cannot())
        .record_type(
            RecordType::Srv,
            FeatureSupport::cannot().with_caveat(
                "The namecheap web console allows you to make SRV records, but their api does not let you read or set them",
            ),
        )
        .record_type(RecordType::Url, FeatureSupport::can())
        .record_type(RecordType::Url301, FeatureSupport::can())
        .record_type(RecordType::Frame, FeatureSupport::can())
        .build()
}

/// Namecheap API client, used both as DNS provider and as registrar
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, reads are performed but `setHosts` and
/// `setCustom` are only logged.
pub struct NamecheapProvider {
    /// API user
    api_user: String,

    /// API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Account the calls act on
    username: String,

    /// Whitelisted caller address
    client_ip: String,

    /// Endpoint
    base_url: String,

    default_ns: Vec<String>,

    client: reqwest::Client,

    dry_run: bool,

    features: ProviderFeatures,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for NamecheapProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamecheapProvider")
            .field("api_user", &self.api_user)
            .field("api_key", &"<REDACTED>")
            .field("username", &self.username)
            .field("client_ip", &self.client_ip)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl NamecheapProvider {
    /// Create a new Namecheap client
    ///
    /// # Parameters
    ///
    /// - `api_user`: API user
    /// - `api_key`: API key
    /// - `dry_run`: if true, read but skip write calls
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the user or key is empty or the HTTP
    /// client cannot be built.
    pub fn new(
        api_user: impl Into<String>,
        api_key: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_user = api_user.into();
        let api_key = api_key.into();

        if api_user.is_empty() || api_key.is_empty() {
            return Err(Error::config("missing Namecheap apikey and apiuser"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            username: api_user.clone(),
            api_user,
            api_key,
            client_ip: "127.0.0.1".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_ns: DEFAULT_NAMESERVERS.iter().map(|ns| ns.to_string()).collect(),
            client,
            dry_run,
            features: namecheap_features(),
        })
    }

    /// Act on another account than the API user's
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the whitelisted caller address
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    /// Use another endpoint, e.g. the sandbox
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config {
            ProviderConfig::Namecheap {
                api_user,
                api_key,
                username,
                client_ip,
                base_url,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!("Namecheap backend running in DRY-RUN mode - no changes will be made");
                }

                let mut provider = Self::new(api_user.clone(), api_key.clone(), *dry_run)?
                    .with_client_ip(client_ip.clone());
                if let Some(username) = username {
                    provider = provider.with_username(username.clone());
                }
                if let Some(base_url) = base_url {
                    provider = provider.with_base_url(base_url.clone());
                }
                Ok(provider)
            }
            _ => Err(Error::config("Invalid config for Namecheap backend")),
        }
    }

    /// Issue one API command
    ///
    /// ```http
    /// GET|POST /xml.response?ApiUser=..&ApiKey=..&UserName=..&ClientIp=..&Command=..
    /// ```
    async fn call(
        &self,
        command: &str,
        args: Vec<(String, String)>,
        write: bool,
    ) -> Result<ApiResponse> {
        let mut params = vec![
            ("ApiUser".to_string(), self.api_user.clone()),
            ("ApiKey".to_string(), self.api_key.clone()),
            ("UserName".to_string(), self.username.clone()),
            ("ClientIp".to_string(), self.client_ip.clone()),
            ("Command".to_string(), command.to_string()),
        ];
        params.extend(args);

        let url = reqwest::Url::parse_with_params(&self.base_url, &params)
            .map_err(|e| Error::config(format!("Invalid Namecheap base URL: {}", e)))?;
        tracing::debug!("Calling {}", command);

        let request = if write {
            self.client.post(url)
        } else {
            self.client.get(url)
        };
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("unexpected status code from api: {}", status.as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;
        wire::parse_response(&body)
    }

    /// Read the host list of a zone
    async fn get_hosts(&self, zone: &str) -> Result<Vec<wire::Host>> {
        let (sld, tld) = wire::split_domain(zone)?;
        let response = self
            .call(
                "namecheap.domains.dns.getHosts",
                vec![("SLD".to_string(), sld), ("TLD".to_string(), tld)],
                false,
            )
            .await?;
        Ok(response.command.hosts.unwrap_or_default().hosts)
    }
}

#[async_trait]
impl DnsProvider for NamecheapProvider {
    async fn fetch_records(&self, zone: &str) -> Result<Vec<Record>> {
        let hosts = self.get_hosts(zone).await?;
        let records = wire::records_from_hosts(zone, &hosts)?;
        tracing::debug!("Fetched {} record(s) for {}", records.len(), zone);
        Ok(records)
    }

    /// Replace the host list with `records`
    ///
    /// The engine never hands over apex NS records for this backend.
    async fn apply_full_replace(&self, zone: &str, records: &[Record]) -> Result<()> {
        let (sld, tld) = wire::split_domain(zone)?;
        let mut args = vec![("SLD".to_string(), sld), ("TLD".to_string(), tld)];
        args.extend(wire::set_hosts_params(records));

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would replace {} with {} host(s)",
                zone,
                records.len()
            );
            return Ok(());
        }

        tracing::info!("Replacing {} with {} host(s)", zone, records.len());
        let response = self.call("namecheap.domains.dns.setHosts", args, true).await?;
        match response.command.set_hosts {
            Some(result) if result.is_success.eq_ignore_ascii_case("true") => Ok(()),
            _ => Err(Error::provider(
                PROVIDER_NAME,
                format!("setHosts did not succeed for {}", zone),
            )),
        }
    }

    fn features(&self) -> &ProviderFeatures {
        &self.features
    }

    fn default_nameservers(&self) -> &[String] {
        &self.default_ns
    }

    /// Namecheap parks a zone without hosts behind a CNAME to its parking
    /// page followed by a URL redirect
    fn is_placeholder_zone(&self, actual: &[Record]) -> bool {
        match actual {
            [first, second] => {
                first.record_type == RecordType::Cname
                    && first.target.contains("parkingpage")
                    && second.record_type == RecordType::Url
            }
            _ => false,
        }
    }

    fn is_rate_limited(&self, err: &Error) -> bool {
        is_throttled(err)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl Registrar for NamecheapProvider {
    async fn fetch_nameservers(&self, domain: &str) -> Result<Vec<String>> {
        let response = self
            .call(
                "namecheap.domains.getInfo",
                vec![("DomainName".to_string(), domain.to_string())],
                false,
            )
            .await?;
        Ok(response.command.info.unwrap_or_default().dns.nameservers)
    }

    async fn set_nameservers(&self, domain: &str, nameservers: &[String]) -> Result<()> {
        let (sld, tld) = wire::split_domain(domain)?;
        let joined = nameservers.join(",");

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would delegate {} to {}", domain, joined);
            return Ok(());
        }

        tracing::info!("Delegating {} to {}", domain, joined);
        let response = self
            .call(
                "namecheap.domains.dns.setCustom",
                vec![
                    ("SLD".to_string(), sld),
                    ("TLD".to_string(), tld),
                    ("Nameservers".to_string(), joined),
                ],
                true,
            )
            .await?;
        match response.command.set_custom {
            Some(result) if result.updated.eq_ignore_ascii_case("true") => Ok(()),
            _ => Err(Error::provider(
                PROVIDER_NAME,
                format!("setCustom did not update {}", domain),
            )),
        }
    }

    fn is_rate_limited(&self, err: &Error) -> bool {
        is_throttled(err)
    }

    fn registrar_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Namecheap throttles with HTTP 405 instead of 429
fn is_throttled(err: &Error) -> bool {
    err.is_rate_limited() || err.to_string().contains(RATE_LIMIT_MARKER)
}

/// Factory for the Namecheap DNS provider
pub struct NamecheapFactory;

impl DnsProviderFactory for NamecheapFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        Ok(Arc::new(NamecheapProvider::from_config(config)?))
    }

    fn features(&self) -> ProviderFeatures {
        namecheap_features()
    }
}

/// Factory for the Namecheap registrar
pub struct NamecheapRegistrarFactory;

impl RegistrarFactory for NamecheapRegistrarFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn Registrar>> {
        Ok(Arc::new(NamecheapProvider::from_config(config)?))
    }
}

/// Register the Namecheap provider and registrar with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// zonesync_provider_namecheap::register(&registry);
/// assert!(registry.has_provider("namecheap"));
/// assert!(registry.has_registrar("namecheap"));
/// ```
pub fn register(registry: &zonesync_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(NamecheapFactory));
    registry.register_registrar(PROVIDER_NAME, Box::new(NamecheapRegistrarFactory));
}
