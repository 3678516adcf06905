//! Configuration types for zonesync
//!
//! This module defines the declaration file layout and the engine settings.
//! The declaration is plain JSON:
//!
//! ```json
//! {
//!   "provider": { "type": "powerdns", "api_url": "http://localhost:8081",
//!                 "api_key": "secret", "server_name": "localhost" },
//!   "zones": [
//!     { "origin": "example.com",
//!       "records": [ { "name": "www", "type": "A", "content": "192.0.2.1" } ] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{Record, RecordType, ZoneDeclaration};

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSyncConfig {
    /// DNS provider serving the zones
    pub provider: ProviderConfig,

    /// Registrar controlling delegation (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<ProviderConfig>,

    /// Zones to reconcile
    pub zones: Vec<ZoneConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ZoneSyncConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(Error::config("No zones configured"));
        }

        self.provider.validate()?;
        if let Some(registrar) = &self.registrar {
            registrar.validate()?;
        }
        self.engine.validate()?;

        let mut seen = HashSet::new();
        for zone in &self.zones {
            zone.validate()?;
            if !seen.insert(zone.normalized_origin()) {
                return Err(Error::config(format!(
                    "Zone {} is declared more than once",
                    zone.origin
                )));
            }
        }

        Ok(())
    }

    /// Parse every zone into canonical declarations
    ///
    /// Fails closed on the first malformed record.
    pub fn declarations(&self) -> Result<Vec<ZoneDeclaration>> {
        self.zones
            .iter()
            .map(|zone| zone.to_declaration(self.engine.default_ttl))
            .collect()
    }
}

/// Backend account configuration
///
/// `Debug` output never contains credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// PowerDNS authoritative server HTTP API
    #[serde(rename = "powerdns")]
    PowerDns {
        /// Base URL of the API (e.g., "http://localhost:8081")
        api_url: String,
        /// API key sent as `X-API-Key`
        api_key: String,
        /// Server id, usually "localhost"
        server_name: String,
        /// Apex nameservers for zones that declare none
        #[serde(default)]
        default_ns: Vec<String>,
        /// Log changes instead of sending them
        #[serde(default)]
        dry_run: bool,
    },

    /// Namecheap registrar API: hosted DNS and delegation
    Namecheap {
        /// API user
        api_user: String,
        /// API key
        api_key: String,
        /// Account the calls act on; defaults to `api_user`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        /// Whitelisted address the calls are made from
        #[serde(default = "default_client_ip")]
        client_ip: String,
        /// Endpoint override (e.g., the sandbox API)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        /// Log changes instead of sending them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::PowerDns {
                api_url,
                api_key,
                server_name,
                ..
            } => {
                if api_url.is_empty() {
                    return Err(Error::config("PowerDNS api_url cannot be empty"));
                }
                if api_key.is_empty() {
                    return Err(Error::config("PowerDNS api_key cannot be empty"));
                }
                if server_name.is_empty() {
                    return Err(Error::config("PowerDNS server_name cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Namecheap {
                api_user,
                api_key,
                ..
            } => {
                if api_user.is_empty() || api_key.is_empty() {
                    return Err(Error::config("Namecheap api_user and api_key cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom provider factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::PowerDns { .. } => "powerdns",
            ProviderConfig::Namecheap { .. } => "namecheap",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }

    /// Replace the API key, e.g. with one taken from the environment
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        match self {
            ProviderConfig::PowerDns { api_key, .. } | ProviderConfig::Namecheap { api_key, .. } => {
                *api_key = key
            }
            ProviderConfig::Custom { config, .. } => {
                if let Some(map) = config.as_object_mut() {
                    map.insert("api_key".to_string(), serde_json::Value::String(key));
                }
            }
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::PowerDns {
                api_url,
                server_name,
                default_ns,
                dry_run,
                ..
            } => f
                .debug_struct("PowerDns")
                .field("api_url", api_url)
                .field("api_key", &"<redacted>")
                .field("server_name", server_name)
                .field("default_ns", default_ns)
                .field("dry_run", dry_run)
                .finish(),
            ProviderConfig::Namecheap {
                api_user,
                client_ip,
                base_url,
                dry_run,
                ..
            } => f
                .debug_struct("Namecheap")
                .field("api_user", api_user)
                .field("api_key", &"<redacted>")
                .field("client_ip", client_ip)
                .field("base_url", base_url)
                .field("dry_run", dry_run)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<redacted>")
                .finish(),
        }
    }
}

/// Declared state of one zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone origin (e.g., "example.com")
    pub origin: String,

    /// Records to keep in the zone
    #[serde(default)]
    pub records: Vec<RecordConfig>,

    /// Delegated nameservers; empty leaves delegation alone
    #[serde(default)]
    pub nameservers: Vec<String>,
}

impl ZoneConfig {
    /// Create an empty zone configuration
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            records: Vec::new(),
            nameservers: Vec::new(),
        }
    }

    /// Add a record
    pub fn with_record(mut self, record: RecordConfig) -> Self {
        self.records.push(record);
        self
    }

    fn normalized_origin(&self) -> String {
        self.origin.trim().trim_end_matches('.').to_ascii_lowercase()
    }

    fn validate(&self) -> Result<()> {
        if self.normalized_origin().is_empty() {
            return Err(Error::config("Zone origin cannot be empty"));
        }
        Ok(())
    }

    /// Parse the zone into a canonical declaration
    ///
    /// Records without a TTL get `default_ttl`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRecord`] for an unknown type, a name outside the zone
    /// or malformed content.
    pub fn to_declaration(&self, default_ttl: u32) -> Result<ZoneDeclaration> {
        let mut declaration = ZoneDeclaration::new(&self.origin);
        for record in &self.records {
            let rtype: RecordType = record.record_type.parse()?;
            let parsed = Record::parse(
                &record.name,
                rtype,
                &record.content,
                record.ttl.unwrap_or(default_ttl),
                &declaration.origin,
            )
            .map_err(|e| match e {
                Error::InvalidRecord(msg) => {
                    Error::invalid_record(format!("zone {}: {msg}", declaration.origin))
                }
                other => other,
            })?;
            declaration.records.push(parsed);
        }
        declaration.nameservers = self.nameservers.clone();
        Ok(declaration)
    }
}

/// One declared record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Record name: label, "@", or fully-qualified name
    pub name: String,

    /// Record type, case-insensitive (e.g., "A", "mx")
    #[serde(rename = "type")]
    pub record_type: String,

    /// Content in zone-file notation
    pub content: String,

    /// TTL in seconds; the engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            content: content.into(),
            ttl: None,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Attempts per backend call while the backend reports rate limiting
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// TTL for declared records that do not set one
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Upper bound on zones reconciled at once
    ///
    /// Only used for backends declaring concurrency safety; all other
    /// backends reconcile one zone at a time.
    #[serde(default = "default_max_concurrent_zones")]
    pub max_concurrent_zones: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be > 0"));
        }
        if self.max_concurrent_zones == 0 {
            return Err(Error::config("max_concurrent_zones must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            default_ttl: default_ttl(),
            max_concurrent_zones: default_max_concurrent_zones(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_max_attempts() -> u32 {
    23
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_client_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_ttl() -> u32 {
    crate::traits::DEFAULT_TTL
}

fn default_max_concurrent_zones() -> usize {
    4
}

fn default_event_channel_capacity() -> usize {
    1000
}
