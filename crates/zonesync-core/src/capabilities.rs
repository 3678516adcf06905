// # Capability Descriptors
//
// Each backend publishes one immutable `ProviderFeatures` value describing
// what it can do: incremental record CRUD or only full-zone replacement,
// which record types it accepts, whether zones may be reconciled in
// parallel, and whether the registrar owns the apex NS records.
//
// Capabilities form a closed enumeration with a tri-state answer
// (`Can` / `Cannot` / `Unimplemented`) plus optional caveat text.
// Unlisted capabilities default to `Cannot`; the baseline record types
// (A, AAAA, CNAME, MX, TXT, NS) default to `Can`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{Record, RecordType};

/// Tri-state support answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    /// The backend supports it
    Can,
    /// The backend cannot do it
    Cannot,
    /// The backend could, but the adapter does not implement it yet
    Unimplemented,
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Support::Can => f.write_str("can"),
            Support::Cannot => f.write_str("cannot"),
            Support::Unimplemented => f.write_str("unimplemented"),
        }
    }
}

/// Support answer with optional caveat text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSupport {
    /// The answer
    pub support: Support,
    /// Free-text caveat shown to operators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveat: Option<String>,
}

impl FeatureSupport {
    /// Supported
    pub fn can() -> Self {
        Self {
            support: Support::Can,
            caveat: None,
        }
    }

    /// Not supported
    pub fn cannot() -> Self {
        Self {
            support: Support::Cannot,
            caveat: None,
        }
    }

    /// Not implemented by the adapter
    pub fn unimplemented() -> Self {
        Self {
            support: Support::Unimplemented,
            caveat: None,
        }
    }

    /// Attach caveat text
    pub fn with_caveat(mut self, caveat: impl Into<String>) -> Self {
        self.caveat = Some(caveat.into());
        self
    }
}

/// Closed set of capability kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Can enumerate the zones of an account
    GetZones,
    /// Safe to reconcile several zones at once
    Concurrency,
    /// Can serve a zone alongside another provider
    DualHost,
    /// Can create zones that do not exist yet
    CreateDomains,
    /// Can store records of the given type
    RecordType(RecordType),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::GetZones => f.write_str("get-zones"),
            Capability::Concurrency => f.write_str("concurrency"),
            Capability::DualHost => f.write_str("dual-host"),
            Capability::CreateDomains => f.write_str("create-domains"),
            Capability::RecordType(rtype) => write!(f, "record-type {rtype}"),
        }
    }
}

/// Immutable per-backend capability descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFeatures {
    provider: String,
    incremental_crud: bool,
    registrar_controls_apex_ns: bool,
    entries: BTreeMap<Capability, FeatureSupport>,
}

impl ProviderFeatures {
    /// Start a descriptor for `provider`
    pub fn builder(provider: impl Into<String>) -> ProviderFeaturesBuilder {
        ProviderFeaturesBuilder {
            features: ProviderFeatures {
                provider: provider.into(),
                incremental_crud: false,
                registrar_controls_apex_ns: false,
                entries: BTreeMap::new(),
            },
        }
    }

    /// Backend the descriptor belongs to
    pub fn provider_name(&self) -> &str {
        &self.provider
    }

    /// Whether individual records can be created, deleted and modified
    pub fn supports_incremental(&self) -> bool {
        self.incremental_crud
    }

    /// Whether apex NS records are owned by the registrar and immutable
    pub fn registrar_controls_apex_ns(&self) -> bool {
        self.registrar_controls_apex_ns
    }

    /// Support answer for a capability
    pub fn support(&self, capability: Capability) -> Support {
        match self.entries.get(&capability) {
            Some(entry) => entry.support,
            None => match capability {
                Capability::RecordType(rtype) if rtype.is_baseline() => Support::Can,
                _ => Support::Cannot,
            },
        }
    }

    /// Caveat text for a capability, if the descriptor lists one
    pub fn caveat(&self, capability: Capability) -> Option<&str> {
        self.entries
            .get(&capability)
            .and_then(|entry| entry.caveat.as_deref())
    }

    /// Support answer for a record type
    pub fn record_type_support(&self, rtype: RecordType) -> Support {
        self.support(Capability::RecordType(rtype))
    }

    /// Whether zones of this backend may be reconciled concurrently
    pub fn is_concurrency_safe(&self) -> bool {
        self.support(Capability::Concurrency) == Support::Can
    }

    /// Explicitly listed entries, in capability order
    pub fn entries(&self) -> impl Iterator<Item = (&Capability, &FeatureSupport)> {
        self.entries.iter()
    }

    /// Reject declared records whose type the backend cannot store
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRecordType`] for the first offending type
    /// (in type order, so the message is stable).
    pub fn check_record_types(&self, records: &[Record]) -> Result<()> {
        let mut types: Vec<RecordType> = records.iter().map(|r| r.record_type).collect();
        types.sort();
        types.dedup();

        for rtype in types {
            let support = self.record_type_support(rtype);
            if support != Support::Can {
                let capability = Capability::RecordType(rtype);
                return Err(Error::UnsupportedRecordType {
                    provider: self.provider.clone(),
                    record_type: rtype.to_string(),
                    caveat: Some(
                        self.caveat(capability)
                            .map(str::to_string)
                            .unwrap_or_else(|| support.to_string()),
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`ProviderFeatures`]
#[derive(Debug)]
pub struct ProviderFeaturesBuilder {
    features: ProviderFeatures,
}

impl ProviderFeaturesBuilder {
    /// Declare incremental record CRUD support
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.features.incremental_crud = incremental;
        self
    }

    /// Declare that the registrar owns apex NS records
    pub fn registrar_controls_apex_ns(mut self, controls: bool) -> Self {
        self.features.registrar_controls_apex_ns = controls;
        self
    }

    /// Set the answer for a capability
    pub fn with(mut self, capability: Capability, support: FeatureSupport) -> Self {
        self.features.entries.insert(capability, support);
        self
    }

    /// Set the answer for a record type
    pub fn record_type(self, rtype: RecordType, support: FeatureSupport) -> Self {
        self.with(Capability::RecordType(rtype), support)
    }

    /// Finish the descriptor
    pub fn build(self) -> ProviderFeatures {
        self.features
    }
}
