//! Zone declaration handed to the engine for one reconciliation pass

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::record::Record;

/// Desired state of one zone
///
/// Owned by configuration and immutable once handed to the engine. Records
/// keep their declared order but are compared with set semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDeclaration {
    /// Zone origin, lowercase without trailing dot
    pub origin: String,

    /// Desired records in canonical form
    #[serde(default)]
    pub records: Vec<Record>,

    /// Desired delegation (registrar role)
    #[serde(default)]
    pub nameservers: Vec<String>,
}

impl ZoneDeclaration {
    /// Create an empty declaration for `origin`
    pub fn new(origin: impl AsRef<str>) -> Self {
        Self {
            origin: origin.as_ref().trim().trim_end_matches('.').to_ascii_lowercase(),
            records: Vec::new(),
            nameservers: Vec::new(),
        }
    }

    /// Add a record
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Replace the desired nameserver list
    pub fn with_nameservers<I, S>(mut self, nameservers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nameservers = nameservers.into_iter().map(Into::into).collect();
        self
    }

    /// Validate every record of the declaration
    pub fn validate(&self) -> Result<()> {
        self.records.iter().try_for_each(Record::validate)
    }
}
