//! Canonical DNS record
//!
//! A [`Record`] is always stored in normalized form: the label is relative to
//! the zone origin (`@` for the apex) and the target is the type-specific
//! canonical value produced by the record type's handler. Two records that
//! describe the same remote state therefore compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::model::rtype::RecordType;

/// Label used for the zone apex
pub const APEX: &str = "@";

/// Type-specific ancillary fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordFields {
    /// No extra fields
    #[default]
    None,
    /// MX preference
    Mx {
        /// Lower is preferred
        preference: u16,
    },
    /// SRV locator fields
    Srv {
        /// Priority
        priority: u16,
        /// Weight
        weight: u16,
        /// Port
        port: u16,
    },
    /// CAA flag and property tag
    Caa {
        /// Issuer critical flag
        flag: u8,
        /// Property tag (`issue`, `issuewild`, `iodef`, ...)
        tag: String,
    },
}

impl RecordFields {
    /// Whether the record carries no ancillary fields
    pub fn is_none(&self) -> bool {
        matches!(self, RecordFields::None)
    }
}

/// A single DNS record in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Label relative to the zone origin, `@` for the apex
    pub label: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Canonical target value
    pub target: String,

    /// Time-to-live in seconds; 0 means "backend default"
    pub ttl: u32,

    /// Type-specific fields (MX preference, SRV locator, CAA flag/tag)
    #[serde(default, skip_serializing_if = "RecordFields::is_none")]
    pub fields: RecordFields,
}

impl Record {
    /// Build a canonical record from raw, possibly fully-qualified input
    ///
    /// # Parameters
    ///
    /// - `name`: label or FQDN of the record
    /// - `record_type`: the record type
    /// - `content`: raw content string in the usual zone-file notation
    ///   (`10 mail.example.com.` for MX, `0 issue "ca.example"` for CAA, ...)
    /// - `ttl`: time-to-live, 0 when unknown
    /// - `origin`: the zone origin the record belongs to
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] when the label lies outside the zone
    /// or the content is malformed for the type.
    pub fn parse(
        name: &str,
        record_type: RecordType,
        content: &str,
        ttl: u32,
        origin: &str,
    ) -> Result<Self> {
        let label = normalize_label(name, origin)?;
        let parsed = (record_type.handler().parse)(content, origin).map_err(|e| match e {
            Error::InvalidRecord(msg) => {
                Error::invalid_record(format!("{label} {record_type}: {msg}"))
            }
            other => other,
        })?;

        Ok(Self {
            label,
            record_type,
            target: parsed.target,
            ttl,
            fields: parsed.fields,
        })
    }

    /// The `(label, type)` grouping key
    pub fn key(&self) -> (&str, RecordType) {
        (&self.label, self.record_type)
    }

    /// Whether the record sits at the zone apex
    pub fn is_apex(&self) -> bool {
        self.label == APEX
    }

    /// Combined value string (preference and target for MX, etc.)
    pub fn combined(&self) -> String {
        (self.record_type.handler().serialize)(self)
    }

    /// Validate a record that was not built through [`Record::parse`]
    pub fn validate(&self) -> Result<()> {
        if self.label.is_empty() || self.label.ends_with('.') {
            return Err(Error::invalid_record(format!(
                "label '{}' is not relative to the zone origin",
                self.label
            )));
        }
        (self.record_type.handler().validate)(self)
    }

    /// Fully-qualified owner name with trailing dot
    pub fn fqdn(&self, origin: &str) -> String {
        let origin = origin.trim_end_matches('.');
        if self.is_apex() {
            format!("{origin}.")
        } else {
            format!("{}.{origin}.", self.label)
        }
    }

    /// Same record with another TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether two records differ only in TTL or ancillary fields
    pub fn same_value(&self, other: &Record) -> bool {
        self.key() == other.key() && self.target == other.target
    }

    /// Deterministic ordering key: label, type name, target, combined value
    pub(crate) fn sort_key(&self) -> (&str, &'static str, &str, String, u32) {
        (
            &self.label,
            self.record_type.as_str(),
            &self.target,
            self.combined(),
            self.ttl,
        )
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ttl={}",
            self.label,
            self.record_type,
            self.combined(),
            self.ttl
        )
    }
}

/// Fold a name back to a label relative to `origin`.
///
/// The apex (empty, `@`, or the origin itself) becomes [`APEX`]. Names under
/// the origin lose the origin suffix whether or not they carry a trailing
/// dot. An absolute name outside the zone is an error.
pub fn normalize_label(name: &str, origin: &str) -> Result<String> {
    let origin = origin.trim().trim_end_matches('.').to_ascii_lowercase();
    let trimmed = name.trim();
    let absolute = trimmed.ends_with('.');
    let lower = trimmed.trim_end_matches('.').to_ascii_lowercase();

    if lower.is_empty() || lower == APEX || lower == origin {
        return Ok(APEX.to_string());
    }
    if lower.chars().any(char::is_whitespace) {
        return Err(Error::invalid_record(format!("invalid record name '{name}'")));
    }
    if let Some(prefix) = lower.strip_suffix(&format!(".{origin}")) {
        return Ok(prefix.to_string());
    }
    if absolute {
        return Err(Error::invalid_record(format!(
            "record name '{name}' is outside zone {origin}"
        )));
    }
    Ok(lower)
}

/// Substitute `default_ttl` for records that report no TTL
pub fn apply_default_ttl(records: &mut [Record], default_ttl: u32) {
    for record in records.iter_mut().filter(|r| r.ttl == 0) {
        record.ttl = default_ttl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_fold_to_origin() {
        assert_eq!(normalize_label("example.com.", "example.com").unwrap(), "@");
        assert_eq!(normalize_label("", "example.com").unwrap(), "@");
        assert_eq!(normalize_label("@", "example.com.").unwrap(), "@");
        assert_eq!(normalize_label("WWW.Example.com.", "example.com").unwrap(), "www");
        assert_eq!(normalize_label("a.b.example.com", "example.com").unwrap(), "a.b");
        assert_eq!(normalize_label("www", "example.com").unwrap(), "www");
    }

    #[test]
    fn absolute_names_outside_zone_are_rejected() {
        let err = normalize_label("www.other.org.", "example.com").unwrap_err();
        assert!(err.to_string().contains("outside zone"));
    }

    #[test]
    fn parse_builds_canonical_mx() {
        let rec = Record::parse("example.com.", RecordType::Mx, "10 MAIL", 0, "example.com").unwrap();
        assert_eq!(rec.label, "@");
        assert_eq!(rec.target, "mail.example.com.");
        assert_eq!(rec.fields, RecordFields::Mx { preference: 10 });
        assert_eq!(rec.combined(), "10 mail.example.com.");
        assert_eq!(rec.to_string(), "@ MX 10 mail.example.com. ttl=0");
    }

    #[test]
    fn parse_errors_name_the_record() {
        let err = Record::parse("www", RecordType::A, "not-an-ip", 300, "example.com").unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
        assert!(err.to_string().contains("www A"));
    }

    #[test]
    fn caa_combined_string_is_stable() {
        let rec = Record::parse("@", RecordType::Caa, "0 ISSUE letsencrypt.org", 300, "example.com")
            .unwrap();
        assert_eq!(rec.combined(), "0 issue \"letsencrypt.org\"");
    }

    #[test]
    fn hand_built_records_are_validated() {
        let good = Record {
            label: "www".to_string(),
            record_type: RecordType::Cname,
            target: "web.example.com.".to_string(),
            ttl: 300,
            fields: RecordFields::None,
        };
        assert!(good.validate().is_ok());

        let relative_target = Record {
            target: "web".to_string(),
            ..good.clone()
        };
        assert!(relative_target.validate().is_err());

        let mx_without_preference = Record {
            record_type: RecordType::Mx,
            ..good
        };
        assert!(mx_without_preference.validate().is_err());
    }

    #[test]
    fn default_ttl_only_fills_zero() {
        let mut records = vec![
            Record::parse("a", RecordType::A, "1.1.1.1", 0, "example.com").unwrap(),
            Record::parse("b", RecordType::A, "1.1.1.2", 60, "example.com").unwrap(),
        ];
        apply_default_ttl(&mut records, 1800);
        assert_eq!(records[0].ttl, 1800);
        assert_eq!(records[1].ttl, 60);
    }

    #[test]
    fn fqdn_rebuilds_owner_name() {
        let apex = Record::parse("@", RecordType::Txt, "hello", 300, "example.com").unwrap();
        let www = Record::parse("www", RecordType::Txt, "hello", 300, "example.com").unwrap();
        assert_eq!(apex.fqdn("example.com"), "example.com.");
        assert_eq!(www.fqdn("example.com."), "www.example.com.");
    }
}
