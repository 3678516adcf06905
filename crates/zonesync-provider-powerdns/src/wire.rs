//! PowerDNS wire format
//!
//! PowerDNS groups records into rrsets keyed by fully-qualified owner name
//! and type, with one TTL per rrset. Changes are sent as `PATCH` bodies of
//! rrsets carrying a `changetype` of `REPLACE` (the rrset becomes exactly the
//! listed records) or `DELETE`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zonesync_core::model::Record;
use zonesync_core::traits::IncrementalChanges;
use zonesync_core::{RecordType, Result};

/// Zone as returned by `GET /servers/{server}/zones/{zone}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneBody {
    /// All rrsets of the zone
    #[serde(default)]
    pub rrsets: Vec<RrSet>,
}

/// One rrset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrSet {
    /// Owner name with trailing dot
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub rtype: String,

    /// TTL shared by every record of the rrset
    #[serde(default)]
    pub ttl: u32,

    /// Records of the rrset
    #[serde(default)]
    pub records: Vec<RrRecord>,

    /// `REPLACE` or `DELETE`, only present in PATCH bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changetype: Option<String>,
}

/// One record inside an rrset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrRecord {
    /// Content in zone-file notation
    pub content: String,

    /// Disabled records are served by nobody
    #[serde(default)]
    pub disabled: bool,
}

/// PATCH request body
#[derive(Debug, Clone, Serialize)]
pub struct PatchBody {
    /// Changed rrsets
    pub rrsets: Vec<RrSet>,
}

/// `(owner fqdn, type)` key of an rrset
pub type RrKey = (String, RecordType);

/// Convert fetched rrsets into canonical records
///
/// SOA, disabled records and types the record model does not know are
/// skipped.
pub fn records_from_zone(zone: &str, body: &ZoneBody) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for rrset in &body.rrsets {
        if rrset.rtype.eq_ignore_ascii_case("SOA") {
            continue;
        }
        let rtype: RecordType = match rrset.rtype.parse() {
            Ok(rtype) => rtype,
            Err(_) => {
                debug!("Skipping {} rrset {}", rrset.rtype, rrset.name);
                continue;
            }
        };
        for rr in rrset.records.iter().filter(|rr| !rr.disabled) {
            records.push(Record::parse(&rrset.name, rtype, &rr.content, rrset.ttl, zone)?);
        }
    }
    Ok(records)
}

/// Content string PowerDNS expects for a record
pub fn content_of(record: &Record) -> String {
    match record.record_type {
        RecordType::Txt => quote_txt(&record.target),
        _ => record.combined(),
    }
}

fn quote_txt(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Group canonical records into rrsets
pub fn group(zone: &str, records: &[Record]) -> BTreeMap<RrKey, Vec<Record>> {
    let mut groups: BTreeMap<RrKey, Vec<Record>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.fqdn(zone), record.record_type))
            .or_default()
            .push(record.clone());
    }
    groups
}

/// Build the PATCH rrset for a key: `REPLACE` with `records`, or `DELETE`
/// when nothing is left
pub fn rrset_change(key: &RrKey, records: &[Record]) -> RrSet {
    let (name, rtype) = key;
    if records.is_empty() {
        return RrSet {
            name: name.clone(),
            rtype: rtype.to_string(),
            ttl: 0,
            records: Vec::new(),
            changetype: Some("DELETE".to_string()),
        };
    }

    // PowerDNS keeps one TTL per rrset; the lowest declared one wins
    let ttl = records.iter().map(|r| r.ttl).min().unwrap_or_default();
    RrSet {
        name: name.clone(),
        rtype: rtype.to_string(),
        ttl,
        records: records
            .iter()
            .map(|r| RrRecord {
                content: content_of(r),
                disabled: false,
            })
            .collect(),
        changetype: Some("REPLACE".to_string()),
    }
}

/// Merge incremental changes into the current content of the affected
/// rrsets
///
/// Only keys touched by `changes` are returned. Deletions and the old side
/// of modifications match on value (target and fields), not on TTL.
pub fn merge_changes(
    zone: &str,
    current: &[Record],
    changes: &IncrementalChanges,
) -> BTreeMap<RrKey, Vec<Record>> {
    let mut existing = group(zone, current);
    let mut merged: BTreeMap<RrKey, Vec<Record>> = BTreeMap::new();

    let mut touch = |record: &Record| -> RrKey {
        let key = (record.fqdn(zone), record.record_type);
        if !merged.contains_key(&key) {
            let records = existing.remove(&key).unwrap_or_default();
            merged.insert(key.clone(), records);
        }
        key
    };

    let mut deletions = Vec::new();
    for record in &changes.deletes {
        deletions.push((touch(record), record.clone()));
    }
    // TTL carried by the changed records; it becomes the rrset's TTL
    let mut ttls: BTreeMap<RrKey, u32> = BTreeMap::new();
    let mut replacements = Vec::new();
    for modification in &changes.modifies {
        let key = touch(&modification.to);
        ttls.insert(key.clone(), modification.to.ttl);
        replacements.push((key, modification.clone()));
    }
    let mut creations = Vec::new();
    for record in &changes.creates {
        let key = touch(record);
        ttls.insert(key.clone(), record.ttl);
        creations.push((key, record.clone()));
    }

    for (key, record) in deletions {
        if let Some(records) = merged.get_mut(&key) {
            records.retain(|r| !(r.target == record.target && r.fields == record.fields));
        }
    }
    for (key, modification) in replacements {
        if let Some(records) = merged.get_mut(&key) {
            records.retain(|r| {
                !(r.target == modification.from.target && r.fields == modification.from.fields)
            });
            records.push(modification.to);
        }
    }
    for (key, record) in creations {
        if let Some(records) = merged.get_mut(&key) {
            if !records.iter().any(|r| r.target == record.target && r.fields == record.fields) {
                records.push(record);
            }
        }
    }

    // PowerDNS keeps one TTL per rrset: the changed record sets it, an
    // rrset only losing values keeps its lowest one
    for (key, records) in merged.iter_mut() {
        let ttl = match ttls.get(key) {
            Some(ttl) => Some(*ttl),
            None => records.iter().map(|r| r.ttl).min(),
        };
        if let Some(ttl) = ttl {
            for record in records.iter_mut() {
                record.ttl = ttl;
            }
        }
    }

    merged
}
