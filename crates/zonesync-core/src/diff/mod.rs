//! Diff engine
//!
//! Compares a desired record collection against the fetched actual
//! collection and classifies every difference as a creation, deletion or
//! modification, plus informational notices for changes that cannot be made.
//!
//! ## Algorithm
//!
//! ```text
//! desired ──┐                         ┌── to_create
//!           ├─ group by (label, type) ┼── to_delete
//! actual  ──┘   compare value sets    ├── to_modify
//!                                     └── to_report
//! ```
//!
//! Within a `(label, type)` key the records form an unordered value set:
//!
//! 1. Values equal on both sides (target, TTL and ancillary fields) cancel.
//! 2. Remaining values with the same target on both sides pair up as a
//!    modification (TTL or ancillary field change).
//! 3. Whatever is left on the desired side is created, on the actual side
//!    deleted.
//!
//! Every output list is sorted by `(label, type, target)` so repeated runs
//! over unchanged input describe the same changes in the same order.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::model::{Record, RecordType};

/// A record whose TTL or ancillary fields change in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modification {
    /// The record as it exists at the backend
    pub from: Record,
    /// The record as declared
    pub to: Record,
}

/// Classification of the differences between desired and actual state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Declared values missing at the backend
    pub to_create: Vec<Record>,
    /// Backend values that are not declared
    pub to_delete: Vec<Record>,
    /// Values present on both sides with a differing TTL or field
    pub to_modify: Vec<Modification>,
    /// Informational notices with no executable action
    pub to_report: Vec<String>,
}

impl ChangeSet {
    /// Whether there is nothing to create, delete or modify
    ///
    /// Notices do not count: they never result in a backend call.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty() && self.to_modify.is_empty()
    }

    /// Number of executable record changes
    pub fn change_count(&self) -> usize {
        self.to_create.len() + self.to_delete.len() + self.to_modify.len()
    }
}

/// Backend-specific knobs for a diff
pub struct DiffOptions<'a> {
    /// Backend name, used in notices
    pub provider: &'a str,

    /// Exclude apex NS records from both sides
    pub filter_apex_ns: bool,

    /// Nameservers the backend delegates to by default
    pub default_nameservers: &'a [String],

    /// Recognises the backend's auto-injected placeholder content
    pub is_placeholder: Option<&'a (dyn Fn(&[Record]) -> bool + Send + Sync)>,
}

impl<'a> DiffOptions<'a> {
    /// Options with no backend quirks
    pub fn plain(provider: &'a str) -> Self {
        Self {
            provider,
            filter_apex_ns: false,
            default_nameservers: &[],
            is_placeholder: None,
        }
    }
}

/// Result of a diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// The classified changes
    pub changes: ChangeSet,

    /// Desired records actually compared (apex NS filtered, duplicates
    /// removed), sorted; this is what a full-zone replacement transmits
    pub effective_desired: Vec<Record>,
}

type Key = (String, RecordType);

/// Compute the changes that make `actual` match `desired`
///
/// Both collections must already be normalized (canonical targets, default
/// TTLs substituted). The function is pure.
pub fn diff(desired: &[Record], actual: &[Record], options: &DiffOptions<'_>) -> DiffOutcome {
    let mut to_report = Vec::new();

    let mut effective_desired: Vec<Record> = Vec::with_capacity(desired.len());
    for record in desired {
        if options.filter_apex_ns && is_apex_ns(record) {
            if !matches_default_nameserver(&record.target, options.default_nameservers) {
                to_report.push(format!(
                    "{} does not support changing apex NS records. Skipping {}",
                    options.provider, record
                ));
            }
            continue;
        }
        if !effective_desired.contains(record) {
            effective_desired.push(record.clone());
        }
    }
    effective_desired.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let placeholder = effective_desired.is_empty()
        && !actual.is_empty()
        && options.is_placeholder.is_some_and(|matches| matches(actual));
    if placeholder {
        debug!(
            "Treating {} placeholder record(s) as an empty zone",
            actual.len()
        );
    }

    let mut actual_groups: BTreeMap<Key, Vec<Record>> = BTreeMap::new();
    if !placeholder {
        for record in actual {
            if options.filter_apex_ns && is_apex_ns(record) {
                continue;
            }
            let group = actual_groups.entry(group_key(record)).or_default();
            if !group.contains(record) {
                group.push(record.clone());
            }
        }
    }

    let mut desired_groups: BTreeMap<Key, Vec<Record>> = BTreeMap::new();
    for record in &effective_desired {
        desired_groups
            .entry(group_key(record))
            .or_default()
            .push(record.clone());
    }

    let mut changes = ChangeSet {
        to_report,
        ..ChangeSet::default()
    };

    for (key, mut wanted) in desired_groups {
        let existing = actual_groups.remove(&key).unwrap_or_default();
        diff_values(&mut wanted, existing, &mut changes);
    }
    // Keys only present at the backend
    for (_, existing) in actual_groups {
        changes.to_delete.extend(existing);
    }

    changes.to_create.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    changes.to_delete.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    changes
        .to_modify
        .sort_by(|a, b| a.to.sort_key().cmp(&b.to.sort_key()));

    DiffOutcome {
        changes,
        effective_desired,
    }
}

/// Compare the value sets of one `(label, type)` key
fn diff_values(wanted: &mut Vec<Record>, mut existing: Vec<Record>, changes: &mut ChangeSet) {
    // Identical values on both sides
    wanted.retain(|record| match existing.iter().position(|e| e == record) {
        Some(idx) => {
            existing.swap_remove(idx);
            false
        }
        None => true,
    });

    for record in wanted.drain(..) {
        match existing.iter().position(|e| e.same_value(&record)) {
            Some(idx) => {
                let from = existing.swap_remove(idx);
                changes.to_modify.push(Modification { from, to: record });
            }
            None => changes.to_create.push(record),
        }
    }

    changes.to_delete.extend(existing);
}

fn group_key(record: &Record) -> Key {
    (record.label.clone(), record.record_type)
}

fn is_apex_ns(record: &Record) -> bool {
    record.is_apex() && record.record_type == RecordType::Ns
}

fn matches_default_nameserver(target: &str, defaults: &[String]) -> bool {
    let target = canonical_host_name(target);
    defaults.iter().any(|ns| canonical_host_name(ns) == target)
}

/// Lowercase host name without trailing dot
pub(crate) fn canonical_host_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
