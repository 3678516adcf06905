//! Correction planner
//!
//! Turns a [`DiffOutcome`] into the ordered list of [`Correction`]s that the
//! executor runs, according to what the backend's capability descriptor
//! says it can do.
//!
//! - Incremental backends get one correction per record change, so a failure
//!   is reported against exactly one record.
//! - Bundle-only backends get at most one correction that replaces the whole
//!   zone; its description still lists every change.
//! - Notices always come first, as description-only corrections.

pub mod nameservers;

use serde::Serialize;

use crate::capabilities::ProviderFeatures;
use crate::diff::{DiffOutcome, Modification};
use crate::model::Record;
use crate::traits::IncrementalChanges;

pub use nameservers::{canonical_nameservers, nameserver_corrections};

/// Deferred operation against a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionAction {
    /// Create, delete or modify individual records
    Incremental(IncrementalChanges),
    /// Replace the whole zone with the given records
    ReplaceZone(Vec<Record>),
    /// Replace the delegated nameservers (registrar role)
    SetNameservers(Vec<String>),
}

/// A single planned, describable, optionally executable change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    /// Zone (or domain) the correction applies to
    pub zone: String,

    /// Human-readable text for preview and audit
    pub description: String,

    /// The operation to run; `None` for report-only notices
    #[serde(skip)]
    pub action: Option<CorrectionAction>,
}

impl Correction {
    /// Description-only correction
    pub fn report(zone: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            description: description.into(),
            action: None,
        }
    }

    /// Correction carrying an action
    pub fn new(
        zone: impl Into<String>,
        description: impl Into<String>,
        action: CorrectionAction,
    ) -> Self {
        Self {
            zone: zone.into(),
            description: description.into(),
            action: Some(action),
        }
    }

    /// Whether the correction is an informational notice
    pub fn is_report_only(&self) -> bool {
        self.action.is_none()
    }
}

/// Preview line for a creation
pub fn describe_create(record: &Record) -> String {
    format!("+ CREATE {record}")
}

/// Preview line for a deletion
pub fn describe_delete(record: &Record) -> String {
    format!("- DELETE {record}")
}

/// Preview line for a modification
pub fn describe_modify(modification: &Modification) -> String {
    let Modification { from, to } = modification;
    format!(
        "± MODIFY {} {}: ({} ttl={}) -> ({} ttl={})",
        to.label,
        to.record_type,
        from.combined(),
        from.ttl,
        to.combined(),
        to.ttl
    )
}

/// Plan the corrections for one zone
///
/// # Parameters
///
/// - `zone`: zone origin
/// - `outcome`: the diff of the zone
/// - `features`: the backend's capability descriptor
///
/// # Returns
///
/// Notices first, then either one correction per change (creates, deletes,
/// modifies, each in sorted order) or a single full-zone replacement. An
/// empty change set yields no executable correction.
pub fn plan_corrections(
    zone: &str,
    outcome: &DiffOutcome,
    features: &ProviderFeatures,
) -> Vec<Correction> {
    let changes = &outcome.changes;
    let mut corrections: Vec<Correction> = changes
        .to_report
        .iter()
        .map(|notice| Correction::report(zone, notice.clone()))
        .collect();

    if changes.is_empty() {
        return corrections;
    }

    if features.supports_incremental() {
        for record in &changes.to_create {
            corrections.push(Correction::new(
                zone,
                describe_create(record),
                CorrectionAction::Incremental(IncrementalChanges::create(record.clone())),
            ));
        }
        for record in &changes.to_delete {
            corrections.push(Correction::new(
                zone,
                describe_delete(record),
                CorrectionAction::Incremental(IncrementalChanges::delete(record.clone())),
            ));
        }
        for modification in &changes.to_modify {
            corrections.push(Correction::new(
                zone,
                describe_modify(modification),
                CorrectionAction::Incremental(IncrementalChanges::modify(modification.clone())),
            ));
        }
    } else {
        let mut description = format!(
            "GENERATE_ZONE: {} ({} records)",
            zone,
            outcome.effective_desired.len()
        );
        let lines = changes
            .to_create
            .iter()
            .map(describe_create)
            .chain(changes.to_delete.iter().map(describe_delete))
            .chain(changes.to_modify.iter().map(describe_modify));
        for line in lines {
            description.push('\n');
            description.push_str(&line);
        }
        corrections.push(Correction::new(
            zone,
            description,
            CorrectionAction::ReplaceZone(outcome.effective_desired.clone()),
        ));
    }

    corrections
}
