//! Nameserver reconciliation for the registrar role

use crate::diff::canonical_host_name;
use crate::plan::{Correction, CorrectionAction};

/// Order-insensitive, case-normalized join of a nameserver list
///
/// Duplicates are kept so that a repeated entry shows up in the correction.
pub fn canonical_nameservers(nameservers: &[String]) -> String {
    let mut names: Vec<String> = nameservers
        .iter()
        .map(|ns| canonical_host_name(ns))
        .filter(|ns| !ns.is_empty())
        .collect();
    names.sort();
    names.join(",")
}

/// Plan the registrar correction for `domain`
///
/// Returns exactly one correction when the delegated set differs from the
/// declared one, none otherwise.
pub fn nameserver_corrections(
    domain: &str,
    actual: &[String],
    desired: &[String],
) -> Vec<Correction> {
    let found = canonical_nameservers(actual);
    let wanted = canonical_nameservers(desired);
    if found == wanted {
        return Vec::new();
    }

    let list: Vec<String> = wanted
        .split(',')
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect();
    vec![Correction::new(
        domain,
        format!("Change Nameservers from '{found}' to '{wanted}'"),
        CorrectionAction::SetNameservers(list),
    )]
}
