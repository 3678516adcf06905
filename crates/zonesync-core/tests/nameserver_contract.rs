//! Contract Test: Registrar Nameserver Reconciliation
//!
//! Delegation is compared as a sorted, case-normalized set. Equal sets give
//! no correction; any difference gives exactly one correction naming the old
//! and new joined strings.

mod common;

use std::sync::Arc;

use common::*;
use zonesync_core::{CorrectionAction, CorrectionStatus, RunMode};

fn with_nameservers(list: &[&str]) -> zonesync_core::ZoneDeclaration {
    zone(Vec::new()).with_nameservers(list.iter().copied())
}

#[tokio::test]
async fn reordered_delegation_needs_no_change() {
    let registrar = Arc::new(MockRegistrar::new(&["ns2.example.com", "ns1.example.com"]));
    let h = harness(Arc::new(MockProvider::incremental()), Some(registrar.clone()), 3);

    let plan = h
        .engine
        .plan_zone(&with_nameservers(&["ns1.example.com", "ns2.example.com"]))
        .await
        .unwrap();

    assert!(plan.corrections.is_empty());
}

#[tokio::test]
async fn one_differing_entry_yields_one_correction() {
    let registrar = Arc::new(MockRegistrar::new(&["ns2.example.com", "ns1.example.com"]));
    let h = harness(Arc::new(MockProvider::incremental()), Some(registrar.clone()), 3);

    let declaration = with_nameservers(&["ns1.example.com", "ns3.example.com"]);
    let plan = h.engine.plan_zone(&declaration).await.unwrap();

    assert_eq!(plan.corrections.len(), 1);
    assert_eq!(
        plan.corrections[0].description,
        "Change Nameservers from 'ns1.example.com,ns2.example.com' to 'ns1.example.com,ns3.example.com'"
    );
    assert!(matches!(
        &plan.corrections[0].action,
        Some(CorrectionAction::SetNameservers(list)) if list.len() == 2
    ));

    let report = h.engine.reconcile_zone(&declaration, RunMode::Push).await.unwrap();
    assert_eq!(report.outcomes[0].status, CorrectionStatus::Applied);
    assert_eq!(registrar.set_calls(), 1);
    assert_eq!(
        registrar.nameservers(),
        vec!["ns1.example.com".to_string(), "ns3.example.com".to_string()]
    );
}

#[tokio::test]
async fn undeclared_delegation_is_left_alone() {
    let registrar = Arc::new(MockRegistrar::new(&["ns1.old.net"]));
    let h = harness(Arc::new(MockProvider::incremental()), Some(registrar.clone()), 3);

    let plan = h.engine.plan_zone(&zone(Vec::new())).await.unwrap();
    assert!(plan.corrections.is_empty());
    assert_eq!(registrar.set_calls(), 0);
}

#[tokio::test]
async fn registrar_correction_follows_record_corrections() {
    let registrar = Arc::new(MockRegistrar::new(&["ns1.old.net"]));
    let h = harness(Arc::new(MockProvider::incremental()), Some(registrar), 3);

    let declaration = zone(vec![rec("www", zonesync_core::RecordType::A, "192.0.2.1", 300)])
        .with_nameservers(["ns1.example.com"]);
    let plan = h.engine.plan_zone(&declaration).await.unwrap();

    assert_eq!(plan.corrections.len(), 2);
    assert!(plan.corrections[0].description.starts_with("+ CREATE"));
    assert!(plan.corrections[1].description.starts_with("Change Nameservers"));
}
