//! Contract Test: Bundle-Only Backends
//!
//! A backend without incremental CRUD gets at most one correction per zone.
//! It replaces the whole zone and its description lists every change for
//! audit. An empty change set yields no correction at all.

mod common;

use std::sync::Arc;

use common::*;
use zonesync_core::{CorrectionAction, CorrectionStatus, RecordType, RunMode};

fn live() -> Vec<zonesync_core::Record> {
    vec![
        rec("@", RecordType::A, "192.0.2.1", 1800),
        rec("old", RecordType::Cname, "www", 1800),
        rec("www", RecordType::A, "192.0.2.10", 1800),
    ]
}

fn declared() -> Vec<zonesync_core::Record> {
    vec![
        rec("@", RecordType::A, "192.0.2.1", 1800),
        rec("@", RecordType::Url301, "https://www.example.org/", 1800),
        rec("www", RecordType::A, "192.0.2.10", 300),
        rec("mail", RecordType::A, "192.0.2.25", 1800),
    ]
}

#[tokio::test]
async fn non_empty_diff_yields_one_enumerating_correction() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, live()));
    let h = harness(provider, None, 3);

    let plan = h.engine.plan_zone(&zone(declared())).await.unwrap();
    assert_eq!(plan.changes.change_count(), 4);
    assert_eq!(plan.corrections.len(), 1);

    let lines: Vec<&str> = plan.corrections[0].description.lines().collect();
    assert_eq!(
        lines,
        vec![
            "GENERATE_ZONE: example.com (4 records)",
            "+ CREATE @ URL301 https://www.example.org/ ttl=1800",
            "+ CREATE mail A 192.0.2.25 ttl=1800",
            "- DELETE old CNAME www.example.com. ttl=1800",
            "± MODIFY www A: (192.0.2.10 ttl=1800) -> (192.0.2.10 ttl=300)",
        ]
    );
}

#[tokio::test]
async fn push_replaces_the_zone_in_one_call() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, live()));
    let h = harness(provider.clone(), None, 3);

    let report = h.engine.reconcile_zone(&zone(declared()), RunMode::Push).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].status, CorrectionStatus::Applied);
    assert_eq!(provider.apply_calls(), 1);

    let mut stored = provider.records(ORIGIN);
    let mut expected = declared();
    stored.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    expected.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    assert_eq!(stored, expected);
}

#[tokio::test]
async fn empty_diff_yields_nothing() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, declared()));
    let h = harness(provider.clone(), None, 3);

    let plan = h.engine.plan_zone(&zone(declared())).await.unwrap();
    assert!(plan.corrections.is_empty());
}

#[tokio::test]
async fn replacement_carries_the_full_desired_set() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, live()));
    let h = harness(provider, None, 3);

    let plan = h.engine.plan_zone(&zone(declared())).await.unwrap();
    match &plan.corrections[0].action {
        Some(CorrectionAction::ReplaceZone(records)) => {
            assert_eq!(records.len(), declared().len());
            for record in declared() {
                assert!(records.contains(&record), "missing {record}");
            }
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_type_is_rejected_before_fetch() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, live()));
    let h = harness(provider.clone(), None, 3);

    let declaration = zone(vec![rec("_sip._tcp", RecordType::Srv, "10 5 5060 sip", 1800)]);
    let err = h.engine.plan_zone(&declaration).await.unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("The API cannot set SRV records"));
    assert_eq!(provider.fetch_calls(), 0);
}
