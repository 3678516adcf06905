//! Contract Test: Placeholder Zones
//!
//! Some backends park empty zones with a fixed pair of records. When nothing
//! is declared and the live zone is exactly that pattern, the zone counts as
//! empty: zero corrections, not "delete 2". The pattern is recognised by the
//! backend's own predicate.

mod common;

use std::sync::Arc;

use common::*;
use zonesync_core::{CorrectionAction, RecordType, RunMode};

#[tokio::test]
async fn parked_zone_with_empty_declaration_is_clean() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, parking_records()));
    let h = harness(provider.clone(), None, 3);

    let plan = h.engine.plan_zone(&zone(Vec::new())).await.unwrap();
    assert!(plan.changes.is_empty());
    assert!(plan.corrections.is_empty());

    h.engine.reconcile_zone(&zone(Vec::new()), RunMode::Push).await.unwrap();
    assert_eq!(provider.apply_calls(), 0);
    assert_eq!(provider.records(ORIGIN), parking_records());
}

#[tokio::test]
async fn declared_records_replace_the_placeholder() {
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, parking_records()));
    let h = harness(provider, None, 3);

    let declaration = zone(vec![rec("www", RecordType::A, "192.0.2.1", 1800)]);
    let plan = h.engine.plan_zone(&declaration).await.unwrap();

    assert_eq!(plan.changes.to_create.len(), 1);
    assert_eq!(plan.changes.to_delete.len(), 2);
    assert_eq!(plan.corrections.len(), 1);
    assert!(matches!(
        &plan.corrections[0].action,
        Some(CorrectionAction::ReplaceZone(records)) if records.len() == 1
    ));
}

#[tokio::test]
async fn near_miss_is_not_a_placeholder() {
    let mut live = parking_records();
    live.push(rec("mail", RecordType::A, "192.0.2.5", 1800));
    let provider = Arc::new(MockProvider::bundle().with_zone(ORIGIN, live));
    let h = harness(provider, None, 3);

    let plan = h.engine.plan_zone(&zone(Vec::new())).await.unwrap();
    assert_eq!(plan.changes.to_delete.len(), 3);
}

#[tokio::test]
async fn backends_without_parking_delete_lookalikes() {
    let provider = Arc::new(MockProvider::incremental().with_zone(
        ORIGIN,
        vec![
            rec("www", RecordType::Cname, "parkingpage.registrar-servers.com.", 300),
            rec("@", RecordType::A, "192.0.2.1", 300),
        ],
    ));
    let h = harness(provider, None, 3);

    let plan = h.engine.plan_zone(&zone(Vec::new())).await.unwrap();
    assert_eq!(plan.changes.to_delete.len(), 2);
}
