//! Test doubles and common utilities for contract tests
//!
//! This module provides in-memory backends that behave like the real ones
//! as far as the engine can observe: they store records, count calls and
//! can be told to fail or to rate-limit.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use zonesync_core::capabilities::{Capability, FeatureSupport, ProviderFeatures};
use zonesync_core::error::{Error, Result};
use zonesync_core::retry::{RetryPolicy, Sleeper};
use zonesync_core::traits::{DnsProvider, IncrementalChanges, Registrar};
use zonesync_core::{EngineConfig, EngineEvent, ReconcileEngine, Record, RecordType, ZoneDeclaration};

pub const ORIGIN: &str = "example.com";

/// Build a canonical record in `example.com`
pub fn rec(name: &str, rtype: RecordType, content: &str, ttl: u32) -> Record {
    Record::parse(name, rtype, content, ttl, ORIGIN).unwrap()
}

/// Build a declaration for `example.com`
pub fn zone(records: Vec<Record>) -> ZoneDeclaration {
    let mut zone = ZoneDeclaration::new(ORIGIN);
    zone.records = records;
    zone
}

/// The two records a parking backend injects into an empty zone
pub fn parking_records() -> Vec<Record> {
    vec![
        rec("www", RecordType::Cname, "parkingpage.registrar-servers.com.", 1800),
        rec("@", RecordType::Url, "http://www.example.com/?from=@", 1800),
    ]
}

/// An in-memory DNS backend
pub struct MockProvider {
    name: &'static str,
    features: ProviderFeatures,
    default_ns: Vec<String>,
    parks_empty_zones: bool,
    fetch_delay: Option<Duration>,
    zones: Mutex<HashMap<String, Vec<Record>>>,
    fetch_calls: AtomicUsize,
    apply_calls: AtomicUsize,
    rate_limits_remaining: AtomicUsize,
    fail_apply_at: Mutex<Option<usize>>,
    fail_fetch_for: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    fn with_features(name: &'static str, features: ProviderFeatures) -> Self {
        Self {
            name,
            features,
            default_ns: Vec::new(),
            parks_empty_zones: false,
            fetch_delay: None,
            zones: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
            rate_limits_remaining: AtomicUsize::new(0),
            fail_apply_at: Mutex::new(None),
            fail_fetch_for: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Backend with per-record create/delete/modify
    pub fn incremental() -> Self {
        Self::with_features(
            "incremental",
            ProviderFeatures::builder("incremental")
                .incremental(true)
                .record_type(RecordType::Caa, FeatureSupport::can())
                .record_type(RecordType::Srv, FeatureSupport::can())
                .with(Capability::Concurrency, FeatureSupport::unimplemented())
                .build(),
        )
    }

    /// Registrar-hosted backend: full-zone replace only, apex NS owned by
    /// the registrar, parks empty zones
    pub fn bundle() -> Self {
        let mut provider = Self::with_features(
            "bundle",
            ProviderFeatures::builder("bundle")
                .registrar_controls_apex_ns(true)
                .record_type(RecordType::Url, FeatureSupport::can())
                .record_type(RecordType::Url301, FeatureSupport::can())
                .record_type(RecordType::Caa, FeatureSupport::can())
                .record_type(
                    RecordType::Srv,
                    FeatureSupport::cannot().with_caveat("The API cannot set SRV records"),
                )
                .build(),
        );
        provider.default_ns = vec![
            "dns1.registrar-servers.com".to_string(),
            "dns2.registrar-servers.com".to_string(),
        ];
        provider.parks_empty_zones = true;
        provider
    }

    /// Incremental backend that declares (or not) concurrency safety
    pub fn concurrent(safe: bool) -> Self {
        let support = if safe {
            FeatureSupport::can()
        } else {
            FeatureSupport::cannot()
        };
        let mut provider = Self::with_features(
            "concurrent",
            ProviderFeatures::builder("concurrent")
                .incremental(true)
                .with(Capability::Concurrency, support)
                .build(),
        );
        provider.fetch_delay = Some(Duration::from_millis(20));
        provider
    }

    /// Seed the live content of a zone
    pub fn with_zone(self, origin: &str, records: Vec<Record>) -> Self {
        self.zones
            .lock()
            .unwrap()
            .insert(origin.to_string(), records);
        self
    }

    /// The next `n` backend calls fail with the rate-limit signal
    pub fn rate_limit_next(&self, n: usize) {
        self.rate_limits_remaining.store(n, Ordering::SeqCst);
    }

    /// The `n`th apply call (1-based) fails with a hard error
    pub fn fail_apply_at(&self, n: usize) {
        *self.fail_apply_at.lock().unwrap() = Some(n);
    }

    /// Fetching `origin` fails with a hard error
    pub fn fail_fetch_for(&self, origin: &str) {
        *self.fail_fetch_for.lock().unwrap() = Some(origin.to_string());
    }

    /// Current live records of a zone
    pub fn records(&self, origin: &str) -> Vec<Record> {
        self.zones
            .lock()
            .unwrap()
            .get(origin)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping fetches observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_rate_limit(&self) -> bool {
        self.rate_limits_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn begin_apply(&self) -> Result<()> {
        if self.take_rate_limit() {
            return Err(Error::rate_limited("429 Too Many Requests"));
        }
        let n = self.apply_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_apply_at.lock().unwrap() == Some(n) {
            return Err(Error::provider(self.name, "backend rejected the change"));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    async fn fetch_records(&self, zone: &str) -> Result<Vec<Record>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_rate_limit() {
            return Err(Error::rate_limited("429 Too Many Requests"));
        }
        if self.fail_fetch_for.lock().unwrap().as_deref() == Some(zone) {
            return Err(Error::not_found(format!("zone {zone}")));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(self.records(zone))
    }

    async fn apply_incremental(&self, zone: &str, changes: &IncrementalChanges) -> Result<()> {
        if !self.features.supports_incremental() {
            return Err(Error::unsupported("bundle backend"));
        }
        self.begin_apply()?;

        let mut zones = self.zones.lock().unwrap();
        let records = zones.entry(zone.to_string()).or_default();
        records.retain(|r| !changes.deletes.contains(r));
        for modification in &changes.modifies {
            records.retain(|r| r != &modification.from);
            records.push(modification.to.clone());
        }
        records.extend(changes.creates.iter().cloned());
        Ok(())
    }

    async fn apply_full_replace(&self, zone: &str, records: &[Record]) -> Result<()> {
        self.begin_apply()?;
        self.zones
            .lock()
            .unwrap()
            .insert(zone.to_string(), records.to_vec());
        Ok(())
    }

    fn features(&self) -> &ProviderFeatures {
        &self.features
    }

    fn default_ttl(&self) -> u32 {
        1800
    }

    fn default_nameservers(&self) -> &[String] {
        &self.default_ns
    }

    fn is_placeholder_zone(&self, actual: &[Record]) -> bool {
        self.parks_empty_zones
            && actual.len() == 2
            && actual
                .iter()
                .any(|r| r.record_type == RecordType::Cname && r.target.contains("parkingpage"))
            && actual.iter().any(|r| r.record_type == RecordType::Url)
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// An in-memory registrar
pub struct MockRegistrar {
    nameservers: Mutex<Vec<String>>,
    set_calls: AtomicUsize,
}

impl MockRegistrar {
    pub fn new(nameservers: &[&str]) -> Self {
        Self {
            nameservers: Mutex::new(nameservers.iter().map(|s| s.to_string()).collect()),
            set_calls: AtomicUsize::new(0),
        }
    }

    pub fn nameservers(&self) -> Vec<String> {
        self.nameservers.lock().unwrap().clone()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrar for MockRegistrar {
    async fn fetch_nameservers(&self, _domain: &str) -> Result<Vec<String>> {
        Ok(self.nameservers())
    }

    async fn set_nameservers(&self, _domain: &str, nameservers: &[String]) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        *self.nameservers.lock().unwrap() = nameservers.to_vec();
        Ok(())
    }

    fn registrar_name(&self) -> &'static str {
        "mock-registrar"
    }
}

/// A sleeper that only counts waits
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: AtomicUsize,
    total: Mutex<Duration>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> Duration {
        *self.total.lock().unwrap()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        *self.total.lock().unwrap() += duration;
    }
}

/// Engine harness around the test doubles
pub struct Harness {
    pub engine: ReconcileEngine,
    pub events: mpsc::Receiver<EngineEvent>,
    pub sleeper: Arc<RecordingSleeper>,
}

impl Harness {
    /// Drain all events emitted so far
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Build an engine over `provider` with a recording sleeper
pub fn harness(
    provider: Arc<MockProvider>,
    registrar: Option<Arc<MockRegistrar>>,
    max_attempts: u32,
) -> Harness {
    let config = EngineConfig {
        max_attempts,
        ..EngineConfig::default()
    };
    let sleeper = Arc::new(RecordingSleeper::default());
    let retry = RetryPolicy::from_config(&config).with_sleeper(sleeper.clone());

    let provider: Arc<dyn DnsProvider> = provider;
    let registrar: Option<Arc<dyn Registrar>> = registrar.map(|r| r as Arc<dyn Registrar>);
    let (engine, events) = ReconcileEngine::new(provider, registrar, &config).unwrap();

    Harness {
        engine: engine.with_retry_policy(retry),
        events,
        sleeper,
    }
}
