//! Core reconciliation engine
//!
//! The ReconcileEngine is responsible for:
//! - Rejecting record types the backend cannot store
//! - Fetching the actual state of each zone (with retry)
//! - Diffing declared against actual state
//! - Planning corrections the backend can execute
//! - Executing them in push mode, or describing them in preview mode
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐
//! │ ZoneDeclaration │     │ DnsProvider  │── fetch ──┐
//! └─────────────────┘     └──────────────┘           │
//!          │                                         ▼
//!          │                               ┌──────────────────┐
//!          └──────────────────────────────▶│ ReconcileEngine  │
//!                                          └──────────────────┘
//!                                                    │
//!         ┌──────────────────────────┬───────────────┴───────────┐
//!         ▼                          ▼                           ▼
//! ┌──────────────┐          ┌─────────────────┐          ┌─────────────┐
//! │ diff + plan  │          │ CorrectionExec. │          │   Events    │
//! │ (pure)       │          │ (retry, apply)  │          │  (notify)   │
//! └──────────────┘          └─────────────────┘          └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Check declared record types against the capability descriptor
//! 2. Fetch the actual records, substitute the backend's default TTL
//! 3. Fill in the backend's default nameservers when no apex NS is declared
//! 4. Diff and plan the zone's corrections
//! 5. Plan the registrar correction when nameservers are declared
//! 6. Preview or execute, emitting events for monitoring/logging

pub mod executor;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::capabilities::ProviderFeatures;
use crate::config::EngineConfig;
use crate::diff::{ChangeSet, DiffOptions, diff};
use crate::error::{Error, Result};
use crate::model::{APEX, Record, RecordType, ZoneDeclaration, apply_default_ttl};
use crate::plan::{Correction, nameserver_corrections, plan_corrections};
use crate::retry::RetryPolicy;
use crate::traits::{DnsProvider, Registrar};

pub use executor::{CorrectionExecutor, CorrectionOutcome, CorrectionStatus};

/// Whether a pass only describes or also applies its corrections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Compute and describe corrections
    #[default]
    Preview,
    /// Compute and execute corrections
    Push,
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preview" => Ok(RunMode::Preview),
            "push" => Ok(RunMode::Push),
            other => Err(Error::config(format!(
                "Unknown mode '{other}' (expected preview or push)"
            ))),
        }
    }
}

/// Events emitted by the ReconcileEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A zone pass started
    PassStarted { zone: String, mode: RunMode },

    /// Corrections were planned for a zone
    CorrectionsComputed {
        zone: String,
        total: usize,
        executable: usize,
    },

    /// A correction was executed successfully
    CorrectionApplied { zone: String, description: String },

    /// A correction failed
    CorrectionFailed {
        zone: String,
        description: String,
        error: String,
    },

    /// A zone pass finished
    PassFinished {
        zone: String,
        applied: usize,
        failed: usize,
    },
}

/// Planned corrections of one zone
#[derive(Debug, Clone)]
pub struct ZonePlan {
    /// Zone origin
    pub zone: String,
    /// Diff of the zone's records
    pub changes: ChangeSet,
    /// Ordered corrections, registrar correction last
    pub corrections: Vec<Correction>,
}

impl ZonePlan {
    /// Number of corrections carrying an action
    pub fn executable_count(&self) -> usize {
        self.corrections.iter().filter(|c| !c.is_report_only()).count()
    }
}

/// Result of one zone pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneReport {
    /// Zone origin
    pub zone: String,
    /// Mode of the pass
    pub mode: RunMode,
    /// Pass start
    pub started_at: DateTime<Utc>,
    /// Pass end
    pub finished_at: DateTime<Utc>,
    /// One entry per correction, in execution order
    pub outcomes: Vec<CorrectionOutcome>,
}

impl ZoneReport {
    /// Number of corrections that carry an action
    pub fn executable_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status != CorrectionStatus::Reported)
            .count()
    }

    /// Number of corrections applied
    pub fn applied_count(&self) -> usize {
        self.count(|s| matches!(s, CorrectionStatus::Applied))
    }

    /// Number of corrections that failed
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, CorrectionStatus::Failed { .. }))
    }

    /// Whether any correction failed
    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    fn count(&self, pred: impl Fn(&CorrectionStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

fn is_apex_ns(record: &Record) -> bool {
    record.is_apex() && record.record_type == RecordType::Ns
}

/// Apex NS records for a backend's default nameservers
///
/// A default already served keeps its live TTL so that it never shows up as
/// a modification.
fn default_apex_ns(
    origin: &str,
    nameservers: &[String],
    actual: &[Record],
    default_ttl: u32,
) -> Result<Vec<Record>> {
    nameservers
        .iter()
        .map(|ns| {
            // Nameserver names are absolute
            let host = format!("{}.", ns.trim().trim_end_matches('.'));
            let record = Record::parse(APEX, RecordType::Ns, &host, default_ttl, origin)?;
            let ttl = actual
                .iter()
                .find(|live| is_apex_ns(live) && live.target == record.target)
                .map_or(default_ttl, |live| live.ttl);
            Ok(record.with_ttl(ttl))
        })
        .collect()
}

/// Per-zone result of [`ReconcileEngine::reconcile_all`]
#[derive(Debug)]
pub struct ZoneResult {
    /// Zone origin
    pub zone: String,
    /// Report, or the error that aborted the zone's pass
    pub result: Result<ZoneReport>,
}

/// Core reconciliation engine
///
/// The engine binds one DNS provider (and optionally one registrar) and
/// reconciles zones against it. It holds no per-zone state between passes:
/// every pass fetches fresh state and discards its plan when done.
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileEngine::new()`]
/// 2. Call [`ReconcileEngine::reconcile_zone()`] or
///    [`ReconcileEngine::reconcile_all()`]
/// 3. Drain the event receiver for monitoring
///
/// ## Threading
///
/// The engine is cheap to clone; clones share the provider, registrar and
/// event channel. Zones are reconciled in parallel only when the provider's
/// descriptor declares concurrency safety.
#[derive(Clone)]
pub struct ReconcileEngine {
    /// DNS provider serving the zones
    provider: Arc<dyn DnsProvider>,

    /// Registrar controlling delegation
    registrar: Option<Arc<dyn Registrar>>,

    /// Retry policy for every backend call
    retry: RetryPolicy,

    /// TTL for declared records without one
    default_ttl: u32,

    /// Bound on parallel zone passes
    max_concurrent_zones: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconcileEngine {
    /// Create a new reconciliation engine
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `registrar`: optional registrar implementation
    /// - `config`: engine settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        registrar: Option<Arc<dyn Registrar>>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            provider,
            registrar,
            retry: RetryPolicy::from_config(config),
            default_ttl: config.default_ttl,
            max_concurrent_zones: config.max_concurrent_zones,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Replace the retry policy (e.g. to inject a test sleeper)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The bound provider's capability descriptor
    pub fn features(&self) -> &ProviderFeatures {
        self.provider.features()
    }

    /// Compute the corrections for one zone without executing them
    ///
    /// # Errors
    ///
    /// - configuration error for record types the backend cannot store
    ///   (raised before any network call)
    /// - [`Error::Fetch`] when the actual state cannot be read
    pub async fn plan_zone(&self, zone: &ZoneDeclaration) -> Result<ZonePlan> {
        let provider = self.provider.as_ref();
        let features = provider.features();

        zone.validate()?;
        features.check_record_types(&zone.records)?;

        let origin = zone.origin.as_str();
        let mut actual = self
            .retry
            .run(
                &format!("fetch {origin}"),
                |e| provider.is_rate_limited(e),
                move || provider.fetch_records(origin),
            )
            .await
            .map_err(|e| Error::fetch(origin, e))?;
        apply_default_ttl(&mut actual, provider.default_ttl());
        debug!("Fetched {} record(s) for {}", actual.len(), origin);

        let mut desired = zone.records.clone();
        apply_default_ttl(&mut desired, self.default_ttl);
        if !desired.iter().any(is_apex_ns) {
            let defaults =
                default_apex_ns(origin, provider.default_nameservers(), &actual, self.default_ttl)?;
            if !defaults.is_empty() {
                debug!("No apex NS declared for {}, using the backend's defaults", origin);
                desired.extend(defaults);
            }
        }

        let is_placeholder = |records: &[Record]| provider.is_placeholder_zone(records);
        let options = DiffOptions {
            provider: provider.provider_name(),
            filter_apex_ns: features.registrar_controls_apex_ns(),
            default_nameservers: provider.default_nameservers(),
            is_placeholder: Some(&is_placeholder),
        };
        let outcome = diff(&desired, &actual, &options);
        let mut corrections = plan_corrections(origin, &outcome, features);

        if let Some(registrar) = &self.registrar {
            if !zone.nameservers.is_empty() {
                let registrar = registrar.as_ref();
                let current = self
                    .retry
                    .run(
                        &format!("fetch nameservers {origin}"),
                        |e| registrar.is_rate_limited(e),
                        move || registrar.fetch_nameservers(origin),
                    )
                    .await
                    .map_err(|e| Error::fetch(origin, e))?;
                corrections.extend(nameserver_corrections(origin, &current, &zone.nameservers));
            }
        }

        Ok(ZonePlan {
            zone: zone.origin.clone(),
            changes: outcome.changes,
            corrections,
        })
    }

    /// Run one reconciliation pass for a zone
    ///
    /// In [`RunMode::Preview`] corrections are only described. In
    /// [`RunMode::Push`] they are executed in order; a failed correction is
    /// recorded in the report and stops the zone's remaining corrections.
    ///
    /// # Errors
    ///
    /// Planning errors (configuration, fetch). Execution failures are part
    /// of the returned report instead.
    pub async fn reconcile_zone(&self, zone: &ZoneDeclaration, mode: RunMode) -> Result<ZoneReport> {
        let started_at = Utc::now();
        let origin = zone.origin.clone();

        self.emit_event(EngineEvent::PassStarted {
            zone: origin.clone(),
            mode,
        });

        let plan = match self.plan_zone(zone).await {
            Ok(plan) => plan,
            Err(e) => {
                error!("Failed to plan {}: {}", origin, e);
                self.emit_event(EngineEvent::PassFinished {
                    zone: origin,
                    applied: 0,
                    failed: 0,
                });
                return Err(e);
            }
        };

        let executable = plan.executable_count();
        info!(
            "{}: {} correction(s), {} executable",
            origin,
            plan.corrections.len(),
            executable
        );
        self.emit_event(EngineEvent::CorrectionsComputed {
            zone: origin.clone(),
            total: plan.corrections.len(),
            executable,
        });

        let outcomes = match mode {
            RunMode::Preview => CorrectionExecutor::preview(&plan.corrections),
            RunMode::Push => {
                let executor = CorrectionExecutor::new(
                    self.provider.clone(),
                    self.registrar.clone(),
                    self.retry.clone(),
                );
                executor
                    .execute_all(&plan.corrections, |outcome| match &outcome.status {
                        CorrectionStatus::Applied => {
                            self.emit_event(EngineEvent::CorrectionApplied {
                                zone: origin.clone(),
                                description: outcome.description.clone(),
                            })
                        }
                        CorrectionStatus::Failed { error } => {
                            self.emit_event(EngineEvent::CorrectionFailed {
                                zone: origin.clone(),
                                description: outcome.description.clone(),
                                error: error.clone(),
                            })
                        }
                        _ => {}
                    })
                    .await
            }
        };

        let report = ZoneReport {
            zone: origin.clone(),
            mode,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        self.emit_event(EngineEvent::PassFinished {
            zone: origin,
            applied: report.applied_count(),
            failed: report.failed_count(),
        });

        Ok(report)
    }

    /// Reconcile several zones
    ///
    /// Zones run in parallel (at most `max_concurrent_zones` at once) only
    /// when the provider declares concurrency safety; otherwise one after
    /// the other. A failing zone never affects the others. Results are in
    /// input order.
    pub async fn reconcile_all(&self, zones: Vec<ZoneDeclaration>, mode: RunMode) -> Vec<ZoneResult> {
        if zones.len() < 2 || !self.features().is_concurrency_safe() {
            let mut results = Vec::with_capacity(zones.len());
            for zone in zones {
                let result = self.reconcile_zone(&zone, mode).await;
                results.push(ZoneResult {
                    zone: zone.origin,
                    result,
                });
            }
            return results;
        }

        debug!(
            "Reconciling {} zones with up to {} workers",
            zones.len(),
            self.max_concurrent_zones
        );

        let names: Vec<String> = zones.iter().map(|z| z.origin.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_zones));
        let mut workers = JoinSet::new();

        for (idx, zone) in zones.into_iter().enumerate() {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (idx, engine.reconcile_zone(&zone, mode).await)
            });
        }

        let mut slots: Vec<Option<Result<ZoneReport>>> = names.iter().map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => error!("Zone worker failed: {}", e),
            }
        }

        names
            .into_iter()
            .zip(slots)
            .map(|(zone, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(Error::Other(format!("Reconciliation of {zone} did not complete")))
                });
                ZoneResult { zone, result }
            })
            .collect()
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
