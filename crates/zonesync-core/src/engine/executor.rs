//! Correction executor
//!
//! Runs corrections strictly in planner order. Every backend call goes
//! through the retry policy. There is no rollback: once a correction fails,
//! the corrections after it in the same zone are not attempted and the ones
//! before it stay applied.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::plan::{Correction, CorrectionAction};
use crate::retry::RetryPolicy;
use crate::traits::{DnsProvider, Registrar};

/// What happened to one correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrectionStatus {
    /// Informational notice, nothing to run
    Reported,
    /// Computed in preview mode, not run
    Previewed,
    /// Ran successfully
    Applied,
    /// Ran and failed
    Failed {
        /// Error message
        error: String,
    },
    /// Skipped because an earlier correction of the zone failed
    NotAttempted,
}

/// A correction's description together with its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    /// The correction's description
    pub description: String,
    /// What happened
    #[serde(flatten)]
    pub status: CorrectionStatus,
}

/// Runs correction actions against the bound backends
#[derive(Clone)]
pub struct CorrectionExecutor {
    provider: Arc<dyn DnsProvider>,
    registrar: Option<Arc<dyn Registrar>>,
    retry: RetryPolicy,
}

impl CorrectionExecutor {
    /// Create an executor
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        registrar: Option<Arc<dyn Registrar>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            registrar,
            retry,
        }
    }

    /// Outcomes for a preview: nothing runs
    pub fn preview(corrections: &[Correction]) -> Vec<CorrectionOutcome> {
        corrections
            .iter()
            .map(|correction| CorrectionOutcome {
                description: correction.description.clone(),
                status: if correction.is_report_only() {
                    CorrectionStatus::Reported
                } else {
                    CorrectionStatus::Previewed
                },
            })
            .collect()
    }

    /// Run every correction in order
    ///
    /// `observe` is called with each outcome as soon as it is known.
    pub async fn execute_all<F>(
        &self,
        corrections: &[Correction],
        mut observe: F,
    ) -> Vec<CorrectionOutcome>
    where
        F: FnMut(&CorrectionOutcome) + Send,
    {
        let mut outcomes = Vec::with_capacity(corrections.len());
        let mut failed = false;

        for correction in corrections {
            let status = if correction.is_report_only() {
                CorrectionStatus::Reported
            } else if failed {
                CorrectionStatus::NotAttempted
            } else {
                match self.execute(correction).await {
                    Ok(()) => {
                        info!("Applied: {}", correction.description);
                        CorrectionStatus::Applied
                    }
                    Err(e) => {
                        error!("{}", e);
                        failed = true;
                        CorrectionStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };

            let outcome = CorrectionOutcome {
                description: correction.description.clone(),
                status,
            };
            observe(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Run a single correction's action
    ///
    /// # Errors
    ///
    /// [`Error::Apply`] wrapping the backend error once retries are exhausted
    /// or a non-retryable error occurs.
    pub async fn execute(&self, correction: &Correction) -> Result<()> {
        let Some(action) = &correction.action else {
            return Ok(());
        };
        let zone = correction.zone.as_str();
        let what = correction.description.lines().next().unwrap_or_default();

        let result = match action {
            CorrectionAction::Incremental(changes) => {
                let provider = self.provider.as_ref();
                self.retry
                    .run(what, |e| provider.is_rate_limited(e), move || {
                        provider.apply_incremental(zone, changes)
                    })
                    .await
            }
            CorrectionAction::ReplaceZone(records) => {
                let provider = self.provider.as_ref();
                self.retry
                    .run(what, |e| provider.is_rate_limited(e), move || {
                        provider.apply_full_replace(zone, records)
                    })
                    .await
            }
            CorrectionAction::SetNameservers(nameservers) => match &self.registrar {
                Some(registrar) => {
                    let registrar = registrar.as_ref();
                    self.retry
                        .run(what, |e| registrar.is_rate_limited(e), move || {
                            registrar.set_nameservers(zone, nameservers)
                        })
                        .await
                }
                None => Err(Error::config(format!(
                    "No registrar configured for {zone}"
                ))),
            },
        };

        result.map_err(|e| Error::apply(what, e))
    }
}
