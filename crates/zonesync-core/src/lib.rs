// # zonesync-core
//
// Core library for reconciling declared DNS zones against live backends.
//
// ## Architecture Overview
//
// This library provides the reconciliation engine:
// - **Record model**: canonical, type-aware records and zone declarations
// - **ProviderFeatures**: static per-backend capability descriptors
// - **diff**: classifies differences between desired and actual records
// - **plan**: turns a diff into corrections the backend can execute
// - **RetryPolicy**: bounded retry of rate-limited backend calls
// - **ReconcileEngine**: fetch → diff → plan → execute, per zone
// - **ProviderRegistry**: plugin-based registry for backend adapters
//
// ## Design Principles
//
// 1. **Pure planning**: diff and plan never touch a backend; only executing
//    a correction mutates remote state
// 2. **Deterministic output**: identical input produces identical previews
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library

pub mod capabilities;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod model;
pub mod plan;
pub mod registry;
pub mod retry;
pub mod traits;

// Re-export core types for convenience
pub use capabilities::{Capability, FeatureSupport, ProviderFeatures, Support};
pub use config::{EngineConfig, ProviderConfig, RecordConfig, ZoneConfig, ZoneSyncConfig};
pub use diff::{ChangeSet, DiffOptions, DiffOutcome, Modification};
pub use engine::{
    CorrectionOutcome, CorrectionStatus, EngineEvent, ReconcileEngine, RunMode, ZonePlan,
    ZoneReport, ZoneResult,
};
pub use error::{Error, Result};
pub use model::{Record, RecordFields, RecordType, ZoneDeclaration};
pub use plan::{Correction, CorrectionAction};
pub use registry::ProviderRegistry;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use traits::{DnsProvider, DnsProviderFactory, IncrementalChanges, Registrar, RegistrarFactory};
