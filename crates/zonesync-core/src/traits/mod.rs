//! Adapter traits
//!
//! This module defines the contracts backend adapters implement.
//!
//! - [`DnsProvider`]: fetch and apply zone records
//! - [`Registrar`]: fetch and set delegated nameservers

pub mod dns_provider;
pub mod registrar;

pub use dns_provider::{DEFAULT_TTL, DnsProvider, DnsProviderFactory, IncrementalChanges};
pub use registrar::{Registrar, RegistrarFactory};
