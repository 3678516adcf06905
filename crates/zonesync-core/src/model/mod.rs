//! Record model
//!
//! - [`Record`]: one DNS record in canonical form
//! - [`RecordType`]: closed set of supported types, each backed by a [`TypeHandler`]
//! - [`ZoneDeclaration`]: the desired state of one zone

pub mod record;
pub mod rtype;
pub mod zone;

pub use record::{APEX, Record, RecordFields, apply_default_ttl, normalize_label};
pub use rtype::{ParsedTarget, RecordType, TypeHandler, canonical_host};
pub use zone::ZoneDeclaration;
