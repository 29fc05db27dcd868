pub mod analytics;
pub mod domain;
pub mod error;
pub mod provider;
pub mod registry;
pub mod result;
pub mod types;

pub use analytics::AnalyticsProviderSignature;
pub use error::{AuditError, ErrorInfo, ErrorKind, RegistryError};
pub use provider::ProviderSignature;
pub use registry::ProviderRegistry;
pub use result::*;
pub use types::*;

/// Current UTC time as an RFC3339 string. Empty on formatting failure.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
