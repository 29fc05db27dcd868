pub mod analyze;
pub mod interpret;
pub mod summary;

pub use analyze::{analyze, ComplianceReport, FlagResult, PhaseCounts, PhaseReport};
pub use interpret::{interpret, Flag, Outlook};
pub use summary::{summarize, AuditSummary};
