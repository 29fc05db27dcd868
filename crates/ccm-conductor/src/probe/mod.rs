//! Page probes run by the conductor against a live session.

pub mod accessibility;
pub mod banner;
pub mod consent;
pub mod interactions;
pub mod links;
pub mod scripts;

pub use banner::{detect_banner, DetectedProvider};
