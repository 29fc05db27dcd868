pub mod browser;
pub mod capture;
pub mod config;
pub mod probe;
pub mod runner;
pub mod session;
pub mod state;

pub use browser::{BrowserError, BrowserFactory, BrowserSession, ElementHandle};
pub use config::AuditConfig;
pub use runner::audit::{audit_id, Conductor};
