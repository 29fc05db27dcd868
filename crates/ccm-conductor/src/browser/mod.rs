//! The browser capability the conductor drives.
//!
//! A session is a single-threaded resource: every method takes `&mut self`,
//! so at most one command is in flight. Element handles are only valid in
//! the session (generation) that produced them.

pub mod scripted;

use std::time::Duration;

use ccm_core::{AuditError, RawCookie};
use serde_json::Value;

/// Reference to a live DOM element in one browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub generation: u64,
    pub id: usize,
}

/// Argument passed to `execute_script` (`arguments[i]` on the page).
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Element(ElementHandle),
    Value(Value),
}

pub type WindowHandle = String;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrowserError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("timed out after {0}ms")]
    Timeout(u64),
    #[error("session error: {0}")]
    Session(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl BrowserError {
    /// Map into the audit taxonomy. `subject` names what was being done.
    pub fn into_audit(self, subject: &str) -> AuditError {
        match self {
            BrowserError::Navigation(reason) => AuditError::NavigationFailure {
                url: subject.to_string(),
                reason,
            },
            BrowserError::NoSuchElement(id) => AuditError::ElementNotFound(id),
            BrowserError::Script(msg) | BrowserError::Unsupported(msg) => {
                AuditError::ScriptExecutionFailure(format!("{subject}: {msg}"))
            }
            BrowserError::Timeout(after_ms) => AuditError::Timeout {
                what: subject.to_string(),
                after_ms,
            },
            BrowserError::Session(msg) => {
                AuditError::SessionResetFailure(format!("{subject}: {msg}"))
            }
        }
    }
}

#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;
    async fn wait_for_load_complete(&mut self, timeout: Duration) -> Result<(), BrowserError>;
    async fn page_source(&mut self) -> Result<String, BrowserError>;
    async fn all_cookies(&mut self) -> Result<Vec<RawCookie>, BrowserError>;
    /// Performance-log entries recorded since the previous call.
    async fn performance_log(&mut self) -> Result<Vec<Value>, BrowserError>;

    async fn find_element_by_id(&mut self, id: &str) -> Result<Option<ElementHandle>, BrowserError>;
    async fn find_elements_by_tag(&mut self, tag: &str) -> Result<Vec<ElementHandle>, BrowserError>;
    async fn element_displayed(&mut self, el: ElementHandle) -> Result<bool, BrowserError>;
    async fn element_enabled(&mut self, el: ElementHandle) -> Result<bool, BrowserError>;
    async fn element_attribute(
        &mut self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;
    async fn element_text(&mut self, el: ElementHandle) -> Result<String, BrowserError>;
    /// `el` is `ancestor` or one of its descendants.
    async fn element_within(
        &mut self,
        el: ElementHandle,
        ancestor: ElementHandle,
    ) -> Result<bool, BrowserError>;
    async fn click(&mut self, el: ElementHandle) -> Result<(), BrowserError>;
    async fn execute_script(&mut self, js: &str, args: &[ScriptArg]) -> Result<Value, BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;
    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>, BrowserError>;
    async fn current_window(&mut self) -> Result<WindowHandle, BrowserError>;
    async fn switch_to_window(&mut self, handle: &str) -> Result<(), BrowserError>;
    async fn close_window(&mut self) -> Result<(), BrowserError>;
    async fn back(&mut self) -> Result<(), BrowserError>;
    async fn quit(&mut self) -> Result<(), BrowserError>;
}

/// Creates fresh, isolated browser sessions.
#[async_trait::async_trait]
pub trait BrowserFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
