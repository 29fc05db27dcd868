use ccm_core::domain::domain_of_url;
use ccm_core::AuditError;
use serde_json::Value;
use tracing::debug;

use crate::browser::{BrowserError, BrowserSession};
use crate::config::AuditConfig;

/// One browser session plus the network log of its current visit.
///
/// The log is append-only for the lifetime of a visit and cleared by the
/// next [`PageSession::visit`].
pub struct PageSession {
    browser: Box<dyn BrowserSession>,
    log: Vec<Value>,
    page_url: String,
    page_domain: String,
}

impl PageSession {
    pub fn new(browser: Box<dyn BrowserSession>) -> Self {
        Self {
            browser,
            log: Vec::new(),
            page_url: String::new(),
            page_domain: String::new(),
        }
    }

    /// Navigate and wait for the load to complete.
    ///
    /// A navigation error is returned as `NavigationFailure`; a load that
    /// does not complete in time as `Timeout`, after which the session is
    /// still usable.
    pub async fn visit(&mut self, url: &str, config: &AuditConfig) -> Result<(), AuditError> {
        self.browser
            .navigate(url)
            .await
            .map_err(|e| e.into_audit(url))?;
        self.page_url = url.to_string();
        self.page_domain = domain_of_url(url).unwrap_or_default();
        self.log.clear();
        debug!(url, "visited");
        self.wait_for_load(config).await
    }

    pub async fn wait_for_load(&mut self, config: &AuditConfig) -> Result<(), AuditError> {
        self.browser
            .wait_for_load_complete(config.load_timeout())
            .await
            .map_err(|e| e.into_audit("page load"))
    }

    /// Append entries the browser recorded since the last call and return
    /// the whole log of this visit.
    pub async fn network_log(&mut self) -> Result<&[Value], AuditError> {
        let fresh = self
            .browser
            .performance_log()
            .await
            .map_err(|e| AuditError::Capture(format!("performance log: {e}")))?;
        self.log.extend(fresh);
        Ok(&self.log)
    }

    /// URL the browser actually shows; falls back to the visited URL.
    pub async fn landed_url(&mut self) -> String {
        match self.browser.current_url().await {
            Ok(url) if !url.is_empty() => url,
            _ => self.page_url.clone(),
        }
    }

    /// Adopt the landed URL as the page identity (after redirects).
    pub fn set_page_url(&mut self, url: &str) {
        if let Some(domain) = domain_of_url(url) {
            self.page_url = url.to_string();
            self.page_domain = domain;
        }
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn page_domain(&self) -> &str {
        &self.page_domain
    }

    pub fn browser(&mut self) -> &mut dyn BrowserSession {
        self.browser.as_mut()
    }

    /// Tear down the underlying browser.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.browser.quit().await
    }
}
