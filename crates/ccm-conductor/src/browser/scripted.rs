//! Replay browser driven by a recorded site description.
//!
//! A [`SiteFixture`] lists the landing page's elements plus the cookies,
//! performance-log entries and window globals seen before consent and after
//! each consent choice. Clicking an element marked as a consent control moves
//! the session to that choice's data, the way a real page would after the
//! consent cookie is written. Every launched session gets a new generation;
//! handles from another generation are rejected.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use ccm_core::{ConsentKind, RawCookie};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BrowserError, BrowserFactory, BrowserSession, ElementHandle, ScriptArg, WindowHandle};
use crate::probe::scripts;

// ── Fixture format ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFixture {
    /// Landing page URL.
    pub url: String,
    /// URL the landing page ends up on after navigation.
    #[serde(default)]
    pub redirect_to: Option<String>,
    /// Page source. Generated from `elements` when absent.
    #[serde(default)]
    pub markup: Option<String>,
    #[serde(default)]
    pub elements: Vec<FixtureElement>,
    #[serde(default)]
    pub initial: StageData,
    /// Added on top of `initial` once an accept control is clicked.
    #[serde(default)]
    pub accepted: StageData,
    /// Added on top of `initial` once a reject control is clicked.
    #[serde(default)]
    pub rejected: StageData,
    #[serde(default = "yes")]
    pub scrollable: bool,
    #[serde(default)]
    pub failures: FixtureFailures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureElement {
    pub id: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Id of the enclosing element.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "yes")]
    pub displayed: bool,
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Inside the viewport and not covered by another element.
    #[serde(default)]
    pub clickable: bool,
    /// Banner root: it and its descendants disappear after a consent click.
    #[serde(default)]
    pub banner: bool,
    #[serde(default)]
    pub consent: Option<ConsentKind>,
    /// Where following the link ends up. Defaults to `href`.
    #[serde(default)]
    pub lands_on: Option<String>,
    /// A `_blank` link that is blocked from opening its tab.
    #[serde(default)]
    pub popup_blocked: bool,
    #[serde(default)]
    pub click_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageData {
    #[serde(default)]
    pub cookies: Vec<RawCookie>,
    #[serde(default)]
    pub log: Vec<Value>,
    /// Window globals defined on the page, e.g. `dataLayer`.
    #[serde(default)]
    pub globals: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFailures {
    #[serde(default)]
    pub navigation: bool,
    /// 1-based session numbers whose navigation fails.
    #[serde(default)]
    pub navigation_on_sessions: Vec<u64>,
    /// 1-based session numbers that fail to launch.
    #[serde(default)]
    pub launch_on_sessions: Vec<u64>,
    #[serde(default)]
    pub load_timeout: bool,
    #[serde(default)]
    pub scripts: bool,
    #[serde(default)]
    pub cookies: bool,
}

fn yes() -> bool {
    true
}

fn default_tag() -> String {
    "a".into()
}

impl SiteFixture {
    /// Load a fixture from YAML (or JSON) on disk.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing fixture: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let fixture: SiteFixture = serde_yaml::from_str(content)?;
        if fixture.url.trim().is_empty() {
            anyhow::bail!("fixture has no url");
        }
        Ok(fixture)
    }

    fn landing_url(&self) -> &str {
        self.redirect_to.as_deref().unwrap_or(&self.url)
    }

    fn markup(&self) -> String {
        if let Some(m) = &self.markup {
            return m.clone();
        }
        let mut out = String::from("<html><body>");
        for el in &self.elements {
            out.push_str(&format!(
                "<{tag} id=\"{id}\">{text}</{tag}>",
                tag = el.tag,
                id = el.id,
                text = el.text
            ));
        }
        out.push_str("</body></html>");
        out
    }

    fn stage(&self, consent: Option<ConsentKind>) -> Option<&StageData> {
        match consent {
            Some(ConsentKind::Accept) => Some(&self.accepted),
            Some(ConsentKind::Reject) => Some(&self.rejected),
            None => None,
        }
    }
}

// ── Session ──

#[derive(Debug)]
struct Window {
    handle: WindowHandle,
    history: Vec<String>,
}

pub struct ScriptedBrowser {
    fixture: Arc<SiteFixture>,
    generation: u64,
    windows: Vec<Window>,
    current: Option<WindowHandle>,
    opened: usize,
    consent: Option<ConsentKind>,
    pending_log: Vec<Value>,
    scroll_offset: i64,
    closed: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBrowser {
    fn new(fixture: Arc<SiteFixture>, generation: u64, calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            fixture,
            generation,
            windows: vec![Window {
                handle: "window-0".into(),
                history: vec!["about:blank".into()],
            }],
            current: Some("window-0".into()),
            opened: 0,
            consent: None,
            pending_log: Vec::new(),
            scroll_offset: 0,
            closed: false,
            calls,
        }
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.closed {
            return Err(BrowserError::Session("session closed".into()));
        }
        Ok(())
    }

    fn window_mut(&mut self) -> Result<&mut Window, BrowserError> {
        self.ensure_open()?;
        let handle = self
            .current
            .clone()
            .ok_or_else(|| BrowserError::Session("no current window".into()))?;
        self.windows
            .iter_mut()
            .find(|w| w.handle == handle)
            .ok_or_else(|| BrowserError::Session(format!("window {handle} is closed")))
    }

    fn url(&mut self) -> Result<String, BrowserError> {
        let w = self.window_mut()?;
        Ok(w.history.last().cloned().unwrap_or_default())
    }

    fn on_landing_page(&mut self) -> Result<bool, BrowserError> {
        let url = self.url()?;
        Ok(url == self.fixture.url || url == self.fixture.landing_url())
    }

    fn element(&mut self, el: ElementHandle) -> Result<FixtureElement, BrowserError> {
        self.ensure_open()?;
        if el.generation != self.generation {
            return Err(BrowserError::Session(format!(
                "stale element reference from session {}",
                el.generation
            )));
        }
        if !self.on_landing_page()? {
            return Err(BrowserError::NoSuchElement("element is no longer attached".into()));
        }
        self.fixture
            .elements
            .get(el.id)
            .cloned()
            .ok_or_else(|| BrowserError::NoSuchElement(format!("#{}", el.id)))
    }

    fn ancestors_include(
        &self,
        el: &FixtureElement,
        pred: impl Fn(&FixtureElement) -> bool,
    ) -> bool {
        let mut cursor = Some(el);
        let mut depth = 0;
        while let Some(node) = cursor {
            if pred(node) {
                return true;
            }
            depth += 1;
            if depth > self.fixture.elements.len() {
                break;
            }
            cursor = node
                .parent
                .as_deref()
                .and_then(|p| self.fixture.elements.iter().find(|e| e.id == p));
        }
        false
    }

    fn is_displayed(&self, el: &FixtureElement) -> bool {
        el.displayed && !(self.consent.is_some() && self.ancestors_include(el, |e| e.banner))
    }

    fn globals(&self) -> impl Iterator<Item = &String> {
        self.fixture
            .initial
            .globals
            .iter()
            .chain(self.fixture.stage(self.consent).into_iter().flat_map(|s| s.globals.iter()))
    }

    fn page_log(&self) -> Vec<Value> {
        let mut log = self.fixture.initial.log.clone();
        if let Some(stage) = self.fixture.stage(self.consent) {
            log.extend(stage.log.iter().cloned());
        }
        log
    }
}

#[async_trait::async_trait]
impl BrowserSession for ScriptedBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(format!("navigate#{} {url}", self.generation));
        let failures = &self.fixture.failures;
        if failures.navigation || failures.navigation_on_sessions.contains(&self.generation) {
            return Err(BrowserError::Navigation(format!("net::ERR_CONNECTION_REFUSED at {url}")));
        }
        let landed = if url == self.fixture.url {
            self.fixture.landing_url().to_string()
        } else {
            url.to_string()
        };
        let log = if landed == self.fixture.landing_url() {
            self.page_log()
        } else {
            Vec::new()
        };
        self.window_mut()?.history.push(landed);
        self.pending_log.extend(log);
        self.scroll_offset = 0;
        Ok(())
    }

    async fn wait_for_load_complete(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        if self.fixture.failures.load_timeout {
            return Err(BrowserError::Timeout(timeout.as_millis() as u64));
        }
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        if self.on_landing_page()? {
            Ok(self.fixture.markup())
        } else {
            Ok("<html><body></body></html>".into())
        }
    }

    async fn all_cookies(&mut self) -> Result<Vec<RawCookie>, BrowserError> {
        self.ensure_open()?;
        if self.fixture.failures.cookies {
            return Err(BrowserError::Unsupported("Network.getAllCookies".into()));
        }
        let mut jar: Vec<RawCookie> = Vec::new();
        let extra = self.fixture.stage(self.consent).map(|s| s.cookies.iter());
        for cookie in self.fixture.initial.cookies.iter().chain(extra.into_iter().flatten()) {
            jar.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
            jar.push(cookie.clone());
        }
        Ok(jar)
    }

    async fn performance_log(&mut self) -> Result<Vec<Value>, BrowserError> {
        self.ensure_open()?;
        Ok(std::mem::take(&mut self.pending_log))
    }

    async fn find_element_by_id(
        &mut self,
        id: &str,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        if !self.on_landing_page()? {
            return Ok(None);
        }
        Ok(self
            .fixture
            .elements
            .iter()
            .position(|e| e.id == id)
            .map(|i| ElementHandle {
                generation: self.generation,
                id: i,
            }))
    }

    async fn find_elements_by_tag(
        &mut self,
        tag: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        if !self.on_landing_page()? {
            return Ok(Vec::new());
        }
        Ok(self
            .fixture
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.tag.eq_ignore_ascii_case(tag))
            .map(|(i, _)| ElementHandle {
                generation: self.generation,
                id: i,
            })
            .collect())
    }

    async fn element_displayed(&mut self, el: ElementHandle) -> Result<bool, BrowserError> {
        let e = self.element(el)?;
        Ok(self.is_displayed(&e))
    }

    async fn element_enabled(&mut self, el: ElementHandle) -> Result<bool, BrowserError> {
        Ok(self.element(el)?.enabled)
    }

    async fn element_attribute(
        &mut self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let e = self.element(el)?;
        Ok(match name {
            "href" => e.href,
            "target" => e.target,
            "id" => Some(e.id),
            _ => None,
        })
    }

    async fn element_text(&mut self, el: ElementHandle) -> Result<String, BrowserError> {
        let e = self.element(el)?;
        Ok(if self.is_displayed(&e) { e.text } else { String::new() })
    }

    async fn element_within(
        &mut self,
        el: ElementHandle,
        ancestor: ElementHandle,
    ) -> Result<bool, BrowserError> {
        let e = self.element(el)?;
        let a = self.element(ancestor)?;
        Ok(self.ancestors_include(&e, |node| node.id == a.id))
    }

    async fn click(&mut self, el: ElementHandle) -> Result<(), BrowserError> {
        let e = self.element(el)?;
        self.record(format!("click#{} {}", self.generation, e.id));
        if !self.is_displayed(&e) {
            return Err(BrowserError::Script(format!("element #{} not interactable", e.id)));
        }
        if let Some(msg) = &e.click_error {
            return Err(BrowserError::Script(msg.clone()));
        }
        if let Some(kind) = e.consent {
            self.consent = Some(kind);
            if let Some(stage) = self.fixture.stage(Some(kind)) {
                self.pending_log.extend(stage.log.iter().cloned());
            }
            return Ok(());
        }
        let Some(href) = e.href.clone() else {
            return Ok(());
        };
        let landing = e.lands_on.clone().unwrap_or(href);
        if e.target.as_deref() == Some("_blank") {
            if !e.popup_blocked {
                self.opened += 1;
                self.windows.push(Window {
                    handle: format!("window-{}", self.opened),
                    history: vec![landing],
                });
            }
        } else {
            self.window_mut()?.history.push(landing);
        }
        Ok(())
    }

    async fn execute_script(
        &mut self,
        js: &str,
        args: &[ScriptArg],
    ) -> Result<Value, BrowserError> {
        self.ensure_open()?;
        if self.fixture.failures.scripts {
            return Err(BrowserError::Script("javascript error: script evaluation failed".into()));
        }
        match js {
            scripts::READY_STATE => Ok(Value::from("complete")),
            scripts::SCROLL_OFFSET => Ok(Value::from(self.scroll_offset)),
            scripts::SCROLL_PROBE => {
                if self.fixture.scrollable {
                    self.scroll_offset = 100;
                }
                Ok(Value::Null)
            }
            scripts::HIT_TEST => {
                let Some(ScriptArg::Element(handle)) = args.first() else {
                    return Err(BrowserError::Script("hit test needs an element argument".into()));
                };
                let e = self.element(*handle)?;
                Ok(Value::from(e.clickable && self.is_displayed(&e)))
            }
            _ => {
                let tag_check = scripts::ANALYTICS_GLOBALS.iter().find(|(_, _, s)| *s == js);
                if let Some((_, global, _)) = tag_check {
                    return Ok(Value::from(self.globals().any(|g| g.as_str() == *global)));
                }
                Err(BrowserError::Unsupported("script not recorded in fixture".into()))
            }
        }
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.url()
    }

    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>, BrowserError> {
        self.ensure_open()?;
        Ok(self.windows.iter().map(|w| w.handle.clone()).collect())
    }

    async fn current_window(&mut self) -> Result<WindowHandle, BrowserError> {
        Ok(self.window_mut()?.handle.clone())
    }

    async fn switch_to_window(&mut self, handle: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        if !self.windows.iter().any(|w| w.handle == handle) {
            return Err(BrowserError::Session(format!("no such window: {handle}")));
        }
        self.current = Some(handle.to_string());
        Ok(())
    }

    async fn close_window(&mut self) -> Result<(), BrowserError> {
        let handle = self.window_mut()?.handle.clone();
        self.windows.retain(|w| w.handle != handle);
        self.current = None;
        Ok(())
    }

    async fn back(&mut self) -> Result<(), BrowserError> {
        let w = self.window_mut()?;
        if w.history.len() > 1 {
            w.history.pop();
        }
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(format!("quit#{}", self.generation));
        self.closed = true;
        Ok(())
    }
}

// ── Factory ──

/// Launches [`ScriptedBrowser`] sessions over one shared fixture.
pub struct ScriptedBrowserFactory {
    fixture: Arc<SiteFixture>,
    launches: AtomicU64,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBrowserFactory {
    pub fn new(fixture: SiteFixture) -> Self {
        Self {
            fixture: Arc::new(fixture),
            launches: AtomicU64::new(0),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fixture(&self) -> &SiteFixture {
        &self.fixture
    }

    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Launch, navigate, click and quit calls in order, tagged `#generation`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl BrowserFactory for ScriptedBrowserFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let generation = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("launch#{generation}"));
        }
        if self.fixture.failures.launch_on_sessions.contains(&generation) {
            return Err(BrowserError::Session(format!("session {generation} failed to start")));
        }
        Ok(Box::new(ScriptedBrowser::new(
            self.fixture.clone(),
            generation,
            self.calls.clone(),
        )))
    }
}
