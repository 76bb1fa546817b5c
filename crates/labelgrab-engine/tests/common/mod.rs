#![allow(dead_code)]

use async_trait::async_trait;
use labelgrab_engine::backend::{Backend, BackendError};
use labelgrab_engine::config::LabelgrabConfig;
use labelgrab_engine::protocol::{
    ContainerKind, CookieRecord, Element, ElementRef, NavigationResult, PageSnapshot,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BASE_URL: &str = "https://panel.test";
pub const LOGIN_URL: &str = "https://panel.test/panel/v3/new/root/login";
pub const LANDING_URL: &str = "https://panel.test/panel/v3/new/root/home";
pub const ORDERS_URL: &str =
    "https://panel.test/panel/v3/new/fulfillment/abc123/orders/ready-to-ship";

/// What a click or key press does to the fake page.
#[derive(Debug, Clone)]
pub enum Effect {
    Navigate(String),
    /// Add elements to the current page.
    Reveal(Vec<Element>),
    /// Append to the current page's text.
    ShowText(String),
    /// Write a file of this name into the download directory.
    WriteArtifact(String),
    SetCookies(Vec<CookieRecord>),
    Check(u32),
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub elements: Vec<Element>,
    pub text: String,
}

/// Any navigation other than to the login page lands on the login page
/// unless the jar holds this cookie.
#[derive(Debug, Clone)]
pub struct AuthGate {
    pub login_url: String,
    pub cookie: CookieRecord,
}

/// Scripted in-memory browser. Pages are keyed by URL; clicks and key
/// presses replay the effects registered for the element id.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub url: String,
    pub pages: HashMap<String, FakePage>,
    pub click_effects: HashMap<u32, Vec<Effect>>,
    pub key_effects: HashMap<u32, Vec<Effect>>,
    pub gate: Option<AuthGate>,
    /// These URLs load, but the navigation call reports a timeout.
    pub navigation_timeouts: HashSet<String>,
    pub refuse_downloads: bool,
    pub auth_flag: Value,
    pub jar: Vec<CookieRecord>,
    pub download_dir: Option<PathBuf>,

    pub launched: bool,
    pub closed: bool,
    pub navigations: Vec<String>,
    pub clicks: Vec<u32>,
    pub typed: HashMap<u32, String>,
    pub keys: Vec<(u32, String)>,
    pub snapshots: usize,
    pub page_text_reads: usize,
    pub clears: usize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            url: "about:blank".into(),
            ..Default::default()
        }
    }

    pub fn page(mut self, url: &str, elements: Vec<Element>, text: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FakePage {
                elements,
                text: text.to_string(),
            },
        );
        self
    }

    pub fn on_click(mut self, id: u32, effects: Vec<Effect>) -> Self {
        self.click_effects.insert(id, effects);
        self
    }

    pub fn on_key(mut self, id: u32, effects: Vec<Effect>) -> Self {
        self.key_effects.insert(id, effects);
        self
    }

    pub fn gated_by(mut self, cookie: CookieRecord) -> Self {
        self.gate = Some(AuthGate {
            login_url: LOGIN_URL.to_string(),
            cookie,
        });
        self
    }

    pub fn timing_out(mut self, url: &str) -> Self {
        self.navigation_timeouts.insert(url.to_string());
        self
    }

    pub fn at(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn typed_into(&self, id: u32) -> &str {
        self.typed.get(&id).map(String::as_str).unwrap_or("")
    }

    fn resolve(&self, url: &str) -> String {
        if let Some(gate) = &self.gate {
            let allowed = self
                .jar
                .iter()
                .any(|c| c.name == gate.cookie.name && c.value == gate.cookie.value);
            if url != gate.login_url && !allowed {
                return gate.login_url.clone();
            }
        }
        url.to_string()
    }

    fn current_page(&mut self) -> &mut FakePage {
        self.pages.entry(self.url.clone()).or_default()
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), BackendError> {
        for effect in effects {
            match effect {
                Effect::Navigate(url) => self.url = self.resolve(&url),
                Effect::Reveal(elements) => self.current_page().elements.extend(elements),
                Effect::ShowText(text) => {
                    let page = self.current_page();
                    page.text.push('\n');
                    page.text.push_str(&text);
                }
                Effect::WriteArtifact(name) => {
                    let dir = self.download_dir.clone().ok_or(BackendError::NotReady)?;
                    std::fs::write(dir.join(name), b"%PDF-1.4 fake")?;
                }
                Effect::SetCookies(cookies) => self.merge_cookies(&cookies),
                Effect::Check(id) => {
                    if let Some(el) = self.current_page().elements.iter_mut().find(|e| e.id == id) {
                        el.checked = Some(true);
                    }
                }
            }
        }
        Ok(())
    }

    fn merge_cookies(&mut self, cookies: &[CookieRecord]) {
        for cookie in cookies {
            self.jar.retain(|c| c.name != cookie.name);
            self.jar.push(cookie.clone());
        }
    }

    fn element(&self, id: u32) -> Result<(), BackendError> {
        let found = self
            .pages
            .get(&self.url)
            .is_some_and(|p| p.elements.iter().any(|e| e.id == id));
        if found {
            Ok(())
        } else {
            Err(BackendError::ElementNotFound { id })
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.launched = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closed = true;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launched && !self.closed
    }

    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, BackendError> {
        self.navigations.push(url.to_string());
        self.url = self.resolve(url);
        if self.navigation_timeouts.contains(url) {
            return Err(BackendError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            });
        }
        Ok(NavigationResult {
            url: self.url.clone(),
            title: String::new(),
        })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        Ok(self.url.clone())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, BackendError> {
        self.snapshots += 1;
        let elements = self
            .pages
            .get(&self.url)
            .map(|p| p.elements.clone())
            .unwrap_or_default();
        Ok(PageSnapshot {
            url: self.url.clone(),
            title: String::new(),
            elements,
        })
    }

    async fn page_text(&mut self) -> Result<String, BackendError> {
        self.page_text_reads += 1;
        Ok(self
            .pages
            .get(&self.url)
            .map(|p| p.text.clone())
            .unwrap_or_default())
    }

    async fn evaluate(&mut self, _expression: &str) -> Result<Value, BackendError> {
        Ok(self.auth_flag.clone())
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), BackendError> {
        self.element(element.id)?;
        self.clicks.push(element.id);
        let effects = self.click_effects.get(&element.id).cloned().unwrap_or_default();
        self.apply(effects)
    }

    async fn type_text(&mut self, element: &ElementRef, text: &str) -> Result<(), BackendError> {
        self.element(element.id)?;
        self.typed.entry(element.id).or_default().push_str(text);
        Ok(())
    }

    async fn press_key(&mut self, element: &ElementRef, key: &str) -> Result<(), BackendError> {
        self.element(element.id)?;
        self.keys.push((element.id, key.to_string()));
        let effects = self.key_effects.get(&element.id).cloned().unwrap_or_default();
        self.apply(effects)
    }

    async fn get_cookies(&mut self) -> Result<Vec<CookieRecord>, BackendError> {
        Ok(self.jar.clone())
    }

    async fn set_cookies(&mut self, cookies: &[CookieRecord]) -> Result<(), BackendError> {
        self.merge_cookies(cookies);
        Ok(())
    }

    async fn clear_session_state(&mut self) -> Result<(), BackendError> {
        self.clears += 1;
        self.jar.clear();
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn content(&mut self) -> Result<String, BackendError> {
        Ok(format!("<html><!-- {} --></html>", self.url))
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BackendError> {
        if self.refuse_downloads {
            return Err(BackendError::Other("download behavior rejected".into()));
        }
        self.download_dir = Some(dir.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Element builders
// ---------------------------------------------------------------------------

pub fn button(id: u32, text: &str) -> Element {
    Element {
        id,
        tag: "button".into(),
        text: text.into(),
        ..Default::default()
    }
}

pub fn link(id: u32, text: &str) -> Element {
    Element {
        id,
        tag: "a".into(),
        text: text.into(),
        ..Default::default()
    }
}

pub fn tab(id: u32, text: &str) -> Element {
    Element {
        id,
        tag: "div".into(),
        role: Some("tab".into()),
        text: text.into(),
        ..Default::default()
    }
}

pub fn input(id: u32, input_type: &str) -> Element {
    Element {
        id,
        tag: "input".into(),
        input_type: Some(input_type.into()),
        ..Default::default()
    }
}

pub fn select_all_checkbox(id: u32) -> Element {
    Element {
        id,
        tag: "input".into(),
        input_type: Some("checkbox".into()),
        aria_label: Some("Select all".into()),
        containers: vec![ContainerKind::TableHeader],
        checked: Some(false),
        ..Default::default()
    }
}

pub fn with_classes(mut el: Element, classes: &[&str]) -> Element {
    el.classes = classes.iter().map(|c| c.to_string()).collect();
    el
}

pub fn inside(mut el: Element, container: ContainerKind) -> Element {
    el.containers.push(container);
    el
}

pub fn cookie(name: &str, value: &str) -> CookieRecord {
    CookieRecord {
        name: name.into(),
        value: value.into(),
        domain: "panel.test".into(),
        path: "/".into(),
        expires: None,
        http_only: true,
        secure: true,
        same_site: Some("Lax".into()),
    }
}

/// Config with short waits and no humanized delays, rooted in `root`.
pub fn test_config(root: &Path) -> LabelgrabConfig {
    let mut config = LabelgrabConfig::default();
    config.site.base_url = BASE_URL.into();
    config.session.file = root.join("session.json");
    config.session.validity_wait_ms = 300;
    config.session.login_field_wait_ms = 300;
    config.session.post_login_wait_ms = 300;
    config.paths.download_root = root.join("downloads");
    config.workflow.element_wait_ms = 300;
    config.workflow.settle_ms = 0;
    config.workflow.poll_interval_ms = 100;
    config.workflow.generation_timeout_ms = 1_000;
    config.workflow.artifact_timeout_ms = 500;
    config.workflow.typing_delay_min_ms = 0;
    config.workflow.typing_delay_max_ms = 0;
    config.credentials.email = Some("ops@example.com".into());
    config.credentials.password = Some("hunter2".into());
    config
}
