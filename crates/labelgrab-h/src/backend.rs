use crate::cdp::CdpClient;
use crate::inject::{self, selector_for};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, Cookie, CookieParam, CookieSameSite, SetCookiesParams,
    TimeSinceEpoch,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use labelgrab_engine::backend::{Backend, BackendError};
use labelgrab_engine::config::BrowserConfig;
use labelgrab_engine::protocol::{CookieRecord, ElementRef, NavigationResult, PageSnapshot};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Chromium driven over the DevTools protocol, headless unless configured
/// visible.
pub struct HeadlessBackend {
    client: Option<CdpClient>,
    config: BrowserConfig,
    download_dir: Option<PathBuf>,
}

impl HeadlessBackend {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            client: None,
            config,
            download_dir: None,
        }
    }

    fn client(&self) -> Result<&CdpClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }

    async fn find(&self, target: &ElementRef) -> Result<Element, BackendError> {
        self.client()?
            .page
            .find_element(selector_for(target.id))
            .await
            .map_err(|_| BackendError::ElementNotFound { id: target.id })
    }

    async fn apply_download_dir(&self) -> Result<(), BackendError> {
        let (Some(client), Some(dir)) = (self.client.as_ref(), self.download_dir.as_ref()) else {
            return Ok(());
        };
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().into_owned())
            .build()
            .map_err(BackendError::Other)?;
        client
            .browser
            .execute(params)
            .await
            .map_err(|e| BackendError::Other(format!("Set download behavior failed: {}", e)))?;
        info!(dir = %dir.display(), "Downloads routed");
        Ok(())
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(BrowserConfig::default())
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Launching Chromium backend...");
        let client = CdpClient::launch(&self.config)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        self.client = Some(client);
        self.apply_download_dir().await
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
            info!("Browser closed");
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, BackendError> {
        let page = &self.client()?.page;
        info!("Navigating to: {}", url);

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Err(_) => {
                return Err(BackendError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                });
            }
            Ok(Err(e)) => return Err(BackendError::Navigation(e.to_string())),
            Ok(Ok(_)) => {}
        }

        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        let page = &self.client()?.page;
        Ok(page
            .url()
            .await
            .map_err(|e| BackendError::Other(format!("Read url failed: {}", e)))?
            .unwrap_or_default())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, BackendError> {
        inject::snapshot(&self.client()?.page).await
    }

    async fn page_text(&mut self) -> Result<String, BackendError> {
        let value = inject::evaluate(
            &self.client()?.page,
            "document.body ? document.body.innerText : ''",
        )
        .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value, BackendError> {
        inject::evaluate(&self.client()?.page, expression).await
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), BackendError> {
        debug!(id = element.id, label = %element.label, "Click");
        self.find(element)
            .await?
            .click()
            .await
            .map_err(|e| BackendError::ElementNotInteractable {
                id: element.id,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementRef, text: &str) -> Result<(), BackendError> {
        let target = self.find(element).await?;
        let not_interactable = |e: chromiumoxide::error::CdpError| {
            BackendError::ElementNotInteractable {
                id: element.id,
                reason: e.to_string(),
            }
        };
        target.focus().await.map_err(not_interactable)?;
        target.type_str(text).await.map_err(not_interactable)?;
        Ok(())
    }

    async fn press_key(&mut self, element: &ElementRef, key: &str) -> Result<(), BackendError> {
        let target = self.find(element).await?;
        target
            .press_key(key)
            .await
            .map_err(|e| BackendError::ElementNotInteractable {
                id: element.id,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn get_cookies(&mut self) -> Result<Vec<CookieRecord>, BackendError> {
        let cookies = self
            .client()?
            .page
            .get_cookies()
            .await
            .map_err(|e| BackendError::Other(format!("Get cookies failed: {}", e)))?;
        Ok(cookies.into_iter().map(to_record).collect())
    }

    async fn set_cookies(&mut self, cookies: &[CookieRecord]) -> Result<(), BackendError> {
        let params = cookies
            .iter()
            .map(to_param)
            .collect::<Result<Vec<_>, _>>()?;
        self.client()?
            .page
            .execute(SetCookiesParams::new(params))
            .await
            .map_err(|e| BackendError::Other(format!("Set cookies failed: {}", e)))?;
        Ok(())
    }

    async fn clear_session_state(&mut self) -> Result<(), BackendError> {
        let page = &self.client()?.page;
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| BackendError::Other(format!("Clear cookies failed: {}", e)))?;
        inject::evaluate(
            page,
            "(() => { try { localStorage.clear(); sessionStorage.clear(); } catch (e) {} return true; })()",
        )
        .await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        self.client()?
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))
    }

    async fn content(&mut self) -> Result<String, BackendError> {
        self.client()?
            .page
            .content()
            .await
            .map_err(|e| BackendError::Other(format!("Read content failed: {}", e)))
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BackendError> {
        let absolute = match tokio::fs::canonicalize(dir).await {
            Ok(path) => path,
            Err(_) => std::env::current_dir()?.join(dir),
        };
        self.download_dir = Some(absolute);
        self.apply_download_dir().await
    }
}

fn to_record(cookie: Cookie) -> CookieRecord {
    CookieRecord {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: if cookie.session {
            None
        } else {
            Some(cookie.expires)
        },
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site.map(|s| format!("{:?}", s)),
    }
}

fn to_param(record: &CookieRecord) -> Result<CookieParam, BackendError> {
    let mut builder = CookieParam::builder()
        .name(record.name.clone())
        .value(record.value.clone())
        .domain(record.domain.clone())
        .path(record.path.clone())
        .http_only(record.http_only)
        .secure(record.secure);
    if let Some(expires) = record.expires.filter(|e| *e > 0.0) {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    if let Some(same_site) = record.same_site.as_deref().and_then(parse_same_site) {
        builder = builder.same_site(same_site);
    }
    builder
        .build()
        .map_err(|e| BackendError::Other(format!("Invalid cookie '{}': {}", record.name, e)))
}

fn parse_same_site(value: &str) -> Option<CookieSameSite> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Some(CookieSameSite::Strict),
        "lax" => Some(CookieSameSite::Lax),
        "none" => Some(CookieSameSite::None),
        _ => None,
    }
}
