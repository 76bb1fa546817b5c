use chromiumoxide::cdp::browser_protocol::network::EventLoadingFailed;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, EventExceptionThrown};
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
use futures::StreamExt;
use labelgrab_engine::config::BrowserConfig;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

type CdpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    user_data_dir: PathBuf,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(config: &BrowserConfig) -> CdpResult<Self> {
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir(config)?;

        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .window_size(config.window_width, config.window_height)
            .viewport(None)
            .user_data_dir(&user_data_dir)
            .arg(format!("--user-agent={}", config.user_agent));

        if config.visible {
            tracing::info!("Launching browser in visible mode");
            builder = builder.with_head();
        } else {
            tracing::info!("Launching browser in headless mode");
        }

        if let Some(chrome_bin) = &config.chrome_bin {
            tracing::info!("Using custom Chrome binary: {}", chrome_bin.display());
            builder = builder.chrome_executable(chrome_bin);
        }

        let launch_config = builder
            .build()
            .map_err(|e| format!("Failed to build browser config: {}", e))?;
        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| format!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::debug!("Browser handler error (ignoring): {}", e);
                }
            }
            tracing::debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to create page: {}", e))?;

        forward_page_events(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            user_data_dir,
            cleanup_user_data_dir,
        })
    }

    /// The handler is joined and the temporary profile removed even when the
    /// browser refuses to close.
    pub async fn close(mut self) -> CdpResult<()> {
        let closed = self.browser.close().await;
        match &closed {
            Ok(_) => {
                if let Err(e) = self.browser.wait().await {
                    tracing::debug!("Browser process did not exit cleanly: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Error closing browser: {}", e);
                self.handler_task.abort();
            }
        }
        if let Err(e) = self.handler_task.await {
            if !e.is_cancelled() {
                tracing::warn!("Error awaiting handler: {}", e);
            }
        }

        if self.cleanup_user_data_dir {
            remove_user_data_dir(&self.user_data_dir);
        }
        closed.map_err(|e| format!("Error closing browser: {}", e))?;
        Ok(())
    }
}

fn remove_user_data_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        tracing::debug!("Failed to clean up user-data-dir {}: {}", dir.display(), e);
    }
}

/// Console output, uncaught exceptions and failed requests go to the log at
/// debug level; JavaScript dialogs are accepted so they never block the page.
async fn forward_page_events(page: &Page) -> CdpResult<()> {
    let mut console_events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;
    tokio::spawn(async move {
        while let Some(event) = console_events.next().await {
            let args: Vec<String> = event
                .args
                .iter()
                .map(|arg| {
                    arg.value
                        .as_ref()
                        .map(|v| v.to_string())
                        .or_else(|| arg.description.clone())
                        .unwrap_or_default()
                })
                .collect();
            tracing::debug!(target: "page", "console [{:?}]: {}", event.r#type, args.join(" "));
        }
    });

    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(|e| format!("Failed to subscribe to exceptions: {}", e))?;
    tokio::spawn(async move {
        while let Some(event) = exceptions.next().await {
            let details = &event.exception_details;
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            tracing::debug!(target: "page", "pageerror: {}", message);
        }
    });

    let mut failed_requests = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(|e| format!("Failed to subscribe to network failures: {}", e))?;
    tokio::spawn(async move {
        while let Some(event) = failed_requests.next().await {
            tracing::debug!(
                target: "page",
                "requestfailed [{:?}]: {}",
                event.r#type,
                event.error_text
            );
        }
    });

    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;
    let dialog_page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = dialogs.next().await {
            tracing::info!("Accepting page dialog: {} ({:?})", event.message, event.r#type);
            if let Err(e) = dialog_page
                .execute(HandleJavaScriptDialogParams::new(true))
                .await
            {
                tracing::warn!("Failed to accept dialog: {}", e);
            }
        }
    });

    Ok(())
}

/// A configured profile directory is kept; otherwise an isolated one is
/// created and removed on close.
fn resolve_user_data_dir(config: &BrowserConfig) -> CdpResult<(PathBuf, bool)> {
    if let Some(dir) = &config.user_data_dir {
        std::fs::create_dir_all(dir)?;
        tracing::info!("Using configured user data dir: {}", dir.display());
        return Ok((dir.clone(), false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("labelgrab-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::debug!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
