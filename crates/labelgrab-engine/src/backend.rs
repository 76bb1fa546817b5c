use crate::protocol::{CookieRecord, ElementRef, NavigationResult, PageSnapshot};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element {id} not found")]
    ElementNotFound { id: u32 },

    #[error("Element {id} is not interactable: {reason}")]
    ElementNotInteractable { id: u32, reason: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Not ready")]
    NotReady,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Navigation(_) => "NAVIGATION_ERROR",
            BackendError::NavigationTimeout { .. } => "NAVIGATION_TIMEOUT",
            BackendError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            BackendError::ElementNotInteractable { .. } => "ELEMENT_NOT_INTERACTABLE",
            BackendError::ScriptError(_) => "SCRIPT_ERROR",
            BackendError::Timeout { .. } => "TIMEOUT",
            BackendError::NotReady => "NOT_READY",
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Serialization(_) => "SERIALIZATION_ERROR",
            BackendError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BackendError::NavigationTimeout { .. } | BackendError::Timeout { .. }
        )
    }
}

/// The single browser page a run drives.
///
/// Implementations own the browser process. The engine borrows the backend
/// mutably for the whole run, so calls never overlap.
#[async_trait]
pub trait Backend: Send {
    /// Launch the browser and open the page.
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the browser and release every resource acquired by `launch`.
    async fn close(&mut self) -> Result<(), BackendError>;

    async fn is_ready(&self) -> bool;

    /// Navigate and wait for the load to settle, bounded by `timeout`.
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, BackendError>;

    async fn current_url(&mut self) -> Result<String, BackendError>;

    /// Capture the interactive-element view of the current DOM.
    async fn snapshot(&mut self) -> Result<PageSnapshot, BackendError>;

    /// Visible text content of the document body.
    async fn page_text(&mut self) -> Result<String, BackendError>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, BackendError>;

    async fn click(&mut self, element: &ElementRef) -> Result<(), BackendError>;

    /// Focus the element and insert `text` as typed input.
    async fn type_text(&mut self, element: &ElementRef, text: &str) -> Result<(), BackendError>;

    async fn press_key(&mut self, element: &ElementRef, key: &str) -> Result<(), BackendError>;

    async fn get_cookies(&mut self) -> Result<Vec<CookieRecord>, BackendError>;

    async fn set_cookies(&mut self, cookies: &[CookieRecord]) -> Result<(), BackendError>;

    /// Clear cookies plus local and session storage for the automation context.
    async fn clear_session_state(&mut self) -> Result<(), BackendError>;

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError>;

    /// Rendered markup of the current document.
    async fn content(&mut self) -> Result<String, BackendError>;

    /// Route browser downloads into `dir`.
    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BackendError>;
}
