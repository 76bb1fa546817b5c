use crate::backend::{Backend, BackendError};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// A markup + image pair written for postmortem inspection.
#[derive(Debug, Clone)]
pub struct DiagnosticArtifact {
    pub label: String,
    pub markup: PathBuf,
    pub image: Option<PathBuf>,
    pub captured_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsRecorder {
    dir: PathBuf,
}

impl DiagnosticsRecorder {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot pair. The markup file is always written, holding the
    /// capture error if the page could not be read; the image is best effort.
    pub async fn capture<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        label: &str,
    ) -> Result<DiagnosticArtifact, BackendError> {
        fs::create_dir_all(&self.dir).await?;

        let captured_at = Local::now();
        let stem = format!(
            "{}_{}",
            captured_at.format("%Y%m%dT%H%M%S%.3f"),
            sanitize_label(label)
        );

        let markup = match backend.content().await {
            Ok(html) => html,
            Err(e) => format!("<!-- markup unavailable: {} -->\n", e),
        };
        let markup_path = self.dir.join(format!("{}.html", stem));
        fs::write(&markup_path, markup).await?;

        let image = match backend.screenshot().await {
            Ok(bytes) if !bytes.is_empty() => {
                let path = self.dir.join(format!("{}.png", stem));
                fs::write(&path, bytes).await?;
                Some(path)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Screenshot for diagnostic '{}' failed: {}", label, e);
                None
            }
        };

        info!(label, markup = %markup_path.display(), "Diagnostic captured");
        Ok(DiagnosticArtifact {
            label: label.to_string(),
            markup: markup_path,
            image,
            captured_at,
        })
    }

    /// Capture and log any failure instead of returning it.
    pub async fn record<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        label: &str,
    ) -> Option<DiagnosticArtifact> {
        match self.capture(backend, label).await {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Could not write diagnostic '{}': {}", label, e);
                None
            }
        }
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "snapshot".to_string()
    } else {
        trimmed.to_string()
    }
}
