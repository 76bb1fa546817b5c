use crate::config::LabelgrabConfig;
use crate::diagnostics::DiagnosticsRecorder;
use crate::poller::has_extension;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything one run needs, threaded explicitly through every component.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: LabelgrabConfig,
    pub run_date: NaiveDate,
    pub download_dir: PathBuf,
    pub diagnostics: DiagnosticsRecorder,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(config: LabelgrabConfig, cancel: CancellationToken) -> Self {
        Self::for_date(config, Local::now().date_naive(), cancel)
    }

    pub fn for_date(config: LabelgrabConfig, run_date: NaiveDate, cancel: CancellationToken) -> Self {
        let download_dir = config
            .paths
            .download_root
            .join(run_date.format("%Y-%m-%d").to_string());
        let diagnostics = DiagnosticsRecorder::new(download_dir.join("diagnostics"));
        Self {
            config,
            run_date,
            download_dir,
            diagnostics,
            cancel,
        }
    }

    /// Create the run directories and remove artifacts left by an earlier
    /// run, so a file found later was produced by this one.
    pub async fn prepare(&self) -> std::io::Result<usize> {
        fs::create_dir_all(&self.download_dir).await?;
        let removed =
            remove_stale_artifacts(&self.download_dir, &self.config.workflow.artifact_extension)
                .await?;
        if removed > 0 {
            info!(removed, dir = %self.download_dir.display(), "Removed stale artifacts");
        }
        Ok(removed)
    }
}

pub async fn remove_stale_artifacts(dir: &Path, extension: &str) -> std::io::Result<usize> {
    let mut entries = fs::read_dir(dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if has_extension(&path, extension) && entry.file_type().await?.is_file() {
            fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
