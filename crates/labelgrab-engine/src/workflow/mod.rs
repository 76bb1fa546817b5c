//! The label download run: a linear sequence of steps with two fallbacks
//! (direct orders URL, early confirmation surface) and an outcome phase.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod step;

pub use context::{RunContext, remove_stale_artifacts};
pub use error::RunError;
pub use orchestrator::{EmptyReason, Orchestrator, RunOutcome, build_orders_url, parse_identifier};
pub use step::{StepStatus, WorkflowStep};

use crate::backend::Backend;
use crate::config::LabelgrabConfig;
use crate::session::{SessionError, SessionManager, SessionStore};
use tracing::{error, info, warn};

/// Run the whole workflow against `backend`. The browser is launched here and
/// closed on every exit path.
pub async fn execute_run<B: Backend + ?Sized>(
    backend: &mut B,
    ctx: &RunContext,
) -> Result<RunOutcome, RunError> {
    let result = run_with_browser(backend, ctx).await;
    release(backend).await;
    result
}

async fn run_with_browser<B: Backend + ?Sized>(
    backend: &mut B,
    ctx: &RunContext,
) -> Result<RunOutcome, RunError> {
    let step = WorkflowStep::Prepare;
    ctx.prepare()
        .await
        .map_err(|source| RunError::Io { step, source })?;
    backend
        .launch()
        .await
        .map_err(|e| RunError::backend(step, e))?;
    if let Err(e) = backend.set_download_dir(&ctx.download_dir).await {
        let err = RunError::backend(step, e);
        error!(%step, code = err.code(), "Run failed: {}", err);
        ctx.diagnostics
            .record(backend, &format!("failed-{}", step))
            .await;
        return Err(err);
    }

    Orchestrator::new(ctx).run(backend).await
}

/// Restore the persisted session and check it, without running the workflow.
pub async fn check_session<B: Backend + ?Sized>(
    backend: &mut B,
    ctx: &RunContext,
) -> Result<bool, RunError> {
    let result = check_with_browser(backend, ctx).await;
    release(backend).await;
    result
}

async fn check_with_browser<B: Backend + ?Sized>(
    backend: &mut B,
    ctx: &RunContext,
) -> Result<bool, RunError> {
    let step = WorkflowStep::EnsureSession;
    let manager = SessionManager::new(&ctx.config, &ctx.cancel);
    let Some(session) = manager
        .restore()
        .await
        .map_err(|e| RunError::session(step, e))?
    else {
        info!(file = %manager.store().path().display(), "No persisted session");
        return Ok(false);
    };

    backend
        .launch()
        .await
        .map_err(|e| RunError::backend(step, e))?;
    let valid = manager
        .is_valid(backend, &session)
        .await
        .map_err(|e| RunError::session(step, e))?;
    info!(valid, "Session checked");
    Ok(valid)
}

/// Forget the persisted session.
pub async fn logout(config: &LabelgrabConfig) -> Result<(), SessionError> {
    let store = SessionStore::new(config.session.file.clone());
    store.delete().await?;
    info!(file = %store.path().display(), "Session removed");
    Ok(())
}

async fn release<B: Backend + ?Sized>(backend: &mut B) {
    if let Err(e) = backend.close().await {
        warn!("Browser did not close cleanly: {}", e);
    }
}
