use super::context::RunContext;
use super::error::RunError;
use super::step::{StepStatus, WorkflowStep};
use crate::backend::Backend;
use crate::locator::{Locator, LocatorChain, chains};
use crate::poller::{CompletionPoller, Outcome, OutcomeSignal, PollPolicy, Polled};
use crate::protocol::ElementRef;
use crate::session::SessionManager;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Downloaded(PathBuf),
    NothingToDo(EmptyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The application reported a temporary generation issue.
    TransientServerFailure,
    GenerationTimeout,
    ArtifactTimeout,
}

impl EmptyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyReason::TransientServerFailure => "transient_server_failure",
            EmptyReason::GenerationTimeout => "generation_timeout",
            EmptyReason::ArtifactTimeout => "artifact_timeout",
        }
    }
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one run through the lead-in steps and into the outcome phase.
/// Only this type decides whether a failure is hard or soft.
pub struct Orchestrator<'a> {
    ctx: &'a RunContext,
    session: SessionManager,
    locator: Locator,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        let workflow = &ctx.config.workflow;
        Self {
            ctx,
            session: SessionManager::new(&ctx.config, &ctx.cancel),
            locator: Locator::new(workflow.poll_interval(), &ctx.cancel),
        }
    }

    pub async fn run<B: Backend + ?Sized>(&mut self, backend: &mut B) -> Result<RunOutcome, RunError> {
        info!(
            date = %self.ctx.run_date,
            download_dir = %self.ctx.download_dir.display(),
            "Run started"
        );

        let mut surface = None;
        for step in WorkflowStep::LEAD_IN {
            if self.ctx.cancel.is_cancelled() {
                return Err(RunError::Cancelled { step });
            }

            info!(%step, "Step started");
            let status = match self.execute(step, backend).await {
                Ok(status) => status,
                Err(err) => return Err(self.fail(backend, err).await),
            };

            match status {
                StepStatus::Completed => info!(%step, "Step completed"),
                StepStatus::SoftFailure(reason) => {
                    warn!(%step, %reason, "Step failed, continuing");
                    self.ctx
                        .diagnostics
                        .record(backend, &format!("{}-soft", step))
                        .await;
                }
            }

            if !step.checks_for_surface() {
                continue;
            }
            if let Some(control) = self.surface_detected(backend).await {
                info!(
                    after = %step,
                    control = %control.label,
                    "Confirmation surface already showing, awaiting outcome"
                );
                self.ctx
                    .diagnostics
                    .record(backend, &format!("surface-after-{}", step))
                    .await;
                surface = Some(control);
                break;
            }
        }

        match self.await_outcome(backend, surface).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.fail(backend, err).await),
        }
    }

    async fn execute<B: Backend + ?Sized>(
        &mut self,
        step: WorkflowStep,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        match step {
            WorkflowStep::EnsureSession => self.ensure_session(backend).await,
            WorkflowStep::Navigate => self.navigate_landing(backend).await,
            WorkflowStep::OpenOrders => self.open_orders(backend).await,
            WorkflowStep::SelectTab => self.select_tab(backend).await,
            WorkflowStep::ApplyFilter => self.apply_filter(backend).await,
            WorkflowStep::SelectAll => self.select_all(backend).await,
            WorkflowStep::TriggerGeneration => self.trigger_generation(backend).await,
            WorkflowStep::Prepare
            | WorkflowStep::AwaitOutcome
            | WorkflowStep::MaterializeArtifact => Ok(StepStatus::Completed),
        }
    }

    async fn fail<B: Backend + ?Sized>(&self, backend: &mut B, err: RunError) -> RunError {
        let step = err.step();
        error!(%step, code = err.code(), "Run failed: {}", err);
        self.ctx
            .diagnostics
            .record(backend, &format!("failed-{}", step))
            .await;
        err
    }

    /// Single snapshot, no waiting. Errors count as "not detected".
    async fn surface_detected<B: Backend + ?Sized>(&self, backend: &mut B) -> Option<ElementRef> {
        let chain = chains::in_progress_surface(&self.ctx.config.workflow);
        match self.locator.probe(backend, &chain).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Surface check skipped: {}", e);
                None
            }
        }
    }

    async fn ensure_session<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let state = self
            .session
            .ensure(backend, &self.ctx.config.credentials)
            .await
            .map_err(|e| RunError::session(WorkflowStep::EnsureSession, e))?;
        info!(?state, "Session ready");
        Ok(StepStatus::Completed)
    }

    async fn navigate_landing<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::Navigate;
        let landing = self.ctx.config.site.landing_url();
        let current = backend
            .current_url()
            .await
            .map_err(|e| RunError::backend(step, e))?;
        if current.starts_with(&landing) {
            debug!(url = %current, "Already on the landing page");
            return Ok(StepStatus::Completed);
        }

        backend
            .navigate(&landing, self.ctx.config.workflow.navigation_timeout())
            .await
            .map_err(|e| RunError::backend(step, e))?;
        Ok(StepStatus::Completed)
    }

    async fn open_orders<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::OpenOrders;
        let workflow = &self.ctx.config.workflow;

        match self.optional(backend, step, &chains::orders_link(workflow)).await? {
            Some(link) => {
                backend
                    .click(&link)
                    .await
                    .map_err(|e| RunError::backend(step, e))?;
                self.settle(step).await?;
                if self
                    .optional(backend, step, &chains::orders_tab(workflow))
                    .await?
                    .is_some()
                {
                    return Ok(StepStatus::Completed);
                }
                warn!("Orders list did not render after following the link");
            }
            None => warn!("Orders link not found"),
        }

        self.open_orders_directly(backend).await
    }

    async fn open_orders_directly<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::OpenOrders;
        let site = &self.ctx.config.site;
        let current = backend
            .current_url()
            .await
            .map_err(|e| RunError::backend(step, e))?;

        let Some(identifier) = parse_identifier(&site.identifier_pattern, &current) else {
            return Err(RunError::NoRoute { step, url: current });
        };
        let url = build_orders_url(&site.orders_url_template, &site.base_url, &identifier);
        info!(%url, "Opening orders list directly");

        match backend
            .navigate(&url, self.ctx.config.workflow.secondary_navigation_timeout())
            .await
        {
            Ok(_) => Ok(StepStatus::Completed),
            Err(e) if e.is_timeout() => Ok(StepStatus::SoftFailure(format!(
                "direct navigation did not finish: {}",
                e
            ))),
            Err(e) => Err(RunError::backend(step, e)),
        }
    }

    async fn select_tab<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::SelectTab;
        let tab = self
            .required(backend, step, &chains::orders_tab(&self.ctx.config.workflow))
            .await?;
        self.click(backend, step, &tab).await?;
        Ok(StepStatus::Completed)
    }

    /// Optional refinement: anything missing here is a soft failure.
    async fn apply_filter<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::ApplyFilter;
        let workflow = &self.ctx.config.workflow;
        let (Some(label), Some(value)) = (
            workflow.filter_label.as_deref(),
            workflow.filter_value.as_deref(),
        ) else {
            debug!("No filter configured");
            return Ok(StepStatus::Completed);
        };

        let Some(control) = self
            .optional(backend, step, &chains::filter_control(label))
            .await?
        else {
            return Ok(StepStatus::SoftFailure(format!("filter '{}' not found", label)));
        };
        if let Err(e) = backend.click(&control).await {
            return Ok(StepStatus::SoftFailure(format!("filter '{}': {}", label, e)));
        }
        self.settle(step).await?;

        let Some(option) = self
            .optional(backend, step, &chains::filter_option(value))
            .await?
        else {
            return Ok(StepStatus::SoftFailure(format!(
                "filter option '{}' not found",
                value
            )));
        };
        if let Err(e) = backend.click(&option).await {
            return Ok(StepStatus::SoftFailure(format!(
                "filter option '{}': {}",
                value, e
            )));
        }
        self.settle(step).await?;

        let apply = self
            .locator
            .probe(backend, &chains::filter_apply())
            .await
            .map_err(|e| RunError::backend(step, e))?;
        if let Some(apply) = apply {
            if let Err(e) = backend.click(&apply).await {
                return Ok(StepStatus::SoftFailure(format!("filter apply: {}", e)));
            }
            self.settle(step).await?;
        }

        info!(filter = label, value, "Filter applied");
        Ok(StepStatus::Completed)
    }

    async fn select_all<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::SelectAll;
        let checkbox = self.required(backend, step, &chains::select_all()).await?;
        if checkbox.checked == Some(true) {
            debug!("All rows already selected");
            return Ok(StepStatus::Completed);
        }
        self.click(backend, step, &checkbox).await?;
        Ok(StepStatus::Completed)
    }

    async fn trigger_generation<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepStatus, RunError> {
        let step = WorkflowStep::TriggerGeneration;
        let trigger = self
            .required(
                backend,
                step,
                &chains::generation_trigger(&self.ctx.config.workflow),
            )
            .await?;
        info!(strategy = %trigger.strategy, label = %trigger.label, "Starting label generation");
        self.click(backend, step, &trigger).await?;
        Ok(StepStatus::Completed)
    }

    /// `surface` is the download control of a confirmation surface that was
    /// already showing before generation was triggered.
    async fn await_outcome<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        surface: Option<ElementRef>,
    ) -> Result<RunOutcome, RunError> {
        let step = WorkflowStep::AwaitOutcome;
        let workflow = &self.ctx.config.workflow;
        info!(%step, timeout = ?workflow.generation_timeout(), "Step started");

        let mut signals = vec![OutcomeSignal::artifact(
            &self.ctx.download_dir,
            &workflow.artifact_extension,
        )];
        signals.extend(
            workflow
                .transient_failure_texts
                .iter()
                .map(|t| OutcomeSignal::transient_failure_text(t)),
        );
        signals.extend(
            workflow
                .ready_texts
                .iter()
                .map(|t| OutcomeSignal::ready_text(t)),
        );
        signals.push(OutcomeSignal::surface(chains::in_progress_surface(workflow)));

        let poller = CompletionPoller::new(
            PollPolicy::new(workflow.poll_interval(), workflow.generation_timeout()),
            &self.ctx.cancel,
        );
        let outcome = match &surface {
            // One sample so a finished file or a failure notice still wins.
            Some(control) => poller
                .sample(backend, &signals)
                .await
                .map_err(|e| RunError::backend(step, e))?
                .unwrap_or_else(|| Outcome::Success {
                    signal: format!("surface:{}", control.label),
                    artifact: None,
                }),
            None => poller
                .await_outcome(backend, &signals)
                .await
                .map_err(|e| RunError::backend(step, e))?,
        };

        match outcome {
            Outcome::Success {
                artifact: Some(path),
                signal,
            } => {
                info!(%signal, path = %path.display(), "Artifact downloaded");
                Ok(RunOutcome::Downloaded(path))
            }
            Outcome::Success {
                artifact: None,
                signal,
            } => {
                info!(%signal, "Generation finished");
                self.materialize(backend, surface).await
            }
            Outcome::TransientFailure { signal } => {
                self.empty(backend, EmptyReason::TransientServerFailure, &signal)
                    .await
            }
            Outcome::Timeout => {
                self.empty(backend, EmptyReason::GenerationTimeout, "timeout")
                    .await
            }
            Outcome::Cancelled => Err(RunError::Cancelled { step }),
        }
    }

    /// Click the download control the ready surface offers, then watch the
    /// download directory until the file lands.
    async fn materialize<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        control: Option<ElementRef>,
    ) -> Result<RunOutcome, RunError> {
        let step = WorkflowStep::MaterializeArtifact;
        let workflow = &self.ctx.config.workflow;
        info!(%step, "Step started");

        let control = match control {
            Some(found) => Some(found),
            None => {
                self.optional(backend, step, &chains::modal_download(workflow))
                    .await?
            }
        };
        match control {
            Some(button) => self.click(backend, step, &button).await?,
            None => {
                warn!("No download control on the ready surface, waiting for the file anyway");
                self.ctx
                    .diagnostics
                    .record(backend, "download-control-missing")
                    .await;
            }
        }

        let mut signals = vec![OutcomeSignal::artifact(
            &self.ctx.download_dir,
            &workflow.artifact_extension,
        )];
        signals.extend(
            workflow
                .transient_failure_texts
                .iter()
                .map(|t| OutcomeSignal::transient_failure_text(t)),
        );

        let poller = CompletionPoller::new(
            PollPolicy::new(workflow.poll_interval(), workflow.artifact_timeout()),
            &self.ctx.cancel,
        );
        let outcome = poller
            .await_outcome(backend, &signals)
            .await
            .map_err(|e| RunError::backend(step, e))?;

        match outcome {
            Outcome::Success {
                artifact: Some(path),
                ..
            } => {
                info!(path = %path.display(), "Artifact downloaded");
                Ok(RunOutcome::Downloaded(path))
            }
            Outcome::TransientFailure { signal } => {
                self.empty(backend, EmptyReason::TransientServerFailure, &signal)
                    .await
            }
            Outcome::Success { .. } | Outcome::Timeout => {
                self.empty(backend, EmptyReason::ArtifactTimeout, "timeout")
                    .await
            }
            Outcome::Cancelled => Err(RunError::Cancelled { step }),
        }
    }

    async fn empty<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        reason: EmptyReason,
        signal: &str,
    ) -> Result<RunOutcome, RunError> {
        info!(%reason, signal, "Nothing to download");
        self.ctx.diagnostics.record(backend, reason.as_str()).await;
        Ok(RunOutcome::NothingToDo(reason))
    }

    async fn required<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        step: WorkflowStep,
        chain: &LocatorChain,
    ) -> Result<ElementRef, RunError> {
        match self.optional(backend, step, chain).await? {
            Some(found) => Ok(found),
            None => Err(RunError::LocatorNotFound {
                step,
                intent: chain.intent().to_string(),
            }),
        }
    }

    async fn optional<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        step: WorkflowStep,
        chain: &LocatorChain,
    ) -> Result<Option<ElementRef>, RunError> {
        let wait = self.ctx.config.workflow.element_wait();
        match self
            .locator
            .locate(backend, chain, wait)
            .await
            .map_err(|e| RunError::backend(step, e))?
        {
            Polled::Ready(found) => Ok(Some(found)),
            Polled::TimedOut => Ok(None),
            Polled::Cancelled => Err(RunError::Cancelled { step }),
        }
    }

    async fn click<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        step: WorkflowStep,
        target: &ElementRef,
    ) -> Result<(), RunError> {
        backend
            .click(target)
            .await
            .map_err(|e| RunError::backend(step, e))?;
        self.settle(step).await
    }

    async fn settle(&self, step: WorkflowStep) -> Result<(), RunError> {
        let settle = self.ctx.config.workflow.settle();
        if settle.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.ctx.cancel.cancelled() => Err(RunError::Cancelled { step }),
            _ = tokio::time::sleep(settle) => Ok(()),
        }
    }
}

/// Pull the account identifier out of a panel URL. An invalid pattern
/// yields nothing.
pub fn parse_identifier(pattern: &str, url: &str) -> Option<String> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Invalid identifier pattern '{}': {}", pattern, e);
            return None;
        }
    };
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn build_orders_url(template: &str, base_url: &str, identifier: &str) -> String {
    template
        .replace("{base_url}", base_url.trim_end_matches('/'))
        .replace("{id}", identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = r"/panel/v3/new/[a-z_-]+/([a-z0-9]{5,})(?:/|$)";

    #[test]
    fn test_parse_identifier_from_panel_url() {
        let url = "https://supplier.meesho.com/panel/v3/new/fulfillment/abc12x/orders";
        assert_eq!(parse_identifier(PATTERN, url), Some("abc12x".to_string()));
    }

    #[test]
    fn test_parse_identifier_missing() {
        let url = "https://supplier.meesho.com/panel/v3/new/root/home";
        assert_eq!(parse_identifier(PATTERN, url), None);
        assert_eq!(parse_identifier("(unclosed", url), None);
    }

    #[test]
    fn test_build_orders_url() {
        let url = build_orders_url(
            "{base_url}/panel/v3/new/fulfillment/{id}/orders/ready-to-ship",
            "https://supplier.meesho.com/",
            "abc12x",
        );
        assert_eq!(
            url,
            "https://supplier.meesho.com/panel/v3/new/fulfillment/abc12x/orders/ready-to-ship"
        );
    }

    #[test]
    fn test_empty_reason_names() {
        assert_eq!(
            EmptyReason::TransientServerFailure.to_string(),
            "transient_server_failure"
        );
    }
}
