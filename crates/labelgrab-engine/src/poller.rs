//! Fixed-cadence polling with a hard deadline and cooperative cancellation.
//!
//! [`PollClock`] is the primitive every bounded wait in the engine is built
//! on; [`CompletionPoller`] uses it to race several completion signals.

use crate::backend::{Backend, BackendError};
use crate::locator::{LocatorChain, TextMatch};
use crate::protocol::PageSnapshot;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lower bound on the sampling interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Expired,
    Cancelled,
}

/// Deadline bookkeeping for one poll loop.
///
/// Probe first, then call [`PollClock::wait_next`]; the clock never sleeps
/// past the deadline, so a loop returns at most one interval after it.
pub struct PollClock {
    policy: PollPolicy,
    deadline: Instant,
    cancel: CancellationToken,
    attempts: u32,
}

impl PollClock {
    pub fn start(policy: PollPolicy, cancel: &CancellationToken) -> Self {
        Self {
            policy,
            deadline: Instant::now() + policy.timeout,
            cancel: cancel.clone(),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub async fn wait_next(&mut self) -> Tick {
        self.attempts += 1;
        if self.cancel.is_cancelled() {
            return Tick::Cancelled;
        }
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Tick::Expired;
        }
        let nap = self.policy.interval.min(remaining);
        tokio::select! {
            _ = self.cancel.cancelled() => Tick::Cancelled,
            _ = tokio::time::sleep(nap) => Tick::Continue,
        }
    }
}

/// Result of any bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// The server finished generating the file.
    Ready,
    /// The server reported a temporary failure; nothing to download.
    TransientFailure,
}

#[derive(Debug, Clone)]
pub enum OutcomeSignal {
    PageText {
        name: String,
        text: TextMatch,
        kind: SignalKind,
    },
    /// Fires when a non-empty file with `extension` exists in `dir`.
    Directory { dir: PathBuf, extension: String },
    /// Fires as readiness when `chain` matches the current page.
    Surface { name: String, chain: Arc<LocatorChain> },
}

impl OutcomeSignal {
    pub fn ready_text(text: &str) -> Self {
        OutcomeSignal::PageText {
            name: format!("ready:{}", text),
            text: TextMatch::contains(text),
            kind: SignalKind::Ready,
        }
    }

    pub fn transient_failure_text(text: &str) -> Self {
        OutcomeSignal::PageText {
            name: format!("transient:{}", text),
            text: TextMatch::contains(text),
            kind: SignalKind::TransientFailure,
        }
    }

    pub fn artifact(dir: &Path, extension: &str) -> Self {
        OutcomeSignal::Directory {
            dir: dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn surface(chain: LocatorChain) -> Self {
        OutcomeSignal::Surface {
            name: format!("surface:{}", chain.intent()),
            chain: Arc::new(chain),
        }
    }

    fn needs_page_text(&self) -> bool {
        matches!(self, OutcomeSignal::PageText { .. })
    }

    fn needs_snapshot(&self) -> bool {
        matches!(self, OutcomeSignal::Surface { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `artifact` is set when the file itself was observed on disk.
    Success {
        signal: String,
        artifact: Option<PathBuf>,
    },
    TransientFailure {
        signal: String,
    },
    Timeout,
    Cancelled,
}

pub struct CompletionPoller {
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl CompletionPoller {
    pub fn new(policy: PollPolicy, cancel: &CancellationToken) -> Self {
        Self {
            policy,
            cancel: cancel.clone(),
        }
    }

    /// Sample `signals` until one fires, the timeout elapses or the run is cancelled.
    pub async fn await_outcome<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        signals: &[OutcomeSignal],
    ) -> Result<Outcome, BackendError> {
        let mut clock = PollClock::start(self.policy, &self.cancel);
        loop {
            if let Some(outcome) = self.sample(backend, signals).await? {
                debug!(attempts = clock.attempts(), ?outcome, "Signal fired");
                return Ok(outcome);
            }
            match clock.wait_next().await {
                Tick::Continue => continue,
                Tick::Expired => {
                    debug!(attempts = clock.attempts(), "Poll timed out");
                    return Ok(Outcome::Timeout);
                }
                Tick::Cancelled => return Ok(Outcome::Cancelled),
            }
        }
    }

    /// Evaluate every signal once, in order. The first that fires wins.
    pub async fn sample<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        signals: &[OutcomeSignal],
    ) -> Result<Option<Outcome>, BackendError> {
        let text = if signals.iter().any(OutcomeSignal::needs_page_text) {
            self.read_page_text(backend).await
        } else {
            None
        };
        let snapshot = if signals.iter().any(OutcomeSignal::needs_snapshot) {
            self.read_snapshot(backend).await
        } else {
            None
        };

        for signal in signals {
            match signal {
                OutcomeSignal::PageText {
                    name,
                    text: pattern,
                    kind,
                } => {
                    let Some(text) = text.as_deref() else {
                        continue;
                    };
                    if pattern.matches(text) {
                        return Ok(Some(match kind {
                            SignalKind::Ready => Outcome::Success {
                                signal: name.clone(),
                                artifact: None,
                            },
                            SignalKind::TransientFailure => Outcome::TransientFailure {
                                signal: name.clone(),
                            },
                        }));
                    }
                }
                OutcomeSignal::Directory { dir, extension } => {
                    if let Some(path) = find_artifact(dir, extension).await? {
                        return Ok(Some(Outcome::Success {
                            signal: format!("file:{}", path.display()),
                            artifact: Some(path),
                        }));
                    }
                }
                OutcomeSignal::Surface { name, chain } => {
                    let Some(snapshot) = snapshot.as_ref() else {
                        continue;
                    };
                    if chain.locate_once(snapshot).is_some() {
                        return Ok(Some(Outcome::Success {
                            signal: name.clone(),
                            artifact: None,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn read_page_text<B: Backend + ?Sized>(&self, backend: &mut B) -> Option<String> {
        // A slow evaluation must not stretch the loop past its deadline.
        match tokio::time::timeout(self.policy.interval, backend.page_text()).await {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                debug!("Page text unavailable this tick: {}", e);
                None
            }
            Err(_) => {
                debug!("Page text read exceeded one interval");
                None
            }
        }
    }

    async fn read_snapshot<B: Backend + ?Sized>(&self, backend: &mut B) -> Option<PageSnapshot> {
        match tokio::time::timeout(self.policy.interval, backend.snapshot()).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(e)) => {
                debug!("Snapshot unavailable this tick: {}", e);
                None
            }
            Err(_) => {
                debug!("Snapshot exceeded one interval");
                None
            }
        }
    }
}

/// First non-empty file in `dir` whose extension matches, case-insensitively.
pub async fn find_artifact(dir: &Path, extension: &str) -> Result<Option<PathBuf>, BackendError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if metadata.is_file() && metadata.len() > 0 {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}
