//! Element resolution under an unstable DOM.
//!
//! A [`LocatorChain`] is an ordered list of strategies for one intent. The
//! first strategy that yields a usable element wins; later strategies are not
//! consulted. Order encodes confidence, most specific first.

pub mod chains;
pub mod strategy;

pub use strategy::{
    Attribute, AttributeStrategy, ContainerStrategy, IconStrategy, LocatorStrategy,
    RoleStrategy, TextMatch, TextStrategy,
};

use crate::backend::{Backend, BackendError};
use crate::poller::{PollClock, PollPolicy, Polled, Tick};
use crate::protocol::{ElementRef, PageSnapshot};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct LocatorChain {
    intent: String,
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl LocatorChain {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl LocatorStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Evaluate the chain once against a single snapshot.
    pub fn locate_once(&self, snapshot: &PageSnapshot) -> Option<ElementRef> {
        for strategy in &self.strategies {
            if let Some(elem) = strategy.find(snapshot) {
                debug!(
                    intent = %self.intent,
                    strategy = strategy.name(),
                    element = elem.id,
                    "Locator matched"
                );
                return Some(ElementRef {
                    id: elem.id,
                    strategy: strategy.name().to_string(),
                    label: elem.label().trim().to_string(),
                    checked: elem.checked,
                });
            }
        }
        None
    }
}

impl std::fmt::Debug for LocatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocatorChain")
            .field("intent", &self.intent)
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

/// Re-evaluates a chain against fresh snapshots until it matches.
pub struct Locator {
    interval: Duration,
    cancel: CancellationToken,
}

impl Locator {
    pub fn new(interval: Duration, cancel: &CancellationToken) -> Self {
        Self {
            interval,
            cancel: cancel.clone(),
        }
    }

    /// `TimedOut` means every strategy was exhausted for the whole wait; it is
    /// the caller's call whether that is fatal.
    pub async fn locate<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        chain: &LocatorChain,
        timeout: Duration,
    ) -> Result<Polled<ElementRef>, BackendError> {
        let mut clock = PollClock::start(PollPolicy::new(self.interval, timeout), &self.cancel);
        loop {
            let snapshot = backend.snapshot().await?;
            if let Some(found) = chain.locate_once(&snapshot) {
                return Ok(Polled::Ready(found));
            }
            match clock.wait_next().await {
                Tick::Continue => continue,
                Tick::Expired => {
                    debug!(
                        intent = chain.intent(),
                        attempts = clock.attempts(),
                        strategies = ?chain.strategy_names(),
                        "Locator exhausted"
                    );
                    return Ok(Polled::TimedOut);
                }
                Tick::Cancelled => return Ok(Polled::Cancelled),
            }
        }
    }

    /// Single snapshot, single pass. No waiting.
    pub async fn probe<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        chain: &LocatorChain,
    ) -> Result<Option<ElementRef>, BackendError> {
        let snapshot = backend.snapshot().await?;
        Ok(chain.locate_once(&snapshot))
    }
}
