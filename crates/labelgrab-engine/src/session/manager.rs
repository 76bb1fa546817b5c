use super::{AuthenticationError, Session, SessionError, SessionState, SessionStore};
use crate::backend::Backend;
use crate::config::{Credentials, LabelgrabConfig, SessionConfig, SiteConfig};
use crate::locator::{LocatorChain, Locator, TextMatch, chains};
use crate::poller::{PollClock, PollPolicy, Polled, Tick};
use crate::protocol::ElementRef;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns the persisted session for one run and drives the login surface.
pub struct SessionManager {
    store: SessionStore,
    site: SiteConfig,
    config: SessionConfig,
    navigation_timeout: Duration,
    poll_interval: Duration,
    typing_delay_ms: (u64, u64),
    cancel: CancellationToken,
    state: SessionState,
}

impl SessionManager {
    pub fn new(config: &LabelgrabConfig, cancel: &CancellationToken) -> Self {
        let workflow = &config.workflow;
        Self {
            store: SessionStore::new(config.session.file.clone()),
            site: config.site.clone(),
            config: config.session.clone(),
            navigation_timeout: workflow.navigation_timeout(),
            poll_interval: workflow.poll_interval(),
            typing_delay_ms: (workflow.typing_delay_min_ms, workflow.typing_delay_max_ms),
            cancel: cancel.clone(),
            state: SessionState::NoSession,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    /// Restore a persisted session or log in afresh. Returns the terminal
    /// state reached (`Valid` or `Authenticated`).
    pub async fn ensure<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        credentials: &Credentials,
    ) -> Result<SessionState, SessionError> {
        self.transition(SessionState::Restoring);
        match self.restore().await? {
            Some(session) => {
                if self.is_valid(backend, &session).await? {
                    info!("Persisted session is valid");
                    self.transition(SessionState::Valid);
                    return Ok(SessionState::Valid);
                }
                info!("Persisted session is no longer valid");
                self.transition(SessionState::Invalid);
            }
            None => {
                info!("No persisted session, logging in");
                self.transition(SessionState::Invalid);
            }
        }

        self.invalidate(backend).await?;
        self.transition(SessionState::Authenticating);
        match self.authenticate(backend, credentials).await {
            Ok(()) => {
                self.persist(backend).await?;
                self.transition(SessionState::Authenticated);
                Ok(SessionState::Authenticated)
            }
            Err(e) => {
                self.transition(SessionState::AuthFailed);
                Err(e)
            }
        }
    }

    pub async fn restore(&self) -> Result<Option<Session>, SessionError> {
        self.store.load().await
    }

    /// Apply the session and check both validity signals on the landing page.
    /// A marker wait that runs out is `false`, not an error.
    pub async fn is_valid<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        session: &Session,
    ) -> Result<bool, SessionError> {
        let now = chrono::Utc::now().timestamp() as f64;
        let session = session.without_expired(now);
        if session.is_empty() {
            debug!("Every persisted cookie has expired");
            return Ok(false);
        }

        backend.set_cookies(session.cookies()).await?;
        let landing = self.site.landing_url();
        backend.navigate(&landing, self.navigation_timeout).await?;

        let url = backend.current_url().await?;
        if self.is_login_url(&url) {
            debug!(%url, "Landing page redirected to login");
            return Ok(false);
        }

        if !self.wait_for_markers(backend).await? {
            info!("Post-login markers did not appear");
            return Ok(false);
        }

        if matches!(self.read_auth_flag(backend).await, Some(Value::Bool(false))) {
            info!("Application reports the session as logged out");
            return Ok(false);
        }
        Ok(true)
    }

    async fn wait_for_markers<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> Result<bool, SessionError> {
        if self.config.marker_texts.is_empty() {
            return Ok(true);
        }
        let markers: Vec<TextMatch> = self
            .config
            .marker_texts
            .iter()
            .map(TextMatch::contains)
            .collect();

        let policy = PollPolicy::new(self.poll_interval, self.config.validity_wait());
        let mut clock = PollClock::start(policy, &self.cancel);
        loop {
            match backend.page_text().await {
                Ok(text) if markers.iter().any(|m| m.matches(&text)) => return Ok(true),
                Ok(_) => {}
                Err(e) => debug!("Page text unavailable while checking markers: {}", e),
            }
            match clock.wait_next().await {
                Tick::Continue => continue,
                Tick::Expired => return Ok(false),
                Tick::Cancelled => return Err(SessionError::Cancelled),
            }
        }
    }

    /// `None` when the expression cannot be evaluated; only an explicit
    /// `false` counts against validity.
    async fn read_auth_flag<B: Backend + ?Sized>(&self, backend: &mut B) -> Option<Value> {
        let expression = format!(
            "(() => {{ try {{ return ({}); }} catch (e) {{ return null; }} }})()",
            self.config.auth_flag_expression
        );
        match backend.evaluate(&expression).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Auth flag unreadable: {}", e);
                None
            }
        }
    }

    /// Clear the browser-held state and delete the persisted bundle.
    pub async fn invalidate<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<(), SessionError> {
        backend.clear_session_state().await?;
        self.store.delete().await?;
        info!(path = %self.store.path().display(), "Session invalidated");
        Ok(())
    }

    /// Capture the browser's cookies and overwrite the persisted bundle.
    pub async fn persist<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<(), SessionError> {
        let cookies = backend.get_cookies().await?;
        let count = cookies.len();
        self.store.save(&Session::new(cookies)).await?;
        info!(cookies = count, path = %self.store.path().display(), "Session persisted");
        Ok(())
    }

    pub async fn authenticate<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        credentials: &Credentials,
    ) -> Result<(), SessionError> {
        let email = non_empty(credentials.email.as_deref())
            .ok_or(AuthenticationError::MissingCredential("email"))?;
        let password = non_empty(credentials.password.as_deref())
            .ok_or(AuthenticationError::MissingCredential("password"))?;

        let login_url = self.site.login_url();
        info!(url = %login_url, "Opening login page");
        backend.navigate(&login_url, self.navigation_timeout).await?;

        let locator = Locator::new(self.poll_interval, &self.cancel);
        let wait = self.config.login_field_wait();

        let email_field = self
            .require_field(backend, &locator, &chains::email_field(), "email", wait)
            .await?;
        self.type_humanized(backend, &email_field, email).await?;

        let password_field = self
            .require_field(backend, &locator, &chains::password_field(), "password", wait)
            .await?;
        self.type_humanized(backend, &password_field, password).await?;

        let clicked = match locator.probe(backend, &chains::login_submit()).await? {
            Some(button) => match backend.click(&button).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Submit click failed, falling back to Enter: {}", e);
                    false
                }
            },
            None => false,
        };
        if !clicked {
            debug!("Submitting login with Enter");
            backend.press_key(&password_field, "Enter").await?;
        }

        self.wait_for_login_exit(backend).await
    }

    async fn require_field<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        locator: &Locator,
        chain: &LocatorChain,
        field: &'static str,
        wait: Duration,
    ) -> Result<ElementRef, SessionError> {
        match locator.locate(backend, chain, wait).await? {
            Polled::Ready(found) => Ok(found),
            Polled::TimedOut => Err(AuthenticationError::FieldNotFound { field, wait }.into()),
            Polled::Cancelled => Err(SessionError::Cancelled),
        }
    }

    async fn type_humanized<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        field: &ElementRef,
        text: &str,
    ) -> Result<(), SessionError> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            backend.type_text(field, ch.encode_utf8(&mut buf)).await?;
            let delay = self.next_typing_delay();
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(())
    }

    fn next_typing_delay(&self) -> Duration {
        let (a, b) = self.typing_delay_ms;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    async fn wait_for_login_exit<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> Result<(), SessionError> {
        let policy = PollPolicy::new(self.poll_interval, self.config.post_login_wait());
        let mut clock = PollClock::start(policy, &self.cancel);
        loop {
            let url = backend.current_url().await?;
            if !self.is_login_url(&url) {
                info!(%url, "Left the login page");
                return Ok(());
            }
            match clock.wait_next().await {
                Tick::Continue => continue,
                Tick::Expired => return Err(AuthenticationError::StillOnLogin { url }.into()),
                Tick::Cancelled => return Err(SessionError::Cancelled),
            }
        }
    }

    pub fn is_login_url(&self, url: &str) -> bool {
        let login_path = self.site.login_path.trim_end_matches('/');
        if login_path.is_empty() {
            return false;
        }
        match url::Url::parse(url) {
            Ok(parsed) => parsed.path().trim_end_matches('/').starts_with(login_path),
            Err(_) => url.contains(login_path),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_login_url() {
        let manager = SessionManager::new(&LabelgrabConfig::default(), &CancellationToken::new());
        assert!(manager.is_login_url("https://supplier.meesho.com/panel/v3/new/root/login"));
        assert!(manager.is_login_url("https://supplier.meesho.com/panel/v3/new/root/login/?next=x"));
        assert!(!manager.is_login_url("https://supplier.meesho.com/panel/v3/new/root/home"));
    }

    #[test]
    fn test_typing_delay_stays_in_range() {
        let mut config = LabelgrabConfig::default();
        config.workflow.typing_delay_min_ms = 90;
        config.workflow.typing_delay_max_ms = 30;
        let manager = SessionManager::new(&config, &CancellationToken::new());
        for _ in 0..50 {
            let d = manager.next_typing_delay();
            assert!(d >= Duration::from_millis(30) && d <= Duration::from_millis(90));
        }
    }
}
