use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::SessionConfig;
use crate::session::backend::{HttpIdentityBackend, IdentityBackend};
use crate::session::errors::SessionError;
use crate::session::timer::RenewalTimer;
use crate::session::types::{RegistrationRequest, Session, SessionStatus, UserProfile};
use crate::storage::{Credential, CredentialStore};
use crate::token::{Renewal, TokenClock};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the authenticated-user state machine.
///
/// Cloning yields another handle to the same session, so one instance can be
/// handed to the request gateway and to the UI layer.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn IdentityBackend>,
    store: CredentialStore,
    clock: TokenClock,
    state: watch::Sender<Session>,
    /// Bumped whenever a session is established or closed. Results of network
    /// calls started under an older generation are discarded.
    generation: AtomicU64,
    /// Serializes applying login/validate/refresh results against logout.
    transition: tokio::sync::Mutex<()>,
    timer: Mutex<Option<RenewalTimer>>,
    next_timer_id: AtomicU64,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Number of completed refresh exchanges.
    refresh_epoch: AtomicU64,
    last_refresh: Mutex<Option<Result<Credential, SessionError>>>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: CredentialStore,
        clock: TokenClock,
    ) -> Self {
        let (state, _) = watch::channel(Session::anonymous());
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                clock,
                state,
                generation: AtomicU64::new(0),
                transition: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
                next_timer_id: AtomicU64::new(0),
                refresh_lock: tokio::sync::Mutex::new(()),
                refresh_epoch: AtomicU64::new(0),
                last_refresh: Mutex::new(None),
            }),
        }
    }

    /// Session talking HTTP to `config.api_url`.
    pub fn from_config(config: &SessionConfig, store: CredentialStore) -> Result<Self, SessionError> {
        let backend = HttpIdentityBackend::new(config)?;
        Ok(Self::new(
            Arc::new(backend),
            store,
            TokenClock::new(config.renewal_lead),
        ))
    }

    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    /// Observe session transitions.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the stored credential.
    pub async fn credential(&self) -> Result<Option<Credential>, SessionError> {
        Ok(self.inner.store.load().await?)
    }

    /// Exchange an identifier/secret pair for a session.
    ///
    /// The renewal timer is scheduled only after the profile fetch has
    /// confirmed the new credential.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<UserProfile, SessionError> {
        let generation = self.generation();
        tracing::info!("Login attempt");

        let exchanged = async {
            let credential = self
                .inner
                .backend
                .exchange_password(identifier, secret)
                .await?;
            let expiry = self.inner.clock.expiry_of(credential.access_token())?;
            let user = self.inner.backend.fetch_profile(&credential).await?;
            Ok::<_, SessionError>((credential, expiry, user))
        }
        .await;

        let (credential, expiry, user) =
            exchanged.inspect_err(|e| tracing::warn!("Login failed: {}", e.kind()))?;

        self.establish(generation, &credential, user.clone(), expiry, true)
            .await?;
        tracing::info!("Login succeeded for user {}", user.id);
        Ok(user)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<UserProfile, SessionError> {
        tracing::info!("Registration attempt");
        self.inner
            .backend
            .register(request)
            .await
            .inspect(|user| tracing::info!("Registered user {}", user.id))
            .inspect_err(|e| tracing::warn!("Registration failed: {}", e.kind()))
    }

    /// Replace the credential with a fresh one.
    ///
    /// Single-flight: callers arriving while an exchange is in progress wait for
    /// it and receive its outcome instead of starting another. Only an
    /// authenticated session is refreshed. A failed exchange closes the session
    /// before returning [`SessionError::RefreshFailed`].
    pub async fn refresh(&self) -> Result<Credential, SessionError> {
        self.refresh_single_flight(None).await
    }

    /// Refresh on behalf of a request that was rejected while carrying `sent`.
    ///
    /// Decided inside the single-flight section: if the stored credential has
    /// already been replaced it is returned without another exchange, and an
    /// empty store yields [`SessionError::NotAuthenticated`] without touching
    /// the session.
    pub async fn refresh_if_current(&self, sent: &Credential) -> Result<Credential, SessionError> {
        self.refresh_single_flight(Some(sent)).await
    }

    async fn refresh_single_flight(
        &self,
        sent: Option<&Credential>,
    ) -> Result<Credential, SessionError> {
        let ticket = self.inner.refresh_epoch.load(Ordering::SeqCst);
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some(sent) = sent {
            match self.inner.store.load().await? {
                None => return Err(SessionError::NotAuthenticated),
                Some(current) if &current != sent => {
                    tracing::debug!("Credential already replaced, skipping refresh");
                    return Ok(current);
                }
                Some(_) => {}
            }
        }

        if self.inner.refresh_epoch.load(Ordering::SeqCst) != ticket {
            let shared = lock(&self.inner.last_refresh).clone();
            if let Some(outcome) = shared {
                tracing::debug!("Joined in-flight token refresh");
                return outcome;
            }
        }

        let outcome = self.refresh_exchange().await;
        *lock(&self.inner.last_refresh) = Some(outcome.clone());
        self.inner.refresh_epoch.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    /// Cancel renewal, clear the stored credential and forget the user.
    ///
    /// Calling it while already anonymous leaves the state unchanged, but a
    /// login still in flight is discarded. If the store cannot be cleared the
    /// session is left as it was and the error is returned.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.close_session(None).await
    }

    /// Restore the session persisted by a previous run.
    ///
    /// Expired or undecodable tokens are discarded without a network call.
    /// Failures are not returned: they resolve to an anonymous session.
    pub async fn validate_on_startup(&self) -> Session {
        let generation = self.generation();

        let credential = match self.inner.store.load().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::debug!("No stored credential");
                return self.session();
            }
            Err(e) => {
                tracing::warn!("Could not read credential store: {}", e);
                self.close_if_current(generation).await;
                return self.session();
            }
        };

        if self.generation() == generation {
            self.set_status(SessionStatus::Validating);
        }

        let validated = async {
            let expiry = self.inner.clock.expiry_of(credential.access_token())?;
            if expiry <= Utc::now() {
                return Err(SessionError::TokenExpired);
            }
            let user = self.inner.backend.fetch_profile(&credential).await?;
            Ok::<_, SessionError>((expiry, user))
        }
        .await;

        match validated {
            Ok((expiry, user)) => {
                match self
                    .establish(generation, &credential, user, expiry, false)
                    .await
                {
                    Ok(()) => tracing::info!("Stored session validated"),
                    Err(e) => tracing::debug!("Stored session not applied: {}", e.kind()),
                }
            }
            Err(e) => {
                tracing::warn!("Stored session rejected: {}", e.kind());
                self.close_if_current(generation).await;
            }
        }

        self.session()
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn publish(&self, user: Option<UserProfile>, status: SessionStatus) {
        self.inner.state.send_replace(Session { user, status });
    }

    fn set_status(&self, status: SessionStatus) {
        self.inner.state.send_modify(|session| session.status = status);
    }

    async fn establish(
        &self,
        generation: u64,
        credential: &Credential,
        user: UserProfile,
        expiry: DateTime<Utc>,
        persist: bool,
    ) -> Result<(), SessionError> {
        let _guard = self.inner.transition.lock().await;
        if self.generation() != generation {
            tracing::debug!("Discarding result of a superseded session");
            return Err(SessionError::Superseded);
        }

        if persist {
            self.inner.store.save(credential).await?;
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.publish(Some(user), SessionStatus::Authenticated);
        self.schedule_renewal(expiry, false);
        Ok(())
    }

    async fn close_session(&self, expected_generation: Option<u64>) -> Result<(), SessionError> {
        let _guard = self.inner.transition.lock().await;
        if let Some(expected) = expected_generation {
            if self.generation() != expected {
                return Ok(());
            }
        }

        // The store is emptied before Anonymous is published
        self.inner.store.clear().await?;

        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_renewal();

        let previous = self.status();
        self.publish(None, SessionStatus::Anonymous);
        if previous != SessionStatus::Anonymous {
            tracing::info!("Session closed");
        }
        Ok(())
    }

    async fn close_if_current(&self, generation: u64) {
        if let Err(e) = self.close_session(Some(generation)).await {
            tracing::error!("Failed to clear credential store: {}", e);
            // An unvalidated credential never became a session
            if self.status() == SessionStatus::Validating {
                self.set_status(SessionStatus::Anonymous);
            }
        }
    }

    async fn refresh_exchange(&self) -> Result<Credential, SessionError> {
        if !matches!(
            self.status(),
            SessionStatus::Authenticated | SessionStatus::Refreshing
        ) {
            tracing::debug!("Refresh requested without an established session");
            return Err(SessionError::RefreshFailed(
                SessionError::NotAuthenticated.to_string(),
            ));
        }

        let generation = self.generation();

        let exchanged = async {
            let current = self
                .inner
                .store
                .load()
                .await?
                .ok_or(SessionError::NotAuthenticated)?;
            if self.status() == SessionStatus::Authenticated {
                self.set_status(SessionStatus::Refreshing);
            }
            let fresh = self.inner.backend.refresh(&current).await?;
            let expiry = self.inner.clock.expiry_of(fresh.access_token())?;
            if expiry <= Utc::now() {
                return Err(SessionError::TokenExpired);
            }
            Ok::<_, SessionError>((fresh, expiry))
        }
        .await;

        let committed = match exchanged {
            Ok((fresh, expiry)) => self
                .commit_refresh(generation, &fresh, expiry)
                .await
                .map(|()| fresh),
            Err(e) => Err(e),
        };

        match committed {
            Ok(fresh) => {
                tracing::info!("Access token refreshed");
                Ok(fresh)
            }
            // The session this refresh belonged to is already gone
            Err(SessionError::Superseded) => Err(SessionError::RefreshFailed(
                SessionError::Superseded.to_string(),
            )),
            Err(e) => {
                tracing::warn!("Token refresh failed ({}), closing session", e.kind());
                self.close_if_current(generation).await;
                Err(SessionError::RefreshFailed(e.to_string()))
            }
        }
    }

    async fn commit_refresh(
        &self,
        generation: u64,
        fresh: &Credential,
        expiry: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let _guard = self.inner.transition.lock().await;
        if self.generation() != generation {
            return Err(SessionError::Superseded);
        }

        self.inner.store.save(fresh).await?;
        if self.status() == SessionStatus::Refreshing {
            self.set_status(SessionStatus::Authenticated);
        }
        self.schedule_renewal(expiry, true);
        Ok(())
    }

    fn schedule_renewal(&self, expiry: DateTime<Utc>, after_refresh: bool) {
        let now = Utc::now();
        let delay = match self.inner.clock.schedule_for(expiry, now) {
            Renewal::After(delay) => delay,
            // Tokens shorter-lived than the lead time would otherwise renew in a tight loop
            Renewal::Immediate if after_refresh => {
                let half = (expiry - now).to_std().unwrap_or_default() / 2;
                tracing::warn!(
                    "Refreshed token expires within the renewal lead time; renewing in {:?}",
                    half
                );
                half
            }
            Renewal::Immediate => {
                tracing::info!("Renewal deadline already passed, renewing now");
                Duration::ZERO
            }
        };

        let id = self.inner.next_timer_id.fetch_add(1, Ordering::SeqCst);
        let weak = Arc::downgrade(&self.inner);

        // Hold the slot while spawning so the task cannot look for itself before it is stored
        let mut slot = lock(&self.inner.timer);
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }.renewal_due(id).await;
            }
        });
        // Replacing the slot drops, and thereby aborts, the previous timer
        *slot = Some(RenewalTimer::new(id, handle));
        tracing::debug!("Token renewal scheduled in {:?}", delay);
    }

    fn cancel_renewal(&self) {
        let timer = lock(&self.inner.timer).take();
        if timer.is_some() {
            tracing::debug!("Token renewal cancelled");
        }
        drop(timer);
    }

    async fn renewal_due(&self, id: u64) {
        let fired = lock(&self.inner.timer).take_if(|timer| timer.id() == id);
        let Some(timer) = fired else {
            tracing::debug!("Ignoring superseded renewal timer");
            return;
        };
        timer.disarm();

        let has_credential = matches!(self.inner.store.load().await, Ok(Some(_)));
        if !has_credential || self.status() == SessionStatus::Anonymous {
            tracing::debug!("Renewal fired without an active credential");
            return;
        }

        // A failed refresh has already closed the session
        let _ = self.refresh().await;
    }

    #[cfg(test)]
    pub(crate) fn renewal_scheduled(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }
}
