//! Session guard for the authenticated user.
//!
//! Two states, [`SessionState::Active`] and [`SessionState::Inactive`]. While
//! active a fixed-period check compares the credential's expiry with the
//! clock; on expiry the credential is cleared, the cart store is reset and the
//! guard goes inactive. The timer only exists while the session is active.

use crate::cart::SharedCart;
use crate::domain::{
    ApiPtr, Claims, LoginRequest, MetricsPtr, Notification, NotifierPtr,
};
use crate::error::{StorefrontError, StorefrontResult};
use crate::schedule::{spawn_interval, TaskHandle};
use crate::token::{self, TokenStore};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Lifetime requested for credentials issued at login.
const LOGIN_EXPIRES_IN_MINS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Inactive,
}

/// What a view gated on authentication should do once initialization is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin,
}

/// Seconds since the epoch. Injected so expiry can be driven from tests.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp())
}

/// The user as far as the client knows, derived from credential claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    // ---
    pub user_id: Option<u64>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_authenticated: bool,
    pub token_expiry: Option<i64>,
}

impl UserState {
    // ---
    pub fn from_claims(claims: &Claims) -> Self {
        // ---
        let user_id = token::subject_id(claims);
        Self {
            user_id,
            email: claims.email.clone(),
            username: claims.username.clone(),
            is_authenticated: user_id.is_some(),
            token_expiry: claims.exp,
        }
    }

    fn is_expired_at(&self, now: i64) -> bool {
        self.token_expiry.map_or(true, |exp| exp <= now)
    }
}

struct GuardInner {
    // ---
    tokens: TokenStore,
    api: ApiPtr,
    cart: SharedCart,
    notifier: NotifierPtr,
    metrics: MetricsPtr,
    check_interval: Duration,
    clock: Clock,
    user: Mutex<UserState>,
    state: watch::Sender<SessionState>,
    initialized: OnceLock<()>,
    gate: OnceLock<GateDecision>,
    timer: Mutex<Option<TaskHandle>>,
}

/// Owns the user state, the credential in durable storage and the expiry timer.
///
/// Cloning yields another handle to the same guard.
#[derive(Clone)]
pub struct SessionGuard {
    // ---
    inner: Arc<GuardInner>,
}

impl SessionGuard {
    // ---
    pub fn new(
        tokens: TokenStore,
        api: ApiPtr,
        cart: SharedCart,
        notifier: NotifierPtr,
        metrics: MetricsPtr,
        check_interval: Duration,
    ) -> Self {
        // ---
        Self::with_clock(tokens, api, cart, notifier, metrics, check_interval, system_clock())
    }

    pub fn with_clock(
        tokens: TokenStore,
        api: ApiPtr,
        cart: SharedCart,
        notifier: NotifierPtr,
        metrics: MetricsPtr,
        check_interval: Duration,
        clock: Clock,
    ) -> Self {
        // ---
        let (state, _rx) = watch::channel(SessionState::Inactive);
        Self {
            inner: Arc::new(GuardInner {
                tokens,
                api,
                cart,
                notifier,
                metrics,
                check_interval,
                clock,
                user: Mutex::new(UserState::default()),
                state,
                initialized: OnceLock::new(),
                gate: OnceLock::new(),
                timer: Mutex::new(None),
            }),
        }
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// A receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn user(&self) -> UserState {
        self.inner.user().clone()
    }

    /// The resolved subject id, falling back to the denormalized stored id.
    pub fn user_id(&self) -> Option<u64> {
        // ---
        self.inner
            .user()
            .user_id
            .or_else(|| self.inner.tokens.stored_user_id())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.get().is_some()
    }

    pub fn is_timer_running(&self) -> bool {
        // ---
        self.inner
            .timer()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// One-shot gate for authenticated views.
    ///
    /// `None` until [`initialize`](Self::initialize) has completed. The first
    /// decision after that is fixed; later state changes are observed through
    /// [`subscribe`](Self::subscribe), not by polling the gate.
    pub fn gate(&self) -> Option<GateDecision> {
        // ---
        self.inner.initialized.get()?;
        Some(*self.inner.gate.get_or_init(|| match self.state() {
            SessionState::Active => GateDecision::Allow,
            SessionState::Inactive => GateDecision::RedirectToLogin,
        }))
    }

    // ============================================================
    // Transitions
    // ============================================================

    /// Loads the stored credential and decides the initial state.
    ///
    /// A missing, malformed, expired or subject-less credential resolves to
    /// `Inactive` and is removed from storage. None of these is an error.
    pub fn initialize(&self) -> SessionState {
        // ---
        let state = match self.inner.load_valid_claims() {
            Some(claims) => self.activate(&claims),
            None => {
                self.inner.deactivate();
                SessionState::Inactive
            }
        };

        let _ = self.inner.initialized.set(());
        tracing::info!("Session initialized: {:?}", state);
        state
    }

    /// Re-reads the stored credential; activates if it is present and valid.
    ///
    /// Unlike [`initialize`](Self::initialize) nothing is cleared when the
    /// credential is unusable (missing, malformed, expired or without a
    /// subject id); the current state is returned unchanged.
    pub fn refresh_from_token(&self) -> SessionState {
        // ---
        let stored = match self.inner.tokens.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Failed to read credential: {}", e);
                None
            }
        };

        let claims = stored.and_then(|credential| match token::decode(&credential) {
            Ok(claims)
                if !token::is_expired_at(&claims, self.inner.now())
                    && token::subject_id(&claims).is_some() =>
            {
                Some(claims)
            }
            _ => None,
        });

        match claims {
            Some(claims) => self.activate(&claims),
            None => self.state(),
        }
    }

    /// Patches the in-memory profile. `None` leaves a field as it is.
    pub fn update_user_info(&self, email: Option<String>, username: Option<String>) {
        // ---
        let mut user = self.inner.user();
        if let Some(email) = email {
            user.email = Some(email);
        }
        if let Some(username) = username {
            user.username = Some(username);
        }
    }

    /// Exchanges username and password for a credential and activates the
    /// session with it.
    ///
    /// # Errors
    /// - [`StorefrontError::RemoteUnavailable`] if the login call failed.
    /// - [`StorefrontError::MalformedCredential`] / `ExpiredCredential` if
    ///   the issued credential is unusable; nothing is persisted.
    /// - [`StorefrontError::Storage`] if the credential could not be stored.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> StorefrontResult<UserState> {
        // ---
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            expires_in_mins: LOGIN_EXPIRES_IN_MINS,
        };

        let response = match self.inner.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Login failed: {:#}", e);
                self.inner.notifier.notify(Notification::error("Login failed"));
                return Err(StorefrontError::remote(e));
            }
        };

        let claims = token::decode(&response.access_token)?;
        if token::is_expired_at(&claims, self.inner.now()) {
            return Err(StorefrontError::ExpiredCredential);
        }

        self.inner
            .tokens
            .persist(&response.access_token, Some(response.id))?;

        // The login response is authoritative for the id and profile fields.
        let mut user = UserState::from_claims(&claims);
        user.user_id = Some(response.id);
        user.is_authenticated = true;
        if response.email.is_some() {
            user.email = response.email;
        }
        if response.username.is_some() {
            user.username = response.username;
        }

        *self.inner.user() = user.clone();
        self.inner.publish(SessionState::Active);
        self.start_timer();

        tracing::info!("User {} logged in", response.id);
        Ok(user)
    }

    /// Clears the credential and user state, stops the timer and resets the cart.
    pub fn logout(&self) -> StorefrontResult<()> {
        // ---
        self.inner.stop_timer();
        self.inner.deactivate();
        let reset = self.inner.cart.lock().reset();
        tracing::info!("User logged out");
        reset
    }

    fn activate(&self, claims: &Claims) -> SessionState {
        // ---
        let user = UserState::from_claims(claims);
        if !user.is_authenticated {
            tracing::info!("Credential has no subject id; treating as logged out");
            self.inner.deactivate();
            return SessionState::Inactive;
        }

        *self.inner.user() = user;
        self.inner.publish(SessionState::Active);
        self.start_timer();
        SessionState::Active
    }

    fn start_timer(&self) {
        // ---
        let weak: Weak<GuardInner> = Arc::downgrade(&self.inner);
        let handle = spawn_interval(self.inner.check_interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.check_expiry(),
                    None => false,
                }
            }
        });

        // Replacing the previous handle aborts its task.
        *self.inner.timer() = Some(handle);
    }
}

impl GuardInner {
    // ---
    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn user(&self) -> MutexGuard<'_, UserState> {
        self.user.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: SessionState) {
        // ---
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn stop_timer(&self) {
        // ---
        if self.timer().take().is_some() {
            tracing::debug!("Session expiry timer stopped");
        }
    }

    /// The stored credential's claims, or `None` (with the credential removed)
    /// if it is missing or unusable.
    fn load_valid_claims(&self) -> Option<Claims> {
        // ---
        let credential = match self.tokens.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read credential: {}", e);
                return None;
            }
        };

        let claims = match token::decode(&credential) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Discarding stored credential: {}", e);
                return None;
            }
        };

        if token::is_expired_at(&claims, self.now()) {
            tracing::info!("Stored credential has expired");
            return None;
        }
        Some(claims)
    }

    /// Clears the credential and user state and publishes `Inactive`.
    fn deactivate(&self) {
        // ---
        if let Err(e) = self.tokens.clear() {
            tracing::error!("Failed to clear credential: {}", e);
        }
        *self.user() = UserState::default();
        self.publish(SessionState::Inactive);
    }

    /// One timer tick. Returns whether the timer should keep running.
    fn check_expiry(&self) -> bool {
        // ---
        if *self.state.borrow() != SessionState::Active {
            return false;
        }
        if !self.user().is_expired_at(self.now()) {
            return true;
        }

        tracing::info!("Session expired");
        self.metrics.record_session_expired();

        // The tick ends the interval itself by returning false.
        if let Some(handle) = self.timer().take() {
            handle.detach();
        }
        self.deactivate();
        if let Err(e) = self.cart.lock().reset() {
            tracing::error!("Failed to reset cart on expiry: {}", e);
        }
        false
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::cart::{create_shared_cart, item, remote_cart, CartCounter, CartSession, CART_CACHE_KEY};
    use crate::config::SyncConfig;
    use crate::domain::{LoginResponse, Storage, StoragePtr};
    use crate::infrastructure::{create_channel_notifier, create_memory_storage, create_noop_metrics};
    use crate::testing::MockApi;
    use crate::token::tests::make_token;
    use crate::token::{ACCESS_TOKEN_KEY, USER_ID_KEY};
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        guard: SessionGuard,
        api: Arc<MockApi>,
        durable: StoragePtr,
        session: StoragePtr,
        cart: SharedCart,
        now: Arc<AtomicI64>,
    }

    fn fixture() -> Fixture {
        fixture_with_interval(Duration::from_secs(60))
    }

    fn fixture_with_interval(check_interval: Duration) -> Fixture {
        // ---
        let api = Arc::new(MockApi::new());
        let durable = create_memory_storage();
        let session = create_memory_storage();
        let cart = create_shared_cart(session.clone(), CartCounter::new());
        let now = Arc::new(AtomicI64::new(NOW));
        let clock_now = Arc::clone(&now);
        let (notifier, _rx) = create_channel_notifier();

        let guard = SessionGuard::with_clock(
            TokenStore::new(durable.clone()),
            api.clone(),
            cart.clone(),
            notifier,
            create_noop_metrics().unwrap(),
            check_interval,
            Arc::new(move || clock_now.load(Ordering::SeqCst)),
        );

        Fixture {
            guard,
            api,
            durable,
            session,
            cart,
            now,
        }
    }

    fn token(exp: i64) -> String {
        make_token(&json!({"id": 7, "username": "emilys", "email": "e@x.com", "exp": exp}))
    }

    #[tokio::test(start_paused = true)]
    async fn no_credential_is_inactive_and_redirects_once() {
        // ---
        let fx = fixture();
        assert_eq!(fx.guard.gate(), None);

        assert_eq!(fx.guard.initialize(), SessionState::Inactive);
        assert_eq!(fx.guard.gate(), Some(GateDecision::RedirectToLogin));
        assert!(!fx.guard.is_timer_running());
        assert_eq!(fx.guard.user(), UserState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn valid_credential_activates_and_starts_timer() {
        // ---
        let fx = fixture();
        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 3600)).unwrap();

        assert_eq!(fx.guard.initialize(), SessionState::Active);
        assert_eq!(fx.guard.gate(), Some(GateDecision::Allow));
        assert!(fx.guard.is_timer_running());

        let user = fx.guard.user();
        assert_eq!(user.user_id, Some(7));
        assert_eq!(user.username.as_deref(), Some("emilys"));
        assert!(user.is_authenticated);
        assert_eq!(user.token_expiry, Some(NOW + 3600));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_or_malformed_credential_is_cleared() {
        // ---
        for stored in [token(NOW - 1), token(NOW), "not-a-token".to_string()] {
            let fx = fixture();
            fx.durable.set(ACCESS_TOKEN_KEY, &stored).unwrap();
            fx.durable.set(USER_ID_KEY, "7").unwrap();

            assert_eq!(fx.guard.initialize(), SessionState::Inactive);
            assert_eq!(fx.durable.get(ACCESS_TOKEN_KEY).unwrap(), None);
            assert_eq!(fx.durable.get(USER_ID_KEY).unwrap(), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn credential_without_subject_is_logged_out() {
        // ---
        let fx = fixture();
        let anonymous = make_token(&json!({"username": "ghost", "exp": NOW + 3600}));
        fx.durable.set(ACCESS_TOKEN_KEY, &anonymous).unwrap();

        assert_eq!(fx.guard.initialize(), SessionState::Inactive);
        assert!(!fx.guard.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_check_expires_session_and_resets_cart() {
        // ---
        let fx = fixture();
        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 90)).unwrap();
        fx.guard.initialize();
        fx.cart.lock().add_line(item(1, 100, 2)).unwrap();
        let mut states = fx.guard.subscribe();

        // First tick at +60s: still valid.
        fx.now.store(NOW + 60, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(fx.guard.is_active());

        // Second tick at +120s: past expiry.
        fx.now.store(NOW + 120, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fx.guard.state(), SessionState::Inactive);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Inactive);
        assert!(!fx.guard.is_timer_running());
        assert_eq!(fx.durable.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(fx.session.get(CART_CACHE_KEY).unwrap(), None);
        assert_eq!(fx.cart.lock().counter().get(), 0);

        // The gate decision made at initialization does not flip.
        assert_eq!(fx.guard.gate(), Some(GateDecision::Allow));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_check_interval_still_expires_the_session() {
        // ---
        let fx = fixture_with_interval(Duration::ZERO);
        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 100)).unwrap();
        assert_eq!(fx.guard.initialize(), SessionState::Active);

        fx.now.store(NOW + 5000, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(fx.guard.state(), SessionState::Inactive);
        assert!(!fx.guard.is_timer_running());
        assert_eq!(fx.durable.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn login_persists_credential_and_logout_tears_down() {
        // ---
        let fx = fixture();
        fx.guard.initialize();
        fx.api.set_login(LoginResponse {
            access_token: token(NOW + 1800),
            refresh_token: None,
            id: 7,
            username: Some("emilys".into()),
            email: Some("emily@x.com".into()),
        });

        let err = fx.guard.login("emilys", "wrong").await.expect_err("bad password");
        assert!(matches!(err, StorefrontError::RemoteUnavailable(_)));
        assert!(!fx.guard.is_active());

        let user = fx.guard.login("emilys", "emilyspass").await.unwrap();
        assert_eq!(user.user_id, Some(7));
        assert_eq!(user.email.as_deref(), Some("emily@x.com"));
        assert!(fx.guard.is_active());
        assert!(fx.guard.is_timer_running());
        assert_eq!(fx.durable.get(USER_ID_KEY).unwrap().as_deref(), Some("7"));

        fx.guard.update_user_info(None, Some("emily".into()));
        assert_eq!(fx.guard.user().username.as_deref(), Some("emily"));

        fx.cart.lock().add_line(item(3, 100, 1)).unwrap();
        fx.guard.logout().unwrap();
        assert!(!fx.guard.is_active());
        assert!(!fx.guard.is_timer_running());
        assert_eq!(fx.guard.user_id(), None);
        assert_eq!(fx.cart.lock().counter().get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_with_pending_cart_edit_sends_nothing() {
        // ---
        let fx = fixture();
        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 3600)).unwrap();
        fx.guard.initialize();
        fx.api.set_cart(remote_cart(77, vec![item(1, 100, 1), item(2, 100, 1)]));

        let (notifier, _rx) = create_channel_notifier();
        let cart = CartSession::mount(
            fx.api.clone(),
            fx.cart.clone(),
            notifier,
            create_noop_metrics().unwrap(),
            &SyncConfig::default(),
            7,
        )
        .await
        .unwrap();

        cart.increase(1).unwrap();
        fx.guard.logout().unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(fx.api.cart_writes().is_empty());
        assert!(cart.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_with_pending_cart_edit_sends_nothing() {
        // ---
        let fx = fixture();
        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 30)).unwrap();
        fx.guard.initialize();
        fx.api.set_cart(remote_cart(77, vec![item(1, 100, 1)]));

        let (notifier, _rx) = create_channel_notifier();
        let config = SyncConfig {
            debounce: Duration::from_secs(90),
        };
        let cart = CartSession::mount(
            fx.api.clone(),
            fx.cart.clone(),
            notifier,
            create_noop_metrics().unwrap(),
            &config,
            7,
        )
        .await
        .unwrap();

        // The edit is still waiting when the 60s check expires the session.
        cart.increase(1).unwrap();
        fx.now.store(NOW + 60, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(fx.guard.state(), SessionState::Inactive);
        assert!(fx.api.cart_writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_picks_up_a_credential_stored_elsewhere() {
        // ---
        let fx = fixture();
        assert_eq!(fx.guard.initialize(), SessionState::Inactive);

        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW - 5)).unwrap();
        assert_eq!(fx.guard.refresh_from_token(), SessionState::Inactive);
        assert!(fx.durable.get(ACCESS_TOKEN_KEY).unwrap().is_some());

        let anonymous = make_token(&json!({"username": "ghost", "exp": NOW + 3600}));
        fx.durable.set(ACCESS_TOKEN_KEY, &anonymous).unwrap();
        fx.durable.set(USER_ID_KEY, "7").unwrap();
        assert_eq!(fx.guard.refresh_from_token(), SessionState::Inactive);
        assert_eq!(fx.durable.get(ACCESS_TOKEN_KEY).unwrap(), Some(anonymous));
        assert_eq!(fx.durable.get(USER_ID_KEY).unwrap().as_deref(), Some("7"));
        assert!(!fx.guard.is_timer_running());

        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 60)).unwrap();
        assert_eq!(fx.guard.refresh_from_token(), SessionState::Active);
        assert_eq!(fx.guard.user_id(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_guard_stops_the_timer() {
        // ---
        let fx = fixture();
        fx.durable.set(ACCESS_TOKEN_KEY, &token(NOW + 10)).unwrap();
        fx.guard.initialize();

        let durable = fx.durable.clone();
        fx.now.store(NOW + 100, Ordering::SeqCst);
        drop(fx);

        tokio::time::sleep(Duration::from_secs(120)).await;
        // Nobody was left to expire the session.
        assert!(durable.get(ACCESS_TOKEN_KEY).unwrap().is_some());
    }
}
