//! Token lifecycle and single-flight refresh
//!
//! [`AuthCoordinator`] is the only owner of the token pair. It hands out the
//! current access token, exchanges the refresh token when asked, and makes
//! sure concurrent refresh requests share one in-flight exchange.

use super::store::{TokenPair, TokenStore};
use crate::error::AuthError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Exchanges a refresh token for a new token pair
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform the exchange. Must not consult or mutate any token store.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, AuthError>>>;

#[derive(Default)]
struct AuthState {
    tokens: Option<TokenPair>,
    /// Bumped by every login, logout, and completed refresh
    generation: u64,
    in_flight: Option<SharedRefresh>,
}

impl AuthState {
    fn replace(&mut self, tokens: Option<TokenPair>) {
        self.tokens = tokens;
        self.generation += 1;
    }
}

/// Owns the token pair and coordinates refreshes
pub struct AuthCoordinator {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: Arc<Mutex<AuthState>>,
    /// Serializes store writes with the state change they belong to
    writes: Arc<Mutex<()>>,
}

impl AuthCoordinator {
    /// Create a coordinator over `store`, refreshing through `refresher`
    pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            state: Arc::new(Mutex::new(AuthState::default())),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Current access token, loading it from the store if none is held in memory.
    ///
    /// Storage failures are logged and reported as "no token".
    pub fn current_token(&self) -> Option<String> {
        let generation = {
            let state = lock(&self.state);
            if let Some(pair) = &state.tokens {
                return Some(pair.access_token.clone());
            }
            state.generation
        };

        let loaded = load_or_warn(self.store.as_ref());
        let mut state = lock(&self.state);
        if state.generation != generation {
            // The store read may predate a login, logout, or refresh
            return state.tokens.as_ref().map(|p| p.access_token.clone());
        }
        let pair = state.tokens.get_or_insert(loaded?);
        Some(pair.access_token.clone())
    }

    /// Whether an access token is available
    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    /// Adopt a freshly issued token pair (successful login)
    pub fn login(&self, pair: TokenPair) {
        let _write = lock_writes(&self.writes);
        if let Err(e) = self.store.save(&pair) {
            warn!(error = %e, "Failed to persist tokens; keeping them in memory only");
        }
        lock(&self.state).replace(Some(pair));
        info!("Credentials stored");
    }

    /// Drop the in-memory and persisted token pair (logout)
    pub fn clear(&self) {
        let _write = lock_writes(&self.writes);
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted tokens");
        }
        lock(&self.state).replace(None);
        info!("Credentials cleared");
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// If a refresh is already running the caller joins it, so every caller in
    /// the same window observes the same token or the same error. The shared
    /// handle is released before waiters are woken, so a later call starts a
    /// fresh exchange. On failure the token pair is cleared. If a login or
    /// logout lands while the exchange is running, its result is discarded and
    /// callers get [`AuthError::Superseded`].
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let shared = {
            let mut state = lock(&self.state);
            match &state.in_flight {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let operation = run_refresh(
                        Arc::clone(&self.store),
                        Arc::clone(&self.refresher),
                        Arc::clone(&self.state),
                        Arc::clone(&self.writes),
                    )
                    .boxed()
                    .shared();
                    state.in_flight = Some(operation.clone());
                    operation
                }
            }
        };

        shared.await
    }
}

async fn run_refresh(
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: Arc<Mutex<AuthState>>,
    writes: Arc<Mutex<()>>,
) -> Result<String, AuthError> {
    let (held, generation) = {
        let state = lock(&state);
        let held = state.tokens.as_ref().map(|p| p.refresh_token.clone());
        (held, state.generation)
    };
    let refresh_token = held.or_else(|| load_or_warn(store.as_ref()).map(|p| p.refresh_token));

    debug!("Refreshing access token");
    let outcome = match refresh_token {
        Some(token) => refresher.refresh(&token).await,
        None => Err(AuthError::NoRefreshToken),
    };

    let _write = lock_writes(&writes);
    if lock(&state).generation != generation {
        lock(&state).in_flight = None;
        warn!("Credentials changed during token refresh; discarding the result");
        return Err(AuthError::Superseded);
    }

    // The state lock is not held here; the store may do blocking I/O
    let persisted = match &outcome {
        Ok(pair) => store.save(pair),
        Err(_) => store.clear(),
    };
    if let Err(e) = persisted {
        warn!(error = %e, "Failed to persist token refresh outcome");
    }

    let mut state = lock(&state);
    state.in_flight = None;
    match outcome {
        Ok(pair) => {
            let access = pair.access_token.clone();
            state.replace(Some(pair));
            info!("Access token refreshed");
            Ok(access)
        }
        Err(err) => {
            state.replace(None);
            warn!(error = %err, "Token refresh failed; credentials cleared");
            Err(err)
        }
    }
}

fn lock(state: &Mutex<AuthState>) -> MutexGuard<'_, AuthState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_writes(writes: &Mutex<()>) -> MutexGuard<'_, ()> {
    writes.lock().unwrap_or_else(PoisonError::into_inner)
}

fn load_or_warn(store: &dyn TokenStore) -> Option<TokenPair> {
    match store.load() {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "Failed to load persisted tokens; continuing unauthenticated");
            None
        }
    }
}
