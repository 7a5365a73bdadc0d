use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::token_store::TokenStore;
use crate::auth::Claims;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Client views. Only `Notes` needs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Notes,
}

impl Route {
    /// Unknown and empty paths land on the note list.
    fn from_path(path: &str) -> Route {
        match path.trim_matches('/') {
            "login" => Route::Login,
            "register" => Route::Register,
            _ => Route::Notes,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Notes => "/notes",
        }
    }

    pub fn is_protected(self) -> bool {
        matches!(self, Route::Notes)
    }
}

/// Structural check only: the token decodes and has not expired yet.
/// The signature can only be checked by the server.
pub fn looks_valid(token: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.leeway = 0;
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).is_ok()
}

type LogoutHook = Box<dyn Fn() + Send + Sync>;

/// Two-state session machine shared by everything on the client that talks
/// to the API. Every transition bumps the epoch.
pub struct SessionGuard {
    store: Arc<dyn TokenStore>,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    logout_hooks: Mutex<Vec<LogoutHook>>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let initial = match store.load() {
            Ok(Some(token)) if looks_valid(&token) => SessionState::Authenticated,
            Ok(Some(_)) => {
                debug!("discarding stale session marker");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to clear stale session marker");
                }
                SessionState::Anonymous
            }
            Ok(None) => SessionState::Anonymous,
            Err(e) => {
                warn!(error = %e, "failed to read session marker");
                SessionState::Anonymous
            }
        };
        let (state, _) = watch::channel(initial);
        Self {
            store,
            state,
            epoch: AtomicU64::new(0),
            logout_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// The token to attach, if the session is authenticated.
    pub fn token(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to read session token");
                None
            }
        }
    }

    pub fn sign_in(&self, token: &str) -> anyhow::Result<()> {
        self.store.save(token)?;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::Authenticated);
        info!("signed in");
        Ok(())
    }

    /// Clears the token, moves to `Anonymous` and runs the logout listeners
    /// before returning. The server keeps honouring the token until it expires.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear session token");
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::Anonymous);
        info!("signed out");

        let hooks = self.logout_hooks.lock().unwrap_or_else(|e| e.into_inner());
        for hook in hooks.iter() {
            hook();
        }
    }

    /// Listeners must not register further listeners from inside the call.
    pub fn on_logout(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.logout_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(hook));
    }

    /// Where navigation to a raw path such as `/notes` or `` actually ends up.
    pub fn navigate(&self, path: &str) -> Route {
        self.resolve(Route::from_path(path))
    }

    /// Where navigation to `route` actually ends up.
    pub fn resolve(&self, route: Route) -> Route {
        if route.is_protected() && !self.is_authenticated() {
            debug!(requested = route.path(), "redirecting to login");
            return Route::Login;
        }
        route
    }
}
