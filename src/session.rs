//! Authentication/session state shared by the client and every view.
//!
//! - `SessionStore` is a cheap handle (`Rc`) around one owned state; clones
//!   observe and mutate the same session.
//! - State changes are published as `SessionSnapshot`s to subscribers.
//! - Tokens are never decoded. A rehydrated session is trusted until the
//!   first call fails with 401.

use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::Rc;

use crate::client::ApiError;
use crate::models::agri::{RefreshedToken, Role, TokenPair, User, UserProfile};
use crate::observable::{Observable, Subscription};
use crate::storage::{SessionStorage, StorageError};

/// Storage keys; always cleared together.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER: &str = "user";
}

/// Unauthenticated auth endpoints the session needs. Implemented by `AgriClient`.
#[cfg_attr(test, mockall::automock)]
pub trait AuthBackend {
    fn obtain_token_pair(&self, username: &str, password: &str) -> Result<TokenPair, ApiError>;
    fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError>;
    fn refresh_access(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("session storage: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SessionError::Api(e) if e.is_auth_failure())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub logged_in: bool,
    pub role: Option<Role>,
    pub user: Option<User>,
}

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
    logged_in: bool,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            logged_in: self.logged_in,
            role: self.user.as_ref().map(|u| u.role),
            user: self.user.clone(),
        }
    }

    fn is_anonymous(&self) -> bool {
        !self.logged_in && self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

struct Inner {
    state: RefCell<SessionState>,
    storage: Rc<dyn SessionStorage>,
    changes: Observable<SessionSnapshot>,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Rc<Inner>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl SessionStore {
    /// Restore the session from storage without any network call.
    pub fn rehydrate(storage: Rc<dyn SessionStorage>) -> Self {
        let access_token = non_empty(storage.get(keys::ACCESS_TOKEN));
        let refresh_token = non_empty(storage.get(keys::REFRESH_TOKEN));
        let user = storage
            .get(keys::USER)
            .and_then(|raw| match serde_json::from_str::<User>(&raw) {
                Ok(u) => Some(u),
                Err(e) => {
                    warn!("Ignoring unreadable persisted user: {}", e);
                    None
                }
            });
        let logged_in = access_token.is_some() && user.is_some();
        if logged_in {
            debug!("Session rehydrated from storage");
        }
        SessionStore {
            inner: Rc::new(Inner {
                state: RefCell::new(SessionState {
                    access_token,
                    refresh_token,
                    user,
                    logged_in,
                }),
                storage,
                changes: Observable::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().snapshot()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.state.borrow().logged_in
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.state.borrow().user.as_ref().map(|u| u.role)
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token.clone()
    }

    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe(&self, listener: impl Fn(&SessionSnapshot) + 'static) -> Subscription {
        self.inner.changes.subscribe(listener)
    }

    fn publish(&self) {
        let snap = self.snapshot();
        self.inner.changes.emit(&snap);
    }

    fn clear_storage(&self) {
        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
            if let Err(e) = self.inner.storage.remove(key) {
                warn!("Clearing session key {} failed: {}", key, e);
            }
        }
    }

    /// Credentials → token pair → profile. The session only becomes logged in
    /// once the profile fetch succeeds; any failure leaves it logged out with
    /// nothing persisted.
    pub fn login(&self, auth: &dyn AuthBackend, username: &str, password: &str) -> Result<User, SessionError> {
        match self.try_login(auth, username, password) {
            Ok(user) => {
                info!("Logged in as {} ({})", user.username, user.role.as_str());
                self.publish();
                Ok(user)
            }
            Err(e) => {
                warn!("Login for {} failed: {}", username, e);
                self.logout();
                Err(e)
            }
        }
    }

    fn try_login(&self, auth: &dyn AuthBackend, username: &str, password: &str) -> Result<User, SessionError> {
        let pair = auth.obtain_token_pair(username, password)?;
        if pair.access.trim().is_empty() {
            return Err(ApiError::Decode("login returned an empty access token".into()).into());
        }
        let storage = &self.inner.storage;
        storage.set(keys::ACCESS_TOKEN, &pair.access)?;
        storage.set(keys::REFRESH_TOKEN, &pair.refresh)?;

        let user = User::from(auth.fetch_profile(&pair.access)?);
        storage.set(keys::USER, &serde_json::to_string(&user).map_err(StorageError::from)?)?;

        let mut s = self.inner.state.borrow_mut();
        s.access_token = Some(pair.access);
        s.refresh_token = Some(pair.refresh);
        s.user = Some(user.clone());
        s.logged_in = true;
        Ok(user)
    }

    /// Mint a new access token. Never retried: any failure ends the session.
    pub fn refresh_token(&self, auth: &dyn AuthBackend) -> Result<(), SessionError> {
        let stored = self.inner.state.borrow().refresh_token.clone();
        let Some(refresh) = stored else {
            info!("No refresh token available; logging out");
            self.logout();
            return Err(ApiError::MissingAuth.into());
        };

        let refreshed = match auth.refresh_access(&refresh) {
            Ok(t) if !t.access.trim().is_empty() => t,
            Ok(_) => {
                self.logout();
                return Err(ApiError::Decode("refresh returned an empty access token".into()).into());
            }
            Err(e) => {
                warn!("Token refresh failed, session expired: {}", e);
                self.logout();
                return Err(e.into());
            }
        };

        let storage = &self.inner.storage;
        let persisted = storage
            .set(keys::ACCESS_TOKEN, &refreshed.access)
            .and_then(|_| match refreshed.refresh.as_deref() {
                Some(rotated) => storage.set(keys::REFRESH_TOKEN, rotated),
                None => Ok(()),
            });
        if let Err(e) = persisted {
            // half-written tokens must not outlive this call
            warn!("Persisting refreshed tokens failed, ending session: {}", e);
            self.logout();
            return Err(e.into());
        }
        {
            let mut s = self.inner.state.borrow_mut();
            s.access_token = Some(refreshed.access);
            if let Some(rotated) = refreshed.refresh {
                s.refresh_token = Some(rotated);
            }
        }
        debug!("Access token refreshed");
        self.publish();
        Ok(())
    }

    /// Re-fetch the profile with the current token and recompute the role.
    pub fn refresh_profile(&self, auth: &dyn AuthBackend) -> Result<User, SessionError> {
        let token = self.access_token().ok_or(ApiError::MissingAuth);
        let profile = match token.and_then(|t| auth.fetch_profile(&t)) {
            Ok(p) => p,
            Err(e) => {
                if e.is_auth_failure() {
                    self.logout();
                }
                return Err(e.into());
            }
        };
        let user = User::from(profile);
        self.inner
            .storage
            .set(keys::USER, &serde_json::to_string(&user).map_err(StorageError::from)?)?;
        self.inner.state.borrow_mut().user = Some(user.clone());
        self.publish();
        Ok(user)
    }

    /// Clear persisted and in-memory session state. Safe to call repeatedly;
    /// observers are only notified when something actually changed.
    pub fn logout(&self) {
        if self.reset() {
            info!("Logged out");
            self.publish();
        }
    }

    fn reset(&self) -> bool {
        self.clear_storage();
        let mut s = self.inner.state.borrow_mut();
        if s.is_anonymous() {
            return false;
        }
        *s = SessionState::default();
        true
    }

    /// Force a logout when `result` carries an authorization failure.
    pub fn check_auth<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result
            && e.is_auth_failure()
        {
            warn!("Authorization failed ({}); forcing logout", e);
            self.logout();
        }
        result
    }
}
