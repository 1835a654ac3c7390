//! Identity capability consumed by the writer.
//!
//! Sign-in flows live outside this crate; they only need to hand over the
//! current session through [`IdentityProvider`].

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Resolves who is posting, synchronously.
pub trait IdentityProvider {
    /// Current user id, or `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<String>;

    /// Bearer token for row-level security on writes.
    fn access_token(&self) -> Option<String> {
        None
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn current_user_id(&self) -> Option<String> {
        (**self).current_user_id()
    }

    fn access_token(&self) -> Option<String> {
        (**self).access_token()
    }
}

impl<T: IdentityProvider> IdentityProvider for Option<T> {
    fn current_user_id(&self) -> Option<String> {
        self.as_ref().and_then(IdentityProvider::current_user_id)
    }

    fn access_token(&self) -> Option<String> {
        self.as_ref().and_then(IdentityProvider::access_token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Nobody is signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user_id(&self) -> Option<String> {
        None
    }
}

/// Fixed identity, e.g. from environment variables.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticIdentity {
    user_id: String,
    access_token: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token,
        }
    }
}

impl fmt::Debug for StaticIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticIdentity")
            .field("user_id", &self.user_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        Some(self.user_id.clone())
    }

    fn access_token(&self) -> Option<String> {
        self.access_token.clone()
    }
}

/// Session slot shared with whatever UI performs sign-in.
///
/// Expired sessions resolve to no identity.
#[derive(Clone, Default)]
pub struct SessionIdentity {
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn active_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|session| !session.is_expired())
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.active_session().map(|session| session.user.id)
    }

    fn access_token(&self) -> Option<String> {
        self.active_session().map(|session| session.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> AuthSession {
        AuthSession {
            access_token: "secret-access-token".to_string(),
            expires_at,
            user: AuthUser {
                id: "user-1".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("secret-access-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn static_identity_debug_redacts_token() {
        let identity = StaticIdentity::new("user-1", Some("secret".to_string()));
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains("secret"));
        assert_eq!(identity.current_user_id().as_deref(), Some("user-1"));
    }

    #[test]
    fn session_identity_tracks_sign_in_and_expiry() {
        let identity = SessionIdentity::new();
        assert_eq!(identity.current_user_id(), None);

        identity.set_session(Some(session(Utc::now().timestamp() + 3600)));
        assert_eq!(identity.current_user_id().as_deref(), Some("user-1"));
        assert_eq!(
            identity.access_token().as_deref(),
            Some("secret-access-token")
        );

        identity.set_session(Some(session(Utc::now().timestamp() - 10)));
        assert_eq!(identity.current_user_id(), None);
    }

    #[test]
    fn anonymous_has_no_identity() {
        assert_eq!(Anonymous.current_user_id(), None);
        assert_eq!(Arc::new(Anonymous).access_token(), None);
        assert_eq!(None::<StaticIdentity>.current_user_id(), None);
        assert_eq!(
            Some(StaticIdentity::new("user-1", None))
                .current_user_id()
                .as_deref(),
            Some("user-1")
        );
    }
}
