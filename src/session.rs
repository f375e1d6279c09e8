use crate::auth::generate_token;
use crate::models::{AuthenticatedIdentity, User};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct Session {
    identity: AuthenticatedIdentity,
    expires_at: DateTime<Utc>,
}

/// Server-side session table keyed by opaque token.
///
/// A token maps to the identity captured at login, including the admin flag,
/// until it is revoked or its fixed TTL runs out. There is no per-user session
/// limit.
pub struct SessionAuthority {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionAuthority {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User) -> String {
        self.issue_at(user, Utc::now())
    }

    fn issue_at(&self, user: &User, now: DateTime<Utc>) -> String {
        let token = generate_token();
        self.sessions.insert(
            token.clone(),
            Session {
                identity: AuthenticatedIdentity::from(user),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<AuthenticatedIdentity> {
        self.resolve_at(token, Utc::now())
    }

    fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Option<AuthenticatedIdentity> {
        if let Some(session) = self.sessions.get(token) {
            if session.expires_at > now {
                return Some(session.identity.clone());
            }
        }

        self.sessions.remove_if(token, |_, session| session.expires_at <= now);
        None
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops every expired session and returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionAuthority {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }
}
