//! Access policy: resolves the session cookie into an identity and gates
//! operations on it.
//!
//! Handlers take one of the extractors below instead of reading request state:
//! - [`CurrentIdentity`] never rejects and yields `Option<AuthenticatedIdentity>`
//! - [`Authenticated`] rejects anonymous callers with 401
//! - [`Admin`] additionally rejects non-admin callers with 403

use crate::error::AppError;
use crate::models::AuthenticatedIdentity;
use crate::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Key, SignedCookieJar};

pub const SESSION_COOKIE: &str = "gallery_session";

pub fn require_authenticated(
    identity: Option<AuthenticatedIdentity>,
) -> Result<AuthenticatedIdentity, AppError> {
    identity.ok_or(AppError::Unauthenticated)
}

pub fn require_admin(
    identity: Option<AuthenticatedIdentity>,
) -> Result<AuthenticatedIdentity, AppError> {
    let identity = require_authenticated(identity)?;
    if !identity.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(identity)
}

/// Session token carried by the signed cookie, if any.
pub fn session_token(jar: &SignedCookieJar<Key>) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<AuthenticatedIdentity>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::<Key>::from_request_parts(parts, state).await?;
        let identity = session_token(&jar).and_then(|token| state.sessions.resolve(&token));
        Ok(Self(identity))
    }
}

#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthenticatedIdentity);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state)
            .await
            .map_err(|never| -> AppError { match never {} })?;
        require_authenticated(identity).map(Self)
    }
}

#[derive(Debug, Clone)]
pub struct Admin(pub AuthenticatedIdentity);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state)
            .await
            .map_err(|never| -> AppError { match never {} })?;
        require_admin(identity).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::storage::LocalStorage;
    use crate::StateSettings;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use axum_extra::extract::cookie::Cookie;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn whoami(Authenticated(identity): Authenticated) -> Json<AuthenticatedIdentity> {
        Json(identity)
    }

    async fn guarded_router() -> (Router, AppState, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::open(dir.path()).await.unwrap());
        let settings = StateSettings {
            session_secret: "policy-test-secret".to_string(),
            session_ttl: chrono::Duration::hours(1),
            cookie_secure: false,
            bcrypt_cost: crate::auth::BCRYPT_MIN_COST,
        };
        let state = AppState::new(Arc::new(MemoryStore::new()), storage, &settings);
        let router = Router::new()
            .route("/whoami", get(whoami))
            .with_state(state.clone());
        (router, state, dir)
    }

    /// Signs a session cookie the same way the login handler does.
    fn signed_cookie(state: &AppState, token: String) -> String {
        let jar = SignedCookieJar::new(state.cookie_key.clone())
            .add(Cookie::new(SESSION_COOKIE, token));
        let response = (jar, ()).into_response();
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_authenticated_extractor() {
        let (router, state, _dir) = guarded_router().await;

        let anonymous = router
            .clone()
            .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let user = state.credentials.create_user("alice", "pw").await.unwrap();
        let cookie = signed_cookie(&state, state.sessions.issue(&user));
        let response = router
            .oneshot(
                Request::get("/whoami")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn identity(is_admin: bool) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            user_id: 1,
            username: "alice".to_string(),
            is_admin,
        }
    }

    #[test]
    fn test_require_authenticated() {
        assert!(matches!(
            require_authenticated(None),
            Err(AppError::Unauthenticated)
        ));
        assert_eq!(
            require_authenticated(Some(identity(false))).unwrap(),
            identity(false)
        );
    }

    #[test]
    fn test_require_admin() {
        assert!(matches!(require_admin(None), Err(AppError::Unauthenticated)));
        assert!(matches!(
            require_admin(Some(identity(false))),
            Err(AppError::Forbidden)
        ));
        assert!(require_admin(Some(identity(true))).is_ok());
    }
}
