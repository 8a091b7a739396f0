//! Session and cron authentication.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use db::models::{
    cleaner::Cleaner,
    owner::Owner,
    session::Session,
    user::{User, UserRole},
};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use utils::text::hash_token;

use crate::{error::ApiError, state::AppState};

pub const SESSION_COOKIE: &str = "session";

/// `Set-Cookie` value for a freshly issued session token.
pub fn session_cookie(token: &str, ttl: chrono::Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        ttl.num_seconds()
    )
}

async fn session_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let jar = CookieJar::from_headers(headers);
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };
    if token.is_empty() {
        return Ok(None);
    }
    Ok(Session::find_user_by_token_hash(state.pool(), &hash_token(&token), Utc::now()).await?)
}

/// The logged-in user; 401 without a live session.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_user(state, &parts.headers)
            .await?
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// The logged-in user if there is one. Public endpoints use this.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_user(state, &parts.headers).await?))
    }
}

/// Owner or cleaner together with their profile row. Admins and users
/// without a profile get 403.
pub enum DashboardUser {
    Owner { user: User, owner: Owner },
    Cleaner { user: User, cleaner: Cleaner },
}

impl DashboardUser {
    pub fn user(&self) -> &User {
        match self {
            DashboardUser::Owner { user, .. } | DashboardUser::Cleaner { user, .. } => user,
        }
    }

    pub fn owner(&self) -> Result<&Owner, ApiError> {
        match self {
            DashboardUser::Owner { owner, .. } => Ok(owner),
            DashboardUser::Cleaner { .. } => Err(ApiError::Forbidden),
        }
    }

    pub fn cleaner(&self) -> Result<&Cleaner, ApiError> {
        match self {
            DashboardUser::Cleaner { cleaner, .. } => Ok(cleaner),
            DashboardUser::Owner { .. } => Err(ApiError::Forbidden),
        }
    }
}

impl FromRequestParts<AppState> for DashboardUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        match user.role {
            UserRole::Owner => {
                let owner = Owner::find_by_user_id(state.pool(), user.id)
                    .await?
                    .ok_or(ApiError::Forbidden)?;
                Ok(DashboardUser::Owner { user, owner })
            }
            UserRole::Cleaner => {
                let cleaner = Cleaner::find_by_user_id(state.pool(), user.id)
                    .await?
                    .ok_or(ApiError::Forbidden)?;
                Ok(DashboardUser::Cleaner { user, cleaner })
            }
            UserRole::Admin => Err(ApiError::Forbidden),
        }
    }
}

/// Admin gate for `/api/admin`. The admin `User` is put in the request
/// extensions for the handlers.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = session_user(&state, req.headers())
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if user.role != UserRole::Admin {
        debug!(user_id = %user.id, role = %user.role, "Admin route refused");
        return Err(ApiError::Forbidden);
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// True when the request carries the cron bearer secret or the trusted
/// scheduler header.
/// Compares digests so neither the secret's length nor its prefix leaks
/// through timing.
fn secret_matches(presented: &str, secret: &str) -> bool {
    hash_token(presented).as_bytes().ct_eq(hash_token(secret).as_bytes()).into()
}

pub fn is_cron_request(state: &AppState, headers: &HeaderMap) -> bool {
    if let Some(secret) = &state.config.cron_secret {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        if bearer.is_some_and(|token| secret_matches(token, secret.expose_secret())) {
            return true;
        }
    }

    state
        .config
        .cron_trusted_header
        .as_deref()
        .and_then(|name| headers.get(name))
        .is_some_and(|v| v.as_bytes() == b"1")
}

pub async fn require_cron(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_cron_request(&state, req.headers()) {
        warn!(path = %req.uri().path(), "Unauthorized cron request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}
