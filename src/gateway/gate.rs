//! Authorization gate for protected routes.
//!
//! [`CurrentUser`] is the only source of the acting user id: handlers take it as
//! an extractor and pass `principal.user_id` into every item query.

use super::{server_fault, AppState};
use crate::auth::AuthResult;
use crate::session::{transport::find_cookie, Principal};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};

/// Login entry point unauthenticated requests are sent to.
pub const LOGIN_PATH: &str = "/login";

/// The principal of an authenticated request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match require_authenticated(state, &parts.headers) {
            Ok(Some(principal)) => Ok(Self(principal)),
            Ok(None) => Err(Redirect::to(LOGIN_PATH).into_response()),
            Err(e) => Err(server_fault("session lookup", &e)),
        }
    }
}

/// Read the raw session cookie value from the request headers.
pub fn session_cookie_value(state: &AppState, headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| find_cookie(raw, &state.sessions.cookies().name))
}

/// Resolve the request's session to a principal; `Ok(None)` means unauthenticated.
pub fn require_authenticated(state: &AppState, headers: &HeaderMap) -> AuthResult<Option<Principal>> {
    match session_cookie_value(state, headers) {
        Some(value) => state.sessions.resolve(&value),
        None => Ok(None),
    }
}
