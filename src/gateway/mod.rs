//! Axum-based HTTP gateway: login/registration pages, Google sign-in, and the
//! per-user list.
//!
//! - Request body size limits (64KB max)
//! - Request timeouts (30s)
//! - Session cookies are HTTP-only and never re-issued on ordinary requests
//! - Every item route goes through the [`gate::CurrentUser`] extractor

pub mod gate;
pub mod pages;

use crate::auth::{
    AuthError, AuthService, Credentials, CredentialHasher, FederatedAuthenticator,
    GoogleProvider, IdentityProvider, LocalAuthenticator,
};
use crate::config::Config;
use crate::session::SessionManager;
use crate::store::{ItemId, ItemStore, SqliteStore, User};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use cookie::Cookie;
use gate::CurrentUser;
use rand::RngCore;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) for a hung storage or provider call
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Title shown above the list.
pub const LIST_TITLE: &str = "Today";

/// OAuth `state` byte length before hex encoding.
const OAUTH_STATE_BYTES: usize = 16;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionManager>,
    pub items: Arc<dyn ItemStore>,
}

impl AppState {
    /// Wire the auth core, session manager and item store over one SQLite store.
    pub fn new(
        store: Arc<SqliteStore>,
        provider: Arc<dyn IdentityProvider>,
        config: &Config,
    ) -> Result<Self> {
        let hasher = CredentialHasher::new(config.auth.bcrypt_cost);
        let auth = AuthService::new(
            LocalAuthenticator::new(store.clone(), hasher),
            FederatedAuthenticator::new(
                store.clone(),
                provider,
                config.auth.federated_links_local_accounts,
            ),
        );
        let sessions = SessionManager::new(store.clone(), store.clone(), &config.session)?;

        Ok(Self {
            auth: Arc::new(auth),
            sessions: Arc::new(sessions),
            items: store,
        })
    }
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/login", get(handle_login_page).post(handle_login))
        .route("/register", get(handle_register_page).post(handle_register))
        .route("/logout", get(handle_logout))
        .route("/auth/google", get(handle_google_start))
        .route("/auth/google/app", get(handle_google_callback))
        .route("/app", get(handle_app))
        .route("/add", post(handle_add))
        .route("/edit", post(handle_edit))
        .route("/delete", post(handle_delete))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let store = Arc::new(SqliteStore::open(&config.storage.database_path)?);
    tracing::info!(
        path = %config.storage.database_path.display(),
        "Storage initialized"
    );

    let provider: Arc<dyn IdentityProvider> = Arc::new(GoogleProvider::new(&config.google)?);
    let state = AppState::new(store, provider, &config)?;

    // Periodic purge of expired sessions
    let sessions_for_purge = Arc::clone(&state.sessions);
    let purge_every = Duration::from_secs(config.session.purge_interval_secs.max(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            match sessions_for_purge.purge_expired() {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Purged expired sessions"),
                Err(e) => tracing::warn!("Failed to purge expired sessions: {e}"),
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// ERROR OUTCOMES
// ══════════════════════════════════════════════════════════════════════════════

/// Generic 500; the detail goes to the log only.
pub(crate) fn server_fault(context: &str, err: &AuthError) -> Response {
    tracing::error!(context, error = %err, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DuplicateEmail => Redirect::to("/").into_response(),
            ref e if e.is_client_failure() => Redirect::to(gate::LOGIN_PATH).into_response(),
            ref e => server_fault("auth", e),
        }
    }
}

fn redirect_with_cookies(to: &str, cookies: &[Cookie<'static>]) -> Response {
    let headers: Vec<_> = cookies
        .iter()
        .map(|c| (header::SET_COOKIE, c.to_string()))
        .collect();
    (AppendHeaders(headers), Redirect::to(to)).into_response()
}

/// Establish a session for `user` and send the browser to the list.
fn sign_in(state: &AppState, user: &User, extra: &[Cookie<'static>]) -> Response {
    match state.sessions.establish(user) {
        Ok(issued) => {
            let mut cookies = vec![state.sessions.cookies().session_cookie(&issued.cookie_value)];
            cookies.extend_from_slice(extra);
            redirect_with_cookies("/app", &cookies)
        }
        Err(e) => server_fault("session establish", &e),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health: always public
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /
async fn handle_home() -> Html<String> {
    Html(pages::render_home())
}

/// GET /login
async fn handle_login_page() -> Html<String> {
    Html(pages::render_login_page())
}

/// GET /register
async fn handle_register_page() -> Html<String> {
    Html(pages::render_register_page())
}

/// Form data for login and registration (field names match the HTML forms).
#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

/// POST /login: local strategy
async fn handle_login(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    let credentials = Credentials::Local {
        email: form.username,
        password: form.password,
    };
    match state.auth.authenticate(credentials).await {
        Ok(user) => sign_in(&state, &user, &[]),
        Err(e) => e.into_response(),
    }
}

/// POST /register: create the account, then log it in
async fn handle_register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match state.auth.register(&form.username, &form.password).await {
        Ok(user) => sign_in(&state, &user, &[]),
        Err(AuthError::InvalidInput(reason)) => {
            tracing::info!(%reason, "Registration rejected");
            Redirect::to("/register").into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /logout: terminate the session before redirecting
async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(value) = gate::session_cookie_value(&state, &headers) {
        if let Err(e) = state.sessions.terminate(&value) {
            return server_fault("logout", &e);
        }
    }
    redirect_with_cookies("/", &[state.sessions.cookies().cleared_session_cookie()])
}

/// GET /auth/google: redirect to the provider with a fresh `state`
async fn handle_google_start(State(state): State<AppState>) -> Response {
    let mut bytes = [0u8; OAUTH_STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let oauth_state = hex::encode(bytes);

    match state.auth.provider().authorization_url(&oauth_state) {
        Ok(url) => redirect_with_cookies(
            &url,
            &[state.sessions.cookies().oauth_state_cookie(&oauth_state)],
        ),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/google/app: provider callback
async fn handle_google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let cookies = state.sessions.cookies();
    let clear_state = cookies.cleared_oauth_state_cookie();

    if let Some(error) = query.error.as_deref() {
        tracing::info!(error, "Provider denied sign-in");
        return redirect_with_cookies(gate::LOGIN_PATH, &[clear_state]);
    }

    let expected = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            crate::session::transport::find_cookie(
                raw,
                crate::session::transport::OAUTH_STATE_COOKIE,
            )
        });
    let state_ok = match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(got)) if !expected.is_empty() => {
            constant_time_eq(expected.as_bytes(), got.as_bytes())
        }
        _ => false,
    };
    if !state_ok {
        tracing::warn!("OAuth callback with missing or mismatched state");
        return redirect_with_cookies(gate::LOGIN_PATH, &[clear_state]);
    }

    let credentials = Credentials::Federated {
        code: query.code.unwrap_or_default(),
    };
    match state.auth.authenticate(credentials).await {
        Ok(user) => sign_in(&state, &user, &[clear_state]),
        Err(e) if e.is_client_failure() => redirect_with_cookies(gate::LOGIN_PATH, &[clear_state]),
        Err(e) => e.into_response(),
    }
}

/// GET /app: the signed-in user's list
async fn handle_app(State(state): State<AppState>, CurrentUser(principal): CurrentUser) -> Response {
    match state.items.list_items_by_user(principal.user_id) {
        Ok(items) => Html(pages::render_list_page(LIST_TITLE, &principal.email, &items))
            .into_response(),
        Err(e) => server_fault("list items", &AuthError::Storage(e)),
    }
}

#[derive(Deserialize)]
pub struct AddItemForm {
    #[serde(rename = "newItem")]
    pub new_item: String,
}

/// POST /add
async fn handle_add(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Form(form): Form<AddItemForm>,
) -> Response {
    let title = form.new_item.trim();
    if title.is_empty() {
        return Redirect::to("/app").into_response();
    }
    match state.items.insert_item(title, principal.user_id) {
        Ok(item) => {
            tracing::debug!(item_id = item.id, user_id = principal.user_id, "Item added");
            Redirect::to("/app").into_response()
        }
        Err(e) => server_fault("add item", &AuthError::Storage(e)),
    }
}

#[derive(Deserialize)]
pub struct EditItemForm {
    #[serde(rename = "updatedItemId")]
    pub item_id: ItemId,
    #[serde(rename = "updatedItemTitle")]
    pub title: String,
}

/// POST /edit: owner-scoped title update
async fn handle_edit(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Form(form): Form<EditItemForm>,
) -> Response {
    let title = form.title.trim();
    if title.is_empty() {
        return Redirect::to("/app").into_response();
    }
    match state
        .items
        .update_item_title(form.item_id, principal.user_id, title)
    {
        Ok(true) => Redirect::to("/app").into_response(),
        Ok(false) => {
            tracing::warn!(
                item_id = form.item_id,
                user_id = principal.user_id,
                "Edit of missing or foreign item ignored"
            );
            Redirect::to("/app").into_response()
        }
        Err(e) => server_fault("edit item", &AuthError::Storage(e)),
    }
}

#[derive(Deserialize)]
pub struct DeleteItemForm {
    #[serde(rename = "deleteItemId")]
    pub item_id: ItemId,
}

/// POST /delete: owner-scoped delete
async fn handle_delete(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Form(form): Form<DeleteItemForm>,
) -> Response {
    match state.items.delete_item(form.item_id, principal.user_id) {
        Ok(true) => Redirect::to("/app").into_response(),
        Ok(false) => {
            tracing::warn!(
                item_id = form.item_id,
                user_id = principal.user_id,
                "Delete of missing or foreign item ignored"
            );
            Redirect::to("/app").into_response()
        }
        Err(e) => server_fault("delete item", &AuthError::Storage(e)),
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
