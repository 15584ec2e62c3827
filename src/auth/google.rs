//! Google sign-in over the OAuth 2.0 authorization-code flow.
//!
//! 1. `GET /auth/google` redirects to [`GoogleProvider::authorization_url`]
//! 2. Google calls back on the pre-registered callback URL with `code` + `state`
//! 3. [`GoogleProvider::exchange`] trades the code for an access token and fetches
//!    the OpenID userinfo profile

use super::federated::{FederatedProfile, IdentityProvider};
use super::{AuthError, AuthResult};
use crate::config::GoogleConfig;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Requested scopes: enough to receive the account email.
const SCOPES: &str = "openid profile email";

/// Upper bound for each provider round trip.
const HTTP_TIMEOUT_SECS: u64 = 15;

/// Provider endpoints; overridable so tests can point at a local mock server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.into(),
            token_url: TOKEN_URL.into(),
            userinfo_url: USERINFO_URL.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google identity provider.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    callback_url: String,
    endpoints: GoogleEndpoints,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: &GoogleConfig) -> AuthResult<Self> {
        Self::with_endpoints(config, GoogleEndpoints::default())
    }

    pub fn with_endpoints(config: &GoogleConfig, endpoints: GoogleEndpoints) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::AuthProvider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            endpoints,
            http,
        })
    }

    async fn fetch_access_token(&self, code: &str) -> AuthResult<String> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::AuthProvider(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::AuthProvider(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::AuthProvider(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<FederatedProfile> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::AuthProvider(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::AuthProvider(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::AuthProvider(format!("invalid userinfo response: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::AuthProvider(format!("invalid authorize URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> AuthResult<FederatedProfile> {
        let access_token = self.fetch_access_token(code).await?;
        let profile = self.fetch_profile(&access_token).await?;
        tracing::debug!(
            subject = profile.subject.as_deref().unwrap_or(""),
            "Fetched Google profile"
        );
        Ok(profile)
    }
}
