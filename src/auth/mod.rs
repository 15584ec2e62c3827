//! User authentication: local email/password and federated (Google) sign-in.
//!
//! Provides:
//! - Password hashing with bcrypt (random salt, configurable cost)
//! - Local login and registration against the identity store
//! - Federated login with auto-provisioning of federated-only accounts
//! - A single dispatch point, [`AuthService::authenticate`], over both strategies
//!
//! ## Design Decisions
//! - Strategies are a closed set, modelled as the [`Credentials`] enum rather than
//!   runtime-registered plugins.
//! - Federated-only accounts store a sentinel instead of a password hash and can
//!   never pass local verification.

pub mod error;
pub mod federated;
pub mod google;
pub mod hasher;
pub mod local;

pub use error::{AuthError, AuthResult};
pub use federated::{FederatedAuthenticator, FederatedProfile, IdentityProvider};
pub use google::GoogleProvider;
pub use hasher::CredentialHasher;
pub use local::LocalAuthenticator;

use crate::store::User;

/// A credential submission for one of the supported strategies.
pub enum Credentials {
    /// Email + password posted from the login form.
    Local { email: String, password: String },
    /// Authorization code returned to the provider callback.
    Federated { code: String },
}

impl Credentials {
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Federated { .. } => "federated",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { email, .. } => f
                .debug_struct("Local")
                .field("email", email)
                .finish_non_exhaustive(),
            Self::Federated { .. } => f.debug_struct("Federated").finish_non_exhaustive(),
        }
    }
}

/// Both authenticators behind one capability.
pub struct AuthService {
    local: LocalAuthenticator,
    federated: FederatedAuthenticator,
}

impl AuthService {
    pub fn new(local: LocalAuthenticator, federated: FederatedAuthenticator) -> Self {
        Self { local, federated }
    }

    /// Authenticate a credential submission and return the principal's user record.
    pub async fn authenticate(&self, credentials: Credentials) -> AuthResult<User> {
        let strategy = credentials.strategy();
        let result = match credentials {
            Credentials::Local { email, password } => {
                self.local.authenticate(&email, &password).await
            }
            Credentials::Federated { code } => self.federated.authenticate(&code).await,
        };

        match &result {
            Ok(user) => tracing::info!(user_id = user.id, strategy, "Authentication succeeded"),
            Err(e) if e.is_client_failure() => {
                tracing::info!(strategy, error = %e, "Authentication failed")
            }
            Err(e) => tracing::error!(strategy, error = %e, "Authentication error"),
        }
        result
    }

    /// Register a new local account.
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<User> {
        self.local.register(email, password).await
    }

    /// The configured federated provider.
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.federated.provider().as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::federated::tests::StubProvider;
    use super::*;
    use crate::store::SqliteStore;
    use std::sync::Arc;

    fn service() -> AuthService {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let provider = Arc::new(StubProvider::with_profile(
            "code-bob",
            FederatedProfile::with_email("bob@example.com"),
        ));
        AuthService::new(
            LocalAuthenticator::new(store.clone(), CredentialHasher::new(4)),
            FederatedAuthenticator::new(store, provider, true),
        )
    }

    #[tokio::test]
    async fn dispatches_by_credential_kind() {
        let auth = service();
        auth.register("alice@example.com", "hunter2").await.unwrap();

        let alice = auth
            .authenticate(Credentials::Local {
                email: "alice@example.com".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();
        assert_eq!(alice.email, "alice@example.com");

        let bob = auth
            .authenticate(Credentials::Federated {
                code: "code-bob".into(),
            })
            .await
            .unwrap();
        assert_eq!(bob.email, "bob@example.com");
        assert_ne!(alice.id, bob.id);
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let local = Credentials::Local {
            email: "alice@example.com".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{local:?}");
        assert!(rendered.contains("alice@example.com"));
        assert!(!rendered.contains("hunter2"));

        let federated = Credentials::Federated {
            code: "secret-code".into(),
        };
        assert!(!format!("{federated:?}").contains("secret-code"));
        assert_eq!(federated.strategy(), "federated");
    }
}
