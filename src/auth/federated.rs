//! Federated (external identity provider) authentication.
//!
//! A provider turns an authorization code into a [`FederatedProfile`]; the
//! [`FederatedAuthenticator`] maps that profile onto a local user, provisioning
//! a federated-only account the first time an email is seen.

use super::local::normalize_email;
use super::{AuthError, AuthResult};
use crate::store::{IdentityStore, StoreError, User, FEDERATED_PASSWORD_SENTINEL};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Identity asserted by an external provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FederatedProfile {
    /// Provider-side stable subject id.
    #[serde(rename = "sub")]
    pub subject: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
}

impl FederatedProfile {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

/// External identity provider reached through a redirect/callback exchange.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// URL the browser is redirected to; `state` must come back on the callback.
    fn authorization_url(&self, state: &str) -> AuthResult<String>;

    /// Exchange the callback's authorization code for the user's profile.
    async fn exchange(&self, code: &str) -> AuthResult<FederatedProfile>;
}

/// Maps provider identities onto local users.
pub struct FederatedAuthenticator {
    users: Arc<dyn IdentityStore>,
    provider: Arc<dyn IdentityProvider>,
    link_local_accounts: bool,
}

impl FederatedAuthenticator {
    /// `link_local_accounts` decides whether a provider login may take over an
    /// existing account that has a local password and the same email.
    pub fn new(
        users: Arc<dyn IdentityStore>,
        provider: Arc<dyn IdentityProvider>,
        link_local_accounts: bool,
    ) -> Self {
        Self {
            users,
            provider,
            link_local_accounts,
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Complete a provider callback: exchange the code, then resolve the profile.
    pub async fn authenticate(&self, code: &str) -> AuthResult<User> {
        if code.trim().is_empty() {
            return Err(AuthError::AuthProvider("missing authorization code".into()));
        }
        let profile = self.provider.exchange(code).await?;
        self.resolve_profile(&profile)
    }

    /// Find the user for a provider profile, creating a federated-only account if absent.
    pub fn resolve_profile(&self, profile: &FederatedProfile) -> AuthResult<User> {
        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| AuthError::AuthProvider("profile has no email".into()))
            .and_then(|e| {
                normalize_email(e)
                    .map_err(|_| AuthError::AuthProvider("profile has an empty email".into()))
            })?;
        if profile.email_verified == Some(false) {
            return Err(AuthError::AuthProvider("profile email is not verified".into()));
        }

        if let Some(user) = self.users.find_user_by_email(email)? {
            return self.accept_existing(user);
        }

        match self.users.insert_user(email, FEDERATED_PASSWORD_SENTINEL) {
            Ok(user) => {
                tracing::info!(
                    user_id = user.id,
                    provider = self.provider.name(),
                    "Provisioned federated user"
                );
                Ok(user)
            }
            // Lost a race with a concurrent first login for the same email.
            Err(StoreError::Duplicate) => {
                let user = self
                    .users
                    .find_user_by_email(email)?
                    .ok_or(AuthError::UserNotFound)?;
                self.accept_existing(user)
            }
            Err(e) => Err(AuthError::Storage(e)),
        }
    }

    fn accept_existing(&self, user: User) -> AuthResult<User> {
        if !user.is_federated_only() && !self.link_local_accounts {
            tracing::warn!(
                user_id = user.id,
                provider = self.provider.name(),
                "Federated login refused for unlinked local account"
            );
            return Err(AuthError::AccountNotLinked);
        }
        Ok(user)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{CredentialHasher, LocalAuthenticator};
    use crate::store::{SqliteStore, StoreResult, UserId};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Provider double: maps authorization codes to canned profiles.
    #[derive(Default)]
    pub(crate) struct StubProvider {
        profiles: Mutex<HashMap<String, FederatedProfile>>,
    }

    impl StubProvider {
        pub(crate) fn with_profile(code: &str, profile: FederatedProfile) -> Self {
            let stub = Self::default();
            stub.profiles.lock().insert(code.to_string(), profile);
            stub
        }
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn authorization_url(&self, state: &str) -> AuthResult<String> {
            Ok(format!("https://idp.example/authorize?state={state}"))
        }

        async fn exchange(&self, code: &str) -> AuthResult<FederatedProfile> {
            self.profiles
                .lock()
                .get(code)
                .cloned()
                .ok_or_else(|| AuthError::AuthProvider("unknown code".into()))
        }
    }

    fn setup(link: bool) -> (Arc<SqliteStore>, FederatedAuthenticator) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let provider = Arc::new(StubProvider::with_profile(
            "code-bob",
            FederatedProfile::with_email("bob@example.com"),
        ));
        let federated = FederatedAuthenticator::new(store.clone(), provider, link);
        (store, federated)
    }

    #[tokio::test]
    async fn first_login_provisions_exactly_one_user() {
        let (store, federated) = setup(true);

        let first = federated.authenticate("code-bob").await.unwrap();
        assert_eq!(first.email, "bob@example.com");
        assert!(first.is_federated_only());
        assert_eq!(store.user_count().unwrap(), 1);

        let second = federated.authenticate("code-bob").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn federated_account_blocks_local_registration() {
        let (store, federated) = setup(true);
        federated.authenticate("code-bob").await.unwrap();

        let local = LocalAuthenticator::new(store.clone(), CredentialHasher::new(4));
        let err = local.register("bob@example.com", "hunter2").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn merges_with_local_account_when_linking_enabled() {
        let (store, federated) = setup(true);
        let existing = store.insert_user("bob@example.com", "$2b$04$abc").unwrap();

        let user = federated.authenticate("code-bob").await.unwrap();
        assert_eq!(user.id, existing.id);
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn refuses_local_account_when_linking_disabled() {
        let (store, federated) = setup(false);
        store.insert_user("bob@example.com", "$2b$04$abc").unwrap();

        let err = federated.authenticate("code-bob").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotLinked));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let (_store, federated) = setup(true);
        let err = federated.authenticate("bogus").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthProvider(_)));

        let err = federated.authenticate("  ").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthProvider(_)));
    }

    #[test]
    fn profile_without_usable_email_is_rejected() {
        let (store, federated) = setup(true);

        let no_email = FederatedProfile::default();
        assert!(matches!(
            federated.resolve_profile(&no_email),
            Err(AuthError::AuthProvider(_))
        ));

        let unverified = FederatedProfile {
            email_verified: Some(false),
            ..FederatedProfile::with_email("eve@example.com")
        };
        assert!(matches!(
            federated.resolve_profile(&unverified),
            Err(AuthError::AuthProvider(_))
        ));
        assert_eq!(store.user_count().unwrap(), 0);
    }

    /// Identity store where a concurrent first login wins the insert between our
    /// existence check and our own insert.
    struct RacingStore {
        inner: SqliteStore,
        raced: AtomicBool,
    }

    impl IdentityStore for RacingStore {
        fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.inner.find_user_by_email(email)
        }

        fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
            self.inner.find_user_by_id(id)
        }

        fn insert_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.insert_user(email, FEDERATED_PASSWORD_SENTINEL)?;
            }
            self.inner.insert_user(email, password_hash)
        }

        fn list_users(&self) -> StoreResult<Vec<User>> {
            self.inner.list_users()
        }
    }

    #[test]
    fn lost_insert_race_returns_the_winning_row() {
        let store = Arc::new(RacingStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            raced: AtomicBool::new(false),
        });
        let federated = FederatedAuthenticator::new(
            store.clone(),
            Arc::new(StubProvider::default()),
            true,
        );
        let profile = FederatedProfile::with_email("bob@example.com");

        let first = federated.resolve_profile(&profile).unwrap();
        let second = federated.resolve_profile(&profile).unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_federated_only());
        assert_eq!(store.inner.user_count().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_logins_create_one_user() {
        let (store, federated) = setup(true);
        let federated = Arc::new(federated);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let federated = Arc::clone(&federated);
            handles.push(tokio::spawn(async move {
                federated.authenticate("code-bob").await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.user_count().unwrap(), 1);
    }
}
