use crate::store::StoreError;

/// Failure of an authentication, registration or session operation.
///
/// Messages never contain passwords, hashes or session tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("identity provider error: {0}")]
    AuthProvider(String),
    /// Federated login hit an account that has a local password while linking is disabled.
    #[error("account exists with a local password and is not linked to the provider")]
    AccountNotLinked,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
    #[error("session store error: {0}")]
    Session(#[source] StoreError),
}

impl AuthError {
    /// Whether this failure is the caller's fault and should be recovered into a
    /// redirect, as opposed to a server fault.
    pub fn is_client_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::UserNotFound
                | Self::DuplicateEmail
                | Self::AuthProvider(_)
                | Self::AccountNotLinked
                | Self::InvalidInput(_)
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::DuplicateEmail,
            other => Self::Storage(other),
        }
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
