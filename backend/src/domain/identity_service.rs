//! Credential-backed identity resolution.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::Error;
use crate::domain::credential::{CredentialSecret, verify_credential};
use crate::domain::ports::{IdentityDirectory, UserRepository, UserRepositoryError};
use crate::domain::user::User;

/// [`IdentityDirectory`] backed by signature verification and the user
/// repository.
///
/// Every verification failure collapses to the same unauthorized error; the
/// concrete reason is only logged.
pub struct IdentityService {
    secret: CredentialSecret,
    users: Arc<dyn UserRepository>,
}

impl IdentityService {
    pub fn new(secret: CredentialSecret, users: Arc<dyn UserRepository>) -> Self {
        Self { secret, users }
    }
}

fn storage_error(error: &UserRepositoryError) -> Error {
    tracing::error!(error = %error, "user repository failure during authentication");
    match error {
        UserRepositoryError::Connection { .. } => {
            Error::service_unavailable("identity storage is unavailable")
        }
        UserRepositoryError::Query { .. } => Error::internal("identity lookup failed"),
    }
}

#[async_trait]
impl IdentityDirectory for IdentityService {
    async fn authenticate(&self, credential: &str) -> Result<User, Error> {
        let identity = verify_credential(credential, &self.secret, Utc::now()).map_err(|err| {
            tracing::info!(reason = %err, "credential rejected");
            Error::unauthorized("authentication failed")
        })?;

        let user = self
            .users
            .find_or_create(&identity)
            .await
            .map_err(|err| storage_error(&err))?;
        tracing::debug!(user_id = %user.id, "credential accepted");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::credential::testing::sign_identity;
    use crate::domain::ports::user_repository::MockUserRepository;
    use crate::domain::user::UserId;
    use mockall::predicate::always;
    use rstest::{fixture, rstest};

    #[fixture]
    fn secret() -> CredentialSecret {
        CredentialSecret::new(b"test-secret".to_vec())
    }

    fn resolved_user() -> User {
        User {
            id: UserId::random(),
            external_id: 99,
            display_name: "Ada Lovelace".to_owned(),
            photo_url: None,
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: Vec::new(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn valid_credential_resolves_a_user(secret: CredentialSecret) {
        let credential = sign_identity(&secret, 99, Utc::now());
        let mut users = MockUserRepository::new();
        users
            .expect_find_or_create()
            .with(always())
            .times(1)
            .returning(|_| Ok(resolved_user()));

        let service = IdentityService::new(secret, Arc::new(users));
        let user = service
            .authenticate(&credential)
            .await
            .expect("authentication succeeds");
        assert_eq!(user.external_id, 99);
    }

    #[rstest]
    #[tokio::test]
    async fn tampered_credential_is_rejected_without_detail(secret: CredentialSecret) {
        let mut credential = sign_identity(&secret, 99, Utc::now());
        credential.push('x');
        let mut users = MockUserRepository::new();
        users.expect_find_or_create().never();

        let service = IdentityService::new(secret, Arc::new(users));
        let error = service
            .authenticate(&credential)
            .await
            .expect_err("authentication fails");
        assert_eq!(error.code(), ErrorCode::Unauthorized);
        assert_eq!(error.message(), "authentication failed");
    }

    #[rstest]
    #[tokio::test]
    async fn stale_credential_yields_the_same_generic_error(secret: CredentialSecret) {
        let issued = Utc::now() - chrono::Duration::hours(25);
        let credential = sign_identity(&secret, 99, issued);
        let mut users = MockUserRepository::new();
        users.expect_find_or_create().never();

        let service = IdentityService::new(secret, Arc::new(users));
        let error = service
            .authenticate(&credential)
            .await
            .expect_err("authentication fails");
        assert_eq!(error.code(), ErrorCode::Unauthorized);
        assert_eq!(error.message(), "authentication failed");
    }

    #[rstest]
    #[tokio::test]
    async fn connection_failure_maps_to_service_unavailable(secret: CredentialSecret) {
        let credential = sign_identity(&secret, 99, Utc::now());
        let mut users = MockUserRepository::new();
        users
            .expect_find_or_create()
            .returning(|_| Err(UserRepositoryError::connection("refused")));

        let service = IdentityService::new(secret, Arc::new(users));
        let error = service
            .authenticate(&credential)
            .await
            .expect_err("authentication fails");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }
}
