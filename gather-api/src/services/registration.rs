//! Registration and Activation Workflows
//!
//! Registration spans two backends that cannot share a transaction: the
//! database (user plus invitation, atomically) and the mail provider. If
//! the invitation mail cannot be delivered, the stored records are rolled
//! back by a compensating delete so no orphaned unactivated account keeps
//! the email address reserved.
//!
//! The plaintext invitation token exists only in the mail; the store holds
//! its SHA-256 digest.

use crate::auth::hash_password;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::mailer::{InvitationMail, Mailer};
use gather_core::{InvitationToken, NewUser, User, UserId};
use gather_store::Users;
use std::sync::Arc;

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// Plaintext activation token. Returned only in non-production
    /// environments to ease manual testing; production clients get it
    /// exclusively via mail.
    pub plaintext_token: Option<String>,
}

/// Orchestrates user registration and activation.
pub struct RegistrationService {
    users: Arc<dyn Users>,
    mailer: Arc<dyn Mailer>,
    config: Arc<ApiConfig>,
}

impl RegistrationService {
    pub fn new(users: Arc<dyn Users>, mailer: Arc<dyn Mailer>, config: Arc<ApiConfig>) -> Self {
        Self {
            users,
            mailer,
            config,
        }
    }

    /// Register a new user and send the invitation mail.
    ///
    /// The user and invitation are created in one database transaction.
    /// If mail delivery then fails, the records are deleted and the
    /// registration fails as a whole.
    pub async fn register(&self, username: String, email: String, password: &str) -> ApiResult<Registration> {
        let password_hash = hash_password(password)?;
        let token = InvitationToken::generate();

        let user = self
            .users
            .create_and_invite(
                NewUser {
                    username,
                    email,
                    password_hash,
                },
                &token.hash,
                self.config.invitation_expiry,
            )
            .await?;

        let mail = InvitationMail {
            username: user.username.clone(),
            email: user.email.clone(),
            activation_url: self.config.activation_url(&token.plaintext),
        };

        if let Err(e) = self.mailer.send_invitation(&mail).await {
            tracing::error!(user_id = user.id, error = %e, "Invitation mail failed, rolling back registration");
            // Compensating delete. If it also fails the account is orphaned
            // until cleaned up manually, so log it loudly.
            if let Err(del_err) = self.users.delete(user.id).await {
                tracing::error!(
                    user_id = user.id,
                    error = %del_err,
                    "Compensating delete failed, orphaned unactivated account"
                );
            }
            return Err(ApiError::internal_error("Failed to send invitation mail"));
        }

        tracing::info!(user_id = user.id, "User registered, invitation sent");

        let plaintext_token = if self.config.is_production() {
            None
        } else {
            Some(token.plaintext)
        };

        Ok(Registration {
            user,
            plaintext_token,
        })
    }

    /// Activate an account using the plaintext token from the mail.
    pub async fn activate(&self, user_id: UserId, plaintext_token: &str) -> ApiResult<()> {
        let token_hash = gather_core::hash_token(plaintext_token);
        self.users.activate(user_id, &token_hash).await?;
        tracing::info!(user_id, "User activated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::mock::MockMailer;
    use gather_store::mocks::MockUsers;
    use gather_store::StoreError;
    use std::sync::atomic::Ordering;

    fn service(
        users: Arc<MockUsers>,
        mailer: Arc<MockMailer>,
    ) -> RegistrationService {
        RegistrationService::new(users, mailer, Arc::new(ApiConfig::default()))
    }

    #[tokio::test]
    async fn test_register_stores_user_and_sends_mail() {
        let users = Arc::new(MockUsers::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(Arc::clone(&users), Arc::clone(&mailer));

        let registration = svc
            .register("alice".into(), "alice@example.com".into(), "hunter2")
            .await
            .unwrap();

        assert!(!registration.user.activated);
        assert!(registration.user.password_hash.is_none());
        assert_eq!(mailer.sent_count(), 1);

        // The mail carries the plaintext token; the store holds its digest.
        let plaintext = registration.plaintext_token.unwrap();
        let sent = mailer.sent.lock().unwrap()[0].clone();
        assert!(sent.activation_url.ends_with(&plaintext));
        let invitation = users.invitation_for(registration.user.id).unwrap();
        assert_eq!(invitation.token_hash, gather_core::hash_token(&plaintext));
        assert_ne!(invitation.token_hash, plaintext);
    }

    #[tokio::test]
    async fn test_register_compensates_on_mail_failure() {
        let users = Arc::new(MockUsers::new());
        let mailer = Arc::new(MockMailer::failing());
        let svc = service(Arc::clone(&users), mailer);

        let result = svc
            .register("bob".into(), "bob@example.com".into(), "hunter2")
            .await;

        assert!(result.is_err());
        // The stored records were rolled back: the email is free again.
        assert_eq!(users.deleted.lock().unwrap().len(), 1);
        let users2 = users.read_by_email("bob@example.com").await;
        assert_eq!(users2, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_register_reports_error_when_compensation_fails() {
        let users = Arc::new(MockUsers::new());
        users.fail_delete.store(true, Ordering::SeqCst);
        let mailer = Arc::new(MockMailer::failing());
        let svc = service(Arc::clone(&users), mailer);

        let result = svc
            .register("carol".into(), "carol@example.com".into(), "hunter2")
            .await;

        // Registration still fails even though the delete could not run.
        assert!(result.is_err());
        assert_eq!(users.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_before_mail() {
        let users = Arc::new(MockUsers::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(Arc::clone(&users), Arc::clone(&mailer));

        svc.register("dave".into(), "dave@example.com".into(), "pw")
            .await
            .unwrap();
        let result = svc
            .register("dave2".into(), "dave@example.com".into(), "pw")
            .await;

        assert_eq!(
            result.unwrap_err().code,
            crate::error::ErrorCode::EmailTaken
        );
        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_activate_roundtrip() {
        let users = Arc::new(MockUsers::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(Arc::clone(&users), mailer);

        let registration = svc
            .register("erin".into(), "erin@example.com".into(), "pw")
            .await
            .unwrap();
        let plaintext = registration.plaintext_token.unwrap();

        svc.activate(registration.user.id, &plaintext).await.unwrap();
        assert!(users.user(registration.user.id).unwrap().activated);

        // Token is consumed; replaying it reads as absent.
        let replay = svc.activate(registration.user.id, &plaintext).await;
        assert_eq!(
            replay.unwrap_err().code,
            crate::error::ErrorCode::EntityNotFound
        );
    }

    #[tokio::test]
    async fn test_activate_with_wrong_token() {
        let users = Arc::new(MockUsers::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(Arc::clone(&users), mailer);

        let registration = svc
            .register("frank".into(), "frank@example.com".into(), "pw")
            .await
            .unwrap();

        let result = svc.activate(registration.user.id, "wrong-token").await;
        assert_eq!(
            result.unwrap_err().code,
            crate::error::ErrorCode::EntityNotFound
        );
        assert!(!users.user(registration.user.id).unwrap().activated);
    }

    #[tokio::test]
    async fn test_activate_expired_invitation() {
        let users = Arc::new(MockUsers::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(Arc::clone(&users), mailer);

        let registration = svc
            .register("grace".into(), "grace@example.com".into(), "pw")
            .await
            .unwrap();
        users.expire_invitation(registration.user.id);

        let plaintext = registration.plaintext_token.unwrap();
        let result = svc.activate(registration.user.id, &plaintext).await;
        assert_eq!(
            result.unwrap_err().code,
            crate::error::ErrorCode::InvitationExpired
        );
    }
}
