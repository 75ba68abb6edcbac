//! Authentication service
//!
//! Signs users and admins in through the OAuth provider and validates the
//! session tokens carried by later requests. User and admin sessions are
//! kept apart by kind, so a user token never grants admin access.

use crate::config::SessionConfig;
use crate::db::repositories::{AdminRepository, SessionRepository, UserRepository};
use crate::models::{Admin, Session, SessionKind, User};
use crate::services::oauth::{DynOAuthProvider, OAuthProfile};
use chrono::Duration;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Invalid session")]
    InvalidSession,

    #[error("Session expired")]
    SessionExpired,

    /// The signed-in identity is not an admin
    #[error("Not an admin: {0}")]
    NotAdmin(String),

    #[error("OAuth provider error: {0}")]
    Provider(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    admin_repo: Arc<dyn AdminRepository>,
    session_repo: Arc<dyn SessionRepository>,
    provider: DynOAuthProvider,
    config: SessionConfig,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        admin_repo: Arc<dyn AdminRepository>,
        session_repo: Arc<dyn SessionRepository>,
        provider: DynOAuthProvider,
        config: SessionConfig,
    ) -> Self {
        Self { user_repo, admin_repo, session_repo, provider, config }
    }

    pub fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        self.provider.authorize_url(state, redirect_uri)
    }

    async fn resolve_profile(&self, code: &str, redirect_uri: &str) -> Result<OAuthProfile, AuthServiceError> {
        let token = self
            .provider
            .exchange_code(code, redirect_uri)
            .await
            .map_err(AuthServiceError::Provider)?;
        self.provider.fetch_profile(&token).await.map_err(AuthServiceError::Provider)
    }

    /// Finish the user OAuth flow: upsert the user and open a session
    pub async fn sign_in_user(&self, code: &str, redirect_uri: &str) -> Result<(User, Session), AuthServiceError> {
        let profile = self.resolve_profile(code, redirect_uri).await?;
        let user = self.user_repo.upsert_by_email(&profile.display_name(), &profile.email).await?;

        let session = Session::new(&user.id, SessionKind::User, Duration::days(self.config.user_days));
        let session = self.session_repo.create(&session).await?;

        tracing::info!(user_id = %user.id, "User signed in");
        Ok((user, session))
    }

    /// Finish the admin OAuth flow. Only known admin e-mails get a session;
    /// the admin's expired sessions are dropped in the same transaction.
    pub async fn sign_in_admin(&self, code: &str, redirect_uri: &str) -> Result<(Admin, Session), AuthServiceError> {
        let profile = self.resolve_profile(code, redirect_uri).await?;
        let admin = self
            .admin_repo
            .get_by_email(&profile.email)
            .await?
            .ok_or_else(|| AuthServiceError::NotAdmin(profile.email.clone()))?;

        let session = Session::new(&admin.id, SessionKind::Admin, Duration::hours(self.config.admin_hours));
        let session = self.session_repo.create_replacing_expired(&session).await?;

        tracing::info!(admin_id = %admin.id, "Admin signed in");
        Ok((admin, session))
    }

    /// Load a live session of `kind`. Expired rows are deleted on sight.
    async fn live_session(&self, token: &str, kind: SessionKind) -> Result<Session, AuthServiceError> {
        let session = self
            .session_repo
            .get_by_id(token)
            .await?
            .filter(|s| s.kind == kind)
            .ok_or(AuthServiceError::InvalidSession)?;

        if session.is_expired() {
            self.session_repo.delete(&session.id).await?;
            return Err(AuthServiceError::SessionExpired);
        }
        Ok(session)
    }

    pub async fn validate_user_session(&self, token: &str) -> Result<User, AuthServiceError> {
        let session = self.live_session(token, SessionKind::User).await?;
        self.user_repo
            .get_by_id(&session.subject_id)
            .await?
            .ok_or(AuthServiceError::InvalidSession)
    }

    pub async fn validate_admin_session(&self, token: &str) -> Result<Admin, AuthServiceError> {
        let session = self.live_session(token, SessionKind::Admin).await?;
        self.admin_repo
            .get_by_id(&session.subject_id)
            .await?
            .ok_or(AuthServiceError::InvalidSession)
    }

    /// Delete a session (user logout or admin signout)
    pub async fn sign_out(&self, token: &str) -> Result<(), AuthServiceError> {
        self.session_repo.delete(token).await?;
        Ok(())
    }

    /// Remove all expired sessions. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, AuthServiceError> {
        Ok(self.session_repo.delete_expired().await?)
    }

    pub fn user_session_max_age(&self) -> i64 {
        Duration::days(self.config.user_days).num_seconds()
    }

    pub fn admin_session_max_age(&self) -> i64 {
        Duration::hours(self.config.admin_hours).num_seconds()
    }
}
