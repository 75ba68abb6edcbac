//! OAuth2 identity provider
//!
//! The authorization-code flow is split into three steps so the HTTP layer
//! can own redirects and cookies: build the consent URL, exchange the code
//! for an access token, fetch the signed-in profile.

use crate::config::OAuthConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// The identity returned by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OAuthProfile {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl OAuthProfile {
    /// Display name, falling back to the local part of the e-mail
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.email.split('@').next().unwrap_or_default().to_string()
    }
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL to send the browser to
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Trade an authorization code for an access token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String>;

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile>;
}

pub type DynOAuthProvider = Arc<dyn OAuthProvider>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Google sign-in
pub struct GoogleOAuth {
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("bude-finder/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http_client })
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&scope=email&redirect_uri={}&state={}",
            self.config.auth_url.trim(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .context("Token request failed")?;

        if !response.status().is_success() {
            bail!("Token endpoint returned {}", response.status());
        }

        let token: TokenResponse = response.json().await.context("Invalid token response")?;
        if let Some(error) = token.error {
            bail!("Token endpoint error: {}", error);
        }
        token.access_token.context("Token response has no access_token")
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile> {
        let response = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Userinfo request failed")?;

        if !response.status().is_success() {
            bail!("Userinfo endpoint returned {}", response.status());
        }
        response.json().await.context("Invalid userinfo response")
    }
}
