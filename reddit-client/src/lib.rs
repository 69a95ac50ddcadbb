pub mod api;
pub mod auth;

use api::{RedditApiClient, REDDIT_API_BASE, REDDIT_PUBLIC_BASE};
use async_trait::async_trait;
use auth::{PasswordAuthenticator, PasswordCredentials, RedditToken, REDDIT_TOKEN_URL};
use dealwatch_core::{CoreError, Post, PostSource, RedditConfig, SourceError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hosts the client talks to. Overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct RedditEndpoints {
    pub api_base: String,
    pub public_base: String,
    pub token_url: String,
}

impl Default for RedditEndpoints {
    fn default() -> Self {
        Self {
            api_base: REDDIT_API_BASE.to_string(),
            public_base: REDDIT_PUBLIC_BASE.to_string(),
            token_url: REDDIT_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Anonymous,
    Password,
}

/// [`PostSource`] over Reddit's listing API.
pub struct RedditClient {
    api: RedditApiClient,
    authenticator: Option<PasswordAuthenticator>,
    token: Mutex<Option<RedditToken>>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        Self::with_endpoints(config, RedditEndpoints::default())
    }

    pub fn with_endpoints(
        config: &RedditConfig,
        endpoints: RedditEndpoints,
    ) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
            endpoints.api_base,
            endpoints.public_base,
        )?;

        let authenticator = match credentials(config) {
            Some(credentials) => Some(PasswordAuthenticator::new(
                credentials,
                &endpoints.token_url,
            )?),
            None => {
                info!("No Reddit credentials configured, using the public listing API");
                None
            }
        };

        Ok(Self {
            api,
            authenticator,
            token: Mutex::new(None),
        })
    }

    pub fn auth_mode(&self) -> AuthMode {
        if self.authenticator.is_some() {
            AuthMode::Password
        } else {
            AuthMode::Anonymous
        }
    }

    /// Cached bearer token, requesting a new one when missing or about to expire.
    async fn access_token(&self) -> Result<Option<String>, CoreError> {
        let Some(authenticator) = &self.authenticator else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(Some(token.access_token.clone()));
            }
            debug!("Reddit access token expired, requesting a new one");
        }

        let token = authenticator.request_token(self.api.http_client()).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(Some(access_token))
    }

    async fn clear_token(&self) {
        *self.token.lock().await = None;
    }
}

fn credentials(config: &RedditConfig) -> Option<PasswordCredentials> {
    Some(PasswordCredentials {
        client_id: config.client_id.clone()?,
        client_secret: config.client_secret.clone()?,
        username: config.username.clone()?,
        password: config.password.clone()?,
    })
}

#[async_trait]
impl PostSource for RedditClient {
    async fn fetch_new(&self, source: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        let token = self.access_token().await?;

        let listing = match self.api.get_new_posts(token.as_deref(), source, limit).await {
            Ok(listing) => listing,
            Err(CoreError::Source(SourceError::InvalidToken)) => {
                warn!("Reddit rejected the access token; it will be renewed next fetch");
                self.clear_token().await;
                return Err(SourceError::InvalidToken.into());
            }
            Err(e) => return Err(e),
        };

        let mut posts = Vec::with_capacity(listing.data.children.len());
        for child in listing.data.children {
            match child.data.into_post() {
                Ok(post) => posts.push(post),
                Err(e) => warn!("Skipping malformed post from r/{}: {}", source, e),
            }
        }
        Ok(posts)
    }
}
