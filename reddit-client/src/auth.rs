//! Script-app authentication against Reddit using the OAuth2 password grant.

use dealwatch_core::SourceError;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, ResourceOwnerPassword,
    ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

pub const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before Reddit would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        match self.expires_at.checked_sub(EXPIRY_MARGIN) {
            Some(deadline) => SystemTime::now() >= deadline,
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

pub struct PasswordAuthenticator {
    oauth_client: BasicClient,
    credentials: PasswordCredentials,
}

impl PasswordAuthenticator {
    pub fn new(credentials: PasswordCredentials, token_url: &str) -> Result<Self, SourceError> {
        let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(auth_failed)?;
        let token_url = TokenUrl::new(token_url.to_string()).map_err(auth_failed)?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            credentials,
        })
    }

    /// Exchanges the username/password for a bearer token, sending the
    /// request through `http_client` so it carries the configured user agent.
    pub async fn request_token(&self, http_client: &Client) -> Result<RedditToken, SourceError> {
        debug!(
            "Requesting Reddit access token for {}",
            self.credentials.username
        );

        let response = self
            .oauth_client
            .exchange_password(
                &ResourceOwnerUsername::new(self.credentials.username.clone()),
                &ResourceOwnerPassword::new(self.credentials.password.clone()),
            )
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(auth_failed)?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        info!("Obtained Reddit access token valid for {:?}", lifetime);

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
        })
    }
}

async fn send_oauth_request(
    client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn auth_failed(e: impl std::fmt::Display) -> SourceError {
    SourceError::AuthenticationFailed {
        reason: e.to_string(),
    }
}
