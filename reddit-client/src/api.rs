use chrono::{TimeZone, Utc};
use dealwatch_core::{CoreError, Post, SourceError};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_PUBLIC_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub link_flair_text: Option<String>,
}

impl RedditPostData {
    pub fn into_post(self) -> Result<Post, SourceError> {
        let created_utc = Utc
            .timestamp_opt(self.created_utc as i64, 0)
            .single()
            .ok_or_else(|| SourceError::InvalidResponse {
                details: format!(
                    "post {} has an invalid created_utc {}",
                    self.id, self.created_utc
                ),
            })?;

        let url = if self.url.is_empty() {
            format!("{}{}", REDDIT_PUBLIC_BASE, self.permalink)
        } else {
            self.url
        };

        Ok(Post {
            id: self.id,
            title: self.title,
            url,
            source: self.subreddit,
            flair: self.link_flair_text,
            created_utc,
        })
    }
}

/// Maps a non-success status to the source error the cycle reports.
pub fn status_error(status: StatusCode, retry_after: Option<u64>, subreddit: &str) -> SourceError {
    match status.as_u16() {
        401 => SourceError::InvalidToken,
        403 => SourceError::Forbidden {
            resource: format!("r/{}", subreddit),
        },
        404 => SourceError::SubredditNotFound {
            subreddit: subreddit.to_string(),
        },
        429 => SourceError::RateLimitExceeded {
            retry_after: retry_after.unwrap_or(60),
        },
        code if status.is_server_error() => SourceError::ServerError { status_code: code },
        code => SourceError::InvalidResponse {
            details: format!("unexpected status {} for r/{}", code, subreddit),
        },
    }
}

#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    api_base: String,
    public_base: String,
}

impl RedditApiClient {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        api_base: impl Into<String>,
        public_base: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_base: api_base.into(),
            public_base: public_base.into(),
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    async fn make_request(
        &self,
        url: &str,
        access_token: Option<&str>,
        query_params: &[(&str, &str)],
        subreddit: &str,
    ) -> Result<Response, CoreError> {
        let mut request_builder = self
            .http_client
            .request(Method::GET, url)
            .query(query_params);

        if let Some(token) = access_token {
            request_builder = request_builder.bearer_auth(token);
        }

        debug!("Making Reddit request: GET {}", url);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", url, e);
                if e.is_timeout() {
                    return Err(SourceError::RequestTimeout.into());
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                "Rate limited on r/{}, retry after {:?} seconds",
                subreddit, retry_after
            );
        } else {
            error!("Request failed with status: {} for {}", status, url);
        }

        Err(status_error(status, retry_after, subreddit).into())
    }

    /// Newest posts of `subreddit`. With a token the OAuth host is used,
    /// otherwise the public `.json` listing.
    pub async fn get_new_posts(
        &self,
        access_token: Option<&str>,
        subreddit: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let url = match access_token {
            Some(_) => format!("{}/r/{}/new", self.api_base, subreddit),
            None => format!("{}/r/{}/new.json", self.public_base, subreddit),
        };
        let limit = limit.to_string();
        let params = [("limit", limit.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(&url, access_token, &params, subreddit)
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            SourceError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", subreddit),
            }
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }
}
