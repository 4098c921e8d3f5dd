use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Value the Feed API puts in `comments` when an item has no discussion link
pub const NO_COMMENTS_LINK: &str = "No Comments Link";

const USER_AGENT: &str = "FeedConsole/1.0";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout, or a body that is not the expected JSON
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The Feed API answered without `success: true`
    #[error("operation rejected: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { message: Option<String> },
}

impl ApiError {
    /// Human-readable text supplied by the Feed API, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { message: Some(m) } if !m.is_empty() => Some(m),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Envelope shared by every Feed API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FeedItem {
    /// Comment value as the Feed API reports it, the sentinel when absent
    pub fn comments_value(&self) -> &str {
        self.comments.as_deref().unwrap_or(NO_COMMENTS_LINK)
    }

    pub fn has_comments(&self) -> bool {
        self.comments_value() != NO_COMMENTS_LINK
    }

    pub fn comments_label(&self) -> &str {
        if self.has_comments() {
            self.comments_value()
        } else {
            "No Comments"
        }
    }
}

/// One element of `GET /fetch/{index}`; older backends return plain strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Item(FeedItem),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedGroup {
    pub url: String,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

#[derive(Serialize)]
struct AddFeedPayload<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct SummarizePayload<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct CustomLinkPayload<'a> {
    title: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct ReadLaterPayload<'a> {
    item: ItemPayload<'a>,
}

// The backend deserializes every field as a plain string
#[derive(Serialize)]
struct ItemPayload<'a> {
    title: &'a str,
    link: &'a str,
    comments: &'a str,
    description: &'a str,
}

/// Typed client for the Feed API
pub struct FeedApiClient {
    client: Client,
    base_url: String,
}

impl FeedApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /feeds
    pub async fn list_feeds(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.url("/feeds")).send().await?;
        Self::data(response).await
    }

    /// POST /feeds
    pub async fn add_feed(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/feeds"))
            .json(&AddFeedPayload { url })
            .send()
            .await?;
        Self::ack(response).await
    }

    /// DELETE /feeds/{index}
    pub async fn remove_feed(&self, index: usize) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/feeds/{}", index)))
            .send()
            .await?;
        Self::ack(response).await
    }

    /// GET /fetch/{index}
    pub async fn fetch_items(&self, index: usize) -> Result<Vec<FeedEntry>> {
        let response = self
            .client
            .get(self.url(&format!("/fetch/{}", index)))
            .send()
            .await?;
        Self::data(response).await
    }

    /// GET /fetch_all
    pub async fn fetch_all(&self) -> Result<Vec<FeedGroup>> {
        let response = self.client.get(self.url("/fetch_all")).send().await?;
        Self::data(response).await
    }

    /// GET /read_later
    pub async fn list_read_later(&self) -> Result<Vec<FeedItem>> {
        let response = self.client.get(self.url("/read_later")).send().await?;
        Self::data(response).await
    }

    /// POST /read_later
    pub async fn add_read_later(&self, item: &FeedItem) -> Result<()> {
        let payload = ReadLaterPayload {
            item: ItemPayload {
                title: &item.title,
                link: &item.link,
                comments: item.comments_value(),
                description: item.description.as_deref().unwrap_or_default(),
            },
        };
        let response = self
            .client
            .post(self.url("/read_later"))
            .json(&payload)
            .send()
            .await?;
        Self::ack(response).await
    }

    /// POST /read_later with a user-supplied title and URL
    pub async fn add_custom_link(&self, title: &str, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/read_later"))
            .json(&CustomLinkPayload { title, url })
            .send()
            .await?;
        Self::ack(response).await
    }

    /// GET /fetch_content/{feed_index}/{item_index}
    pub async fn fetch_content(&self, feed_index: usize, item_index: usize) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/fetch_content/{}/{}", feed_index, item_index)))
            .send()
            .await?;
        Self::data(response).await
    }

    /// POST /summarize
    pub async fn summarize(&self, content: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/summarize"))
            .json(&SummarizePayload { content })
            .send()
            .await?;
        Self::data(response).await
    }

    /// DELETE /read_later/{index}
    pub async fn remove_read_later(&self, index: usize) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/read_later/{}", index)))
            .send()
            .await?;
        Self::ack(response).await
    }

    /// Decode an envelope that must carry `data` on success.
    async fn data<T: DeserializeOwned>(response: Response) -> Result<T> {
        let envelope = Self::envelope::<T>(response).await?;
        envelope.data.ok_or(ApiError::Rejected { message: None })
    }

    async fn ack(response: Response) -> Result<()> {
        Self::envelope::<IgnoredAny>(response).await.map(|_| ())
    }

    // HTTP status is not consulted, `success` is the only signal
    async fn envelope<T: DeserializeOwned>(response: Response) -> Result<ApiResponse<T>> {
        let status = response.status();
        let url = response.url().clone();
        let envelope: ApiResponse<T> = response.json().await?;
        debug!(%url, %status, success = envelope.success, "Feed API response");
        if !envelope.success {
            return Err(ApiError::Rejected {
                message: envelope.error,
            });
        }
        Ok(envelope)
    }
}
