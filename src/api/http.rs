use super::{FeedService, ServiceError};
use crate::model::{Comment, FeedElement, FeedPage, FeedQuery, User};
use crate::util::{validate_base_url, UrlValidationError};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Serialize)]
struct TextPayload<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PostEnvelope {
    post: FeedElement,
}

#[derive(Deserialize)]
struct CommentEnvelope {
    comment: Comment,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Pull a human-readable message out of an error response.
///
/// Accepts `{"message": "..."}` and the platform's `[{"message": "..."}]` list form.
fn parse_error_message(body: &str) -> Option<String> {
    if let Ok(single) = serde_json::from_str::<ErrorBody>(body) {
        return single.message;
    }
    serde_json::from_str::<Vec<ErrorBody>>(body)
        .ok()?
        .into_iter()
        .find_map(|e| e.message)
}

/// [`FeedService`] over a JSON REST gateway.
///
/// Every request carries the bearer token (if configured) and is bounded by
/// `timeout`. Nothing is retried.
pub struct HttpFeedService {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
    timeout: Duration,
}

impl HttpFeedService {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = validate_base_url(base_url).map_err(|e| match e {
            UrlValidationError::Insecure => ServiceError::InsecureBaseUrl,
            other => ServiceError::InvalidUrl(other.to_string()),
        })?;

        if token.is_none() {
            tracing::debug!(base_url = %base_url, "No API token configured, sending unauthenticated requests");
        }

        Ok(Self {
            client,
            base_url,
            token,
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        request
    }

    fn with_text(request: RequestBuilder, text: &str) -> Result<RequestBuilder, ServiceError> {
        let body = serde_json::to_vec(&TextPayload { text })?;
        Ok(request.header(CONTENT_TYPE, "application/json").body(body))
    }

    /// Send a request and return the body of a successful response.
    ///
    /// The timeout covers the headers and the whole body read.
    async fn send(&self, request: RequestBuilder) -> Result<String, ServiceError> {
        let exchange = async {
            let response = request.send().await.map_err(ServiceError::Network)?;
            let status = response.status();
            let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
            Ok::<_, ServiceError>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ServiceError::Timeout(self.timeout))?
            .map_err(|e| match e {
                ServiceError::Network(err) if err.is_timeout() => ServiceError::Timeout(self.timeout),
                other => other,
            })?;

        if !status.is_success() {
            let message = parse_error_message(&body);
            tracing::debug!(status = status.as_u16(), message = ?message, "Feed service returned an error");
            return Err(ServiceError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl FeedService for HttpFeedService {
    async fn list_feed(&self, query: &FeedQuery) -> Result<FeedPage, ServiceError> {
        let mut url = self.endpoint(&["records", &query.record_id, "feed"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("pageSize", &query.page_size.to_string());
            if let Some(token) = &query.page_token {
                pairs.append_pair("pageToken", token);
            }
            pairs.append_pair("sort", query.sort.as_str());
        }
        tracing::debug!(record_id = %query.record_id, page_size = query.page_size, sort = %query.sort, "Listing feed");
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn create_post(&self, record_id: &str, text: &str) -> Result<FeedElement, ServiceError> {
        let url = self.endpoint(&["records", record_id, "feed"])?;
        let request = Self::with_text(self.request(Method::POST, url), text)?;
        let envelope: PostEnvelope = self.send_json(request).await?;
        Ok(envelope.post)
    }

    async fn create_comment(&self, feed_element_id: &str, text: &str) -> Result<Comment, ServiceError> {
        let url = self.endpoint(&["feed-elements", feed_element_id, "comments"])?;
        let request = Self::with_text(self.request(Method::POST, url), text)?;
        let envelope: CommentEnvelope = self.send_json(request).await?;
        Ok(envelope.comment)
    }

    async fn like(&self, feed_element_id: &str) -> Result<(), ServiceError> {
        let url = self.endpoint(&["feed-elements", feed_element_id, "likes"])?;
        self.send(self.request(Method::POST, url)).await.map(|_| ())
    }

    async fn unlike(&self, feed_element_id: &str) -> Result<(), ServiceError> {
        let url = self.endpoint(&["feed-elements", feed_element_id, "likes"])?;
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, ServiceError> {
        let mut url = self.endpoint(&["users"])?;
        url.query_pairs_mut().append_pair("q", term);
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn delete_post(&self, feed_element_id: &str) -> Result<(), ServiceError> {
        let url = self.endpoint(&["feed-elements", feed_element_id])?;
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }

    async fn update_post(&self, feed_element_id: &str, text: &str) -> Result<(), ServiceError> {
        let url = self.endpoint(&["feed-elements", feed_element_id])?;
        let request = Self::with_text(self.request(Method::PATCH, url), text)?;
        self.send(request).await.map(|_| ())
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<(), ServiceError> {
        let url = self.endpoint(&["comments", comment_id])?;
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }

    async fn update_comment(&self, comment_id: &str, text: &str) -> Result<(), ServiceError> {
        let url = self.endpoint(&["comments", comment_id])?;
        let request = Self::with_text(self.request(Method::PATCH, url), text)?;
        self.send(request).await.map(|_| ())
    }
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ServiceError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ServiceError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ServiceError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ServiceError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ServiceError::InvalidUtf8)
}
