//! Remote operations behind the feed.
//!
//! [`FeedService`] is the seam between the view-model and whatever actually
//! stores posts. The view-model only ever holds an `Arc<S: FeedService>` and
//! calls it from spawned tasks, so implementations must be `Send + Sync`.
//!
//! - [`HttpFeedService`] talks JSON to a REST gateway in front of the CRM.
//! - Tests plug in in-memory fakes.

mod http;

pub use http::HttpFeedService;

use crate::model::{Comment, FeedElement, FeedPage, FeedQuery, User};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Shown when an error carries no usable text at all.
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response. `message` is taken from the structured error body when present.
    #[error("Server error: status {status}")]
    Server { status: u16, message: Option<String> },
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    /// The backend refused the operation with a free-form reason.
    #[error("{0}")]
    Rejected(String),
    /// The task running the operation panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Text suitable for a user-facing notification.
    ///
    /// Prefers the message from the server's error body, then the error's own
    /// description, then [`UNKNOWN_ERROR`].
    pub fn user_message(&self) -> String {
        if let ServiceError::Server {
            message: Some(message),
            ..
        } = self
        {
            if !message.trim().is_empty() {
                return message.clone();
            }
        }

        let own = self.to_string();
        if own.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            own
        }
    }
}

/// The remote feed operations the view-model depends on.
///
/// Each method corresponds to one server-side procedure. None of them are
/// retried by callers; a failure is terminal for that attempt.
pub trait FeedService: Send + Sync + 'static {
    /// Fetch one page of the feed for a record.
    fn list_feed(
        &self,
        query: &FeedQuery,
    ) -> impl Future<Output = Result<FeedPage, ServiceError>> + Send;

    /// Publish a post on a record and return it as stored.
    fn create_post(
        &self,
        record_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<FeedElement, ServiceError>> + Send;

    /// Add a comment to a post and return it as stored.
    fn create_comment(
        &self,
        feed_element_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<Comment, ServiceError>> + Send;

    fn like(&self, feed_element_id: &str) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn unlike(
        &self,
        feed_element_id: &str,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Users matching a partial name, for mention autocomplete.
    fn search_users(
        &self,
        term: &str,
    ) -> impl Future<Output = Result<Vec<User>, ServiceError>> + Send;

    fn delete_post(
        &self,
        feed_element_id: &str,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn update_post(
        &self,
        feed_element_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn delete_comment(
        &self,
        comment_id: &str,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn update_comment(
        &self,
        comment_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
