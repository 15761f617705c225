use super::confirm::Confirm;
use super::events::FeedEvent;
use super::mention::{detect_mention, splice_mention, MentionContext};
use super::patch::{apply_like, update_comment, update_element, LikeTracker};
use super::projection::{extract_text, project_feed, FeedItemView, ProjectionContext, DEFAULT_DATE_FORMAT};
use super::tasks::spawn_reporting;
use crate::api::{FeedService, ServiceError};
use crate::model::{FeedElement, FeedQuery, SortOrder, User};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub(super) const EMPTY_POST: &str = "Please enter some text";
pub(super) const EMPTY_COMMENT: &str = "Please enter a comment";
const DELETE_POST_PROMPT: &str = "Are you sure you want to delete this post?";
const DELETE_COMMENT_PROMPT: &str = "Are you sure you want to delete this comment?";

// ============================================================================
// Errors and Notifications
// ============================================================================

/// Synchronous rejection of a user intent. Nothing was sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("{0}")]
    Validation(&'static str),
    /// The target post or comment is not in the current feed (e.g. replaced by a reload).
    #[error("No feed item with id {0}")]
    NotFound(String),
    /// The same action is already waiting on the server.
    #[error("Request already in progress")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// A transient message for the user (the toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: Cow<'static, str>,
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self.kind {
            NotificationKind::Success => "Success",
            NotificationKind::Error => "Error",
            NotificationKind::Info => "Info",
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Per-feed parameters supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Record whose feed is shown.
    pub record_id: String,
    /// Used to flag the user's own posts and comments.
    pub current_user_id: String,
    pub page_size: u32,
    pub sort: SortOrder,
    /// `chrono` format for dates older than a week.
    pub date_format: String,
    /// How long a notification stays up.
    pub notification_duration: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            record_id: String::new(),
            current_user_id: String::new(),
            page_size: 10,
            sort: SortOrder::Latest,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            notification_duration: Duration::from_secs(3),
        }
    }
}

// ============================================================================
// View-Model
// ============================================================================

/// In-memory, display-ready state of one record's feed.
///
/// All fields are owned by the host's event loop. Intent methods update state
/// immediately and spawn the remote call; the call's outcome comes back as a
/// [`FeedEvent`] on the channel given to [`FeedViewModel::new`], which the host
/// passes to [`FeedViewModel::handle_event`].
///
/// Posting, editing and deleting reload the whole feed on success. Comments are
/// appended locally and likes are applied optimistically with rollback.
pub struct FeedViewModel<S, C> {
    pub(super) service: Arc<S>,
    pub(super) confirm: C,
    pub(super) events: mpsc::Sender<FeedEvent>,
    pub(super) settings: FeedSettings,

    pub(super) items: Arc<Vec<FeedElement>>,
    pub(super) next_page_token: Option<String>,
    pub(super) loading_feed: bool,
    /// Posts, edits and deletes waiting on the server.
    pub(super) writes_in_flight: usize,
    pub(super) error: Option<String>,

    pub(super) new_post_text: String,
    pub(super) comment_drafts: HashMap<String, String>,
    /// Posts whose comment button is disabled while a comment is sent.
    pub(super) comments_in_flight: HashSet<String>,
    pub(super) mention: MentionContext,
    pub(super) search_term: String,
    pub(super) notification: Option<(Notification, Instant)>,

    /// Only the newest feed load may replace the feed.
    pub(super) load_generation: u64,
    /// Only the newest user search may replace the suggestions.
    pub(super) mention_generation: u64,
    /// Bumped each time a load replaces the items.
    pub(super) feed_version: u64,
    /// Posts with like toggles in flight.
    pub(super) like_trackers: HashMap<String, LikeTracker>,
    pub(super) pending_tasks: usize,
}

impl<S: FeedService, C: Confirm> FeedViewModel<S, C> {
    pub fn new(
        service: Arc<S>,
        confirm: C,
        settings: FeedSettings,
        events: mpsc::Sender<FeedEvent>,
    ) -> Self {
        Self {
            service,
            confirm,
            events,
            settings,
            items: Arc::new(Vec::new()),
            next_page_token: None,
            loading_feed: false,
            writes_in_flight: 0,
            error: None,
            new_post_text: String::new(),
            comment_drafts: HashMap::new(),
            comments_in_flight: HashSet::new(),
            mention: MentionContext::default(),
            search_term: String::new(),
            notification: None,
            load_generation: 0,
            mention_generation: 0,
            feed_version: 0,
            like_trackers: HashMap::new(),
            pending_tasks: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------------

    pub fn items(&self) -> &Arc<Vec<FeedElement>> {
        &self.items
    }

    pub fn has_feed_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    /// True while a feed load or a post/edit/delete is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading_feed || self.writes_in_flight > 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn sort(&self) -> SortOrder {
        self.settings.sort
    }

    pub fn new_post_text(&self) -> &str {
        &self.new_post_text
    }

    pub fn comment_draft(&self, feed_element_id: &str) -> &str {
        self.comment_drafts
            .get(feed_element_id)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn mention(&self) -> &MentionContext {
        &self.mention
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn post_button_enabled(&self) -> bool {
        !self.is_loading() && !self.new_post_text.trim().is_empty()
    }

    pub fn comment_button_enabled(&self, feed_element_id: &str) -> bool {
        !self.comments_in_flight.contains(feed_element_id)
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref().map(|(n, _)| n)
    }

    /// Number of spawned remote calls whose events have not been handled yet.
    pub fn pending_tasks(&self) -> usize {
        self.pending_tasks
    }

    pub fn is_idle(&self) -> bool {
        self.pending_tasks == 0
    }

    /// Display projection of the current feed as of `now`.
    pub fn view(&self, now: DateTime<Utc>) -> Vec<FeedItemView> {
        let ctx = ProjectionContext {
            current_user_id: &self.settings.current_user_id,
            drafts: &self.comment_drafts,
            now,
            date_format: &self.settings.date_format,
            search_term: &self.search_term,
        };
        project_feed(&self.items, &ctx)
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    pub(super) fn notify(&mut self, kind: NotificationKind, message: impl Into<Cow<'static, str>>) {
        let notification = Notification {
            kind,
            message: message.into(),
        };
        tracing::debug!(kind = ?notification.kind, message = %notification.message, "Notification");
        self.notification = Some((notification, Instant::now()));
    }

    pub(super) fn notify_success(&mut self, message: impl Into<Cow<'static, str>>) {
        self.notify(NotificationKind::Success, message);
    }

    pub(super) fn notify_error(&mut self, message: impl Into<Cow<'static, str>>) {
        self.notify(NotificationKind::Error, message);
    }

    /// Drop the notification once it has been visible for the configured duration.
    pub fn clear_expired_notification(&mut self) {
        if let Some((_, shown_at)) = &self.notification {
            if shown_at.elapsed() >= self.settings.notification_duration {
                self.notification = None;
            }
        }
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    // ------------------------------------------------------------------------
    // Task plumbing
    // ------------------------------------------------------------------------

    fn spawn<F, P>(&mut self, task: &'static str, future: F, on_panic: P)
    where
        F: Future<Output = FeedEvent> + Send + 'static,
        P: FnOnce(String) -> FeedEvent + Send + 'static,
    {
        self.pending_tasks += 1;
        spawn_reporting(self.events.clone(), task, future, on_panic);
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Fetch one page and replace the visible feed with it.
    ///
    /// Existing items stay on screen until the response arrives and are kept if
    /// it fails.
    pub fn load_feed(&mut self, page_token: Option<String>) {
        self.loading_feed = true;
        self.error = None;
        self.load_generation += 1;
        let generation = self.load_generation;

        let query = FeedQuery {
            record_id: self.settings.record_id.clone(),
            page_size: self.settings.page_size,
            page_token,
            sort: self.settings.sort,
        };
        tracing::debug!(
            generation,
            record_id = %query.record_id,
            page_token = ?query.page_token,
            "Loading feed"
        );

        let service = Arc::clone(&self.service);
        self.spawn(
            "feed_load",
            async move {
                let result = service.list_feed(&query).await;
                FeedEvent::FeedLoaded { generation, result }
            },
            move |msg| FeedEvent::FeedLoaded {
                generation,
                result: Err(ServiceError::Internal(msg)),
            },
        );
    }

    /// Reload the first page.
    pub fn refresh(&mut self) {
        self.load_feed(None);
    }

    /// Load the page after the current one. Returns false at the end of the feed.
    pub fn next_page(&mut self) -> bool {
        match self.next_page_token.clone() {
            Some(token) => {
                self.load_feed(Some(token));
                true
            }
            None => false,
        }
    }

    pub fn change_sort(&mut self, sort: SortOrder) {
        tracing::debug!(sort = %sort, "Changing sort order");
        self.settings.sort = sort;
        self.load_feed(None);
    }

    /// Filter the projection by body text or author name.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    // ------------------------------------------------------------------------
    // Composing posts and mentions
    // ------------------------------------------------------------------------

    /// Record a keystroke or cursor move in the post input.
    ///
    /// `cursor` is a char offset. Re-evaluates the mention state and searches
    /// for users when a new partial name is being typed.
    pub fn update_post_text(&mut self, text: impl Into<String>, cursor: usize) {
        self.new_post_text = text.into();
        let state = detect_mention(&self.new_post_text, cursor);

        match self.mention.apply(state) {
            Some(term) => self.search_users(term),
            None if !self.mention.visible => {
                // Late results for an abandoned mention must not reappear
                self.mention_generation += 1;
                self.mention.suggestions.clear();
            }
            None => {}
        }
    }

    fn search_users(&mut self, term: String) {
        self.mention_generation += 1;
        let generation = self.mention_generation;
        tracing::trace!(generation, term = %term, "Searching users for mention");

        let service = Arc::clone(&self.service);
        self.spawn(
            "user_search",
            async move {
                let result = service.search_users(&term).await;
                FeedEvent::UsersFound {
                    generation,
                    term,
                    result,
                }
            },
            move |msg| FeedEvent::UsersFound {
                generation,
                term: String::new(),
                result: Err(ServiceError::Internal(msg)),
            },
        );
    }

    /// Replace the partial `@name` with the canonical mention token for `user`.
    ///
    /// Returns false when no mention is active.
    pub fn select_mention(&mut self, user: &User) -> bool {
        let Some(start) = self.mention.start_index else {
            return false;
        };
        self.new_post_text =
            splice_mention(&self.new_post_text, start, &self.mention.search_term, user);
        self.mention.reset();
        self.mention_generation += 1;
        true
    }

    /// Publish the post draft. On success the draft is cleared and the feed reloaded.
    pub fn submit_post(&mut self) -> Result<(), FeedError> {
        if self.new_post_text.trim().is_empty() {
            self.notify_error(EMPTY_POST);
            return Err(FeedError::Validation(EMPTY_POST));
        }
        if self.is_loading() {
            return Err(FeedError::Busy);
        }

        self.writes_in_flight += 1;
        let record_id = self.settings.record_id.clone();
        let text = self.new_post_text.clone();
        let service = Arc::clone(&self.service);
        self.spawn(
            "post_create",
            async move { FeedEvent::PostCreated(service.create_post(&record_id, &text).await) },
            |msg| FeedEvent::PostCreated(Err(ServiceError::Internal(msg))),
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------------

    pub fn set_comment_draft(&mut self, feed_element_id: &str, text: impl Into<String>) {
        self.comment_drafts
            .insert(feed_element_id.to_string(), text.into());
    }

    /// Send the comment draft for one post. On success the comment is appended locally.
    pub fn submit_comment(&mut self, feed_element_id: &str) -> Result<(), FeedError> {
        let text = self.comment_draft(feed_element_id).to_string();
        if text.trim().is_empty() {
            self.notify_error(EMPTY_COMMENT);
            return Err(FeedError::Validation(EMPTY_COMMENT));
        }
        if !self.comments_in_flight.insert(feed_element_id.to_string()) {
            return Err(FeedError::Busy);
        }

        let id = feed_element_id.to_string();
        let panic_id = id.clone();
        let service = Arc::clone(&self.service);
        self.spawn(
            "comment_create",
            async move {
                let result = service.create_comment(&id, &text).await;
                FeedEvent::CommentCreated {
                    feed_element_id: id,
                    result,
                }
            },
            move |msg| FeedEvent::CommentCreated {
                feed_element_id: panic_id,
                result: Err(ServiceError::Internal(msg)),
            },
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Likes
    // ------------------------------------------------------------------------

    /// Flip the like on a post immediately and persist it in the background.
    ///
    /// Once every toggle on the post has settled, a rejected change is rolled
    /// back to the last state the server accepted. A reload that lands first
    /// wins over the rollback. Returns false if the post is not in the feed.
    pub fn toggle_like(&mut self, feed_element_id: &str, currently_liked: bool) -> bool {
        let liked = !currently_liked;
        let mut snapshot = None;
        update_element(&mut self.items, feed_element_id, |element| {
            snapshot = Some(apply_like(element, liked));
        });
        let Some(snapshot) = snapshot else {
            tracing::debug!(feed_element_id, "Like toggle on unknown post ignored");
            return false;
        };

        let feed_version = self.feed_version;
        let tracker = self
            .like_trackers
            .entry(feed_element_id.to_string())
            .or_insert_with(|| LikeTracker::new(snapshot, feed_version));
        tracker.pending += 1;

        let id = feed_element_id.to_string();
        let panic_id = id.clone();
        let service = Arc::clone(&self.service);
        self.spawn(
            "like_toggle",
            async move {
                let result = if liked {
                    service.like(&id).await
                } else {
                    service.unlike(&id).await
                };
                FeedEvent::LikeSettled {
                    feed_element_id: id,
                    feed_version,
                    liked,
                    result,
                }
            },
            move |msg| FeedEvent::LikeSettled {
                feed_element_id: panic_id,
                feed_version,
                liked,
                result: Err(ServiceError::Internal(msg)),
            },
        );
        true
    }

    // ------------------------------------------------------------------------
    // Editing posts
    // ------------------------------------------------------------------------

    /// Enter edit mode, seeding the editor with the post's plain text.
    pub fn begin_edit_post(&mut self, feed_element_id: &str) -> bool {
        update_element(&mut self.items, feed_element_id, |element| {
            element.edit_text = extract_text(element.body.as_ref());
            element.is_editing = true;
        })
    }

    pub fn set_post_edit_text(&mut self, feed_element_id: &str, text: impl Into<String>) -> bool {
        let text = text.into();
        update_element(&mut self.items, feed_element_id, |element| {
            element.edit_text = text;
        })
    }

    pub fn cancel_edit_post(&mut self, feed_element_id: &str) -> bool {
        update_element(&mut self.items, feed_element_id, |element| {
            element.is_editing = false;
            element.edit_text.clear();
        })
    }

    /// Send the edited text. On success the feed is reloaded.
    pub fn save_post_edit(&mut self, feed_element_id: &str) -> Result<(), FeedError> {
        let Some(element) = self.items.iter().find(|e| e.id == feed_element_id) else {
            tracing::debug!(feed_element_id, "Save on unknown post ignored");
            return Err(FeedError::NotFound(feed_element_id.to_string()));
        };
        let text = element.edit_text.clone();
        if text.trim().is_empty() {
            self.notify_error(EMPTY_POST);
            return Err(FeedError::Validation(EMPTY_POST));
        }

        self.writes_in_flight += 1;
        let id = feed_element_id.to_string();
        let service = Arc::clone(&self.service);
        self.spawn(
            "post_update",
            async move { FeedEvent::PostUpdated(service.update_post(&id, &text).await) },
            |msg| FeedEvent::PostUpdated(Err(ServiceError::Internal(msg))),
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Editing comments
    // ------------------------------------------------------------------------

    pub fn begin_edit_comment(&mut self, feed_element_id: &str, comment_id: &str) -> bool {
        update_comment(&mut self.items, feed_element_id, comment_id, |comment| {
            comment.edit_text = extract_text(comment.body.as_ref());
            comment.is_editing = true;
        })
    }

    pub fn set_comment_edit_text(
        &mut self,
        feed_element_id: &str,
        comment_id: &str,
        text: impl Into<String>,
    ) -> bool {
        let text = text.into();
        update_comment(&mut self.items, feed_element_id, comment_id, |comment| {
            comment.edit_text = text;
        })
    }

    pub fn cancel_edit_comment(&mut self, feed_element_id: &str, comment_id: &str) -> bool {
        update_comment(&mut self.items, feed_element_id, comment_id, |comment| {
            comment.is_editing = false;
            comment.edit_text.clear();
        })
    }

    /// Send an edited comment. On success the feed is reloaded.
    pub fn save_comment_edit(
        &mut self,
        feed_element_id: &str,
        comment_id: &str,
    ) -> Result<(), FeedError> {
        let comment = self
            .items
            .iter()
            .find(|e| e.id == feed_element_id)
            .and_then(|e| e.comments().iter().find(|c| c.id == comment_id));
        let Some(comment) = comment else {
            tracing::debug!(feed_element_id, comment_id, "Save on unknown comment ignored");
            return Err(FeedError::NotFound(comment_id.to_string()));
        };
        let text = comment.edit_text.clone();
        if text.trim().is_empty() {
            self.notify_error(EMPTY_POST);
            return Err(FeedError::Validation(EMPTY_POST));
        }

        self.writes_in_flight += 1;
        let id = comment_id.to_string();
        let service = Arc::clone(&self.service);
        self.spawn(
            "comment_update",
            async move { FeedEvent::CommentUpdated(service.update_comment(&id, &text).await) },
            |msg| FeedEvent::CommentUpdated(Err(ServiceError::Internal(msg))),
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Deleting
    // ------------------------------------------------------------------------

    /// Ask for confirmation, then delete a post. Returns whether the request was sent.
    pub async fn delete_post(&mut self, feed_element_id: &str) -> bool {
        if !self.confirm.confirm(DELETE_POST_PROMPT).await {
            tracing::debug!(feed_element_id, "Post deletion declined");
            return false;
        }

        self.writes_in_flight += 1;
        let id = feed_element_id.to_string();
        let service = Arc::clone(&self.service);
        self.spawn(
            "post_delete",
            async move { FeedEvent::PostDeleted(service.delete_post(&id).await) },
            |msg| FeedEvent::PostDeleted(Err(ServiceError::Internal(msg))),
        );
        true
    }

    /// Ask for confirmation, then delete a comment. Returns whether the request was sent.
    pub async fn delete_comment(&mut self, comment_id: &str) -> bool {
        if !self.confirm.confirm(DELETE_COMMENT_PROMPT).await {
            tracing::debug!(comment_id, "Comment deletion declined");
            return false;
        }

        self.writes_in_flight += 1;
        let id = comment_id.to_string();
        let service = Arc::clone(&self.service);
        self.spawn(
            "comment_delete",
            async move { FeedEvent::CommentDeleted(service.delete_comment(&id).await) },
            |msg| FeedEvent::CommentDeleted(Err(ServiceError::Internal(msg))),
        );
        true
    }
}
