//! Completion events from background calls.
//!
//! Each spawned call reports back with exactly one [`FeedEvent`]. The host
//! feeds them to [`FeedViewModel::handle_event`] on its own loop, so every
//! state change happens in one place and in arrival order.

use super::confirm::Confirm;
use super::patch::{append_comment, restore_like, update_element};
use super::state::FeedViewModel;
use crate::api::{FeedService, ServiceError};
use crate::model::{Comment, FeedElement, FeedPage, User};

/// Outcome of one background call.
#[derive(Debug)]
pub enum FeedEvent {
    FeedLoaded {
        generation: u64,
        result: Result<FeedPage, ServiceError>,
    },
    PostCreated(Result<FeedElement, ServiceError>),
    CommentCreated {
        feed_element_id: String,
        result: Result<Comment, ServiceError>,
    },
    LikeSettled {
        feed_element_id: String,
        /// Feed version the toggle was made against.
        feed_version: u64,
        /// Requested state: `true` for a like, `false` for an unlike.
        liked: bool,
        result: Result<(), ServiceError>,
    },
    UsersFound {
        generation: u64,
        term: String,
        result: Result<Vec<User>, ServiceError>,
    },
    PostUpdated(Result<(), ServiceError>),
    PostDeleted(Result<(), ServiceError>),
    CommentUpdated(Result<(), ServiceError>),
    CommentDeleted(Result<(), ServiceError>),
}

impl<S: FeedService, C: Confirm> FeedViewModel<S, C> {
    /// Apply the outcome of a background call.
    pub fn handle_event(&mut self, event: FeedEvent) {
        self.pending_tasks = self.pending_tasks.saturating_sub(1);

        match event {
            FeedEvent::FeedLoaded { generation, result } => {
                self.handle_feed_loaded(generation, result);
            }
            FeedEvent::PostCreated(result) => self.handle_post_created(result),
            FeedEvent::CommentCreated {
                feed_element_id,
                result,
            } => self.handle_comment_created(feed_element_id, result),
            FeedEvent::LikeSettled {
                feed_element_id,
                feed_version,
                liked,
                result,
            } => self.handle_like_settled(&feed_element_id, feed_version, liked, result),
            FeedEvent::UsersFound {
                generation,
                term,
                result,
            } => self.handle_users_found(generation, &term, result),
            FeedEvent::PostUpdated(result) => {
                self.finish_write("post_update", result, "Post updated successfully");
            }
            FeedEvent::PostDeleted(result) => {
                self.finish_write("post_delete", result, "Post deleted successfully");
            }
            FeedEvent::CommentUpdated(result) => {
                self.finish_write("comment_update", result, "Comment updated successfully");
            }
            FeedEvent::CommentDeleted(result) => {
                self.finish_write("comment_delete", result, "Comment deleted successfully");
            }
        }
    }

    fn handle_feed_loaded(&mut self, generation: u64, result: Result<FeedPage, ServiceError>) {
        if generation != self.load_generation {
            tracing::debug!(
                expected = self.load_generation,
                got = generation,
                "Ignoring stale feed load (generation mismatch)"
            );
            return;
        }
        self.loading_feed = false;

        match result {
            Ok(page) => {
                tracing::info!(
                    count = page.elements.len(),
                    has_more = page.next_page_token.is_some(),
                    "Feed loaded"
                );
                self.items = std::sync::Arc::new(page.elements);
                self.feed_version += 1;
                self.like_trackers.clear();
                self.next_page_token = page.next_page_token;
                self.error = None;
            }
            Err(e) => {
                let message = e.user_message();
                tracing::error!(error = %e, "Feed load failed");
                self.error = Some(message.clone());
                self.notify_error(message);
            }
        }
    }

    fn handle_post_created(&mut self, result: Result<FeedElement, ServiceError>) {
        self.writes_in_flight = self.writes_in_flight.saturating_sub(1);

        match result {
            Ok(post) => {
                tracing::info!(feed_element_id = %post.id, "Post published");
                self.new_post_text.clear();
                self.mention.reset();
                self.mention_generation += 1;
                self.notify_success("Post published successfully");
                self.load_feed(None);
            }
            Err(e) => {
                tracing::error!(error = %e, "Post publish failed");
                self.notify_error(e.user_message());
            }
        }
    }

    fn handle_comment_created(&mut self, feed_element_id: String, result: Result<Comment, ServiceError>) {
        self.comments_in_flight.remove(&feed_element_id);

        match result {
            Ok(comment) => {
                tracing::info!(feed_element_id = %feed_element_id, comment_id = %comment.id, "Comment posted");
                self.comment_drafts.remove(&feed_element_id);
                let appended = update_element(&mut self.items, &feed_element_id, |element| {
                    append_comment(element, comment);
                });
                if !appended {
                    tracing::debug!(
                        feed_element_id = %feed_element_id,
                        "Post left the feed before its comment was confirmed"
                    );
                }
                self.notify_success("Comment posted successfully");
            }
            Err(e) => {
                tracing::error!(feed_element_id = %feed_element_id, error = %e, "Comment failed");
                self.notify_error(e.user_message());
            }
        }
    }

    fn handle_like_settled(
        &mut self,
        feed_element_id: &str,
        feed_version: u64,
        liked: bool,
        result: Result<(), ServiceError>,
    ) {
        let tracker = self
            .like_trackers
            .get_mut(feed_element_id)
            .filter(|t| t.feed_version == feed_version);
        let Some(tracker) = tracker else {
            // The reloaded feed already shows what the server holds
            match result {
                Ok(()) => tracing::debug!(feed_element_id, liked, "Like saved"),
                Err(e) => {
                    tracing::debug!(feed_element_id, error = %e, "Like toggle failed after a reload, keeping reloaded state");
                    self.notify_error(e.user_message());
                }
            }
            return;
        };

        let rollback = tracker.settle(liked, result.is_ok());
        let pending = tracker.pending;
        if pending == 0 {
            self.like_trackers.remove(feed_element_id);
        }

        let Err(e) = result else {
            tracing::debug!(feed_element_id, liked, pending, "Like saved");
            return;
        };

        match rollback {
            Some(confirmed) => {
                tracing::warn!(
                    feed_element_id,
                    liked = confirmed.liked,
                    total = confirmed.total,
                    error = %e,
                    "Like toggle failed, rolling back"
                );
                update_element(&mut self.items, feed_element_id, |element| {
                    restore_like(element, confirmed);
                });
            }
            None => {
                tracing::debug!(
                    feed_element_id,
                    pending,
                    error = %e,
                    "Like toggle failed, rollback waits for pending toggles"
                );
            }
        }
        self.notify_error(e.user_message());
    }

    fn handle_users_found(&mut self, generation: u64, term: &str, result: Result<Vec<User>, ServiceError>) {
        if generation != self.mention_generation {
            tracing::debug!(
                expected = self.mention_generation,
                got = generation,
                term,
                "Ignoring stale user search"
            );
            return;
        }

        match result {
            Ok(users) => {
                tracing::trace!(term, count = users.len(), "User search finished");
                self.mention.suggestions = users;
            }
            Err(e) => {
                tracing::warn!(term, error = %e, "User search failed");
                self.mention.suggestions.clear();
            }
        }
    }

    /// Shared ending of update and delete calls: notify, then reload on success.
    fn finish_write(&mut self, task: &'static str, result: Result<(), ServiceError>, success: &'static str) {
        self.writes_in_flight = self.writes_in_flight.saturating_sub(1);

        match result {
            Ok(()) => {
                tracing::info!(task, "Write confirmed");
                self.notify_success(success);
                self.load_feed(None);
            }
            Err(e) => {
                tracing::error!(task, error = %e, "Write failed");
                self.notify_error(e.user_message());
            }
        }
    }
}
