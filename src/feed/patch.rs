//! Structural updates of the feed tree.
//!
//! The feed lives in an `Arc<Vec<FeedElement>>` so projections and hosts can
//! hold cheap snapshots. Every mutation goes through these helpers, which
//! locate the target by id and apply a closure via `Arc::make_mut`: the vector
//! is cloned only when a snapshot is still alive, and not at all when the id is
//! missing. A missing id is not an error; the item was replaced by a reload.

use crate::model::{Comment, FeedElement};
use std::sync::Arc;

/// Like state of one post, captured before an optimistic toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub liked: bool,
    pub total: u32,
}

impl LikeSnapshot {
    pub fn of(element: &FeedElement) -> Self {
        Self {
            liked: element.is_liked(),
            total: element.like_count(),
        }
    }

    /// The state after the server accepted a like (`true`) or unlike.
    ///
    /// Accepting the state the post is already in changes nothing.
    pub fn with_liked(self, liked: bool) -> Self {
        if self.liked == liked {
            return self;
        }
        let total = if liked {
            self.total.saturating_add(1)
        } else {
            self.total.saturating_sub(1)
        };
        Self { liked, total }
    }
}

/// Like bookkeeping for one post while toggles are in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeTracker {
    /// What the server is known to hold, ignoring toggles still in flight.
    pub confirmed: LikeSnapshot,
    pub pending: u32,
    /// Feed version the confirmed state was read from.
    pub feed_version: u64,
}

impl LikeTracker {
    pub fn new(confirmed: LikeSnapshot, feed_version: u64) -> Self {
        Self {
            confirmed,
            pending: 0,
            feed_version,
        }
    }

    /// Record the outcome of one toggle. Returns the state to show when the
    /// visible state has to be rolled back.
    ///
    /// A failure rolls back only once nothing else is pending; until then a
    /// later toggle may still succeed and move the confirmed state.
    pub fn settle(&mut self, liked: bool, accepted: bool) -> Option<LikeSnapshot> {
        self.pending = self.pending.saturating_sub(1);
        if accepted {
            self.confirmed = self.confirmed.with_liked(liked);
            return None;
        }
        (self.pending == 0).then_some(self.confirmed)
    }
}

/// Apply `f` to the post with `id`. Returns false if there is no such post.
pub fn update_element<F>(items: &mut Arc<Vec<FeedElement>>, id: &str, f: F) -> bool
where
    F: FnOnce(&mut FeedElement),
{
    if !items.iter().any(|e| e.id == id) {
        return false;
    }
    let items = Arc::make_mut(items);
    match items.iter_mut().find(|e| e.id == id) {
        Some(element) => {
            f(element);
            true
        }
        None => false,
    }
}

/// Apply `f` to comment `comment_id` under post `element_id`.
pub fn update_comment<F>(
    items: &mut Arc<Vec<FeedElement>>,
    element_id: &str,
    comment_id: &str,
    f: F,
) -> bool
where
    F: FnOnce(&mut Comment),
{
    let exists = items
        .iter()
        .find(|e| e.id == element_id)
        .is_some_and(|e| e.comments().iter().any(|c| c.id == comment_id));
    if !exists {
        return false;
    }

    let mut found = false;
    update_element(items, element_id, |element| {
        if let Some(comment) = element.find_comment_mut(comment_id) {
            f(comment);
            found = true;
        }
    });
    found
}

/// Set the like flag and move the counter one step in the matching direction.
///
/// Returns the state before the change so it can be restored exactly.
pub fn apply_like(element: &mut FeedElement, liked: bool) -> LikeSnapshot {
    let before = LikeSnapshot::of(element);
    let likes = element.likes_mut();
    likes.is_liked_by_current_user = liked;
    let page = likes.page.get_or_insert_with(Default::default);
    page.total = if liked {
        before.total.saturating_add(1)
    } else {
        before.total.saturating_sub(1)
    };
    before
}

/// Put back exactly the like state captured in `snapshot`.
pub fn restore_like(element: &mut FeedElement, snapshot: LikeSnapshot) {
    let likes = element.likes_mut();
    likes.is_liked_by_current_user = snapshot.liked;
    likes.page.get_or_insert_with(Default::default).total = snapshot.total;
}

/// Append a server-confirmed comment and bump the comment total by one.
pub fn append_comment(element: &mut FeedElement, comment: Comment) {
    let page = element.comment_page_mut();
    page.items.push(comment);
    page.total = page.total.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommentPage, CommentsCapability, FeedCapabilities};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn element(id: &str) -> FeedElement {
        FeedElement {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn element_with_comment(id: &str, comment_id: &str) -> FeedElement {
        FeedElement {
            id: id.to_string(),
            capabilities: Some(FeedCapabilities {
                comments: Some(CommentsCapability {
                    page: Some(CommentPage {
                        items: vec![Comment {
                            id: comment_id.to_string(),
                            ..Default::default()
                        }],
                        total: 1,
                        next_page_token: None,
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_update_element_targets_one_item() {
        let mut items = Arc::new(vec![element("a"), element("b")]);
        assert!(update_element(&mut items, "b", |e| e.is_editing = true));
        assert!(!items[0].is_editing);
        assert!(items[1].is_editing);
    }

    #[test]
    fn test_update_missing_element_does_not_clone() {
        let mut items = Arc::new(vec![element("a")]);
        let snapshot = Arc::clone(&items);
        assert!(!update_element(&mut items, "zzz", |e| e.is_editing = true));
        assert!(Arc::ptr_eq(&items, &snapshot));
    }

    #[test]
    fn test_update_leaves_snapshot_untouched() {
        let mut items = Arc::new(vec![element("a")]);
        let snapshot = Arc::clone(&items);
        update_element(&mut items, "a", |e| e.edit_text = "new".to_string());
        assert_eq!(snapshot[0].edit_text, "");
        assert_eq!(items[0].edit_text, "new");
    }

    #[test]
    fn test_update_comment() {
        let mut items = Arc::new(vec![element_with_comment("a", "c1"), element("b")]);
        assert!(update_comment(&mut items, "a", "c1", |c| c.is_editing = true));
        assert!(items[0].comments()[0].is_editing);
        assert!(!update_comment(&mut items, "b", "c1", |c| c.is_editing = true));
        assert!(!update_comment(&mut items, "a", "c2", |c| c.is_editing = true));
    }

    #[test]
    fn test_apply_like_on_bare_element() {
        let mut e = element("a");
        let before = apply_like(&mut e, true);
        assert_eq!(before, LikeSnapshot { liked: false, total: 0 });
        assert!(e.is_liked());
        assert_eq!(e.like_count(), 1);
    }

    #[test]
    fn test_unlike_never_underflows() {
        let mut e = element("a");
        apply_like(&mut e, false);
        assert_eq!(e.like_count(), 0);
    }

    #[test]
    fn test_with_liked_is_idempotent() {
        let unliked = LikeSnapshot { liked: false, total: 7 };
        assert_eq!(unliked.with_liked(false), unliked);
        assert_eq!(unliked.with_liked(true), LikeSnapshot { liked: true, total: 8 });
        assert_eq!(unliked.with_liked(true).with_liked(false), unliked);
    }

    #[test]
    fn test_tracker_waits_for_last_pending_toggle() {
        let mut tracker = LikeTracker::new(LikeSnapshot { liked: false, total: 7 }, 1);
        tracker.pending = 2;
        assert_eq!(tracker.settle(true, false), None);
        assert_eq!(
            tracker.settle(false, false),
            Some(LikeSnapshot { liked: false, total: 7 })
        );
    }

    #[test]
    fn test_tracker_rolls_back_to_accepted_state() {
        let mut tracker = LikeTracker::new(LikeSnapshot { liked: false, total: 7 }, 1);
        tracker.pending = 2;
        assert_eq!(tracker.settle(true, true), None);
        assert_eq!(
            tracker.settle(false, false),
            Some(LikeSnapshot { liked: true, total: 8 })
        );
        assert_eq!(tracker.pending, 0);
    }

    #[test]
    fn test_append_comment_bumps_total() {
        let mut e = element_with_comment("a", "c1");
        append_comment(
            &mut e,
            Comment {
                id: "c2".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(e.comment_count(), 2);
        assert_eq!(e.comments()[1].id, "c2");
    }

    #[test]
    fn test_append_comment_creates_page() {
        let mut e = element("a");
        append_comment(&mut e, Comment::default());
        assert_eq!(e.comment_count(), 1);
        assert_eq!(e.comments().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_like_then_restore_round_trips(liked in any::<bool>(), total in 0u32..10_000) {
            let mut e = element("a");
            {
                let likes = e.likes_mut();
                likes.is_liked_by_current_user = liked;
                likes.page = Some(crate::model::LikePage { total });
            }
            let snapshot = apply_like(&mut e, !liked);
            restore_like(&mut e, snapshot);
            prop_assert_eq!(e.is_liked(), liked);
            prop_assert_eq!(e.like_count(), total);
        }
    }
}
