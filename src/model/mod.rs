//! Wire types for the chatter feed.
//!
//! These mirror the JSON returned by the feed service. Every optional part of
//! the payload deserializes to `None`/empty so a sparse response never fails,
//! and the accessor methods on [`FeedElement`] and [`Comment`] fold missing
//! capabilities to `0`/`false`.

mod types;

pub use types::{
    Actor, BookmarksCapability, Comment, CommentCapabilities, CommentPage, CommentsCapability,
    DeleteCapability, EditCapability, FeedCapabilities, FeedElement, FeedPage, FeedQuery,
    LikePage, LikesCapability, MessageBody, MessageSegment, MuteCapability, Parent, Photo,
    SortOrder, User,
};
