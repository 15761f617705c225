//! Headless view-model for a record's chatter feed.
//!
//! The crate keeps a paginated feed of posts and comments in memory, applies
//! user intents (posting, commenting, liking, editing, deleting, `@mention`
//! autocomplete) against a [`api::FeedService`], and projects the result into
//! display rows. The `chatter` binary is a small CLI host around it.

pub mod api;
pub mod config;
pub mod feed;
pub mod model;
pub mod util;
