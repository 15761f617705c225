//! Feed view-model: state, user intents and the display projection.
//!
//! This module turns the raw feed returned by a [`FeedService`](crate::api::FeedService)
//! into something a UI can render and interact with:
//!
//! - **State**: [`FeedViewModel`] owns the loaded posts, drafts, edit modes and
//!   the transient notification
//! - **Events**: remote calls run in background tasks and report back as
//!   [`FeedEvent`]s, applied with [`FeedViewModel::handle_event`]
//! - **Projection**: [`FeedViewModel::view`] derives display rows with relative
//!   dates, rendered mentions and counters
//!
//! # Architecture
//!
//! - [`mention`] - `@name` detection and mention token splicing
//! - [`patch`] - copy-on-write updates of one post or comment by id
//! - [`projection`] - pure display derivation
//! - [`confirm`] - the confirmation seam used before deletes
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let mut vm = FeedViewModel::new(service, AutoConfirm(true), settings, tx);
//! vm.load_feed(None);
//! while let Some(event) = rx.recv().await {
//!     vm.handle_event(event);
//!     if vm.is_idle() {
//!         break;
//!     }
//! }
//! for row in vm.view(chrono::Utc::now()) {
//!     println!("{}: {}", row.actor_name, row.body_text);
//! }
//! ```

pub mod confirm;
mod events;
pub mod mention;
pub mod patch;
pub mod projection;
mod state;
mod tasks;

pub use confirm::{AutoConfirm, Confirm};
pub use events::FeedEvent;
pub use mention::{MentionContext, MentionState};
pub use patch::LikeSnapshot;
pub use projection::{CommentView, FeedItemView};
pub use state::{FeedError, FeedSettings, FeedViewModel, Notification, NotificationKind};
