//! Display projection of the feed.
//!
//! Everything here is a pure function of the raw feed, the caller's context
//! and an explicit `now`. Nothing reads the clock or mutates the feed, so the
//! host can re-project after every state change.

use crate::model::{Comment, FeedElement, MessageBody, MessageSegment};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

/// Avatar shown when the server sends no photo.
pub const DEFAULT_AVATAR_URL: &str = "/img/profile/avatar.png";

/// Default format for dates older than a week (US short date).
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Inputs the projection needs besides the feed itself.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub current_user_id: &'a str,
    pub drafts: &'a HashMap<String, String>,
    pub now: DateTime<Utc>,
    pub date_format: &'a str,
    /// Case-insensitive filter on body text and author name; blank keeps everything.
    pub search_term: &'a str,
}

/// Display-ready comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: String,
    pub formatted_date: String,
    pub user_name: String,
    pub user_url: String,
    pub user_photo_url: String,
    pub body_text: String,
    pub body_html: String,
    pub is_liked: bool,
    pub like_count: u32,
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_current_user_comment: bool,
    pub is_editing: bool,
    pub edit_text: String,
}

/// Display-ready post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedItemView {
    pub id: String,
    pub is_liked: bool,
    pub like_count: u32,
    pub comment_count: u32,
    pub has_likes: bool,
    pub has_comments: bool,
    pub has_interactions: bool,
    pub is_single_comment: bool,
    pub is_single_like: bool,
    /// The user's unsent comment draft for this post.
    pub comment_text: String,
    pub formatted_date: String,
    pub actor_name: String,
    pub actor_url: String,
    pub actor_photo_url: String,
    pub parent_name: Option<String>,
    pub parent_url: Option<String>,
    pub body_text: String,
    pub body_html: String,
    pub is_bookmarked: bool,
    pub is_muted: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_current_user_post: bool,
    pub is_editing: bool,
    pub edit_text: String,
    pub comments: Vec<CommentView>,
}

/// Parse a server timestamp.
///
/// Accepts RFC 3339 and the platform's `+0000` offset form.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Human-friendly age of a timestamp.
///
/// Under a minute is "Just now", then minutes, hours and days up to a week;
/// anything older is a local date in `date_format`.
pub fn format_relative(created: DateTime<Utc>, now: DateTime<Utc>, date_format: &str) -> String {
    let elapsed = now.signed_duration_since(created);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        format_date(created, date_format)
    }
}

fn format_date(created: DateTime<Utc>, date_format: &str) -> String {
    let local = created.with_timezone(&Local);
    let mut out = String::new();
    if write!(out, "{}", local.format(date_format)).is_err() {
        tracing::warn!(date_format, "Invalid date format, falling back to ISO date");
        return local.date_naive().to_string();
    }
    out
}

fn format_optional_date(created: Option<&str>, ctx: &ProjectionContext<'_>) -> String {
    created
        .and_then(parse_timestamp)
        .map(|dt| format_relative(dt, ctx.now, ctx.date_format))
        .unwrap_or_default()
}

/// Plain-text rendering of a rich-text body.
///
/// Text segments are concatenated and mentions become `@name`. A body with no
/// segments falls back to its flat `text`.
pub fn extract_text(body: Option<&MessageBody>) -> String {
    let Some(body) = body else {
        return String::new();
    };
    if body.message_segments.is_empty() {
        return body.text.clone().unwrap_or_default();
    }

    let mut text = String::new();
    for segment in &body.message_segments {
        match segment {
            MessageSegment::Text { text: t } => text.push_str(t),
            MessageSegment::Mention { name, text: t, .. } => {
                let label = name.as_deref().or(t.as_deref()).unwrap_or_default();
                // The segment text usually carries its own '@'
                text.push('@');
                text.push_str(label.strip_prefix('@').unwrap_or(label));
            }
            MessageSegment::Other => {}
        }
    }
    text
}

/// HTML rendering of a rich-text body with mentions linked to user pages.
pub fn format_body_html(body: Option<&MessageBody>) -> String {
    use quick_xml::escape::escape;

    let Some(body) = body else {
        return String::new();
    };
    if body.message_segments.is_empty() {
        return escape(body.text.as_deref().unwrap_or_default()).into_owned();
    }

    let mut html = String::new();
    for segment in &body.message_segments {
        match segment {
            MessageSegment::Text { text } => html.push_str(&escape(text.as_str())),
            MessageSegment::Mention { id, name, text } => {
                let label = name.as_deref().or(text.as_deref()).unwrap_or_default();
                let label = label.strip_prefix('@').unwrap_or(label);
                let _ = write!(
                    html,
                    r#"<a href="/{}" class="mention-link">@{}</a>"#,
                    escape(id.as_deref().unwrap_or_default()),
                    escape(label)
                );
            }
            MessageSegment::Other => {}
        }
    }
    html
}

fn profile_url(id: Option<&str>) -> String {
    format!("/{}", id.unwrap_or_default())
}

pub fn project_comment(comment: &Comment, ctx: &ProjectionContext<'_>) -> CommentView {
    let user = comment.user.as_ref();
    let user_id = user.map(|u| u.id.as_str());

    CommentView {
        id: comment.id.clone(),
        formatted_date: format_optional_date(comment.created_date.as_deref(), ctx),
        user_name: user.map(|u| u.name.clone()).unwrap_or_default(),
        user_url: profile_url(user_id),
        user_photo_url: user
            .and_then(|u| u.small_photo_url())
            .unwrap_or(DEFAULT_AVATAR_URL)
            .to_string(),
        body_text: extract_text(comment.body.as_ref()),
        body_html: format_body_html(comment.body.as_ref()),
        is_liked: comment.is_liked(),
        like_count: comment.like_count(),
        can_edit: comment.can_edit(),
        can_delete: comment.can_delete(),
        is_current_user_comment: user_id.is_some_and(|id| id == ctx.current_user_id),
        is_editing: comment.is_editing,
        edit_text: comment.edit_text.clone(),
    }
}

pub fn project_element(element: &FeedElement, ctx: &ProjectionContext<'_>) -> FeedItemView {
    let actor = element.actor.as_ref();
    let actor_id = actor.map(|a| a.id.as_str());
    let parent = element.parent.as_ref();
    let comment_count = element.comment_count();
    let like_count = element.like_count();

    FeedItemView {
        id: element.id.clone(),
        is_liked: element.is_liked(),
        like_count,
        comment_count,
        has_likes: like_count > 0,
        has_comments: comment_count > 0,
        has_interactions: comment_count > 0 || like_count > 0,
        is_single_comment: comment_count == 1,
        is_single_like: like_count == 1,
        comment_text: ctx.drafts.get(&element.id).cloned().unwrap_or_default(),
        formatted_date: format_optional_date(element.created_date.as_deref(), ctx),
        actor_name: actor.map(|a| a.name.clone()).unwrap_or_default(),
        actor_url: profile_url(actor_id),
        actor_photo_url: actor
            .and_then(|a| a.small_photo_url())
            .unwrap_or(DEFAULT_AVATAR_URL)
            .to_string(),
        parent_name: parent.and_then(|p| p.name.clone()),
        parent_url: parent.and_then(|p| p.id.as_deref()).map(|id| format!("/{}", id)),
        body_text: extract_text(element.body.as_ref()),
        body_html: format_body_html(element.body.as_ref()),
        is_bookmarked: element.is_bookmarked(),
        is_muted: element.is_muted(),
        can_edit: element.can_edit(),
        can_delete: element.can_delete(),
        is_current_user_post: actor_id.is_some_and(|id| id == ctx.current_user_id),
        is_editing: element.is_editing,
        edit_text: element.edit_text.clone(),
        comments: element
            .comments()
            .iter()
            .map(|c| project_comment(c, ctx))
            .collect(),
    }
}

fn matches_search(view: &FeedItemView, needle: &str) -> bool {
    view.body_text.to_lowercase().contains(needle)
        || view.actor_name.to_lowercase().contains(needle)
}

/// Project every post, keeping only those that match the search filter.
pub fn project_feed(items: &[FeedElement], ctx: &ProjectionContext<'_>) -> Vec<FeedItemView> {
    let needle = ctx.search_term.trim().to_lowercase();
    items
        .iter()
        .map(|e| project_element(e, ctx))
        .filter(|view| needle.is_empty() || matches_search(view, &needle))
        .collect()
}
