//! Plain-text rendering of feed rows for the terminal.
//!
//! All text coming from the service is passed through `strip_control_chars`
//! before it reaches stdout.

use chatter::feed::{FeedItemView, Notification};
use chatter::model::User;
use chatter::util::{single_line, strip_control_chars, truncate_to_width};
use std::fmt::Write;

/// Fallback width when `COLUMNS` is unset or unparsable.
pub const DEFAULT_WIDTH: usize = 100;
const MIN_WIDTH: usize = 20;

const INDENT: &str = "  ";
const COMMENT_INDENT: &str = "    ";

/// Terminal width from `COLUMNS`, clamped to something usable.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_WIDTH)
        .max(MIN_WIDTH)
}

fn clean_line(s: &str, width: usize) -> String {
    let flat = single_line(&strip_control_chars(s));
    truncate_to_width(&flat, width).into_owned()
}

fn plural(n: u32, single: bool, one: &str, many: &str) -> String {
    if single {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn render_item(out: &mut String, item: &FeedItemView, width: usize) {
    let mut header = format!("[{}] {}", item.id, item.actor_name);
    if let Some(parent) = &item.parent_name {
        let _ = write!(header, " > {parent}");
    }
    let _ = write!(header, " - {}", item.formatted_date);
    if item.is_current_user_post {
        header.push_str(" (you)");
    }
    let _ = writeln!(out, "{}", clean_line(&header, width));

    let body_width = width.saturating_sub(INDENT.len());
    let _ = writeln!(out, "{INDENT}{}", clean_line(&item.body_text, body_width));

    if item.has_interactions {
        let mut counts = Vec::with_capacity(2);
        if item.has_likes {
            let likes = plural(item.like_count, item.is_single_like, "like", "likes");
            counts.push(if item.is_liked {
                format!("{likes} (liked)")
            } else {
                likes
            });
        }
        if item.has_comments {
            counts.push(plural(
                item.comment_count,
                item.is_single_comment,
                "comment",
                "comments",
            ));
        }
        let _ = writeln!(out, "{INDENT}{}", counts.join(" | "));
    }

    let comment_width = width.saturating_sub(COMMENT_INDENT.len());
    for comment in &item.comments {
        let line = format!(
            "[{}] {} - {}: {}",
            comment.id, comment.user_name, comment.formatted_date, comment.body_text
        );
        let _ = writeln!(out, "{COMMENT_INDENT}{}", clean_line(&line, comment_width));
    }
}

/// Render feed rows separated by blank lines.
pub fn render_feed(items: &[FeedItemView], width: usize) -> String {
    if items.is_empty() {
        return "No posts yet.\n".to_string();
    }

    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_item(&mut out, item, width);
    }
    out
}

/// Render mention suggestions with the token to paste into a post.
pub fn render_users(users: &[User], width: usize) -> String {
    if users.is_empty() {
        return "No matching users.\n".to_string();
    }

    let mut out = String::new();
    for user in users {
        let line = format!("{}  @[{}:{}]", user.name, user.id, user.name);
        let _ = writeln!(out, "{}", clean_line(&line, width));
    }
    out
}

pub fn render_notification(notification: &Notification) -> String {
    format!(
        "{}: {}",
        notification.title(),
        strip_control_chars(&notification.message)
    )
}
