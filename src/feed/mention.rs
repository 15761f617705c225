//! `@`-mention autocomplete over the post input buffer.
//!
//! All positions are char offsets into the buffer, so multi-byte text before
//! the `@` never splits a code point.

use crate::model::User;

/// Where the cursor sits relative to the nearest preceding `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionState {
    /// No `@` before the cursor, or whitespace after it.
    Inactive,
    /// `@` directly before the cursor; nothing typed yet.
    JustTriggered { start: usize },
    /// A partial name between the `@` and the cursor.
    Typing { start: usize, term: String },
}

/// Autocomplete state bound to the post input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionContext {
    /// Char index of the triggering `@`, `None` when inactive.
    pub start_index: Option<usize>,
    pub search_term: String,
    pub suggestions: Vec<User>,
    pub visible: bool,
}

impl MentionContext {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a freshly detected state. Returns the term to search for, if any.
    ///
    /// A cursor move that leaves the same term in place does not search again.
    pub fn apply(&mut self, state: MentionState) -> Option<String> {
        match state {
            MentionState::Inactive => {
                self.start_index = None;
                self.search_term.clear();
                self.visible = false;
                None
            }
            MentionState::JustTriggered { start } => {
                self.start_index = Some(start);
                self.search_term.clear();
                self.visible = false;
                None
            }
            MentionState::Typing { start, term } => {
                let unchanged =
                    self.visible && self.start_index == Some(start) && self.search_term == term;
                self.start_index = Some(start);
                self.search_term = term;
                self.visible = true;
                (!unchanged).then(|| self.search_term.clone())
            }
        }
    }
}

/// Inspect the text before `cursor` for an unterminated mention.
///
/// Only the nearest `@` before the cursor is considered. A cursor past the end
/// of the text is treated as sitting at the end.
pub fn detect_mention(text: &str, cursor: usize) -> MentionState {
    let before: Vec<char> = text.chars().take(cursor).collect();

    let Some(at) = before.iter().rposition(|&c| c == '@') else {
        return MentionState::Inactive;
    };

    let after = &before[at + 1..];
    if after.is_empty() {
        return MentionState::JustTriggered { start: at };
    }
    if after.iter().any(|c| c.is_whitespace()) {
        return MentionState::Inactive;
    }

    MentionState::Typing {
        start: at,
        term: after.iter().collect(),
    }
}

/// Canonical inline token for a mention, understood by the server.
pub fn mention_token(user: &User) -> String {
    format!("@[{}:{}]", user.id, user.name)
}

/// Replace `@term` starting at `start` with the mention token for `user`.
///
/// The replaced span is `[start, start + len(term) + 1)` in chars; anything
/// past the end of the text is clamped.
pub fn splice_mention(text: &str, start: usize, term: &str, user: &User) -> String {
    let span = term.chars().count() + 1;
    let before: String = text.chars().take(start).collect();
    let after: String = text.chars().skip(start + span).collect();
    format!("{}{}{}", before, mention_token(user), after)
}
