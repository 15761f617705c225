use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// People
// ============================================================================

/// Profile photo links attached to actors and comment authors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Photo {
    pub small_photo_url: Option<String>,
}

/// The author of a post or comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub photo: Option<Photo>,
}

impl Actor {
    pub fn small_photo_url(&self) -> Option<&str> {
        self.photo.as_ref()?.small_photo_url.as_deref()
    }
}

/// The record a post was made on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parent {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// A user returned by the mention search.
///
/// Accepts both the gateway's camelCase and the platform's PascalCase field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "SmallPhotoUrl")]
    pub small_photo_url: Option<String>,
}

// ============================================================================
// Rich Text
// ============================================================================

/// One piece of a message body.
///
/// Segment kinds other than text and mentions (links, hashtags, ...) are kept as
/// `Other` and contribute nothing to the plain-text rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageSegment {
    Text {
        #[serde(default)]
        text: String,
    },
    Mention {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageBody {
    /// Flat rendering supplied by the server, used when there are no segments.
    pub text: Option<String>,
    pub message_segments: Vec<MessageSegment>,
}

// ============================================================================
// Capabilities
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikePage {
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LikesCapability {
    pub is_liked_by_current_user: bool,
    pub page: Option<LikePage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentPage {
    pub items: Vec<Comment>,
    pub total: u32,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsCapability {
    pub page: Option<CommentPage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookmarksCapability {
    pub is_bookmarked_by_current_user: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MuteCapability {
    pub is_muted_by_me: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditCapability {
    pub is_editable_by_me: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteCapability {
    pub is_deletable_by_me: bool,
}

/// Server-controlled sub-records of a post. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedCapabilities {
    pub comments: Option<CommentsCapability>,
    pub chatter_likes: Option<LikesCapability>,
    pub bookmarks: Option<BookmarksCapability>,
    pub mute: Option<MuteCapability>,
    pub edit: Option<EditCapability>,
    pub delete: Option<DeleteCapability>,
}

/// Server-controlled sub-records of a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentCapabilities {
    pub chatter_likes: Option<LikesCapability>,
    pub edit: Option<EditCapability>,
    pub delete: Option<DeleteCapability>,
}

// ============================================================================
// Feed Entities
// ============================================================================

/// A comment on a post.
///
/// `is_editing` and `edit_text` are client-only and never cross the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub id: String,
    pub user: Option<Actor>,
    pub created_date: Option<String>,
    pub body: Option<MessageBody>,
    pub capabilities: Option<CommentCapabilities>,
    #[serde(skip)]
    pub is_editing: bool,
    #[serde(skip)]
    pub edit_text: String,
}

impl Comment {
    fn likes(&self) -> Option<&LikesCapability> {
        self.capabilities.as_ref()?.chatter_likes.as_ref()
    }

    pub fn is_liked(&self) -> bool {
        self.likes().is_some_and(|l| l.is_liked_by_current_user)
    }

    pub fn like_count(&self) -> u32 {
        self.likes().and_then(|l| l.page).map_or(0, |p| p.total)
    }

    pub fn can_edit(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.edit)
            .is_some_and(|e| e.is_editable_by_me)
    }

    pub fn can_delete(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.delete)
            .is_some_and(|d| d.is_deletable_by_me)
    }
}

/// One top-level post in the feed.
///
/// `is_editing` and `edit_text` are client-only and never cross the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedElement {
    pub id: String,
    pub actor: Option<Actor>,
    pub parent: Option<Parent>,
    pub created_date: Option<String>,
    pub body: Option<MessageBody>,
    pub capabilities: Option<FeedCapabilities>,
    #[serde(skip)]
    pub is_editing: bool,
    #[serde(skip)]
    pub edit_text: String,
}

impl FeedElement {
    fn likes(&self) -> Option<&LikesCapability> {
        self.capabilities.as_ref()?.chatter_likes.as_ref()
    }

    fn comment_page(&self) -> Option<&CommentPage> {
        self.capabilities.as_ref()?.comments.as_ref()?.page.as_ref()
    }

    pub fn comments(&self) -> &[Comment] {
        self.comment_page().map_or(&[], |p| p.items.as_slice())
    }

    pub fn comment_count(&self) -> u32 {
        self.comment_page().map_or(0, |p| p.total)
    }

    pub fn is_liked(&self) -> bool {
        self.likes().is_some_and(|l| l.is_liked_by_current_user)
    }

    pub fn like_count(&self) -> u32 {
        self.likes().and_then(|l| l.page).map_or(0, |p| p.total)
    }

    pub fn is_bookmarked(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.bookmarks)
            .is_some_and(|b| b.is_bookmarked_by_current_user)
    }

    pub fn is_muted(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.mute)
            .is_some_and(|m| m.is_muted_by_me)
    }

    pub fn can_edit(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.edit)
            .is_some_and(|e| e.is_editable_by_me)
    }

    pub fn can_delete(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.delete)
            .is_some_and(|d| d.is_deletable_by_me)
    }

    /// Like sub-record, created empty if the server omitted it.
    pub fn likes_mut(&mut self) -> &mut LikesCapability {
        self.capabilities
            .get_or_insert_with(FeedCapabilities::default)
            .chatter_likes
            .get_or_insert_with(LikesCapability::default)
    }

    /// Comment page, created empty if the server omitted it.
    pub fn comment_page_mut(&mut self) -> &mut CommentPage {
        self.capabilities
            .get_or_insert_with(FeedCapabilities::default)
            .comments
            .get_or_insert_with(CommentsCapability::default)
            .page
            .get_or_insert_with(CommentPage::default)
    }

    pub fn find_comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.capabilities
            .as_mut()?
            .comments
            .as_mut()?
            .page
            .as_mut()?
            .items
            .iter_mut()
            .find(|c| c.id == comment_id)
    }
}

// ============================================================================
// Paging
// ============================================================================

/// One page of the feed as returned by the list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedPage {
    pub elements: Vec<FeedElement>,
    /// `None` at the end of the feed.
    pub next_page_token: Option<String>,
}

/// Ordering of posts in the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Newest posts first.
    #[default]
    Latest,
    /// Oldest posts first.
    Oldest,
}

impl SortOrder {
    /// Wire value understood by the feed service.
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Latest => "CreatedDateDesc",
            SortOrder::Oldest => "CreatedDateAsc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Latest => "Latest Posts",
            SortOrder::Oldest => "Oldest Posts",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" | "newest" | "createddatedesc" => Ok(SortOrder::Latest),
            "oldest" | "createddateasc" => Ok(SortOrder::Oldest),
            other => Err(format!(
                "unknown sort order '{}' (expected 'latest' or 'oldest')",
                other
            )),
        }
    }
}

/// Parameters of a single list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub record_id: String,
    pub page_size: u32,
    pub page_token: Option<String>,
    pub sort: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE_JSON: &str = r##"{
        "elements": [{
            "id": "0D5xx0000001",
            "actor": {"id": "005A", "name": "Ada", "photo": {"smallPhotoUrl": "/photo/ada"}},
            "createdDate": "2024-03-01T10:00:00.000Z",
            "body": {
                "text": "Hi @Bob",
                "messageSegments": [
                    {"type": "Text", "text": "Hi "},
                    {"type": "Mention", "id": "005B", "name": "Bob", "text": "@Bob"},
                    {"type": "Hashtag", "text": "#x"}
                ]
            },
            "capabilities": {
                "chatterLikes": {"isLikedByCurrentUser": true, "page": {"total": 4}},
                "comments": {"page": {"items": [{"id": "0D7xx1", "user": {"id": "005B", "name": "Bob"}}], "total": 1}},
                "edit": {"isEditableByMe": true},
                "mute": {"isMutedByMe": false}
            }
        }],
        "nextPageToken": "token-2"
    }"##;

    #[test]
    fn test_page_deserializes_with_capabilities() {
        let page: FeedPage = serde_json::from_str(PAGE_JSON).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("token-2"));

        let element = &page.elements[0];
        assert_eq!(element.like_count(), 4);
        assert!(element.is_liked());
        assert_eq!(element.comment_count(), 1);
        assert_eq!(element.comments()[0].id, "0D7xx1");
        assert!(element.can_edit());
        assert!(!element.can_delete());
        assert!(!element.is_bookmarked());
        assert_eq!(
            element.actor.as_ref().and_then(|a| a.small_photo_url()),
            Some("/photo/ada")
        );
    }

    #[test]
    fn test_unknown_segment_type_is_other() {
        let page: FeedPage = serde_json::from_str(PAGE_JSON).unwrap();
        let segments = &page.elements[0].body.as_ref().unwrap().message_segments;
        assert_eq!(segments[2], MessageSegment::Other);
    }

    #[test]
    fn test_bare_element_defaults_everything() {
        let element: FeedElement = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(element.comment_count(), 0);
        assert_eq!(element.like_count(), 0);
        assert!(element.comments().is_empty());
        assert!(!element.is_liked());
        assert!(!element.can_edit());
        assert!(!element.can_delete());
        assert!(!element.is_editing);
    }

    #[test]
    fn test_transient_fields_not_serialized() {
        let element = FeedElement {
            id: "x".to_string(),
            is_editing: true,
            edit_text: "draft".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&element).unwrap();
        assert!(!json.contains("isEditing"));
        assert!(!json.contains("draft"));
    }

    #[test]
    fn test_null_page_token_is_end_of_feed() {
        let page: FeedPage =
            serde_json::from_str(r#"{"elements": [], "nextPageToken": null}"#).unwrap();
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_user_accepts_platform_casing() {
        let users: Vec<User> = serde_json::from_str(
            r#"[{"Id": "005A", "Name": "Ada", "SmallPhotoUrl": "/p"}, {"id": "005B", "name": "Bob"}]"#,
        )
        .unwrap();
        assert_eq!(users[0].id, "005A");
        assert_eq!(users[0].small_photo_url.as_deref(), Some("/p"));
        assert_eq!(users[1].name, "Bob");
    }

    #[test]
    fn test_mutable_accessors_create_missing_records() {
        let mut element = FeedElement::default();
        element.likes_mut().is_liked_by_current_user = true;
        element.comment_page_mut().total = 3;
        assert!(element.is_liked());
        assert_eq!(element.comment_count(), 3);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("latest".parse::<SortOrder>(), Ok(SortOrder::Latest));
        assert_eq!("Oldest".parse::<SortOrder>(), Ok(SortOrder::Oldest));
        assert_eq!(
            "CreatedDateAsc".parse::<SortOrder>(),
            Ok(SortOrder::Oldest)
        );
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::Latest.as_str(), "CreatedDateDesc");
    }
}
