//! In-memory feed service and helpers shared by the integration tests.

#![allow(dead_code)]

use chatter::api::{FeedService, ServiceError};
use chatter::feed::{AutoConfirm, FeedEvent, FeedSettings, FeedViewModel};
use chatter::model::{
    Actor, Comment, CommentPage, CommentsCapability, EditCapability, FeedCapabilities,
    FeedElement, FeedPage, FeedQuery, LikePage, LikesCapability, MessageBody, MessageSegment,
    SortOrder, User,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const ME: &str = "005ME";

#[derive(Default)]
struct FakeState {
    /// Newest first.
    elements: Vec<FeedElement>,
    users: Vec<User>,
    calls: Vec<String>,
    /// Per operation, queued failures consumed one call at a time.
    failures: HashMap<&'static str, VecDeque<Option<String>>>,
    next_id: u32,
}

/// A [`FeedService`] backed by a vector, recording every call.
///
/// Calls never await, so on a current-thread runtime spawned calls complete
/// in the order they were issued.
#[derive(Default)]
pub struct FakeFeedService {
    state: Mutex<FakeState>,
}

impl FakeFeedService {
    pub fn new(elements: Vec<FeedElement>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                elements,
                ..Default::default()
            }),
        }
    }

    pub fn with_users(self, users: Vec<User>) -> Self {
        self.state.lock().unwrap().users = users;
        self
    }

    /// Make the next call to `op` fail with a 500 carrying `message`.
    pub fn fail_next(&self, op: &'static str, message: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.map(str::to_string));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn stored(&self, id: &str) -> Option<FeedElement> {
        self.state
            .lock()
            .unwrap()
            .elements
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Overwrite the stored post with the same id, as another client would.
    pub fn replace(&self, element: FeedElement) {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.elements.iter_mut().find(|e| e.id == element.id) {
            *slot = element;
        }
    }

    fn begin(&self, op: &'static str, call: String) -> Result<std::sync::MutexGuard<'_, FakeState>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(message) = state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(ServiceError::Server {
                status: 500,
                message,
            });
        }
        Ok(state)
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::Server {
        status: 404,
        message: Some(format!("{} not found", id)),
    }
}

impl FeedService for FakeFeedService {
    async fn list_feed(&self, query: &FeedQuery) -> Result<FeedPage, ServiceError> {
        let state = self.begin(
            "list_feed",
            format!(
                "list_feed:{}:{}",
                query.sort.as_str(),
                query.page_token.as_deref().unwrap_or("-")
            ),
        )?;

        let mut ordered = state.elements.clone();
        if query.sort == SortOrder::Oldest {
            ordered.reverse();
        }
        let start: usize = query
            .page_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let end = (start + query.page_size as usize).min(ordered.len());
        let elements = ordered.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        Ok(FeedPage {
            elements,
            next_page_token: (end < ordered.len()).then(|| end.to_string()),
        })
    }

    async fn create_post(&self, record_id: &str, text: &str) -> Result<FeedElement, ServiceError> {
        let mut state = self.begin("create_post", format!("create_post:{}:{}", record_id, text))?;
        state.next_id += 1;
        let post = FeedElement {
            id: format!("new-post-{}", state.next_id),
            actor: Some(actor(ME, "Me")),
            created_date: Some("2024-06-15T12:00:00.000Z".to_string()),
            body: Some(text_body(text)),
            ..Default::default()
        };
        state.elements.insert(0, post.clone());
        Ok(post)
    }

    async fn create_comment(&self, feed_element_id: &str, text: &str) -> Result<Comment, ServiceError> {
        let mut state = self.begin(
            "create_comment",
            format!("create_comment:{}:{}", feed_element_id, text),
        )?;
        state.next_id += 1;
        let comment = Comment {
            id: format!("new-comment-{}", state.next_id),
            user: Some(actor(ME, "Me")),
            body: Some(text_body(text)),
            ..Default::default()
        };
        let element = state
            .elements
            .iter_mut()
            .find(|e| e.id == feed_element_id)
            .ok_or_else(|| not_found(feed_element_id))?;
        let page = element.comment_page_mut();
        page.items.push(comment.clone());
        page.total += 1;
        Ok(comment)
    }

    async fn like(&self, feed_element_id: &str) -> Result<(), ServiceError> {
        let mut state = self.begin("like", format!("like:{}", feed_element_id))?;
        if let Some(e) = state.elements.iter_mut().find(|e| e.id == feed_element_id) {
            let likes = e.likes_mut();
            likes.is_liked_by_current_user = true;
            likes.page.get_or_insert_with(Default::default).total += 1;
        }
        Ok(())
    }

    async fn unlike(&self, feed_element_id: &str) -> Result<(), ServiceError> {
        let mut state = self.begin("unlike", format!("unlike:{}", feed_element_id))?;
        if let Some(e) = state.elements.iter_mut().find(|e| e.id == feed_element_id) {
            let likes = e.likes_mut();
            likes.is_liked_by_current_user = false;
            let page = likes.page.get_or_insert_with(Default::default);
            page.total = page.total.saturating_sub(1);
        }
        Ok(())
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, ServiceError> {
        let state = self.begin("search_users", format!("search_users:{}", term))?;
        let needle = term.to_lowercase();
        Ok(state
            .users
            .iter()
            .filter(|u| u.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn delete_post(&self, feed_element_id: &str) -> Result<(), ServiceError> {
        let mut state = self.begin("delete_post", format!("delete_post:{}", feed_element_id))?;
        let before = state.elements.len();
        state.elements.retain(|e| e.id != feed_element_id);
        if state.elements.len() == before {
            return Err(not_found(feed_element_id));
        }
        Ok(())
    }

    async fn update_post(&self, feed_element_id: &str, text: &str) -> Result<(), ServiceError> {
        let mut state = self.begin(
            "update_post",
            format!("update_post:{}:{}", feed_element_id, text),
        )?;
        let element = state
            .elements
            .iter_mut()
            .find(|e| e.id == feed_element_id)
            .ok_or_else(|| not_found(feed_element_id))?;
        element.body = Some(text_body(text));
        Ok(())
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<(), ServiceError> {
        let mut state = self.begin("delete_comment", format!("delete_comment:{}", comment_id))?;
        for element in state.elements.iter_mut() {
            let page = element.comment_page_mut();
            if let Some(pos) = page.items.iter().position(|c| c.id == comment_id) {
                page.items.remove(pos);
                page.total = page.total.saturating_sub(1);
                return Ok(());
            }
        }
        Err(not_found(comment_id))
    }

    async fn update_comment(&self, comment_id: &str, text: &str) -> Result<(), ServiceError> {
        let mut state = self.begin(
            "update_comment",
            format!("update_comment:{}:{}", comment_id, text),
        )?;
        let comment = state
            .elements
            .iter_mut()
            .find_map(|e| e.find_comment_mut(comment_id))
            .ok_or_else(|| not_found(comment_id))?;
        comment.body = Some(text_body(text));
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn actor(id: &str, name: &str) -> Actor {
    Actor {
        id: id.to_string(),
        name: name.to_string(),
        photo: None,
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        small_photo_url: None,
    }
}

pub fn text_body(text: &str) -> MessageBody {
    MessageBody {
        text: Some(text.to_string()),
        message_segments: vec![MessageSegment::Text {
            text: text.to_string(),
        }],
    }
}

pub fn post(id: &str, text: &str, liked: bool, likes: u32) -> FeedElement {
    FeedElement {
        id: id.to_string(),
        actor: Some(actor("005A", "Ada Lovelace")),
        created_date: Some("2024-06-15T11:55:00.000Z".to_string()),
        body: Some(text_body(text)),
        capabilities: Some(FeedCapabilities {
            chatter_likes: Some(LikesCapability {
                is_liked_by_current_user: liked,
                page: Some(LikePage { total: likes }),
            }),
            edit: Some(EditCapability {
                is_editable_by_me: true,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn with_comment(mut element: FeedElement, comment_id: &str, text: &str) -> FeedElement {
    let comment = Comment {
        id: comment_id.to_string(),
        user: Some(actor("005B", "Bob")),
        body: Some(text_body(text)),
        ..Default::default()
    };
    element
        .capabilities
        .get_or_insert_with(Default::default)
        .comments = Some(CommentsCapability {
        page: Some(CommentPage {
            items: vec![comment],
            total: 1,
            next_page_token: None,
        }),
    });
    element
}

pub fn settings() -> FeedSettings {
    FeedSettings {
        record_id: "001REC".to_string(),
        current_user_id: ME.to_string(),
        ..Default::default()
    }
}

pub type TestVm = FeedViewModel<FakeFeedService, AutoConfirm>;

/// A view-model over `service`, answering confirmations with `confirm`.
pub fn view_model(
    service: FakeFeedService,
    confirm: bool,
) -> (TestVm, mpsc::Receiver<FeedEvent>, Arc<FakeFeedService>) {
    let service = Arc::new(service);
    let (tx, rx) = mpsc::channel(64);
    let vm = FeedViewModel::new(Arc::clone(&service), AutoConfirm(confirm), settings(), tx);
    (vm, rx, service)
}

/// Apply events until no spawned call is outstanding.
pub async fn settle(vm: &mut TestVm, rx: &mut mpsc::Receiver<FeedEvent>) {
    while !vm.is_idle() {
        let event = rx.recv().await.expect("event channel closed");
        vm.handle_event(event);
    }
}

/// Receive `n` events without applying them.
pub async fn take_events(rx: &mut mpsc::Receiver<FeedEvent>, n: usize) -> Vec<FeedEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        events.push(rx.recv().await.expect("event channel closed"));
    }
    events
}

/// A view-model with the first page already loaded.
pub async fn loaded(
    service: FakeFeedService,
) -> (TestVm, mpsc::Receiver<FeedEvent>, Arc<FakeFeedService>) {
    let (mut vm, mut rx, service) = view_model(service, true);
    vm.load_feed(None);
    settle(&mut vm, &mut rx).await;
    (vm, rx, service)
}
