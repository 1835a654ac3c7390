//! In-process comment store with a change feed, used by tests and demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    ChangeEvent, CommentFeed, CommentStore, FeedEvent, Subscription, DEFAULT_PAGE_SIZE,
};
use crate::error::RemoteError;
use crate::models::{Comment, CommentId, NewComment, ThreadId};

/// Shared, cloneable in-memory store.
///
/// Inserts are echoed to subscribers as INSERT events, like the realtime
/// channel does for the real table. Failures can be injected per operation and
/// call counters act as spies.
#[derive(Clone, Default)]
pub struct MemoryCommentStore {
    inner: Arc<Mutex<Inner>>,
    fetch_calls: Arc<AtomicUsize>,
    insert_calls: Arc<AtomicUsize>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Comment>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    fetch_failure: Option<RemoteError>,
    insert_failure: Option<RemoteError>,
    mute_insert_echo: bool,
}

struct Subscriber {
    key: u64,
    thread_id: ThreadId,
    sender: mpsc::UnboundedSender<FeedEvent>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with persisted rows.
    pub fn with_rows(rows: impl IntoIterator<Item = Comment>) -> Self {
        let store = Self::new();
        store.lock().rows.extend(rows);
        store
    }

    pub fn fail_fetches_with(&self, error: RemoteError) {
        self.lock().fetch_failure = Some(error);
    }

    pub fn fail_inserts_with(&self, error: RemoteError) {
        self.lock().insert_failure = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.fetch_failure = None;
        inner.insert_failure = None;
    }

    /// Stop echoing inserts through the feed, as if the realtime channel lagged.
    pub fn mute_insert_echo(&self, muted: bool) {
        self.lock().mute_insert_echo = muted;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|subscriber| !subscriber.sender.is_closed());
        inner.subscribers.len()
    }

    pub fn rows(&self) -> Vec<Comment> {
        self.lock().rows.clone()
    }

    /// Simulate a row written by another client: store it and broadcast INSERT.
    pub fn push_remote(&self, comment: Comment) {
        let mut inner = self.lock();
        inner.rows.push(comment.clone());
        inner.broadcast(&ChangeEvent::insert(comment));
    }

    /// Replace a stored row and broadcast UPDATE.
    pub fn update_remote(&self, comment: Comment) {
        let mut inner = self.lock();
        if let Some(row) = inner.rows.iter_mut().find(|row| row.id == comment.id) {
            *row = comment.clone();
        }
        inner.broadcast(&ChangeEvent::update(comment));
    }

    /// Hard-delete a stored row and broadcast DELETE.
    pub fn delete_remote(&self, thread_id: &ThreadId, id: &CommentId) {
        let mut inner = self.lock();
        inner.rows.retain(|row| &row.id != id);
        inner.broadcast(&ChangeEvent::delete(thread_id.clone(), id.clone()));
    }

    /// Deliver an event without touching the stored rows.
    pub fn emit(&self, event: &ChangeEvent) {
        self.lock().broadcast(event);
    }

    /// Tell subscribers of `thread_id` that the feed reconnected, as the
    /// realtime channel does after rejoining.
    pub fn emit_resync(&self, thread_id: &ThreadId) {
        self.lock().subscribers.retain(|subscriber| {
            if &subscriber.thread_id != thread_id {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(FeedEvent::Resync).is_ok()
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn broadcast(&mut self, event: &ChangeEvent) {
        self.subscribers.retain(|subscriber| {
            if subscriber.thread_id != event.thread_id {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(event.clone().into()).is_ok()
        });
    }
}

impl CommentStore for MemoryCommentStore {
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<Vec<Comment>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.lock();
        if let Some(error) = &inner.fetch_failure {
            return Err(error.clone());
        }

        let mut rows = inner
            .rows
            .iter()
            .filter(|row| &row.thread_id == thread_id && !row.is_deleted)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.created_at);
        rows.truncate(DEFAULT_PAGE_SIZE);
        Ok(rows)
    }

    async fn insert(
        &self,
        comment: &NewComment,
        _access_token: Option<&str>,
    ) -> Result<Comment, RemoteError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        if let Some(error) = &inner.insert_failure {
            return Err(error.clone());
        }

        let persisted = Comment {
            id: CommentId::new(Uuid::new_v4().to_string()),
            thread_id: comment.thread_id.clone(),
            author_id: comment.author_id.clone(),
            body: comment.body.clone(),
            parent_id: comment.parent_id.clone(),
            timestamp_seconds: comment.timestamp_seconds,
            created_at: Utc::now(),
            is_deleted: false,
            is_seed: false,
        };
        inner.rows.push(persisted.clone());
        if !inner.mute_insert_echo {
            inner.broadcast(&ChangeEvent::insert(persisted.clone()));
        }
        Ok(persisted)
    }
}

impl CommentFeed for MemoryCommentStore {
    fn subscribe(&self, thread_id: &ThreadId) -> Result<Subscription, RemoteError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let key = {
            let mut inner = self.lock();
            let key = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push(Subscriber {
                key,
                thread_id: thread_id.clone(),
                sender,
            });
            key
        };

        let inner = Arc::clone(&self.inner);
        Ok(Subscription::new(thread_id.clone(), receiver, move || {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .retain(|subscriber| subscriber.key != key);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(thread: &str, body: &str) -> NewComment {
        NewComment {
            thread_id: ThreadId::new(thread),
            author_id: "user-1".to_string(),
            body: body.to_string(),
            parent_id: None,
            timestamp_seconds: None,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insert_is_echoed_to_matching_subscribers_only() {
        let store = MemoryCommentStore::new();
        let mut abc = store.subscribe(&ThreadId::new("abc")).unwrap();
        let mut other = store.subscribe(&ThreadId::new("other")).unwrap();

        let persisted = store.insert(&draft("abc", "hello"), None).await.unwrap();

        let Some(FeedEvent::Change(event)) = abc.try_recv() else {
            panic!("expected change");
        };
        assert_eq!(event.comment_id(), &persisted.id);
        assert!(other.try_recv().is_none());

        store.emit_resync(&ThreadId::new("abc"));
        assert_eq!(abc.try_recv(), Some(FeedEvent::Resync));
        assert!(other.try_recv().is_none());
        assert_eq!(store.insert_calls(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fetch_filters_deleted_and_sorts() {
        let store = MemoryCommentStore::new();
        let first = store.insert(&draft("abc", "first"), None).await.unwrap();
        let second = store.insert(&draft("abc", "second"), None).await.unwrap();
        store.insert(&draft("other", "elsewhere"), None).await.unwrap();

        let mut deleted = first.clone();
        deleted.is_deleted = true;
        store.update_remote(deleted);

        let rows = store.fetch_thread(&ThreadId::new("abc")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, second.id);
        assert_eq!(store.fetch_calls(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn injected_failures_are_returned() {
        let store = MemoryCommentStore::new();
        store.fail_fetches_with(RemoteError::new("42P01", "relation does not exist"));
        let error = store.fetch_thread(&ThreadId::new("abc")).await.unwrap_err();
        assert_eq!(error.code.as_deref(), Some("42P01"));

        store.clear_failures();
        assert!(store.fetch_thread(&ThreadId::new("abc")).await.is_ok());
    }

    #[test]
    fn unsubscribe_removes_subscriber() {
        let store = MemoryCommentStore::new();
        let mut subscription = store.subscribe(&ThreadId::new("abc")).unwrap();
        assert_eq!(store.subscriber_count(), 1);
        subscription.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
    }
}
