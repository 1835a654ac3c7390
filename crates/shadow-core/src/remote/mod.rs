//! Capabilities the sync layer consumes from the remote store.
//!
//! Everything that touches the network sits behind these traits so the
//! fetcher, writer and controller can run against fakes.

mod memory;
mod offline;

use std::fmt;
use std::str::FromStr;

use tokio::sync::mpsc;

use crate::error::RemoteError;
use crate::models::{Comment, CommentId, NewComment, ThreadId};

pub use memory::MemoryCommentStore;
pub use offline::OfflineCommentStore;

/// Upper bound on rows returned by a single thread read.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// One-shot reads and inserts against the comments table.
#[allow(async_fn_in_trait)]
pub trait CommentStore {
    /// Non-deleted comments of `thread_id`, oldest first.
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<Vec<Comment>, RemoteError>;

    /// Insert a comment and return the persisted row.
    async fn insert(
        &self,
        comment: &NewComment,
        access_token: Option<&str>,
    ) -> Result<Comment, RemoteError>;
}

/// Push stream of row-level changes scoped to one thread.
pub trait CommentFeed {
    fn subscribe(&self, thread_id: &ThreadId) -> Result<Subscription, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

impl FromStr for ChangeKind {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(RemoteError::transport(format!(
                "unknown change event type: {other}"
            ))),
        }
    }
}

/// Row-level change. Deletes only carry the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Insert(Comment),
    Update(Comment),
    Delete(CommentId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub thread_id: ThreadId,
    pub change: Change,
}

impl ChangeEvent {
    pub fn insert(comment: Comment) -> Self {
        Self {
            thread_id: comment.thread_id.clone(),
            change: Change::Insert(comment),
        }
    }

    pub fn update(comment: Comment) -> Self {
        Self {
            thread_id: comment.thread_id.clone(),
            change: Change::Update(comment),
        }
    }

    pub const fn delete(thread_id: ThreadId, id: CommentId) -> Self {
        Self {
            thread_id,
            change: Change::Delete(id),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self.change {
            Change::Insert(_) => ChangeKind::Insert,
            Change::Update(_) => ChangeKind::Update,
            Change::Delete(_) => ChangeKind::Delete,
        }
    }

    #[must_use]
    pub const fn comment_id(&self) -> &CommentId {
        match &self.change {
            Change::Insert(comment) | Change::Update(comment) => &comment.id,
            Change::Delete(id) => id,
        }
    }
}

/// What a feed delivers to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Change(ChangeEvent),
    /// The feed rejoined after an outage. Changes committed in between were
    /// not delivered, so the thread has to be fetched again.
    Resync,
}

impl From<ChangeEvent> for FeedEvent {
    fn from(event: ChangeEvent) -> Self {
        Self::Change(event)
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Live subscription to one thread's change stream.
///
/// [`Subscription::unsubscribe`] is idempotent and also runs on drop. Once it
/// returns, buffered events are discarded and no further event is delivered.
pub struct Subscription {
    thread_id: ThreadId,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    cancel: Option<CancelFn>,
}

impl Subscription {
    pub fn new(
        thread_id: ThreadId,
        events: mpsc::UnboundedReceiver<FeedEvent>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            thread_id,
            events,
            cancel: Some(Box::new(cancel)),
        }
    }

    #[must_use]
    pub const fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Wait for the next event of this thread. `None` once unsubscribed or
    /// when the feed closed the stream.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        while self.is_active() {
            let event = self.events.recv().await?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Next buffered event, without waiting.
    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        while self.is_active() {
            let event = self.events.try_recv().ok()?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
        None
    }

    fn accepts(&self, event: &FeedEvent) -> bool {
        match event {
            FeedEvent::Change(change) => change.thread_id == self.thread_id,
            FeedEvent::Resync => true,
        }
    }

    pub fn unsubscribe(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel();
        self.events.close();
        while self.events.try_recv().is_ok() {}
        tracing::debug!(thread_id = %self.thread_id, "Unsubscribed from comment changes");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("thread_id", &self.thread_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
