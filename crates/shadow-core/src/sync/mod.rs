//! Thread-scoped sync controller.
//!
//! Owns the selected thread, its realtime subscription and the observable
//! [`ThreadState`]. Every mutation goes through [`ThreadState::apply`], so
//! fetch results, realtime changes and local writes are serialized through
//! one reducer.

use crate::auth::IdentityProvider;
use crate::diagnostics::Diagnostics;
use crate::fetcher::{FetchOptions, Fetcher};
use crate::models::{Comment, CommentDraft, ThreadId};
use crate::remote::{ChangeEvent, CommentFeed, CommentStore, FeedEvent, Subscription};
use crate::state::{SyncAction, SyncPhase, ThreadState};
use crate::writer::Writer;
use crate::{Error, Result};


pub struct SyncController<S, F, I> {
    fetcher: Fetcher<S>,
    writer: Writer<S, I>,
    feed: F,
    options: FetchOptions,
    state: ThreadState,
    subscription: Option<Subscription>,
    resync_pending: bool,
}

impl<S, F, I> SyncController<S, F, I>
where
    S: CommentStore + Clone,
    F: CommentFeed,
    I: IdentityProvider,
{
    pub fn new(store: S, feed: F, identity: I, options: FetchOptions) -> Self {
        Self {
            fetcher: Fetcher::new(store.clone()),
            writer: Writer::new(store, identity),
            feed,
            options,
            state: ThreadState::default(),
            subscription: None,
            resync_pending: false,
        }
    }

    pub const fn state(&self) -> &ThreadState {
        &self.state
    }

    pub fn comments(&self) -> &[Comment] {
        self.state.comments()
    }

    pub fn loading(&self) -> bool {
        self.state.loading()
    }

    pub const fn error(&self) -> Option<&Diagnostics> {
        self.state.error()
    }

    pub const fn seeded(&self) -> bool {
        self.state.seeded()
    }

    pub const fn phase(&self) -> SyncPhase {
        self.state.phase()
    }

    pub const fn thread_id(&self) -> Option<&ThreadId> {
        self.state.thread_id()
    }

    /// The feed reconnected since the last load and may have missed changes.
    /// Cleared by [`Self::reload`].
    pub const fn needs_resync(&self) -> bool {
        self.resync_pending
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Switch to `thread_id`, or detach entirely with `None`.
    ///
    /// The previous subscription is torn down before anything else happens.
    /// The new subscription is attached before the initial fetch starts so
    /// changes committed during the fetch are buffered, not lost.
    pub async fn select_thread(&mut self, thread_id: Option<ThreadId>) {
        if self.state.thread_id() == thread_id.as_ref() {
            return;
        }

        self.detach();
        let Some(thread_id) = thread_id else {
            return;
        };

        self.state
            .apply(SyncAction::SelectThread(Some(thread_id.clone())));
        tracing::info!(%thread_id, "Selected comment thread");

        match self.feed.subscribe(&thread_id) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(error) => {
                tracing::warn!(%thread_id, "Realtime subscription failed: {error}");
            }
        }

        self.load(thread_id).await;
    }

    /// Unsubscribe and return to idle.
    pub fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.resync_pending = false;
        self.state.apply(SyncAction::SelectThread(None));
    }

    /// Re-fetch the current thread. No-op when idle; the subscription is
    /// left as is.
    pub async fn reload(&mut self) {
        let Some(thread_id) = self.state.thread_id().cloned() else {
            return;
        };
        self.load(thread_id).await;
    }

    async fn load(&mut self, thread_id: ThreadId) {
        self.resync_pending = false;
        self.state.apply(SyncAction::LoadStarted);
        let outcome = self.fetcher.fetch(&thread_id, self.options).await;
        self.state.apply(SyncAction::LoadFinished(outcome));
        self.pump();
    }

    /// Post a comment to the current thread.
    ///
    /// Seeds are evicted before the write and stay evicted if it fails,
    /// including when there is no identity to post as. Only an empty body or
    /// a missing thread are rejected before any state change. The draft is
    /// borrowed so a failed post can be retried as is.
    pub async fn add(&mut self, draft: &CommentDraft) -> Result<Comment> {
        if draft.body.trim().is_empty() {
            return Err(Error::EmptyBody);
        }
        let Some(thread_id) = self.state.thread_id().cloned() else {
            return Err(Error::NoThread);
        };

        self.state.apply(SyncAction::EvictSeeds);
        match self.writer.add(&thread_id, draft).await {
            Ok(comment) => {
                self.state
                    .apply(SyncAction::Change(ChangeEvent::insert(comment.clone())));
                self.pump();
                Ok(comment)
            }
            Err(error) => {
                self.state
                    .apply(SyncAction::WriteFailed(Diagnostics::from_error(&error)));
                Err(error)
            }
        }
    }

    /// Apply every buffered realtime change. Returns how many were applied.
    ///
    /// A reconnect notice only sets [`Self::needs_resync`]; the caller
    /// decides when to [`Self::reload`].
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            match event {
                FeedEvent::Change(change) => {
                    self.state.apply(SyncAction::Change(change));
                    applied += 1;
                }
                FeedEvent::Resync => self.resync_pending = true,
            }
        }
        applied
    }

    /// Wait for the next realtime change, apply it and return it.
    ///
    /// A reconnect notice re-fetches the thread in place and keeps waiting.
    /// `None` when detached or when the feed closed the stream.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        loop {
            let event = self.subscription.as_mut()?.recv().await?;
            match event {
                FeedEvent::Change(change) => {
                    self.state.apply(SyncAction::Change(change.clone()));
                    return Some(change);
                }
                FeedEvent::Resync => {
                    tracing::info!(
                        thread_id = ?self.state.thread_id(),
                        "Realtime feed reconnected; reloading thread"
                    );
                    self.reload().await;
                }
            }
        }
    }

    /// Feed an externally produced action, e.g. a fetch outcome computed on
    /// another task. Stale results are ignored by the reducer.
    pub fn dispatch(&mut self, action: SyncAction) -> bool {
        self.state.apply(action)
    }

    pub const fn fetcher(&self) -> &Fetcher<S> {
        &self.fetcher
    }

    pub const fn options(&self) -> FetchOptions {
        self.options
    }
}

impl<S, F, I> std::fmt::Debug for SyncController<S, F, I> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncController")
            .field("state", &self.state)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}
