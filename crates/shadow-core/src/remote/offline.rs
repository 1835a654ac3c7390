//! Stand-in used when no backend is configured.

use tokio::sync::mpsc;

use super::{CommentFeed, CommentStore, Subscription};
use crate::error::RemoteError;
use crate::models::{Comment, NewComment, ThreadId};

const NOT_CONFIGURED: &str =
    "Database not configured: set SUPABASE_URL and SUPABASE_ANON_KEY to enable shared comments";

/// Fails every read and write with a generic error and never emits changes,
/// so callers fall back to seeds and surface a diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCommentStore;

impl CommentStore for OfflineCommentStore {
    async fn fetch_thread(&self, _thread_id: &ThreadId) -> Result<Vec<Comment>, RemoteError> {
        Err(RemoteError::transport(NOT_CONFIGURED))
    }

    async fn insert(
        &self,
        _comment: &NewComment,
        _access_token: Option<&str>,
    ) -> Result<Comment, RemoteError> {
        Err(RemoteError::transport(NOT_CONFIGURED))
    }
}

impl CommentFeed for OfflineCommentStore {
    fn subscribe(&self, thread_id: &ThreadId) -> Result<Subscription, RemoteError> {
        let (_sender, receiver) = mpsc::unbounded_channel();
        Ok(Subscription::new(thread_id.clone(), receiver, || {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};

    #[tokio::test(flavor = "current_thread")]
    async fn reads_fail_with_generic_diagnostics() {
        let error = OfflineCommentStore
            .fetch_thread(&ThreadId::new("abc"))
            .await
            .unwrap_err();
        assert_eq!(Diagnostics::classify(&error).kind(), DiagnosticKind::Generic);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn feed_is_closed_immediately() {
        let mut subscription = OfflineCommentStore.subscribe(&ThreadId::new("abc")).unwrap();
        assert!(subscription.recv().await.is_none());
    }
}
