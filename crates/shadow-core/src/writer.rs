//! Authenticated inserts.

use crate::auth::IdentityProvider;
use crate::models::{Comment, CommentDraft, NewComment, ThreadId};
use crate::remote::CommentStore;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Writer<S, I> {
    store: S,
    identity: I,
}

impl<S: CommentStore, I: IdentityProvider> Writer<S, I> {
    pub const fn new(store: S, identity: I) -> Self {
        Self { store, identity }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.current_user_id().is_some()
    }

    /// Insert `draft` into `thread_id` as the current user.
    ///
    /// Without an identity this fails with [`Error::NotAuthenticated`] before
    /// any remote call. Remote failures are returned once, without retry.
    pub async fn add(&self, thread_id: &ThreadId, draft: &CommentDraft) -> Result<Comment> {
        let Some(author_id) = self.identity.current_user_id() else {
            tracing::debug!(%thread_id, "Refusing to post without an identity");
            return Err(Error::NotAuthenticated);
        };

        let new_comment = NewComment {
            thread_id: thread_id.clone(),
            author_id,
            body: draft.body.trim().to_string(),
            parent_id: draft.parent_id.clone(),
            timestamp_seconds: draft.timestamp_seconds,
        };
        let access_token = self.identity.access_token();

        match self
            .store
            .insert(&new_comment, access_token.as_deref())
            .await
        {
            Ok(comment) => {
                tracing::debug!(%thread_id, id = %comment.id, "Comment posted");
                Ok(comment)
            }
            Err(error) => {
                tracing::warn!(%thread_id, "Comment insert failed: {error}");
                Err(error.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Anonymous, StaticIdentity};
    use crate::error::RemoteError;
    use crate::models::CommentId;
    use crate::remote::MemoryCommentStore;

    #[tokio::test(flavor = "current_thread")]
    async fn without_identity_no_remote_call_is_made() {
        let store = MemoryCommentStore::new();
        let writer = Writer::new(store.clone(), Anonymous);

        let result = writer
            .add(&ThreadId::new("abc123"), &CommentDraft::new("hello"))
            .await;

        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert_eq!(store.insert_calls(), 0);
        assert!(!writer.is_authenticated());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insert_trims_body_and_preserves_reply_fields() {
        let store = MemoryCommentStore::new();
        let writer = Writer::new(store.clone(), StaticIdentity::new("user-1", None));

        let comment = writer
            .add(
                &ThreadId::new("abc123"),
                &CommentDraft::new("  hello  ")
                    .reply_to(CommentId::new("parent-1"))
                    .at_seconds(42),
            )
            .await
            .unwrap();

        assert_eq!(comment.body, "hello");
        assert_eq!(comment.author_id, "user-1");
        assert_eq!(comment.parent_id, Some(CommentId::new("parent-1")));
        assert_eq!(comment.timestamp_seconds, Some(42));
        assert!(!comment.is_seed);
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remote_failure_is_classified_and_not_retried() {
        let store = MemoryCommentStore::new();
        store.fail_inserts_with(RemoteError::new(
            "42501",
            "new row violates row-level security policy",
        ));
        let writer = Writer::new(store.clone(), StaticIdentity::new("user-1", None));

        let result = writer
            .add(&ThreadId::new("abc123"), &CommentDraft::new("hello"))
            .await;

        assert!(matches!(result, Err(Error::PermissionDenied(_))));
        assert_eq!(store.insert_calls(), 1);
    }
}
