//! Picks the remote adapters for a configuration.

use crate::config::ShadowConfig;
use crate::error::RemoteError;
use crate::models::{Comment, NewComment, ThreadId};
use crate::remote::{CommentFeed, CommentStore, OfflineCommentStore, Subscription};
use crate::supabase::{PostgrestCommentStore, RealtimeCommentFeed};

/// Store and feed for a configured project, or the offline stand-in.
#[derive(Debug, Clone)]
pub enum Backend {
    Supabase {
        store: PostgrestCommentStore,
        feed: RealtimeCommentFeed,
    },
    Offline(OfflineCommentStore),
}

impl Backend {
    pub fn from_config(config: &ShadowConfig) -> crate::Result<Self> {
        let Some(endpoint) = config.endpoint()? else {
            tracing::info!("Supabase not configured; running offline");
            return Ok(Self::Offline(OfflineCommentStore));
        };
        tracing::debug!(table = endpoint.table(), "Using Supabase backend");
        Ok(Self::Supabase {
            store: PostgrestCommentStore::new(endpoint.clone())?,
            feed: RealtimeCommentFeed::new(endpoint),
        })
    }

    /// Realtime joins as the signed-in user when a token is available.
    #[must_use]
    pub fn with_access_token(self, access_token: Option<String>) -> Self {
        match self {
            Self::Supabase { store, feed } => Self::Supabase {
                store,
                feed: feed.with_access_token(access_token),
            },
            offline @ Self::Offline(_) => offline,
        }
    }

    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

impl CommentStore for Backend {
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<Vec<Comment>, RemoteError> {
        match self {
            Self::Supabase { store, .. } => store.fetch_thread(thread_id).await,
            Self::Offline(store) => store.fetch_thread(thread_id).await,
        }
    }

    async fn insert(
        &self,
        comment: &NewComment,
        access_token: Option<&str>,
    ) -> Result<Comment, RemoteError> {
        match self {
            Self::Supabase { store, .. } => store.insert(comment, access_token).await,
            Self::Offline(store) => store.insert(comment, access_token).await,
        }
    }
}

impl CommentFeed for Backend {
    fn subscribe(&self, thread_id: &ThreadId) -> Result<Subscription, RemoteError> {
        match self {
            Self::Supabase { feed, .. } => feed.subscribe(thread_id),
            Self::Offline(store) => store.subscribe(thread_id),
        }
    }
}
