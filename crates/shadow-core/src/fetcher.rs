//! One-shot thread reads with seed fallback.

use crate::diagnostics::Diagnostics;
use crate::models::{Comment, ThreadId};
use crate::remote::CommentStore;
use crate::seed::{generate_seeds, DEFAULT_SEED_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Fill empty or failed reads with seed comments.
    pub allow_seeds: bool,
    /// How many seeds to generate.
    pub seed_min: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            allow_seeds: true,
            seed_min: DEFAULT_SEED_COUNT,
        }
    }
}

/// Result of a read: always a renderable list, plus the failure if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub thread_id: ThreadId,
    pub comments: Vec<Comment>,
    pub error: Option<Diagnostics>,
    /// `comments` are seeds rather than persisted rows.
    pub seeded: bool,
}

#[derive(Debug, Clone)]
pub struct Fetcher<S> {
    store: S,
}

impl<S: CommentStore> Fetcher<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Read `thread_id`. Never fails: remote errors are classified into
    /// `error` and, when seeds are allowed, the list is filled with seeds.
    pub async fn fetch(&self, thread_id: &ThreadId, options: FetchOptions) -> FetchOutcome {
        match self.store.fetch_thread(thread_id).await {
            Ok(mut comments) if !comments.is_empty() => {
                comments.sort_by_key(|comment| comment.created_at);
                tracing::debug!(%thread_id, count = comments.len(), "Fetched comments");
                FetchOutcome {
                    thread_id: thread_id.clone(),
                    comments,
                    error: None,
                    seeded: false,
                }
            }
            Ok(_) => {
                tracing::debug!(%thread_id, "Thread is empty");
                Self::fallback(thread_id, options, None)
            }
            Err(error) => {
                let diagnostics = Diagnostics::classify(&error);
                tracing::warn!(
                    %thread_id,
                    code = diagnostics.raw_code.as_deref().unwrap_or(""),
                    kind = ?diagnostics.kind(),
                    "Comments fetch failed: {}",
                    diagnostics.raw_message
                );
                Self::fallback(thread_id, options, Some(diagnostics))
            }
        }
    }

    fn fallback(
        thread_id: &ThreadId,
        options: FetchOptions,
        error: Option<Diagnostics>,
    ) -> FetchOutcome {
        let comments = if options.allow_seeds {
            generate_seeds(thread_id, options.seed_min)
        } else {
            Vec::new()
        };
        FetchOutcome {
            thread_id: thread_id.clone(),
            seeded: !comments.is_empty(),
            comments,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::RemoteError;
    use crate::models::CommentId;
    use crate::remote::MemoryCommentStore;

    fn persisted(id: &str, minutes_ago: i64) -> Comment {
        Comment {
            id: CommentId::new(id),
            thread_id: ThreadId::new("abc123"),
            author_id: "user-1".to_string(),
            body: format!("body {id}"),
            parent_id: None,
            timestamp_seconds: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            is_deleted: false,
            is_seed: false,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_thread_is_seeded_without_error() {
        let fetcher = Fetcher::new(MemoryCommentStore::new());
        let outcome = fetcher
            .fetch(
                &ThreadId::new("abc123"),
                FetchOptions {
                    allow_seeds: true,
                    seed_min: 4,
                },
            )
            .await;

        assert_eq!(outcome.comments.len(), 4);
        assert!(outcome.comments.iter().all(|comment| comment.is_seed));
        assert_eq!(outcome.error, None);
        assert!(outcome.seeded);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_thread_without_seeds_is_empty() {
        let fetcher = Fetcher::new(MemoryCommentStore::new());
        let outcome = fetcher
            .fetch(
                &ThreadId::new("abc123"),
                FetchOptions {
                    allow_seeds: false,
                    seed_min: 4,
                },
            )
            .await;
        assert!(outcome.comments.is_empty());
        assert!(!outcome.seeded);
        assert_eq!(outcome.error, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_never_renders_blank() {
        let store = MemoryCommentStore::new();
        store.fail_fetches_with(RemoteError::transport("connection refused"));
        let fetcher = Fetcher::new(store);

        for seed_min in [1, 4, 9] {
            let outcome = fetcher
                .fetch(
                    &ThreadId::new("abc123"),
                    FetchOptions {
                        allow_seeds: true,
                        seed_min,
                    },
                )
                .await;
            assert!(outcome.comments.len() >= seed_min);
            assert!(outcome.seeded);
            let error = outcome.error.unwrap();
            assert!(!error.table_missing);
            assert!(!error.permission_denied);
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_without_seeds_returns_error_and_empty_list() {
        let store = MemoryCommentStore::new();
        store.fail_fetches_with(RemoteError::new("42P01", "relation does not exist"));
        let outcome = Fetcher::new(store)
            .fetch(
                &ThreadId::new("abc123"),
                FetchOptions {
                    allow_seeds: false,
                    seed_min: 4,
                },
            )
            .await;
        assert!(outcome.comments.is_empty());
        assert!(outcome.error.unwrap().table_missing);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn persisted_rows_are_returned_in_order() {
        let store = MemoryCommentStore::with_rows([persisted("b", 1), persisted("a", 5)]);
        let outcome = Fetcher::new(store)
            .fetch(&ThreadId::new("abc123"), FetchOptions::default())
            .await;

        let ids = outcome
            .comments
            .iter()
            .map(|comment| comment.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!outcome.seeded);
        assert_eq!(outcome.error, None);
    }
}
