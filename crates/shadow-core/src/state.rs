//! Observable thread state and the reducer that owns every mutation of it.
//!
//! Fetch results, realtime changes and optimistic writes all arrive as a
//! [`SyncAction`] and are folded in by [`ThreadState::apply`], one at a time.
//! The merge rules are order-independent: an INSERT for a known id is a
//! no-op, UPDATE/DELETE for unknown ids are no-ops, and fetch results are
//! merged with rows that arrived through the change stream.

use std::collections::HashSet;

use crate::diagnostics::Diagnostics;
use crate::fetcher::FetchOutcome;
use crate::models::{Comment, CommentId, ThreadId};
use crate::remote::{Change, ChangeEvent};

/// Lifecycle of the selected thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    /// No thread selected.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// List populated; realtime attached.
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    SelectThread(Option<ThreadId>),
    LoadStarted,
    LoadFinished(FetchOutcome),
    Change(ChangeEvent),
    /// Drop seeds ahead of a write.
    EvictSeeds,
    WriteFailed(Diagnostics),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadState {
    thread_id: Option<ThreadId>,
    phase: SyncPhase,
    comments: Vec<Comment>,
    seeded: bool,
    seeds_retired: bool,
    error: Option<Diagnostics>,
    removed: HashSet<CommentId>,
}

impl ThreadState {
    pub const fn thread_id(&self) -> Option<&ThreadId> {
        self.thread_id.as_ref()
    }

    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn loading(&self) -> bool {
        self.phase == SyncPhase::Loading
    }

    /// Visible comments, oldest first.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// The visible list is made of seed rows.
    pub const fn seeded(&self) -> bool {
        self.seeded
    }

    pub const fn error(&self) -> Option<&Diagnostics> {
        self.error.as_ref()
    }

    /// Fold one action into the state. Returns whether anything changed.
    pub fn apply(&mut self, action: SyncAction) -> bool {
        match action {
            SyncAction::SelectThread(thread_id) => self.select(thread_id),
            SyncAction::LoadStarted => {
                if self.thread_id.is_none() {
                    return false;
                }
                self.phase = SyncPhase::Loading;
                self.error = None;
                true
            }
            SyncAction::LoadFinished(outcome) => self.finish_load(outcome),
            SyncAction::Change(event) => self.merge_change(event),
            SyncAction::EvictSeeds => self.evict_seeds(),
            SyncAction::WriteFailed(diagnostics) => {
                self.error = Some(diagnostics);
                true
            }
        }
    }

    fn select(&mut self, thread_id: Option<ThreadId>) -> bool {
        if thread_id == self.thread_id {
            return false;
        }
        let phase = if thread_id.is_some() {
            SyncPhase::Loading
        } else {
            SyncPhase::Idle
        };
        *self = Self {
            thread_id,
            phase,
            ..Self::default()
        };
        true
    }

    fn is_active(&self, thread_id: &ThreadId) -> bool {
        self.thread_id.as_ref() == Some(thread_id)
    }

    fn finish_load(&mut self, outcome: FetchOutcome) -> bool {
        if !self.is_active(&outcome.thread_id) {
            tracing::debug!(thread_id = %outcome.thread_id, "Ignoring fetch result for stale thread");
            return false;
        }

        self.phase = SyncPhase::Ready;
        self.error = outcome.error;

        let mut persisted = std::mem::take(&mut self.comments);
        persisted.retain(|comment| !comment.is_seed);

        if outcome.seeded {
            if self.seeds_retired || !persisted.is_empty() {
                self.seeds_retired = true;
                self.seeded = false;
                self.comments = persisted;
            } else {
                self.seeded = true;
                self.comments = outcome.comments;
            }
            return true;
        }

        let mut comments = outcome
            .comments
            .into_iter()
            .filter(|comment| !self.removed.contains(&comment.id))
            .collect::<Vec<_>>();
        let fetched = comments
            .iter()
            .map(|comment| comment.id.clone())
            .collect::<HashSet<_>>();
        comments.extend(
            persisted
                .into_iter()
                .filter(|comment| !fetched.contains(&comment.id)),
        );
        comments.sort_by_key(|comment| comment.created_at);

        self.comments = comments;
        self.seeded = false;
        true
    }

    fn merge_change(&mut self, event: ChangeEvent) -> bool {
        if !self.is_active(&event.thread_id) {
            return false;
        }

        match event.change {
            Change::Insert(comment) => {
                let evicted = self.evict_seeds();
                if comment.is_deleted || self.position(&comment.id).is_some() {
                    return evicted;
                }
                self.removed.remove(&comment.id);
                self.insert_sorted(comment);
                true
            }
            Change::Update(comment) => {
                let Some(index) = self.position(&comment.id) else {
                    return false;
                };
                if comment.is_deleted {
                    self.comments.remove(index);
                    self.removed.insert(comment.id);
                } else {
                    self.comments.remove(index);
                    self.insert_sorted(comment);
                }
                true
            }
            Change::Delete(id) => {
                let removed = self.position(&id).map(|index| self.comments.remove(index));
                self.removed.insert(id);
                removed.is_some()
            }
        }
    }

    fn evict_seeds(&mut self) -> bool {
        if !self.seeded {
            return false;
        }
        self.comments.retain(|comment| !comment.is_seed);
        self.seeded = false;
        self.seeds_retired = true;
        true
    }

    fn position(&self, id: &CommentId) -> Option<usize> {
        self.comments.iter().position(|comment| &comment.id == id)
    }

    fn insert_sorted(&mut self, comment: Comment) {
        let index = self
            .comments
            .partition_point(|existing| existing.created_at <= comment.created_at);
        self.comments.insert(index, comment);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::RemoteError;
    use crate::seed::generate_seeds_at;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn thread() -> ThreadId {
        ThreadId::new("abc123")
    }

    fn persisted(id: &str, offset_secs: i64) -> Comment {
        Comment {
            id: CommentId::new(id),
            thread_id: thread(),
            author_id: "user-1".to_string(),
            body: id.to_string(),
            parent_id: None,
            timestamp_seconds: None,
            created_at: base_time() + Duration::seconds(offset_secs),
            is_deleted: false,
            is_seed: false,
        }
    }

    fn seeded_outcome(count: usize) -> FetchOutcome {
        let mut rng = rand::thread_rng();
        FetchOutcome {
            thread_id: thread(),
            comments: generate_seeds_at(&thread(), count, base_time(), &mut rng),
            error: None,
            seeded: true,
        }
    }

    fn loaded(outcome: FetchOutcome) -> ThreadState {
        let mut state = ThreadState::default();
        state.apply(SyncAction::SelectThread(Some(thread())));
        state.apply(SyncAction::LoadFinished(outcome));
        state
    }

    fn ids(state: &ThreadState) -> Vec<&str> {
        state.comments().iter().map(|c| c.id.as_str()).collect()
    }

    fn assert_sorted(state: &ThreadState) {
        for pair in state.comments().windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn select_moves_between_idle_and_loading() {
        let mut state = ThreadState::default();
        assert_eq!(state.phase(), SyncPhase::Idle);

        assert!(state.apply(SyncAction::SelectThread(Some(thread()))));
        assert_eq!(state.phase(), SyncPhase::Loading);
        assert!(!state.apply(SyncAction::SelectThread(Some(thread()))));

        state.apply(SyncAction::SelectThread(None));
        assert_eq!(state.phase(), SyncPhase::Idle);
        assert!(state.comments().is_empty());
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut state = loaded(FetchOutcome {
            thread_id: thread(),
            comments: vec![persisted("a", 0)],
            error: None,
            seeded: false,
        });
        let event = ChangeEvent::insert(persisted("b", 5));

        assert!(state.apply(SyncAction::Change(event.clone())));
        let before = state.clone();
        assert!(!state.apply(SyncAction::Change(event)));
        assert_eq!(state, before);
        assert_eq!(ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn first_insert_evicts_all_seeds_exactly_once() {
        let mut state = loaded(seeded_outcome(4));
        assert!(state.seeded());
        assert_eq!(state.comments().len(), 4);

        state.apply(SyncAction::Change(ChangeEvent::insert(persisted("a", 10))));
        assert!(!state.seeded());
        assert_eq!(ids(&state), vec!["a"]);

        state.apply(SyncAction::Change(ChangeEvent::insert(persisted("b", 20))));
        assert_eq!(ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn reload_after_eviction_does_not_reseed() {
        let mut state = loaded(seeded_outcome(4));
        state.apply(SyncAction::EvictSeeds);
        assert!(state.comments().is_empty());

        state.apply(SyncAction::LoadStarted);
        state.apply(SyncAction::LoadFinished(seeded_outcome(4)));
        assert!(!state.seeded());
        assert!(state.comments().is_empty());
    }

    #[test]
    fn seeds_never_join_rows_that_arrived_before_the_fetch() {
        let mut state = ThreadState::default();
        state.apply(SyncAction::SelectThread(Some(thread())));
        state.apply(SyncAction::Change(ChangeEvent::insert(persisted("early", 0))));

        state.apply(SyncAction::LoadFinished(seeded_outcome(4)));
        assert!(!state.seeded());
        assert_eq!(ids(&state), vec!["early"]);
    }

    #[test]
    fn fetch_merges_with_streamed_rows_in_either_order() {
        let fetched = FetchOutcome {
            thread_id: thread(),
            comments: vec![persisted("a", 0), persisted("c", 20)],
            error: None,
            seeded: false,
        };
        let streamed = ChangeEvent::insert(persisted("b", 10));

        let mut stream_first = ThreadState::default();
        stream_first.apply(SyncAction::SelectThread(Some(thread())));
        stream_first.apply(SyncAction::Change(streamed.clone()));
        stream_first.apply(SyncAction::LoadFinished(fetched.clone()));

        let mut fetch_first = ThreadState::default();
        fetch_first.apply(SyncAction::SelectThread(Some(thread())));
        fetch_first.apply(SyncAction::LoadFinished(fetched));
        fetch_first.apply(SyncAction::Change(streamed));

        assert_eq!(ids(&stream_first), vec!["a", "b", "c"]);
        assert_eq!(stream_first.comments(), fetch_first.comments());
    }

    #[test]
    fn delete_before_fetch_is_not_resurrected() {
        let mut state = ThreadState::default();
        state.apply(SyncAction::SelectThread(Some(thread())));
        state.apply(SyncAction::Change(ChangeEvent::delete(
            thread(),
            CommentId::new("a"),
        )));
        state.apply(SyncAction::LoadFinished(FetchOutcome {
            thread_id: thread(),
            comments: vec![persisted("a", 0), persisted("b", 5)],
            error: None,
            seeded: false,
        }));
        assert_eq!(ids(&state), vec!["b"]);
    }

    #[test]
    fn update_replaces_and_delete_removes() {
        let mut state = loaded(FetchOutcome {
            thread_id: thread(),
            comments: vec![persisted("a", 0), persisted("b", 5)],
            error: None,
            seeded: false,
        });

        let mut edited = persisted("a", 0);
        edited.body = "edited".to_string();
        assert!(state.apply(SyncAction::Change(ChangeEvent::update(edited))));
        assert_eq!(state.comments()[0].body, "edited");

        assert!(!state.apply(SyncAction::Change(ChangeEvent::update(persisted("zzz", 1)))));

        let mut soft_deleted = persisted("b", 5);
        soft_deleted.is_deleted = true;
        assert!(state.apply(SyncAction::Change(ChangeEvent::update(soft_deleted))));
        assert_eq!(ids(&state), vec!["a"]);

        assert!(state.apply(SyncAction::Change(ChangeEvent::delete(
            thread(),
            CommentId::new("a")
        ))));
        assert!(!state.apply(SyncAction::Change(ChangeEvent::delete(
            thread(),
            CommentId::new("a")
        ))));
        assert!(state.comments().is_empty());
    }

    #[test]
    fn out_of_order_inserts_stay_sorted() {
        let mut state = loaded(FetchOutcome {
            thread_id: thread(),
            comments: vec![persisted("m", 50)],
            error: None,
            seeded: false,
        });
        for (id, offset) in [("z", 90), ("a", 10), ("n", 50), ("b", 20)] {
            state.apply(SyncAction::Change(ChangeEvent::insert(persisted(id, offset))));
            assert_sorted(&state);
        }
        assert_eq!(ids(&state), vec!["a", "b", "m", "n", "z"]);
    }

    #[test]
    fn events_and_results_for_other_threads_are_ignored() {
        let mut state = loaded(seeded_outcome(3));
        let mut foreign = persisted("x", 0);
        foreign.thread_id = ThreadId::new("other");

        assert!(!state.apply(SyncAction::Change(ChangeEvent::insert(foreign.clone()))));
        assert!(!state.apply(SyncAction::LoadFinished(FetchOutcome {
            thread_id: ThreadId::new("other"),
            comments: vec![foreign],
            error: None,
            seeded: false,
        })));
        assert!(state.seeded());
        assert_eq!(state.comments().len(), 3);
    }

    #[test]
    fn error_is_kept_alongside_seeds_and_cleared_on_reload() {
        let diagnostics =
            Diagnostics::classify(&RemoteError::transport("connection refused"));
        let mut outcome = seeded_outcome(4);
        outcome.error = Some(diagnostics.clone());

        let mut state = loaded(outcome);
        assert_eq!(state.phase(), SyncPhase::Ready);
        assert_eq!(state.error(), Some(&diagnostics));
        assert!(state.seeded());

        state.apply(SyncAction::LoadStarted);
        assert!(state.loading());
        state.apply(SyncAction::LoadFinished(seeded_outcome(4)));
        assert_eq!(state.error(), None);
    }

    #[test]
    fn write_failure_records_error_without_restoring_seeds() {
        let mut state = loaded(seeded_outcome(4));
        state.apply(SyncAction::EvictSeeds);
        state.apply(SyncAction::WriteFailed(Diagnostics::generic("boom")));

        assert!(state.comments().is_empty());
        assert!(!state.seeded());
        assert_eq!(state.error().map(|d| d.raw_message.as_str()), Some("boom"));
    }
}
