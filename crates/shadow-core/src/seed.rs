//! Placeholder ("seed") comments shown while a thread has no real comments.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{Comment, CommentId, ThreadId, BOT_AUTHOR_ID};

/// Number of seeds shown when the caller does not ask for a specific count.
pub const DEFAULT_SEED_COUNT: usize = 5;

/// Gap between consecutive seed timestamps.
const SEED_SPACING_MS: i64 = 500;

/// Filler bodies for seed comments.
pub const SEED_BODIES: [&str; 7] = [
    "Seed comment \u{1f44b} (shadow layer active).",
    "Comments hidden on the original page? Talk about it here.",
    "This thread stays up even if the host moderates heavily.",
    "Add your thoughts, this layer is independent of the platform's filters.",
    "Shadow comments keep the discussion visible.",
    "Noticed removals on the original page? Mirror them here.",
    "Jump in, these placeholder comments disappear once real posts arrive.",
];

/// Generate `count` seed comments for `thread_id`, ending just before now.
pub fn generate_seeds(thread_id: &ThreadId, count: usize) -> Vec<Comment> {
    generate_seeds_at(thread_id, count, Utc::now(), &mut rand::thread_rng())
}

/// Generate seeds against an explicit clock and random source.
///
/// Bodies come from a shuffled [`SEED_BODIES`], cycled when `count` exceeds
/// the pool. Timestamps are strictly increasing and all earlier than `now`.
pub fn generate_seeds_at<R>(
    thread_id: &ThreadId,
    count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Comment>
where
    R: Rng + ?Sized,
{
    let mut bodies = SEED_BODIES;
    bodies.shuffle(rng);

    let count_ms = i64::try_from(count).unwrap_or(i64::MAX);
    (0..count)
        .zip(bodies.iter().cycle())
        .map(|(index, body)| {
            let steps_back = count_ms - i64::try_from(index).unwrap_or(i64::MAX);
            Comment {
                id: CommentId::seed(thread_id),
                thread_id: thread_id.clone(),
                author_id: BOT_AUTHOR_ID.to_string(),
                body: (*body).to_string(),
                parent_id: None,
                timestamp_seconds: None,
                created_at: now - Duration::milliseconds(steps_back.saturating_mul(SEED_SPACING_MS)),
                is_deleted: false,
                is_seed: true,
            }
        })
        .collect()
}
