//! Comment model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ThreadId;

/// Author id reserved for locally generated seed comments.
pub const BOT_AUTHOR_ID: &str = "00000000-0000-4000-8000-botshadow000";

const SEED_ID_PREFIX: &str = "seed-";

/// Opaque comment identifier.
///
/// Persisted rows carry the id issued by the remote store; seed rows get a
/// locally generated id under the `seed-` namespace so the two never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a seed comment of `thread_id`.
    #[must_use]
    pub fn seed(thread_id: &ThreadId) -> Self {
        Self(format!("{SEED_ID_PREFIX}{thread_id}-{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn is_seed(&self) -> bool {
        self.0.starts_with(SEED_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A comment attached to a thread.
///
/// Field names on the wire follow the remote table (`video_id`, `user_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(rename = "video_id")]
    pub thread_id: ThreadId,
    #[serde(rename = "user_id")]
    pub author_id: String,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    /// Anchor into the video's timeline, in seconds.
    #[serde(default)]
    pub timestamp_seconds: Option<i64>,
    #[serde(with = "wire_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_deleted: bool,
    /// Local provenance marker, never persisted.
    #[serde(skip)]
    pub is_seed: bool,
}

impl Comment {
    /// True for seed rows and for anything posted under the bot sentinel.
    #[must_use]
    pub fn is_bot_authored(&self) -> bool {
        self.is_seed || self.author_id == BOT_AUTHOR_ID
    }
}

/// Insert payload for a new persisted comment.
///
/// Server-generated fields (`id`, `created_at`, `is_deleted`) are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    #[serde(rename = "video_id")]
    pub thread_id: ThreadId,
    #[serde(rename = "user_id")]
    pub author_id: String,
    pub body: String,
    pub parent_id: Option<CommentId>,
    pub timestamp_seconds: Option<i64>,
}

/// What a viewer submits when posting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDraft {
    pub body: String,
    pub parent_id: Option<CommentId>,
    pub timestamp_seconds: Option<i64>,
}

impl CommentDraft {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn reply_to(mut self, parent_id: CommentId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub const fn at_seconds(mut self, timestamp_seconds: i64) -> Self {
        self.timestamp_seconds = Some(timestamp_seconds);
        self
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// `timestamptz` values arrive as RFC 3339 from PostgREST but may lose their
/// offset on the realtime channel; zone-less values are read as UTC.
mod wire_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        // Postgres renders short offsets like `+00`, which RFC 3339 rejects.
        if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Some(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(raw, format)
                .ok()
                .map(|naive| naive.and_utc())
        })
    }
}
