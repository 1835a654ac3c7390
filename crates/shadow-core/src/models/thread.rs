//! Thread identifiers

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

static VIDEO_URL_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"youtube\.com/watch\?(?:[^#\s]*&)?v=([^&\s?#]+)").expect("Invalid regex"),
        Regex::new(r"youtu\.be/([^&\s?#/]+)").expect("Invalid regex"),
        Regex::new(r"youtube\.com/embed/([^&\s?#/]+)").expect("Invalid regex"),
    ]
});

/// Identifies the external video a comment thread is attached to.
///
/// The value is opaque to the sync layer; it is compared verbatim and used as
/// the `video_id` column of the comments table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Wrap an already-extracted video identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Resolve a thread id from a bare video id or a video page URL.
    ///
    /// Supported URL shapes: `youtube.com/watch?v=ID`, `youtu.be/ID` and
    /// `youtube.com/embed/ID`. Anything that is not a URL is taken verbatim
    /// after trimming.
    ///
    /// ```
    /// use shadow_core::ThreadId;
    ///
    /// let id = ThreadId::from_video_reference("https://youtu.be/abc123?t=42").unwrap();
    /// assert_eq!(id.as_str(), "abc123");
    /// ```
    pub fn from_video_reference(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidVideoReference(
                "video reference must not be empty".to_string(),
            ));
        }

        for pattern in VIDEO_URL_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(input) {
                return Ok(Self(captures[1].to_string()));
            }
        }

        if input.contains("://") || input.contains(char::is_whitespace) {
            return Err(Error::InvalidVideoReference(format!(
                "could not find a video id in '{input}'"
            )));
        }

        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_is_kept_verbatim() {
        let id = ThreadId::from_video_reference("  dQw4w9WgXcQ ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn watch_url_extracts_id() {
        let id = ThreadId::from_video_reference("https://www.youtube.com/watch?v=abc123&t=10s")
            .unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn watch_url_with_leading_params_extracts_id() {
        let id =
            ThreadId::from_video_reference("https://www.youtube.com/watch?feature=share&v=xyz")
                .unwrap();
        assert_eq!(id.as_str(), "xyz");
    }

    #[test]
    fn short_and_embed_urls_extract_id() {
        assert_eq!(
            ThreadId::from_video_reference("https://youtu.be/abc123")
                .unwrap()
                .as_str(),
            "abc123"
        );
        assert_eq!(
            ThreadId::from_video_reference("https://www.youtube.com/embed/abc123?autoplay=1")
                .unwrap()
                .as_str(),
            "abc123"
        );
    }

    #[test]
    fn empty_and_unknown_urls_are_rejected() {
        assert!(ThreadId::from_video_reference("   ").is_err());
        assert!(ThreadId::from_video_reference("https://vimeo.com/12345").is_err());
    }
}
