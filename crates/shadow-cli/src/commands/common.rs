use std::env;
use std::io::{self, IsTerminal, Read};

use chrono::Utc;
use serde::Serialize;
use shadow_core::auth::StaticIdentity;
use shadow_core::remote::{Change, ChangeEvent};
use shadow_core::util::normalize_text_option;
use shadow_core::{Comment, Diagnostics, ShadowConfig, ThreadId};

use crate::error::CliError;

const USER_ID_KEY: &str = "SHADOW_USER_ID";
const ACCESS_TOKEN_KEY: &str = "SHADOW_ACCESS_TOKEN";

#[derive(Debug, Serialize)]
pub struct CommentListItem {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub parent_id: Option<String>,
    pub timestamp_seconds: Option<i64>,
    pub created_at: String,
    pub relative_time: String,
    pub is_seed: bool,
}

pub fn load_config() -> Result<ShadowConfig, CliError> {
    Ok(ShadowConfig::from_env()?)
}

pub fn resolve_thread(video: &str) -> Result<ThreadId, CliError> {
    Ok(ThreadId::from_video_reference(video)?)
}

/// Identity for posting, from `SHADOW_USER_ID` and `SHADOW_ACCESS_TOKEN`.
pub fn identity_from_env() -> Option<StaticIdentity> {
    identity_from_lookup(|key| env::var(key).ok())
}

pub fn identity_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<StaticIdentity> {
    let user_id = normalize_text_option(lookup(USER_ID_KEY))?;
    Some(StaticIdentity::new(
        user_id,
        normalize_text_option(lookup(ACCESS_TOKEN_KEY)),
    ))
}

pub fn access_token_from_env() -> Option<String> {
    normalize_text_option(env::var(ACCESS_TOKEN_KEY).ok())
}

pub fn resolve_comment_body(body_parts: &[String]) -> Result<String, CliError> {
    if !body_parts.is_empty() {
        return normalize_body(&body_parts.join(" ")).ok_or(CliError::EmptyBody);
    }

    if let Some(piped) = read_piped_stdin()? {
        return Ok(piped);
    }

    Err(CliError::EmptyBody)
}

pub fn normalize_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    Ok(normalize_body(&buffer))
}

pub fn format_comment_lines(comments: &[Comment]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    comments
        .iter()
        .map(|comment| format_comment_line(comment, now_ms))
        .collect()
}

pub fn format_comment_line(comment: &Comment, now_ms: i64) -> String {
    let short_id = short_id(comment.id.as_str());
    let preview = comment_preview(&comment.body, 48);
    let relative_time = format_relative_time(comment.created_at.timestamp_millis(), now_ms);
    let mut line = format!("{short_id:<13}  {preview:<48}  {relative_time}");
    if let Some(seconds) = comment.timestamp_seconds {
        line.push_str(&format!("  @{}", format_playback_position(seconds)));
    }
    if comment.parent_id.is_some() {
        line.push_str("  (reply)");
    }
    if comment.is_seed {
        line.push_str("  [seed]");
    }
    line
}

pub fn format_change_line(event: &ChangeEvent) -> String {
    match &event.change {
        Change::Insert(comment) => format!(
            "+ {}  {}",
            short_id(comment.id.as_str()),
            comment_preview(&comment.body, 60)
        ),
        Change::Update(comment) if comment.is_deleted => {
            format!("- {}  (deleted)", short_id(comment.id.as_str()))
        }
        Change::Update(comment) => format!(
            "~ {}  {}",
            short_id(comment.id.as_str()),
            comment_preview(&comment.body, 60)
        ),
        Change::Delete(id) => format!("- {}", short_id(id.as_str())),
    }
}

pub fn comment_to_list_item(comment: &Comment) -> CommentListItem {
    CommentListItem {
        id: comment.id.to_string(),
        author_id: comment.author_id.clone(),
        body: comment.body.clone(),
        parent_id: comment.parent_id.as_ref().map(ToString::to_string),
        timestamp_seconds: comment.timestamp_seconds,
        created_at: comment.created_at.to_rfc3339(),
        relative_time: format_relative_time(
            comment.created_at.timestamp_millis(),
            Utc::now().timestamp_millis(),
        ),
        is_seed: comment.is_seed,
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn comment_preview(body: &str, max_chars: usize) -> String {
    let first_line = body.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn format_playback_position(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Headline, detail and remediation, one block.
pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    format!(
        "{}: {}\n\n{}",
        diagnostics.headline(),
        diagnostics.detail(),
        diagnostics.remediation()
    )
}
