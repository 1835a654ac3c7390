//! Classification of backend failures into actionable categories.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, RemoteError};

/// SQLSTATE `undefined_table` and PostgREST's schema-cache miss.
const TABLE_MISSING_CODES: [&str; 2] = ["42P01", "PGRST205"];

/// SQLSTATE `insufficient_privilege`.
const PERMISSION_DENIED_CODES: [&str; 1] = ["42501"];

static TABLE_MISSING_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)relation .* does not exist|could not find the table").expect("Invalid regex")
});

static PERMISSION_DENIED_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)permission denied|row-level security").expect("Invalid regex")
});

/// Schema the sync layer expects on the remote store.
pub const CREATE_TABLE_SQL: &str = "\
CREATE TABLE public.shadow_comments (
  id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
  video_id text NOT NULL,
  user_id uuid NOT NULL,
  body text NOT NULL,
  parent_id uuid REFERENCES public.shadow_comments(id) ON DELETE CASCADE,
  timestamp_seconds integer,
  created_at timestamptz NOT NULL DEFAULT now(),
  is_deleted boolean DEFAULT false
);

CREATE INDEX idx_shadow_comments_video_id_created_at
ON public.shadow_comments (video_id, created_at);

ALTER TABLE public.shadow_comments ENABLE ROW LEVEL SECURITY;

CREATE POLICY \"Comments are viewable by everyone\"
ON public.shadow_comments FOR SELECT USING (true);

CREATE POLICY \"Authenticated users can create comments\"
ON public.shadow_comments FOR INSERT TO authenticated
WITH CHECK (auth.uid() = user_id);";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    TableMissing,
    PermissionDenied,
    Generic,
}

/// Structured form of a backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub table_missing: bool,
    pub permission_denied: bool,
    pub raw_code: Option<String>,
    pub raw_message: String,
}

impl Diagnostics {
    /// Classify a raw remote error.
    ///
    /// Rules apply in priority order: missing relation, then authorization
    /// rejection, then generic. Vendor codes are checked first and message
    /// substrings cover transports that drop the code.
    pub fn classify(error: &RemoteError) -> Self {
        let code = error.code.as_deref().map(str::trim);
        let code_is = |codes: &[&str]| code.is_some_and(|code| codes.contains(&code));

        let table_missing =
            code_is(&TABLE_MISSING_CODES) || TABLE_MISSING_MESSAGE.is_match(&error.message);
        let permission_denied = !table_missing
            && (code_is(&PERMISSION_DENIED_CODES)
                || PERMISSION_DENIED_MESSAGE.is_match(&error.message)
                || matches!(error.status, Some(401 | 403)));

        Self {
            table_missing,
            permission_denied,
            raw_code: error.code.clone(),
            raw_message: error.message.clone(),
        }
    }

    /// Diagnostics for any crate error; non-remote errors are generic.
    pub fn from_error(error: &Error) -> Self {
        error.remote().map_or_else(
            || Self::generic(error.to_string()),
            Self::classify,
        )
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            table_missing: false,
            permission_denied: false,
            raw_code: None,
            raw_message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> DiagnosticKind {
        if self.table_missing {
            DiagnosticKind::TableMissing
        } else if self.permission_denied {
            DiagnosticKind::PermissionDenied
        } else {
            DiagnosticKind::Generic
        }
    }

    #[must_use]
    pub const fn headline(&self) -> &'static str {
        match self.kind() {
            DiagnosticKind::TableMissing => "Comments table missing",
            DiagnosticKind::PermissionDenied => "Permission denied",
            DiagnosticKind::Generic => "Failed to load comments",
        }
    }

    /// What the viewer (or operator) can do about it.
    #[must_use]
    pub const fn remediation(&self) -> &'static str {
        match self.kind() {
            DiagnosticKind::TableMissing => CREATE_TABLE_SQL,
            DiagnosticKind::PermissionDenied => {
                "Check the row-level security policies: SELECT must allow anonymous access \
                 and INSERT must allow authenticated users posting as themselves."
            }
            DiagnosticKind::Generic => {
                "The comment service could not be reached. Showing placeholder comments; retry later."
            }
        }
    }

    /// `code message`, or just the message when no code was reported.
    #[must_use]
    pub fn detail(&self) -> String {
        match &self.raw_code {
            Some(code) => format!("{code} {}", self.raw_message),
            None => self.raw_message.clone(),
        }
    }
}
