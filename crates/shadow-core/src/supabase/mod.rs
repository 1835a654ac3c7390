//! Supabase adapters: PostgREST for reads/writes, Realtime for changes.

mod realtime;
mod rest;

use std::fmt;

use url::Url;

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub use realtime::RealtimeCommentFeed;
pub use rest::PostgrestCommentStore;

const REALTIME_PATH: &str = "/realtime/v1/websocket";
const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";

/// Project URL, public anon key and the comments table name.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseEndpoint {
    base_url: String,
    anon_key: String,
    table: String,
}

impl SupabaseEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::Config("Supabase URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::Config(format!(
                "Supabase URL must include http:// or https://, got '{base_url}'"
            )));
        }
        Url::parse(&base_url)
            .map_err(|error| Error::Config(format!("Invalid Supabase URL: {error}")))?;

        let anon_key = normalize_text_option(Some(anon_key.into()))
            .ok_or_else(|| Error::Config("Supabase anon key must not be empty".to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            table: table.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `{base}/rest/v1/{table}`
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    /// Realtime websocket URL: the project URL with a `ws`/`wss` scheme.
    pub fn realtime_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| Error::Config(format!("Invalid Supabase URL: {error}")))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::Config(format!("Cannot derive {scheme} URL from {url}")))?;
        url.set_path(REALTIME_PATH);
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", REALTIME_PROTOCOL_VERSION);
        Ok(url)
    }
}

impl fmt::Debug for SupabaseEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseEndpoint")
            .field("base_url", &self.base_url)
            .field("anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}
