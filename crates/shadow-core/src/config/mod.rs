//! Runtime configuration.
//!
//! Values come from the process environment (after `.env` loading in the
//! binaries). A project URL and anon key are optional as a pair: with neither,
//! the sync layer runs against the offline store and serves seeds; with only
//! one of them, configuration fails.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::fetcher::FetchOptions;
use crate::seed::DEFAULT_SEED_COUNT;
use crate::supabase::SupabaseEndpoint;
use crate::util::{mask_value, normalize_text_option};
use crate::{Error, Result};

pub const DEFAULT_COMMENTS_TABLE: &str = "shadow_comments";

const URL_KEYS: [&str; 2] = ["SUPABASE_URL", "VITE_SUPABASE_URL"];
const ANON_KEY_KEYS: [&str; 2] = ["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"];
const TABLE_KEY: &str = "SHADOW_COMMENTS_TABLE";
const LOCAL_SEED_KEY: &str = "SHADOW_LOCAL_SEED";
const SEED_MIN_KEY: &str = "SHADOW_SEED_MIN";

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex"));

#[derive(Clone, PartialEq, Eq)]
pub struct ShadowConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub comments_table: String,
    /// Fill empty or failed reads with seed comments.
    pub local_seed: bool,
    pub seed_min: usize,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            comments_table: DEFAULT_COMMENTS_TABLE.to_string(),
            local_seed: true,
            seed_min: DEFAULT_SEED_COUNT,
        }
    }
}

impl ShadowConfig {
    pub fn from_env() -> Result<Self> {
        Self::parse(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn parse(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| normalize_text_option(lookup(key)))
        };

        let supabase_url = first(&URL_KEYS);
        let supabase_anon_key = first(&ANON_KEY_KEYS);
        match (&supabase_url, &supabase_anon_key) {
            (Some(_), None) => {
                return Err(Error::Config(
                    "SUPABASE_URL is set but SUPABASE_ANON_KEY is missing".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "SUPABASE_ANON_KEY is set but SUPABASE_URL is missing".to_string(),
                ))
            }
            _ => {}
        }

        let comments_table =
            first(&[TABLE_KEY]).unwrap_or_else(|| DEFAULT_COMMENTS_TABLE.to_string());
        if !TABLE_NAME.is_match(&comments_table) {
            return Err(Error::Config(format!(
                "{TABLE_KEY} must be a plain identifier, got '{comments_table}'"
            )));
        }

        let local_seed = match first(&[LOCAL_SEED_KEY]) {
            Some(raw) => parse_flag(LOCAL_SEED_KEY, &raw)?,
            None => true,
        };
        let seed_min = match first(&[SEED_MIN_KEY]) {
            Some(raw) => parse_seed_min(&raw)?,
            None => DEFAULT_SEED_COUNT,
        };

        let config = Self {
            supabase_url,
            supabase_anon_key,
            comments_table,
            local_seed,
            seed_min,
        };
        config.endpoint()?;
        Ok(config)
    }

    pub const fn is_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_anon_key.is_some()
    }

    /// The remote endpoint, or `None` when running offline.
    pub fn endpoint(&self) -> Result<Option<SupabaseEndpoint>> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) => {
                SupabaseEndpoint::new(url, key, &self.comments_table).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub const fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            allow_seeds: self.local_seed,
            seed_min: self.seed_min,
        }
    }

    pub fn status(&self) -> ConfigStatus {
        ConfigStatus {
            configured: self.is_configured(),
            has_url: self.supabase_url.is_some(),
            has_key: self.supabase_anon_key.is_some(),
            supabase_url: mask_value(self.supabase_url.as_deref()),
            supabase_anon_key: mask_value(self.supabase_anon_key.as_deref()),
            comments_table: self.comments_table.clone(),
            local_seed: self.local_seed,
            seed_min: self.seed_min,
        }
    }
}

impl fmt::Debug for ShadowConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ShadowConfig")
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_anon_key",
                &self.supabase_anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("comments_table", &self.comments_table)
            .field("local_seed", &self.local_seed)
            .field("seed_min", &self.seed_min)
            .finish()
    }
}

/// Config snapshot that is safe to print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigStatus {
    pub configured: bool,
    pub has_url: bool,
    pub has_key: bool,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub comments_table: String,
    pub local_seed: bool,
    pub seed_min: usize,
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{key} must be true or false, got '{raw}'"
        ))),
    }
}

fn parse_seed_min(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::Config(format!(
            "{SEED_MIN_KEY} must be a positive integer, got '{raw}'"
        ))),
    }
}
