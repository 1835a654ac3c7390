//! shadow-core - Comment sync layer for Shadow Comments
//!
//! This crate contains the models, remote adapters and the thread-scoped
//! sync logic behind the overlay comment thread shown next to externally
//! hosted videos: fetching with seed fallback, realtime merging, and
//! authenticated posting.

pub mod auth;
pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod remote;
pub mod seed;
pub mod state;
pub mod supabase;
pub mod sync;
pub mod util;
pub mod writer;

pub use backend::Backend;
pub use config::ShadowConfig;
pub use diagnostics::{DiagnosticKind, Diagnostics};
pub use error::{Error, RemoteError, Result};
pub use fetcher::{FetchOptions, FetchOutcome, Fetcher};
pub use models::{Comment, CommentDraft, CommentId, NewComment, ThreadId, BOT_AUTHOR_ID};
pub use state::{SyncAction, SyncPhase, ThreadState};
pub use sync::SyncController;
pub use writer::Writer;
