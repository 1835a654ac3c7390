use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shadow_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No comment body provided")]
    EmptyBody,
    #[error("--seed-min must be at least 1")]
    InvalidSeedMin,
    #[error("Not signed in. Set SHADOW_USER_ID (and SHADOW_ACCESS_TOKEN) to post comments.")]
    NotSignedIn,
}
