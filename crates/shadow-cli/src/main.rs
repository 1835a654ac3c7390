//! Shadow CLI - read and post overlay comments for externally hosted videos
//!
//! Talks to the same Supabase project as the overlay. Without one configured,
//! threads are served from placeholder comments.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::doctor::run_doctor;
use crate::commands::list::run_list;
use crate::commands::post::run_post;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shadow=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List {
            video,
            json,
            no_seed,
            seed_min,
        } => run_list(&video, json, no_seed, seed_min).await?,
        Commands::Post {
            video,
            body,
            parent,
            at,
        } => run_post(&video, &body, parent, at).await?,
        Commands::Watch { video } => run_watch(&video).await?,
        Commands::Doctor { video } => run_doctor(video.as_deref()).await?,
    }

    Ok(())
}
