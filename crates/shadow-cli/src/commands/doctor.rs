use shadow_core::{Backend, FetchOptions, Fetcher};

use crate::commands::common::{load_config, render_diagnostics, resolve_thread};
use crate::error::CliError;

pub async fn run_doctor(video: Option<&str>) -> Result<(), CliError> {
    let config = load_config()?;
    let status = config.status();

    println!(
        "Supabase:          {}",
        if status.configured {
            "configured"
        } else {
            "not configured (offline, placeholder comments only)"
        }
    );
    println!("SUPABASE_URL:      {}", status.supabase_url);
    println!("SUPABASE_ANON_KEY: {}", status.supabase_anon_key);
    println!("Comments table:    {}", status.comments_table);
    println!(
        "Local seeds:       {} (min {})",
        if status.local_seed { "on" } else { "off" },
        status.seed_min
    );

    let Some(video) = video else {
        return Ok(());
    };
    let thread_id = resolve_thread(video)?;
    let backend = Backend::from_config(&config)?;
    let outcome = Fetcher::new(backend)
        .fetch(
            &thread_id,
            FetchOptions {
                allow_seeds: false,
                ..config.fetch_options()
            },
        )
        .await;

    println!();
    match outcome.error {
        None => println!(
            "Fetch OK: {} comment(s) on {thread_id}",
            outcome.comments.len()
        ),
        Some(diagnostics) => println!("{}", render_diagnostics(&diagnostics)),
    }

    Ok(())
}
