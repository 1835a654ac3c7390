use shadow_core::{Backend, Fetcher};

use crate::commands::common::{
    comment_to_list_item, format_comment_lines, load_config, render_diagnostics, resolve_thread,
    CommentListItem,
};
use crate::error::CliError;

pub async fn run_list(
    video: &str,
    as_json: bool,
    no_seed: bool,
    seed_min: Option<usize>,
) -> Result<(), CliError> {
    let config = load_config()?;
    let thread_id = resolve_thread(video)?;

    let mut options = config.fetch_options();
    if no_seed {
        options.allow_seeds = false;
    }
    if let Some(seed_min) = seed_min {
        if seed_min == 0 {
            return Err(CliError::InvalidSeedMin);
        }
        options.seed_min = seed_min;
    }

    let backend = Backend::from_config(&config)?;
    let outcome = Fetcher::new(backend).fetch(&thread_id, options).await;

    if let Some(diagnostics) = &outcome.error {
        eprintln!("{}", render_diagnostics(diagnostics));
        eprintln!();
    }

    if as_json {
        let json_items = outcome
            .comments
            .iter()
            .map(comment_to_list_item)
            .collect::<Vec<CommentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if outcome.comments.is_empty() {
        println!("No comments on {thread_id} yet.");
    } else {
        for line in format_comment_lines(&outcome.comments) {
            println!("{line}");
        }
    }

    Ok(())
}
