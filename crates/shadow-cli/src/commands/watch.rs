use shadow_core::{Backend, SyncController};

use crate::commands::common::{
    access_token_from_env, format_change_line, format_comment_lines, identity_from_env,
    load_config, render_diagnostics, resolve_thread,
};
use crate::error::CliError;

pub async fn run_watch(video: &str) -> Result<(), CliError> {
    let config = load_config()?;
    let thread_id = resolve_thread(video)?;
    let backend = Backend::from_config(&config)?.with_access_token(access_token_from_env());
    let offline = backend.is_offline();

    let mut controller = SyncController::new(
        backend.clone(),
        backend,
        identity_from_env(),
        config.fetch_options(),
    );
    controller.select_thread(Some(thread_id.clone())).await;

    if let Some(diagnostics) = controller.error() {
        eprintln!("{}", render_diagnostics(diagnostics));
        eprintln!();
    }
    for line in format_comment_lines(controller.comments()) {
        println!("{line}");
    }

    if offline {
        eprintln!("Realtime is unavailable without a Supabase project; not watching.");
        return Ok(());
    }
    eprintln!("Watching {thread_id} for changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            change = controller.next_change() => match change {
                Some(event) => println!("{}", format_change_line(&event)),
                None => {
                    eprintln!("Change stream closed");
                    break;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    controller.detach();
    Ok(())
}
