use shadow_core::{Backend, CommentDraft, CommentId, DiagnosticKind, Diagnostics, Writer};

use crate::commands::common::{
    identity_from_env, load_config, resolve_comment_body, resolve_thread,
};
use crate::error::CliError;

pub async fn run_post(
    video: &str,
    body_parts: &[String],
    parent: Option<String>,
    at: Option<i64>,
) -> Result<(), CliError> {
    let body = resolve_comment_body(body_parts)?;
    let config = load_config()?;
    let thread_id = resolve_thread(video)?;
    let identity = identity_from_env().ok_or(CliError::NotSignedIn)?;

    let mut draft = CommentDraft::new(body);
    if let Some(parent) = parent {
        draft = draft.reply_to(CommentId::new(parent));
    }
    if let Some(seconds) = at {
        draft = draft.at_seconds(seconds);
    }

    let writer = Writer::new(Backend::from_config(&config)?, identity);
    match writer.add(&thread_id, &draft).await {
        Ok(comment) => {
            println!("{}", comment.id);
            Ok(())
        }
        Err(error) => {
            let diagnostics = Diagnostics::from_error(&error);
            if diagnostics.kind() != DiagnosticKind::Generic {
                eprintln!("{}", diagnostics.remediation());
                eprintln!();
            }
            Err(error.into())
        }
    }
}
