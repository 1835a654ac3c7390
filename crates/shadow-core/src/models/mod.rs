//! Data models for Shadow Comments

mod comment;
mod thread;

pub use comment::{Comment, CommentDraft, CommentId, NewComment, BOT_AUTHOR_ID};
pub use thread::ThreadId;
