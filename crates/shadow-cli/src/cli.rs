use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "shadow")]
#[command(about = "Read, post and watch Shadow Comments threads from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a thread once and print it
    #[command(alias = "ls")]
    List {
        /// Video URL or bare video id
        video: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Never fill empty threads with placeholder comments
        #[arg(long)]
        no_seed: bool,
        /// Number of placeholder comments for empty threads
        #[arg(long, value_name = "N")]
        seed_min: Option<usize>,
    },
    /// Post a comment (reads stdin when no body is given)
    Post {
        /// Video URL or bare video id
        video: String,
        /// Comment body
        body: Vec<String>,
        /// Reply to this comment id
        #[arg(long, value_name = "ID")]
        parent: Option<String>,
        /// Anchor the comment at this playback position
        #[arg(long, value_name = "SECONDS")]
        at: Option<i64>,
    },
    /// Print a thread, then stream changes until interrupted
    Watch {
        /// Video URL or bare video id
        video: String,
    },
    /// Show configuration and optionally probe a thread
    Doctor {
        /// Video URL or bare video id to probe
        video: Option<String>,
    },
}
