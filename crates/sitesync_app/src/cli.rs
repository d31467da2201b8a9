use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Keeps a static site in step with a shared document folder and rebuilds its
/// search index, Atom feed and sitemap.
#[derive(Debug, Parser)]
#[command(name = "sitesync", version)]
pub struct Cli {
    /// Site root; every configured path is resolved against it.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// RON configuration file. Defaults to `<root>/sitesync.ron` when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write the log to `sitesync.log` in the site root.
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mirror the remote folder into blog posts and update the listing page.
    Sync(SyncArgs),
    /// Rebuild the site search index.
    Index,
    /// Regenerate the Atom feed from the search index.
    Feed,
    /// Regenerate the sitemap from the search index.
    Sitemap,
    /// sync, index, feed and sitemap in order.
    All(SyncArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SyncArgs {
    /// Remote folder to mirror.
    #[arg(long, env = "DRIVE_FOLDER_ID")]
    pub folder_id: Option<String>,

    /// JSON file holding an `access_token` or an `api_key`.
    #[arg(long, env = "CREDS_FILE")]
    pub creds_file: Option<PathBuf>,

    /// Plan and fetch without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Chunked posts load all remaining parts automatically 1500 ms after the
    /// page opens, instead of waiting for the "Load full document" button.
    #[arg(long)]
    pub prefetch: bool,
}
