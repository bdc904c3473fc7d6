//! Command-line surface for `tutorium-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "tutorium-cli", version, about = "Tutorium API CLI", long_about = None)]
pub struct Cli {
    /// Public listener base URL, e.g. <http://127.0.0.1:3000>
    #[arg(long, env = "TUTORIUM_SITE_URL", default_value = "http://127.0.0.1:3000")]
    pub site: String,

    /// Admin listener base URL, e.g. <http://127.0.0.1:3001>
    #[arg(long, env = "TUTORIUM_ADMIN_URL", default_value = "http://127.0.0.1:3001")]
    pub admin: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tutorial reads, listings and likes
    Posts(PostsArgs),
    /// Remote and listing cache administration
    Cache(CacheArgs),
}

#[derive(Parser, Debug)]
pub struct PostsArgs {
    #[command(subcommand)]
    pub action: PostsCmd,
}

#[derive(Subcommand, Debug)]
pub enum PostsCmd {
    /// Read one tutorial by language and heading
    Get { language: String, heading: String },
    /// List tutorials with optional filters
    List {
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        /// Order by likes instead of recency
        #[arg(long, conflicts_with = "recent")]
        popular: bool,
        #[arg(long)]
        recent: bool,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Like or unlike a tutorial
    Like {
        id: Uuid,
        #[arg(long, value_enum, default_value_t = LikeActionArg::Like)]
        action: LikeActionArg,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LikeActionArg {
    Like,
    Unlike,
}

impl fmt::Display for LikeActionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            LikeActionArg::Like => "like",
            LikeActionArg::Unlike => "unlike",
        };
        f.write_str(value)
    }
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheCmd,
}

#[derive(Subcommand, Debug)]
pub enum CacheCmd {
    /// Probe the remote cache
    Health,
    /// Show client and listing cache counters
    Stats,
    /// Drop every remote entry and clear the listing cache
    Flush,
    /// Remove the cached snapshot of one tutorial
    Invalidate {
        #[arg(long)]
        language: String,
        #[arg(long)]
        heading: String,
    },
    /// Preload the configured popular tutorials
    Warm,
    /// Reset the reconnect budget and connect again
    Reconnect,
}
