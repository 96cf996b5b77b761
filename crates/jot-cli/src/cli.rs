use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jot_core::models::{ConflictResolution, NoteKind};

#[derive(Parser)]
#[command(name = "jot")]
#[command(about = "Offline-first notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Quick capture: jot "my thought here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Kind of note to create
        #[arg(long, value_enum, default_value_t = KindArg::General)]
        kind: KindArg,
        /// Note content
        content: Vec<String>,
    },
    /// List recent notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Only show notes of this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Include archived notes
        #[arg(long)]
        archived: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replacement content; opens $EDITOR when omitted
        content: Vec<String>,
    },
    /// Archive a note
    Archive {
        /// Note ID or unique ID prefix
        id: String,
        /// Unarchive instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Resolve a sync conflict
    Resolve {
        /// Note ID or unique ID prefix
        id: String,
        #[command(flatten)]
        decision: ResolveArgs,
    },
    /// List unresolved sync conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending sync operations
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending changes to the server now
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    General,
    QuickCapture,
    Task,
}

impl From<KindArg> for NoteKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::General => Self::General,
            KindArg::QuickCapture => Self::QuickCapture,
            KindArg::Task => Self::Task,
        }
    }
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct ResolveArgs {
    /// Keep the local version and push it over the server's
    #[arg(long)]
    pub keep_local: bool,
    /// Take the server's version
    #[arg(long)]
    pub accept_remote: bool,
    /// Replace the note with merged content and push it
    #[arg(long, value_name = "CONTENT")]
    pub merge: Option<String>,
    /// Drop the note everywhere
    #[arg(long)]
    pub discard: bool,
}

impl ResolveArgs {
    pub fn resolution(&self) -> ConflictResolution {
        if let Some(content) = &self.merge {
            ConflictResolution::Merge(content.clone())
        } else if self.accept_remote {
            ConflictResolution::AcceptRemote
        } else if self.discard {
            ConflictResolution::Discard
        } else {
            ConflictResolution::KeepLocal
        }
    }
}
