//! Shared cross-platform state types.

/// Unified sync state published by the sync worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    /// Entries past the retry ceiling; only a manual sync retries them
    NeedsAttention(usize),
    Error,
}

impl SyncState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::NeedsAttention(_) => "needs attention",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeedsAttention(count) => write!(f, "{} ({count})", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}
