use std::path::PathBuf;

/// Watch event after classification against the target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The target was written, created or swapped in by a rename.
    Changed(PathBuf),
    /// The target no longer exists.
    Removed(PathBuf),
}
