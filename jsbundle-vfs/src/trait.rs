//! VirtualFileSystem and Watcher trait definitions

use crate::error::{VfsError, VfsResult};
use std::path::{Path, PathBuf};

/// Kind of change reported by a [`Watcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    Add,
    Update,
    Remove,
}

/// Callback installed with [`Watcher::start`]
pub type WatchCallback = Box<dyn FnMut(WatchEvent, PathBuf) + Send + 'static>;

/// File change watcher
///
/// A watcher only reports events for paths registered with `watch_file`.
pub trait Watcher: Send {
    /// Install the change callback. Must be called before `watch_file`.
    fn start(&mut self, on_event: WatchCallback) -> VfsResult<()>;

    /// Start reporting changes of `path`
    fn watch_file(&mut self, path: &Path) -> VfsResult<()>;

    /// Stop reporting changes of `path`
    fn unwatch_file(&mut self, path: &Path) -> VfsResult<()>;
}

/// Virtual File System trait
///
/// Provides a unified interface for file operations, decoupling the bundler
/// from specific file system implementations.
///
/// # Implementations
/// - `MemoryFileSystem`: In-memory file system
/// - `NativeFileSystem`: Native OS file system
pub trait VirtualFileSystem: Send + Sync {
    /// Current working directory, absolute
    fn cwd(&self) -> PathBuf;

    /// Read file contents
    ///
    /// # Arguments
    /// * `path` - File path
    ///
    /// # Returns
    /// File contents as bytes, or VfsError
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Write file contents
    ///
    /// Creates the file if it doesn't exist, truncates it if it does.
    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Last modification time in milliseconds, `-1` if the path is absent
    fn modified_time(&self, path: &Path) -> i64;

    /// Create a change watcher, if the host supports one
    fn create_watcher(&self) -> Option<Box<dyn Watcher>> {
        None
    }

    /// Read a file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> VfsResult<String> {
        let bytes = self.read_file(path)?;
        String::from_utf8(bytes).map_err(|e| VfsError::InvalidPath {
            path: path.to_string_lossy().to_string(),
            reason: format!("invalid UTF-8: {}", e),
        })
    }

    /// Create every missing directory of `path`. Backends without real
    /// directories may leave this as a no-op.
    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        let _ = path;
        Ok(())
    }
}
