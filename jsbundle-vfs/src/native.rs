//! Native file system implementation

use crate::error::{VfsError, VfsResult};
use crate::r#trait::Watcher;
use crate::VirtualFileSystem;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A native OS file system implementation.
///
/// This wraps `std::fs` operations and provides the `VirtualFileSystem`
/// interface for local file access. With the `native-watch` feature (on by
/// default) `create_watcher` returns a `notify` backed watcher.
#[derive(Debug, Clone)]
pub struct NativeFileSystem {
    cwd: Option<PathBuf>,
}

impl NativeFileSystem {
    /// Create a new native file system using the process working directory.
    pub fn new() -> Self {
        Self { cwd: None }
    }

    /// Create a native file system that reports `base` as working directory.
    pub fn with_base(base: &Path) -> Self {
        Self {
            cwd: Some(base.to_path_buf()),
        }
    }
}

impl Default for NativeFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem for NativeFileSystem {
    fn cwd(&self) -> PathBuf {
        match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }

    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| VfsError::from_io(e, path))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        std::fs::write(path, content).map_err(|e| VfsError::from_io(e, path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn modified_time(&self, path: &Path) -> i64 {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(-1)
    }

    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        std::fs::create_dir_all(path).map_err(|e| VfsError::from_io(e, path))
    }

    #[cfg(feature = "native-watch")]
    fn create_watcher(&self) -> Option<Box<dyn Watcher>> {
        Some(Box::new(watch::NativeWatcher::default()))
    }
}

#[cfg(feature = "native-watch")]
mod watch {
    use crate::error::{VfsError, VfsResult};
    use crate::r#trait::{WatchCallback, WatchEvent, Watcher};
    use notify::event::{ModifyKind, RenameMode};
    use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
    use std::path::Path;

    /// `notify` backed watcher, one OS watch per registered file
    #[derive(Default)]
    pub struct NativeWatcher {
        inner: Option<RecommendedWatcher>,
    }

    fn classify(kind: &EventKind) -> Option<WatchEvent> {
        match kind {
            EventKind::Create(_) => Some(WatchEvent::Add),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchEvent::Remove),
            EventKind::Modify(_) => Some(WatchEvent::Update),
            EventKind::Remove(_) => Some(WatchEvent::Remove),
            _ => None,
        }
    }

    fn watch_error(err: notify::Error) -> VfsError {
        VfsError::Watch {
            message: err.to_string(),
        }
    }

    impl Watcher for NativeWatcher {
        fn start(&mut self, mut on_event: WatchCallback) -> VfsResult<()> {
            let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                match res {
                    Ok(event) => {
                        if let Some(kind) = classify(&event.kind) {
                            for path in event.paths {
                                on_event(kind, path);
                            }
                        }
                    }
                    Err(e) => tracing::warn!(target: "jsbundle::watch", "watcher error: {}", e),
                }
            })
            .map_err(watch_error)?;
            self.inner = Some(watcher);
            Ok(())
        }

        fn watch_file(&mut self, path: &Path) -> VfsResult<()> {
            let watcher = self.inner.as_mut().ok_or_else(|| VfsError::Watch {
                message: String::from("watcher not started"),
            })?;
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(watch_error)
        }

        fn unwatch_file(&mut self, path: &Path) -> VfsResult<()> {
            match self.inner.as_mut() {
                Some(watcher) => watcher.unwatch(path).map_err(watch_error),
                None => Ok(()),
            }
        }
    }
}
