//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::r#trait::{WatchCallback, WatchEvent, Watcher};
use crate::VirtualFileSystem;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: i64,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, MemoryFile>,
    dirs: BTreeSet<String>,
    /// Logical clock used as modification time
    clock: i64,
}

#[derive(Default)]
struct WatchHub {
    callback: Option<WatchCallback>,
    watched: BTreeSet<String>,
}

impl fmt::Debug for WatchHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHub")
            .field("started", &self.callback.is_some())
            .field("watched", &self.watched)
            .finish()
    }
}

/// An in-memory file system implementation.
///
/// Files live in a `BTreeMap`; directories are implied by file paths or
/// created explicitly. Every write advances a logical clock that serves as
/// the modification time, so tests get deterministic, strictly increasing
/// mtimes. Writes, touches and removals of watched paths are reported to the
/// watcher returned by `create_watcher`.
///
/// # Example
/// ```
/// use jsbundle_vfs::{MemoryFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.write_file(Path::new("/test.js"), b"hello").unwrap();
/// let content = fs.read_file(Path::new("/test.js")).unwrap();
/// assert_eq!(content, b"hello");
/// assert!(fs.is_dir(Path::new("/")));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    state: Arc<RwLock<State>>,
    hub: Arc<Mutex<WatchHub>>,
    cwd: PathBuf,
}

impl MemoryFileSystem {
    /// Create a new empty memory file system rooted at `/`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            hub: Arc::new(Mutex::new(WatchHub::default())),
            cwd: PathBuf::from("/"),
        }
    }

    /// Create a new memory file system pre-populated with files.
    ///
    /// # Arguments
    /// * `files` - Iterator of (path, content) tuples
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let fs = Self::new();
        if let Ok(mut state) = fs.state.write() {
            for (path, content) in files {
                state.clock += 1;
                let modified = state.clock;
                state
                    .files
                    .insert(normalize(Path::new(path.as_ref())), MemoryFile { content, modified });
            }
        }
        fs
    }

    /// Use `cwd` as the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Remove a file, reporting `Remove` to the watcher
    pub fn remove_file(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        let removed = self.write_state()?.files.remove(&normalized);
        match removed {
            Some(_) => {
                self.notify(WatchEvent::Remove, &normalized);
                Ok(())
            }
            None => Err(VfsError::NotFound { path: normalized }),
        }
    }

    /// Advance the modification time of a file without changing it
    pub fn touch(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        {
            let mut state = self.write_state()?;
            state.clock += 1;
            let clock = state.clock;
            let file = state
                .files
                .get_mut(&normalized)
                .ok_or_else(|| VfsError::NotFound {
                    path: normalized.clone(),
                })?;
            file.modified = clock;
        }
        self.notify(WatchEvent::Update, &normalized);
        Ok(())
    }

    /// Overwrite the modification time of a file silently
    pub fn set_modified_time(&self, path: &Path, modified: i64) -> VfsResult<()> {
        let normalized = normalize(path);
        let mut state = self.write_state()?;
        match state.files.get_mut(&normalized) {
            Some(file) => {
                file.modified = modified;
                Ok(())
            }
            None => Err(VfsError::NotFound { path: normalized }),
        }
    }

    /// Deliver an event as if the file had changed. Unwatched paths are
    /// dropped, like any other event.
    pub fn emit(&self, event: WatchEvent, path: &Path) {
        self.notify(event, &normalize(path));
    }

    /// Paths currently registered with the watcher
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        match self.hub.lock() {
            Ok(hub) => hub.watched.iter().map(PathBuf::from).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn notify(&self, event: WatchEvent, normalized: &str) {
        let mut hub = match self.hub.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if !hub.watched.contains(normalized) {
            return;
        }
        if let Some(callback) = hub.callback.as_mut() {
            callback(event, PathBuf::from(normalized));
        }
    }

    fn write_state(&self) -> VfsResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| VfsError::Custom {
            message: String::from("Lock poisoned"),
        })
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a path string for internal storage.
/// Uses forward slashes and no trailing separator.
fn normalize(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

impl VirtualFileSystem for MemoryFileSystem {
    fn cwd(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = normalize(path);
        let state = self.state.read().map_err(|_| VfsError::Custom {
            message: String::from("Lock poisoned"),
        })?;

        state
            .files
            .get(&normalized)
            .map(|file| file.content.clone())
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let normalized = normalize(path);
        let existed = {
            let mut state = self.write_state()?;
            state.clock += 1;
            let modified = state.clock;
            state
                .files
                .insert(
                    normalized.clone(),
                    MemoryFile {
                        content: content.to_vec(),
                        modified,
                    },
                )
                .is_some()
        };
        let event = if existed {
            WatchEvent::Update
        } else {
            WatchEvent::Add
        };
        self.notify(event, &normalized);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        match self.state.read() {
            Ok(state) => state.files.contains_key(&normalized),
            Err(_) => false,
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        if state.dirs.contains(&normalized) {
            return true;
        }
        let prefix = if normalized.ends_with('/') {
            normalized
        } else {
            format!("{}/", normalized)
        };
        state
            .files
            .range(prefix.clone()..)
            .next()
            .map(|(key, _)| key.starts_with(&prefix))
            .unwrap_or(false)
    }

    fn modified_time(&self, path: &Path) -> i64 {
        let normalized = normalize(path);
        match self.state.read() {
            Ok(state) => state.files.get(&normalized).map(|f| f.modified).unwrap_or(-1),
            Err(_) => -1,
        }
    }

    fn create_watcher(&self) -> Option<Box<dyn Watcher>> {
        Some(Box::new(MemoryWatcher {
            hub: Arc::clone(&self.hub),
        }))
    }

    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        let mut state = self.write_state()?;
        let mut current = Some(path);
        while let Some(dir) = current {
            let normalized = normalize(dir);
            if normalized.is_empty() {
                break;
            }
            state.dirs.insert(normalized);
            current = dir.parent();
        }
        Ok(())
    }
}

/// Watcher over a [`MemoryFileSystem`]
struct MemoryWatcher {
    hub: Arc<Mutex<WatchHub>>,
}

impl MemoryWatcher {
    fn hub(&self) -> VfsResult<std::sync::MutexGuard<'_, WatchHub>> {
        self.hub.lock().map_err(|_| VfsError::Watch {
            message: String::from("Lock poisoned"),
        })
    }
}

impl Watcher for MemoryWatcher {
    fn start(&mut self, on_event: WatchCallback) -> VfsResult<()> {
        self.hub()?.callback = Some(on_event);
        Ok(())
    }

    fn watch_file(&mut self, path: &Path) -> VfsResult<()> {
        self.hub()?.watched.insert(normalize(path));
        Ok(())
    }

    fn unwatch_file(&mut self, path: &Path) -> VfsResult<()> {
        self.hub()?.watched.remove(&normalize(path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_new_fs_is_empty() {
        let fs = MemoryFileSystem::new();
        assert!(!fs.exists(Path::new("/anything.js")));
        assert_eq!(fs.cwd(), PathBuf::from("/"));
    }

    #[test]
    fn test_empty_content() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/empty.js");

        fs.write_file(path, b"").unwrap();
        let content = fs.read_file(path).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_read_to_string_rejects_invalid_utf8() {
        let fs = MemoryFileSystem::with_files([("/bad.js", vec![0xff, 0xfe])]);
        assert!(matches!(
            fs.read_to_string(Path::new("/bad.js")),
            Err(VfsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_directories_are_implied() {
        let fs = MemoryFileSystem::with_files([
            ("/project/src/main.js", b"".to_vec()),
            ("/project/node_modules/dep/index.js", b"".to_vec()),
        ]);

        assert!(fs.is_dir(Path::new("/")));
        assert!(fs.is_dir(Path::new("/project")));
        assert!(fs.is_dir(Path::new("/project/src/")));
        assert!(fs.is_dir(Path::new("/project/node_modules/dep")));
        assert!(!fs.is_dir(Path::new("/project/src/main.js")));
        assert!(!fs.is_dir(Path::new("/proj")));
        assert!(fs.exists(Path::new("/project/node_modules")));
    }

    #[test]
    fn test_explicit_directories() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(Path::new("/out/dist")).unwrap();
        assert!(fs.is_dir(Path::new("/out")));
        assert!(fs.is_dir(Path::new("/out/dist")));
        assert!(!fs.is_file(Path::new("/out/dist")));
    }

    #[test]
    fn test_modified_time_advances() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/a.js");
        assert_eq!(fs.modified_time(path), -1);

        fs.write_file(path, b"1").unwrap();
        let first = fs.modified_time(path);
        fs.write_file(path, b"2").unwrap();
        let second = fs.modified_time(path);
        fs.touch(path).unwrap();
        let third = fs.modified_time(path);

        assert!(first > 0);
        assert!(second > first);
        assert!(third > second);

        fs.set_modified_time(path, 7).unwrap();
        assert_eq!(fs.modified_time(path), 7);
    }

    #[test]
    fn test_remove_file() {
        let fs = MemoryFileSystem::with_files([("/a.js", b"x".to_vec())]);
        fs.remove_file(Path::new("/a.js")).unwrap();
        assert!(!fs.exists(Path::new("/a.js")));
        assert_eq!(fs.modified_time(Path::new("/a.js")), -1);
        assert!(matches!(
            fs.remove_file(Path::new("/a.js")),
            Err(VfsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_clone_shares_data() {
        let fs1 = MemoryFileSystem::new();
        let path = Path::new("/shared.js");

        fs1.write_file(path, b"shared").unwrap();

        let fs2 = fs1.clone();
        assert!(fs2.exists(path));
        assert_eq!(fs2.read_file(path).unwrap(), b"shared");

        fs2.write_file(path, b"modified").unwrap();
        assert_eq!(fs1.read_file(path).unwrap(), b"modified");
    }

    #[test]
    fn test_concurrent_reads() {
        let fs = MemoryFileSystem::with_files([("/test.js", b"concurrent".to_vec())]);
        let mut handles = vec![];

        for _ in 0..10 {
            let fs_clone = fs.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let content = fs_clone.read_file(Path::new("/test.js")).unwrap();
                    assert_eq!(content, b"concurrent");
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_watcher_reports_only_watched_paths() {
        let fs = MemoryFileSystem::with_files([
            ("/a.js", b"a".to_vec()),
            ("/b.js", b"b".to_vec()),
        ]);
        let (tx, rx) = mpsc::channel();
        let mut watcher = fs.create_watcher().unwrap();
        watcher
            .start(Box::new(move |event, path| {
                let _ = tx.send((event, path));
            }))
            .unwrap();
        watcher.watch_file(Path::new("/a.js")).unwrap();

        fs.write_file(Path::new("/b.js"), b"changed").unwrap();
        fs.write_file(Path::new("/a.js"), b"changed").unwrap();
        fs.remove_file(Path::new("/a.js")).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                (WatchEvent::Update, PathBuf::from("/a.js")),
                (WatchEvent::Remove, PathBuf::from("/a.js")),
            ]
        );
        assert_eq!(fs.watched_paths(), vec![PathBuf::from("/a.js")]);
    }

    #[test]
    fn test_unwatch_stops_events() {
        let fs = MemoryFileSystem::with_files([("/a.js", b"a".to_vec())]);
        let (tx, rx) = mpsc::channel();
        let mut watcher = fs.create_watcher().unwrap();
        watcher
            .start(Box::new(move |event, path| {
                let _ = tx.send((event, path));
            }))
            .unwrap();
        watcher.watch_file(Path::new("/a.js")).unwrap();
        watcher.unwatch_file(Path::new("/a.js")).unwrap();

        fs.emit(WatchEvent::Update, Path::new("/a.js"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_read_nonexistent() {
        let fs = MemoryFileSystem::new();
        let result = fs.read_file(Path::new("/nonexistent.js"));
        assert!(matches!(result.unwrap_err(), VfsError::NotFound { .. }));
    }

    #[test]
    fn test_with_files() {
        let fs = MemoryFileSystem::with_files([
            ("/a.js", b"content a".to_vec()),
            ("/b.js", b"content b".to_vec()),
        ]);

        assert_eq!(fs.read_file(Path::new("/a.js")).unwrap(), b"content a");
        assert_eq!(fs.read_file(Path::new("/b.js")).unwrap(), b"content b");
    }
}
