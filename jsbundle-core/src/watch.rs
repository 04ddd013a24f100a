//! Watch mode: host change events to debounced rebuilds
//!
//! The host watcher callback only forwards `(event, path)` into a channel.
//! The loop owning the [`Bundler`] invalidates the module, queues it and
//! (re)arms the debouncer, so a burst of events inside one scheduler tick
//! ends in a single rebuild. Rebuilds never overlap because the loop runs
//! them inline.

use crate::error::BundleError;
use crate::graph::Session;
use crate::module_path::ModulePath;
use crate::orchestrator::{BuildOutput, Bundler};
use jsbundle_vfs::{VirtualFileSystem, WatchEvent, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    /// A watched file changed on the host
    Changed(WatchEvent, PathBuf),
    /// The debounce window elapsed
    Rebuild,
}

/// Registers module files with the host watcher
pub struct WatchBridge {
    watcher: Option<Box<dyn Watcher>>,
    sender: UnboundedSender<WatchMessage>,
    watched: HashSet<PathBuf>,
}

impl WatchBridge {
    pub fn new(host: &dyn VirtualFileSystem, sender: UnboundedSender<WatchMessage>) -> Self {
        let watcher = host.create_watcher();
        if watcher.is_none() {
            warn!(target: "jsbundle::watch", "host has no file watcher; changes will not trigger rebuilds");
        }
        Self {
            watcher,
            sender,
            watched: HashSet::new(),
        }
    }

    /// Watch the file behind `path`. The change callback is installed the
    /// first time a module is registered.
    pub fn watch(&mut self, session: &mut Session, path: &ModulePath) {
        let Some(file) = path.as_file() else {
            return;
        };
        if self.watched.contains(file) {
            return;
        }
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };

        if !session.watcher_installed() {
            let sender = self.sender.clone();
            let started = watcher.start(Box::new(move |event, path| {
                let _ = sender.send(WatchMessage::Changed(event, path));
            }));
            if let Err(err) = started {
                warn!(target: "jsbundle::watch", error = %err, "failed to start watcher");
                return;
            }
            session.mark_watcher_installed();
            debug!(target: "jsbundle::watch", "watcher armed");
        }

        match watcher.watch_file(file) {
            Ok(()) => {
                trace!(target: "jsbundle::watch", path = %file.display(), "watching");
                self.watched.insert(file.to_path_buf());
            }
            Err(err) => warn!(target: "jsbundle::watch", path = %file.display(), error = %err, "cannot watch"),
        }
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}

/// At most one scheduled rebuild; scheduling again replaces it
pub struct Debouncer {
    pending: Option<JoinHandle<()>>,
    sender: UnboundedSender<WatchMessage>,
}

impl Debouncer {
    pub fn new(sender: UnboundedSender<WatchMessage>) -> Self {
        Self {
            pending: None,
            sender,
        }
    }

    /// Post a rebuild at the end of the current tick. Must run inside a
    /// tokio runtime.
    pub fn schedule(&mut self) {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }
        let sender = self.sender.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = sender.send(WatchMessage::Rebuild);
        }));
    }
}

/// The watch-mode event loop around a [`Bundler`]
pub struct WatchLoop {
    bundler: Bundler,
    receiver: UnboundedReceiver<WatchMessage>,
    debouncer: Debouncer,
}

impl WatchLoop {
    pub fn new(mut bundler: Bundler) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        bundler.enable_watch(sender.clone());
        Self {
            bundler,
            receiver,
            debouncer: Debouncer::new(sender),
        }
    }

    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    pub fn session(&self) -> &Session {
        self.bundler.session()
    }

    /// Run one build and report it. Returns whether it succeeded.
    pub async fn build<F>(&mut self, on_output: &mut F) -> bool
    where
        F: FnMut(&Session, Result<&BuildOutput, &BundleError>),
    {
        let result = self.bundler.build().await;
        if let Err(err) = &result {
            warn!(target: "jsbundle::watch", error = %err, "build failed; waiting for changes");
        }
        on_output(self.bundler.session(), result.as_ref());
        result.is_ok()
    }

    /// Apply one message. Returns whether a rebuild ran.
    pub async fn dispatch<F>(&mut self, message: WatchMessage, on_output: &mut F) -> bool
    where
        F: FnMut(&Session, Result<&BuildOutput, &BundleError>),
    {
        match message {
            WatchMessage::Changed(event, path) => {
                self.on_change(event, &path);
                false
            }
            WatchMessage::Rebuild => {
                if !self.bundler.session().has_pending_work() {
                    trace!(target: "jsbundle::watch", "nothing to rebuild");
                    return false;
                }
                info!(target: "jsbundle::watch", queued = self.bundler.session().queue_len(), "rebuilding");
                self.build(on_output).await;
                true
            }
        }
    }

    fn on_change(&mut self, event: WatchEvent, path: &Path) {
        if !self.bundler.is_watched(path) {
            trace!(target: "jsbundle::watch", path = %path.display(), "ignoring unwatched path");
            return;
        }
        let module = ModulePath::file(path);
        let removed = event == WatchEvent::Remove;
        let session = self.bundler.session_mut();
        if !session.invalidate(&module, removed) {
            return;
        }
        session.enqueue(&module);
        debug!(target: "jsbundle::watch", ?event, path = %path.display(), "invalidated");
        self.debouncer.schedule();
    }

    /// Serve events until the channel closes
    pub async fn run<F>(&mut self, on_output: &mut F)
    where
        F: FnMut(&Session, Result<&BuildOutput, &BundleError>),
    {
        while let Some(message) = self.receiver.recv().await {
            self.dispatch(message, on_output).await;
        }
    }

    /// Serve events until none arrives for `idle`. Returns the number of
    /// rebuilds that ran.
    pub async fn run_until_idle<F>(&mut self, idle: Duration, on_output: &mut F) -> usize
    where
        F: FnMut(&Session, Result<&BuildOutput, &BundleError>),
    {
        let mut rebuilds = 0;
        while let Ok(Some(message)) = tokio::time::timeout(idle, self.receiver.recv()).await {
            if self.dispatch(message, on_output).await {
                rebuilds += 1;
            }
        }
        rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbundle_config::BundleConfig;
    use jsbundle_vfs::MemoryFileSystem;
    use std::sync::Arc;

    fn watch_loop(host: &Arc<MemoryFileSystem>) -> WatchLoop {
        let bundler = Bundler::new(BundleConfig::with_entry("main.js"), host.clone()).unwrap();
        WatchLoop::new(bundler)
    }

    fn project() -> Arc<MemoryFileSystem> {
        Arc::new(
            MemoryFileSystem::with_files([
                ("/p/main.js", b"module.exports = require('./a');".to_vec()),
                ("/p/a.js", b"module.exports = 1;".to_vec()),
                ("/p/unrelated.js", b"2;".to_vec()),
            ])
            .with_cwd("/p"),
        )
    }

    #[tokio::test]
    async fn test_first_build_registers_files() {
        let host = project();
        let mut looped = watch_loop(&host);
        assert!(looped.build(&mut |_, _| {}).await);
        assert!(looped.session().watcher_installed());
        let mut watched = host.watched_paths();
        watched.sort();
        assert_eq!(watched, vec![PathBuf::from("/p/a.js"), PathBuf::from("/p/main.js")]);
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_rebuild() {
        let host = project();
        let mut looped = watch_loop(&host);
        looped.build(&mut |_, _| {}).await;

        host.touch(Path::new("/p/a.js")).unwrap();
        host.touch(Path::new("/p/main.js")).unwrap();
        host.touch(Path::new("/p/a.js")).unwrap();

        let mut outputs = 0;
        let rebuilds = looped
            .run_until_idle(Duration::from_millis(50), &mut |_, result| {
                assert!(result.is_ok());
                outputs += 1;
            })
            .await;
        assert_eq!(rebuilds, 1);
        assert_eq!(outputs, 1);
    }

    #[tokio::test]
    async fn test_unwatched_paths_are_ignored() {
        let host = project();
        let mut looped = watch_loop(&host);
        looped.build(&mut |_, _| {}).await;

        host.emit(WatchEvent::Update, Path::new("/p/unrelated.js"));
        looped.dispatch(
            WatchMessage::Changed(WatchEvent::Update, PathBuf::from("/p/unrelated.js")),
            &mut |_, _| {},
        ).await;
        assert!(!looped.session().has_pending_work());
        let rebuilds = looped.run_until_idle(Duration::from_millis(20), &mut |_, _| {}).await;
        assert_eq!(rebuilds, 0);
    }

    #[tokio::test]
    async fn test_broken_entry_recovers_after_fix() {
        let host = Arc::new(
            MemoryFileSystem::with_files([("/p/main.js", b"module.exports = ;".to_vec())]).with_cwd("/p"),
        );
        let mut looped = watch_loop(&host);
        let mut first = None;
        assert!(!looped.build(&mut |_, result| first = Some(result.is_ok())).await);
        assert_eq!(first, Some(false));
        assert!(looped.bundler().is_watched(Path::new("/p/main.js")));

        host.write_file(Path::new("/p/main.js"), b"module.exports = 1;").unwrap();
        host.emit(WatchEvent::Update, Path::new("/p/main.js"));
        let mut code = None;
        let rebuilds = looped
            .run_until_idle(Duration::from_millis(50), &mut |_, result| {
                code = result.ok().map(|output| output.code.clone());
            })
            .await;
        assert_eq!(rebuilds, 1);
        assert!(code.is_some_and(|code| code.contains("module.exports = 1;")));
    }

    #[tokio::test]
    async fn test_broken_dependency_is_watched() {
        let host = project();
        host.write_file(Path::new("/p/a.js"), b"module.exports = {;").unwrap();
        let mut looped = watch_loop(&host);
        assert!(!looped.build(&mut |_, _| {}).await);
        assert!(looped.bundler().is_watched(Path::new("/p/a.js")));

        host.write_file(Path::new("/p/a.js"), b"module.exports = 2;").unwrap();
        let mut ok = false;
        let rebuilds = looped
            .run_until_idle(Duration::from_millis(50), &mut |_, result| ok = result.is_ok())
            .await;
        assert_eq!(rebuilds, 1);
        assert!(ok);
    }

    #[tokio::test]
    async fn test_remove_marks_module_removed() {
        let host = project();
        let mut looped = watch_loop(&host);
        looped.build(&mut |_, _| {}).await;

        host.remove_file(Path::new("/p/a.js")).unwrap();
        let mut code = String::new();
        looped
            .run_until_idle(Duration::from_millis(50), &mut |_, result| {
                code = result.unwrap().code.clone();
            })
            .await;
        let record = looped.session().record(1).unwrap();
        assert!(record.removed);
        assert!(code.contains("Module 'a.js' was removed"));
        assert_eq!(looped.session().len(), 2);
    }
}
