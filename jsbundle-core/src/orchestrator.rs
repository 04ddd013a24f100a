//! Build orchestration
//!
//! A build drains the session queue in batches until it is empty, injects
//! the shims for environment globals the modules turned out to use, drains
//! again, and repeats until nothing new is queued. Only then is the runtime
//! program printed. Any fatal error aborts the pass without output; modules
//! that were mid-batch go back on the queue for the next attempt.
//!
//! Files of a batch are read on tokio's blocking pool; transforms run in
//! queue order on the build task.

use crate::cache;
use crate::error::BundleError;
use crate::graph::Session;
use crate::module_path::ModulePath;
use crate::resolver::Resolver;
use crate::runtime::{self, Injected};
use crate::sourcemap;
use crate::syntax::ast::Module;
use crate::syntax::print_module;
use crate::transform::{self, Loaded, Pipeline};
use crate::watch::{WatchBridge, WatchLoop, WatchMessage};
use jsbundle_config::{BundleConfig, SourceMapMode, Target};
use jsbundle_vfs::{VfsError, VirtualFileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swc_core::common::DUMMY_SP;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{debug, info, trace};

/// Modules read from the host concurrently per batch
pub const BATCH_SIZE: usize = 4;

/// Result of a successful build pass
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub code: String,
    /// Source map JSON, when source maps are enabled
    pub source_map: Option<String>,
    pub modules: usize,
    pub elapsed: Duration,
}

/// Owns one build session and rebuilds it on demand
pub struct Bundler {
    config: Arc<BundleConfig>,
    host: Arc<dyn VirtualFileSystem>,
    resolver: Resolver,
    pipeline: Pipeline,
    session: Session,
    entry: ModulePath,
    cwd: PathBuf,
    injected: Injected,
    bridge: Option<WatchBridge>,
}

impl Bundler {
    /// Validate the configuration, restore a cached session when one is
    /// available and queue the entry module
    pub fn new(config: BundleConfig, host: Arc<dyn VirtualFileSystem>) -> Result<Self, BundleError> {
        config.validate()?;
        let cwd = host.cwd();
        let config = Arc::new(config);
        let resolver = Resolver::new(host.clone(), config.clone());
        let entry = resolver.resolve_entry(config.entry.as_deref().unwrap_or(Path::new("")))?;

        let mut session = match cache::read(host.as_ref(), &cwd, config.debug)? {
            Some(snapshot) => match cache::load(snapshot, host.as_ref(), &entry) {
                Ok(restored) => {
                    info!(
                        target: "jsbundle::cache",
                        modules = restored.session.len(),
                        requeued = restored.requeued.len(),
                        "restored session"
                    );
                    restored.session
                }
                Err(err) if config.debug => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(target: "jsbundle::cache", error = %err, "ignoring cache");
                    Session::new()
                }
            },
            None => Session::new(),
        };

        let index = session.index_of(&entry);
        debug_assert_eq!(index, 0);
        if session.record(index).is_some_and(|record| record.is_pending()) {
            session.enqueue(&entry);
        }

        Ok(Self {
            config,
            host,
            resolver,
            pipeline: Pipeline::new(),
            session,
            entry,
            cwd,
            injected: Injected::default(),
            bridge: None,
        })
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn entry(&self) -> &ModulePath {
        &self.entry
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Register every processed file with the host watcher from now on
    pub(crate) fn enable_watch(&mut self, sender: UnboundedSender<WatchMessage>) {
        self.bridge = Some(WatchBridge::new(self.host.as_ref(), sender));
    }

    pub(crate) fn is_watched(&self, path: &Path) -> bool {
        self.bridge.as_ref().is_some_and(|bridge| bridge.is_watched(path))
    }

    /// Run one build pass to its fixed point and generate the bundle
    pub async fn build(&mut self) -> Result<BuildOutput, BundleError> {
        let started = Instant::now();
        if let Err(err) = self.run_to_fixed_point().await {
            self.session.restore_in_flight();
            return Err(err);
        }
        self.watch_all();
        if self.config.source_maps != SourceMapMode::Off {
            self.ensure_sources();
        }
        let output = self.codegen(started)?;
        if self.config.debug {
            cache::write(self.host.as_ref(), &self.cwd, &cache::save(&self.session))?;
        }
        info!(
            target: "jsbundle::orchestrator",
            modules = output.modules,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "build complete"
        );
        Ok(output)
    }

    async fn run_to_fixed_point(&mut self) -> Result<(), BundleError> {
        loop {
            self.module_pass().await?;
            if !self.inject_globals()? {
                return Ok(());
            }
        }
    }

    /// Drain the queue batch by batch; transforms may queue more
    async fn module_pass(&mut self) -> Result<(), BundleError> {
        while self.session.has_pending_work() {
            let batch = self.session.drain_batch(BATCH_SIZE);
            trace!(target: "jsbundle::orchestrator", size = batch.len(), remaining = self.session.queue_len(), "batch");
            let loaded = prefetch(&self.host, &batch).await;
            for (path, loaded) in batch.iter().zip(loaded) {
                // Watched before processing so a file that fails can still
                // trigger the rebuild that fixes it
                if let Some(bridge) = self.bridge.as_mut() {
                    bridge.watch(&mut self.session, path);
                }
                let index = self.session.index_of(path);
                self.pipeline.process(
                    index,
                    loaded?,
                    &mut self.session,
                    &self.resolver,
                    &self.config,
                    self.host.as_ref(),
                    &self.cwd,
                )?;
            }
        }
        Ok(())
    }

    /// Queue shim modules for detected globals. Returns whether anything
    /// new needs processing.
    fn inject_globals(&mut self) -> Result<bool, BundleError> {
        let globals = self.session.detected_globals;
        self.injected.global = globals.global;
        if self.config.target != Target::Browser {
            return Ok(false);
        }
        let mut queued = false;
        for (used, specifier) in [(globals.process, "process"), (globals.buffer, "buffer")] {
            if !used {
                continue;
            }
            let path = self.resolver.resolve(&self.entry, specifier)?;
            let before = self.session.queue_len();
            let index = self.session.discover(&path);
            queued |= self.session.queue_len() > before;
            match specifier {
                "process" => self.injected.process = Some(index),
                _ => self.injected.buffer = Some(index),
            }
            debug!(target: "jsbundle::orchestrator", global = specifier, index, "shim injected");
        }
        Ok(queued)
    }

    fn watch_all(&mut self) {
        if let Some(bridge) = self.bridge.as_mut() {
            let paths: Vec<ModulePath> = self
                .session
                .records()
                .iter()
                .map(|record| record.path.clone())
                .collect();
            for path in &paths {
                bridge.watch(&mut self.session, path);
            }
        }
    }

    /// Modules restored from the cache carry no source text; positions
    /// into them are only mappable once it is read back
    fn ensure_sources(&mut self) {
        let missing: Vec<(usize, PathBuf)> = self
            .session
            .records()
            .iter()
            .filter(|record| record.source.is_none() && record.span_base > 0)
            .filter_map(|record| Some((record.index, record.path.as_file()?.to_path_buf())))
            .collect();
        for (index, file) in missing {
            match self.host.read_to_string(&file) {
                Ok(text) => {
                    if let Some(record) = self.session.record_mut(index) {
                        record.source = Some(text);
                    }
                }
                Err(err) => {
                    debug!(target: "jsbundle::orchestrator", path = %file.display(), error = %err, "source unavailable for mapping")
                }
            }
        }
    }

    fn codegen(&self, started: Instant) -> Result<BuildOutput, BundleError> {
        let records = self.session.records();
        let factories = records.iter().map(|record| record.ast.clone()).collect();
        let program = runtime::build_program(factories, self.injected, self.config.target)?;
        let module = Module {
            span: DUMMY_SP,
            body: program.into_iter().map(Into::into).collect(),
            shebang: None,
        };
        let with_mappings = self.config.source_maps != SourceMapMode::Off;
        let printed = print_module(&module, records.iter().map(|record| &record.comments), with_mappings)
            .map_err(|err| BundleError::Emit(err.to_string()))?;
        let mut code = printed.code;

        let source_map = match self.config.source_maps {
            SourceMapMode::Off => None,
            mode => {
                let file = self.config.output.file.as_deref();
                let mappings = sourcemap::locate(&printed.mappings, &self.session);
                let map = sourcemap::stitch(&mappings, &self.session, &self.cwd, file)?;
                let url = match (mode, file) {
                    (SourceMapMode::On, Some(file)) => format!("{}.map", file),
                    _ => sourcemap::to_data_url(&map)?,
                };
                code.push_str("//# sourceMappingURL=");
                code.push_str(&url);
                code.push('\n');
                Some(sourcemap::to_json(&map)?)
            }
        };

        Ok(BuildOutput {
            code,
            source_map,
            modules: self.session.len(),
            elapsed: started.elapsed(),
        })
    }
}

/// Read a batch of modules on the blocking pool. Results keep batch order.
async fn prefetch(
    host: &Arc<dyn VirtualFileSystem>,
    batch: &[ModulePath],
) -> Vec<Result<Loaded, VfsError>> {
    let mut readers = JoinSet::new();
    for (position, path) in batch.iter().cloned().enumerate() {
        let host = host.clone();
        readers.spawn_blocking(move || (position, transform::load(host.as_ref(), &path)));
    }

    let mut loaded: Vec<Result<Loaded, VfsError>> = batch
        .iter()
        .map(|_| {
            Err(VfsError::Custom {
                message: String::from("reader task failed"),
            })
        })
        .collect();
    while let Some(joined) = readers.join_next().await {
        match joined {
            Ok((position, result)) => loaded[position] = result,
            Err(err) => debug!(target: "jsbundle::orchestrator", error = %err, "reader task failed"),
        }
    }
    loaded
}

/// Build `config.entry` and report every pass through `on_output`
///
/// Without watch mode this runs exactly one pass. In watch mode it keeps
/// serving debounced rebuilds and only returns if the event stream ends.
/// A configuration error is reported with an empty session.
pub async fn bundle<F>(
    config: BundleConfig,
    host: Arc<dyn VirtualFileSystem>,
    mut on_output: F,
) -> Result<(), BundleError>
where
    F: FnMut(&Session, Result<&BuildOutput, &BundleError>),
{
    let watch = config.watch;
    let mut bundler = match Bundler::new(config, host) {
        Ok(bundler) => bundler,
        Err(err) => {
            on_output(&Session::new(), Err(&err));
            return Err(err);
        }
    };

    if !watch {
        let result = bundler.build().await;
        on_output(bundler.session(), result.as_ref());
        return result.map(|_| ());
    }

    let mut watch_loop = WatchLoop::new(bundler);
    watch_loop.build(&mut on_output).await;
    watch_loop.run(&mut on_output).await;
    Ok(())
}
