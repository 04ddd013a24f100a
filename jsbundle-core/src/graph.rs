//! Build session state: the module table and the pending-work queue
//!
//! Modules live in an arena addressed by their index. Indices are handed
//! out densely from 0 in discovery order and never change or get reused for
//! the life of a session; a vanished module keeps its slot and is marked
//! `removed` instead. Cycles between modules exist only as integers inside
//! generated `runtimeRequire(index)` calls.

use crate::module_path::ModulePath;
use crate::syntax::ast::Function;
use crate::syntax::ModuleComments;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Environment globals referenced by any processed module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedGlobals {
    pub global: bool,
    pub process: bool,
    pub buffer: bool,
}

impl DetectedGlobals {
    /// Record a free reference to `name`; other names are ignored
    pub fn mark(&mut self, name: &str) {
        match name {
            "global" => self.global = true,
            "process" => self.process = true,
            "Buffer" => self.buffer = true,
            _ => {}
        }
    }

    pub fn any(&self) -> bool {
        self.global || self.process || self.buffer
    }
}

/// One module of the session
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub index: usize,
    pub path: ModulePath,
    /// Factory function; `None` while the module is pending
    pub ast: Option<Function>,
    /// Comments of the parsed source, printed with the factory
    pub comments: ModuleComments,
    /// Byte offset the source was parsed at, `0` if it never was
    pub span_base: u32,
    /// Set when the backing file vanished during watch mode
    pub removed: bool,
    /// Host modification time when the module was last read, `-1` if never
    pub modified_time: i64,
    /// Companion source map (JSON) shipped alongside the module source
    pub source_map: Option<String>,
    /// Authored text, kept for `sourcesContent`
    pub source: Option<String>,
}

impl ModuleRecord {
    fn pending(index: usize, path: ModulePath) -> Self {
        Self {
            index,
            path,
            ast: None,
            comments: ModuleComments::default(),
            span_base: 0,
            removed: false,
            modified_time: -1,
            source_map: None,
            source: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.ast.is_none()
    }
}

/// State of one build session
#[derive(Debug)]
pub struct Session {
    records: Vec<ModuleRecord>,
    index_by_path: HashMap<ModulePath, usize>,
    queue: VecDeque<ModulePath>,
    queued: HashSet<ModulePath>,
    /// Paths drained by the current batch and not yet transformed
    in_flight: Vec<ModulePath>,
    pub detected_globals: DetectedGlobals,
    watcher_installed: bool,
    /// First byte offset not yet handed to a parse
    next_span_base: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index_by_path: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: Vec::new(),
            detected_globals: DetectedGlobals::default(),
            watcher_installed: false,
            next_span_base: 1,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from restored records. Records must be sorted by
    /// index and dense.
    pub(crate) fn from_records(
        records: Vec<ModuleRecord>,
        detected_globals: DetectedGlobals,
        next_span_base: u32,
    ) -> Self {
        let index_by_path = records
            .iter()
            .map(|record| (record.path.clone(), record.index))
            .collect();
        Self {
            records,
            index_by_path,
            detected_globals,
            next_span_base: next_span_base.max(1),
            ..Self::default()
        }
    }

    /// Hand out a byte range of `len` for one parse. Ranges never overlap,
    /// so a printed position names exactly one module.
    pub(crate) fn reserve_span(&mut self, len: usize) -> u32 {
        let base = self.next_span_base;
        self.next_span_base = base.saturating_add(len as u32).saturating_add(1);
        base
    }

    pub(crate) fn next_span_base(&self) -> u32 {
        self.next_span_base
    }

    /// Index of `path`, allocating the next one (and a pending record) on
    /// first use
    pub fn index_of(&mut self, path: &ModulePath) -> usize {
        if let Some(&index) = self.index_by_path.get(path) {
            return index;
        }
        let index = self.records.len();
        trace!(target: "jsbundle::graph", index, path = %path, "new module");
        self.records.push(ModuleRecord::pending(index, path.clone()));
        self.index_by_path.insert(path.clone(), index);
        index
    }

    /// Existing index of `path`, without allocating
    pub fn lookup(&self, path: &ModulePath) -> Option<usize> {
        self.index_by_path.get(path).copied()
    }

    /// Append `path` to the queue unless it is already waiting. Returns
    /// whether it was added.
    pub fn enqueue(&mut self, path: &ModulePath) -> bool {
        if !self.queued.insert(path.clone()) {
            return false;
        }
        self.queue.push_back(path.clone());
        true
    }

    /// Clear the module's AST and set its `removed` flag. The index is kept.
    /// Returns `false` for paths the session has never seen.
    pub fn invalidate(&mut self, path: &ModulePath, removed: bool) -> bool {
        let Some(index) = self.lookup(path) else {
            return false;
        };
        let record = &mut self.records[index];
        record.ast = None;
        record.removed = removed;
        trace!(target: "jsbundle::graph", index, removed, "invalidated");
        true
    }

    /// Take up to `n` paths from the front of the queue
    pub fn drain_batch(&mut self, n: usize) -> Vec<ModulePath> {
        let take = n.min(self.queue.len());
        let batch: Vec<ModulePath> = self.queue.drain(..take).collect();
        for path in &batch {
            self.queued.remove(path);
        }
        self.in_flight.extend(batch.iter().cloned());
        batch
    }

    /// Index for a dependency found while transforming. The dependency is
    /// queued when it still needs processing and is not already waiting or
    /// being processed.
    pub fn discover(&mut self, path: &ModulePath) -> usize {
        let index = self.index_of(path);
        if self.records[index].is_pending() && !self.in_flight.contains(path) {
            self.enqueue(path);
        }
        index
    }

    /// Store the transformed factory of an in-flight module
    pub(crate) fn set_ast(&mut self, index: usize, ast: Function) {
        let record = &mut self.records[index];
        record.ast = Some(ast);
        let path = record.path.clone();
        self.in_flight.retain(|p| *p != path);
    }

    /// Put paths of an aborted batch back at the front of the queue so the
    /// next build retries them
    pub(crate) fn restore_in_flight(&mut self) {
        let paths = std::mem::take(&mut self.in_flight);
        for path in paths.into_iter().rev() {
            if self.queued.insert(path.clone()) {
                self.queue.push_front(path);
            }
        }
    }

    pub fn record(&self, index: usize) -> Option<&ModuleRecord> {
        self.records.get(index)
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut ModuleRecord> {
        self.records.get_mut(index)
    }

    pub fn record_by_path(&self, path: &ModulePath) -> Option<&ModuleRecord> {
        self.lookup(path).and_then(|index| self.records.get(index))
    }

    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Paths waiting in the queue, front first
    pub fn queued_paths(&self) -> impl Iterator<Item = &ModulePath> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn watcher_installed(&self) -> bool {
        self.watcher_installed
    }

    pub(crate) fn mark_watcher_installed(&mut self) {
        self.watcher_installed = true;
    }
}
