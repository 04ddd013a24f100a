//! Warm-start cache
//!
//! A snapshot of the module table plus every module's generated factory,
//! written to `.jsbundle-cache.json` in the working directory. Loading
//! compares each stored modification time with the host's current one and
//! re-queues only the modules that changed.

use crate::error::{BundleError, CacheError};
use crate::graph::{DetectedGlobals, ModuleRecord, Session};
use crate::module_path::ModulePath;
use crate::syntax::ast::Function;
use crate::syntax::ModuleComments;
use jsbundle_vfs::{VfsError, VirtualFileSystem};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const CACHE_FILE: &str = ".jsbundle-cache.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Factory of each module, by index
    pub runtime: Vec<Option<Function>>,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub detected_globals: DetectedGlobals,
    pub next_index: usize,
    /// First byte offset free for the next parse
    #[serde(default)]
    pub next_span_base: u32,
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEntry {
    pub index: usize,
    #[serde(rename = "canonicalPath")]
    pub path: ModulePath,
    pub removed: bool,
    #[serde(rename = "lastKnownModifiedTime")]
    pub modified_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
    #[serde(default)]
    pub span_base: u32,
    #[serde(default, skip_serializing_if = "ModuleComments::is_empty")]
    pub comments: ModuleComments,
}

/// A session rebuilt from a snapshot
#[derive(Debug)]
pub struct Restored {
    pub session: Session,
    /// Modules whose files changed since the snapshot, in index order
    pub requeued: Vec<ModulePath>,
}

pub fn save(session: &Session) -> CacheSnapshot {
    let records = session.records();
    CacheSnapshot {
        runtime: records.iter().map(|record| record.ast.clone()).collect(),
        session: SessionSnapshot {
            detected_globals: session.detected_globals,
            next_index: records.len(),
            next_span_base: session.next_span_base(),
            modules: records
                .iter()
                .map(|record| ModuleEntry {
                    index: record.index,
                    path: record.path.clone(),
                    removed: record.removed,
                    modified_time: record.modified_time,
                    source_map: record.source_map.clone(),
                    span_base: record.span_base,
                    comments: record.comments.clone(),
                })
                .collect(),
        },
    }
}

/// Rebuild a session and queue every module that is out of date
pub fn load(
    snapshot: CacheSnapshot,
    host: &dyn VirtualFileSystem,
    entry: &ModulePath,
) -> Result<Restored, CacheError> {
    let CacheSnapshot { runtime, session } = snapshot;
    check_consistency(&runtime, &session, entry)?;

    let records: Vec<ModuleRecord> = session
        .modules
        .into_iter()
        .zip(runtime)
        .map(|(entry, ast)| ModuleRecord {
            index: entry.index,
            path: entry.path,
            ast,
            comments: entry.comments,
            span_base: entry.span_base,
            removed: entry.removed,
            modified_time: entry.modified_time,
            source_map: entry.source_map,
            source: None,
        })
        .collect();

    let mut stale = Vec::new();
    for record in &records {
        let current = match &record.path {
            ModulePath::File(file) => host.modified_time(file),
            _ => record.modified_time,
        };
        if record.ast.is_none() || current != record.modified_time {
            debug!(
                target: "jsbundle::cache",
                index = record.index,
                stored = record.modified_time,
                current,
                "stale"
            );
            stale.push((record.path.clone(), current < 0 && record.path.as_file().is_some()));
        }
    }

    let mut restored = Session::from_records(records, session.detected_globals, session.next_span_base);
    let mut requeued = Vec::with_capacity(stale.len());
    for (path, missing) in stale {
        restored.invalidate(&path, missing);
        restored.enqueue(&path);
        requeued.push(path);
    }
    Ok(Restored {
        session: restored,
        requeued,
    })
}

fn check_consistency(
    runtime: &[Option<Function>],
    session: &SessionSnapshot,
    entry: &ModulePath,
) -> Result<(), CacheError> {
    let inconsistent = |message: String| Err(CacheError::Inconsistent { message });
    if session.next_index != session.modules.len() {
        return inconsistent(format!(
            "nextIndex is {} but {} modules are stored",
            session.next_index,
            session.modules.len()
        ));
    }
    if runtime.len() != session.modules.len() {
        return inconsistent(format!(
            "{} factories for {} modules",
            runtime.len(),
            session.modules.len()
        ));
    }
    if let Some(entry) = session.modules.iter().enumerate().find(|(i, e)| e.index != *i) {
        return inconsistent(format!("module at position {} has index {}", entry.0, entry.1.index));
    }
    match session.modules.first() {
        Some(first) if first.path == *entry => Ok(()),
        Some(first) => inconsistent(format!("snapshot was built for '{}', not '{}'", first.path, entry)),
        None => inconsistent(String::from("no modules")),
    }
}

/// Read the snapshot in `cwd`
///
/// An absent file is no cache. A file that does not parse is ignored unless
/// `strict` is set, in which case it is an error.
pub fn read(
    host: &dyn VirtualFileSystem,
    cwd: &Path,
    strict: bool,
) -> Result<Option<CacheSnapshot>, CacheError> {
    let path = cwd.join(CACHE_FILE);
    let text = match host.read_to_string(&path) {
        Ok(text) => text,
        Err(VfsError::NotFound { .. }) => return Ok(None),
        Err(err) => return malformed(&path, err.to_string(), strict),
    };
    match serde_json::from_str(&text) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(err) => malformed(&path, err.to_string(), strict),
    }
}

fn malformed(path: &Path, message: String, strict: bool) -> Result<Option<CacheSnapshot>, CacheError> {
    let err = CacheError::Malformed {
        path: path.display().to_string(),
        message,
    };
    if strict {
        return Err(err);
    }
    warn!(target: "jsbundle::cache", error = %err, "ignoring cache file");
    Ok(None)
}

pub fn write(host: &dyn VirtualFileSystem, cwd: &Path, snapshot: &CacheSnapshot) -> Result<(), BundleError> {
    let path = cwd.join(CACHE_FILE);
    let bytes = serde_json::to_vec(snapshot).map_err(|err| CacheError::Malformed {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    host.write_file(&path, &bytes)?;
    debug!(target: "jsbundle::cache", path = %path.display(), bytes = bytes.len(), "written");
    Ok(())
}
