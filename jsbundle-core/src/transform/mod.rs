//! Per-module transform pipeline
//!
//! A module is either synthesized outright (externals, removed or vanished
//! files, JSON) or parsed and run through a fixed, ordered list of passes.
//! The passes do not commute: imports must be rewritten before the
//! environment wrap moves the body into a nested function, and global
//! detection must see the final body. The result is wrapped into the
//! module's factory `function _<index>(module, exports) { ... }`.

mod commonjs;
mod env_locals;
mod esm_export;
mod esm_import;
mod fixup;
mod globals;
mod synthetic;

pub use commonjs::CommonJsRewrite;
pub use env_locals::EnvLocalWrap;
pub use esm_export::ExportRewrite;
pub use esm_import::ImportRewrite;
pub use fixup::ReturnCommentFixup;
pub use globals::GlobalDetection;

use crate::error::{BundleError, ParseError};
use crate::graph::Session;
use crate::module_path::ModulePath;
use crate::resolver::Resolver;
use crate::runtime;
use crate::sourcemap;
use crate::syntax::ast::{Expr, Function, Id, ModuleItem, Stmt};
use crate::syntax::{build, into_stmts, parse_module, parse_template, ModuleComments, SyntaxError};
use jsbundle_config::BundleConfig;
use jsbundle_vfs::{VfsError, VirtualFileSystem};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use swc_core::common::SyntaxContext;
use tracing::debug;

/// Name of the loader function every rewritten `require` calls
pub const RUNTIME_REQUIRE: &str = "runtimeRequire";

/// One rewrite stage over a parsed module body
pub trait Pass {
    /// Get the pass name
    fn name(&self) -> &'static str;

    /// Rewrite `body` in place
    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError>;
}

/// Everything a pass may read or touch while rewriting one module
pub struct PassContext<'a> {
    pub path: &'a ModulePath,
    pub index: usize,
    pub session: &'a mut Session,
    pub resolver: &'a Resolver,
    pub config: &'a BundleConfig,
    pub cwd: &'a Path,
    /// Context of references that bind to nothing in this module
    pub unresolved: SyntaxContext,
    pub comments: ModuleComments,
    /// Projection each imported binding was rewritten to
    pub imports: HashMap<Id, Expr>,
}

impl PassContext<'_> {
    /// Resolve a dependency of the current module and return its index,
    /// queueing it when it still needs processing
    pub fn require(&mut self, specifier: &str) -> Result<usize, BundleError> {
        let target = self.resolver.resolve(self.path, specifier)?;
        Ok(self.session.discover(&target))
    }
}

/// Source of a module as read from the host before transforming
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Externals carry no source
    Synthetic,
    /// The file vanished between resolution and reading
    Missing,
    Text { text: String, modified_time: i64 },
}

/// Read a module's source. Only I/O failures other than absence are errors.
pub fn load(host: &dyn VirtualFileSystem, path: &ModulePath) -> Result<Loaded, VfsError> {
    match path {
        ModulePath::External(_) => Ok(Loaded::Synthetic),
        ModulePath::Shim(name) => Ok(match runtime::shim_source(name) {
            Some(text) => Loaded::Text {
                text: text.to_string(),
                modified_time: -1,
            },
            None => Loaded::Missing,
        }),
        ModulePath::File(file) => {
            let modified_time = host.modified_time(file);
            if modified_time < 0 || !host.is_file(file) {
                return Ok(Loaded::Missing);
            }
            match host.read_to_string(file) {
                Ok(text) => Ok(Loaded::Text {
                    text,
                    modified_time,
                }),
                Err(VfsError::NotFound { .. }) => Ok(Loaded::Missing),
                Err(err) => Err(err),
            }
        }
    }
}

/// The ordered pass list applied to every parsed module
pub struct Pipeline {
    passes: Vec<Box<dyn Pass + Send + Sync>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            passes: vec![
                Box::new(CommonJsRewrite),
                Box::new(ImportRewrite),
                Box::new(ExportRewrite),
                Box::new(EnvLocalWrap),
                Box::new(ReturnCommentFixup),
                Box::new(GlobalDetection),
            ],
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Transform the module at `index` and store its factory in the session
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &self,
        index: usize,
        loaded: Loaded,
        session: &mut Session,
        resolver: &Resolver,
        config: &BundleConfig,
        host: &dyn VirtualFileSystem,
        cwd: &Path,
    ) -> Result<(), BundleError> {
        let (path, removed) = match session.record(index) {
            Some(record) => (record.path.clone(), record.removed),
            None => return Ok(()),
        };
        let shown = path.display_relative(cwd);

        let (body, comments) = if let ModulePath::External(name) = &path {
            (synthetic::external(name, config), ModuleComments::default())
        } else if removed {
            debug!(target: "jsbundle::transform", module = %shown, "removed");
            if let Some(record) = session.record_mut(index) {
                record.modified_time = -1;
            }
            (
                synthetic::throwing(&format!("Module '{}' was removed", shown)),
                ModuleComments::default(),
            )
        } else {
            match loaded {
                Loaded::Synthetic | Loaded::Missing => {
                    debug!(target: "jsbundle::transform", module = %shown, "missing at read time");
                    if let Some(record) = session.record_mut(index) {
                        record.modified_time = -1;
                    }
                    (
                        synthetic::throwing(&format!("Module '{}' not found", shown)),
                        ModuleComments::default(),
                    )
                }
                Loaded::Text {
                    text,
                    modified_time,
                } => {
                    let (body, comments) = if path.is_json() {
                        (synthetic::json(&text, &path)?, ModuleComments::default())
                    } else {
                        self.run_passes(index, &path, &text, session, resolver, config, cwd)?
                    };
                    let companion = match &path {
                        ModulePath::File(file) => sourcemap::load_companion(host, file, &text),
                        _ => None,
                    };
                    if let Some(record) = session.record_mut(index) {
                        record.modified_time = modified_time;
                        record.source_map = companion;
                        record.source = Some(text);
                    }
                    (body, comments)
                }
            }
        };

        debug!(target: "jsbundle::transform", index, module = %shown, "processed");
        if let Some(record) = session.record_mut(index) {
            record.comments = comments;
        }
        session.set_ast(index, wrap_factory(body));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_passes(
        &self,
        index: usize,
        path: &ModulePath,
        text: &str,
        session: &mut Session,
        resolver: &Resolver,
        config: &BundleConfig,
        cwd: &Path,
    ) -> Result<(Vec<Stmt>, ModuleComments), BundleError> {
        let base = session.reserve_span(text.len());
        let parsed = parse_module(text, base).map_err(|err| parse_error(path, err))?;
        if let Some(record) = session.record_mut(index) {
            record.span_base = base;
        }
        let mut body = parsed.body;
        let mut comments = parsed.comments;
        comments.drop_source_mapping_urls();
        let mut cx = PassContext {
            path,
            index,
            session,
            resolver,
            config,
            cwd,
            unresolved: parsed.unresolved,
            comments,
            imports: HashMap::new(),
        };
        for pass in &self.passes {
            pass.run(&mut body, &mut cx)?;
        }
        Ok((into_stmts(body), cx.comments))
    }
}

/// `function (module, exports) { <body> }`; the runtime names it `_<index>`
pub fn wrap_factory(body: Vec<Stmt>) -> Function {
    build::function(&["module", "exports"], body)
}

fn parse_error(path: &ModulePath, err: SyntaxError) -> BundleError {
    BundleError::Parse(ParseError {
        path: module_file(path),
        line: err.line,
        column: err.column,
        message: err.message,
    })
}

fn module_file(path: &ModulePath) -> PathBuf {
    match path {
        ModulePath::File(file) => file.clone(),
        other => PathBuf::from(other.to_string()),
    }
}

/// Parse a statement template built by a pass
pub(crate) fn template(text: &str) -> Result<Vec<Stmt>, BundleError> {
    parse_template(text).map_err(|err| {
        BundleError::Parse(ParseError {
            path: PathBuf::from("jsbundle:template"),
            line: err.line,
            column: err.column,
            message: err.message,
        })
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::syntax::print_stmts;
    use jsbundle_vfs::MemoryFileSystem;
    use std::sync::Arc;

    /// Run the full pipeline over `/p/main.js` of a project; returns the
    /// printed factory body and the session
    pub fn transform(files: &[(&str, &str)]) -> Result<(String, Session), BundleError> {
        transform_with(files, BundleConfig::default())
    }

    pub fn transform_with(
        files: &[(&str, &str)],
        config: BundleConfig,
    ) -> Result<(String, Session), BundleError> {
        let host = Arc::new(
            MemoryFileSystem::with_files(
                files
                    .iter()
                    .map(|(path, text)| (path.to_string(), text.as_bytes().to_vec())),
            )
            .with_cwd("/p"),
        );
        let resolver = Resolver::new(host.clone(), Arc::new(config.clone()));
        let mut session = Session::new();
        let entry = ModulePath::file("/p/main.js");
        session.enqueue(&entry);
        session.index_of(&entry);
        session.drain_batch(1);
        let loaded = load(host.as_ref(), &entry)?;
        Pipeline::new().process(
            0,
            loaded,
            &mut session,
            &resolver,
            &config,
            host.as_ref(),
            Path::new("/p"),
        )?;
        let record = session.record(0).expect("record");
        let factory = record.ast.clone().expect("factory");
        let stmts = factory.body.map(|body| body.stmts).unwrap_or_default();
        let code = print_stmts(&stmts, &record.comments).expect("print");
        Ok((code, session))
    }

    /// Collapse runs of whitespace so printed code compares on one line
    pub fn squash(code: &str) -> String {
        code.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
