//! jsbundle Core
//!
//! The bundling engine: module resolution, the module table of a build
//! session, the per-module transform pipeline, fixed-point orchestration,
//! watch-mode rebuilds, the warm-start cache and source-map stitching.
//!
//! # Usage
//! ```rust,ignore
//! use jsbundle_config::BundleConfig;
//! use jsbundle_core::Bundler;
//! use jsbundle_vfs::NativeFileSystem;
//! use std::sync::Arc;
//!
//! let mut bundler = Bundler::new(BundleConfig::with_entry("main.js"), Arc::new(NativeFileSystem::new()))?;
//! let output = bundler.build().await?;
//! println!("{}", output.code);
//! ```

pub mod cache;
pub mod emit;
pub mod error;
pub mod graph;
pub mod module_path;
pub mod orchestrator;
pub mod resolver;
pub mod runtime;
pub mod sourcemap;
pub mod syntax;
pub mod transform;
pub mod watch;

pub use cache::{CacheSnapshot, Restored, CACHE_FILE};
pub use emit::{write_output, Emitter, FileEmitter, StdoutEmitter};
pub use error::{BundleError, BundleResult, CacheError, ParseError, ResolutionError};
pub use graph::{DetectedGlobals, ModuleRecord, Session};
pub use module_path::ModulePath;
pub use orchestrator::{bundle, BuildOutput, Bundler, BATCH_SIZE};
pub use resolver::Resolver;
pub use transform::{Pass, Pipeline};
pub use watch::{Debouncer, WatchBridge, WatchLoop, WatchMessage};

pub use jsbundle_config::BundleConfig;
