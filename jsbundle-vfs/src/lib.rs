//! jsbundle Virtual File System
//!
//! The host capability consumed by every part of the bundler: file reads and
//! writes, existence checks, modification times, the working directory and an
//! optional change watcher.
//!
//! # Backends
//! - `NativeFileSystem`: `std::fs` plus a `notify` based watcher
//! - `MemoryFileSystem`: in-memory tree with a logical clock, used by tests
//!
//! # Usage
//! ```rust,ignore
//! use jsbundle_vfs::{VirtualFileSystem, MemoryFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! fs.write_file(Path::new("/src/main.js"), b"console.log(1)").unwrap();
//! assert!(fs.modified_time(Path::new("/src/main.js")) > 0);
//! ```

mod error;
mod memory;
mod native;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
pub use r#trait::{VirtualFileSystem, WatchCallback, WatchEvent, Watcher};
