//! Error types for the bundling engine
//!
//! Every fatal failure of a build pass is a [`BundleError`]. Modules whose
//! file disappears after resolution are not errors here; they become
//! factories that throw when the bundle runs.

use jsbundle_config::ConfigError;
use jsbundle_vfs::VfsError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type of a build pass
#[derive(Error, Debug, Clone)]
pub enum BundleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] VfsError),

    #[error("source map error: {0}")]
    SourceMap(String),

    #[error("emit error: {0}")]
    Emit(String),
}

impl BundleError {
    /// Location of a parse failure, for printing source context
    pub fn parse_location(&self) -> Option<(&PathBuf, usize, usize)> {
        match self {
            BundleError::Parse(err) => Some((&err.path, err.line, err.column)),
            _ => None,
        }
    }
}

/// A specifier that names no file and no known external or core module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve '{specifier}' from '{from}'{}", candidates(.tried))]
pub struct ResolutionError {
    pub specifier: String,
    /// Module the specifier was written in
    pub from: String,
    /// Every candidate path tried, in order
    pub tried: Vec<PathBuf>,
}

fn candidates(tried: &[PathBuf]) -> String {
    if tried.is_empty() {
        return String::new();
    }
    let mut text = String::from(". Tried:");
    for path in tried {
        text.push_str("\n  - ");
        text.push_str(&path.display().to_string());
    }
    text
}

/// Malformed module source (JavaScript or JSON), 1-based location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{line}:{column}: {message}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("malformed cache file '{path}': {message}")]
    Malformed { path: String, message: String },

    #[error("inconsistent cache snapshot: {message}")]
    Inconsistent { message: String },
}

pub type BundleResult<T> = Result<T, BundleError>;
