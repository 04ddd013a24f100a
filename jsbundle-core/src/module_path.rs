//! Canonical module identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Canonical path of a module within a build session
///
/// Two specifiers that lead to the same file always produce equal values,
/// so this is the key of the module table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ModulePath {
    /// A file on the host, lexically normalized and absolute
    File(PathBuf),
    /// An opaque external or core-module token such as `fs`
    External(String),
    /// A built-in shim embedded in the bundler (`process`, `buffer`)
    Shim(String),
}

impl ModulePath {
    pub fn file(path: impl AsRef<Path>) -> Self {
        ModulePath::File(normalize(path.as_ref()))
    }

    pub fn as_file(&self) -> Option<&Path> {
        match self {
            ModulePath::File(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.as_file()
            .and_then(|p| p.extension())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }

    /// Human readable form, files relative to `cwd` when below it
    pub fn display_relative(&self, cwd: &Path) -> String {
        match self {
            ModulePath::File(path) => relative_to(path, cwd),
            ModulePath::External(name) => name.clone(),
            ModulePath::Shim(name) => format!("jsbundle:shim/{}", name),
        }
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModulePath::File(path) => write!(f, "{}", path.display()),
            ModulePath::External(name) => write!(f, "{}", name),
            ModulePath::Shim(name) => write!(f, "jsbundle:shim/{}", name),
        }
    }
}

/// Remove `.` and resolve `..` components without touching the host
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` relative to `base` with forward slashes; `path` itself when it is
/// not below `base`
pub fn relative_to(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let text = rel.to_string_lossy().replace('\\', "/");
    if text.is_empty() {
        ".".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c.js")), PathBuf::from("/a/c.js"));
        assert_eq!(normalize(Path::new("/a/b/../../c")), PathBuf::from("/c"));
    }

    #[test]
    fn test_same_file_same_key() {
        assert_eq!(
            ModulePath::file("/p/src/../lib/x.js"),
            ModulePath::file("/p/lib/./x.js")
        );
    }

    #[test]
    fn test_display_relative() {
        let cwd = Path::new("/p");
        assert_eq!(ModulePath::file("/p/src/a.js").display_relative(cwd), "src/a.js");
        assert_eq!(ModulePath::file("/elsewhere/a.js").display_relative(cwd), "/elsewhere/a.js");
        assert_eq!(ModulePath::External("fs".into()).display_relative(cwd), "fs");
        assert_eq!(
            ModulePath::Shim("process".into()).display_relative(cwd),
            "jsbundle:shim/process"
        );
    }

    #[test]
    fn test_is_json() {
        assert!(ModulePath::file("/p/data.JSON").is_json());
        assert!(!ModulePath::file("/p/data.js").is_json());
        assert!(!ModulePath::External("x.json".into()).is_json());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&ModulePath::External("fs".into())).unwrap();
        assert_eq!(json, r#"{"kind":"external","value":"fs"}"#);
        let back: ModulePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModulePath::External("fs".into()));
    }
}
