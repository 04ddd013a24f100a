//! 模块解析器
//!
//! 将 import/require 说明符解析为规范模块路径。
//!
//! # 解析顺序
//! 1. `externals` 中的名字 → 外部令牌，不访问文件系统
//! 2. `aliases` 替换说明符后继续解析
//! 3. 相对于引用模块所在目录：精确路径，然后追加 `.js`
//! 4. 目录：`package.json` 的 `browser` > `jsnext:main`/`module`（仅 es2015）> `main` > `index.js`
//! 5. 向上逐级查找 `node_modules`
//! 6. 内置核心模块表（`process`/`buffer` 在浏览器目标下使用内置 shim）
//! 7. 失败，返回 [`ResolutionError`]（附带尝试过的所有路径）

use crate::error::ResolutionError;
use crate::module_path::{normalize, ModulePath};
use jsbundle_config::{BundleConfig, SourceLevel, Target};
use jsbundle_vfs::VirtualFileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// 内置核心模块
pub const CORE_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "process",
    "punycode",
    "querystring",
    "readline",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "vm",
    "zlib",
];

/// 带有内置 shim 的核心模块
pub const SHIMMED_MODULES: &[&str] = &["buffer", "process"];

pub fn is_core_module(name: &str) -> bool {
    CORE_MODULES.contains(&name)
}

/// 模块解析器
///
/// 无内部缓存：同一文件系统状态下对同一 `(from, specifier)` 的两次解析
/// 得到完全相同的结果。
#[derive(Clone)]
pub struct Resolver {
    /// 宿主文件系统
    host: Arc<dyn VirtualFileSystem>,
    /// 构建配置
    config: Arc<BundleConfig>,
    /// 工作目录（非文件模块的基准目录）
    cwd: PathBuf,
}

impl Resolver {
    pub fn new(host: Arc<dyn VirtualFileSystem>, config: Arc<BundleConfig>) -> Self {
        let cwd = host.cwd();
        Self { host, config, cwd }
    }

    /// 解析说明符
    ///
    /// # Arguments
    /// * `from` - 写有该说明符的模块
    /// * `specifier` - import/require 的原始字符串
    pub fn resolve(&self, from: &ModulePath, specifier: &str) -> Result<ModulePath, ResolutionError> {
        // 1. 外部模块
        if self.config.externals.contains_key(specifier) {
            debug!(target: "jsbundle::resolver", specifier, "external");
            return Ok(ModulePath::External(specifier.to_string()));
        }

        // 2. 别名
        let specifier = match self.config.aliases.get(specifier) {
            Some(target) => {
                trace!(target: "jsbundle::resolver", from = specifier, to = %target, "alias");
                target.as_str()
            }
            None => specifier,
        };

        let base = self.base_dir(from);
        let mut tried = Vec::new();

        // 3-4. 相对于引用模块
        if let Some(found) = self.load(&base.join(specifier), &mut tried) {
            return Ok(self.found(from, specifier, found));
        }

        // 5. node_modules
        if !is_relative(specifier) {
            for dir in base.ancestors() {
                if dir.file_name().is_some_and(|name| name == "node_modules") {
                    continue;
                }
                let candidate = dir.join("node_modules").join(specifier);
                if let Some(found) = self.load(&candidate, &mut tried) {
                    return Ok(self.found(from, specifier, found));
                }
            }
        }

        // 6. 核心模块
        let core = specifier.strip_prefix("node:").unwrap_or(specifier);
        if is_core_module(core) {
            let resolved = match self.config.target {
                Target::Browser if SHIMMED_MODULES.contains(&core) => {
                    ModulePath::Shim(core.to_string())
                }
                _ => ModulePath::External(core.to_string()),
            };
            debug!(target: "jsbundle::resolver", specifier, resolved = %resolved, "core module");
            return Ok(resolved);
        }

        // 7. 失败
        Err(ResolutionError {
            specifier: specifier.to_string(),
            from: from.display_relative(&self.cwd),
            tried,
        })
    }

    /// 解析配置中的入口：相对工作目录，按文件、再按目录探测
    pub fn resolve_entry(&self, entry: &Path) -> Result<ModulePath, ResolutionError> {
        let mut tried = Vec::new();
        match self.load(&self.cwd.join(entry), &mut tried) {
            Some(found) => {
                debug!(target: "jsbundle::resolver", entry = %entry.display(), resolved = %found.display(), "entry");
                Ok(ModulePath::file(found))
            }
            None => Err(ResolutionError {
                specifier: entry.display().to_string(),
                from: String::from("configuration"),
                tried,
            }),
        }
    }

    fn found(&self, from: &ModulePath, specifier: &str, path: PathBuf) -> ModulePath {
        let resolved = ModulePath::file(path);
        debug!(
            target: "jsbundle::resolver",
            from = %from.display_relative(&self.cwd),
            specifier,
            resolved = %resolved.display_relative(&self.cwd),
        );
        resolved
    }

    /// 基准目录：文件模块取其父目录，其他取工作目录
    fn base_dir(&self, from: &ModulePath) -> PathBuf {
        match from {
            ModulePath::File(path) => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.cwd.clone()),
            _ => self.cwd.clone(),
        }
    }

    /// 作为文件，再作为目录
    fn load(&self, candidate: &Path, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        let candidate = normalize(candidate);
        self.load_file(&candidate, tried)
            .or_else(|| self.load_directory(&candidate, tried))
    }

    /// 精确路径，然后追加 `.js`
    fn load_file(&self, candidate: &Path, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        tried.push(candidate.to_path_buf());
        if self.host.is_file(candidate) {
            return Some(candidate.to_path_buf());
        }
        let mut with_ext = candidate.as_os_str().to_owned();
        with_ext.push(".js");
        let with_ext = PathBuf::from(with_ext);
        tried.push(with_ext.clone());
        if self.host.is_file(&with_ext) {
            return Some(with_ext);
        }
        None
    }

    fn load_directory(&self, dir: &Path, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        if !self.host.is_dir(dir) {
            return None;
        }
        if let Some(main) = self.manifest_entry(dir) {
            let target = normalize(&dir.join(main));
            if let Some(found) = self.load_file(&target, tried) {
                return Some(found);
            }
            let index = target.join("index.js");
            tried.push(index.clone());
            if self.host.is_file(&index) {
                return Some(index);
            }
        }
        let index = dir.join("index.js");
        tried.push(index.clone());
        self.host.is_file(&index).then_some(index)
    }

    /// 从 `package.json` 中选择入口字段
    fn manifest_entry(&self, dir: &Path) -> Option<String> {
        let manifest = dir.join("package.json");
        if !self.host.is_file(&manifest) {
            return None;
        }
        let text = self.host.read_to_string(&manifest).ok()?;
        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                debug!(target: "jsbundle::resolver", manifest = %manifest.display(), error = %err, "ignoring unreadable manifest");
                return None;
            }
        };
        let field = |name: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(browser) = field("browser") {
            return Some(browser);
        }
        if self.config.source_level != SourceLevel::Es5 {
            if let Some(next) = field("jsnext:main").or_else(|| field("module")) {
                return Some(next);
            }
        }
        field("main")
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbundle_config::External;
    use jsbundle_vfs::MemoryFileSystem;

    fn fs(files: &[(&str, &str)]) -> Arc<MemoryFileSystem> {
        Arc::new(MemoryFileSystem::with_files(
            files
                .iter()
                .map(|(path, text)| (path.to_string(), text.as_bytes().to_vec())),
        ))
    }

    fn resolver(host: Arc<MemoryFileSystem>, config: BundleConfig) -> Resolver {
        Resolver::new(host, Arc::new(config))
    }

    fn main_js() -> ModulePath {
        ModulePath::file("/src/main.js")
    }

    #[test]
    fn test_relative_exact_and_extension() {
        let r = resolver(
            fs(&[("/src/main.js", ""), ("/src/a.js", ""), ("/src/b.txt", "")]),
            BundleConfig::default(),
        );
        assert_eq!(r.resolve(&main_js(), "./a").unwrap(), ModulePath::file("/src/a.js"));
        assert_eq!(r.resolve(&main_js(), "./a.js").unwrap(), ModulePath::file("/src/a.js"));
        assert_eq!(r.resolve(&main_js(), "./b.txt").unwrap(), ModulePath::file("/src/b.txt"));
        assert_eq!(r.resolve(&main_js(), "../src/a").unwrap(), ModulePath::file("/src/a.js"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let r = resolver(
            fs(&[("/src/main.js", ""), ("/node_modules/dep/index.js", "")]),
            BundleConfig::default(),
        );
        let first = r.resolve(&main_js(), "dep").unwrap();
        let second = r.resolve(&main_js(), "dep").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ModulePath::file("/node_modules/dep/index.js"));
    }

    #[test]
    fn test_externals_win_without_lookup() {
        let mut config = BundleConfig::default();
        config.externals.insert("jquery".into(), External::Global("jQuery".into()));
        let r = resolver(fs(&[("/src/jquery.js", "")]), config);
        assert_eq!(
            r.resolve(&main_js(), "jquery").unwrap(),
            ModulePath::External("jquery".into())
        );
    }

    #[test]
    fn test_alias_substitution() {
        let mut config = BundleConfig::default();
        config.aliases.insert("utils".into(), "./lib/utils".into());
        let r = resolver(fs(&[("/src/main.js", ""), ("/src/lib/utils.js", "")]), config);
        assert_eq!(
            r.resolve(&main_js(), "utils").unwrap(),
            ModulePath::file("/src/lib/utils.js")
        );
    }

    #[test]
    fn test_manifest_field_priority() {
        let files = [
            ("/src/main.js", ""),
            (
                "/node_modules/pkg/package.json",
                r#"{"main":"main.js","jsnext:main":"next.js","browser":"browser.js"}"#,
            ),
            ("/node_modules/pkg/main.js", ""),
            ("/node_modules/pkg/next.js", ""),
            ("/node_modules/pkg/browser.js", ""),
            ("/node_modules/other/package.json", r#"{"main":"lib/main","jsnext:main":"es/index.js"}"#),
            ("/node_modules/other/lib/main.js", ""),
            ("/node_modules/other/es/index.js", ""),
        ];
        let es5 = resolver(fs(&files), BundleConfig::default());
        assert_eq!(
            es5.resolve(&main_js(), "pkg").unwrap(),
            ModulePath::file("/node_modules/pkg/browser.js")
        );
        assert_eq!(
            es5.resolve(&main_js(), "other").unwrap(),
            ModulePath::file("/node_modules/other/lib/main.js")
        );

        let mut config = BundleConfig::default();
        config.source_level = SourceLevel::Es2015;
        let es2015 = resolver(fs(&files), config);
        assert_eq!(
            es2015.resolve(&main_js(), "other").unwrap(),
            ModulePath::file("/node_modules/other/es/index.js")
        );
    }

    #[test]
    fn test_directory_index_fallback() {
        let r = resolver(
            fs(&[("/src/main.js", ""), ("/src/widgets/index.js", "")]),
            BundleConfig::default(),
        );
        assert_eq!(
            r.resolve(&main_js(), "./widgets").unwrap(),
            ModulePath::file("/src/widgets/index.js")
        );
    }

    #[test]
    fn test_node_modules_walk_upward() {
        let r = resolver(
            fs(&[("/app/src/deep/x.js", ""), ("/app/node_modules/lib/index.js", "")]),
            BundleConfig::default(),
        );
        let from = ModulePath::file("/app/src/deep/x.js");
        assert_eq!(
            r.resolve(&from, "lib").unwrap(),
            ModulePath::file("/app/node_modules/lib/index.js")
        );
    }

    #[test]
    fn test_core_modules() {
        let r = resolver(fs(&[("/src/main.js", "")]), BundleConfig::default());
        assert_eq!(r.resolve(&main_js(), "fs").unwrap(), ModulePath::External("fs".into()));
        assert_eq!(r.resolve(&main_js(), "node:path").unwrap(), ModulePath::External("path".into()));
        assert_eq!(r.resolve(&main_js(), "process").unwrap(), ModulePath::Shim("process".into()));
        assert_eq!(r.resolve(&main_js(), "buffer").unwrap(), ModulePath::Shim("buffer".into()));

        let mut config = BundleConfig::default();
        config.target = Target::Node;
        let node = resolver(fs(&[("/src/main.js", "")]), config);
        assert_eq!(node.resolve(&main_js(), "buffer").unwrap(), ModulePath::External("buffer".into()));
    }

    #[test]
    fn test_installed_package_beats_core_shim() {
        let r = resolver(
            fs(&[("/src/main.js", ""), ("/node_modules/buffer/index.js", "")]),
            BundleConfig::default(),
        );
        assert_eq!(
            r.resolve(&main_js(), "buffer").unwrap(),
            ModulePath::file("/node_modules/buffer/index.js")
        );
    }

    #[test]
    fn test_unresolvable_reports_candidates() {
        let r = resolver(fs(&[("/src/main.js", "")]), BundleConfig::default());
        let err = r.resolve(&main_js(), "./nope").unwrap_err();
        assert_eq!(err.specifier, "./nope");
        assert_eq!(err.from, "src/main.js");
        assert_eq!(err.tried, vec![PathBuf::from("/src/nope"), PathBuf::from("/src/nope.js")]);
    }

    #[test]
    fn test_entry_tries_extension_and_directory() {
        let host = fs(&[("/src/main.js", ""), ("/lib/index.js", "")]);
        let r = resolver(host, BundleConfig::default());
        assert_eq!(r.resolve_entry(Path::new("src/main")).unwrap(), ModulePath::file("/src/main.js"));
        assert_eq!(r.resolve_entry(Path::new("lib")).unwrap(), ModulePath::file("/lib/index.js"));
        assert_eq!(r.resolve_entry(Path::new("./src/main.js")).unwrap(), main_js());

        let err = r.resolve_entry(Path::new("nope")).unwrap_err();
        assert_eq!(err.from, "configuration");
        assert_eq!(err.tried, vec![PathBuf::from("/nope"), PathBuf::from("/nope.js")]);
    }

    #[test]
    fn test_shim_modules_resolve_from_cwd() {
        let r = resolver(fs(&[("/node_modules/x/index.js", "")]), BundleConfig::default());
        assert_eq!(
            r.resolve(&ModulePath::Shim("process".into()), "x").unwrap(),
            ModulePath::file("/node_modules/x/index.js")
        );
    }
}
