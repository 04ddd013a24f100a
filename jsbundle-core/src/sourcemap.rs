//! Source-map stitching
//!
//! The printer reports byte positions; every module was parsed at its own
//! disjoint offset range, so a position names one module and a location in
//! its source. A module that
//! ships its own map (a trailing `sourceMappingURL` comment) was itself
//! generated, so its positions are looked up once more in that map to reach
//! the authored file. All `sources` end up relative to the working
//! directory.

use crate::error::BundleError;
use crate::graph::{ModuleRecord, Session};
use crate::module_path::{normalize, relative_to};
use crate::syntax::{LineIndex, RawMapping};
use jsbundle_vfs::VirtualFileSystem;
use sourcemap::{DecodedMap, SourceMap, SourceMapBuilder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A bundle position mapped to a module position, all 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    /// Index of the module
    pub module: usize,
    pub line: u32,
    pub column: u32,
}

/// Turn printed byte positions into module line/columns. Positions of
/// modules whose source text is not at hand are dropped.
pub fn locate(raw: &[RawMapping], session: &Session) -> Vec<Mapping> {
    let mut bases: Vec<(u32, usize)> = session
        .records()
        .iter()
        .filter(|record| record.span_base > 0 && record.ast.is_some())
        .map(|record| (record.span_base, record.index))
        .collect();
    bases.sort_unstable();

    let mut indexes: HashMap<usize, Option<LineIndex<'_>>> = HashMap::new();
    let mut mappings: Vec<Mapping> = raw
        .iter()
        .filter_map(|raw| {
            let at = bases.partition_point(|(base, _)| *base <= raw.pos).checked_sub(1)?;
            let (base, module) = bases[at];
            let lines = indexes
                .entry(module)
                .or_insert_with(|| {
                    session
                        .record(module)
                        .and_then(|record| record.source.as_deref())
                        .map(LineIndex::new)
                })
                .as_ref()?;
            let (line, column) = lines.locate((raw.pos - base) as usize);
            Some(Mapping {
                generated_line: raw.generated_line,
                generated_column: raw.generated_column,
                module,
                line,
                column,
            })
        })
        .collect();
    mappings.sort_unstable();
    mappings.dedup();
    mappings
}

/// URL of a trailing `//# sourceMappingURL=` (or `/*# ... */`) comment
pub fn source_mapping_url(text: &str) -> Option<&str> {
    let last = text.lines().rev().map(str::trim).find(|line| !line.is_empty())?;
    let rest = last
        .strip_prefix("//# sourceMappingURL=")
        .or_else(|| last.strip_prefix("//@ sourceMappingURL="))
        .or_else(|| {
            last.strip_prefix("/*# sourceMappingURL=")
                .and_then(|rest| rest.strip_suffix("*/"))
        })?;
    let url = rest.trim();
    (!url.is_empty()).then_some(url)
}

/// Companion map of a module as JSON, from a data URL or an adjacent file
pub fn load_companion(host: &dyn VirtualFileSystem, file: &Path, text: &str) -> Option<String> {
    let url = source_mapping_url(text)?;
    if url.starts_with("data:") {
        let decoded = match sourcemap::decode_data_url(url) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(target: "jsbundle::sourcemap", module = %file.display(), error = %err, "ignoring malformed inline source map");
                return None;
            }
        };
        let map = match decoded {
            DecodedMap::Regular(map) => map,
            DecodedMap::Index(index) => index.flatten().ok()?,
            _ => return None,
        };
        return to_json(&map).ok();
    }
    let path = normalize(&file.parent()?.join(url));
    match host.read_to_string(&path) {
        Ok(json) => Some(json),
        Err(err) => {
            warn!(target: "jsbundle::sourcemap", map = %path.display(), error = %err, "companion source map not readable");
            None
        }
    }
}

pub fn to_json(map: &SourceMap) -> Result<String, BundleError> {
    let mut out = Vec::new();
    map.to_writer(&mut out)
        .map_err(|e| BundleError::SourceMap(e.to_string()))?;
    String::from_utf8(out).map_err(|e| BundleError::SourceMap(e.to_string()))
}

pub fn to_data_url(map: &SourceMap) -> Result<String, BundleError> {
    map.to_data_url()
        .map_err(|e| BundleError::SourceMap(e.to_string()))
}

/// A module's own map and the directory its `sources` are relative to
struct Companion {
    map: SourceMap,
    base: PathBuf,
}

/// A position resolved back to an authored file
struct Origin<'a> {
    source: String,
    line: u32,
    column: u32,
    content: Option<&'a str>,
}

impl Companion {
    fn parse(record: &ModuleRecord) -> Option<Self> {
        let json = record.source_map.as_deref()?;
        let file = record.path.as_file()?;
        match SourceMap::from_slice(json.as_bytes()) {
            Ok(map) => Some(Self {
                map,
                base: file.parent().map(Path::to_path_buf).unwrap_or_default(),
            }),
            Err(err) => {
                warn!(target: "jsbundle::sourcemap", module = %file.display(), error = %err, "ignoring unparsable companion map");
                None
            }
        }
    }

    fn lookup(&self, line: u32, column: u32, cwd: &Path) -> Option<Origin<'_>> {
        let token = self.map.lookup_token(line, column)?;
        if token.get_dst_line() != line {
            return None;
        }
        let raw = token.get_source()?;
        let joined = match self.map.get_source_root() {
            Some(root) if !root.is_empty() && !raw.starts_with(root) => {
                format!("{}/{}", root.trim_end_matches('/'), raw)
            }
            _ => raw.to_string(),
        };
        let source = if joined.contains("://") {
            joined
        } else {
            relative_to(&normalize(&self.base.join(&joined)), cwd)
        };
        Some(Origin {
            source,
            line: token.get_src_line(),
            column: token.get_src_col(),
            content: self.map.get_source_contents(token.get_src_id()),
        })
    }
}

/// Compose printer mappings with every module's companion map into the
/// bundle's source map
pub fn stitch(
    mappings: &[Mapping],
    session: &Session,
    cwd: &Path,
    file: Option<&str>,
) -> Result<SourceMap, BundleError> {
    let mut builder = SourceMapBuilder::new(file);
    let mut companions: HashMap<usize, Option<Companion>> = HashMap::new();
    let mut with_content: HashSet<u32> = HashSet::new();

    for mapping in mappings {
        let Some(record) = session.record(mapping.module) else {
            continue;
        };
        let companion = companions
            .entry(mapping.module)
            .or_insert_with(|| Companion::parse(record));

        let origin = companion
            .as_ref()
            .and_then(|c| c.lookup(mapping.line, mapping.column, cwd))
            .unwrap_or_else(|| Origin {
                source: record.path.display_relative(cwd),
                line: mapping.line,
                column: mapping.column,
                content: record.source.as_deref(),
            });

        let token = builder.add(
            mapping.generated_line,
            mapping.generated_column,
            origin.line,
            origin.column,
            Some(&origin.source),
            None,
            false,
        );
        if let Some(content) = origin.content {
            if with_content.insert(token.src_id) {
                builder.set_source_contents(token.src_id, Some(content));
            }
        }
    }

    let map = builder.into_sourcemap();
    debug!(
        target: "jsbundle::sourcemap",
        sources = map.get_source_count(),
        tokens = map.get_token_count(),
        chained = companions.values().filter(|c| c.is_some()).count(),
        "stitched"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_path::ModulePath;
    use crate::transform::wrap_factory;

    #[test]
    fn test_source_mapping_url_forms() {
        assert_eq!(source_mapping_url("a;\n//# sourceMappingURL=a.js.map\n\n"), Some("a.js.map"));
        assert_eq!(source_mapping_url("a;\n/*# sourceMappingURL=x.map */"), Some("x.map"));
        assert_eq!(source_mapping_url("//# sourceMappingURL=x.map\na;"), None);
        assert_eq!(source_mapping_url(""), None);
    }

    fn session_with(path: &str, source: &str, map: Option<String>) -> Session {
        let mut session = Session::new();
        let index = session.index_of(&ModulePath::file(path));
        let record = session.record_mut(index).unwrap();
        record.source = Some(source.to_string());
        record.source_map = map;
        session
    }

    fn mapping(gen_line: u32, gen_col: u32, line: u32, col: u32) -> Mapping {
        Mapping {
            generated_line: gen_line,
            generated_column: gen_col,
            module: 0,
            line,
            column: col,
        }
    }

    #[test]
    fn test_locate_picks_module_by_span_base() {
        let mut session = Session::new();
        for (name, text) in [("/p/a.js", "a;
b;"), ("/p/b.js", "c;")] {
            let index = session.index_of(&ModulePath::file(name));
            let base = session.reserve_span(text.len());
            session.set_ast(index, wrap_factory(Vec::new()));
            let record = session.record_mut(index).unwrap();
            record.span_base = base;
            record.source = Some(text.to_string());
        }
        // a.js is parsed at 1, b.js at 7
        let raw = [
            RawMapping { pos: 7, generated_line: 3, generated_column: 0 },
            RawMapping { pos: 4, generated_line: 1, generated_column: 2 },
            RawMapping { pos: 1, generated_line: 0, generated_column: 0 },
        ];
        let mappings = locate(&raw, &session);
        assert_eq!(
            mappings.iter().map(|m| (m.generated_line, m.module, m.line, m.column)).collect::<Vec<_>>(),
            vec![(0, 0, 0, 0), (1, 0, 1, 0), (3, 1, 0, 0)]
        );
    }

    #[test]
    fn test_plain_module_positions() {
        let session = session_with("/p/src/a.js", "let x = 1;", None);
        let map = stitch(&[mapping(5, 2, 0, 4)], &session, Path::new("/p"), Some("out.js")).unwrap();
        let token = map.lookup_token(5, 2).unwrap();
        assert_eq!(token.get_source(), Some("src/a.js"));
        assert_eq!((token.get_src_line(), token.get_src_col()), (0, 4));
        assert_eq!(map.get_source_contents(0), Some("let x = 1;"));
        assert_eq!(map.get_file(), Some("out.js"));
    }

    #[test]
    fn test_companion_map_is_followed() {
        let mut builder = SourceMapBuilder::new(Some("a.js"));
        builder.add(0, 0, 9, 3, Some("../orig/a.ts"), None, false);
        let companion = to_json(&builder.into_sourcemap()).unwrap();
        let session = session_with("/p/build/a.js", "x();", Some(companion));

        let map = stitch(&[mapping(2, 4, 0, 0)], &session, Path::new("/p"), None).unwrap();
        let token = map.lookup_token(2, 4).unwrap();
        assert_eq!(token.get_source(), Some("orig/a.ts"));
        assert_eq!((token.get_src_line(), token.get_src_col()), (9, 3));
    }

    #[test]
    fn test_companion_miss_falls_back() {
        let mut builder = SourceMapBuilder::new(None);
        builder.add(0, 0, 1, 1, Some("a.ts"), None, false);
        let companion = to_json(&builder.into_sourcemap()).unwrap();
        let session = session_with("/p/a.js", "x();\ny();", Some(companion));

        let map = stitch(&[mapping(0, 0, 1, 0)], &session, Path::new("/p"), None).unwrap();
        let token = map.lookup_token(0, 0).unwrap();
        assert_eq!(token.get_source(), Some("a.js"));
        assert_eq!(token.get_src_line(), 1);
    }

    #[test]
    fn test_inline_companion_is_decoded() {
        let mut builder = SourceMapBuilder::new(None);
        builder.add(0, 0, 3, 0, Some("a.ts"), None, false);
        let url = to_data_url(&builder.into_sourcemap()).unwrap();
        let host = jsbundle_vfs::MemoryFileSystem::new();
        let text = format!("x();\n//# sourceMappingURL={}", url);
        let json = load_companion(&host, Path::new("/p/a.js"), &text).unwrap();
        let map = SourceMap::from_slice(json.as_bytes()).unwrap();
        assert_eq!(map.get_source(0), Some("a.ts"));
    }

    #[test]
    fn test_file_companion_is_read() {
        let host = jsbundle_vfs::MemoryFileSystem::with_files([(
            "/p/lib/a.js.map",
            br#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"AAAA"}"#.to_vec(),
        )]);
        let json = load_companion(&host, Path::new("/p/lib/a.js"), "x();\n//# sourceMappingURL=a.js.map").unwrap();
        assert!(json.contains("a.ts"));
        assert!(load_companion(&host, Path::new("/p/lib/b.js"), "//# sourceMappingURL=missing.map").is_none());
    }
}
