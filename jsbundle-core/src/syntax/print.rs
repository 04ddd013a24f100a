use super::comments::ModuleComments;
use std::io;
use swc_core::common::comments::{Comments, SingleThreadedComments};
use swc_core::common::sync::Lrc;
use swc_core::common::{FilePathMapping, SourceMap, DUMMY_SP};
use swc_core::ecma::ast::{Module, ModuleItem, Stmt};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config, Emitter};

/// One printed position: byte position of the source node and the 0-based
/// line/column it was written at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMapping {
    pub pos: u32,
    pub generated_line: u32,
    pub generated_column: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Printed {
    pub code: String,
    pub mappings: Vec<RawMapping>,
}

/// Print a module. `comments` of every module in it are merged; their
/// positions never overlap.
pub fn print_module<'c>(
    module: &Module,
    comments: impl IntoIterator<Item = &'c ModuleComments>,
    with_mappings: bool,
) -> io::Result<Printed> {
    let store = SingleThreadedComments::default();
    for module_comments in comments {
        module_comments.add_to(&store);
    }

    let cm: Lrc<SourceMap> = Lrc::new(SourceMap::new(FilePathMapping::empty()));
    let mut buf = Vec::new();
    let mut raw = Vec::new();
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, with_mappings.then_some(&mut raw));
        let mut emitter = Emitter {
            cfg: Config::default(),
            cm: cm.clone(),
            comments: Some(&store as &dyn Comments),
            wr: writer,
        };
        emitter.emit_module(module)?;
    }

    let code = String::from_utf8(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let mappings = raw
        .into_iter()
        .filter(|(pos, _)| pos.0 != 0)
        .map(|(pos, at)| RawMapping {
            pos: pos.0,
            generated_line: at.line,
            generated_column: at.col,
        })
        .collect();
    Ok(Printed { code, mappings })
}

/// Print loose statements, e.g. a factory body
pub fn print_stmts(stmts: &[Stmt], comments: &ModuleComments) -> io::Result<String> {
    let module = Module {
        span: DUMMY_SP,
        body: stmts.iter().cloned().map(ModuleItem::Stmt).collect(),
        shebang: None,
    };
    Ok(print_module(&module, [comments], false)?.code)
}
