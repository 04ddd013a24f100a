use super::comments::ModuleComments;
use once_cell::sync::Lazy;
use swc_core::common::comments::SingleThreadedComments;
use swc_core::common::{BytePos, Globals, Mark, Span, Spanned, SyntaxContext, DUMMY_SP, GLOBALS};
use swc_core::ecma::ast::{EsVersion, Module, ModuleItem, Program, Stmt};
use swc_core::ecma::parser::error::Error as ParserError;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::{Parser, StringInput, Syntax};
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

/// Hygiene state shared by every parse of the process
static SWC_GLOBALS: Lazy<Globals> = Lazy::new(Globals::new);

/// Malformed source, 1-based location
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({line}:{column})")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A parsed module with scope contexts applied
#[derive(Debug)]
pub struct ParsedModule {
    pub body: Vec<ModuleItem>,
    pub comments: ModuleComments,
    /// Context carried by references that bind to nothing in the module
    pub unresolved: SyntaxContext,
}

/// Parse module source whose first byte sits at offset `base`
///
/// Script and module goal are detected from the presence of
/// `import`/`export`. Recoverable parser errors are fatal too.
pub fn parse_module(text: &str, base: u32) -> Result<ParsedModule, SyntaxError> {
    let store = SingleThreadedComments::default();
    let mut program = parse_program(text, base, Some(&store))?;

    let unresolved = GLOBALS.set(&SWC_GLOBALS, || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));
        SyntaxContext::empty().apply_mark(unresolved_mark)
    });

    Ok(ParsedModule {
        body: into_module(program).body,
        comments: ModuleComments::from_store(&store),
        unresolved,
    })
}

/// Parse generated statements. Spans are erased so the statements never
/// map back into a module.
pub fn parse_template(text: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let mut module = into_module(parse_program(text, 1, None)?);
    module.visit_mut_with(&mut EraseSpans);
    Ok(super::into_stmts(module.body))
}

fn parse_program(
    text: &str,
    base: u32,
    comments: Option<&SingleThreadedComments>,
) -> Result<Program, SyntaxError> {
    let start = BytePos(base);
    let end = BytePos(base.saturating_add(text.len() as u32));
    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        EsVersion::EsNext,
        StringInput::new(text, start, end),
        comments.map(|store| store as &dyn swc_core::common::comments::Comments),
    );
    let mut parser = Parser::new_from(lexer);
    let program = parser
        .parse_program()
        .map_err(|err| syntax_error(text, base, err))?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(syntax_error(text, base, err));
    }
    Ok(program)
}

fn into_module(program: Program) -> Module {
    match program {
        Program::Module(module) => module,
        Program::Script(script) => Module {
            span: script.span,
            body: script.body.into_iter().map(ModuleItem::Stmt).collect(),
            shebang: script.shebang,
        },
    }
}

fn syntax_error(text: &str, base: u32, err: ParserError) -> SyntaxError {
    let offset = err.span().lo.0.saturating_sub(base) as usize;
    let (line, column) = LineIndex::new(text).locate(offset);
    SyntaxError {
        line: line as usize + 1,
        column: column as usize + 1,
        message: err.kind().msg().into_owned(),
    }
}

struct EraseSpans;

impl VisitMut for EraseSpans {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }
}

/// Line starts of a source text
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    /// 0-based line and UTF-16 column of a byte offset
    pub fn locate(&self, offset: usize) -> (u32, u32) {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let column = self.text[self.starts[line]..offset].encode_utf16().count();
        (line as u32, column as u32)
    }
}
