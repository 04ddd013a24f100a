//! Inject `__filename` / `__dirname` through an immediately invoked wrapper

use super::{Pass, PassContext};
use crate::error::BundleError;
use crate::module_path::ModulePath;
use crate::syntax::ast::ModuleItem;
use crate::syntax::build::{call, expr_stmt, fn_expr, function, member, paren, str_lit, this};
use crate::syntax::{free_names, into_stmts};

pub struct EnvLocalWrap;

const NAMES: [&str; 2] = ["__filename", "__dirname"];

impl Pass for EnvLocalWrap {
    fn name(&self) -> &'static str {
        "env-local-wrap"
    }

    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError> {
        if free_names(body, cx.unresolved, &NAMES).is_empty() {
            return Ok(());
        }
        let filename = cx.path.display_relative(cx.cwd);
        let dirname = match cx.path {
            ModulePath::File(_) => match filename.rsplit_once('/') {
                Some((dir, _)) if !dir.is_empty() => dir.to_string(),
                Some(_) => "/".to_string(),
                None => ".".to_string(),
            },
            _ => ".".to_string(),
        };

        // (function (__filename, __dirname) { <body> }).call(this, "<file>", "<dir>");
        let wrapper = paren(fn_expr(None, function(&NAMES, into_stmts(std::mem::take(body)))));
        let invoke = call(
            member(wrapper, "call"),
            vec![this(), str_lit(&filename), str_lit(&dirname)],
        );
        body.push(ModuleItem::Stmt(expr_stmt(invoke)));
        Ok(())
    }
}
