//! `require("x")` → `runtimeRequire(<index>).exports`

use super::{Pass, PassContext, RUNTIME_REQUIRE};
use crate::error::BundleError;
use crate::syntax::ast::{CallExpr, Callee, Expr, Lit, ModuleItem};
use crate::syntax::build::{call, ident_expr, member, num, with_span};
use swc_core::common::{Span, SyntaxContext};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

pub struct CommonJsRewrite;

impl Pass for CommonJsRewrite {
    fn name(&self) -> &'static str {
        "commonjs-rewrite"
    }

    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError> {
        let mut rewriter = RequireRewriter {
            unresolved: cx.unresolved,
            cx,
            error: None,
        };
        body.visit_mut_with(&mut rewriter);
        match rewriter.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Specifier of a `require("literal")` call whose `require` binds to nothing
fn required_specifier(call: &CallExpr, unresolved: SyntaxContext) -> Option<String> {
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    match &**callee {
        Expr::Ident(ident) if &*ident.sym == "require" && ident.ctxt == unresolved => {}
        _ => return None,
    }
    match call.args.as_slice() {
        [arg] if arg.spread.is_none() => match &*arg.expr {
            Expr::Lit(Lit::Str(specifier)) => Some(specifier.value.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// `runtimeRequire(<index>).exports`, carrying the span of the original call
pub(crate) fn runtime_exports(index: usize, span: Span) -> Expr {
    let require = with_span(call(ident_expr(RUNTIME_REQUIRE), vec![num(index as f64)]), span);
    with_span(member(require, "exports"), span)
}

struct RequireRewriter<'c, 'a> {
    cx: &'c mut PassContext<'a>,
    unresolved: SyntaxContext,
    /// First resolution failure; the rest of the walk is skipped
    error: Option<BundleError>,
}

impl VisitMut for RequireRewriter<'_, '_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if self.error.is_some() {
            return;
        }
        if let Expr::Call(node) = expr {
            if let Some(specifier) = required_specifier(node, self.unresolved) {
                let span = node.span;
                match self.cx.require(&specifier) {
                    Ok(index) => *expr = runtime_exports(index, span),
                    Err(err) => self.error = Some(err),
                }
                return;
            }
        }
        expr.visit_mut_children_with(self);
    }
}
