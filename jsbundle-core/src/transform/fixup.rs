//! Drop comments between `return` and its argument
//!
//! A line comment there would make the printer emit a line break right
//! after `return`, which ends the statement early.

use super::{Pass, PassContext};
use crate::error::BundleError;
use crate::syntax::ast::{Callee, Expr, ModuleItem, ReturnStmt};
use swc_core::common::Spanned;
use swc_core::ecma::visit::{Visit, VisitWith};

pub struct ReturnCommentFixup;

impl Pass for ReturnCommentFixup {
    fn name(&self) -> &'static str {
        "return-comment-fixup"
    }

    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError> {
        if cx.comments.is_empty() {
            return Ok(());
        }
        let mut gaps = ReturnGaps::default();
        for item in body.iter() {
            item.visit_with(&mut gaps);
        }
        for (lo, hi) in gaps.0 {
            cx.comments.remove_between(lo, hi);
        }
        Ok(())
    }
}

/// `(return keyword start, argument start)` of every return with an argument
#[derive(Default)]
struct ReturnGaps(Vec<(u32, u32)>);

impl Visit for ReturnGaps {
    fn visit_return_stmt(&mut self, ret: &ReturnStmt) {
        if let Some(arg) = &ret.arg {
            self.0.push((ret.span.lo.0, leftmost(arg)));
        }
        ret.visit_children_with(self);
    }
}

/// Position of the first token of `expr`, looking through parentheses
fn leftmost(expr: &Expr) -> u32 {
    match expr {
        Expr::Paren(node) => leftmost(&node.expr),
        Expr::Bin(node) => leftmost(&node.left),
        Expr::Member(node) => leftmost(&node.obj),
        Expr::Cond(node) => leftmost(&node.test),
        Expr::Seq(node) => node.exprs.first().map_or(node.span.lo.0, |first| leftmost(first)),
        Expr::Call(node) => match &node.callee {
            Callee::Expr(callee) => leftmost(callee),
            _ => node.span.lo.0,
        },
        Expr::TaggedTpl(node) => leftmost(&node.tag),
        other => other.span().lo.0,
    }
}
