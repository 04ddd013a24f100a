use swc_core::common::SyntaxContext;
use swc_core::ecma::ast::{Expr, Ident, Lit, ModuleItem, Stmt};
use swc_core::ecma::visit::{Visit, VisitWith};

/// Which of `names` are referenced without a binding, in first-use order
pub fn free_names(items: &[ModuleItem], unresolved: SyntaxContext, names: &[&str]) -> Vec<String> {
    let mut finder = FreeNames {
        unresolved,
        names,
        found: Vec::new(),
    };
    for item in items {
        item.visit_with(&mut finder);
    }
    finder.found
}

struct FreeNames<'n> {
    unresolved: SyntaxContext,
    names: &'n [&'n str],
    found: Vec<String>,
}

impl Visit for FreeNames<'_> {
    fn visit_ident(&mut self, ident: &Ident) {
        if ident.ctxt != self.unresolved {
            return;
        }
        let name = &*ident.sym;
        if self.names.contains(&name) && !self.found.iter().any(|found| found == name) {
            self.found.push(name.to_string());
        }
    }
}

/// Number of leading directive statements (`"use strict";`)
pub fn directive_count(items: &[ModuleItem]) -> usize {
    items
        .iter()
        .take_while(|item| {
            matches!(item, ModuleItem::Stmt(Stmt::Expr(stmt)) if matches!(&*stmt.expr, Expr::Lit(Lit::Str(_))))
        })
        .count()
}

/// Statements of a body whose module declarations have all been rewritten
pub fn into_stmts(items: Vec<ModuleItem>) -> Vec<Stmt> {
    items
        .into_iter()
        .filter_map(|item| match item {
            ModuleItem::Stmt(stmt) => Some(stmt),
            ModuleItem::ModuleDecl(_) => None,
        })
        .collect()
}
