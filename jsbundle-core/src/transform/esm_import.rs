//! `import` declarations → `var __import<N> = runtimeRequire(<index>);`
//!
//! Every free reference to an imported binding becomes a projection off the
//! temporary's `exports`, so bindings stay live across cycles. Calls through
//! a projection use `(0, proj)()` to keep `this` undefined.

use super::{Pass, PassContext, RUNTIME_REQUIRE};
use crate::error::BundleError;
use crate::syntax::ast::{
    Callee, Expr, Id, IdentName, ImportDecl, ImportSpecifier, KeyValueProp, ModuleDecl, ModuleExportName,
    ModuleItem, Prop, PropName,
};
use crate::syntax::build::{call, detached, expr_stmt, ident_expr, member, num, stmt_with_span, var, with_span};
use crate::syntax::directive_count;
use std::collections::HashMap;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

pub struct ImportRewrite;

impl Pass for ImportRewrite {
    fn name(&self) -> &'static str {
        "import-rewrite"
    }

    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError> {
        if !body
            .iter()
            .any(|item| matches!(item, ModuleItem::ModuleDecl(ModuleDecl::Import(_))))
        {
            return Ok(());
        }

        let mut bindings: HashMap<Id, Expr> = HashMap::new();
        let mut hoisted = Vec::new();
        let mut rest = Vec::with_capacity(body.len());
        let directives = directive_count(body);
        let mut counter = 0;

        for (position, item) in std::mem::take(body).into_iter().enumerate() {
            let decl = match item {
                ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) => decl,
                item if position < directives => {
                    hoisted.push(item);
                    continue;
                }
                item => {
                    rest.push(item);
                    continue;
                }
            };
            let ImportDecl {
                span,
                specifiers,
                src,
                ..
            } = decl;
            let index = cx.require(&src.value)?;
            let load = with_span(call(ident_expr(RUNTIME_REQUIRE), vec![num(index as f64)]), span);

            let replacement = if specifiers.is_empty() {
                expr_stmt(load)
            } else {
                let temp = format!("__import{}", counter);
                counter += 1;
                for specifier in specifiers {
                    let exports = member(ident_expr(&temp), "exports");
                    let (local, projected) = match specifier {
                        ImportSpecifier::Default(spec) => (spec.local, member(exports, "default")),
                        ImportSpecifier::Namespace(spec) => (spec.local, exports),
                        ImportSpecifier::Named(spec) => {
                            let imported = match &spec.imported {
                                Some(ModuleExportName::Ident(name)) => name.sym.to_string(),
                                Some(ModuleExportName::Str(name)) => name.value.to_string(),
                                None => spec.local.sym.to_string(),
                            };
                            (spec.local, member(exports, &imported))
                        }
                    };
                    bindings.insert(local.to_id(), projected);
                }
                var(&temp, load)
            };
            hoisted.push(ModuleItem::Stmt(stmt_with_span(replacement, span)));
        }

        hoisted.extend(rest);
        *body = hoisted;

        if !bindings.is_empty() {
            body.visit_mut_with(&mut ReferenceRewriter {
                bindings: &bindings,
            });
        }
        cx.imports = bindings;
        Ok(())
    }
}

struct ReferenceRewriter<'b> {
    bindings: &'b HashMap<Id, Expr>,
}

impl ReferenceRewriter<'_> {
    fn imported(&self, expr: &Expr) -> Option<Expr> {
        let Expr::Ident(ident) = expr else {
            return None;
        };
        let projected = self.bindings.get(&ident.to_id())?;
        Some(with_span(projected.clone(), ident.span))
    }

    /// Callee position: member projections are detached from their object
    fn imported_callee(&self, callee: &Expr) -> Option<Expr> {
        let projected = self.imported(callee)?;
        Some(match projected {
            Expr::Member(_) => detached(projected),
            other => other,
        })
    }
}

impl VisitMut for ReferenceRewriter<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Some(projected) = self.imported(expr) {
            *expr = projected;
            return;
        }
        match expr {
            Expr::Call(node) => {
                if let Callee::Expr(callee) = &mut node.callee {
                    if let Some(projected) = self.imported_callee(callee) {
                        **callee = projected;
                        node.args.visit_mut_with(self);
                        return;
                    }
                }
            }
            Expr::TaggedTpl(node) => {
                if let Some(projected) = self.imported_callee(&node.tag) {
                    *node.tag = projected;
                    node.tpl.visit_mut_with(self);
                    return;
                }
            }
            _ => {}
        }
        expr.visit_mut_children_with(self);
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop {
            if let Some(projected) = self.bindings.get(&ident.to_id()) {
                *prop = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(IdentName::new(ident.sym.clone(), ident.span)),
                    value: Box::new(with_span(projected.clone(), ident.span)),
                });
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }
}
