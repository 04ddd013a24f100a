//! `export` declarations → assignments onto `module.exports`

use super::commonjs::runtime_exports;
use super::{template, Pass, PassContext};
use crate::error::BundleError;
use crate::syntax::ast::{
    BindingIdent, ClassDecl, Decl, DefaultDecl, ExportSpecifier, Expr, FnDecl, Ident, ModuleDecl,
    ModuleExportName, ModuleItem, Stmt,
};
use crate::syntax::build::{assign, ident, ident_expr, member, member_expr, stmt_with_span, var};
use crate::syntax::{build, directive_count};
use swc_core::common::{Span, Spanned};
use swc_core::ecma::visit::{Visit, VisitWith};

pub struct ExportRewrite;

/// Name used for `export default function () {}`
const DEFAULT_FUNCTION_NAME: &str = "__default";

/// `module.exports.<name> = <value>;`
fn assign_export(name: &str, value: Expr, span: Span) -> Stmt {
    let target = member_expr(member(ident_expr("module"), "exports"), name);
    stmt_with_span(build::expr_stmt(assign(target, value)), span)
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(value) => value.value.to_string(),
    }
}

/// Bound names of declarators in source order; default values are skipped
#[derive(Default)]
struct BoundNames(Vec<String>);

impl Visit for BoundNames {
    fn visit_binding_ident(&mut self, binding: &BindingIdent) {
        self.0.push(binding.id.sym.to_string());
    }

    fn visit_expr(&mut self, _: &Expr) {}
}

impl Pass for ExportRewrite {
    fn name(&self) -> &'static str {
        "export-rewrite"
    }

    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError> {
        let is_export = |item: &ModuleItem| {
            matches!(item, ModuleItem::ModuleDecl(decl) if !matches!(decl, ModuleDecl::Import(_)))
        };
        if !body.iter().any(is_export) {
            return Ok(());
        }

        let directives = directive_count(body);
        let old = std::mem::take(body);
        // Function exports are assigned before anything runs, like hoisting
        let mut hoisted: Vec<Stmt> = Vec::new();
        let mut out: Vec<Stmt> = Vec::with_capacity(old.len());
        let mut reexports = 0;

        for item in old {
            let decl = match item {
                ModuleItem::Stmt(stmt) => {
                    out.push(stmt);
                    continue;
                }
                ModuleItem::ModuleDecl(decl) => decl,
            };
            let span = decl.span();
            match decl {
                ModuleDecl::ExportDecl(export) => match export.decl {
                    Decl::Fn(func) => {
                        cx.comments.move_leading(span.lo.0, func.function.span.lo.0);
                        hoisted.push(assign_export(&func.ident.sym, Expr::Ident(func.ident.clone()), span));
                        out.push(Stmt::Decl(Decl::Fn(func)));
                    }
                    Decl::Class(class) => {
                        cx.comments.move_leading(span.lo.0, class.class.span.lo.0);
                        let name = class.ident.clone();
                        out.push(Stmt::Decl(Decl::Class(class)));
                        out.push(assign_export(&name.sym, Expr::Ident(name.clone()), span));
                    }
                    Decl::Var(decl) => {
                        let mut names = BoundNames::default();
                        for declarator in &decl.decls {
                            declarator.name.visit_with(&mut names);
                        }
                        out.push(stmt_with_span(Stmt::Decl(Decl::Var(decl)), span));
                        for name in names.0 {
                            out.push(assign_export(&name, ident_expr(&name), span));
                        }
                    }
                    other => out.push(Stmt::Decl(other)),
                },
                ModuleDecl::ExportDefaultExpr(export) => {
                    out.push(assign_export("default", *export.expr, span));
                }
                ModuleDecl::ExportDefaultDecl(export) => match export.decl {
                    DefaultDecl::Fn(func) => {
                        cx.comments.move_leading(span.lo.0, func.function.span.lo.0);
                        let name = func.ident.unwrap_or_else(|| ident(DEFAULT_FUNCTION_NAME));
                        hoisted.push(assign_export("default", Expr::Ident(name.clone()), span));
                        out.push(Stmt::Decl(Decl::Fn(FnDecl {
                            ident: name,
                            declare: false,
                            function: func.function,
                        })));
                    }
                    DefaultDecl::Class(class) => match class.ident.clone() {
                        Some(name) => {
                            cx.comments.move_leading(span.lo.0, class.class.span.lo.0);
                            out.push(Stmt::Decl(Decl::Class(ClassDecl {
                                ident: name.clone(),
                                declare: false,
                                class: class.class,
                            })));
                            out.push(assign_export("default", Expr::Ident(name), span));
                        }
                        None => out.push(assign_export("default", Expr::Class(class), span)),
                    },
                    DefaultDecl::TsInterfaceDecl(_) => {}
                },
                ModuleDecl::ExportNamed(export) => {
                    let Some(src) = export.src else {
                        for specifier in export.specifiers {
                            let ExportSpecifier::Named(named) = specifier else {
                                continue;
                            };
                            let exported = named.exported.as_ref().unwrap_or(&named.orig);
                            let value = match &named.orig {
                                ModuleExportName::Ident(local) => cx
                                    .imports
                                    .get(&local.to_id())
                                    .cloned()
                                    .unwrap_or_else(|| Expr::Ident(local.clone())),
                                ModuleExportName::Str(value) => ident_expr(&value.value),
                            };
                            out.push(assign_export(&export_name(exported), value, span));
                        }
                        continue;
                    };
                    let index = cx.require(&src.value)?;
                    let needs_temp = export
                        .specifiers
                        .iter()
                        .any(|specifier| !matches!(specifier, ExportSpecifier::Namespace(_)));
                    let temp = format!("__reexport{}", reexports);
                    if needs_temp {
                        reexports += 1;
                        out.push(stmt_with_span(var(&temp, runtime_exports(index, span)), span));
                    }
                    for specifier in export.specifiers {
                        let (imported, exported) = match specifier {
                            ExportSpecifier::Namespace(namespace) => {
                                out.push(assign_export(
                                    &export_name(&namespace.name),
                                    runtime_exports(index, span),
                                    span,
                                ));
                                continue;
                            }
                            ExportSpecifier::Default(default) => ("default".to_string(), default.exported.sym.to_string()),
                            ExportSpecifier::Named(named) => {
                                let imported = export_name(&named.orig);
                                let exported = named.exported.as_ref().map(export_name).unwrap_or_else(|| imported.clone());
                                (imported, exported)
                            }
                        };
                        out.push(assign_export(&exported, member(ident_expr(&temp), &imported), span));
                    }
                }
                ModuleDecl::ExportAll(export) => {
                    let index = cx.require(&export.src.value)?;
                    let temp = format!("__reexport{}", reexports);
                    reexports += 1;
                    out.push(stmt_with_span(var(&temp, runtime_exports(index, span)), span));
                    out.extend(template(&format!(
                        "Object.keys({temp}).forEach(function (key) {{\n\
                         if (key !== \"default\") module.exports[key] = {temp}[key];\n\
                         }});"
                    ))?);
                }
                // Imports are gone by now; TypeScript forms never parse here
                _ => {}
            }
        }

        let insert_at = directives.min(out.len());
        out.splice(insert_at..insert_at, hoisted);
        *body = out.into_iter().map(ModuleItem::Stmt).collect();
        Ok(())
    }
}
