//! Module bodies that are generated instead of parsed

use crate::error::{BundleError, ParseError};
use crate::module_path::ModulePath;
use crate::resolver::is_core_module;
use crate::syntax::ast::{
    Bool, Expr, IdentName, KeyValueProp, Lit, Null, Number, ObjectLit, Prop, PropName, PropOrSpread, Stmt,
    Str, ThrowStmt, UnaryExpr, UnaryOp,
};
use crate::syntax::build::{
    array, assign, call, expr_stmt, ident_expr, is_identifier_name, member, member_expr, str_lit,
};
use jsbundle_config::{BundleConfig, External, Target};
use serde_json::Value;
use std::path::PathBuf;
use swc_core::common::DUMMY_SP;

/// `module.exports = <value>;`
fn export_value(value: Expr) -> Vec<Stmt> {
    vec![expr_stmt(assign(member_expr(ident_expr("module"), "exports"), value))]
}

fn object(props: Vec<(String, Expr)>) -> Expr {
    Expr::Object(ObjectLit {
        span: DUMMY_SP,
        props: props
            .into_iter()
            .map(|(key, value)| {
                let key = if is_identifier_name(&key) {
                    PropName::Ident(IdentName::new(key.into(), DUMMY_SP))
                } else {
                    PropName::Str(Str {
                        span: DUMMY_SP,
                        value: key.into(),
                        raw: None,
                    })
                };
                PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                    key,
                    value: Box::new(value),
                })))
            })
            .collect(),
    })
}

/// Body of an external or core-module token
pub fn external(name: &str, config: &BundleConfig) -> Vec<Stmt> {
    let value = match config.externals.get(name) {
        Some(External::Global(global)) => global_expr(global),
        Some(External::Stub) => object(Vec::new()),
        None if config.target == Target::Node && is_core_module(name) => {
            call(ident_expr("require"), vec![str_lit(name)])
        }
        None => object(Vec::new()),
    };
    export_value(value)
}

/// `jQuery` or a dotted path such as `window.React`
fn global_expr(name: &str) -> Expr {
    let mut parts = name.split('.');
    let first = parts.next().unwrap_or(name);
    parts.fold(ident_expr(first), member)
}

/// `throw Error("<message>");`
pub fn throwing(message: &str) -> Vec<Stmt> {
    let error = call(ident_expr("Error"), vec![str_lit(message)]);
    vec![Stmt::Throw(ThrowStmt {
        span: DUMMY_SP,
        arg: Box::new(error),
    })]
}

/// `module.exports = <literal tree of the JSON document>;`
pub fn json(text: &str, path: &ModulePath) -> Result<Vec<Stmt>, BundleError> {
    let value: Value = serde_json::from_str(text).map_err(|err| {
        BundleError::Parse(ParseError {
            path: match path {
                ModulePath::File(file) => file.clone(),
                other => PathBuf::from(other.to_string()),
            },
            line: err.line(),
            column: err.column(),
            message: format!("invalid JSON: {}", err),
        })
    })?;
    Ok(export_value(json_expr(&value)))
}

fn json_expr(value: &Value) -> Expr {
    match value {
        Value::Null => Expr::Lit(Lit::Null(Null { span: DUMMY_SP })),
        Value::Bool(value) => Expr::Lit(Lit::Bool(Bool {
            span: DUMMY_SP,
            value: *value,
        })),
        Value::Number(n) => {
            let raw = n.to_string();
            match raw.strip_prefix('-') {
                Some(abs) => Expr::Unary(UnaryExpr {
                    span: DUMMY_SP,
                    op: UnaryOp::Minus,
                    arg: Box::new(number(abs)),
                }),
                None => number(&raw),
            }
        }
        Value::String(s) => str_lit(s),
        Value::Array(items) => array(items.iter().map(json_expr).collect()),
        Value::Object(map) => object(
            map.iter()
                .map(|(key, value)| (key.clone(), json_expr(value)))
                .collect(),
        ),
    }
}

/// Numeric literal printed exactly as the JSON text wrote it
fn number(raw: &str) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value: raw.parse().unwrap_or(f64::NAN),
        raw: Some(raw.into()),
    }))
}
