//! Constructors for generated AST nodes

use swc_core::common::{Span, SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::{
    ArrayLit, AssignExpr, AssignOp, AssignTarget, BindingIdent, BlockStmt, CallExpr, Callee,
    ComputedPropName, Decl, Expr, ExprOrSpread, ExprStmt, FnExpr, Function, Ident, IdentName, Lit,
    MemberExpr, MemberProp, Number, Param, ParenExpr, Pat, SeqExpr, SimpleAssignTarget, Stmt, Str,
    ThisExpr, VarDecl, VarDeclKind, VarDeclarator,
};

pub fn ident(name: &str) -> Ident {
    Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty())
}

pub fn ident_expr(name: &str) -> Expr {
    Expr::Ident(ident(name))
}

pub fn str_lit(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }))
}

pub fn num(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None,
    }))
}

pub fn this() -> Expr {
    Expr::This(ThisExpr { span: DUMMY_SP })
}

/// ASCII identifier test, enough to decide between `a.b` and `a["b"]`
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// `obj.prop`, or `obj["prop"]` for `default` and non-identifier names
pub fn member_expr(obj: Expr, prop: &str) -> MemberExpr {
    let prop = if prop != "default" && is_identifier_name(prop) {
        MemberProp::Ident(IdentName::new(prop.into(), DUMMY_SP))
    } else {
        MemberProp::Computed(ComputedPropName {
            span: DUMMY_SP,
            expr: Box::new(str_lit(prop)),
        })
    };
    MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(obj),
        prop,
    }
}

pub fn member(obj: Expr, prop: &str) -> Expr {
    Expr::Member(member_expr(obj, prop))
}

/// `obj[<expr>]`
pub fn computed(obj: Expr, prop: Expr) -> MemberExpr {
    MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(obj),
        prop: MemberProp::Computed(ComputedPropName {
            span: DUMMY_SP,
            expr: Box::new(prop),
        }),
    }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Callee::Expr(Box::new(callee)),
        args: args
            .into_iter()
            .map(|expr| ExprOrSpread {
                spread: None,
                expr: Box::new(expr),
            })
            .collect(),
        type_args: None,
    })
}

pub fn paren(expr: Expr) -> Expr {
    Expr::Paren(ParenExpr {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

/// `(0, <expr>)`
pub fn detached(expr: Expr) -> Expr {
    paren(Expr::Seq(SeqExpr {
        span: DUMMY_SP,
        exprs: vec![Box::new(num(0.0)), Box::new(expr)],
    }))
}

pub fn assign(target: MemberExpr, value: Expr) -> Expr {
    Expr::Assign(AssignExpr {
        span: DUMMY_SP,
        op: AssignOp::Assign,
        left: AssignTarget::Simple(SimpleAssignTarget::Member(target)),
        right: Box::new(value),
    })
}

pub fn array(elems: Vec<Expr>) -> Expr {
    Expr::Array(ArrayLit {
        span: DUMMY_SP,
        elems: elems
            .into_iter()
            .map(|expr| {
                Some(ExprOrSpread {
                    spread: None,
                    expr: Box::new(expr),
                })
            })
            .collect(),
    })
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

/// `var <name> = <init>;`
pub fn var(name: &str, init: Expr) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent::from(ident(name))),
            init: Some(Box::new(init)),
            definite: false,
        }],
    })))
}

pub fn function(params: &[&str], stmts: Vec<Stmt>) -> Function {
    Function {
        params: params
            .iter()
            .map(|name| Param {
                span: DUMMY_SP,
                decorators: Vec::new(),
                pat: Pat::Ident(BindingIdent::from(ident(name))),
            })
            .collect(),
        decorators: Vec::new(),
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        body: Some(BlockStmt {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            stmts,
        }),
        is_generator: false,
        is_async: false,
        type_params: None,
        return_type: None,
    }
}

pub fn fn_expr(name: Option<&str>, function: Function) -> Expr {
    Expr::Fn(FnExpr {
        ident: name.map(ident),
        function: Box::new(function),
    })
}

/// Give a generated expression the span of the code it replaces, so the
/// printer maps it back there
pub fn with_span(mut expr: Expr, span: Span) -> Expr {
    match &mut expr {
        Expr::Call(node) => node.span = span,
        Expr::Member(node) => node.span = span,
        Expr::Assign(node) => node.span = span,
        Expr::Paren(node) => node.span = span,
        Expr::Ident(node) => node.span = span,
        _ => {}
    }
    expr
}

pub fn stmt_with_span(mut stmt: Stmt, span: Span) -> Stmt {
    match &mut stmt {
        Stmt::Expr(node) => node.span = span,
        Stmt::Decl(Decl::Var(node)) => node.span = span,
        Stmt::Throw(node) => node.span = span,
        _ => {}
    }
    stmt
}
