//! JavaScript syntax layer over swc
//!
//! Every module is parsed at its own byte offset (its span base), so a
//! position in the printed bundle can be traced back to exactly one module
//! without a shared source registry. Scope analysis is swc's resolver:
//! an identifier that binds to nothing carries the module's `unresolved`
//! context.

pub mod build;
mod comments;
mod parse;
mod print;
mod scope;

pub use comments::ModuleComments;
pub use parse::{parse_module, parse_template, LineIndex, ParsedModule, SyntaxError};
pub use print::{print_module, print_stmts, Printed, RawMapping};
pub use scope::{directive_count, free_names, into_stmts};

pub use swc_core::ecma::ast;
