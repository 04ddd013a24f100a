//! 平台相关的终端输出

mod cli;

pub use cli::{print_error, print_source_context};
