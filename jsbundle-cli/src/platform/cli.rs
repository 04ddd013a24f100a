//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use jsbundle_core::BundleError;
use jsbundle_vfs::VirtualFileSystem;
use std::io::{self, Write};

/// 错误行前后显示的上下文行数
const CONTEXT_LINES: usize = 5;

/// 打印错误；语法错误额外显示源代码上下文
pub fn print_error(e: &BundleError, host: &dyn VirtualFileSystem) {
    eprintln!("❌ {}", e);

    if let Some((path, line, column)) = e.parse_location() {
        if let Ok(source) = host.read_to_string(path) {
            let stderr = io::stderr();
            let _ = print_source_context(&mut stderr.lock(), &source, line, column);
        }
    }
}

/// 打印源代码上下文（显示错误行前后几行）
pub fn print_source_context<W: Write>(
    out: &mut W,
    source: &str,
    error_line: usize,
    error_col: usize,
) -> io::Result<()> {
    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len();

    if error_line == 0 || error_line > total_lines {
        return Ok(());
    }

    // 计算要显示的行范围
    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(total_lines);

    // 行号宽度用于对齐
    let width = end_line.to_string().len();
    let separator = "-".repeat(width + 1);
    writeln!(out, "{}|--", separator)?;

    for line_idx in start_line..=end_line {
        writeln!(out, "{:>width$} | {}", line_idx, lines[line_idx - 1], width = width)?;
        if line_idx == error_line {
            // 指向错误位置的标记
            let marker = " ".repeat(error_col.saturating_sub(1));
            writeln!(out, "{} | {}^", " ".repeat(width), marker)?;
        }
    }

    writeln!(out, "{}|--", separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str, line: usize, col: usize) -> String {
        let mut out = Vec::new();
        print_source_context(&mut out, source, line, col).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_context_marks_column() {
        let text = render("var a = 1;\nvar = ;\nvar c;", 2, 5);
        assert_eq!(
            text,
            "--|--\n1 | var a = 1;\n2 | var = ;\n  |     ^\n3 | var c;\n--|--\n"
        );
    }

    #[test]
    fn test_context_window_is_bounded() {
        let source: String = (1..=20).map(|i| format!("line{}\n", i)).collect();
        let text = render(&source, 10, 1);
        assert!(text.contains(" 5 | line5"));
        assert!(text.contains("15 | line15"));
        assert!(!text.contains("line4\n"));
        assert!(!text.contains("line16"));
    }

    #[test]
    fn test_out_of_range_prints_nothing() {
        assert_eq!(render("a;", 3, 1), "");
    }
}
