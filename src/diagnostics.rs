//! Fatal-on-first diagnostic reporting.
//!
//! The parser and lowering pass never attempt recovery: the first `Diagnostic`
//! produced by any stage is propagated with `?` all the way back to the
//! driver, rendered to stderr, and the process exits nonzero. There is no
//! warning channel.

use colored::Colorize;
use std::fmt;

use crate::pos::{Pos, Span};

/// A single fatal compiler error, optionally anchored to a source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub site: Option<Span>,
}

impl Diagnostic {
    /// An error with no useful source position (I/O errors, internal faults).
    pub fn simple(message: impl Into<String>) -> Self {
        Diagnostic { message: message.into(), site: None }
    }

    /// An error anchored to a single point in the source.
    pub fn at(message: impl Into<String>, pos: Pos) -> Self {
        Diagnostic { message: message.into(), site: Some(Span::point(pos)) }
    }

    /// An error anchored to a caret-underlined span in the source.
    pub fn spanning(message: impl Into<String>, span: Span) -> Self {
        Diagnostic { message: message.into(), site: Some(span) }
    }

    /// Render against the file name and the already-buffered source lines,
    /// matching:
    /// ```text
    /// error: <msg>
    ///   --> <file>:<row+1>:<col+1>[-<col+span_len>]
    ///    | <source line>
    ///    | <tildes><carets><tildes>
    /// ```
    pub fn render(&self, file: &str, lines: &[String]) -> String {
        let mut out = format!("{} {}\n", "error:".red().bold(), self.message);
        let Some(span) = self.site else {
            return out;
        };
        let row = span.pos.row;
        let col = span.pos.col;
        if span.len > 1 {
            out += &format!(
                "  --> {}:{}:{}-{}\n",
                file,
                row + 1,
                col + 1,
                col + span.len
            );
        } else {
            out += &format!("  --> {}:{}:{}\n", file, row + 1, col + 1);
        }
        let raw_line = lines.get(row).map(String::as_str).unwrap_or_default();
        let chars: Vec<char> = raw_line.chars().collect();
        let (line, indent, p) = match chars.iter().position(|c| !c.is_whitespace()) {
            Some(begin) => {
                let end = chars.iter().rposition(|c| !c.is_whitespace()).unwrap() + 1;
                let trimmed: String = chars[begin..end].iter().collect();
                (trimmed, begin, col.saturating_sub(begin))
            }
            None => (raw_line.to_string(), 0, col),
        };
        let len = line.chars().count().max(p + span.len);
        let indent = " ".repeat(indent);
        let tilde_before = "~".repeat(p);
        let carets = "^".repeat(span.len).red().bold();
        let tilde_after = "~".repeat(len - span.len - p);
        out += &format!("   | {indent}{line}\n");
        out += &format!("   | {indent}{tilde_before}{carets}{tilde_after}\n");
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_rebases_onto_the_trimmed_line() {
        // column 8 lands on the "foo" in "    var foo"; the leading 4-space
        // indent is preserved verbatim (not stripped from the rendered
        // line), so the caret run must account for it via tildes rather
        // than assuming the trimmed line starts at column 0.
        let d = Diagnostic::spanning("bad thing", Span::new(Pos::new(0, 8), 3));
        let rendered = d.render("f.anx", &["    var foo".to_string()]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[2], "   |     var foo");
        assert!(lines[3].starts_with("   |     ~~~~"));
        assert!(lines[3].contains("^^^"));
    }

    #[test]
    fn untrimmed_line_leaves_caret_at_the_raw_column() {
        let d = Diagnostic::spanning("bad thing", Span::point(Pos::new(0, 2)));
        let rendered = d.render("f.anx", &["xyz".to_string()]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[2], "   | xyz");
        assert!(lines[3].starts_with("   | ~~"));
    }
}
