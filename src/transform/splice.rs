//! Text splicing helpers
//!
//! Rewriting never rebuilds source from the AST. A node's output is its
//! original text with the spans of some descendants replaced, so comments,
//! spacing and line breaks survive untouched.

use crate::parser::ast::Span;

/// Text of `span` in `source` with each `(span, replacement)` substituted.
///
/// Replacements must lie inside `span`, in order, without overlapping.
pub fn splice(source: &str, span: Span, replacements: &[(Span, String)]) -> String {
    let mut out = String::with_capacity(span.len());
    let mut cursor = span.start;
    for (part, text) in replacements {
        if part.start < cursor || part.end > span.end {
            continue;
        }
        out.push_str(&source[cursor..part.start]);
        out.push_str(text);
        cursor = part.end;
    }
    out.push_str(&source[cursor..span.end]);
    out
}

/// Keep only the line breaks of `text`, so removed code keeps its lines.
pub fn blank(text: &str) -> String {
    text.chars().filter(|&c| c == '\n').collect()
}

/// Wrap the listed lines of `text` in `open ... close`, counting the first
/// line of `text` as `first_line`. Lines whose braces or parentheses do not
/// balance are skipped and returned.
pub fn wrap_lines(text: &str, first_line: usize, lines: &[usize], open: &str, close: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(text.len());
    let mut skipped = Vec::new();

    for (offset, segment) in text.split('\n').enumerate() {
        if offset > 0 {
            out.push('\n');
        }
        let line = first_line + offset;
        if !lines.contains(&line) {
            out.push_str(segment);
            continue;
        }
        if !balanced(segment) {
            skipped.push(line);
            out.push_str(segment);
            continue;
        }

        let body = segment.strip_suffix('\r').unwrap_or(segment);
        let indent = body.len() - body.trim_start().len();
        out.push_str(&body[..indent]);
        out.push_str(open);
        out.push_str(&body[indent..]);
        out.push_str(close);
        if body.len() != segment.len() {
            out.push('\r');
        }
    }
    (out, skipped)
}

/// Braces and parentheses outside literals and comments pair up.
fn balanced(line: &str) -> bool {
    let mut depth_brace = 0i32;
    let mut depth_paren = 0i32;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                while let Some(d) = chars.next() {
                    if d == '\\' {
                        chars.next();
                    } else if d == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => break,
            '{' => depth_brace += 1,
            '}' => depth_brace -= 1,
            '(' => depth_paren += 1,
            ')' => depth_paren -= 1,
            _ => {}
        }
        if depth_brace < 0 || depth_paren < 0 {
            return false;
        }
    }
    depth_brace == 0 && depth_paren == 0
}
