//! Audit listings of repaired ranges.
//!
//! Only used for logging; nothing in the sweep decides anything from the
//! rendered text.

use crate::db::{AnalysisDb, RenderOptions};
use crate::model::Address;

/// Text of `line` up to its comment, with trailing whitespace removed.
pub fn strip_comment(line: &str) -> &str {
    let code = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };
    code.trim_end()
}

/// Render `[start, end)` for a log dump, applying `options`.
pub fn render_listing<D: AnalysisDb + ?Sized>(
    db: &D,
    start: Address,
    end: Address,
    options: &RenderOptions,
) -> Vec<String> {
    db.render_lines(start, end)
        .into_iter()
        .filter(|line| line.primary || !options.only_instructions)
        .filter_map(|line| {
            let text =
                if options.strip_comments { strip_comment(&line.text) } else { line.text.as_str() };
            if options.skip_blank && text.trim().is_empty() {
                return None;
            }
            Some(if options.indent { format!("\t{text}") } else { text.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comment_cuts_at_semicolon() {
        assert_eq!(
            strip_comment("00401000    mov     eax, 1   ; init"),
            "00401000    mov     eax, 1"
        );
        assert_eq!(strip_comment("00401000    retn  "), "00401000    retn");
        assert_eq!(strip_comment("; banner"), "");
    }
}
