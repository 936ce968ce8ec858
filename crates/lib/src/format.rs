//! Reply text layout: answer text, a related-links header, then one bullet per cited result.

use crate::answer::{AnswerResult, MAX_CITED_RESULTS};

/// Header line introducing the cited links ("the following are related links").
pub const RELATED_LINKS_HEADER: &str = "以下是相關網址：";

/// Render `result` as a plain-text reply. The header is always present; only the cited
/// results actually present are listed under it.
pub fn format_reply(result: &AnswerResult) -> String {
    let mut out = result.answer_text.clone();
    out.push('\n');
    out.push_str(RELATED_LINKS_HEADER);
    out.push('\n');
    for link in result.cited_results.iter().take(MAX_CITED_RESULTS) {
        out.push_str("\n* ");
        out.push_str(&link.title);
        out.push_str("\n  ");
        out.push_str(&link.uri);
        out.push('\n');
    }
    out.trim_end().to_string()
}
