//! Page text normalization
//!
//! Text extracted from a page keeps the physical line wrapping of the
//! layout. Speech sounds natural only when wrapped sentences are rejoined,
//! so each line break is either kept (paragraphs, headings, list items) or
//! replaced by a space, or dropped entirely when a word was hyphenated
//! across the wrap.

use super::patterns::{ends_with_terminal, is_list_item, BREAK_RUN, SPACE_RUN};

/// Lines shorter than this that don't end in a comma are treated as
/// headings or labels and keep their line break.
pub const SHORT_LINE_CHARS: usize = 50;

/// How a line is joined to the one after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    /// Keep a line break
    Break,
    /// Wrapped prose: join with a single space
    Space,
    /// Hyphenated word: drop the hyphen and join with nothing
    Glue,
}

/// Convert raw page text into speech-friendly text
///
/// Pure and deterministic. Normalizing already-normalized text returns it
/// unchanged. An empty result means the page has nothing to speak.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = unified.split('\n').map(clean_line).collect();
    let last = lines.len().saturating_sub(1);

    let mut out = String::with_capacity(raw.len());
    // Byte offset in `out` where the line currently being rebuilt starts
    let mut logical_start = 0;

    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            out.push_str("\n\n");
            logical_start = out.len();
            continue;
        }

        out.push_str(line);
        if i == last {
            break;
        }

        let next = lines[i + 1].as_str();
        match decide(line, next, &out[logical_start..]) {
            Join::Break => {
                out.push('\n');
                logical_start = out.len();
            }
            Join::Space => out.push(' '),
            Join::Glue => {
                out.pop();
            }
        }
    }

    let out = SPACE_RUN.replace_all(&out, " ");
    let out = BREAK_RUN.replace_all(&out, "\n\n");
    out.trim().to_string()
}

/// Trim a physical line and squeeze its inner spaces
fn clean_line(line: &str) -> String {
    SPACE_RUN.replace_all(line.trim(), " ").into_owned()
}

/// Ordered break policy for the non-empty `line` followed by `next`
///
/// `logical` is everything rebuilt since the last kept break, ending with
/// `line`; the short-line rule measures it rather than the last fragment.
fn decide(line: &str, next: &str, logical: &str) -> Join {
    if next.is_empty() || is_list_item(line) || is_list_item(next) {
        return Join::Break;
    }

    if line.ends_with('-') {
        // Rejoining must not forge a list marker at the start of the line
        let rebuilt = format!("{}{}", &logical[..logical.len() - 1], next);
        if !is_list_item(&rebuilt) {
            return Join::Glue;
        }
        return Join::Break;
    }

    if ends_with_terminal(line) {
        return Join::Break;
    }

    if logical.chars().count() < SHORT_LINE_CHARS && !line.ends_with(',') {
        return Join::Break;
    }

    Join::Space
}
