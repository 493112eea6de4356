//! Line patterns recognised while rebuilding page text
//!
//! Lists are kept one item per line when spoken, so the normalizer needs to
//! know which lines open a list item.

use once_cell::sync::Lazy;
use regex::Regex;

/// Bullet glyph followed by whitespace ("- item", "• item", "▸ item")
pub static BULLET_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-•*▪▸►]\s").expect("bullet pattern is valid"));

/// Numbered item: "1. item", "12) item", "3: item"
pub static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+[.):]\s").expect("numbered pattern is valid"));

/// Lettered item: "a. item", "B) item", "c: item"
pub static LETTERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][.):]\s").expect("lettered pattern is valid"));

/// Runs of two or more plain spaces
pub static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("space pattern is valid"));

/// Runs of three or more line breaks
pub static BREAK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("break pattern is valid"));

/// Does this (trimmed) line open a list item?
pub fn is_list_item(line: &str) -> bool {
    BULLET_ITEM.is_match(line) || NUMBERED_ITEM.is_match(line) || LETTERED_ITEM.is_match(line)
}

/// Does this line end a sentence or clause?
pub fn ends_with_terminal(line: &str) -> bool {
    line.ends_with(&['.', '!', '?', ':'][..])
}
