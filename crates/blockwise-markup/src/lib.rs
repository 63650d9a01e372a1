//! # Blockwise Markup
//!
//! Inline rich-text markup for block content: a tokenizer that understands
//! the tags block content carries, grapheme-based offset arithmetic used for
//! cursor positions, and the markdown-style autoformatter.
//!
//! ## Why Graphemes?
//!
//! A user-visible "character" can be several Unicode scalar values
//! (`e` + combining accent, emoji with skin tone). Counting grapheme
//! clusters keeps cursor offsets aligned with what the user sees:
//! - **Splits** never cut a character in half
//! - **Offsets** survive round trips through any rendering surface

pub mod autoformat;
pub mod markup;

pub use autoformat::{format, Autoformatter, FormatOutcome, InlineStyle, Rule};
pub use markup::{
    LINE_BREAK, insert_at, is_balanced, line_breaks, plain_text, split_at, tokenize, visible_len,
};
