//! Inline markup tokenizer and offset arithmetic.
//!
//! Block content is a small HTML-like inline markup: text interleaved with
//! tags such as `<strong>`, `<em>` and the `<br>` line break. Editing
//! surfaces talk about cursor positions in *visible* units, so every offset
//! in this module counts grapheme clusters of text, plus one for each line
//! break. Tags themselves are zero-width.
//!
//! ## Learning: Borrowed Tokens
//!
//! `tokenize` returns tokens that borrow slices of the input (`Token<'a>`).
//! Nothing is copied until a caller renders the tokens back into a `String`,
//! and the borrow checker guarantees the input outlives the tokens.

use unicode_segmentation::UnicodeSegmentation;

/// Tags that never have a closing counterpart.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

/// The line-break marker spliced in by a soft break.
pub const LINE_BREAK: &str = "<br>";

/// Whether a tag opens, closes, or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    Void,
}

/// A single markup tag, borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// The full tag text including angle brackets.
    pub raw: &'a str,
    /// Element name without attributes.
    pub name: &'a str,
    pub kind: TagKind,
}

impl<'a> Tag<'a> {
    /// Returns true if this is a line break.
    pub fn is_line_break(&self) -> bool {
        self.kind == TagKind::Void && self.name.eq_ignore_ascii_case("br")
    }

    /// Returns true if `other` closes this tag.
    fn is_closed_by(&self, other: &Tag<'_>) -> bool {
        other.kind == TagKind::Close && self.name.eq_ignore_ascii_case(other.name)
    }
}

/// One unit of tokenized content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A single grapheme cluster of visible text.
    Text(&'a str),
    /// A markup tag.
    Tag(Tag<'a>),
}

impl<'a> Token<'a> {
    /// Number of visible units this token occupies.
    pub fn width(&self) -> usize {
        match self {
            Token::Text(_) => 1,
            Token::Tag(tag) if tag.is_line_break() => 1,
            Token::Tag(_) => 0,
        }
    }

    /// Returns the raw source text of the token.
    pub fn as_str(&self) -> &'a str {
        match self {
            Token::Text(text) => text,
            Token::Tag(tag) => tag.raw,
        }
    }

    /// Returns true if this is a text token equal to `grapheme`.
    pub fn is_text(&self, grapheme: &str) -> bool {
        matches!(self, Token::Text(text) if *text == grapheme)
    }
}

/// Splits content into grapheme and tag tokens.
///
/// A `<` only starts a tag when it is followed by an optional `/`, an ASCII
/// letter, and a `>` before any other `<`. Anything else is literal text, so
/// tokenizing never fails.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        // '<' is ASCII, so it can never be a UTF-8 continuation byte.
        if bytes[i] == b'<' {
            if let Some(tag) = parse_tag(&input[i..]) {
                push_text(&mut tokens, &input[text_start..i]);
                i += tag.raw.len();
                tokens.push(Token::Tag(tag));
                text_start = i;
                continue;
            }
        }
        i += 1;
    }
    push_text(&mut tokens, &input[text_start..]);

    tokens
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, run: &'a str) {
    tokens.extend(run.graphemes(true).map(Token::Text));
}

fn parse_tag(s: &str) -> Option<Tag<'_>> {
    let end = s.find('>')?;
    if s[1..end].contains('<') {
        return None;
    }

    let raw = &s[..=end];
    let body = &raw[1..raw.len() - 1];
    let (closing, body) = match body.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    let name_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let name = &body[..name_len];
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let kind = if closing {
        TagKind::Close
    } else if body.trim_end().ends_with('/')
        || VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(name))
    {
        TagKind::Void
    } else {
        TagKind::Open
    };

    Some(Tag { raw, name, kind })
}

/// Concatenates tokens back into a string.
pub fn render(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(Token::as_str).collect()
}

/// Returns the number of visible units in `content`.
pub fn visible_len(content: &str) -> usize {
    tokenize(content).iter().map(Token::width).sum()
}

/// Returns the visible text with tags stripped and line breaks as `\n`.
pub fn plain_text(content: &str) -> String {
    tokenize(content)
        .iter()
        .filter_map(|token| match token {
            Token::Text(text) => Some(*text),
            Token::Tag(tag) if tag.is_line_break() => Some("\n"),
            Token::Tag(_) => None,
        })
        .collect()
}

/// Returns the visible offsets at which line breaks sit.
///
/// A break at offset `n` separates the units before `n` from those after it.
pub fn line_breaks(content: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut seen = 0;
    for token in tokenize(content) {
        if matches!(token, Token::Tag(tag) if tag.is_line_break()) {
            offsets.push(seen);
        }
        seen += token.width();
    }
    offsets
}

/// Returns true if every opening tag is closed in order.
pub fn is_balanced(content: &str) -> bool {
    tokens_balanced(&tokenize(content))
}

/// Balance check over an already-tokenized slice.
pub fn tokens_balanced(tokens: &[Token<'_>]) -> bool {
    let mut stack: Vec<&Tag<'_>> = Vec::new();
    for token in tokens {
        if let Token::Tag(tag) = token {
            match tag.kind {
                TagKind::Open => stack.push(tag),
                TagKind::Close => match stack.pop() {
                    Some(open) if open.is_closed_by(tag) => {}
                    _ => return false,
                },
                TagKind::Void => {}
            }
        }
    }
    stack.is_empty()
}

/// Tracks open tags while walking a token stream.
fn track<'a>(stack: &mut Vec<Tag<'a>>, token: &Token<'a>) {
    if let Token::Tag(tag) = token {
        match tag.kind {
            TagKind::Open => stack.push(*tag),
            TagKind::Close => {
                if let Some(pos) = stack.iter().rposition(|open| open.is_closed_by(tag)) {
                    stack.remove(pos);
                }
            }
            TagKind::Void => {}
        }
    }
}

/// Splits content at a visible offset.
///
/// Tags open at the split point are closed at the end of the left half and
/// reopened at the start of the right half, so balanced input yields two
/// balanced halves. Closing tags directly at the boundary stay on the left
/// and opening tags stay on the right. Offsets past the end are clamped.
pub fn split_at(content: &str, offset: usize) -> (String, String) {
    let tokens = tokenize(content);
    let mut stack = Vec::new();
    let mut seen = 0;
    let mut idx = 0;

    while let Some(token) = tokens.get(idx) {
        let closes = matches!(token, Token::Tag(tag) if tag.kind == TagKind::Close);
        if seen >= offset && !closes {
            break;
        }
        track(&mut stack, token);
        seen += token.width();
        idx += 1;
    }

    let mut left = render(&tokens[..idx]);
    for tag in stack.iter().rev() {
        left.push_str("</");
        left.push_str(tag.name);
        left.push('>');
    }

    let mut right: String = stack.iter().map(|tag| tag.raw).collect();
    right.push_str(&render(&tokens[idx..]));

    (left, right)
}

/// Inserts `fragment` at a visible offset, inside any formatting open there.
pub fn insert_at(content: &str, offset: usize, fragment: &str) -> String {
    let tokens = tokenize(content);
    let mut seen = 0;
    let mut idx = 0;

    while let Some(token) = tokens.get(idx) {
        if seen >= offset {
            break;
        }
        seen += token.width();
        idx += 1;
    }

    let mut out = render(&tokens[..idx]);
    out.push_str(fragment);
    out.push_str(&render(&tokens[idx..]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("a<strong>b</strong>");
        assert_eq!(tokens.len(), 4);
        assert!(tokens[0].is_text("a"));
        assert!(matches!(tokens[1], Token::Tag(Tag { name: "strong", kind: TagKind::Open, .. })));
        assert!(matches!(tokens[3], Token::Tag(Tag { kind: TagKind::Close, .. })));
    }

    #[test]
    fn test_literal_angle_brackets() {
        assert_eq!(visible_len("1 < 2 > 0"), 9);
        assert_eq!(visible_len("a <3"), 4);
        assert!(is_balanced("x < y"));
    }

    #[test]
    fn test_graphemes_are_single_units() {
        assert_eq!(visible_len("e\u{301}"), 1);
        assert_eq!(visible_len("👍🏽ok"), 3);
    }

    #[test]
    fn test_line_break_counts_as_one() {
        assert_eq!(visible_len("a<br>b"), 3);
        assert_eq!(plain_text("a<br>b"), "a\nb");
    }

    #[test]
    fn test_balance() {
        assert!(is_balanced("<em>a<strong>b</strong></em>"));
        assert!(!is_balanced("<em>a<strong>b</em></strong>"));
        assert!(!is_balanced("<em>a"));
        assert!(!is_balanced("a</em>"));
    }

    #[test]
    fn test_split_plain() {
        assert_eq!(split_at("ABCD", 2), ("AB".to_string(), "CD".to_string()));
        assert_eq!(split_at("ABCD", 0), (String::new(), "ABCD".to_string()));
        assert_eq!(split_at("ABCD", 9), ("ABCD".to_string(), String::new()));
    }

    #[test]
    fn test_split_inside_formatting_rebalances() {
        let (left, right) = split_at("x<strong>AB</strong>y", 2);
        assert_eq!(left, "x<strong>A</strong>");
        assert_eq!(right, "<strong>B</strong>y");
        assert!(is_balanced(&left));
        assert!(is_balanced(&right));
    }

    #[test]
    fn test_split_at_span_edges() {
        let (left, right) = split_at("<em>AB</em>CD", 2);
        assert_eq!(left, "<em>AB</em>");
        assert_eq!(right, "CD");

        let (left, right) = split_at("AB<em>CD</em>", 2);
        assert_eq!(left, "AB");
        assert_eq!(right, "<em>CD</em>");
    }

    #[test]
    fn test_insert_line_break() {
        assert_eq!(insert_at("AB", 1, LINE_BREAK), "A<br>B");
        assert_eq!(insert_at("<em>AB</em>", 1, LINE_BREAK), "<em>A<br>B</em>");
        assert_eq!(insert_at("AB", 5, LINE_BREAK), "AB<br>");
    }

    #[test]
    fn test_line_breaks_report_visible_offsets() {
        assert!(line_breaks("plain").is_empty());
        assert_eq!(line_breaks("ab<br>c<strong>d<br></strong>"), vec![2, 5]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn segment() -> impl Strategy<Value = String> {
            prop_oneof![
                "[a-z ]{1,6}",
                "[a-z]{1,4}".prop_map(|w| format!("<em>{w}</em>")),
                "[a-z]{1,4}".prop_map(|w| format!("<strong>x<em>{w}</em></strong>")),
                Just(LINE_BREAK.to_string()),
            ]
        }

        fn content() -> impl Strategy<Value = String> {
            prop::collection::vec(segment(), 0..8).prop_map(|parts| parts.concat())
        }

        proptest! {
            #[test]
            fn split_preserves_text_and_balance(content in content(), offset in 0usize..40) {
                let (left, right) = split_at(&content, offset);
                prop_assert!(is_balanced(&left));
                prop_assert!(is_balanced(&right));
                prop_assert_eq!(visible_len(&left), offset.min(visible_len(&content)));
                prop_assert_eq!(
                    format!("{}{}", plain_text(&left), plain_text(&right)),
                    plain_text(&content)
                );
            }

            #[test]
            fn insert_adds_one_visible_unit(content in content(), offset in 0usize..40) {
                let inserted = insert_at(&content, offset, LINE_BREAK);
                prop_assert!(is_balanced(&inserted));
                prop_assert_eq!(visible_len(&inserted), visible_len(&content) + 1);
            }
        }
    }
}
