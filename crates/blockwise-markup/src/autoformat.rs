//! Markdown-style inline autoformatting.
//!
//! Converts delimiter pairs typed by the user into markup:
//!
//! | Typed      | Markup                |
//! |------------|-----------------------|
//! | `**x**`    | `<strong>x</strong>`  |
//! | `*x*`      | `<em>x</em>`          |
//! | `~~x~~`    | `<s>x</s>`            |
//! | `` `x` ``  | `<code>x</code>`      |
//!
//! Rules run in that order. A match never straddles a span produced earlier
//! (its inner tokens must be tag-balanced) and an empty span never matches.
//! Unterminated delimiters stay literal.
//!
//! ## Learning: Pure Functions
//!
//! `Autoformatter::format` takes `&self` and a `&str` and returns a new value.
//! It owns no mutable state, so it is trivially safe to share and to test,
//! and calling it twice can be reasoned about without any setup.

use crate::markup::{self, Tag, TagKind, Token};

/// Inline styles the autoformatter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineStyle {
    Bold,
    Italic,
    Strikethrough,
    Code,
}

impl InlineStyle {
    /// Element name used in markup.
    pub fn tag_name(&self) -> &'static str {
        match self {
            InlineStyle::Bold => "strong",
            InlineStyle::Italic => "em",
            InlineStyle::Strikethrough => "s",
            InlineStyle::Code => "code",
        }
    }

    fn open_tag(&self) -> Tag<'static> {
        let raw = match self {
            InlineStyle::Bold => "<strong>",
            InlineStyle::Italic => "<em>",
            InlineStyle::Strikethrough => "<s>",
            InlineStyle::Code => "<code>",
        };
        Tag {
            raw,
            name: self.tag_name(),
            kind: TagKind::Open,
        }
    }

    fn close_tag(&self) -> Tag<'static> {
        let raw = match self {
            InlineStyle::Bold => "</strong>",
            InlineStyle::Italic => "</em>",
            InlineStyle::Strikethrough => "</s>",
            InlineStyle::Code => "</code>",
        };
        Tag {
            raw,
            name: self.tag_name(),
            kind: TagKind::Close,
        }
    }
}

/// A delimiter pair rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub style: InlineStyle,
    /// Delimiter graphemes, e.g. `["*", "*"]` for bold.
    delimiter: Vec<&'static str>,
    /// A delimiter touching this grapheme on either side does not count.
    excluded_neighbor: Option<&'static str>,
}

impl Rule {
    /// Creates a rule from an ASCII delimiter.
    pub fn new(style: InlineStyle, delimiter: &'static str) -> Self {
        let delimiter = delimiter
            .char_indices()
            .map(|(i, c)| &delimiter[i..i + c.len_utf8()])
            .collect();
        Self {
            style,
            delimiter,
            excluded_neighbor: None,
        }
    }

    /// Rejects delimiters adjacent to `grapheme`.
    pub fn excluding_neighbor(mut self, grapheme: &'static str) -> Self {
        self.excluded_neighbor = Some(grapheme);
        self
    }

    fn delimiter_at(&self, tokens: &[Token<'_>], at: usize) -> bool {
        let len = self.delimiter.len();
        if at + len > tokens.len() {
            return false;
        }
        let matches = self
            .delimiter
            .iter()
            .zip(&tokens[at..at + len])
            .all(|(d, token)| token.is_text(d));
        if !matches {
            return false;
        }

        match self.excluded_neighbor {
            Some(neighbor) => {
                let before = at.checked_sub(1).and_then(|i| tokens.get(i));
                let after = tokens.get(at + len);
                !before.is_some_and(|t| t.is_text(neighbor))
                    && !after.is_some_and(|t| t.is_text(neighbor))
            }
            None => true,
        }
    }

    fn find_close(&self, tokens: &[Token<'_>], open: usize) -> Option<usize> {
        let inner_start = open + self.delimiter.len();
        (inner_start + 1..tokens.len()).find(|&at| {
            self.delimiter_at(tokens, at) && markup::tokens_balanced(&tokens[inner_start..at])
        })
    }

    /// Applies this rule left to right over the token stream.
    fn apply<'a>(&self, tokens: Vec<Token<'a>>) -> (Vec<Token<'a>>, bool) {
        let len = self.delimiter.len();
        let mut out = Vec::with_capacity(tokens.len() + 2);
        let mut changed = false;
        let mut i = 0;

        while i < tokens.len() {
            if self.delimiter_at(&tokens, i) {
                if let Some(close) = self.find_close(&tokens, i) {
                    out.push(Token::Tag(self.style.open_tag()));
                    out.extend_from_slice(&tokens[i + len..close]);
                    out.push(Token::Tag(self.style.close_tag()));
                    i = close + len;
                    changed = true;
                    continue;
                }
            }
            out.push(tokens[i]);
            i += 1;
        }

        (out, changed)
    }
}

/// Result of an autoformat pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOutcome {
    pub converted: String,
    pub changed: bool,
}

/// Ordered set of autoformat rules.
#[derive(Debug, Clone)]
pub struct Autoformatter {
    rules: Vec<Rule>,
}

impl Autoformatter {
    /// Creates the standard bold/italic/strikethrough/code formatter.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Rule::new(InlineStyle::Bold, "**"),
                Rule::new(InlineStyle::Italic, "*").excluding_neighbor("*"),
                Rule::new(InlineStyle::Strikethrough, "~~"),
                Rule::new(InlineStyle::Code, "`"),
            ],
        }
    }

    /// Creates a formatter with custom rules, applied in order.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Returns the rules in precedence order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Converts delimiter pairs in `content` into markup.
    pub fn format(&self, content: &str) -> FormatOutcome {
        let mut tokens = markup::tokenize(content);
        let mut changed = false;

        // Every conversion removes delimiters, so this reaches a fixed point.
        loop {
            let mut round_changed = false;
            for rule in &self.rules {
                let (next, rule_changed) = rule.apply(tokens);
                tokens = next;
                round_changed |= rule_changed;
            }
            if !round_changed {
                break;
            }
            changed = true;
        }

        if changed {
            tracing::trace!(before = content, "autoformat converted content");
        }

        FormatOutcome {
            converted: markup::render(&tokens),
            changed,
        }
    }
}

impl Default for Autoformatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats `content` with the standard rules.
pub fn format(content: &str) -> FormatOutcome {
    Autoformatter::new().format(content)
}
