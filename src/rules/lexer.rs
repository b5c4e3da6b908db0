//! Tokenizer for a single rule line.
use std::ops::Range;

/// Token categories produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of non-whitespace characters (type keyword or path fragment).
    Word,
    /// The `->` separator, recognised even without surrounding whitespace.
    Arrow,
    /// A word starting with `@` (platform tag).
    Platform,
}

/// A token borrowed from the line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token category.
    pub kind: TokenKind,
    /// Exact text of the token.
    pub text: &'a str,
    /// Byte range of the token within the line.
    pub span: Range<usize>,
}

/// Split a line into tokens.
///
/// Whitespace separates words; `->` is always its own token.  Spans let the
/// parser slice multi-word paths out of the original line unchanged.
#[must_use]
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = line.as_bytes();
    let mut pos = 0;

    while pos < line.len() {
        let rest = &line[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if rest.starts_with("->") {
            tokens.push(Token {
                kind: TokenKind::Arrow,
                text: &line[pos..pos + 2],
                span: pos..pos + 2,
            });
            pos += 2;
            continue;
        }

        let start = pos;
        while pos < line.len() {
            let rest = &line[pos..];
            let Some(c) = rest.chars().next() else {
                break;
            };
            if c.is_whitespace() || rest.starts_with("->") {
                break;
            }
            pos += c.len_utf8();
        }
        let kind = if bytes.get(start) == Some(&b'@') {
            TokenKind::Platform
        } else {
            TokenKind::Word
        };
        tokens.push(Token {
            kind,
            text: &line[start..pos],
            span: start..pos,
        });
    }

    tokens
}
