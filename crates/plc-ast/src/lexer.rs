//! The token buffer and lookahead cursor.
//!
//! Tokens are produced lazily, one at a time, from the underlying
//! [`logos`] scanner and classified the moment they are pulled into the
//! buffer. Because declarations are always bound into the classifier
//! before their first subsequent use, classifying at production time and
//! classifying "on advance" coincide for any grammar this parser accepts.

use logos::Logos;

use crate::span::Span;
use crate::token::Token;
use crate::token::TokenKind;

/// What a name resolves to, as reported by a [`NameClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClass {
    /// The name is a reserved keyword; its token should be rewritten to the
    /// given kind.
    Keyword(TokenKind),
    /// The name resolves in the type namespace of the current lexical
    /// context; its token should be rewritten to [`TokenKind::TypeIdentifier`].
    Type,
}

/// A read-only hook consulted when pulling a new token to retroactively
/// reclassify identifiers.
///
/// This is the only coupling between lexing and scopes: the token buffer
/// never mutates anything through this trait, it only asks "what is `name`
/// right now?". The parser keeps its own minimal implementation (a stack of
/// declared type names) purely to resolve this lexical ambiguity; the
/// authoritative scope graph built by the name-declaration pass (in
/// `plc-analysis`) is a separate, independent structure derived from the
/// finished AST.
pub trait NameClassifier {
    /// Classifies `name` in the classifier's current lexical context.
    ///
    /// Returns `None` if `name` is an ordinary (unbound) identifier.
    fn classify(&self, name: &str) -> Option<NameClass>;
}

/// A [`NameClassifier`] that only ever recognizes the fixed keyword table.
///
/// Useful for tests and for any caller that does not need type-identifier
/// disambiguation (e.g. tokenizing a fragment in isolation).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordsOnly;

impl NameClassifier for KeywordsOnly {
    fn classify(&self, name: &str) -> Option<NameClass> {
        TokenKind::keyword_for(name).map(NameClass::Keyword)
    }
}

/// Error produced by the token buffer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// The cursor was advanced past the end of input.
    #[error("unexpected end of input")]
    UnexpectedEoi,
}

/// A mutable cursor over a lazily-produced, classified token stream.
pub struct TokenBuffer<'a> {
    lexer: logos::Lexer<'a, TokenKind>,
    buf: Vec<Token>,
    pos: usize,
    line: u32,
    line_start: usize,
    exhausted: bool,
}

impl<'a> TokenBuffer<'a> {
    /// Constructs a new token buffer over `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: TokenKind::lexer(source),
            buf: Vec::new(),
            pos: 0,
            line: 1,
            line_start: 0,
            exhausted: false,
        }
    }

    /// Pulls and classifies one more token from the underlying scanner,
    /// transparently skipping comments. Returns `false` once end-of-input
    /// has already been produced.
    fn pull(&mut self, classifier: &mut dyn NameClassifier) -> bool {
        if self.exhausted {
            return false;
        }
        loop {
            match self.lexer.next() {
                None => {
                    self.buf.push(Token {
                        kind: TokenKind::EndOfInput,
                        text: String::new(),
                        line: self.line,
                        column: (self.lexer.span().end - self.line_start + 1) as u32,
                    });
                    self.exhausted = true;
                    return true;
                }
                Some(result) => {
                    let span = self.lexer.span();
                    let text = &self.lexer.source()[span.clone()];
                    let column = (span.start - self.line_start + 1) as u32;
                    let line = self.line;

                    let kind = match result {
                        Ok(TokenKind::Comment) => {
                            self.track_lines(text, span.start);
                            continue;
                        }
                        Ok(TokenKind::Identifier) => match classifier.classify(text) {
                            Some(NameClass::Keyword(kw)) => kw,
                            Some(NameClass::Type) => TokenKind::TypeIdentifier,
                            None => TokenKind::Identifier,
                        },
                        Ok(other) => other,
                        Err(()) => TokenKind::Identifier,
                    };

                    self.buf.push(Token {
                        kind,
                        text: text.to_string(),
                        line,
                        column,
                    });
                    self.track_lines(text, span.start);
                    return true;
                }
            }
        }
    }

    /// Updates `line`/`line_start` for every newline contained in `text`.
    fn track_lines(&mut self, text: &str, start_offset: usize) {
        for (i, ch) in text.char_indices() {
            if ch == '\n' {
                self.line += 1;
                self.line_start = start_offset + i + 1;
            }
        }
    }

    /// Ensures the buffer holds at least `idx + 1` tokens.
    fn ensure(&mut self, idx: usize, classifier: &mut dyn NameClassifier) {
        while self.buf.len() <= idx {
            if !self.pull(classifier) {
                break;
            }
        }
    }

    /// Returns the current token without consuming it.
    pub fn current(&mut self, classifier: &mut dyn NameClassifier) -> &Token {
        self.ensure(self.pos, classifier);
        let idx = self.pos.min(self.buf.len() - 1);
        &self.buf[idx]
    }

    /// Returns the span of the current token.
    pub fn span(&mut self, classifier: &mut dyn NameClassifier) -> Span {
        let t = self.current(classifier);
        Span::new(t.line, t.column)
    }

    /// Looks `n` tokens ahead (`n >= 1`) without consuming anything.
    ///
    /// Returns the end-of-input token if the lookahead runs past the end.
    pub fn peek(&mut self, n: usize, classifier: &mut dyn NameClassifier) -> &Token {
        debug_assert!(n >= 1);
        self.ensure(self.pos + n, classifier);
        let idx = (self.pos + n).min(self.buf.len() - 1);
        &self.buf[idx]
    }

    /// Consumes and returns the current token, advancing the cursor.
    ///
    /// Fails with [`LexError::UnexpectedEoi`] if the cursor is already
    /// sitting on end-of-input.
    pub fn advance(&mut self, classifier: &mut dyn NameClassifier) -> Result<Token, LexError> {
        self.ensure(self.pos, classifier);
        let idx = self.pos.min(self.buf.len() - 1);
        if self.buf[idx].kind == TokenKind::EndOfInput {
            return Err(LexError::UnexpectedEoi);
        }
        let tok = self.buf[self.pos].clone();
        self.pos += 1;
        Ok(tok)
    }

    /// Whether the cursor is sitting on end-of-input.
    pub fn at_eoi(&mut self, classifier: &mut dyn NameClassifier) -> bool {
        self.current(classifier).kind == TokenKind::EndOfInput
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds_of(source: &str) -> Vec<TokenKind> {
        let mut buf = TokenBuffer::new(source);
        let mut classifier = KeywordsOnly;
        let mut kinds = Vec::new();
        loop {
            let tok = buf.advance(&mut classifier);
            match tok {
                Ok(t) => kinds.push(t.kind),
                Err(_) => {
                    kinds.push(TokenKind::EndOfInput);
                    break;
                }
            }
        }
        kinds
    }

    #[test]
    fn tokenizes_keywords_and_identifiers() {
        assert_eq!(
            kinds_of("parser P() { }"),
            vec![
                TokenKind::Parser,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let mut buf = TokenBuffer::new("a\nbb");
        let mut classifier = KeywordsOnly;
        let first = buf.advance(&mut classifier).unwrap();
        assert_eq!((first.line, first.column), (1, 1));
        let second = buf.advance(&mut classifier).unwrap();
        assert_eq!((second.line, second.column), (2, 1));
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds_of("a // comment\nb"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::EndOfInput]
        );
    }

    #[test]
    fn advance_past_eoi_fails() {
        let mut buf = TokenBuffer::new("");
        let mut classifier = KeywordsOnly;
        buf.advance(&mut classifier).unwrap();
        assert_eq!(buf.advance(&mut classifier), Err(LexError::UnexpectedEoi));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buf = TokenBuffer::new("a b");
        let mut classifier = KeywordsOnly;
        assert_eq!(buf.peek(1, &mut classifier).kind, TokenKind::Identifier);
        let first = buf.advance(&mut classifier).unwrap();
        assert_eq!(first.text, "a");
        assert_eq!(buf.current(&mut classifier).text, "b");
    }
}
