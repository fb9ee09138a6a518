//! Lexer output for one file: tokens, trivia, identifier table, line table.

use std::sync::Arc;

use crate::core::{FileRef, TokenRef};
use crate::lexer::token::{Token, TokenId};

/// Identifier-table row. `byte_start` is the real byte offset of the
/// identifier in the source; `crc` is precomputed at lex time.
#[derive(Copy, Clone, Debug)]
pub struct IdentifierEntry {
    pub byte_start: u32,
    pub byte_len: u32,
    pub crc: u32,
}

/// A comment or blank run, kept out of the token array.
#[derive(Copy, Clone, Debug)]
pub struct SourceTrivia {
    pub tok: Token,
}

/// 1-based line/column position of a byte span.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Owns one file's token array, trivia, identifier table and line table.
pub struct SourceView {
    file: FileRef,
    source: Arc<str>,
    tokens: Vec<Token>,
    trivia: Vec<SourceTrivia>,
    identifiers: Vec<IdentifierEntry>,
    line_starts: Vec<u32>,
    must_skip: bool,
}

impl SourceView {
    pub(crate) fn new(
        file: FileRef,
        source: Arc<str>,
        tokens: Vec<Token>,
        trivia: Vec<SourceTrivia>,
        identifiers: Vec<IdentifierEntry>,
        line_starts: Vec<u32>,
    ) -> Self {
        Self {
            file,
            source,
            tokens,
            trivia,
            identifiers,
            line_starts,
            must_skip: false,
        }
    }

    pub fn file_ref(&self) -> FileRef {
        self.file
    }

    pub fn string_view(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn token(&self, tok: TokenRef) -> &Token {
        &self.tokens[tok.index()]
    }

    pub fn identifiers(&self) -> &[IdentifierEntry] {
        &self.identifiers
    }

    pub fn trivia(&self) -> &[SourceTrivia] {
        &self.trivia
    }

    pub fn line_table(&self) -> &[u32] {
        &self.line_starts
    }

    /// Lex-only mode, set from a `swc-option` directive.
    pub fn set_must_skip(&mut self, v: bool) {
        self.must_skip = v;
    }

    pub fn must_skip(&self) -> bool {
        self.must_skip
    }

    /// Byte span of a token, resolving the identifier-table indirection.
    pub fn token_span(&self, tok: &Token) -> (u32, u32) {
        if tok.id == TokenId::Identifier {
            let entry = self.identifiers[tok.byte_start as usize];
            (entry.byte_start, entry.byte_len)
        } else {
            (tok.byte_start, tok.byte_len)
        }
    }

    pub fn token_text(&self, tok_ref: TokenRef) -> &str {
        let tok = self.token(tok_ref);
        let (start, len) = self.token_span(tok);
        &self.source[start as usize..(start + len) as usize]
    }

    pub fn token_crc(&self, tok_ref: TokenRef) -> u32 {
        let tok = self.token(tok_ref);
        debug_assert_eq!(tok.id, TokenId::Identifier);
        self.identifiers[tok.byte_start as usize].crc
    }

    pub fn trivia_text(&self, trivia: &SourceTrivia) -> &str {
        let start = trivia.tok.byte_start as usize;
        &self.source[start..start + trivia.tok.byte_len as usize]
    }

    /// 1-based line/column of a byte offset, by binary search over the line
    /// table.
    pub fn line_col(&self, byte: u32) -> LineCol {
        let line_idx = match self.line_starts.binary_search(&byte) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_idx).copied().unwrap_or(0);
        LineCol {
            line: line_idx as u32 + 1,
            col: byte - line_start + 1,
        }
    }

    pub fn token_line_col(&self, tok_ref: TokenRef) -> LineCol {
        let tok = self.token(tok_ref);
        let (start, _) = self.token_span(tok);
        self.line_col(start)
    }

    /// Scans right from `from` for the first token with one of the given ids.
    /// Returns `from` itself when nothing matches, so diagnostics still point
    /// somewhere sensible.
    pub fn find_right_from(&self, from: TokenRef, ids: &[TokenId]) -> TokenRef {
        for (i, tok) in self.tokens.iter().enumerate().skip(from.index()) {
            if ids.contains(&tok.id) {
                return TokenRef::new(i as u32);
            }
        }
        from
    }
}
