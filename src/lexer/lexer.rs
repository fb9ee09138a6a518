//! Byte-based tokenizer producing the `SourceView` shape consumed by the
//! parser and the semantic analyzer.

use std::sync::Arc;

use crate::core::hash::crc32;
use crate::core::FileRef;
use crate::lexer::lang;
use crate::lexer::source_view::{IdentifierEntry, SourceTrivia, SourceView};
use crate::lexer::token::{Token, TokenFlags, TokenId};
use crate::report::diagnostic::DiagnosticId;

/// Lexer-level diagnostic, located by raw byte span. The parse job maps it
/// to a full diagnostic once the view exists.
#[derive(Copy, Clone, Debug)]
pub struct LexDiag {
    pub id: DiagnosticId,
    pub byte_start: u32,
    pub byte_len: u32,
}

pub struct LexerOutput {
    pub view: SourceView,
    pub diags: Vec<LexDiag>,
}

pub struct Lexer<'s> {
    bytes: &'s [u8],
    pos: usize,

    tokens: Vec<Token>,
    trivia: Vec<SourceTrivia>,
    identifiers: Vec<IdentifierEntry>,
    line_starts: Vec<u32>,
    diags: Vec<LexDiag>,

    blank_pending: bool,
    eol_pending: bool,
}

impl<'s> Lexer<'s> {
    pub fn tokenize(file: FileRef, source: Arc<str>) -> LexerOutput {
        let mut lexer = Lexer {
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            trivia: Vec::new(),
            identifiers: Vec::new(),
            line_starts: vec![0],
            diags: Vec::new(),
            blank_pending: false,
            eol_pending: false,
        };
        lexer.run();

        let Lexer {
            tokens,
            trivia,
            identifiers,
            line_starts,
            diags,
            ..
        } = lexer;

        LexerOutput {
            view: SourceView::new(file, source, tokens, trivia, identifiers, line_starts),
            diags,
        }
    }

    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'\n' => self.eat_eol(),
                _ if lang::is_blank(c) => self.eat_blanks(),
                b'/' if self.peek(1) == Some(b'/') => self.eat_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.eat_block_comment(),
                b'r' if self.peek(1) == Some(b'"') => self.eat_raw_string(),
                b'"' => self.eat_string(),
                b'\'' => self.eat_char(),
                b'#' => self.eat_directive(),
                b'@' => self.eat_intrinsic(),
                _ if lang::is_digit(c) => self.eat_number(),
                _ if lang::is_ident_start(c) => self.eat_word(),
                _ => self.eat_symbol(),
            }
        }
        self.push_token(TokenId::EndOfFile, self.pos as u32, 0, TokenFlags::empty());
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn error(&mut self, id: DiagnosticId, start: usize, len: usize) {
        self.diags.push(LexDiag {
            id,
            byte_start: start as u32,
            byte_len: len as u32,
        });
    }

    fn mark_prev(&mut self, flag: TokenFlags) {
        if let Some(prev) = self.tokens.last_mut() {
            prev.flags |= flag;
        }
    }

    fn push_token(&mut self, id: TokenId, start: u32, len: u32, extra: TokenFlags) {
        let mut flags = extra;
        if self.blank_pending {
            flags |= TokenFlags::BLANK_BEFORE;
        }
        if self.eol_pending {
            flags |= TokenFlags::EOL_BEFORE;
        }
        self.blank_pending = false;
        self.eol_pending = false;
        self.tokens.push(Token {
            byte_start: start,
            byte_len: len,
            id,
            flags,
        });
    }

    fn eat_eol(&mut self) {
        self.mark_prev(TokenFlags::EOL_AFTER);
        self.pos += 1;
        self.line_starts.push(self.pos as u32);
        self.eol_pending = true;
    }

    fn eat_blanks(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && lang::is_blank(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.mark_prev(TokenFlags::BLANK_AFTER);
        self.blank_pending = true;
        self.trivia.push(SourceTrivia {
            tok: Token {
                byte_start: start as u32,
                byte_len: (self.pos - start) as u32,
                id: TokenId::Blank,
                flags: TokenFlags::empty(),
            },
        });
    }

    fn eat_line_comment(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        self.mark_prev(TokenFlags::BLANK_AFTER);
        self.blank_pending = true;
        self.trivia.push(SourceTrivia {
            tok: Token {
                byte_start: start as u32,
                byte_len: (self.pos - start) as u32,
                id: TokenId::CommentLine,
                flags: TokenFlags::empty(),
            },
        });
    }

    fn eat_block_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        let mut flags = TokenFlags::empty();
        let mut closed = false;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c == b'\n' {
                self.pos += 1;
                self.line_starts.push(self.pos as u32);
                flags |= TokenFlags::EOL_INSIDE;
                continue;
            }
            if c == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                closed = true;
                break;
            }
            self.pos += 1;
        }
        if !closed {
            self.error(DiagnosticId::LexErrUnclosedComment, start, 2);
        }
        self.mark_prev(TokenFlags::BLANK_AFTER);
        self.blank_pending = true;
        self.trivia.push(SourceTrivia {
            tok: Token {
                byte_start: start as u32,
                byte_len: (self.pos - start) as u32,
                id: TokenId::CommentBlock,
                flags,
            },
        });
    }

    fn eat_raw_string(&mut self) {
        let start = self.pos;
        self.pos += 2; // r"
        let mut closed = false;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c == b'\n' {
                self.pos += 1;
                self.line_starts.push(self.pos as u32);
                continue;
            }
            if c == b'"' {
                self.pos += 1;
                closed = true;
                break;
            }
            self.pos += 1;
        }
        if !closed {
            self.error(DiagnosticId::LexErrUnclosedString, start, self.pos - start);
        }
        self.push_token(
            TokenId::StringRaw,
            start as u32,
            (self.pos - start) as u32,
            TokenFlags::empty(),
        );
    }

    fn eat_string(&mut self) {
        let start = self.pos;
        if self.peek(1) == Some(b'"') && self.peek(2) == Some(b'"') {
            self.eat_multiline_string();
            return;
        }

        self.pos += 1;
        let mut flags = TokenFlags::empty();
        let mut closed = false;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c == b'\n' {
                self.error(DiagnosticId::LexErrEolInString, start, self.pos - start);
                break;
            }
            if c == b'\\' {
                flags |= TokenFlags::ESCAPED;
                self.pos = (self.pos + 2).min(self.bytes.len());
                continue;
            }
            if c == b'"' {
                self.pos += 1;
                closed = true;
                break;
            }
            self.pos += 1;
        }
        if !closed && self.pos >= self.bytes.len() {
            self.error(DiagnosticId::LexErrUnclosedString, start, self.pos - start);
        }
        self.push_token(
            TokenId::StringLine,
            start as u32,
            (self.pos - start) as u32,
            flags,
        );
    }

    fn eat_multiline_string(&mut self) {
        let start = self.pos;
        self.pos += 3; // """
        let mut flags = TokenFlags::empty();
        let mut closed = false;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c == b'\n' {
                self.pos += 1;
                self.line_starts.push(self.pos as u32);
                flags |= TokenFlags::EOL_INSIDE;
                continue;
            }
            if c == b'\\' {
                flags |= TokenFlags::ESCAPED;
                self.pos = (self.pos + 2).min(self.bytes.len());
                continue;
            }
            if c == b'"' && self.peek(1) == Some(b'"') && self.peek(2) == Some(b'"') {
                self.pos += 3;
                closed = true;
                break;
            }
            self.pos += 1;
        }
        if !closed {
            self.error(DiagnosticId::LexErrUnclosedString, start, 3);
        }
        self.push_token(
            TokenId::StringMultiLine,
            start as u32,
            (self.pos - start) as u32,
            flags,
        );
    }

    fn eat_char(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let mut flags = TokenFlags::empty();
        let mut closed = false;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c == b'\n' {
                break;
            }
            if c == b'\\' {
                flags |= TokenFlags::ESCAPED;
                self.pos = (self.pos + 2).min(self.bytes.len());
                continue;
            }
            if c == b'\'' {
                self.pos += 1;
                closed = true;
                break;
            }
            self.pos += 1;
        }
        if !closed {
            self.error(DiagnosticId::LexErrUnclosedString, start, self.pos - start);
        }
        self.push_token(
            TokenId::CharacterLiteral,
            start as u32,
            (self.pos - start) as u32,
            flags,
        );
    }

    /// Consumes digits of the given class, checking `_` separator placement.
    fn eat_digits(&mut self, is_digit: fn(u8) -> bool) -> bool {
        let mut any = false;
        let mut prev_sep = false;
        let mut last_sep_at = 0usize;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if lang::is_number_sep(c) {
                if prev_sep {
                    self.error(DiagnosticId::LexErrNumberSepMulti, self.pos, 1);
                }
                prev_sep = true;
                last_sep_at = self.pos;
                self.pos += 1;
                continue;
            }
            if !is_digit(c) {
                break;
            }
            prev_sep = false;
            any = true;
            self.pos += 1;
        }
        if prev_sep {
            self.error(DiagnosticId::LexErrNumberSepAtEnd, last_sep_at, 1);
        }
        any
    }

    fn eat_number(&mut self) {
        let start = self.pos;

        if self.bytes[self.pos] == b'0' {
            match self.peek(1) {
                Some(b'b') | Some(b'B') => {
                    self.pos += 2;
                    if !self.eat_digits(|c| c == b'0' || c == b'1') {
                        self.error(DiagnosticId::LexErrMissingDigits, start, self.pos - start);
                    }
                    self.push_token(
                        TokenId::BinaryLiteral,
                        start as u32,
                        (self.pos - start) as u32,
                        TokenFlags::empty(),
                    );
                    return;
                }
                Some(b'x') | Some(b'X') => {
                    self.pos += 2;
                    if !self.eat_digits(lang::is_hex_digit) {
                        self.error(DiagnosticId::LexErrMissingHexDigits, start, self.pos - start);
                    }
                    self.push_token(
                        TokenId::HexaLiteral,
                        start as u32,
                        (self.pos - start) as u32,
                        TokenFlags::empty(),
                    );
                    return;
                }
                _ => {}
            }
        }

        self.eat_digits(lang::is_digit);
        let mut is_float = false;

        // Fractional part. A dot not followed by a digit belongs to the
        // caller (member access).
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'.' {
            if self.peek(1).map(lang::is_digit).unwrap_or(false) {
                is_float = true;
                self.pos += 1;
                self.eat_digits(lang::is_digit);
            }
        }

        // Exponent.
        if self.pos < self.bytes.len()
            && (self.bytes[self.pos] == b'e' || self.bytes[self.pos] == b'E')
        {
            let mut ahead = 1;
            if matches!(self.peek(1), Some(b'+') | Some(b'-')) {
                ahead = 2;
            }
            if self.peek(ahead).map(lang::is_digit).unwrap_or(false) {
                is_float = true;
                self.pos += ahead;
                self.eat_digits(lang::is_digit);
            }
        }

        self.push_token(
            if is_float {
                TokenId::FloatLiteral
            } else {
                TokenId::IntegerLiteral
            },
            start as u32,
            (self.pos - start) as u32,
            TokenFlags::empty(),
        );
    }

    fn eat_word(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && lang::is_ident_cont(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let text = &self.bytes[start..self.pos];
        let id = keyword_id(text);
        if id != TokenId::Identifier {
            self.push_token(id, start as u32, (self.pos - start) as u32, TokenFlags::empty());
            return;
        }

        let entry = self.identifiers.len() as u32;
        self.identifiers.push(IdentifierEntry {
            byte_start: start as u32,
            byte_len: (self.pos - start) as u32,
            crc: crc32(text),
        });
        self.push_token(
            TokenId::Identifier,
            entry,
            (self.pos - start) as u32,
            TokenFlags::empty(),
        );
    }

    fn eat_directive(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() && lang::is_ident_cont(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let id = match &self.bytes[start + 1..self.pos] {
            b"if" => TokenId::CompilerIf,
            b"else" => TokenId::CompilerElse,
            b"assert" => TokenId::CompilerAssert,
            b"error" => TokenId::CompilerError,
            b"warning" => TokenId::CompilerWarning,
            b"print" => TokenId::CompilerPrint,
            b"defined" => TokenId::CompilerDefined,
            b"global" => TokenId::CompilerGlobal,
            b"file" => TokenId::CompilerFile,
            b"line" => TokenId::CompilerLine,
            b"flags" => TokenId::CompilerFlags,
            b"wrap" => TokenId::ModifierWrap,
            b"prom" => TokenId::ModifierPromote,
            b"bit" => TokenId::ModifierBit,
            b"unconst" => TokenId::ModifierUnConst,
            _ => {
                self.error(DiagnosticId::LexErrUnknownDirective, start, self.pos - start);
                TokenId::Invalid
            }
        };
        self.push_token(id, start as u32, (self.pos - start) as u32, TokenFlags::empty());
    }

    fn eat_intrinsic(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() && lang::is_ident_cont(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let id = match &self.bytes[start + 1..self.pos] {
            b"sizeof" => TokenId::IntrinsicSizeOf,
            b"countof" => TokenId::IntrinsicCountOf,
            _ => {
                self.error(DiagnosticId::LexErrUnknownDirective, start, self.pos - start);
                TokenId::Invalid
            }
        };
        self.push_token(id, start as u32, (self.pos - start) as u32, TokenFlags::empty());
    }

    fn eat_symbol(&mut self) {
        let start = self.pos;
        let c = self.bytes[self.pos];
        let two = self.peek(1);

        let (id, len) = match (c, two) {
            (b'+', Some(b'+')) => (TokenId::SymPlusPlus, 2),
            (b'-', Some(b'>')) => (TokenId::SymArrow, 2),
            (b'>', Some(b'>')) => (TokenId::SymGreaterGreater, 2),
            (b'<', Some(b'<')) => (TokenId::SymLowerLower, 2),
            (b'=', Some(b'=')) => (TokenId::SymEqualEqual, 2),
            (b'!', Some(b'=')) => (TokenId::SymBangEqual, 2),
            (b'<', Some(b'=')) => (TokenId::SymLowerEqual, 2),
            (b'>', Some(b'=')) => (TokenId::SymGreaterEqual, 2),
            (b'+', _) => (TokenId::SymPlus, 1),
            (b'-', _) => (TokenId::SymMinus, 1),
            (b'*', _) => (TokenId::SymAsterisk, 1),
            (b'/', _) => (TokenId::SymSlash, 1),
            (b'%', _) => (TokenId::SymPercent, 1),
            (b'&', _) => (TokenId::SymAmpersand, 1),
            (b'|', _) => (TokenId::SymPipe, 1),
            (b'^', _) => (TokenId::SymCircumflex, 1),
            (b'~', _) => (TokenId::SymTilde, 1),
            (b'=', _) => (TokenId::SymEqual, 1),
            (b'<', _) => (TokenId::SymLower, 1),
            (b'>', _) => (TokenId::SymGreater, 1),
            (b'(', _) => (TokenId::SymLeftParen, 1),
            (b')', _) => (TokenId::SymRightParen, 1),
            (b'{', _) => (TokenId::SymLeftBrace, 1),
            (b'}', _) => (TokenId::SymRightBrace, 1),
            (b'[', _) => (TokenId::SymLeftBracket, 1),
            (b']', _) => (TokenId::SymRightBracket, 1),
            (b',', _) => (TokenId::SymComma, 1),
            (b':', _) => (TokenId::SymColon, 1),
            (b';', _) => (TokenId::SymSemiColon, 1),
            (b'.', _) => (TokenId::SymDot, 1),
            _ => {
                self.error(DiagnosticId::LexErrInvalidCharacter, start, 1);
                self.pos += 1;
                return;
            }
        };

        self.pos += len;
        self.push_token(id, start as u32, len as u32, TokenFlags::empty());
    }
}

fn keyword_id(text: &[u8]) -> TokenId {
    match text {
        b"const" => TokenId::KwdConst,
        b"var" => TokenId::KwdVar,
        b"func" => TokenId::KwdFunc,
        b"namespace" => TokenId::KwdNamespace,
        b"struct" => TokenId::KwdStruct,
        b"union" => TokenId::KwdUnion,
        b"enum" => TokenId::KwdEnum,
        b"interface" => TokenId::KwdInterface,
        b"impl" => TokenId::KwdImpl,
        b"alias" => TokenId::KwdAlias,
        b"if" => TokenId::KwdIf,
        b"else" => TokenId::KwdElse,
        b"while" => TokenId::KwdWhile,
        b"for" => TokenId::KwdFor,
        b"foreach" => TokenId::KwdForeach,
        b"switch" => TokenId::KwdSwitch,
        b"case" => TokenId::KwdCase,
        b"default" => TokenId::KwdDefault,
        b"return" => TokenId::KwdReturn,
        b"break" => TokenId::KwdBreak,
        b"continue" => TokenId::KwdContinue,
        b"true" => TokenId::KwdTrue,
        b"false" => TokenId::KwdFalse,
        b"null" => TokenId::KwdNull,
        b"undefined" => TokenId::KwdUndefined,
        b"cast" => TokenId::KwdCast,
        b"in" => TokenId::KwdIn,
        b"public" => TokenId::KwdPublic,
        b"internal" => TokenId::KwdInternal,
        b"private" => TokenId::KwdPrivate,
        b"and" => TokenId::KwdAnd,
        b"or" => TokenId::KwdOr,
        b"not" => TokenId::KwdNot,
        b"s8" => TokenId::TypeS8,
        b"s16" => TokenId::TypeS16,
        b"s32" => TokenId::TypeS32,
        b"s64" => TokenId::TypeS64,
        b"u8" => TokenId::TypeU8,
        b"u16" => TokenId::TypeU16,
        b"u32" => TokenId::TypeU32,
        b"u64" => TokenId::TypeU64,
        b"usize" => TokenId::TypeUSize,
        b"f32" => TokenId::TypeF32,
        b"f64" => TokenId::TypeF64,
        b"bool" => TokenId::TypeBool,
        b"string" => TokenId::TypeString,
        b"char" => TokenId::TypeChar,
        b"void" => TokenId::TypeVoid,
        _ => TokenId::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> LexerOutput {
        Lexer::tokenize(FileRef::new(0), Arc::from(src))
    }

    #[test]
    fn lexes_simple_declaration() {
        let out = lex("const x = 1 + 2\n");
        let ids: Vec<TokenId> = out.view.tokens().iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![
                TokenId::KwdConst,
                TokenId::Identifier,
                TokenId::SymEqual,
                TokenId::IntegerLiteral,
                TokenId::SymPlus,
                TokenId::IntegerLiteral,
                TokenId::EndOfFile,
            ]
        );
        assert!(out.diags.is_empty());
    }

    #[test]
    fn identifier_goes_through_table() {
        let out = lex("abc");
        let tok = out.view.tokens()[0];
        assert_eq!(tok.id, TokenId::Identifier);
        let entry = out.view.identifiers()[tok.byte_start as usize];
        assert_eq!(entry.byte_start, 0);
        assert_eq!(entry.byte_len, 3);
        assert_eq!(entry.crc, crc32(b"abc"));
        assert_eq!(out.view.token_text(crate::core::TokenRef::new(0)), "abc");
    }

    #[test]
    fn escaped_string_sets_flag() {
        let out = lex(r#""a\nb""#);
        let tok = out.view.tokens()[0];
        assert_eq!(tok.id, TokenId::StringLine);
        assert!(tok.flags.contains(TokenFlags::ESCAPED));

        let out = lex(r#""plain""#);
        assert!(!out.view.tokens()[0].flags.contains(TokenFlags::ESCAPED));
    }

    #[test]
    fn number_separator_misuse_is_reported() {
        let out = lex("const x = 1__2\n");
        assert!(out
            .diags
            .iter()
            .any(|d| d.id == DiagnosticId::LexErrNumberSepMulti));
        let out = lex("const x = 12_\n");
        assert!(out
            .diags
            .iter()
            .any(|d| d.id == DiagnosticId::LexErrNumberSepAtEnd));
    }

    #[test]
    fn eol_flags_and_line_table() {
        let out = lex("a\nb\n");
        let toks = out.view.tokens();
        assert!(toks[0].flags.contains(TokenFlags::EOL_AFTER));
        assert!(toks[1].flags.contains(TokenFlags::EOL_BEFORE));
        assert_eq!(out.view.line_table(), &[0, 2, 4]);
        assert_eq!(out.view.line_col(2).line, 2);
    }

    #[test]
    fn directives_and_modifiers() {
        let out = lex("#if true { } #else { } a +#wrap b @sizeof(s32)");
        let ids: Vec<TokenId> = out.view.tokens().iter().map(|t| t.id).collect();
        assert!(ids.contains(&TokenId::CompilerIf));
        assert!(ids.contains(&TokenId::CompilerElse));
        assert!(ids.contains(&TokenId::ModifierWrap));
        assert!(ids.contains(&TokenId::IntrinsicSizeOf));
        assert!(out.diags.is_empty());
    }
}
