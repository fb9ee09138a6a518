//! Tokens and token identities.

use bitflags::bitflags;

/// Closed set of token identities. Families are derived through
/// [`TokenId::kind`] and the `is_*` predicates.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u16)]
pub enum TokenId {
    Invalid,
    EndOfFile,

    Identifier,

    // Literals
    IntegerLiteral,
    BinaryLiteral,
    HexaLiteral,
    FloatLiteral,
    CharacterLiteral,
    StringLine,
    StringMultiLine,
    StringRaw,

    // Trivia (never emitted in the token array)
    CommentLine,
    CommentBlock,
    Blank,

    // Keywords
    KwdConst,
    KwdVar,
    KwdFunc,
    KwdNamespace,
    KwdStruct,
    KwdUnion,
    KwdEnum,
    KwdInterface,
    KwdImpl,
    KwdAlias,
    KwdIf,
    KwdElse,
    KwdWhile,
    KwdFor,
    KwdForeach,
    KwdSwitch,
    KwdCase,
    KwdDefault,
    KwdReturn,
    KwdBreak,
    KwdContinue,
    KwdTrue,
    KwdFalse,
    KwdNull,
    KwdUndefined,
    KwdCast,
    KwdIn,
    KwdPublic,
    KwdInternal,
    KwdPrivate,

    // Logic keywords
    KwdAnd,
    KwdOr,
    KwdNot,

    // Builtin type names
    TypeS8,
    TypeS16,
    TypeS32,
    TypeS64,
    TypeU8,
    TypeU16,
    TypeU32,
    TypeU64,
    TypeUSize,
    TypeF32,
    TypeF64,
    TypeBool,
    TypeString,
    TypeChar,
    TypeVoid,

    // Compiler directives
    CompilerIf,
    CompilerElse,
    CompilerAssert,
    CompilerError,
    CompilerWarning,
    CompilerPrint,
    CompilerDefined,
    CompilerGlobal,
    CompilerFile,
    CompilerLine,
    CompilerFlags,

    // Intrinsics
    IntrinsicSizeOf,
    IntrinsicCountOf,

    // Modifiers
    ModifierWrap,
    ModifierPromote,
    ModifierBit,
    ModifierUnConst,

    // Symbols
    SymPlus,
    SymMinus,
    SymAsterisk,
    SymSlash,
    SymPercent,
    SymAmpersand,
    SymPipe,
    SymCircumflex,
    SymTilde,
    SymGreaterGreater,
    SymLowerLower,
    SymPlusPlus,
    SymEqual,
    SymEqualEqual,
    SymBangEqual,
    SymLower,
    SymGreater,
    SymLowerEqual,
    SymGreaterEqual,
    SymLeftParen,
    SymRightParen,
    SymLeftBrace,
    SymRightBrace,
    SymLeftBracket,
    SymRightBracket,
    SymComma,
    SymColon,
    SymSemiColon,
    SymDot,
    SymArrow,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenIdKind {
    Zero,
    Trivia,
    Symbol,
    Keyword,
    KeywordLogic,
    Compiler,
    Intrinsic,
    Type,
    Literal,
    Modifier,
}

impl TokenId {
    pub fn kind(self) -> TokenIdKind {
        use TokenId::*;
        match self {
            Invalid | EndOfFile | Identifier => TokenIdKind::Zero,

            IntegerLiteral | BinaryLiteral | HexaLiteral | FloatLiteral | CharacterLiteral
            | StringLine | StringMultiLine | StringRaw => TokenIdKind::Literal,

            CommentLine | CommentBlock | Blank => TokenIdKind::Trivia,

            KwdConst | KwdVar | KwdFunc | KwdNamespace | KwdStruct | KwdUnion | KwdEnum
            | KwdInterface | KwdImpl | KwdAlias | KwdIf | KwdElse | KwdWhile | KwdFor
            | KwdForeach | KwdSwitch | KwdCase | KwdDefault | KwdReturn | KwdBreak
            | KwdContinue | KwdTrue | KwdFalse | KwdNull | KwdUndefined | KwdCast | KwdIn
            | KwdPublic | KwdInternal | KwdPrivate => TokenIdKind::Keyword,

            KwdAnd | KwdOr | KwdNot => TokenIdKind::KeywordLogic,

            TypeS8 | TypeS16 | TypeS32 | TypeS64 | TypeU8 | TypeU16 | TypeU32 | TypeU64
            | TypeUSize | TypeF32 | TypeF64 | TypeBool | TypeString | TypeChar | TypeVoid => {
                TokenIdKind::Type
            }

            CompilerIf | CompilerElse | CompilerAssert | CompilerError | CompilerWarning
            | CompilerPrint | CompilerDefined | CompilerGlobal | CompilerFile | CompilerLine
            | CompilerFlags => TokenIdKind::Compiler,

            IntrinsicSizeOf | IntrinsicCountOf => TokenIdKind::Intrinsic,

            ModifierWrap | ModifierPromote | ModifierBit | ModifierUnConst => {
                TokenIdKind::Modifier
            }

            SymPlus | SymMinus | SymAsterisk | SymSlash | SymPercent | SymAmpersand | SymPipe
            | SymCircumflex | SymTilde | SymGreaterGreater | SymLowerLower | SymPlusPlus
            | SymEqual | SymEqualEqual | SymBangEqual | SymLower | SymGreater | SymLowerEqual
            | SymGreaterEqual | SymLeftParen | SymRightParen | SymLeftBrace | SymRightBrace
            | SymLeftBracket | SymRightBracket | SymComma | SymColon | SymSemiColon | SymDot
            | SymArrow => TokenIdKind::Symbol,
        }
    }

    pub fn is_symbol(self) -> bool {
        self.kind() == TokenIdKind::Symbol
    }

    pub fn is_keyword_logic(self) -> bool {
        self.kind() == TokenIdKind::KeywordLogic
    }

    pub fn is_keyword(self) -> bool {
        self.kind() == TokenIdKind::Keyword || self.is_keyword_logic()
    }

    pub fn is_type(self) -> bool {
        self.kind() == TokenIdKind::Type
    }

    pub fn is_compiler(self) -> bool {
        self.kind() == TokenIdKind::Compiler
    }

    pub fn is_intrinsic(self) -> bool {
        self.kind() == TokenIdKind::Intrinsic
    }

    pub fn is_modifier(self) -> bool {
        self.kind() == TokenIdKind::Modifier
    }

    pub fn is_literal(self) -> bool {
        self.kind() == TokenIdKind::Literal
    }

    /// Maps an opening bracket to its closer.
    pub fn related_close(self) -> Option<TokenId> {
        match self {
            TokenId::SymLeftParen => Some(TokenId::SymRightParen),
            TokenId::SymLeftBrace => Some(TokenId::SymRightBrace),
            TokenId::SymLeftBracket => Some(TokenId::SymRightBracket),
            _ => None,
        }
    }

    /// Family name used in diagnostics (`TOK_FAM` argument).
    pub fn family(self) -> &'static str {
        match self.kind() {
            TokenIdKind::Zero => match self {
                TokenId::Identifier => "identifier",
                TokenId::EndOfFile => "end of file",
                _ => "token",
            },
            TokenIdKind::Trivia => "trivia",
            TokenIdKind::Symbol => "symbol",
            TokenIdKind::Keyword | TokenIdKind::KeywordLogic => "keyword",
            TokenIdKind::Compiler => "compiler directive",
            TokenIdKind::Intrinsic => "intrinsic",
            TokenIdKind::Type => "type",
            TokenIdKind::Literal => "literal",
            TokenIdKind::Modifier => "modifier",
        }
    }

    /// Same family with an english article, for message interpolation.
    pub fn a_family(self) -> &'static str {
        match self.kind() {
            TokenIdKind::Zero => match self {
                TokenId::Identifier => "an identifier",
                TokenId::EndOfFile => "the end of file",
                _ => "a token",
            },
            TokenIdKind::Trivia => "a trivia",
            TokenIdKind::Symbol => "a symbol",
            TokenIdKind::Keyword | TokenIdKind::KeywordLogic => "a keyword",
            TokenIdKind::Compiler => "a compiler directive",
            TokenIdKind::Intrinsic => "an intrinsic",
            TokenIdKind::Type => "a type",
            TokenIdKind::Literal => "a literal",
            TokenIdKind::Modifier => "a modifier",
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct TokenFlags: u16 {
        const BLANK_BEFORE = 1 << 0;
        const BLANK_AFTER  = 1 << 1;
        const EOL_BEFORE   = 1 << 2;
        const EOL_AFTER    = 1 << 3;
        const EOL_INSIDE   = 1 << 4;
        const ESCAPED      = 1 << 5;
    }
}

/// One lexed token. For identifier tokens `byte_start` is the index into the
/// per-file identifier table, which holds the real byte offset and a
/// precomputed CRC.
#[derive(Copy, Clone, Debug)]
pub struct Token {
    pub byte_start: u32,
    pub byte_len: u32,
    pub id: TokenId,
    pub flags: TokenFlags,
}

impl Token {
    pub fn is(&self, id: TokenId) -> bool {
        self.id == id
    }

    pub fn is_not(&self, id: TokenId) -> bool {
        self.id != id
    }

    pub fn is_any(&self, ids: &[TokenId]) -> bool {
        ids.contains(&self.id)
    }

    pub fn has_flag(&self, flag: TokenFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn starts_line(&self) -> bool {
        self.flags.contains(TokenFlags::EOL_BEFORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_predicates() {
        assert!(TokenId::SymPlus.is_symbol());
        assert!(TokenId::KwdConst.is_keyword());
        assert!(TokenId::KwdAnd.is_keyword());
        assert!(TokenId::KwdAnd.is_keyword_logic());
        assert!(TokenId::TypeS32.is_type());
        assert!(TokenId::CompilerIf.is_compiler());
        assert!(TokenId::IntrinsicSizeOf.is_intrinsic());
        assert!(TokenId::ModifierWrap.is_modifier());
        assert!(TokenId::IntegerLiteral.is_literal());
        assert!(!TokenId::Identifier.is_keyword());
    }

    #[test]
    fn bracket_closers() {
        assert_eq!(
            TokenId::SymLeftParen.related_close(),
            Some(TokenId::SymRightParen)
        );
        assert_eq!(
            TokenId::SymLeftBrace.related_close(),
            Some(TokenId::SymRightBrace)
        );
        assert_eq!(
            TokenId::SymLeftBracket.related_close(),
            Some(TokenId::SymRightBracket)
        );
        assert_eq!(TokenId::SymPlus.related_close(), None);
    }
}
