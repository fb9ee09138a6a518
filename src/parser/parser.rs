//! Recursive-descent parser: file structure, declarations, statements and
//! type expressions. Expression parsing lives in `expr.rs`.

use std::sync::Arc;

use crate::ast::{AstBase, AstFlags, AstKind, GlobalMode, TypeExprKind};
use crate::compiler::Compiler;
use crate::core::{AstNodeRef, FileRef, SourceViewRef, SpanRef, TokenRef};
use crate::lexer::{SourceView, Token, TokenId};
use crate::report::diagnostic::{DiagArg, Diagnostic, DiagnosticId};

pub struct Parser<'c> {
    compiler: &'c Compiler,
    view: Arc<SourceView>,
    src_view: SourceViewRef,
    file: FileRef,
    pos: usize,
    had_error: bool,
}

impl<'c> Parser<'c> {
    pub fn new(compiler: &'c Compiler, src_view: SourceViewRef, file: FileRef) -> Self {
        let view = compiler.view(src_view);
        Self {
            compiler,
            view,
            src_view,
            file,
            pos: 0,
            had_error: false,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    // ----- token cursor -----

    pub(crate) fn tok(&self) -> &Token {
        &self.view.tokens()[self.pos]
    }

    pub(crate) fn id(&self) -> TokenId {
        self.tok().id
    }

    pub(crate) fn tok_ref(&self) -> TokenRef {
        TokenRef::new(self.pos as u32)
    }

    pub(crate) fn at_end(&self) -> bool {
        self.id() == TokenId::EndOfFile
    }

    pub(crate) fn advance(&mut self) -> TokenRef {
        let tok = self.tok_ref();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn eat(&mut self, id: TokenId) -> Option<TokenRef> {
        if self.id() == id {
            Some(self.advance())
        } else {
            None
        }
    }

    pub(crate) fn base(&self, tok: TokenRef) -> AstBase {
        AstBase::new(tok, self.src_view)
    }

    pub(crate) fn make(&self, tok: TokenRef, kind: AstKind) -> AstNodeRef {
        self.compiler.ast().make_node(self.base(tok), kind)
    }

    pub(crate) fn span(&self, children: &[AstNodeRef]) -> SpanRef {
        self.compiler.ast().push_span(children)
    }

    pub(crate) fn set_modifiers(&self, node: AstNodeRef, modifiers: crate::ast::ModifierFlags) {
        self.compiler
            .ast()
            .with_entry_mut(node, |e| e.base.modifiers |= modifiers);
    }

    // ----- diagnostics & recovery -----

    pub(crate) fn error_expected(&mut self, expected: TokenId) {
        self.error_here(DiagnosticId::SynErrExpectedToken, Some(expected));
    }

    pub(crate) fn error_here(&mut self, id: DiagnosticId, expected: Option<TokenId>) {
        self.had_error = true;
        let mut diag = Diagnostic::new(id, self.file);
        let tok_ref = self.tok_ref();
        diag.add_argument(DiagArg::Tok, self.view.token_text(tok_ref));
        diag.add_argument(DiagArg::TokFam, self.tok().id.family());
        if let Some(expected) = expected {
            diag.add_argument(DiagArg::ExpectTok, expected.family());
        }
        diag.add_span(self.compiler.token_location(self.src_view, tok_ref));
        self.compiler.report(diag);
    }

    pub(crate) fn expect(&mut self, id: TokenId) -> Option<TokenRef> {
        if self.id() == id {
            return Some(self.advance());
        }
        self.error_expected(id);
        None
    }

    /// Skips forward to the next plausible top-level start after an error.
    fn skip_to_top_level(&mut self) {
        while !self.at_end() {
            if self.tok().starts_line() && starts_top_level(self.id()) {
                return;
            }
            self.advance();
        }
    }

    // ----- file -----

    pub fn parse_file(&mut self) -> AstNodeRef {
        let file_tok = self.tok_ref();
        let mut globals: Vec<AstNodeRef> = Vec::new();
        let mut children: Vec<AstNodeRef> = Vec::new();
        let had_error_before = self.had_error;

        let mut global_skip = false;
        while !self.at_end() {
            if self.eat(TokenId::SymSemiColon).is_some() {
                continue;
            }
            if self.id() == TokenId::CompilerGlobal {
                if let Some(node) = self.parse_compiler_global() {
                    globals.push(node);
                }
                continue;
            }
            match self.parse_top_level() {
                Some(node) => children.push(node),
                None => {
                    global_skip = true;
                    self.skip_to_top_level();
                }
            }
        }

        let globals = self.span(&globals);
        let children = self.span(&children);
        let root = self.make(file_tok, AstKind::File { globals, children });
        if self.had_error && !had_error_before {
            self.compiler.ast().set_flag(root, AstFlags::HAS_ERRORS);
        }
        if global_skip {
            self.compiler.ast().set_flag(root, AstFlags::GLOBAL_SKIP);
        }
        root
    }

    fn parse_compiler_global(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let mode = match self.id() {
            TokenId::KwdPublic => GlobalMode::AccessPublic,
            TokenId::KwdInternal => GlobalMode::AccessInternal,
            TokenId::KwdPrivate => GlobalMode::AccessPrivate,
            _ => {
                self.error_here(DiagnosticId::SynErrUnexpectedToken, None);
                return None;
            }
        };
        self.advance();
        Some(self.make(tok, AstKind::CompilerGlobal { mode }))
    }

    pub(crate) fn parse_top_level(&mut self) -> Option<AstNodeRef> {
        match self.id() {
            TokenId::KwdNamespace => self.parse_namespace(),
            TokenId::KwdConst | TokenId::KwdVar => self.parse_var_decl(),
            TokenId::KwdFunc => self.parse_func(true),
            TokenId::KwdStruct => self.parse_aggregate(false),
            TokenId::KwdUnion => self.parse_aggregate(true),
            TokenId::KwdEnum => self.parse_enum(),
            TokenId::KwdInterface => self.parse_interface(),
            TokenId::KwdImpl => self.parse_impl(),
            TokenId::KwdAlias => self.parse_alias(),
            TokenId::CompilerIf => self.parse_compiler_if(),
            TokenId::CompilerAssert
            | TokenId::CompilerError
            | TokenId::CompilerWarning
            | TokenId::CompilerPrint => self.parse_compiler_diagnostic(),
            _ => {
                self.error_here(DiagnosticId::SynErrUnexpectedToken, None);
                None
            }
        }
    }

    // ----- declarations -----

    fn parse_namespace(&mut self) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        let body = self.parse_top_level_block()?;
        Some(self.make(name, AstKind::NamespaceDecl { body }))
    }

    fn parse_top_level_block(&mut self) -> Option<AstNodeRef> {
        let open = self.expect(TokenId::SymLeftBrace)?;
        let mut children = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            if self.eat(TokenId::SymSemiColon).is_some() {
                continue;
            }
            match self.parse_top_level() {
                Some(node) => children.push(node),
                None => {
                    self.skip_to_top_level();
                    if !starts_top_level(self.id()) {
                        break;
                    }
                }
            }
        }
        self.expect(TokenId::SymRightBrace)?;
        let children = self.span(&children);
        Some(self.make(open, AstKind::Block { children }))
    }

    pub(crate) fn parse_var_decl(&mut self) -> Option<AstNodeRef> {
        let is_const = self.id() == TokenId::KwdConst;
        self.advance();
        let name = self.expect(TokenId::Identifier)?;

        let type_node = if self.eat(TokenId::SymColon).is_some() {
            self.parse_type()?
        } else {
            AstNodeRef::INVALID
        };

        let init = if self.eat(TokenId::SymEqual).is_some() {
            self.parse_expr()?
        } else {
            AstNodeRef::INVALID
        };

        self.eat(TokenId::SymSemiColon);
        Some(self.make(
            name,
            AstKind::VarDecl {
                is_const,
                type_node,
                init,
            },
        ))
    }

    fn parse_func(&mut self, with_body: bool) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        self.expect(TokenId::SymLeftParen)?;

        let mut params = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightParen {
            let param_name = self.expect(TokenId::Identifier)?;
            self.expect(TokenId::SymColon)?;
            let type_node = self.parse_type()?;
            params.push(self.make(param_name, AstKind::ParamDecl { type_node }));
            if self.eat(TokenId::SymComma).is_none() {
                break;
            }
        }
        self.expect(TokenId::SymRightParen)?;

        let ret_type = if self.eat(TokenId::SymArrow).is_some() {
            self.parse_type()?
        } else {
            AstNodeRef::INVALID
        };

        let body = if with_body && self.id() == TokenId::SymLeftBrace {
            self.parse_block()?
        } else {
            AstNodeRef::INVALID
        };

        let params = self.span(&params);
        Some(self.make(
            name,
            AstKind::FuncDecl {
                params,
                ret_type,
                body,
            },
        ))
    }

    fn parse_aggregate(&mut self, is_union: bool) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        self.expect(TokenId::SymLeftBrace)?;

        let mut members = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            let member_name = self.expect(TokenId::Identifier)?;
            self.expect(TokenId::SymColon)?;
            let type_node = self.parse_type()?;
            members.push(self.make(
                member_name,
                AstKind::VarDecl {
                    is_const: false,
                    type_node,
                    init: AstNodeRef::INVALID,
                },
            ));
            self.eat(TokenId::SymComma);
        }
        self.expect(TokenId::SymRightBrace)?;

        let members = self.span(&members);
        Some(self.make(
            name,
            if is_union {
                AstKind::UnionDecl { members }
            } else {
                AstKind::StructDecl { members }
            },
        ))
    }

    fn parse_enum(&mut self) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        let is_flags = self.eat(TokenId::CompilerFlags).is_some();

        let underlying = if self.eat(TokenId::SymColon).is_some() {
            self.parse_type()?
        } else {
            AstNodeRef::INVALID
        };

        self.expect(TokenId::SymLeftBrace)?;
        let mut values = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            let value_name = self.expect(TokenId::Identifier)?;
            let init = if self.eat(TokenId::SymEqual).is_some() {
                self.parse_expr()?
            } else {
                AstNodeRef::INVALID
            };
            values.push(self.make(value_name, AstKind::EnumValueDecl { init }));
            if self.eat(TokenId::SymComma).is_none() {
                break;
            }
        }
        self.expect(TokenId::SymRightBrace)?;

        let values = self.span(&values);
        Some(self.make(
            name,
            AstKind::EnumDecl {
                is_flags,
                underlying,
                values,
            },
        ))
    }

    fn parse_interface(&mut self) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        self.expect(TokenId::SymLeftBrace)?;
        let mut members = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            if self.id() != TokenId::KwdFunc {
                self.error_here(DiagnosticId::SynErrUnexpectedToken, None);
                return None;
            }
            members.push(self.parse_func(false)?);
            self.eat(TokenId::SymSemiColon);
        }
        self.expect(TokenId::SymRightBrace)?;
        let members = self.span(&members);
        Some(self.make(name, AstKind::InterfaceDecl { members }))
    }

    fn parse_impl(&mut self) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        self.expect(TokenId::SymLeftBrace)?;
        let mut members = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            if self.id() != TokenId::KwdFunc {
                self.error_here(DiagnosticId::SynErrUnexpectedToken, None);
                return None;
            }
            members.push(self.parse_func(true)?);
        }
        self.expect(TokenId::SymRightBrace)?;
        let members = self.span(&members);
        Some(self.make(name, AstKind::ImplDecl { members }))
    }

    fn parse_alias(&mut self) -> Option<AstNodeRef> {
        self.advance();
        let name = self.expect(TokenId::Identifier)?;
        self.expect(TokenId::SymEqual)?;
        let target = self.parse_type()?;
        Some(self.make(name, AstKind::AliasDecl { target }))
    }

    // ----- compiler forms -----

    pub(crate) fn parse_compiler_if(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let then_block = self.parse_branch_block()?;
        let else_block = if self.eat(TokenId::CompilerElse).is_some() {
            if self.id() == TokenId::CompilerIf {
                self.parse_compiler_if()?
            } else {
                self.parse_branch_block()?
            }
        } else {
            AstNodeRef::INVALID
        };
        Some(self.make(
            tok,
            AstKind::CompilerIf {
                cond,
                then_block,
                else_block,
            },
        ))
    }

    /// Branch of a compiler-if: top-level declarations at file scope.
    fn parse_branch_block(&mut self) -> Option<AstNodeRef> {
        self.parse_top_level_block()
    }

    pub(crate) fn parse_compiler_diagnostic(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let arg = self.parse_expr()?;
        Some(self.make(tok, AstKind::CompilerDiagnostic { arg }))
    }

    // ----- statements -----

    pub(crate) fn parse_block(&mut self) -> Option<AstNodeRef> {
        let open = self.expect(TokenId::SymLeftBrace)?;
        let mut children = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            if self.eat(TokenId::SymSemiColon).is_some() {
                continue;
            }
            match self.parse_stmt() {
                Some(stmt) => children.push(stmt),
                None => return None,
            }
        }
        self.expect(TokenId::SymRightBrace)?;
        let children = self.span(&children);
        Some(self.make(open, AstKind::Block { children }))
    }

    fn parse_stmt(&mut self) -> Option<AstNodeRef> {
        match self.id() {
            TokenId::KwdConst | TokenId::KwdVar => self.parse_var_decl(),
            TokenId::KwdIf => self.parse_if(),
            TokenId::KwdWhile => self.parse_while(),
            TokenId::KwdFor => self.parse_for(),
            TokenId::KwdForeach => self.parse_foreach(),
            TokenId::KwdSwitch => self.parse_switch(),
            TokenId::KwdReturn => self.parse_return(),
            TokenId::KwdBreak => {
                let tok = self.advance();
                self.eat(TokenId::SymSemiColon);
                Some(self.make(tok, AstKind::BreakStmt))
            }
            TokenId::KwdContinue => {
                let tok = self.advance();
                self.eat(TokenId::SymSemiColon);
                Some(self.make(tok, AstKind::ContinueStmt))
            }
            TokenId::SymLeftBrace => self.parse_block(),
            TokenId::CompilerIf => self.parse_compiler_if_stmt(),
            TokenId::CompilerAssert
            | TokenId::CompilerError
            | TokenId::CompilerWarning
            | TokenId::CompilerPrint => self.parse_compiler_diagnostic(),
            _ => {
                let tok = self.tok_ref();
                let expr = self.parse_expr()?;
                self.eat(TokenId::SymSemiColon);
                Some(self.make(tok, AstKind::ExprStmt { expr }))
            }
        }
    }

    /// `#if` inside a function body branches over statement blocks.
    fn parse_compiler_if_stmt(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenId::CompilerElse).is_some() {
            if self.id() == TokenId::CompilerIf {
                self.parse_compiler_if_stmt()?
            } else {
                self.parse_block()?
            }
        } else {
            AstNodeRef::INVALID
        };
        Some(self.make(
            tok,
            AstKind::CompilerIf {
                cond,
                then_block,
                else_block,
            },
        ))
    }

    fn parse_if(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenId::KwdElse).is_some() {
            if self.id() == TokenId::KwdIf {
                self.parse_if()?
            } else {
                self.parse_block()?
            }
        } else {
            AstNodeRef::INVALID
        };
        Some(self.make(
            tok,
            AstKind::IfStmt {
                cond,
                then_block,
                else_block,
            },
        ))
    }

    fn parse_while(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Some(self.make(tok, AstKind::WhileStmt { cond, body }))
    }

    fn parse_for(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let init = if self.id() == TokenId::SymSemiColon {
            AstNodeRef::INVALID
        } else {
            self.parse_stmt()?
        };
        self.eat(TokenId::SymSemiColon);
        let cond = if self.id() == TokenId::SymSemiColon {
            AstNodeRef::INVALID
        } else {
            self.parse_expr()?
        };
        self.expect(TokenId::SymSemiColon)?;
        let post = if self.id() == TokenId::SymLeftBrace {
            AstNodeRef::INVALID
        } else {
            let post_tok = self.tok_ref();
            let expr = self.parse_expr()?;
            self.make(post_tok, AstKind::ExprStmt { expr })
        };
        let body = self.parse_block()?;
        Some(self.make(
            tok,
            AstKind::ForStmt {
                init,
                cond,
                post,
                body,
            },
        ))
    }

    fn parse_foreach(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let expr = self.parse_expr()?;
        let body = self.parse_block()?;
        Some(self.make(tok, AstKind::ForeachStmt { expr, body }))
    }

    fn parse_switch(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let expr = self.parse_expr()?;
        self.expect(TokenId::SymLeftBrace)?;
        let mut cases = Vec::new();
        while !self.at_end() && self.id() != TokenId::SymRightBrace {
            match self.id() {
                TokenId::KwdCase => {
                    let case_tok = self.advance();
                    let mut exprs = Vec::new();
                    loop {
                        exprs.push(self.parse_expr()?);
                        if self.eat(TokenId::SymComma).is_none() {
                            break;
                        }
                    }
                    self.expect(TokenId::SymColon)?;
                    let body = self.parse_case_body()?;
                    let exprs = self.span(&exprs);
                    cases.push(self.make(case_tok, AstKind::CaseStmt { exprs, body }));
                }
                TokenId::KwdDefault => {
                    let case_tok = self.advance();
                    self.expect(TokenId::SymColon)?;
                    let body = self.parse_case_body()?;
                    cases.push(self.make(
                        case_tok,
                        AstKind::CaseStmt {
                            exprs: SpanRef::INVALID,
                            body,
                        },
                    ));
                }
                _ => {
                    self.error_here(DiagnosticId::SynErrUnexpectedToken, None);
                    return None;
                }
            }
        }
        self.expect(TokenId::SymRightBrace)?;
        let cases = self.span(&cases);
        Some(self.make(tok, AstKind::SwitchStmt { expr, cases }))
    }

    fn parse_case_body(&mut self) -> Option<AstNodeRef> {
        let tok = self.tok_ref();
        let mut children = Vec::new();
        while !self.at_end()
            && !matches!(
                self.id(),
                TokenId::KwdCase | TokenId::KwdDefault | TokenId::SymRightBrace
            )
        {
            if self.eat(TokenId::SymSemiColon).is_some() {
                continue;
            }
            children.push(self.parse_stmt()?);
        }
        let children = self.span(&children);
        Some(self.make(tok, AstKind::Block { children }))
    }

    fn parse_return(&mut self) -> Option<AstNodeRef> {
        let tok = self.advance();
        let expr = if self.id() == TokenId::SymRightBrace
            || self.id() == TokenId::SymSemiColon
            || self.tok().starts_line()
        {
            AstNodeRef::INVALID
        } else {
            self.parse_expr()?
        };
        self.eat(TokenId::SymSemiColon);
        Some(self.make(tok, AstKind::ReturnStmt { expr }))
    }

    // ----- types -----

    pub(crate) fn parse_type(&mut self) -> Option<AstNodeRef> {
        match self.id() {
            TokenId::SymAsterisk => {
                let tok = self.advance();
                let elem = self.parse_type()?;
                Some(self.make(tok, AstKind::PointerType { elem }))
            }
            TokenId::SymLeftBracket => {
                let tok = self.advance();
                if self.eat(TokenId::SymRightBracket).is_some() {
                    let elem = self.parse_type()?;
                    return Some(self.make(tok, AstKind::SliceType { elem }));
                }
                let dim = self.parse_expr()?;
                self.expect(TokenId::SymRightBracket)?;
                let elem = self.parse_type()?;
                Some(self.make(tok, AstKind::ArrayType { dim, elem }))
            }
            id if id.is_type() => {
                let tok = self.advance();
                Some(self.make(
                    tok,
                    AstKind::TypeExpr {
                        kind: TypeExprKind::Builtin,
                    },
                ))
            }
            TokenId::Identifier => {
                let tok = self.advance();
                Some(self.make(
                    tok,
                    AstKind::TypeExpr {
                        kind: TypeExprKind::Named,
                    },
                ))
            }
            _ => {
                self.error_here(DiagnosticId::SynErrExpectedType, None);
                None
            }
        }
    }
}

fn starts_top_level(id: TokenId) -> bool {
    matches!(
        id,
        TokenId::KwdNamespace
            | TokenId::KwdConst
            | TokenId::KwdVar
            | TokenId::KwdFunc
            | TokenId::KwdStruct
            | TokenId::KwdUnion
            | TokenId::KwdEnum
            | TokenId::KwdInterface
            | TokenId::KwdImpl
            | TokenId::KwdAlias
            | TokenId::CompilerIf
            | TokenId::CompilerAssert
            | TokenId::CompilerError
            | TokenId::CompilerWarning
            | TokenId::CompilerPrint
            | TokenId::CompilerGlobal
    )
}
