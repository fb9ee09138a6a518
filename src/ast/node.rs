//! Typed AST node variants.
//!
//! Nodes form a closed tagged union. Every node carries a base (origin token,
//! source view, parse flags, operator modifiers) plus zero or more typed
//! children: single `AstNodeRef` fields or ordered `SpanRef` lists.

use bitflags::bitflags;

use crate::core::{AstNodeRef, SourceViewRef, SpanRef, TokenRef};

bitflags! {
    /// Parse-time observations on a node (mostly the file node).
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct AstFlags: u16 {
        const HAS_ERRORS  = 1 << 0;
        const GLOBAL_SKIP = 1 << 1;
    }
}

bitflags! {
    /// Operator modifiers attached by the parser (`#wrap`, `#prom`, ...).
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct ModifierFlags: u32 {
        const WRAP     = 1 << 0;
        const PROMOTE  = 1 << 1;
        const BIT      = 1 << 2;
        const UN_CONST = 1 << 3;
    }
}

bitflags! {
    /// Semantic marks set by the analyzer.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct NodeSemaFlags: u16 {
        const VALUE_EXPR = 1 << 0;
        const LVALUE     = 1 << 1;
    }
}

#[derive(Copy, Clone, Debug)]
pub struct AstBase {
    pub tok: TokenRef,
    pub src_view: SourceViewRef,
    pub flags: AstFlags,
    pub modifiers: ModifierFlags,
}

impl AstBase {
    pub fn new(tok: TokenRef, src_view: SourceViewRef) -> Self {
        Self {
            tok,
            src_view,
            flags: AstFlags::empty(),
            modifiers: ModifierFlags::empty(),
        }
    }
}

/// Semantic annotation slots. After a successful `post_node` exactly one of
/// constant / type / symbol / substitute is set on value-producing nodes.
#[derive(Copy, Clone, Debug)]
pub struct NodeSema {
    pub type_ref: crate::core::TypeRef,
    pub cst_ref: crate::core::ConstantRef,
    pub sym_ref: crate::core::SymbolRef,
    pub substitute: AstNodeRef,
    /// Opaque index into the compiler staging table (compiler-if branches).
    pub payload: u32,
    pub flags: NodeSemaFlags,
}

impl Default for NodeSema {
    fn default() -> Self {
        Self {
            type_ref: crate::core::TypeRef::INVALID,
            cst_ref: crate::core::ConstantRef::INVALID,
            sym_ref: crate::core::SymbolRef::INVALID,
            substitute: AstNodeRef::INVALID,
            payload: u32::MAX,
            flags: NodeSemaFlags::empty(),
        }
    }
}

impl NodeSema {
    pub fn has_constant(&self) -> bool {
        self.cst_ref.is_valid()
    }

    pub fn has_type(&self) -> bool {
        self.type_ref.is_valid()
    }

    pub fn has_symbol(&self) -> bool {
        self.sym_ref.is_valid()
    }

    pub fn has_substitute(&self) -> bool {
        self.substitute.is_valid()
    }
}

/// Which compiler diagnostic directive a `CompilerDiagnostic` node carries is
/// read from its token. Access modes for `#global`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum GlobalMode {
    AccessPublic,
    AccessInternal,
    AccessPrivate,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TypeExprKind {
    /// Builtin type named by the node token (`s32`, `bool`, ...).
    Builtin,
    /// User type named by an identifier token.
    Named,
}

#[derive(Copy, Clone, Debug)]
pub enum AstKind {
    Invalid,

    File {
        globals: SpanRef,
        children: SpanRef,
    },

    // ----- literals -----
    BoolLiteral,
    IntegerLiteral,
    BinaryLiteral,
    HexaLiteral,
    FloatLiteral,
    CharacterLiteral,
    StringLiteral,
    NullLiteral,
    UndefinedLiteral,
    AggregateLiteral {
        children: SpanRef,
    },

    // ----- expressions -----
    IdentifierExpr,
    ParenExpr {
        expr: AstNodeRef,
    },
    UnaryExpr {
        expr: AstNodeRef,
    },
    BinaryExpr {
        left: AstNodeRef,
        right: AstNodeRef,
    },
    LogicalExpr {
        left: AstNodeRef,
        right: AstNodeRef,
    },
    RelationalExpr {
        left: AstNodeRef,
        right: AstNodeRef,
    },
    CastExpr {
        type_node: AstNodeRef,
        expr: AstNodeRef,
    },
    CallExpr {
        callee: AstNodeRef,
        args: SpanRef,
    },
    IntrinsicExpr {
        args: SpanRef,
    },

    // ----- type expressions -----
    TypeExpr {
        kind: TypeExprKind,
    },
    PointerType {
        elem: AstNodeRef,
    },
    SliceType {
        elem: AstNodeRef,
    },
    ArrayType {
        dim: AstNodeRef,
        elem: AstNodeRef,
    },

    // ----- declarations -----
    VarDecl {
        is_const: bool,
        type_node: AstNodeRef,
        init: AstNodeRef,
    },
    ParamDecl {
        type_node: AstNodeRef,
    },
    FuncDecl {
        params: SpanRef,
        ret_type: AstNodeRef,
        body: AstNodeRef,
    },
    StructDecl {
        members: SpanRef,
    },
    UnionDecl {
        members: SpanRef,
    },
    EnumDecl {
        is_flags: bool,
        underlying: AstNodeRef,
        values: SpanRef,
    },
    EnumValueDecl {
        init: AstNodeRef,
    },
    InterfaceDecl {
        members: SpanRef,
    },
    ImplDecl {
        members: SpanRef,
    },
    AliasDecl {
        target: AstNodeRef,
    },
    NamespaceDecl {
        body: AstNodeRef,
    },

    // ----- statements -----
    Block {
        children: SpanRef,
    },
    IfStmt {
        cond: AstNodeRef,
        then_block: AstNodeRef,
        else_block: AstNodeRef,
    },
    WhileStmt {
        cond: AstNodeRef,
        body: AstNodeRef,
    },
    ForStmt {
        init: AstNodeRef,
        cond: AstNodeRef,
        post: AstNodeRef,
        body: AstNodeRef,
    },
    ForeachStmt {
        expr: AstNodeRef,
        body: AstNodeRef,
    },
    SwitchStmt {
        expr: AstNodeRef,
        cases: SpanRef,
    },
    CaseStmt {
        exprs: SpanRef,
        body: AstNodeRef,
    },
    ReturnStmt {
        expr: AstNodeRef,
    },
    BreakStmt,
    ContinueStmt,
    ExprStmt {
        expr: AstNodeRef,
    },

    // ----- compiler forms -----
    CompilerIf {
        cond: AstNodeRef,
        then_block: AstNodeRef,
        else_block: AstNodeRef,
    },
    CompilerDiagnostic {
        arg: AstNodeRef,
    },
    CompilerDefined,
    CompilerLiteral,
    CompilerGlobal {
        mode: GlobalMode,
    },
}

impl AstKind {
    /// True for top-level declarations worth an ad-hoc child sema job.
    pub fn spawns_sema_job(&self) -> bool {
        matches!(
            self,
            AstKind::VarDecl { .. }
                | AstKind::FuncDecl { .. }
                | AstKind::StructDecl { .. }
                | AstKind::UnionDecl { .. }
                | AstKind::EnumDecl { .. }
                | AstKind::InterfaceDecl { .. }
                | AstKind::ImplDecl { .. }
                | AstKind::AliasDecl { .. }
        )
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            AstKind::VarDecl { .. }
                | AstKind::ParamDecl { .. }
                | AstKind::FuncDecl { .. }
                | AstKind::StructDecl { .. }
                | AstKind::UnionDecl { .. }
                | AstKind::EnumDecl { .. }
                | AstKind::EnumValueDecl { .. }
                | AstKind::InterfaceDecl { .. }
                | AstKind::ImplDecl { .. }
                | AstKind::AliasDecl { .. }
                | AstKind::NamespaceDecl { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AstKind::Invalid => "Invalid",
            AstKind::File { .. } => "File",
            AstKind::BoolLiteral => "BoolLiteral",
            AstKind::IntegerLiteral => "IntegerLiteral",
            AstKind::BinaryLiteral => "BinaryLiteral",
            AstKind::HexaLiteral => "HexaLiteral",
            AstKind::FloatLiteral => "FloatLiteral",
            AstKind::CharacterLiteral => "CharacterLiteral",
            AstKind::StringLiteral => "StringLiteral",
            AstKind::NullLiteral => "NullLiteral",
            AstKind::UndefinedLiteral => "UndefinedLiteral",
            AstKind::AggregateLiteral { .. } => "AggregateLiteral",
            AstKind::IdentifierExpr => "IdentifierExpr",
            AstKind::ParenExpr { .. } => "ParenExpr",
            AstKind::UnaryExpr { .. } => "UnaryExpr",
            AstKind::BinaryExpr { .. } => "BinaryExpr",
            AstKind::LogicalExpr { .. } => "LogicalExpr",
            AstKind::RelationalExpr { .. } => "RelationalExpr",
            AstKind::CastExpr { .. } => "CastExpr",
            AstKind::CallExpr { .. } => "CallExpr",
            AstKind::IntrinsicExpr { .. } => "IntrinsicExpr",
            AstKind::TypeExpr { .. } => "TypeExpr",
            AstKind::PointerType { .. } => "PointerType",
            AstKind::SliceType { .. } => "SliceType",
            AstKind::ArrayType { .. } => "ArrayType",
            AstKind::VarDecl { .. } => "VarDecl",
            AstKind::ParamDecl { .. } => "ParamDecl",
            AstKind::FuncDecl { .. } => "FuncDecl",
            AstKind::StructDecl { .. } => "StructDecl",
            AstKind::UnionDecl { .. } => "UnionDecl",
            AstKind::EnumDecl { .. } => "EnumDecl",
            AstKind::EnumValueDecl { .. } => "EnumValueDecl",
            AstKind::InterfaceDecl { .. } => "InterfaceDecl",
            AstKind::ImplDecl { .. } => "ImplDecl",
            AstKind::AliasDecl { .. } => "AliasDecl",
            AstKind::NamespaceDecl { .. } => "NamespaceDecl",
            AstKind::Block { .. } => "Block",
            AstKind::IfStmt { .. } => "IfStmt",
            AstKind::WhileStmt { .. } => "WhileStmt",
            AstKind::ForStmt { .. } => "ForStmt",
            AstKind::ForeachStmt { .. } => "ForeachStmt",
            AstKind::SwitchStmt { .. } => "SwitchStmt",
            AstKind::CaseStmt { .. } => "CaseStmt",
            AstKind::ReturnStmt { .. } => "ReturnStmt",
            AstKind::BreakStmt => "BreakStmt",
            AstKind::ContinueStmt => "ContinueStmt",
            AstKind::ExprStmt { .. } => "ExprStmt",
            AstKind::CompilerIf { .. } => "CompilerIf",
            AstKind::CompilerDiagnostic { .. } => "CompilerDiagnostic",
            AstKind::CompilerDefined => "CompilerDefined",
            AstKind::CompilerLiteral => "CompilerLiteral",
            AstKind::CompilerGlobal { .. } => "CompilerGlobal",
        }
    }
}
