//! Diagnostic taxonomy and the collecting sink.
//!
//! Rendering is intentionally minimal: ids, arguments and spans are the
//! stable surface; pretty output is a separate concern.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::FileRef;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

macro_rules! diagnostic_ids {
    ($($variant:ident, $name:literal, $sev:ident, $msg:literal;)*) => {
        /// Closed diagnostic identity set. The snake-case names are the
        /// stable strings matched by `expected-error {{...}}` directives.
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
        pub enum DiagnosticId {
            $($variant,)*
        }

        impl DiagnosticId {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(DiagnosticId::$variant => $name,)*
                }
            }

            pub fn severity(self) -> Severity {
                match self {
                    $(DiagnosticId::$variant => Severity::$sev,)*
                }
            }

            pub fn default_message(self) -> &'static str {
                match self {
                    $(DiagnosticId::$variant => $msg,)*
                }
            }
        }
    };
}

diagnostic_ids! {
    // I/O
    IoErrCannotOpenFile, "io_err_cannot_open_file", Error, "failed to open file";
    IoErrCannotReadFile, "io_err_cannot_read_file", Error, "failed to read file";
    IoErrNotUtf8, "io_err_not_utf8", Error, "source file is not utf8";

    // Lexer
    LexErrUnclosedComment, "lex_err_unclosed_comment", Error, "unclosed multi-line comment";
    LexErrUnclosedString, "lex_err_unclosed_string", Error, "unclosed string literal";
    LexErrEolInString, "lex_err_eol_in_string", Error, "invalid end of line in string";
    LexErrInvalidCharacter, "lex_err_invalid_character", Error, "invalid character";
    LexErrNumberSepMulti, "lex_err_number_sep_multi", Error, "a number cannot have multiple consecutive '_'";
    LexErrNumberSepAtEnd, "lex_err_number_sep_at_end", Error, "a number cannot end with '_'";
    LexErrMissingDigits, "lex_err_missing_digits", Error, "missing digits after number prefix";
    LexErrMissingHexDigits, "lex_err_missing_hex_digits", Error, "missing hexadecimal digits";
    LexErrUnknownDirective, "lex_err_unknown_directive", Error, "unknown compiler directive";

    // Syntax
    SynErrUnexpectedToken, "syn_err_unexpected_token", Error, "unexpected token";
    SynErrExpectedToken, "syn_err_expected_token", Error, "expected token";
    SynErrExpectedExpression, "syn_err_expected_expression", Error, "expected an expression";
    SynErrExpectedType, "syn_err_expected_type", Error, "expected a type";
    SynErrExpectedIdentifier, "syn_err_expected_identifier", Error, "expected an identifier";

    // Sema
    SemaErrNumberTooBig, "sema_err_number_too_big", Error, "literal number is too big";
    SemaErrIntegerOverflow, "sema_err_integer_overflow", Error, "integer overflow";
    SemaErrLiteralOverflow, "sema_err_literal_overflow", Error, "literal does not fit in the requested type";
    SemaErrLiteralTooBig, "sema_err_literal_too_big", Error, "literal value is too big";
    SemaErrDivisionZero, "sema_err_division_zero", Error, "division by zero";
    SemaErrNegativeShift, "sema_err_negative_shift", Error, "shift amount is negative";
    SemaErrCyclicDependency, "sema_err_cyclic_dependency", Error, "cyclic dependency";
    SemaNoteCyclicDependencyLink, "sema_note_cyclic_dependency_link", Note, "which depends on";
    SemaErrUnknownSymbol, "sema_err_unknown_symbol", Error, "unknown symbol";
    SemaErrSymNotDeclared, "sema_err_sym_not_declared", Error, "symbol was never declared";
    SemaErrSymNotTyped, "sema_err_sym_not_typed", Error, "symbol never got a type";
    SemaErrSymNotCompleted, "sema_err_sym_not_completed", Error, "symbol was never completed";
    SemaErrInvalidType, "sema_err_invalid_type", Error, "invalid type";
    SemaErrCannotCast, "sema_err_cannot_cast", Error, "cannot cast";
    SemaErrExprNotConst, "sema_err_expr_not_const", Error, "expression is not a compile-time constant";
    SemaErrNotValueExpr, "sema_err_not_value_expr", Error, "expression does not produce a value";
    SemaErrBinaryOperandType, "sema_err_binary_operand_type", Error, "invalid operand type";
    SemaErrModifierUnsupported, "sema_err_modifier_unsupported", Error, "modifier is not supported here";
    SemaErrModifierOnlyInteger, "sema_err_modifier_only_integer", Error, "modifier requires integer operands";
    SemaErrInvalidOpEnum, "sema_err_invalid_op_enum", Error, "invalid operation on enum";
    SemaErrAlreadyDefined, "sema_err_already_defined", Error, "symbol is already defined";
    SemaNoteOtherDefinition, "sema_note_other_definition", Note, "other definition is here";
    SemaErrAmbiguousSymbol, "sema_err_ambiguous_symbol", Error, "ambiguous symbol";
    SemaErrCompilerAssert, "sema_err_compiler_assert", Error, "compile-time assertion failed";
    SemaErrCompilerError, "sema_err_compiler_error", Error, "user error directive";
    SemaWarnCompilerWarning, "sema_warn_compiler_warning", Warning, "user warning directive";
    SemaErrInvalidCharLiteral, "sema_err_invalid_char_literal", Error, "invalid character literal";
    SemaErrInvalidEscape, "sema_err_invalid_escape", Error, "invalid escape sequence";
    SemaErrNotCallable, "sema_err_not_callable", Error, "expression is not callable";
    SemaErrArgumentCount, "sema_err_argument_count", Error, "wrong number of arguments";
    SemaErrInternal, "sema_err_internal", Error, "internal error";

    // Unit-test verifier
    UnittestErrNotRaised, "unittest_err_not_raised", Error, "expected diagnostic was not raised";
}

/// Named diagnostic arguments.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub enum DiagArg {
    Type,
    RequestedType,
    Left,
    Right,
    Value,
    Sym,
    Path,
    Because,
    Tok,
    TokFam,
    ATokFam,
    PrevTok,
    NextTok,
    ExpectTok,
    What,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub path: String,
    pub line: u32,
    pub col: u32,
    pub len: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticNote {
    pub id: DiagnosticId,
    pub spans: Vec<SourceLocation>,
    pub args: Vec<(DiagArg, String)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    pub severity: Severity,
    #[serde(skip)]
    pub file: FileRef,
    pub spans: Vec<SourceLocation>,
    pub args: Vec<(DiagArg, String)>,
    pub notes: Vec<DiagnosticNote>,
}

impl Diagnostic {
    pub fn new(id: DiagnosticId, file: FileRef) -> Self {
        Self {
            id,
            severity: id.severity(),
            file,
            spans: Vec::new(),
            args: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn add_span(&mut self, loc: SourceLocation) -> &mut Self {
        self.spans.push(loc);
        self
    }

    pub fn add_argument(&mut self, arg: DiagArg, value: impl Into<String>) -> &mut Self {
        self.args.push((arg, value.into()));
        self
    }

    pub fn add_note(&mut self, id: DiagnosticId) -> &mut DiagnosticNote {
        self.notes.push(DiagnosticNote {
            id,
            spans: Vec::new(),
            args: Vec::new(),
        });
        self.notes.last_mut().expect("note just pushed")
    }

    pub fn arg(&self, arg: DiagArg) -> Option<&str> {
        self.args
            .iter()
            .find(|(a, _)| *a == arg)
            .map(|(_, v)| v.as_str())
    }

    /// Line of the primary span, used by the verify matcher.
    pub fn primary_line(&self) -> Option<u32> {
        self.spans.first().map(|s| s.line)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}",
            self.severity,
            self.id.as_str(),
            self.id.default_message()
        )?;
        for (arg, value) in &self.args {
            write!(f, " {:?}={}", arg, value)?;
        }
        if let Some(span) = self.spans.first() {
            write!(f, " --> {}:{}:{}", span.path, span.line, span.col)?;
        }
        Ok(())
    }
}

/// Thread-safe diagnostic sink with severity counters.
#[derive(Default)]
pub struct Reporter {
    diags: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => {
                self.errors.fetch_add(1, Ordering::AcqRel);
                log::error!("{}", diag);
            }
            Severity::Warning => {
                self.warnings.fetch_add(1, Ordering::AcqRel);
                log::warn!("{}", diag);
            }
            _ => log::info!("{}", diag),
        }
        self.diags.lock().push(diag);
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Acquire)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Acquire)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diags.lock().clone()
    }

    /// True when a diagnostic with this id was reported.
    pub fn has_diag(&self, id: DiagnosticId) -> bool {
        self.diags.lock().iter().any(|d| d.id == id)
    }

    pub fn count_diag(&self, id: DiagnosticId) -> usize {
        self.diags.lock().iter().filter(|d| d.id == id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_id() {
        assert_eq!(DiagnosticId::SemaErrDivisionZero.severity(), Severity::Error);
        assert_eq!(
            DiagnosticId::SemaWarnCompilerWarning.severity(),
            Severity::Warning
        );
        assert_eq!(
            DiagnosticId::SemaNoteOtherDefinition.severity(),
            Severity::Note
        );
    }

    #[test]
    fn reporter_counts() {
        let reporter = Reporter::new();
        reporter.report(Diagnostic::new(
            DiagnosticId::SemaErrDivisionZero,
            FileRef::new(0),
        ));
        reporter.report(Diagnostic::new(
            DiagnosticId::SemaWarnCompilerWarning,
            FileRef::new(0),
        ));
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.warning_count(), 1);
        assert!(reporter.has_diag(DiagnosticId::SemaErrDivisionZero));
    }
}
