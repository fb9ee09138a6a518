//! Token-stream parser producing the arena AST, and the job wrapping it.

mod expr;
#[allow(clippy::module_inception)]
mod parser;

pub use parser::Parser;

use std::sync::Arc;

use crate::compiler::Compiler;
use crate::jobs::{Job, JobResult, TaskContext};
use crate::lexer::source_file::SourceError;
use crate::lexer::{FileFlags, Lexer, SourceFile};
use crate::report::diagnostic::{DiagArg, Diagnostic, DiagnosticId, SourceLocation};
use crate::report::verify::VerifyFlags;

pub struct ParseJob {
    ctx: TaskContext,
    compiler: Arc<Compiler>,
    file: Arc<SourceFile>,
}

impl ParseJob {
    pub fn new(compiler: Arc<Compiler>, file: Arc<SourceFile>) -> Self {
        Self {
            ctx: TaskContext {
                file: file.file_ref(),
                ..TaskContext::default()
            },
            compiler,
            file,
        }
    }

    fn exec(&mut self) -> JobResult {
        let content = match self.file.load_content() {
            Ok(content) => content,
            Err(err) => {
                let id = match err {
                    SourceError::CannotOpen(_) => DiagnosticId::IoErrCannotOpenFile,
                    SourceError::CannotRead(_) => DiagnosticId::IoErrCannotReadFile,
                    SourceError::NotUtf8(_) => DiagnosticId::IoErrNotUtf8,
                };
                let mut diag = Diagnostic::new(id, self.file.file_ref());
                diag.add_argument(DiagArg::Path, self.file.path().display().to_string());
                self.compiler.report(diag);
                self.file.set_has_error();
                return JobResult::Done;
            }
        };

        let output = Lexer::tokenize(self.file.file_ref(), content);
        let mut view = output.view;

        // Verify directives come from trivia, before anything is reported,
        // so expected lexer errors can be consumed.
        if self.compiler.options().verify {
            let mut verify = self.file.verify().lock();
            verify.tokenize(&view);
            if verify.flags().contains(VerifyFlags::LEX_ONLY) {
                view.set_must_skip(true);
                self.file.add_flag(FileFlags::LEX_ONLY);
            }
        }

        let path = self.file.path().display().to_string();
        for lex_diag in &output.diags {
            let lc = view.line_col(lex_diag.byte_start);
            let mut diag = Diagnostic::new(lex_diag.id, self.file.file_ref());
            diag.add_span(SourceLocation {
                path: path.clone(),
                line: lc.line,
                col: lc.col,
                len: lex_diag.byte_len,
            });
            self.compiler.report(diag);
        }

        let must_skip = view.must_skip();
        let src_view = self.compiler.register_view(view);
        self.file.set_src_view(src_view);
        if must_skip {
            return JobResult::Done;
        }

        let mut parser = Parser::new(&self.compiler, src_view, self.file.file_ref());
        let root = parser.parse_file();
        if parser.had_error() {
            self.file.set_has_error();
        }
        self.file.set_root(root);

        log::debug!("parsed {}", self.file.path().display());
        JobResult::Done
    }
}

impl Job for ParseJob {
    fn run(&mut self) -> JobResult {
        self.exec()
    }

    fn ctx(&self) -> &TaskContext {
        &self.ctx
    }

    fn ctx_mut(&mut self) -> &mut TaskContext {
        &mut self.ctx
    }

    fn kind_name(&self) -> &'static str {
        "parse"
    }
}
