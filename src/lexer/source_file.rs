//! Source files handed to the frontend.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use parking_lot::Mutex;
use thiserror::Error;

use crate::ast::AstNodeRef;
use crate::core::{FileRef, SourceViewRef, SymbolRef};
use crate::report::verify::Verify;

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct FileFlags: u32 {
        const HAS_ERRORS   = 1 << 0;
        const HAS_WARNINGS = 1 << 1;
        const LEX_ONLY     = 1 << 2;
        /// Parser gave up on a top-level declaration and skipped forward.
        const GLOBAL_SKIP  = 1 << 3;
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open file {0}")]
    CannotOpen(PathBuf),
    #[error("failed to read file {0}")]
    CannotRead(PathBuf),
    #[error("source file {0} is not utf8")]
    NotUtf8(PathBuf),
}

/// One input file and its per-file compilation state.
pub struct SourceFile {
    file_ref: FileRef,
    path: PathBuf,
    content: OnceLock<Arc<str>>,
    flags: AtomicU32,

    /// Filled by the parse job.
    src_view: OnceLock<SourceViewRef>,
    root: OnceLock<AstNodeRef>,
    /// Module namespace the file's top-level declarations land in.
    module_ns: OnceLock<SymbolRef>,

    verify: Mutex<Verify>,
}

impl SourceFile {
    pub fn new(file_ref: FileRef, path: PathBuf) -> Self {
        Self {
            file_ref,
            path,
            content: OnceLock::new(),
            flags: AtomicU32::new(0),
            src_view: OnceLock::new(),
            root: OnceLock::new(),
            module_ns: OnceLock::new(),
            verify: Mutex::new(Verify::default()),
        }
    }

    pub fn file_ref(&self) -> FileRef {
        self.file_ref
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_content(&self) -> Result<Arc<str>, SourceError> {
        if let Some(content) = self.content.get() {
            return Ok(content.clone());
        }
        let bytes = std::fs::read(&self.path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SourceError::CannotOpen(self.path.clone())
            } else {
                SourceError::CannotRead(self.path.clone())
            }
        })?;
        let text =
            String::from_utf8(bytes).map_err(|_| SourceError::NotUtf8(self.path.clone()))?;
        let arc: Arc<str> = Arc::from(text);
        Ok(self.content.get_or_init(|| arc).clone())
    }

    /// Installs in-memory content, used by tests and the verify tokenizer.
    pub fn set_content(&self, text: &str) {
        let _ = self.content.set(Arc::from(text));
    }

    pub fn content(&self) -> Option<Arc<str>> {
        self.content.get().cloned()
    }

    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn add_flag(&self, flag: FileFlags) {
        self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
    }

    pub fn has_flag(&self, flag: FileFlags) -> bool {
        self.flags().contains(flag)
    }

    pub fn set_has_error(&self) {
        self.add_flag(FileFlags::HAS_ERRORS);
    }

    pub fn has_errors(&self) -> bool {
        self.has_flag(FileFlags::HAS_ERRORS)
    }

    pub fn set_src_view(&self, view: SourceViewRef) {
        let _ = self.src_view.set(view);
    }

    pub fn src_view(&self) -> Option<SourceViewRef> {
        self.src_view.get().copied()
    }

    pub fn set_root(&self, root: AstNodeRef) {
        let _ = self.root.set(root);
    }

    pub fn root(&self) -> AstNodeRef {
        self.root.get().copied().unwrap_or(AstNodeRef::INVALID)
    }

    pub fn set_module_ns(&self, ns: SymbolRef) {
        let _ = self.module_ns.set(ns);
    }

    pub fn module_ns(&self) -> SymbolRef {
        self.module_ns.get().copied().unwrap_or(SymbolRef::INVALID)
    }

    pub fn verify(&self) -> &Mutex<Verify> {
        &self.verify
    }
}
