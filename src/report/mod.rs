pub mod diagnostic;
pub mod verify;

pub use diagnostic::{DiagArg, Diagnostic, DiagnosticId, Reporter, Severity, SourceLocation};
