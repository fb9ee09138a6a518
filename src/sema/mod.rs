//! Semantic analysis: declaration pass, use pass, casts, cycle detection.

pub mod cast;
pub mod constants;
pub mod cycle;
mod decl_pass;
mod directive;
pub mod error;
mod expr_pass;
pub mod frame;
pub mod interner;
mod literal;
pub mod scope;
#[allow(clippy::module_inception)]
pub mod sema;
pub mod symbol;
pub mod types;

pub use sema::{NodeView, Sema, SemaJob};
