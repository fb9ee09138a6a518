//! swgc — concurrent compiler frontend for the swg language.
//!
//! The frontend ingests `.swg` / `.swgs` sources and produces a fully
//! analyzed program: tokens, an arena AST, resolved symbols, inferred types,
//! folded constants and a code-generation schedule. Parsing and semantic
//! analysis run as cooperative jobs on a worker pool; jobs suspend on
//! unresolved dependencies and a cycle detector resolves deadlocks.

pub mod ast;
pub mod cli;
pub mod codegen;
pub mod compiler;
pub mod core;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod sema;
