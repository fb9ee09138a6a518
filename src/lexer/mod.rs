pub mod lang;
pub mod lexer;
pub mod source_file;
pub mod source_view;
pub mod token;

pub use lexer::Lexer;
pub use source_file::{FileFlags, SourceFile};
pub use source_view::{IdentifierEntry, SourceTrivia, SourceView};
pub use token::{Token, TokenFlags, TokenId};
