//! An abstract syntax tree for a packet-processing language's front end.
//!
//! The AST is a single append-only [`ast::Arena`] of tagged nodes linked by
//! `(first_child, next_sibling)` pointers; identity is by [`ast::NodeId`], an
//! index, rather than by address. Lexing is context-sensitive: an
//! identifier's token kind depends on whatever the parser has bound into
//! scope so far, so the [`lexer::TokenBuffer`] classifies tokens lazily, one
//! at a time, through a caller-supplied [`lexer::NameClassifier`] rather than
//! running a separate tokenization pass up front.
//!
//! # Examples
//!
//! ```rust
//! use plc_ast::parser::parse_program;
//!
//! let (arena, root) = parse_program("parser P() { state start { transition accept; } }")
//!     .expect("parses");
//! assert_eq!(arena.len() > 0, true);
//! let _ = root;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::missing_docs_in_private_items)]

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::Arena;
pub use ast::AstKind;
pub use ast::NodeId;
pub use ast::Payload;
pub use lexer::LexError;
pub use lexer::NameClass;
pub use lexer::NameClassifier;
pub use lexer::TokenBuffer;
pub use parser::parse_program;
pub use parser::ParseError;
pub use span::Diagnostic;
pub use span::Severity;
pub use span::Span;
pub use token::Token;
pub use token::TokenKind;
