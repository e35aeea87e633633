/*!
A low-level crate for reading PDF content streams.

This crate provides the lexical layer of the `folio` rendering core:
- [`lexer`]: a tokenizer for content-stream bytecode that never fails, but
  reports malformed input through [`Token::Unknown`](lexer::Token::Unknown).
- [`object`]: PDF objects and the [`ObjectModel`](object::ObjectModel) trait
  through which documents expose their indirect objects.
- [`xref`]: an in-memory object table.

Parsing of PDF files themselves (cross-reference tables, object streams,
encryption) is not part of this crate; embedders implement
[`ObjectModel`](object::ObjectModel) on top of their own document reader.

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod lexer;
pub mod object;
pub mod reader;
pub mod xref;

mod trivia;

pub use lexer::{LexAnomaly, Lexer, Token, next_token};
pub use object::{Dict, Name, ObjRef, Object, ObjectModel, Stream, SyntaxError};
pub use xref::MemoryObjects;
