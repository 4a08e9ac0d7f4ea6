//! Tree-sitter based code parsing: the AST adapter contract.
//!
//! Supports Python, Rust, TypeScript, JavaScript, Go and Java. The encoder
//! never inspects language syntax directly — it consumes [`ParseResult`]
//! only, so adding a language here means adding one more arm to
//! [`adapter::parse_source`] and nothing else downstream.

pub mod adapter;
pub mod languages;

mod go;
mod java;
mod javascript;
mod python;
mod rust_lang;
mod typescript;

pub use adapter::{parse_file, parse_source, CodeEntity, EntityKind, ImportStatement, ParseResult};
pub use languages::Language;
