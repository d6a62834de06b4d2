//! Deterministic, pure logic for plan documents.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and return deterministic outputs suitable for tests.

pub mod lexer;
pub mod parser;
pub mod types;
