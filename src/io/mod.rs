//! External collaborators: file system, text tokenizer, intermediate compiler
//!
//! The cache itself never performs I/O; every module that needs to read a
//! file, tokenize a document, or wait on an out-of-process compile goes
//! through the traits in this module, so tests can swap in in-memory/stub
//! implementations.

mod compiler;
mod file_system;
mod text_formatter;

pub use compiler::{CompileArtifact, CompileRequest, IntermediateCompiler, StubCompiler};
pub use file_system::{normalize_path, FileSystem, InMemoryFileSystem, StdFileSystem};
pub use text_formatter::{SourceLocation, TextFormatter, Token};
