//! recalldb-text
//!
//! Turns files into plain text. Extractors are picked from a static
//! extension table (see `registry`); `discover` walks a directory for files
//! that some extractor can handle.

pub mod command;
pub mod discover;
pub mod plain;
pub mod registry;

pub use command::CommandExtractor;
pub use discover::list_documents;
pub use plain::PlainTextExtractor;
pub use registry::{ExtractorKind, ExtractorRegistry};
