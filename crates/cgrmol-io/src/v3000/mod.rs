//! V3000 (block-structured) connection tables
//!
//! Read-only: blocks are always written back as V2000.

mod reader;
pub mod tokenizer;

pub use reader::BlockReader;
