//! V2000 (fixed-column) connection tables
//!
//! Provides the incremental reader and the block writer.

mod reader;
mod writer;

pub use reader::FixedReader;
pub use writer::{write_molblock, FixedWriter};
