//! MDL Molfile connection table I/O
//!
//! This crate reads and writes single molecule blocks in the MDL Molfile
//! formats, carrying condensed graph of reaction (CGR) annotations as
//! extended properties:
//!
//! - **V2000** - fixed-column connection tables (read and write)
//! - **V3000** - block-structured connection tables (read only)
//!
//! # Quick Start
//!
//! ```
//! use cgrmol_io::{read_molblock, write_molblock};
//!
//! let text = "water
//!
//!
//!   3  2  0  0  0  0            999 V2000
//!     0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
//!     0.9572    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
//!    -0.2400    0.9266    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
//!   1  2  1  0  0  0  0
//!   1  3  1  0  0  0  0
//! M  END
//! ";
//! let draft = read_molblock(text).unwrap();
//! assert_eq!(draft.atom_count(), 3);
//!
//! let block = write_molblock(&draft).unwrap();
//! assert!(block.ends_with("M  END\n"));
//! ```
//!
//! # Incremental reading
//!
//! Readers are line-driven: pick one from the counts line with
//! [`create_reader`] and [`MolBlockReader::feed`] it the following lines
//! until it reports completion. Each reader yields exactly one
//! [`MoleculeDraft`].
//!
//! - [`v2000`] - fixed-column reader and writer
//! - [`v3000`] - block reader and its record tokenizer

pub mod draft;
pub mod error;
pub mod tables;
pub mod traits;
pub mod v2000;
pub mod v3000;

// Re-exports
pub use draft::{
    AtomRecord, BondRecord, MoleculeDraft, PropertyKind, PropertyRecord, PropertyValue,
};
pub use error::{MolError, MolResult};
pub use traits::{create_reader, Dialect, MolBlockReader, WriteOptions};
pub use v2000::{write_molblock, FixedReader, FixedWriter};
pub use v3000::BlockReader;

/// Number of header lines preceding the counts line
const HEADER_LINES: usize = 3;

/// Read one complete Molfile block, header included
///
/// Lines after the terminator are not inspected.
pub fn read_molblock(text: &str) -> MolResult<MoleculeDraft> {
    let mut lines = text.lines().skip(HEADER_LINES);
    let counts = lines.next().ok_or(MolError::Incomplete)?;

    let dialect = Dialect::from_counts_line(counts);
    log::debug!("Reading {} block", dialect.tag());
    let mut reader = dialect.create_reader(counts)?;
    for line in lines {
        if reader.feed(line)? {
            return reader.take_draft();
        }
    }
    Err(MolError::Incomplete)
}
