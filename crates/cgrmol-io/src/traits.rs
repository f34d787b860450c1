//! Reader interface and options shared by both Molfile dialects

use crate::draft::MoleculeDraft;
use crate::error::{MolError, MolResult};
use crate::v2000::FixedReader;
use crate::v3000::BlockReader;

/// Default attribution written on the second header line
pub const DEFAULT_ATTRIBUTION: &str = "  CGRtools. (c) Dr. Ramil I. Nugmanov";

/// Molfile connection table dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Fixed-column legacy format
    V2000,
    /// Block-structured extended format
    V3000,
}

impl Dialect {
    /// Detect the dialect from a counts line
    ///
    /// The version tag lives in columns 34..39; short lines fall back to a
    /// substring check.
    pub fn from_counts_line(line: &str) -> Self {
        let tagged = match line.get(33..39) {
            Some(tag) => tag.trim().eq_ignore_ascii_case("V3000"),
            None => line.to_ascii_uppercase().contains("V3000"),
        };
        if tagged {
            Dialect::V3000
        } else {
            Dialect::V2000
        }
    }

    /// Build the reader for this dialect from its counts line
    pub fn create_reader(&self, counts_line: &str) -> MolResult<Box<dyn MolBlockReader>> {
        match self {
            Dialect::V2000 => Ok(Box::new(FixedReader::new(counts_line)?)),
            Dialect::V3000 => Ok(Box::new(BlockReader::new(counts_line))),
        }
    }

    /// Version tag as written in the counts line
    pub fn tag(&self) -> &'static str {
        match self {
            Dialect::V2000 => "V2000",
            Dialect::V3000 => "V3000",
        }
    }
}

/// Incremental, line-driven reader for a single molecule block
///
/// One instance reads exactly one molecule and is then discarded.
pub trait MolBlockReader {
    /// Feed one physical line
    ///
    /// Returns `true` once the terminator line has been consumed.
    fn feed(&mut self, line: &str) -> MolResult<bool>;

    /// Whether the terminator line has been seen
    fn is_complete(&self) -> bool;

    /// Move the accumulated draft out of the reader
    ///
    /// Fails with [`MolError::Incomplete`] before the terminator and with
    /// [`MolError::Protocol`] on a second call.
    fn take_draft(&mut self) -> MolResult<MoleculeDraft>;

    /// Feed lines until the terminator and return the draft
    fn feed_all<'a, I>(&mut self, lines: I) -> MolResult<MoleculeDraft>
    where
        I: IntoIterator<Item = &'a str>,
        Self: Sized,
    {
        for line in lines {
            if self.feed(line)? {
                return self.take_draft();
            }
        }
        Err(MolError::Incomplete)
    }
}

/// Create a reader for the dialect announced by `counts_line`
pub fn create_reader(counts_line: &str) -> MolResult<Box<dyn MolBlockReader>> {
    Dialect::from_counts_line(counts_line).create_reader(counts_line)
}

/// Options for writing V2000 blocks
///
/// The title line is left blank for callers that wrap the block.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Header line 2
    pub attribution: String,
    /// Header line 3
    pub comment: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            attribution: DEFAULT_ATTRIBUTION.to_string(),
            comment: String::new(),
        }
    }
}

impl WriteOptions {
    /// Create default write options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attribution line
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    /// Set the comment line
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}
