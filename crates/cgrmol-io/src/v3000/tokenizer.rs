//! V3000 record tokenizer
//!
//! Joins continuation lines (a trailing `-`) into one logical record and
//! splits it into space-delimited fields. A field that opens with a double
//! quote may carry spaces up to its closing quote, and a doubled quote inside
//! it is a literal quote. Quotes anywhere else are ordinary characters.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, space0},
    combinator::{cut, map, opt, value},
    multi::many0,
    sequence::{preceded, terminated},
    IResult,
};

/// Length of the `M  V30 ` prefix stripped from every physical line
pub const PREFIX_LEN: usize = 7;

/// Continuation marker at the end of a physical line
const CONTINUATION: char = '-';

/// `"..."` with `""` escapes; text glued after the closing quote is kept as is
fn quoted_field(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, parts) = cut(terminated(
        many0(alt((is_not("\""), value("\"", tag("\"\""))))),
        char('"'),
    ))(input)?;
    let (input, tail) = opt(is_not(" "))(input)?;

    let mut text = parts.concat();
    text.push_str(tail.unwrap_or_default());
    Ok((input, text))
}

fn bare_field(input: &str) -> IResult<&str, String> {
    map(is_not(" "), String::from)(input)
}

fn field(input: &str) -> IResult<&str, String> {
    alt((quoted_field, bare_field))(input)
}

fn fields(input: &str) -> IResult<&str, Vec<String>> {
    preceded(space0, many0(terminated(field, space0)))(input)
}

/// Split one logical record into fields
///
/// Returns `None` if a field opens a quote that is never closed.
pub fn tokenize(record: &str) -> Option<Vec<String>> {
    match fields(record) {
        Ok(("", fields)) => Some(fields),
        _ => None,
    }
}

/// Accumulates continuation lines into logical records
#[derive(Debug, Default)]
pub struct RecordCollector {
    pending: Option<String>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a continued record is waiting for its final line
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any partially collected record
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Push one physical line
    ///
    /// Returns the completed record text once a line without the
    /// continuation marker arrives.
    pub fn push(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\n', '\r']);

        if let Some(body) = line.strip_suffix(CONTINUATION) {
            self.pending
                .get_or_insert_with(String::new)
                .push_str(payload(body));
            return None;
        }

        let tail = payload(line);
        Some(match self.pending.take() {
            Some(mut record) => {
                record.push_str(tail);
                record
            }
            None => tail.to_string(),
        })
    }
}

fn payload(line: &str) -> &str {
    line.get(PREFIX_LEN..).unwrap_or("")
}
