use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use super::Command;

mod imp;

/// A convenient type alias for [`Result`](std::result::Result).
type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Parser)]
#[grammar = "lang/grammar.pest"]
struct Language;

/// Parses a single command line.
///
/// # Errors
///
/// Errors if the line does not match the command grammar, or if a numeric
/// literal within it overflows.
pub fn command(s: &str) -> Result<Command> {
    let mut pairs = Language::parse(Rule::Command, s.trim())
        .map_err(|err| err.renamed_rules(ToString::to_string))?;
    let command = pairs.next().expect("Command rule always produces one pair");
    imp::command(command)
}

/// An error parsing a debugger command or expression.
#[derive(Debug, Error)]
pub enum Error {
    /// An internal error in the translation layer; indicates a grammar
    /// change was not matched by a corresponding `imp` update.
    #[error("internal error: {0}")]
    Internal(#[from] imp::Error),
    /// A numeric literal overflowed its target type.
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
    /// The input did not match the command grammar.
    #[error(transparent)]
    Pest(#[from] Box<pest::error::Error<Rule>>),
}

impl From<pest::error::Error<Rule>> for Error {
    fn from(err: pest::error::Error<Rule>) -> Self {
        Self::Pest(Box::new(err))
    }
}
