//! Error types for the core instruction-set emulator.

use std::panic::Location;

use thiserror::Error;

use crate::isa::Word;

/// A convenient type alias for [`Result`](std::result::Result).
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A fatal error raised while fetching, decoding, or executing an
/// instruction, or while accessing memory.
#[derive(Debug, Error)]
pub enum Error {
    /// Decoded opcode/funct combination has no defined semantics.
    #[error("illegal instruction `{raw:#010x}` at `{pc:#010x}` ({loc})")]
    IllegalInstruction {
        /// Address of the offending instruction.
        pc: Word,
        /// Raw bit pattern of the offending instruction.
        raw: Word,
        /// Source location where the error was raised.
        loc: &'static Location<'static>,
    },
    /// Memory access outside the mapped region.
    #[error("invalid address `{addr:#010x}` ({loc})")]
    InvalidAddress {
        /// Address that failed validation.
        addr: Word,
        /// Source location where the error was raised.
        loc: &'static Location<'static>,
    },
    /// An internal invariant was violated.
    #[error("assertion failed: {msg} ({loc})")]
    AssertionFailed {
        /// Description of the violated invariant.
        msg: &'static str,
        /// Source location where the error was raised.
        loc: &'static Location<'static>,
    },
}

impl Error {
    /// Constructs an [`Error::IllegalInstruction`], capturing the caller's
    /// location.
    #[track_caller]
    #[must_use]
    pub fn illegal_instruction(pc: Word, raw: Word) -> Self {
        Self::IllegalInstruction { pc, raw, loc: Location::caller() }
    }

    /// Constructs an [`Error::InvalidAddress`], capturing the caller's
    /// location.
    #[track_caller]
    #[must_use]
    pub fn invalid_address(addr: Word) -> Self {
        Self::InvalidAddress { addr, loc: Location::caller() }
    }

    /// Constructs an [`Error::AssertionFailed`], capturing the caller's
    /// location.
    #[track_caller]
    #[must_use]
    pub fn assertion_failed(msg: &'static str) -> Self {
        Self::AssertionFailed { msg, loc: Location::caller() }
    }
}
