//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;
use remu_core::isa::Word;

/// Interactive instruction-set emulator for a 32-bit integer RISC CPU.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Raw flat binary image, loaded verbatim at the guest base address.
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Start paused in the debugger instead of running to completion.
    #[arg(short = 'i', long = "debug")]
    pub debug: bool,

    /// Tracing filter, e.g. `debug` or `remu_core=trace`.
    #[arg(short, long, env = "REMU_LOG", value_name = "FILTER")]
    pub log: Option<String>,

    /// Installs a breakpoint at the given address before running.
    ///
    /// May be repeated. Accepts decimal or `0x`-prefixed hexadecimal.
    #[arg(short, long = "breakpoint", value_name = "ADDR", value_parser = parse_addr)]
    pub breakpoints: Vec<Word>,
}

fn parse_addr(s: &str) -> Result<Word, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => Word::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
