#![warn(clippy::pedantic)]

use clap::Parser;
use log::trace;

use crate::cli::Cli;
use crate::err::{Exit, Result};

mod cli;
mod err;

fn main() -> Exit {
    match run() {
        Ok(()) => Exit::Success,
        Err(e) => Exit::Failure(e),
    }
}

fn run() -> Result<()> {
    // Parse args
    let args = Cli::parse();
    // Initialize logger
    setup::log(args.log.as_deref().unwrap_or_default()).map_err(err::Error::App)?;
    trace!("{args:#?}");

    // Prepare machine
    let (cpu, mem) = setup::machine(&args).map_err(err::Error::App)?;

    // Prepare debugger, pre-installing any requested breakpoints
    let mut dbg = remu_dbg::Debugger::new(cpu.clone(), mem.clone());
    for &addr in &args.breakpoints {
        dbg.add_breakpoint(addr)?;
    }

    if args.debug {
        dbg.run()?;
    } else {
        cpu.borrow_mut().execute(&mut mem.borrow_mut(), usize::MAX)?;
    }

    Ok(())
}

mod setup {
    use std::fs;

    use anyhow::{Context, Result};
    use log::info;
    use remu_core::{Cpu, Memory, Shared};
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::EnvFilter;

    use crate::cli::Cli;

    /// Installs a `tracing-subscriber` `fmt` subscriber, bridging `log`
    /// records, filtered by `filter` (falling back to `warn`).
    pub fn log(filter: &str) -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::WARN.into())
                    .parse(filter)
                    .with_context(|| format!("failed to parse log filter: {filter:?}"))?,
            )
            .init();
        Ok(())
    }

    /// Loads the guest image and constructs a fresh processor and memory.
    pub fn machine(args: &Cli) -> Result<(Shared<Cpu>, Shared<Memory>)> {
        let image = fs::read(&args.image)
            .with_context(|| format!("failed to read image: `{}`", args.image.display()))?;
        info!("read {} bytes from image: `{}`", image.len(), args.image.display());

        let mut mem = Memory::new();
        mem.load_image(&image).context("image does not fit in guest memory")?;

        Ok((Shared::new(Cpu::new()), Shared::new(mem)))
    }
}
