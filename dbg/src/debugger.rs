//! The debugger control loop: breakpoints, watchpoints, and command
//! dispatch over a shared processor and memory.

use std::io::{self, Write as _};

use log::{debug, warn};
use remu_core::cpu::Step;
use remu_core::isa::{ABI_NAMES, Word};
use remu_core::mem::MemTracer;
use remu_core::{Cpu, Memory, Shared};
use thiserror::Error;

use crate::eval;
use crate::lang::{Command, Expr};

/// A convenient type alias for [`Result`](std::result::Result).
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error surfaced while driving the debugger.
#[derive(Debug, Error)]
pub enum Error {
    /// A fault raised by the guest processor or an out-of-range memory
    /// access. Fatal: unwinds out of [`Debugger::run`].
    #[error(transparent)]
    Core(#[from] remu_core::Error),
    /// An unknown register or division by zero within an expression.
    /// Recoverable: printed at the prompt, the invoking command aborts.
    #[error(transparent)]
    Eval(eval::Error),
    /// `d b ID` referenced an id with no installed breakpoint.
    #[error("no breakpoint with id {0}")]
    UnknownBreakpoint(u32),
    /// `d w ID` referenced an id with no installed watchpoint.
    #[error("no watchpoint with id {0}")]
    UnknownWatchpoint(u32),
    /// Failure reading from or writing to the controlling terminal.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// `{id, addr}`; uniqueness is by `addr`.
#[derive(Clone, Copy, Debug)]
struct Breakpoint {
    id: u32,
    addr: Word,
}

/// `{id, span}`; the span is `[addr, addr+3]` and backed by a write tracer
/// sharing the same id.
#[derive(Clone, Copy, Debug)]
struct Watchpoint {
    id: u32,
    lo: Word,
    hi: Word,
}

/// Drives a shared [`Cpu`]/[`Memory`] pair through the GDB-like control
/// loop described at the prompt: pause on breakpoint, accept one command
/// line, execute it, repeat until `quit`.
pub struct Debugger {
    cpu: Shared<Cpu>,
    mem: Shared<Memory>,
    breakpoints: Vec<Breakpoint>,
    watchpoints: Vec<Watchpoint>,
    next_bp_id: u32,
    /// Set by a watchpoint's write-tracer callback; checked after every
    /// instruction executed under `resume`/`step`.
    pause: Shared<bool>,
    quit: bool,
}

impl Debugger {
    /// Constructs a debugger over an already-initialized processor and
    /// memory.
    #[must_use]
    pub fn new(cpu: Shared<Cpu>, mem: Shared<Memory>) -> Self {
        Self {
            cpu,
            mem,
            breakpoints: Vec::new(),
            watchpoints: Vec::new(),
            next_bp_id: 0,
            pause: Shared::new(false),
            quit: false,
        }
    }

    /// Installs a breakpoint at `addr`, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Errors (fatally, per the invariant it enforces) if `addr` is not
    /// 4-byte aligned.
    pub fn add_breakpoint(&mut self, addr: Word) -> Result<u32> {
        if addr % 4 != 0 {
            return Err(remu_core::Error::assertion_failed(
                "breakpoint address must be 4-byte aligned",
            )
            .into());
        }
        if let Some(bp) = self.breakpoints.iter().find(|bp| bp.addr == addr) {
            return Ok(bp.id);
        }
        let id = self.next_bp_id;
        self.next_bp_id += 1;
        self.breakpoints.push(Breakpoint { id, addr });
        debug!("breakpoint {id} installed at {addr:#010x}");
        println!("breakpoint {id} installed at {addr:#010x}");
        Ok(id)
    }

    /// Removes the breakpoint with the given id.
    ///
    /// # Errors
    ///
    /// Errors if no breakpoint with that id is installed.
    pub fn remove_breakpoint(&mut self, id: u32) -> Result<()> {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|bp| bp.id != id);
        if self.breakpoints.len() == before {
            return Err(Error::UnknownBreakpoint(id));
        }
        debug!("breakpoint {id} removed");
        println!("breakpoint {id} deleted");
        Ok(())
    }

    /// Installs a watchpoint over `[addr, addr+3]`, registering the
    /// backing write tracer under the watchpoint's own id.
    ///
    /// # Errors
    ///
    /// Errors if the span falls outside the mapped memory region.
    pub fn add_watchpoint(&mut self, addr: Word) -> Result<u32> {
        let (lo, hi) = (addr, addr.wrapping_add(3));
        if !self.mem.borrow().is_valid_span(lo, hi) {
            return Err(remu_core::Error::invalid_address(addr).into());
        }
        let id = self.mem.borrow_mut().reserve_tracer_id();
        let pause = Shared::clone(&self.pause);
        let tracer = MemTracer::new(lo, hi, move |vaddr, data, width| {
            println!("[Watchpoint {id}]: write {width} bytes at {vaddr:#010x}, data = {data:#010x}");
            *pause.borrow_mut() = true;
        });
        self.mem.borrow_mut().add_write_tracer_with_id(id, tracer);
        self.watchpoints.push(Watchpoint { id, lo, hi });
        debug!("watchpoint {id} installed over [{lo:#010x}, {hi:#010x}]");
        println!("watchpoint {id} installed at {lo:#010x}");
        Ok(id)
    }

    /// Removes the watchpoint with the given id and its backing tracer.
    ///
    /// # Errors
    ///
    /// Errors if no watchpoint with that id is installed.
    pub fn remove_watchpoint(&mut self, id: u32) -> Result<()> {
        let before = self.watchpoints.len();
        self.watchpoints.retain(|wp| wp.id != id);
        if self.watchpoints.len() == before {
            return Err(Error::UnknownWatchpoint(id));
        }
        self.mem.borrow_mut().remove_write_tracer(id);
        debug!("watchpoint {id} removed");
        println!("watchpoint {id} deleted");
        Ok(())
    }

    fn at_breakpoint(&self) -> bool {
        let pc = self.cpu.borrow().pc();
        self.breakpoints.iter().any(|bp| bp.addr == pc)
    }

    fn take_pause(&self) -> bool {
        let mut pause = self.pause.borrow_mut();
        std::mem::replace(&mut *pause, false)
    }

    /// Executes instructions until `limit` is reached (`Some(1)` for `si`),
    /// or indefinitely (`None`, for `c`) until a breakpoint is hit, a
    /// watchpoint fires, or the processor halts or traps.
    fn resume(&mut self, limit: Option<usize>) -> Result<()> {
        let mut executed = 0usize;
        loop {
            let outcome =
                self.cpu.borrow_mut().step(&mut self.mem.borrow_mut()).map_err(Error::Core)?;
            executed += 1;
            let watch_fired = self.take_pause();
            let done = limit.is_some_and(|n| executed >= n);
            if done || watch_fired || self.at_breakpoint() || !matches!(outcome, Step::Continue) {
                break;
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Word> {
        eval::eval(expr, &self.cpu.borrow(), &self.mem.borrow()).map_err(|err| match err {
            eval::Error::Memory(core_err) => Error::Core(core_err),
            other => Error::Eval(other),
        })
    }

    fn install_break(&mut self, expr: &Expr) -> Result<()> {
        let addr = self.eval(expr)?;
        self.add_breakpoint(addr)?;
        Ok(())
    }

    fn install_watch(&mut self, expr: &Expr) -> Result<()> {
        let addr = self.eval(expr)?;
        self.add_watchpoint(addr)?;
        Ok(())
    }

    fn print(&self, expr: &Expr) -> Result<()> {
        let value = self.eval(expr)?;
        println!("{value}");
        Ok(())
    }

    fn examine(&self, n: u32, expr: &Expr) -> Result<()> {
        let base = self.eval(expr)?;
        dump_words(&self.mem.borrow(), base, n).map_err(Error::Core)
    }

    fn info_reg(&self) {
        let cpu = self.cpu.borrow();
        for quad in (0u8..32).collect::<Vec<_>>().chunks(4) {
            let line = quad
                .iter()
                .map(|&i| format!("{} = {:#010x}", ABI_NAMES[usize::from(i)], cpu.reg(i)))
                .collect::<Vec<_>>()
                .join("\t");
            println!("{line}");
        }
    }

    fn info_break(&self) {
        for bp in &self.breakpoints {
            println!("[Breakpoint {}]: vaddr = {:#010x}", bp.id, bp.addr);
        }
    }

    /// Lists installed watchpoints, each followed by its span dumped as
    /// memory.
    ///
    /// # Errors
    ///
    /// Errors if a watchpoint's span is no longer mapped; this cannot
    /// currently happen (the span is validated at [`Debugger::add_watchpoint`]
    /// and the region is never unmapped), but the call stays fallible rather
    /// than discarding the result.
    fn info_watch(&self) -> Result<()> {
        let mem = self.mem.borrow();
        for wp in &self.watchpoints {
            println!("[Watchpoint {}]:", wp.id);
            dump_words(&mem, wp.lo, 1).map_err(Error::Core)?;
        }
        Ok(())
    }

    /// Runs one iteration of command dispatch. Returns `Ok(())` for
    /// successfully handled commands, including those that print a
    /// diagnostic rather than mutate state.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Core`] (fatal) and any other recoverable error
    /// from the command's action; the caller decides what to do with each.
    fn dispatch(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Step => self.resume(Some(1)),
            Command::Continue => self.resume(None),
            Command::Break(expr) => self.install_break(&expr),
            Command::Watch(expr) => self.install_watch(&expr),
            Command::DeleteBreak(id) => self.remove_breakpoint(id),
            Command::DeleteWatch(id) => self.remove_watchpoint(id),
            Command::Print(expr) => self.print(&expr),
            Command::Examine(n, expr) => self.examine(n, &expr),
            Command::InfoReg => {
                self.info_reg();
                Ok(())
            }
            Command::InfoBreak => {
                self.info_break();
                Ok(())
            }
            Command::InfoWatch => self.info_watch(),
            Command::Quit => {
                self.quit = true;
                Ok(())
            }
        }
    }

    /// Runs the REPL: prompt, read a line, parse it, dispatch it, and
    /// repeat until `q`/`quit` or end of input.
    ///
    /// Recoverable errors are printed and the loop continues; a fatal
    /// [`Error::Core`] unwinds out of this call.
    ///
    /// # Errors
    ///
    /// Propagates a fatal error from guest execution or an out-of-range
    /// memory access, or an I/O failure reading the prompt.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        while !self.quit {
            print!("(remu) ");
            io::stdout().flush()?;
            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(cmd) => match self.dispatch(cmd) {
                    Ok(()) => {}
                    Err(Error::Core(err)) => return Err(Error::Core(err)),
                    Err(err) => println!("{err}"),
                },
                Err(err) => {
                    warn!("invalid command `{line}`: {err}");
                    println!("invalid command: {line}");
                }
            }
        }
        Ok(())
    }
}

fn dump_words(mem: &Memory, base: Word, n: u32) -> remu_core::Result<()> {
    for i in 0..n {
        let addr = base.wrapping_add(i * 4);
        let mut bytes = [0u8; 4];
        for (j, byte) in bytes.iter_mut().enumerate() {
            *byte = mem.read8(addr.wrapping_add(j as Word))?;
        }
        println!("{addr:#010x}: {:02X} {:02X} {:02X} {:02X}", bytes[0], bytes[1], bytes[2], bytes[3]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use remu_core::isa::MEM_BASE;

    use super::*;

    fn fresh() -> Debugger {
        Debugger::new(Shared::new(Cpu::new()), Shared::new(Memory::new()))
    }

    #[test]
    fn breakpoint_ids_are_assigned_and_unique_by_addr() {
        let mut dbg = fresh();
        let id1 = dbg.add_breakpoint(MEM_BASE).unwrap();
        let id2 = dbg.add_breakpoint(MEM_BASE).unwrap();
        assert_eq!(id1, id2);
        let id3 = dbg.add_breakpoint(MEM_BASE + 4).unwrap();
        assert_ne!(id1, id3);
    }

    #[test]
    fn misaligned_breakpoint_is_fatal() {
        let mut dbg = fresh();
        assert!(matches!(dbg.add_breakpoint(MEM_BASE + 1), Err(Error::Core(_))));
    }

    #[test]
    fn removing_unknown_breakpoint_errors() {
        let mut dbg = fresh();
        assert!(matches!(dbg.remove_breakpoint(42), Err(Error::UnknownBreakpoint(42))));
    }

    #[test]
    fn at_breakpoint_matches_current_pc() {
        let mut dbg = fresh();
        dbg.add_breakpoint(MEM_BASE).unwrap();
        assert!(dbg.at_breakpoint());
    }

    #[test]
    fn watchpoint_add_then_remove_restores_tracer_count() {
        let mut dbg = fresh();
        let before = dbg.mem.borrow().write_tracer_count();
        let id = dbg.add_watchpoint(MEM_BASE + 0x10).unwrap();
        assert_eq!(dbg.mem.borrow().write_tracer_count(), before + 1);
        dbg.remove_watchpoint(id).unwrap();
        assert_eq!(dbg.mem.borrow().write_tracer_count(), before);
    }

    #[test]
    fn watchpoint_fires_and_requests_pause_on_traced_write() {
        let mut dbg = fresh();
        dbg.add_watchpoint(MEM_BASE + 0x10).unwrap();
        dbg.mem.borrow_mut().write32_traced(MEM_BASE + 0x10, 0xDEAD_BEEF).unwrap();
        assert!(dbg.take_pause());
    }

    #[test]
    fn step_executes_exactly_one_instruction() {
        // addi x1, x0, 5; addi x2, x0, 9
        let mut mem = Memory::new();
        mem.write32(MEM_BASE, 0x0050_0093).unwrap();
        mem.write32(MEM_BASE + 4, 0x0090_0113).unwrap();
        let mut dbg = Debugger::new(Shared::new(Cpu::new()), Shared::new(mem));
        dbg.dispatch(Command::Step).unwrap();
        assert_eq!(dbg.cpu.borrow().reg(1), 5);
        assert_eq!(dbg.cpu.borrow().reg(2), 0);
        assert_eq!(dbg.cpu.borrow().pc(), MEM_BASE + 4);
    }

    #[test]
    fn continue_stops_at_breakpoint() {
        // addi x1, x0, 5; addi x2, x0, 9; addi x3, x0, 1
        let mut mem = Memory::new();
        mem.write32(MEM_BASE, 0x0050_0093).unwrap();
        mem.write32(MEM_BASE + 4, 0x0090_0113).unwrap();
        mem.write32(MEM_BASE + 8, 0x0010_0193).unwrap();
        let mut dbg = Debugger::new(Shared::new(Cpu::new()), Shared::new(mem));
        dbg.add_breakpoint(MEM_BASE + 8).unwrap();
        dbg.dispatch(Command::Continue).unwrap();
        assert_eq!(dbg.cpu.borrow().pc(), MEM_BASE + 8);
        assert_eq!(dbg.cpu.borrow().reg(2), 9);
        assert_eq!(dbg.cpu.borrow().reg(3), 0);
    }

    #[test]
    fn print_evaluates_and_unknown_register_is_recoverable() {
        let dbg = fresh();
        assert!(dbg.print(&Expr::Number(7)).is_ok());
        let err = dbg.print(&Expr::Register("bogus".into())).unwrap_err();
        assert!(matches!(err, Error::Eval(_)));
    }

    #[test]
    fn dereferencing_unmapped_address_is_fatal() {
        let dbg = fresh();
        let err = dbg.print(&Expr::Deref(Box::new(Expr::Number(0)))).unwrap_err();
        assert!(matches!(err, Error::Core(_)));
    }

    #[test]
    fn quit_sets_the_quit_flag() {
        let mut dbg = fresh();
        dbg.dispatch(Command::Quit).unwrap();
        assert!(dbg.quit);
    }

    /// The five-word `auipc`/`sb`/`lbu`/`ebreak` image used by the source
    /// sample: `auipc t0, 0; sb t0, 0x10(t0); lbu a0, 0x10(t0); ebreak`,
    /// followed by a data word.
    fn s1_image() -> Memory {
        let mut mem = Memory::new();
        let words = [0x0000_0297u32, 0x0002_8823, 0x0102_c503, 0x0010_0073, 0xdead_beef];
        for (i, w) in words.iter().enumerate() {
            mem.write32(MEM_BASE + (i as u32) * 4, *w).unwrap();
        }
        mem
    }

    #[test]
    fn s1_auipc_sb_lbu_ebreak() {
        let mut dbg = Debugger::new(Shared::new(Cpu::new()), Shared::new(s1_image()));
        dbg.add_breakpoint(MEM_BASE).unwrap();

        dbg.dispatch(Command::Step).unwrap();
        assert_eq!(dbg.cpu.borrow().reg(5), MEM_BASE); // t0 == base, from auipc

        dbg.dispatch(Command::Step).unwrap();
        assert_eq!(dbg.mem.borrow().read8(MEM_BASE + 0x10).unwrap(), 0x00);

        dbg.dispatch(Command::Step).unwrap();
        assert_eq!(dbg.cpu.borrow().reg(10), 0x00); // a0

        let outcome = dbg.cpu.borrow_mut().step(&mut dbg.mem.borrow_mut()).unwrap();
        assert_eq!(outcome, Step::HaltRequested);
    }

    #[test]
    fn s5_watchpoint_fires_during_continue() {
        let mut dbg = Debugger::new(Shared::new(Cpu::new()), Shared::new(s1_image()));
        dbg.add_watchpoint(MEM_BASE + 0x10).unwrap();
        dbg.dispatch(Command::Continue).unwrap();
        // Paused immediately after the `sb`, before the `lbu` executes.
        assert_eq!(dbg.cpu.borrow().pc(), MEM_BASE + 8);
        assert_eq!(dbg.cpu.borrow().reg(10), 0);
    }

    #[test]
    fn s6_print_register_plus_offset() {
        let mut dbg = Debugger::new(Shared::new(Cpu::new()), Shared::new(s1_image()));
        dbg.dispatch(Command::Step).unwrap();
        let value = dbg
            .eval(&Expr::Add(Box::new(Expr::Register("t0".into())), Box::new(Expr::Number(4))))
            .unwrap();
        assert_eq!(value, MEM_BASE + 4);
    }
}
