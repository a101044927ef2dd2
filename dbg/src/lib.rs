//! GDB-like debugger built on top of `remu-core`: breakpoints, memory
//! watchpoints, single-stepping, and the small expression language used at
//! the prompt.

#![warn(clippy::pedantic)]

pub mod debugger;
pub mod eval;
pub mod lang;

pub use crate::debugger::Debugger;
pub use crate::lang::{Command, Expr};
