//! `fence` / `fence.i`.
//!
//! This emulator has no pipeline or cache to order, so both forms are
//! true no-ops: they must never fault.

use crate::cpu::{Cpu, Step};
use crate::error::Result;
use crate::isa::Word;
use crate::mem::Memory;

pub fn exec(_cpu: &mut Cpu, _mem: &mut Memory, _raw: Word) -> Result<Step> {
    Ok(Step::Continue)
}
