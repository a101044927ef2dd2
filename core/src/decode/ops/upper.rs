//! `lui` and `auipc`.

use crate::cpu::{Cpu, Step};
use crate::decode::{imm_u, rd};
use crate::error::Result;
use crate::isa::Word;
use crate::mem::Memory;

pub fn exec_lui(cpu: &mut Cpu, _mem: &mut Memory, raw: Word) -> Result<Step> {
    cpu.set_reg(rd(raw), imm_u(raw));
    Ok(Step::Continue)
}

pub fn exec_auipc(cpu: &mut Cpu, _mem: &mut Memory, raw: Word) -> Result<Step> {
    cpu.set_reg(rd(raw), cpu.pc().wrapping_add(imm_u(raw)));
    Ok(Step::Continue)
}
