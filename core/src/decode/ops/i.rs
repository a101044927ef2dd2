//! Immediate arithmetic/logic operations.
//!
//! `slli` is decoded as its own terminal case rather than falling through
//! into the `srli`/`srai` dispatch.

use crate::cpu::{Cpu, Step};
use crate::decode::{funct3, funct7, imm_i, rd, rs1, shamt};
use crate::error::{Error, Result};
use crate::isa::{sign_extend, Word};
use crate::mem::Memory;

pub fn exec(cpu: &mut Cpu, _mem: &mut Memory, raw: Word) -> Result<Step> {
    let ua = cpu.reg(rs1(raw));
    let a = ua as i32;
    let simm = sign_extend(imm_i(raw), 12) as i32;
    let uimm = simm as Word;
    let result = match funct3(raw) {
        0b000 => ua.wrapping_add(uimm), // addi
        0b010 => Word::from(a < simm), // slti
        0b011 => Word::from(ua < uimm), // sltiu
        0b100 => ua ^ uimm, // xori
        0b110 => ua | uimm, // ori
        0b111 => ua & uimm, // andi
        0b001 => ua.wrapping_shl(shamt(raw)), // slli
        0b101 => match funct7(raw) {
            0b000_0000 => ua.wrapping_shr(shamt(raw)), // srli
            0b010_0000 => a.wrapping_shr(shamt(raw)) as Word, // srai
            _ => return Err(Error::illegal_instruction(cpu.pc(), raw)),
        },
        _ => return Err(Error::illegal_instruction(cpu.pc(), raw)),
    };
    cpu.set_reg(rd(raw), result);
    Ok(Step::Continue)
}
