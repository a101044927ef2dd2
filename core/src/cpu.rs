//! The processor: register file, program counter, and the fetch-decode-
//! execute stepper.

use log::trace;

use crate::decode::{self, Instruction};
use crate::error::Result;
use crate::isa::{Csr, ExceptionCause, Word, MEM_BASE, NUM_REGS};
use crate::mem::Memory;

/// Outcome of a single [`Cpu::step`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// The instruction executed normally.
    Continue,
    /// An `ebreak` was executed; the caller should treat this as a request
    /// to halt (the conventional use as a debugger breakpoint marker).
    HaltRequested,
    /// An `ecall` was executed; the cause is recorded but not vectored.
    Trap(ExceptionCause),
}

/// The integer register file.
///
/// Register `x0` always reads as zero; writes to it are silently discarded,
/// matching the architectural convention.
#[derive(Clone, Debug)]
pub struct RegFile([Word; NUM_REGS]);

impl Default for RegFile {
    fn default() -> Self {
        Self([0; NUM_REGS])
    }
}

impl RegFile {
    /// Reads register `idx`.
    #[must_use]
    pub fn load(&self, idx: u8) -> Word {
        self.0[usize::from(idx)]
    }

    /// Writes register `idx`, discarding writes to `x0`.
    pub fn store(&mut self, idx: u8, value: Word) {
        if idx != 0 {
            self.0[usize::from(idx)] = value;
        }
    }
}

/// The processor state: registers, program counter, and machine-mode CSR
/// storage.
#[derive(Clone, Debug)]
pub struct Cpu {
    regs: RegFile,
    pc: Word,
    npc: Word,
    csr: [Word; Csr::COUNT],
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Constructs a processor with all registers zeroed and `pc` at the
    /// mapped memory base.
    #[must_use]
    pub fn new() -> Self {
        Self { regs: RegFile::default(), pc: MEM_BASE, npc: MEM_BASE, csr: [0; Csr::COUNT] }
    }

    /// Reads general register `idx`.
    #[must_use]
    pub fn reg(&self, idx: u8) -> Word {
        self.regs.load(idx)
    }

    /// Writes general register `idx` (writes to `x0` are discarded).
    pub fn set_reg(&mut self, idx: u8, value: Word) {
        self.regs.store(idx, value);
    }

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> Word {
        self.pc
    }

    /// Address that will become `pc` after the in-flight instruction
    /// completes.
    #[must_use]
    pub fn npc(&self) -> Word {
        self.npc
    }

    /// Overwrites the next program counter; used by branch and jump
    /// semantics.
    pub fn set_npc(&mut self, npc: Word) {
        self.npc = npc;
    }

    /// Reads a machine-mode CSR storage slot.
    #[must_use]
    pub fn csr(&self, csr: Csr) -> Word {
        self.csr[csr.slot()]
    }

    /// Writes a machine-mode CSR storage slot.
    pub fn set_csr(&mut self, csr: Csr, value: Word) {
        self.csr[csr.slot()] = value;
    }

    /// Fetches, decodes, and executes one instruction, then advances `pc`
    /// to `npc`.
    ///
    /// # Errors
    ///
    /// Errors if the fetch address is invalid or the fetched word decodes
    /// to no defined operation.
    pub fn step(&mut self, mem: &mut Memory) -> Result<Step> {
        let raw = mem.read32(self.pc)?;
        self.npc = self.pc.wrapping_add(4);
        let insn = Instruction::decode(self.pc, raw)?;
        trace!("{:#010x}: {raw:#010x}", self.pc);
        let outcome = decode::execute(insn, self, mem)?;
        self.pc = self.npc;
        Ok(outcome)
    }

    /// Executes up to `n` instructions, stopping early on halt, trap, or
    /// error.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Cpu::step`].
    pub fn execute(&mut self, mem: &mut Memory, n: usize) -> Result<Step> {
        let mut last = Step::Continue;
        for _ in 0..n {
            last = self.step(mem)?;
            if !matches!(last, Step::Continue) {
                break;
            }
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x0_reads_zero_after_write() {
        let mut regs = RegFile::default();
        regs.store(0, 0xFFFF_FFFF);
        assert_eq!(regs.load(0), 0);
    }

    #[test]
    fn fresh_cpu_starts_at_mem_base() {
        let cpu = Cpu::new();
        assert_eq!(cpu.pc(), MEM_BASE);
        assert_eq!(cpu.npc(), MEM_BASE);
    }

    fn encode_i(imm: i32, rs1: u8, funct3: u8, rd: u8, opcode: u32) -> u32 {
        (((imm as u32) & 0xFFF) << 20)
            | (u32::from(rs1) << 15)
            | (u32::from(funct3) << 12)
            | (u32::from(rd) << 7)
            | opcode
    }

    fn encode_b(imm: i32, rs1: u8, rs2: u8, funct3: u8) -> u32 {
        let v = imm as u32;
        let bit12 = (v >> 12) & 0x1;
        let bit11 = (v >> 11) & 0x1;
        let bits10_5 = (v >> 5) & 0x3F;
        let bits4_1 = (v >> 1) & 0xF;
        (bit12 << 31)
            | (bits10_5 << 25)
            | (u32::from(rs2) << 20)
            | (u32::from(rs1) << 15)
            | (u32::from(funct3) << 12)
            | (bits4_1 << 8)
            | (bit11 << 7)
            | 0b1100011
    }

    fn encode_s(imm: i32, rs1: u8, rs2: u8, funct3: u8) -> u32 {
        let v = imm as u32 & 0xFFF;
        let hi = (v >> 5) & 0x7F;
        let lo = v & 0x1F;
        (hi << 25)
            | (u32::from(rs2) << 20)
            | (u32::from(rs1) << 15)
            | (u32::from(funct3) << 12)
            | (lo << 7)
            | 0b0100011
    }

    #[test]
    fn s2_addi_chain() {
        let mut mem = Memory::new();
        mem.write32(MEM_BASE, encode_i(5, 0, 0b000, 1, 0b0010011)).unwrap(); // addi x1, x0, 5
        mem.write32(MEM_BASE + 4, encode_i(-1, 1, 0b000, 2, 0b0010011)).unwrap(); // addi x2, x1, -1
        let mut cpu = Cpu::new();
        cpu.step(&mut mem).unwrap();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg(1), 5);
        assert_eq!(cpu.reg(2), 4);
        assert_eq!(cpu.pc(), MEM_BASE + 8);
    }

    #[test]
    fn s3_beq_taken_backward() {
        let mut mem = Memory::new();
        mem.write32(MEM_BASE, encode_i(1, 0, 0b000, 1, 0b0010011)).unwrap(); // addi x1, x0, 1
        mem.write32(MEM_BASE + 4, encode_i(1, 0, 0b000, 2, 0b0010011)).unwrap(); // addi x2, x0, 1
        mem.write32(MEM_BASE + 8, encode_b(-8, 1, 2, 0b000)).unwrap(); // beq x1, x2, -8
        let mut cpu = Cpu::new();
        for _ in 0..3 {
            cpu.step(&mut mem).unwrap();
        }
        assert_eq!(cpu.pc(), MEM_BASE);
    }

    #[test]
    fn s4_lw_sw_roundtrip() {
        let mut mem = Memory::new();
        let target: u32 = 0x8000_1000; // 4 KiB-aligned, so `lui` alone reaches it
        // lui x1, hi(target); sw x2, 0(x1); lw x3, 0(x1)
        mem.write32(MEM_BASE, (target & 0xFFFF_F000) | (1 << 7) | 0b0110111).unwrap();
        mem.write32(MEM_BASE + 4, encode_s(0, 1, 2, 0b010)).unwrap();
        mem.write32(MEM_BASE + 8, encode_i(0, 1, 0b010, 3, 0b0000011)).unwrap();
        let mut cpu = Cpu::new();
        cpu.set_reg(2, 0xCAFE_BABE);
        for _ in 0..3 {
            cpu.step(&mut mem).unwrap();
        }
        assert_eq!(cpu.reg(3), 0xCAFE_BABE);
    }
}
