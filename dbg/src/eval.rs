//! Evaluates [`Expr`] trees against a processor/memory snapshot.

use remu_core::isa::reg_by_name;
use remu_core::{Cpu, Memory, Word};
use thiserror::Error;

use crate::lang::Expr;

/// A convenient type alias for [`Result`](std::result::Result).
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error evaluating an expression.
#[derive(Debug, Error)]
pub enum Error {
    /// The expression referenced a register name that does not exist.
    #[error("unknown register `${0}`")]
    UnknownRegister(String),
    /// Division by zero within an expression.
    #[error("division by zero")]
    DivisionByZero,
    /// A dereference addressed memory outside the mapped region.
    #[error(transparent)]
    Memory(#[from] remu_core::error::Error),
}

/// Evaluates `expr`, reading registers from `cpu` and dereferencing through
/// `mem` without firing tracers (inspection, not guest access).
///
/// # Errors
///
/// Errors on an unknown register name, division by zero, or a dereference
/// outside the mapped region.
pub fn eval(expr: &Expr, cpu: &Cpu, mem: &Memory) -> Result<Word> {
    Ok(match expr {
        Expr::Number(n) => *n,
        Expr::Register(name) => {
            let idx = reg_by_name(name).ok_or_else(|| Error::UnknownRegister(name.clone()))?;
            cpu.reg(idx)
        }
        Expr::Deref(inner) => mem.read32(eval(inner, cpu, mem)?)?,
        Expr::Neg(inner) => (eval(inner, cpu, mem)? as i32).wrapping_neg() as Word,
        Expr::Not(inner) => Word::from(eval(inner, cpu, mem)? == 0),
        Expr::Add(a, b) => eval(a, cpu, mem)?.wrapping_add(eval(b, cpu, mem)?),
        Expr::Sub(a, b) => eval(a, cpu, mem)?.wrapping_sub(eval(b, cpu, mem)?),
        Expr::Mul(a, b) => eval(a, cpu, mem)?.wrapping_mul(eval(b, cpu, mem)?),
        Expr::Div(a, b) => {
            let (a, b) = (eval(a, cpu, mem)?, eval(b, cpu, mem)?);
            if b == 0 {
                return Err(Error::DivisionByZero);
            }
            a / b
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_literal_evaluates_to_itself() {
        let cpu = Cpu::new();
        let mem = Memory::new();
        assert_eq!(eval(&Expr::Number(42), &cpu, &mem).unwrap(), 42);
    }

    #[test]
    fn register_reads_through_abi_name() {
        let mut cpu = Cpu::new();
        let mem = Memory::new();
        cpu.set_reg(5, 0x1234); // t0
        let expr = Expr::Register("t0".into());
        assert_eq!(eval(&expr, &cpu, &mem).unwrap(), 0x1234);
    }

    #[test]
    fn deref_reads_memory() {
        let cpu = Cpu::new();
        let mut mem = Memory::new();
        mem.write32(remu_core::isa::MEM_BASE, 0xABCD_EF01).unwrap();
        let expr = Expr::Deref(Box::new(Expr::Number(remu_core::isa::MEM_BASE)));
        assert_eq!(eval(&expr, &cpu, &mem).unwrap(), 0xABCD_EF01);
    }

    #[test]
    fn division_by_zero_errors() {
        let cpu = Cpu::new();
        let mem = Memory::new();
        let expr = Expr::Div(Box::new(Expr::Number(1)), Box::new(Expr::Number(0)));
        assert!(matches!(eval(&expr, &cpu, &mem), Err(Error::DivisionByZero)));
    }

    #[test]
    fn arithmetic_precedence_matches_grammar() {
        // 2 + 3 * 4 built directly as an AST to check evaluation order,
        // not parsing (parsing is exercised in lang::parse tests).
        let cpu = Cpu::new();
        let mem = Memory::new();
        let expr = Expr::Add(
            Box::new(Expr::Number(2)),
            Box::new(Expr::Mul(Box::new(Expr::Number(3)), Box::new(Expr::Number(4)))),
        );
        assert_eq!(eval(&expr, &cpu, &mem).unwrap(), 14);
    }
}
