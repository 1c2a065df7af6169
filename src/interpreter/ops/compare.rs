//! Typed comparisons: `EQU` `NEQ` `LES` `LEQ` `GRT` `GEQ`
//!
//! The type byte after the opcode selects the operand kind. Array
//! comparisons carry an extra `B` operand with the size. Operands are
//! popped `b` first, then `a`, and the result is `a op b`.

use super::sets::PSet;
use crate::interpreter::constants::REAL_EPSILON;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::opcodes::{cmp, mnemonic, op};
use std::cmp::Ordering;

fn ordered(opcode: u8, ordering: Ordering) -> bool {
    match opcode {
        op::EQU => ordering == Ordering::Equal,
        op::NEQ => ordering != Ordering::Equal,
        op::LES => ordering == Ordering::Less,
        op::LEQ => ordering != Ordering::Greater,
        op::GRT => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }
}

/// REAL ordering with epsilon equality
pub fn compare_reals(a: f32, b: f32) -> Ordering {
    if (a - b).abs() < REAL_EPSILON {
        Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(Ordering::Less)
    }
}

impl Interpreter {
    /// Read a length-prefixed string
    pub(crate) fn read_string(&self, address: u16) -> Result<Vec<u8>, ExecutionError> {
        let length = self.mem.read_byte(address)?;
        self.mem.read_bytes(address.wrapping_add(1), length as usize)
    }

    pub(crate) fn compare_op(&mut self, opcode: u8, kind: u8) -> Result<(), RuntimeError> {
        let result = match kind {
            cmp::REAL => {
                let b = self.pop_real()?;
                let a = self.pop_real()?;
                ordered(opcode, compare_reals(a, b))
            }
            cmp::STRING => {
                let b = self.pop()?;
                let a = self.pop()?;
                let (a, b) = (self.read_string(a)?, self.read_string(b)?);
                ordered(opcode, a.cmp(&b))
            }
            cmp::BOOLEAN => {
                let b = self.pop()? & 1;
                let a = self.pop()? & 1;
                ordered(opcode, a.cmp(&b))
            }
            cmp::SET => {
                let b = PSet::pop(&mut self.stack, &self.mem)?;
                let a = PSet::pop(&mut self.stack, &self.mem)?;
                match opcode {
                    op::EQU => a.equals(&b),
                    op::NEQ => !a.equals(&b),
                    op::LEQ => a.is_subset(&b),
                    op::GEQ => b.is_subset(&a),
                    op::LES => a.is_proper_subset(&b),
                    _ => b.is_proper_subset(&a),
                }
            }
            cmp::BYTE_ARRAY => {
                let size = self.fetch_big()? as usize;
                let b = self.pop()?;
                let a = self.pop()?;
                let (a, b) = (self.mem.read_bytes(a, size)?, self.mem.read_bytes(b, size)?);
                ordered(opcode, a.cmp(&b))
            }
            cmp::WORD_ARRAY if matches!(opcode, op::EQU | op::NEQ) => {
                let words = self.fetch_big()? as usize;
                let b = self.pop()?;
                let a = self.pop()?;
                let equal =
                    self.mem.read_bytes(a, 2 * words)? == self.mem.read_bytes(b, 2 * words)?;
                equal == (opcode == op::EQU)
            }
            _ => {
                return Err(ExecutionError::UnimplementedInstruction {
                    what: format!("{} with comparison type {}", mnemonic(opcode), kind),
                }
                .into())
            }
        };
        self.push_bool(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_equality_uses_epsilon() {
        assert_eq!(compare_reals(1.0, 1.0 + 1e-8), Ordering::Equal);
        assert_eq!(compare_reals(1.0, 1.5), Ordering::Less);
        assert!(!ordered(op::NEQ, compare_reals(0.1 + 0.2, 0.3)));
    }

    #[test]
    fn test_ordered_covers_every_relation() {
        assert!(ordered(op::LEQ, Ordering::Equal));
        assert!(ordered(op::GEQ, Ordering::Greater));
        assert!(!ordered(op::GRT, Ordering::Equal));
        assert!(ordered(op::LES, Ordering::Less));
    }
}
