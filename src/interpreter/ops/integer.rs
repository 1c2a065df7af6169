//! Integer and boolean instructions
//!
//! All integer arithmetic is 16-bit two's complement and wraps on overflow.
//! Binary operators pop `b` then `a` and compute `a op b`.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::opcodes::op;

impl Interpreter {
    pub(crate) fn integer_op(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            op::ABI => {
                let a = self.pop_int()?;
                self.push_int(a.wrapping_abs())
            }
            op::NGI => {
                let a = self.pop_int()?;
                self.push_int(a.wrapping_neg())
            }
            op::SQI => {
                let a = self.pop_int()?;
                self.push_int(a.wrapping_mul(a))
            }
            op::LNOT => {
                let a = self.pop()?;
                self.push(!a)
            }
            op::CHK => self.range_check(),
            _ => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                let result = match opcode {
                    op::ADI => a.wrapping_add(b),
                    op::SBI => a.wrapping_sub(b),
                    op::MPI => a.wrapping_mul(b),
                    op::DVI | op::MODI if b == 0 => return Err(ExecutionError::DivideByZero.into()),
                    op::DVI => a.wrapping_div(b),
                    op::MODI => a.wrapping_rem(b),
                    op::LAND => a & b,
                    op::LOR => a | b,
                    op::EQUI => (a == b) as i16,
                    op::NEQI => (a != b) as i16,
                    op::LESI => (a < b) as i16,
                    op::LEQI => (a <= b) as i16,
                    op::GRTI => (a > b) as i16,
                    op::GEQI => (a >= b) as i16,
                    _ => {
                        return Err(ExecutionError::UnimplementedInstruction {
                            what: format!("integer opcode {}", opcode),
                        }
                        .into())
                    }
                };
                self.push_int(result)
            }
        }
    }

    /// `CHK`: the checked value stays on the stack even when out of range
    fn range_check(&mut self) -> Result<(), RuntimeError> {
        let upper = self.pop_int()?;
        let lower = self.pop_int()?;
        let value = self.stack.peek(&self.mem, 0)? as i16;
        if value < lower || value > upper {
            return Err(ExecutionError::InvalidIndex { value }.into());
        }
        Ok(())
    }
}
