//! REAL instructions
//!
//! A REAL occupies two stack words, low word on top.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::opcodes::op;

impl Interpreter {
    pub(crate) fn pop_real(&mut self) -> Result<f32, ExecutionError> {
        self.stack.pop_real(&self.mem)
    }

    pub(crate) fn push_real(&mut self, value: f32) -> Result<(), RuntimeError> {
        Ok(self.stack.push_real(&mut self.mem, value)?)
    }

    pub(crate) fn real_op(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            op::ABR => {
                let a = self.pop_real()?;
                self.push_real(a.abs())
            }
            op::NGR => {
                let a = self.pop_real()?;
                self.push_real(-a)
            }
            op::SQR => {
                let a = self.pop_real()?;
                self.push_real(a * a)
            }
            // Integer on top
            op::FLT => {
                let a = self.pop_int()?;
                self.push_real(a as f32)
            }
            // Integer under a REAL
            op::FLO => {
                let top = self.pop_real()?;
                let a = self.pop_int()?;
                self.push_real(a as f32)?;
                self.push_real(top)
            }
            _ => {
                let b = self.pop_real()?;
                let a = self.pop_real()?;
                let result = match opcode {
                    op::ADR => a + b,
                    op::SBR => a - b,
                    op::MPR => a * b,
                    op::DVR if b == 0.0 => return Err(ExecutionError::DivideByZero.into()),
                    op::DVR => a / b,
                    _ => {
                        return Err(ExecutionError::UnimplementedInstruction {
                            what: format!("real opcode {}", opcode),
                        }
                        .into())
                    }
                };
                self.push_real(result)
            }
        }
    }
}
