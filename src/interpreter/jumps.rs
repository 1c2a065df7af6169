//! Branch instructions
//!
//! A non-negative displacement is relative to the byte after the
//! instruction. A negative one selects a word in the current procedure's
//! jump table, just below its attribute table:
//!
//! ```text
//! slot   = JTAB + displacement
//! target = slot - word(slot)
//! ```

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::opcodes::op;

impl Interpreter {
    /// Continue at an absolute code address
    fn jump_to(&mut self, target: u16) {
        self.ipc = target.wrapping_sub(self.ipc_base);
    }

    fn take_branch(&mut self, displacement: i8) -> Result<(), RuntimeError> {
        if displacement >= 0 {
            self.ipc = self.ipc.wrapping_add(displacement as u16);
        } else {
            let slot = self.jtab.wrapping_add_signed(displacement as i16);
            let target = self.self_relative(slot)?;
            self.jump_to(target);
        }
        Ok(())
    }

    /// `UJP`, `FJP`, `EFJ`, `NFJ`
    pub(crate) fn branch(&mut self, opcode: u8, displacement: i8) -> Result<(), RuntimeError> {
        let taken = match opcode {
            op::UJP => true,
            op::FJP => !self.stack.pop_bool(&self.mem)?,
            // EFJ and NFJ
            _ => {
                let b = self.pop()?;
                let a = self.pop()?;
                (a == b) == (opcode == op::NFJ)
            }
        };
        if taken {
            self.take_branch(displacement)?;
        }
        Ok(())
    }

    /// `XJP`: indexed jump through a self-relative case table
    ///
    /// ```text
    /// (aligned) low, high
    /// UJP default          <- falls through here when out of range
    /// entry for low
    /// ...
    /// entry for high
    /// ```
    pub(crate) fn case_jump(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop_int()?;
        let low = self.fetch_word()? as i16;
        let high = self.fetch_word()? as i16;
        if value < low || value > high {
            return Ok(());
        }
        let index = (value as i32 - low as i32) as u16;
        let entry = self
            .ipc_address()
            .wrapping_add(2)
            .wrapping_add(index.wrapping_mul(2));
        let target = self.self_relative(entry)?;
        self.jump_to(target);
        Ok(())
    }
}
