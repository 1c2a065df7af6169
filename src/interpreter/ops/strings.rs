//! String instructions
//!
//! Strings are a length byte followed by up to 255 characters. String
//! constants live inline in the code stream, right after the opcode.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::opcodes::op;

impl Interpreter {
    /// `LSA` pushes the length byte's address, `LPA` the first character's
    pub(crate) fn load_string_constant(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        let address = self.ipc_address();
        let length = self.fetch_byte()?;
        self.ipc = self.ipc.wrapping_add(length as u16);
        let pushed = if opcode == op::LPA { address.wrapping_add(1) } else { address };
        self.push(pushed)
    }

    /// `SAS max`: assign a string, or a single character below 256
    pub(crate) fn string_assign(&mut self, max: u8) -> Result<(), RuntimeError> {
        let source = self.pop()?;
        let destination = self.pop()?;
        if source < 256 {
            return Ok(self.mem.write_bytes(destination, &[1, source as u8])?);
        }
        let length = self.mem.read_byte(source)?;
        if length > max {
            return Err(ExecutionError::StringTooLong { length, max }.into());
        }
        let bytes = self.mem.read_bytes(source, length as usize + 1)?;
        self.mem.write_bytes(destination, &bytes)?;
        Ok(())
    }

    /// `IXS`: bounds-check a string index, leaving address and index in place
    pub(crate) fn string_index(&mut self) -> Result<(), RuntimeError> {
        let index = self.stack.peek(&self.mem, 0)? as i16;
        let address = self.stack.peek(&self.mem, 1)?;
        let length = self.mem.read_byte(address)? as i16;
        if index < 1 || index > length {
            return Err(ExecutionError::InvalidIndex { value: index }.into());
        }
        Ok(())
    }
}
