// Standard procedures (CSP)

use crate::interpreter::constants::MAX_UNIT;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::ops::decimal;
use crate::interpreter::syscom;
use crate::storage::{CONSOLE_UNIT, IO_BAD_UNIT, IO_DEVICE_ERROR, IO_NO_UNIT, IO_OK, SYSTERM_UNIT};
use tracing::debug;

/// Standard procedure numbers
pub mod csp {
    pub const IOCHECK: u8 = 0;
    pub const NEW: u8 = 1;
    pub const MOVELEFT: u8 = 2;
    pub const MOVERIGHT: u8 = 3;
    pub const EXIT: u8 = 4;
    pub const UNITREAD: u8 = 5;
    pub const UNITWRITE: u8 = 6;
    pub const IDSEARCH: u8 = 7;
    pub const TREESEARCH: u8 = 8;
    pub const TIME: u8 = 9;
    pub const FILLCHAR: u8 = 10;
    pub const SCAN: u8 = 11;
    pub const UNITSTATUS: u8 = 12;
    pub const GETSEG: u8 = 21;
    pub const RELSEG: u8 = 22;
    pub const TRUNC: u8 = 23;
    pub const ROUND: u8 = 24;
    pub const SIN: u8 = 25;
    pub const COS: u8 = 26;
    pub const LOG: u8 = 27;
    pub const ATAN: u8 = 28;
    pub const LN: u8 = 29;
    pub const EXP: u8 = 30;
    pub const SQRT: u8 = 31;
    pub const MARK: u8 = 32;
    pub const RELEASE: u8 = 33;
    pub const IORESULT: u8 = 34;
    pub const UNITBUSY: u8 = 35;
    pub const PWROFTEN: u8 = 36;
    pub const UNITWAIT: u8 = 37;
    pub const UNITCLEAR: u8 = 38;
    pub const HALT: u8 = 39;
    pub const MEMAVAIL: u8 = 40;
    pub const DECOPS: u8 = 41;
}

/// Name of a standard procedure, for the disassembler
pub fn csp_name(code: u8) -> Option<&'static str> {
    let name = match code {
        csp::IOCHECK => "IOCHECK",
        csp::NEW => "NEW",
        csp::MOVELEFT => "MOVELEFT",
        csp::MOVERIGHT => "MOVERIGHT",
        csp::EXIT => "EXIT",
        csp::UNITREAD => "UNITREAD",
        csp::UNITWRITE => "UNITWRITE",
        csp::IDSEARCH => "IDSEARCH",
        csp::TREESEARCH => "TREESEARCH",
        csp::TIME => "TIME",
        csp::FILLCHAR => "FILLCHAR",
        csp::SCAN => "SCAN",
        csp::UNITSTATUS => "UNITSTATUS",
        csp::GETSEG => "GETSEG",
        csp::RELSEG => "RELSEG",
        csp::TRUNC => "TRUNC",
        csp::ROUND => "ROUND",
        csp::SIN => "SIN",
        csp::COS => "COS",
        csp::LOG => "LOG",
        csp::ATAN => "ATAN",
        csp::LN => "LN",
        csp::EXP => "EXP",
        csp::SQRT => "SQRT",
        csp::MARK => "MARK",
        csp::RELEASE => "RELEASE",
        csp::IORESULT => "IORESULT",
        csp::UNITBUSY => "UNITBUSY",
        csp::PWROFTEN => "PWROFTEN",
        csp::UNITWAIT => "UNITWAIT",
        csp::UNITCLEAR => "UNITCLEAR",
        csp::HALT => "HALT",
        csp::MEMAVAIL => "MEMAVAIL",
        csp::DECOPS => "DECOPS",
        _ => return None,
    };
    Some(name)
}

/// Unit I/O direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Read,
    Write,
}

fn is_console(unit: u16) -> bool {
    unit == CONSOLE_UNIT || unit == SYSTERM_UNIT
}

impl Interpreter {
    pub(crate) fn standard_procedure(&mut self, code: u8) -> Result<(), RuntimeError> {
        match code {
            csp::IOCHECK => {
                if self.io_result != IO_OK {
                    return Err(ExecutionError::UserIoError {
                        result: self.io_result,
                    }
                    .into());
                }
                Ok(())
            }
            csp::NEW => {
                let words = self.pop()?;
                let pointer = self.pop()?;
                let address = self.heap.allocate(words, self.psp)?;
                self.mem.write_word(pointer, address)?;
                Ok(())
            }
            csp::MOVELEFT | csp::MOVERIGHT => {
                let count = self.pop_int()?;
                let destination = self.pop()?;
                let source = self.pop()?;
                self.move_bytes(source, destination, count, code == csp::MOVERIGHT)
            }
            csp::EXIT => {
                let procedure = self.pop()? as u8;
                let segment = self.pop()? as u8;
                self.exit_procedure(segment, procedure)
            }
            csp::UNITREAD => self.unit_io(Transfer::Read),
            csp::UNITWRITE => self.unit_io(Transfer::Write),
            csp::TIME => {
                let low = self.pop()?;
                let high = self.pop()?;
                let ticks = (self.started.elapsed().as_millis() * 60 / 1000) as u32;
                self.mem.write_word(high, (ticks >> 16) as u16)?;
                self.mem.write_word(low, ticks as u16)?;
                Ok(())
            }
            csp::FILLCHAR => {
                let ch = self.pop()? as u8;
                let count = self.pop_int()?;
                let destination = self.pop()?;
                if count > 0 {
                    self.mem.write_bytes(destination, &vec![ch; count as usize])?;
                }
                Ok(())
            }
            csp::SCAN => self.scan(),
            csp::UNITSTATUS => self.unit_status(),
            csp::GETSEG => {
                let segment = self.pop()? as u8;
                self.segments.load(
                    segment,
                    &mut self.mem,
                    &mut self.storage,
                    &mut self.psp,
                    self.heap.np(),
                )?;
                Ok(())
            }
            csp::RELSEG => {
                let segment = self.pop()? as u8;
                if segment != 0 {
                    self.segments.unload(segment, &mut self.mem)?;
                    self.reclaim_program_stack();
                }
                Ok(())
            }
            csp::TRUNC | csp::ROUND => {
                let value = self.pop_real()?;
                let value = if code == csp::ROUND { value.round() } else { value.trunc() };
                if !(i16::MIN as f32..=i16::MAX as f32).contains(&value) {
                    return Err(ExecutionError::IntegerOverflow.into());
                }
                self.push_int(value as i16)
            }
            csp::SIN | csp::COS | csp::LOG | csp::ATAN | csp::LN | csp::EXP | csp::SQRT => {
                let x = self.pop_real()?;
                let result = match code {
                    csp::SIN => x.sin(),
                    csp::COS => x.cos(),
                    csp::ATAN => x.atan(),
                    csp::EXP => x.exp(),
                    csp::LOG | csp::LN if x <= 0.0 => {
                        return Err(ExecutionError::FloatingPointError.into())
                    }
                    csp::LOG => x.log10(),
                    csp::LN => x.ln(),
                    _ if x < 0.0 => return Err(ExecutionError::FloatingPointError.into()),
                    _ => x.sqrt(),
                };
                self.push_real(result)
            }
            csp::MARK => {
                let address = self.pop()?;
                self.mem.write_word(address, self.heap.mark())?;
                Ok(())
            }
            csp::RELEASE => {
                let address = self.pop()?;
                let mark = self.mem.read_word(address)?;
                self.heap.release(mark)?;
                Ok(())
            }
            csp::IORESULT => self.push(self.io_result),
            csp::UNITBUSY => {
                self.pop()?;
                self.push_bool(false)
            }
            csp::UNITWAIT => {
                self.pop()?;
                Ok(())
            }
            csp::UNITCLEAR => {
                let unit = self.pop()?;
                let result = if unit > MAX_UNIT {
                    IO_BAD_UNIT
                } else if is_console(unit) || self.storage.is_mounted(unit) {
                    IO_OK
                } else {
                    IO_NO_UNIT
                };
                self.set_io_result(result)
            }
            csp::PWROFTEN => {
                let exponent = self.pop_int()?;
                if !(0..=37).contains(&exponent) {
                    return Err(ExecutionError::InvalidIndex { value: exponent }.into());
                }
                self.push_real(10f32.powi(exponent as i32))
            }
            csp::HALT => Err(ExecutionError::Halt.into()),
            csp::MEMAVAIL => {
                let words = self.heap.available(self.psp).min(i16::MAX as u16);
                self.push(words)
            }
            csp::DECOPS => Ok(decimal::execute(&mut self.stack, &mut self.mem)?),
            _ => Err(ExecutionError::UnimplementedInstruction {
                what: match csp_name(code) {
                    Some(name) => format!("standard procedure {}", name),
                    None => format!("standard procedure {}", code),
                },
            }
            .into()),
        }
    }

    fn set_io_result(&mut self, result: u16) -> Result<(), RuntimeError> {
        self.io_result = result;
        syscom::write_io_result(&mut self.mem, result)?;
        Ok(())
    }

    /// MOVELEFT copies from the low end up, MOVERIGHT from the high end down
    fn move_bytes(
        &mut self,
        source: u16,
        destination: u16,
        count: i16,
        from_right: bool,
    ) -> Result<(), RuntimeError> {
        if count <= 0 {
            return Ok(());
        }
        let count = count as u16;
        let step = |i: u16| if from_right { count - 1 - i } else { i };
        for i in 0..count {
            let offset = step(i);
            let byte = self.mem.read_byte(source.wrapping_add(offset))?;
            self.mem.write_byte(destination.wrapping_add(offset), byte)?;
        }
        Ok(())
    }

    /// SCAN: count bytes until one does (kind 0) or does not (kind 1) equal `ch`
    ///
    /// A negative limit scans toward lower addresses and yields a negative
    /// offset. Reaching the limit yields the limit.
    fn scan(&mut self) -> Result<(), RuntimeError> {
        let _mask = self.pop()?;
        let address = self.pop()?;
        let ch = self.pop()? as u8;
        let kind = self.pop()?;
        let limit = self.pop_int()?;

        let direction: i16 = if limit < 0 { -1 } else { 1 };
        let mut offset: i16 = 0;
        while offset != limit {
            let byte = self.mem.read_byte(address.wrapping_add_signed(offset))?;
            let found = if kind == 0 { byte == ch } else { byte != ch };
            if found {
                break;
            }
            offset += direction;
        }
        self.push_int(offset)
    }

    fn unit_status(&mut self) -> Result<(), RuntimeError> {
        let _control = self.pop()?;
        let address = self.pop()?;
        let unit = self.pop()?;

        let status = if is_console(unit) {
            Ok(self.console.has_input() as u16)
        } else if unit > MAX_UNIT {
            Err(IO_BAD_UNIT)
        } else {
            match self.storage.unit(unit) {
                Some(disk) => Ok(disk.blocks().min(u16::MAX as u64) as u16),
                None => Err(IO_NO_UNIT),
            }
        };
        match status {
            Ok(word) => {
                self.mem.write_word(address, 0)?;
                self.mem.write_word(address.wrapping_add(2), word)?;
                self.set_io_result(IO_OK)
            }
            Err(result) => self.set_io_result(result),
        }
    }

    /// UNITREAD / UNITWRITE
    ///
    /// Operands, pushed in this order: unit, buffer address, byte offset,
    /// length, block, control word.
    fn unit_io(&mut self, transfer: Transfer) -> Result<(), RuntimeError> {
        let _control = self.pop()?;
        let block = self.pop()?;
        let length = self.pop()? as usize;
        let offset = self.pop()?;
        let address = self.pop()?;
        let unit = self.pop()?;
        let buffer = address.wrapping_add(offset);

        let result = if is_console(unit) {
            self.console_io(unit, transfer, buffer, length)?
        } else {
            let outcome = match transfer {
                Transfer::Read => self
                    .storage
                    .read_blocks(unit, block, length)
                    .map(Some),
                Transfer::Write => {
                    let bytes = self.mem.read_bytes(buffer, length)?;
                    self.storage.write_blocks(unit, block, &bytes).map(|_| None)
                }
            };
            match outcome {
                Ok(Some(bytes)) => {
                    self.mem.write_bytes(buffer, &bytes)?;
                    IO_OK
                }
                Ok(None) => IO_OK,
                Err(e) => {
                    debug!(unit, block, length, "unit I/O failed: {}", e);
                    e.io_result()
                }
            }
        };
        self.set_io_result(result)
    }

    fn console_io(
        &mut self,
        unit: u16,
        transfer: Transfer,
        buffer: u16,
        length: usize,
    ) -> Result<u16, RuntimeError> {
        match transfer {
            Transfer::Write => {
                let bytes = self.mem.read_bytes(buffer, length)?;
                self.console.write_bytes(&bytes);
                Ok(IO_OK)
            }
            Transfer::Read => {
                for i in 0..length {
                    let Some(byte) = self.console.read_byte() else {
                        return Ok(IO_DEVICE_ERROR);
                    };
                    if unit == CONSOLE_UNIT {
                        self.console.write_bytes(&[byte]);
                    }
                    self.mem.write_byte(buffer.wrapping_add(i as u16), byte)?;
                }
                Ok(IO_OK)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_names() {
        assert_eq!(csp_name(csp::MOVELEFT), Some("MOVELEFT"));
        assert_eq!(csp_name(csp::DECOPS), Some("DECOPS"));
        assert_eq!(csp_name(13), None);
    }
}
