//! Operand addressing modes
//!
//! Every load, store and address-of instruction names its operand through
//! one of five modes. Each is resolved once into a plain address, so the
//! instructions themselves never care which mode they were given.
//!
//! | Mode | Frame | Instructions |
//! |---|---|---|
//! | Local | MP | `LDL` `LLA` `STL` `SLDL` |
//! | Global | Base | `LDO` `LAO` `SRO` `SLDO` |
//! | Intermediate | `levels` static links up from MP | `LOD` `LDA` `STR` |
//! | External | the segment's data base | `LDE` `LAE` `STE` |
//! | Indirect | address popped from the stack | `IND` `SIND` |

use crate::interpreter::constants::{FRAME_HEADER_SIZE, FRAME_STATIC_LINK};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Word `n` of the current frame
    Local(u16),
    /// Word `n` of the base procedure's frame
    Global(u16),
    /// Word `offset` of the frame `levels` static links up
    Intermediate { levels: u8, offset: u16 },
    /// Word `offset` of another segment's base frame
    External { segment: u8, offset: u16 },
    /// Word `offset` past an address on the stack
    Indirect { offset: u16 },
}

/// Address of word `n` (1-based) in the frame at `frame`
#[inline]
pub fn frame_word(frame: u16, n: u16) -> u16 {
    frame
        .wrapping_add(FRAME_HEADER_SIZE)
        .wrapping_add(n.wrapping_sub(1).wrapping_mul(2))
}

impl Interpreter {
    /// Resolve a mode to an address; `Indirect` pops its base
    pub(crate) fn resolve(&mut self, mode: AddressingMode) -> Result<u16, ExecutionError> {
        match mode {
            AddressingMode::Local(n) => Ok(frame_word(self.mp, n)),
            AddressingMode::Global(n) => Ok(frame_word(self.base, n)),
            AddressingMode::Intermediate { levels, offset } => {
                let mut frame = self.mp;
                for _ in 0..levels {
                    frame = self.mem.read_word(frame.wrapping_add(FRAME_STATIC_LINK))?;
                }
                Ok(frame_word(frame, offset))
            }
            AddressingMode::External { segment, offset } => {
                let descriptor = self.segments.require(segment)?;
                if descriptor.data_base == 0 {
                    return Err(ExecutionError::SystemError {
                        message: format!("segment {} has no active base frame", segment),
                    });
                }
                Ok(frame_word(descriptor.data_base, offset))
            }
            AddressingMode::Indirect { offset } => {
                let address = self.pop()?;
                Ok(address.wrapping_add(offset.wrapping_mul(2)))
            }
        }
    }

    pub(crate) fn load(&mut self, mode: AddressingMode) -> Result<(), RuntimeError> {
        let address = self.resolve(mode)?;
        let word = self.mem.read_word(address)?;
        self.push(word)
    }

    pub(crate) fn load_address(&mut self, mode: AddressingMode) -> Result<(), RuntimeError> {
        let address = self.resolve(mode)?;
        self.push(address)
    }

    /// Pop a word and store it through `mode`
    pub(crate) fn store(&mut self, mode: AddressingMode) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        let address = self.resolve(mode)?;
        self.mem.write_word(address, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_word_skips_header() {
        assert_eq!(frame_word(0x8000, 1), 0x800E);
        assert_eq!(frame_word(0x8000, 3), 0x8012);
    }
}
