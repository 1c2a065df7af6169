//! Array indexing and packed fields
//!
//! A packed field is described on the stack by three words: the address of
//! the word holding it, its width in bits and the number of its rightmost
//! bit.
//!
//! ```text
//! word:  |15 ........ rightbit+width-1 ... rightbit ......... 0|
//! ```

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::opcodes::op;

fn field_mask(width: u16) -> u16 {
    if width >= 16 {
        0xFFFF
    } else {
        (1u16 << width) - 1
    }
}

/// Extract a packed field
pub fn extract_field(word: u16, width: u16, rightbit: u16) -> u16 {
    word.checked_shr(rightbit as u32).unwrap_or(0) & field_mask(width)
}

/// Replace a packed field, leaving the other bits alone
pub fn insert_field(word: u16, width: u16, rightbit: u16, value: u16) -> u16 {
    let mask = field_mask(width).checked_shl(rightbit as u32).unwrap_or(0);
    let bits = (value & field_mask(width)).checked_shl(rightbit as u32).unwrap_or(0);
    (word & !mask) | (bits & mask)
}

impl Interpreter {
    pub(crate) fn packed_op(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            op::IXA => {
                let element_words = self.fetch_big()?;
                let index = self.pop()?;
                let address = self.pop()?;
                let offset = index.wrapping_mul(element_words).wrapping_mul(2);
                self.push(address.wrapping_add(offset))
            }
            op::IXP => {
                let per_word = self.fetch_byte()?.max(1) as u16;
                let width = self.fetch_byte()? as u16;
                let index = self.pop()?;
                let address = self.pop()?;
                self.push(address.wrapping_add(2 * (index / per_word)))?;
                self.push(width)?;
                self.push((index % per_word) * width)
            }
            op::LDP => {
                let rightbit = self.pop()?;
                let width = self.pop()?;
                let address = self.pop()?;
                let word = self.mem.read_word(address)?;
                self.push(extract_field(word, width, rightbit))
            }
            // STP
            _ => {
                let value = self.pop()?;
                let rightbit = self.pop()?;
                let width = self.pop()?;
                let address = self.pop()?;
                let word = self.mem.read_word(address)?;
                self.mem
                    .write_word(address, insert_field(word, width, rightbit, value))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trip_preserves_neighbours() {
        let word = insert_field(0xFFFF, 4, 4, 0x5);
        assert_eq!(word, 0xFF5F);
        assert_eq!(extract_field(word, 4, 4), 0x5);
        assert_eq!(extract_field(word, 4, 0), 0xF);
    }

    #[test]
    fn test_field_value_is_truncated_to_width() {
        assert_eq!(insert_field(0, 3, 0, 0xFF), 0x7);
        assert_eq!(extract_field(0x8000, 1, 15), 1);
        assert_eq!(extract_field(0x1234, 16, 0), 0x1234);
    }
}
