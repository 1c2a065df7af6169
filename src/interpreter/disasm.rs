//! P-code disassembler
//!
//! Decodes straight from raw memory, without flag checks or warnings, so it
//! is safe to call from tracing and from the viewer at any point.

use crate::interpreter::builtins::csp_name;
use crate::interpreter::opcodes::{decode, mnemonic, op, operands, Decoded, Operand};
use crate::memory::Memory;
use std::fmt::Write;

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    /// Mnemonic and operands, ready to print
    pub text: String,
    /// Bytes occupied, operands and inline tables included
    pub length: u16,
}

struct Cursor<'a> {
    mem: &'a Memory,
    at: u16,
}

impl Cursor<'_> {
    fn byte(&mut self) -> u8 {
        let byte = self.mem.raw()[self.at as usize];
        self.at = self.at.wrapping_add(1);
        byte
    }

    fn big(&mut self) -> u16 {
        let first = self.byte();
        if first < 0x80 {
            first as u16
        } else {
            ((first as u16 & 0x7F) << 8) | self.byte() as u16
        }
    }

    fn align(&mut self) {
        if self.at % 2 == 1 {
            self.at = self.at.wrapping_add(1);
        }
    }

    fn word(&mut self) -> u16 {
        self.align();
        let word = self.mem.peek_word(self.at);
        self.at = self.at.wrapping_add(2);
        word
    }
}

/// Decode the instruction at `address`
pub fn disassemble(mem: &Memory, address: u16) -> Instruction {
    let mut cursor = Cursor { mem, at: address };
    let opcode = cursor.byte();
    let name = mnemonic(opcode);
    let mut text = name.to_string();

    match decode(opcode) {
        Decoded::ShortConstant(n) => {
            let _ = write!(text, " {}", n);
        }
        Decoded::ShortLocal(n) | Decoded::ShortGlobal(n) | Decoded::ShortIndirect(n) => {
            let _ = write!(text, " {}", n);
        }
        Decoded::Unused(_) => {}
        Decoded::Table(_) => {
            let mut parts: Vec<String> = Vec::new();
            for kind in operands(opcode) {
                let part = match kind {
                    Operand::UB | Operand::DB => {
                        let value = cursor.byte();
                        match (opcode, csp_name(value)) {
                            (op::CSP, Some(name)) => name.to_string(),
                            _ => value.to_string(),
                        }
                    }
                    Operand::SB => {
                        let displacement = cursor.byte() as i8;
                        if displacement >= 0 {
                            format!("{:04x}", cursor.at.wrapping_add(displacement as u16))
                        } else {
                            format!("jtab{}", displacement)
                        }
                    }
                    Operand::B => cursor.big().to_string(),
                    Operand::W => (cursor.word() as i16).to_string(),
                    Operand::Str => {
                        let length = cursor.byte();
                        let chars: String = (0..length).map(|_| cursor.byte() as char).collect();
                        format!("'{}'", chars)
                    }
                    Operand::Words => {
                        let count = cursor.byte();
                        let words: Vec<String> =
                            (0..count).map(|_| format!("{:04x}", cursor.word())).collect();
                        words.join(" ")
                    }
                    Operand::Cmp => {
                        let kind = cursor.byte();
                        if kind == 10 || kind == 12 {
                            format!("{} {}", kind, cursor.big())
                        } else {
                            kind.to_string()
                        }
                    }
                    Operand::Case => {
                        let low = cursor.word() as i16;
                        let high = cursor.word() as i16;
                        let entries = (high as i32 - low as i32 + 1).max(0) as u16;
                        // default UJP and the table
                        cursor.at = cursor.at.wrapping_add(2 + 2 * entries);
                        format!("{}..{}", low, high)
                    }
                };
                parts.push(part);
            }
            if !parts.is_empty() {
                let _ = write!(text, " {}", parts.join(", "));
            }
        }
    }

    Instruction {
        address,
        opcode,
        mnemonic: name,
        text,
        length: cursor.at.wrapping_sub(address),
    }
}

/// Up to `count` instructions from a procedure's entry, centred on `current`
pub fn window(mem: &Memory, entry: u16, current: u16, count: usize) -> Vec<Instruction> {
    if entry == 0 || count == 0 {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut at = entry;
    let mut current_index = None;
    // Decode until `count / 2` lines past the current instruction
    while lines.len() < 4096 {
        let line = disassemble(mem, at);
        if line.address == current {
            current_index = Some(lines.len());
        }
        at = at.wrapping_add(line.length.max(1));
        lines.push(line);
        match current_index {
            Some(index) if lines.len() > index + count / 2 => break,
            None if at > current && lines.len() >= count => break,
            _ => {}
        }
        if at < entry {
            break;
        }
    }
    let index = current_index.unwrap_or(0);
    let start = index.saturating_sub(count / 2);
    lines.into_iter().skip(start).take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(at: u16, bytes: &[u8]) -> Memory {
        let mut mem = Memory::new();
        mem.write_bytes(at, bytes).unwrap();
        mem
    }

    #[test]
    fn test_operands_render() {
        let mem = memory_with(0x1000, &[op::LOD, 2, 0x81, 0x00, op::CSP, 2, 5]);
        let lod = disassemble(&mem, 0x1000);
        assert_eq!(lod.text, "LOD 2, 256");
        assert_eq!(lod.length, 4);
        let csp = disassemble(&mem, 0x1004);
        assert_eq!(csp.text, "CSP MOVELEFT");
        assert_eq!(disassemble(&mem, 0x1006).text, "SLDC 5");
    }

    #[test]
    fn test_ldci_aligns_its_word() {
        let mem = memory_with(0x1000, &[op::LDCI, 0, 0x34, 0x12]);
        let line = disassemble(&mem, 0x1000);
        assert_eq!(line.text, "LDCI 4660");
        assert_eq!(line.length, 4);
    }

    #[test]
    fn test_window_centres_on_current() {
        let code: Vec<u8> = (0..20).collect();
        let mem = memory_with(0x2000, &code);
        let lines = window(&mem, 0x2000, 0x200A, 5);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2].address, 0x200A);
    }
}
