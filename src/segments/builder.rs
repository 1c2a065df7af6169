//! Code-file construction
//!
//! Builds segment images, code files and whole volumes in the exact layout
//! the loader consumes. Tests use it to assemble small programs; it is also
//! handy for producing boot volumes by hand.
//!
//! - [`Assembler`]: emits one procedure's code, resolving branch labels
//! - [`SegmentBuilder`]: lays out procedures, attribute tables and the
//!   procedure dictionary of one segment
//! - [`CodeFileBuilder`]: prepends the block-0 segment dictionary
//! - [`volume_image`]: wraps files in a volume with a directory
//!
//! # Procedure Layout
//!
//! ```text
//! code ... (even aligned)
//! jump table entry k-1 .. entry 0      JTAB-10-2k
//! data size                            JTAB-8
//! parameter size                       JTAB-6
//! exit pointer (self-relative)         JTAB-4
//! entry pointer (self-relative)        JTAB-2
//! procedure number, lexical level      JTAB
//! ```

use super::dictionary::{self, DictionaryEntry};
use crate::interpreter::constants::BLOCK_SIZE;
use crate::interpreter::opcodes::op;
use crate::memory::Endianness;
use crate::storage::catalog::{encode_directory, FileExtent, DIRECTORY_BLOCK, DIRECTORY_BYTES};

/// A branch target inside one procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone)]
struct Branch {
    /// Offset of the displacement byte
    at: usize,
    label: Label,
}

/// Assembled code of one procedure
#[derive(Debug, Clone, Default)]
pub struct AssembledCode {
    pub code: Vec<u8>,
    /// Code offsets reached through negative displacements, entry 0 first
    pub jump_table: Vec<usize>,
    /// Offset of the procedure's exit code
    pub exit: usize,
}

/// Emits p-code for one procedure
#[derive(Debug, Clone)]
pub struct Assembler {
    code: Vec<u8>,
    endianness: Endianness,
    labels: Vec<Option<usize>>,
    branches: Vec<Branch>,
    case_entries: Vec<(usize, Label)>,
    last_op: usize,
    exit: Option<usize>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::with_endianness(Endianness::Little)
    }

    pub fn with_endianness(endianness: Endianness) -> Self {
        Assembler {
            code: Vec::new(),
            endianness,
            labels: Vec::new(),
            branches: Vec::new(),
            case_entries: Vec::new(),
            last_op: 0,
            exit: None,
        }
    }

    /// Current code offset
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    /// Mark the current offset as the procedure's exit code
    pub fn mark_exit(&mut self) -> &mut Self {
        self.exit = Some(self.code.len());
        self
    }

    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.last_op = self.code.len();
        self.code.push(opcode);
        self
    }

    pub fn byte(&mut self, value: u8) -> &mut Self {
        self.code.push(value);
        self
    }

    /// Emit a `B` operand
    pub fn big(&mut self, value: u16) -> &mut Self {
        if value < 0x80 {
            self.code.push(value as u8);
        } else {
            self.code.push(0x80 | (value >> 8) as u8);
            self.code.push(value as u8);
        }
        self
    }

    /// Pad to an even offset
    pub fn align(&mut self) -> &mut Self {
        if self.code.len() % 2 == 1 {
            self.code.push(0);
        }
        self
    }

    /// Emit an aligned `W` operand
    pub fn word(&mut self, value: u16) -> &mut Self {
        self.align();
        let bytes = self.endianness.split(value);
        self.code.extend_from_slice(&bytes);
        self
    }

    /// Emit a length-prefixed string operand
    pub fn string(&mut self, text: &[u8]) -> &mut Self {
        self.code.push(text.len() as u8);
        self.code.extend_from_slice(text);
        self
    }

    /// Push a small constant, choosing the shortest encoding
    pub fn constant(&mut self, value: i16) -> &mut Self {
        match value {
            0..=127 => self.op(value as u8),
            _ => self.op(op::LDCI).word(value as u16),
        }
    }

    pub fn op_ub(&mut self, opcode: u8, operand: u8) -> &mut Self {
        self.op(opcode).byte(operand)
    }

    pub fn op_b(&mut self, opcode: u8, operand: u16) -> &mut Self {
        self.op(opcode).big(operand)
    }

    pub fn op_db_b(&mut self, opcode: u8, levels: u8, operand: u16) -> &mut Self {
        self.op(opcode).byte(levels).big(operand)
    }

    /// Emit `FJP`, `UJP`, `EFJ` or `NFJ` to a label
    pub fn branch(&mut self, opcode: u8, label: Label) -> &mut Self {
        self.op(opcode);
        self.branches.push(Branch {
            at: self.code.len(),
            label,
        });
        self.code.push(0);
        self
    }

    /// Emit `XJP` with one label per case value in `low..=high`
    pub fn case_jump(
        &mut self,
        low: i16,
        high: i16,
        default: Label,
        targets: &[Label],
    ) -> &mut Self {
        self.op(op::XJP);
        self.word(low as u16).word(high as u16);
        self.branch(op::UJP, default);
        for &target in targets {
            self.case_entries.push((self.code.len(), target));
            self.code.extend_from_slice(&[0, 0]);
        }
        self
    }

    /// Emit a comparison with its type byte
    pub fn compare(&mut self, opcode: u8, kind: u8) -> &mut Self {
        self.op(opcode).byte(kind)
    }

    /// Resolve labels and produce the final code
    pub fn finish(mut self) -> Result<AssembledCode, String> {
        let resolve = |labels: &[Option<usize>], label: Label| {
            labels
                .get(label.0)
                .copied()
                .flatten()
                .ok_or_else(|| format!("unbound label {}", label.0))
        };

        let mut jump_table: Vec<usize> = Vec::new();
        for branch in &self.branches {
            let target = resolve(&self.labels, branch.label)?;
            let forward = target as isize - (branch.at as isize + 1);
            let displacement = if (0..=127).contains(&forward) {
                forward as i8
            } else {
                let index = match jump_table.iter().position(|&t| t == target) {
                    Some(index) => index,
                    None => {
                        jump_table.push(target);
                        jump_table.len() - 1
                    }
                };
                let displacement = -10 - 2 * index as isize;
                if displacement < -128 {
                    return Err("too many jump table entries".to_string());
                }
                displacement as i8
            };
            self.code[branch.at] = displacement as u8;
        }

        for &(at, label) in &self.case_entries {
            let target = resolve(&self.labels, label)?;
            let value = (at as isize - target as isize) as i16 as u16;
            let bytes = self.endianness.split(value);
            self.code[at..at + 2].copy_from_slice(&bytes);
        }

        Ok(AssembledCode {
            exit: self.exit.unwrap_or(self.last_op),
            code: self.code,
            jump_table,
        })
    }
}

/// One procedure of a segment
#[derive(Debug, Clone)]
pub struct ProcedureSpec {
    pub lex_level: i8,
    pub param_bytes: u16,
    pub data_bytes: u16,
    /// `None` for a native procedure
    pub body: Option<AssembledCode>,
}

impl ProcedureSpec {
    pub fn new(lex_level: i8, param_bytes: u16, data_bytes: u16, body: AssembledCode) -> Self {
        ProcedureSpec {
            lex_level,
            param_bytes,
            data_bytes,
            body: Some(body),
        }
    }

    /// A procedure implemented by the host
    pub fn native(lex_level: i8, param_bytes: u16) -> Self {
        ProcedureSpec {
            lex_level,
            param_bytes,
            data_bytes: 0,
            body: None,
        }
    }
}

/// Lays out one segment image
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    pub number: u8,
    pub name: String,
    endianness: Endianness,
    procedures: Vec<ProcedureSpec>,
}

impl SegmentBuilder {
    pub fn new(number: u8, name: &str) -> Self {
        SegmentBuilder {
            number,
            name: name.to_string(),
            endianness: Endianness::Little,
            procedures: Vec::new(),
        }
    }

    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Append a procedure; procedures are numbered from 1 in insertion order
    pub fn procedure(mut self, procedure: ProcedureSpec) -> Self {
        self.procedures.push(procedure);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let order = self.endianness;
        let mut image: Vec<u8> = Vec::new();
        let put = |image: &mut Vec<u8>, at: usize, value: u16| {
            image[at..at + 2].copy_from_slice(&order.split(value));
        };
        let push = |image: &mut Vec<u8>, value: u16| {
            image.extend_from_slice(&order.split(value));
        };
        let mut jtabs = Vec::with_capacity(self.procedures.len());

        for (index, procedure) in self.procedures.iter().enumerate() {
            if image.len() % 2 == 1 {
                image.push(0);
            }
            let code_start = image.len();
            let empty = AssembledCode::default();
            let body = procedure.body.as_ref().unwrap_or(&empty);
            image.extend_from_slice(&body.code);
            if image.len() % 2 == 1 {
                image.push(0);
            }

            let table_start = image.len();
            image.resize(table_start + 2 * body.jump_table.len() + 8, 0);
            let jtab = image.len();
            image.push(if procedure.body.is_some() { index as u8 + 1 } else { 0 });
            image.push(procedure.lex_level as u8);

            for (k, &target) in body.jump_table.iter().enumerate() {
                let slot = jtab - 10 - 2 * k;
                put(&mut image, slot, (slot - (code_start + target)) as u16);
            }
            put(&mut image, jtab - 8, procedure.data_bytes);
            put(&mut image, jtab - 6, procedure.param_bytes);
            put(&mut image, jtab - 4, (jtab - 4).wrapping_sub(code_start + body.exit) as u16);
            put(&mut image, jtab - 2, (jtab - 2).wrapping_sub(code_start) as u16);
            jtabs.push(jtab);
        }

        if image.len() % 2 == 1 {
            image.push(0);
        }
        for &jtab in jtabs.iter().rev() {
            let slot = image.len();
            push(&mut image, (slot - jtab) as u16);
        }
        push(&mut image, self.number as u16 | (jtabs.len() as u16) << 8);
        image
    }
}

fn blocks_for(bytes: usize) -> usize {
    bytes.div_ceil(BLOCK_SIZE)
}

/// Builds a code file: the segment dictionary in block 0, then the segments
#[derive(Debug, Clone)]
pub struct CodeFileBuilder {
    endianness: Endianness,
    segments: Vec<(u8, String, Vec<u8>)>,
}

impl Default for CodeFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeFileBuilder {
    pub fn new() -> Self {
        CodeFileBuilder {
            endianness: Endianness::Little,
            segments: Vec::new(),
        }
    }

    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Add a built segment, named after the segment
    pub fn segment(mut self, segment: SegmentBuilder) -> Self {
        let name = segment.name.clone();
        let number = segment.number;
        let image = segment.endianness(self.endianness).build();
        self.segments.push((number, name, image));
        self
    }

    /// Add raw bytes as a dictionary slot (data segments, segment 0 extensions)
    pub fn raw_segment(mut self, number: u8, name: &str, bytes: Vec<u8>) -> Self {
        self.segments.push((number, name.to_string(), bytes));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut entries = Vec::new();
        let mut block = 1usize;
        for (slot, (number, name, bytes)) in self.segments.iter().enumerate() {
            entries.push(DictionaryEntry {
                slot,
                number: *number,
                name: name.clone(),
                block: block as u16,
                length: bytes.len() as u16,
            });
            block += blocks_for(bytes.len());
        }

        let mut file = dictionary::encode(&entries, self.endianness);
        for (_, _, bytes) in &self.segments {
            let start = file.len();
            file.extend_from_slice(bytes);
            file.resize(start + blocks_for(bytes.len()) * BLOCK_SIZE, 0);
        }
        file
    }
}

/// Build a volume: two boot blocks, the directory, then each file in order
pub fn volume_image(volume: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut image = vec![0u8; DIRECTORY_BLOCK as usize * BLOCK_SIZE];
    let mut extents = Vec::new();
    let mut block = DIRECTORY_BLOCK as usize + DIRECTORY_BYTES / BLOCK_SIZE;
    for (name, bytes) in files {
        let blocks = blocks_for(bytes.len()).max(1);
        extents.push(FileExtent {
            name: name.to_string(),
            first_block: block as u16,
            next_block: (block + blocks) as u16,
            kind: 2,
        });
        block += blocks;
    }
    image.extend_from_slice(&encode_directory(volume, &extents));
    for (_, bytes) in files {
        let start = image.len();
        image.extend_from_slice(bytes);
        image.resize(start + blocks_for(bytes.len()).max(1) * BLOCK_SIZE, 0);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(image: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([image[at], image[at + 1]])
    }

    #[test]
    fn test_segment_layout_resolves_entry_and_dictionary() {
        let mut asm = Assembler::new();
        asm.constant(5).op(op::RNP).byte(0);
        let code = asm.finish().unwrap();
        let image = SegmentBuilder::new(3, "DEMO")
            .procedure(ProcedureSpec::new(1, 2, 4, code))
            .build();

        let top = image.len() - 2;
        assert_eq!(word(&image, top), 0x0103);
        let slot = top - 2;
        let jtab = slot - word(&image, slot) as usize;
        assert_eq!(image[jtab], 1);
        assert_eq!(image[jtab + 1], 1);
        assert_eq!(word(&image, jtab - 6), 2);
        assert_eq!(word(&image, jtab - 8), 4);
        let entry = jtab - 2 - word(&image, jtab - 2) as usize;
        assert_eq!(entry, 0);
        let exit = jtab - 4 - word(&image, jtab - 4) as usize;
        assert_eq!(image[exit], op::RNP);
    }

    #[test]
    fn test_backward_branch_uses_jump_table() {
        let mut asm = Assembler::new();
        let top = asm.new_label();
        asm.bind(top).op(op::NOP).branch(op::UJP, top);
        let code = asm.finish().unwrap();
        assert_eq!(code.code[2] as i8, -10);
        assert_eq!(code.jump_table, vec![0]);

        let image = SegmentBuilder::new(1, "LOOP")
            .procedure(ProcedureSpec::new(1, 0, 0, code))
            .build();
        let slot_entry = image.len() - 4;
        let jtab = slot_entry - word(&image, slot_entry) as usize;
        let slot = jtab - 10;
        assert_eq!(slot - word(&image, slot) as usize, 0);
    }

    #[test]
    fn test_case_table_is_self_relative() {
        let mut asm = Assembler::new();
        let (default, a, b) = (asm.new_label(), asm.new_label(), asm.new_label());
        asm.case_jump(1, 2, default, &[a, b]);
        asm.bind(a).op(op::NOP);
        asm.bind(b).op(op::NOP);
        asm.bind(default).op(op::XIT);
        let code = asm.finish().unwrap();
        // XJP, pad, low, high, UJP, sb, entry for 1, entry for 2
        assert_eq!(code.code.len(), 2 + 4 + 2 + 4 + 3);
        let first = 8;
        let target_a = (first as u16).wrapping_sub(word(&code.code, first)) as usize;
        assert_eq!(code.code[target_a], op::NOP);
        assert_eq!(target_a, 12);
    }

    #[test]
    fn test_code_file_places_segments_on_block_boundaries() {
        let file = CodeFileBuilder::new()
            .segment(SegmentBuilder::new(0, "PASCALSY"))
            .raw_segment(5, "DATA", vec![1u8; 600])
            .build();
        let dict = dictionary::SegmentDictionary::parse(&file).unwrap();
        assert_eq!(dict.entries.len(), 2);
        assert_eq!(dict.entries[1].block, 2);
        assert_eq!(dict.entries[1].length, 600);
        assert_eq!(file.len(), 4 * BLOCK_SIZE);
        assert_eq!(file[2 * BLOCK_SIZE], 1);
    }

    #[test]
    fn test_volume_image_is_found_by_catalog() {
        use crate::storage::catalog::{Catalog, VolumeDirectory};
        let image = volume_image("BOOT", &[("SYSTEM.PASCAL", &[7u8; 10])]);
        let dir = VolumeDirectory::parse(&image[2 * BLOCK_SIZE..]);
        let file = dir.find("SYSTEM.PASCAL").unwrap();
        assert_eq!(image[file.first_block as usize * BLOCK_SIZE], 7);
    }
}
