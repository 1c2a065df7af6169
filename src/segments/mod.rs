//! Segment overlay manager
//!
//! Code segments are loaded into the program stack on demand, carved out
//! below the current program stack pointer (PSP):
//!
//! ```text
//!   PROGRAM_STACK_TOP
//!   +-------------------+
//!   | segment 0         |  loaded at boot, never unloaded
//!   +-------------------+
//!   | frames ...        |
//!   +-------------------+
//!   | segment 7         |  loaded by CXP, use count 1
//!   +-------------------+  <- PSP
//!   |   free            |
//!   +-------------------+  <- NP (heap top)
//! ```
//!
//! Residency is reference counted: only the 0 -> 1 transition reads the
//! segment from disk and only the 1 -> 0 transition makes its space free
//! again. A segment stays where it was carved until then, even after the
//! frame that loaded it (`GETSEG`) has returned, so the PSP may never rise
//! above [`SegmentTable::resident_floor`].
//!
//! # Procedure Dictionary
//!
//! The last word of a loaded segment holds its number (low byte) and
//! procedure count (high byte). Below it, entry `p` is a self-relative
//! pointer to procedure `p`'s attribute table: `jtab = slot - word(slot)`.
//!
//! # Split Segment 0
//!
//! Segment 0 may come in two parts. The extension is linked to sit right
//! below the resident part; when it lands anywhere else, every dictionary
//! entry that points below the resident part is rewritten by the distance
//! between the linked and the actual base.

pub mod builder;
pub mod dictionary;

use crate::interpreter::constants::PROGRAM_STACK_TOP;
use crate::interpreter::errors::ExecutionError;
use crate::memory::Memory;
use crate::storage::StorageManager;
use dictionary::SegmentDictionary;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Second half of a split segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentExtension {
    pub unit: u16,
    pub block: u16,
    pub size: u16,
    /// Where the extension was placed, once loaded
    pub base: Option<u16>,
}

/// Overlay table entry for one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub number: u8,
    pub name: String,
    pub unit: u16,
    /// Absolute block on `unit`
    pub block: u16,
    /// Length in bytes
    pub size: u16,
    pub use_count: u16,
    /// Relocation base of the loaded code
    pub code_base: u16,
    /// Frame of the latest base-procedure activation in this segment
    pub data_base: u16,
    pub extension: Option<SegmentExtension>,
}

impl SegmentDescriptor {
    pub fn new(number: u8, name: &str, unit: u16, block: u16, size: u16) -> Self {
        SegmentDescriptor {
            number,
            name: name.to_string(),
            unit,
            block,
            size,
            use_count: 0,
            code_base: 0,
            data_base: 0,
            extension: None,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.use_count > 0
    }

    /// Bytes taken from the program stack when loaded
    fn footprint(&self) -> u16 {
        even(self.size)
    }

    /// Address of the segment's last word (number and procedure count)
    pub fn top_word(&self) -> u16 {
        self.code_base.wrapping_add(self.footprint()).wrapping_sub(2)
    }
}

#[inline]
fn even(size: u16) -> u16 {
    size.wrapping_add(1) & !1
}

/// Address of dictionary entry `procedure`, which must lie inside the segment
fn dictionary_slot(segment: &SegmentDescriptor, procedure: u8) -> Result<u16, ExecutionError> {
    segment
        .top_word()
        .checked_sub(2 * procedure as u16)
        .filter(|&slot| slot >= segment.code_base)
        .ok_or_else(|| ExecutionError::SystemError {
            message: format!(
                "dictionary of segment {} is too short for procedure {}",
                segment.number, procedure
            ),
        })
}

/// The overlay table
#[derive(Debug, Default)]
pub struct SegmentTable {
    segments: FxHashMap<u8, SegmentDescriptor>,
}

impl SegmentTable {
    pub fn new() -> Self {
        SegmentTable {
            segments: FxHashMap::default(),
        }
    }

    /// Build the table from a code file's dictionary
    ///
    /// `file_block` is the code file's first block on `unit`. A second slot
    /// numbered 0 becomes segment 0's extension.
    pub fn from_dictionary(dict: &SegmentDictionary, unit: u16, file_block: u16) -> Self {
        let mut table = SegmentTable::new();
        for entry in &dict.entries {
            let block = file_block.wrapping_add(entry.block);
            match table.segments.get_mut(&entry.number) {
                Some(existing) if entry.number == 0 && existing.extension.is_none() => {
                    existing.extension = Some(SegmentExtension {
                        unit,
                        block,
                        size: entry.length,
                        base: None,
                    });
                }
                Some(existing) => {
                    debug!(
                        segment = entry.number,
                        kept = %existing.name,
                        ignored = %entry.name,
                        "duplicate segment number in dictionary"
                    );
                }
                None => {
                    table.insert(SegmentDescriptor::new(
                        entry.number,
                        &entry.name,
                        unit,
                        block,
                        entry.length,
                    ));
                }
            }
        }
        table
    }

    pub fn insert(&mut self, descriptor: SegmentDescriptor) {
        self.segments.insert(descriptor.number, descriptor);
    }

    pub fn get(&self, number: u8) -> Option<&SegmentDescriptor> {
        self.segments.get(&number)
    }

    pub fn get_mut(&mut self, number: u8) -> Option<&mut SegmentDescriptor> {
        self.segments.get_mut(&number)
    }

    pub fn require(&self, number: u8) -> Result<&SegmentDescriptor, ExecutionError> {
        self.get(number)
            .ok_or(ExecutionError::NoSuchSegment { segment: number })
    }

    fn require_mut(&mut self, number: u8) -> Result<&mut SegmentDescriptor, ExecutionError> {
        self.get_mut(number)
            .ok_or(ExecutionError::NoSuchSegment { segment: number })
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SegmentDescriptor> {
        self.segments.values().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Descriptors ordered by segment number
    pub fn iter(&self) -> impl Iterator<Item = &SegmentDescriptor> {
        let mut all: Vec<_> = self.segments.values().collect();
        all.sort_by_key(|s| s.number);
        all.into_iter()
    }

    /// Increment the use count, reading the segment in on first use
    pub fn load(
        &mut self,
        number: u8,
        mem: &mut Memory,
        storage: &mut StorageManager,
        psp: &mut u16,
        np: u16,
    ) -> Result<(), ExecutionError> {
        let segment = self.require_mut(number)?;
        segment.use_count += 1;
        if segment.use_count > 1 {
            return Ok(());
        }

        let footprint = segment.footprint();
        let base = match psp.checked_sub(footprint) {
            Some(base) if base >= np => base,
            _ => {
                segment.use_count -= 1;
                return Err(ExecutionError::StackOverflow);
            }
        };
        let bytes = match storage.read_blocks(segment.unit, segment.block, segment.size as usize) {
            Ok(bytes) => bytes,
            Err(e) => {
                segment.use_count -= 1;
                return Err(ExecutionError::SystemIoError {
                    result: e.io_result(),
                });
            }
        };

        mem.write_bytes(base, &bytes)?;
        mem.mark_read_only(base..base + footprint, true);
        segment.code_base = base;
        *psp = base;

        debug!(
            segment = number,
            name = %segment.name,
            "segment loaded at 0x{:04x} ({} bytes)",
            base,
            segment.size
        );
        Ok(())
    }

    /// Decrement the use count, unprotecting the segment's space on last use
    ///
    /// The caller moves the PSP back up; see [`SegmentTable::resident_floor`].
    pub fn unload(&mut self, number: u8, mem: &mut Memory) -> Result<(), ExecutionError> {
        let segment = self.require_mut(number)?;
        if segment.use_count == 0 {
            return Err(ExecutionError::SystemError {
                message: format!("unload of non-resident segment {}", number),
            });
        }
        segment.use_count -= 1;
        if segment.use_count > 0 {
            return Ok(());
        }

        let base = segment.code_base;
        mem.mark_read_only(base..base + segment.footprint(), false);
        debug!(segment = number, name = %segment.name, "segment unloaded");
        Ok(())
    }

    /// Lowest program stack address still holding resident code
    pub fn resident_floor(&self) -> u16 {
        self.segments
            .values()
            .filter(|s| s.is_resident())
            .flat_map(|s| {
                let extension = s.extension.as_ref().and_then(|e| e.base);
                std::iter::once(s.code_base).chain(extension)
            })
            .min()
            .unwrap_or(PROGRAM_STACK_TOP)
    }

    /// Number of procedures in a resident segment
    pub fn procedure_count(&self, number: u8, mem: &Memory) -> Result<u8, ExecutionError> {
        let segment = self.resident(number)?;
        Ok((mem.read_word(segment.top_word())? >> 8) as u8)
    }

    fn resident(&self, number: u8) -> Result<&SegmentDescriptor, ExecutionError> {
        let segment = self.require(number)?;
        if !segment.is_resident() {
            return Err(ExecutionError::SystemError {
                message: format!("segment {} is not resident", number),
            });
        }
        Ok(segment)
    }

    /// Resolve a procedure's attribute table address
    pub fn jtab(&self, number: u8, procedure: u8, mem: &Memory) -> Result<u16, ExecutionError> {
        let count = self.procedure_count(number, mem)?;
        if procedure == 0 || procedure > count {
            return Err(ExecutionError::SystemError {
                message: format!("no procedure {} in segment {}", procedure, number),
            });
        }
        let slot = dictionary_slot(self.resident(number)?, procedure)?;
        Ok(slot.wrapping_sub(mem.read_word(slot)?))
    }

    /// Load segment 0's extension below the PSP and relocate the dictionary
    /// entries that point into it. Returns the extension's base.
    pub fn load_extension(
        &mut self,
        mem: &mut Memory,
        storage: &mut StorageManager,
        psp: &mut u16,
        np: u16,
    ) -> Result<u16, ExecutionError> {
        let count = self.procedure_count(0, mem)?;
        let segment = self.require_mut(0)?;
        let resident_base = segment.code_base;
        let top = segment.top_word();
        let first_slot = dictionary_slot(segment, count)?;
        let Some(extension) = segment.extension.as_mut() else {
            return Err(ExecutionError::NoSuchSegment { segment: 0 });
        };
        if let Some(base) = extension.base {
            return Ok(base);
        }

        let footprint = even(extension.size);
        let new_base = match psp.checked_sub(footprint) {
            Some(base) if base >= np => base,
            _ => return Err(ExecutionError::StackOverflow),
        };
        let bytes = storage
            .read_blocks(extension.unit, extension.block, extension.size as usize)
            .map_err(|e| ExecutionError::SystemIoError {
                result: e.io_result(),
            })?;
        mem.write_bytes(new_base, &bytes)?;
        mem.mark_read_only(new_base..new_base + footprint, true);

        let linked_base = resident_base.wrapping_sub(footprint);
        let delta = linked_base.wrapping_sub(new_base);
        mem.mark_read_only(first_slot..top, false);
        for procedure in 1..=count as u16 {
            // Every slot lies between first_slot and top
            let slot = top - 2 * procedure;
            let offset = mem.read_word(slot)?;
            if slot.wrapping_sub(offset) < resident_base {
                mem.write_word(slot, offset.wrapping_add(delta))?;
            }
        }
        mem.mark_read_only(first_slot..top, true);

        extension.base = Some(new_base);
        *psp = new_base;
        debug!(
            delta = delta as i16,
            "segment 0 extension loaded at 0x{:04x}",
            new_base
        );
        Ok(new_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::constants::{BLOCK_SIZE, HEAP_START, PROGRAM_STACK_TOP};
    use crate::storage::DiskUnit;

    fn storage_with(image: Vec<u8>) -> StorageManager {
        let mut storage = StorageManager::new();
        storage.attach(4, DiskUnit::from_bytes(image, true)).unwrap();
        storage
    }

    #[test]
    fn test_load_twice_unload_twice_keeps_space_until_last_use() {
        let image: Vec<u8> = (0..4 * BLOCK_SIZE).map(|i| i as u8).collect();
        let mut storage = storage_with(image);
        let mut mem = Memory::new();
        let mut table = SegmentTable::new();
        table.insert(SegmentDescriptor::new(3, "UNIT", 4, 1, 0x100));

        let mut psp = PROGRAM_STACK_TOP;
        table.load(3, &mut mem, &mut storage, &mut psp, HEAP_START).unwrap();
        let base = psp;
        assert_eq!(base, PROGRAM_STACK_TOP - 0x100);
        table.load(3, &mut mem, &mut storage, &mut psp, HEAP_START).unwrap();
        assert_eq!(psp, base);
        assert_eq!(table.get(3).unwrap().use_count, 2);
        assert!(mem.write_byte(base, 0).is_err());

        assert_eq!(table.resident_floor(), base);
        table.unload(3, &mut mem).unwrap();
        assert_eq!(table.resident_floor(), base);
        assert!(mem.write_byte(base, 0).is_err());
        table.unload(3, &mut mem).unwrap();
        assert_eq!(table.resident_floor(), PROGRAM_STACK_TOP);
        assert!(mem.write_byte(base, 0).is_ok());
        assert!(table.unload(3, &mut mem).is_err());
    }

    #[test]
    fn test_load_failures_leave_segment_unloaded() {
        let mut storage = storage_with(vec![0u8; BLOCK_SIZE]);
        let mut mem = Memory::new();
        let mut table = SegmentTable::new();
        table.insert(SegmentDescriptor::new(1, "BIG", 4, 0, 0x400));
        let mut psp = PROGRAM_STACK_TOP;

        let err = table.load(1, &mut mem, &mut storage, &mut psp, HEAP_START).unwrap_err();
        assert!(matches!(err, ExecutionError::SystemIoError { result: 64 }));
        assert_eq!(table.get(1).unwrap().use_count, 0);
        assert_eq!(psp, PROGRAM_STACK_TOP);

        let err = table
            .load(1, &mut mem, &mut storage, &mut psp, PROGRAM_STACK_TOP - 0x10)
            .unwrap_err();
        assert_eq!(err, ExecutionError::StackOverflow);
        assert!(matches!(
            table.load(9, &mut mem, &mut storage, &mut psp, HEAP_START),
            Err(ExecutionError::NoSuchSegment { segment: 9 })
        ));
    }

    #[test]
    fn test_extension_fixup_rewrites_entries_below_resident_base() {
        // Resident part: one block whose last words are a two-entry dictionary.
        // Procedure 1 lives in the resident part, procedure 2 in the extension.
        let mut resident = vec![0u8; BLOCK_SIZE];
        let top = BLOCK_SIZE - 2;
        resident[top..top + 2].copy_from_slice(&0x0200u16.to_le_bytes());
        // Procedure 1 at resident offset 0x10
        let slot1 = top - 2;
        resident[slot1..slot1 + 2].copy_from_slice(&((slot1 - 0x10) as u16).to_le_bytes());
        // Procedure 2 at extension offset 0x20, linked right below the resident part
        let slot2 = top - 4;
        let linked = (slot2 + BLOCK_SIZE - 0x20) as u16;
        resident[slot2..slot2 + 2].copy_from_slice(&linked.to_le_bytes());

        let mut image = vec![0u8; 2 * BLOCK_SIZE];
        image[..BLOCK_SIZE].copy_from_slice(&resident);
        let mut storage = storage_with(image);

        let mut table = SegmentTable::new();
        let mut seg0 = SegmentDescriptor::new(0, "PASCALSY", 4, 0, BLOCK_SIZE as u16);
        seg0.extension = Some(SegmentExtension {
            unit: 4,
            block: 1,
            size: BLOCK_SIZE as u16,
            base: None,
        });
        table.insert(seg0);

        let mut mem = Memory::new();
        let mut psp = PROGRAM_STACK_TOP;
        table.load(0, &mut mem, &mut storage, &mut psp, HEAP_START).unwrap();
        let resident_base = psp;
        assert_eq!(table.jtab(0, 1, &mem).unwrap(), resident_base + 0x10);
        assert_eq!(table.jtab(0, 2, &mem).unwrap(), resident_base - BLOCK_SIZE as u16 + 0x20);

        // Something else sits between the parts
        psp -= 0x40;
        let ext_base = table.load_extension(&mut mem, &mut storage, &mut psp, HEAP_START).unwrap();
        assert_eq!(ext_base, resident_base - 0x40 - BLOCK_SIZE as u16);
        assert_eq!(psp, ext_base);
        assert_eq!(table.jtab(0, 2, &mem).unwrap(), ext_base + 0x20);
        assert_eq!(table.jtab(0, 1, &mem).unwrap(), resident_base + 0x10);

        // Loading again is a no-op
        assert_eq!(
            table.load_extension(&mut mem, &mut storage, &mut psp, HEAP_START).unwrap(),
            ext_base
        );
    }

    #[test]
    fn test_procedure_out_of_range() {
        let mut image = vec![0u8; BLOCK_SIZE];
        image[BLOCK_SIZE - 2..].copy_from_slice(&0x0105u16.to_le_bytes());
        let mut storage = storage_with(image);
        let mut table = SegmentTable::new();
        table.insert(SegmentDescriptor::new(5, "S", 4, 0, BLOCK_SIZE as u16));
        let mut mem = Memory::new();
        let mut psp = PROGRAM_STACK_TOP;

        assert!(table.jtab(5, 1, &mem).is_err());
        table.load(5, &mut mem, &mut storage, &mut psp, HEAP_START).unwrap();
        assert_eq!(table.procedure_count(5, &mem).unwrap(), 1);
        assert!(table.jtab(5, 2, &mem).is_err());
        assert!(table.jtab(5, 0, &mem).is_err());
    }

    #[test]
    fn test_dictionary_longer_than_segment_is_an_error() {
        // Four bytes of code claiming 200 procedures
        let mut image = vec![0u8; BLOCK_SIZE];
        image[2..4].copy_from_slice(&0xC806u16.to_le_bytes());
        let mut storage = storage_with(image);
        let mut table = SegmentTable::new();
        table.insert(SegmentDescriptor::new(6, "TINY", 4, 0, 4));
        let mut mem = Memory::new();
        let mut psp = 6;
        table.load(6, &mut mem, &mut storage, &mut psp, 0).unwrap();
        assert_eq!(psp, 2);
        assert_eq!(table.procedure_count(6, &mem).unwrap(), 200);
        assert!(matches!(
            table.jtab(6, 200, &mem),
            Err(ExecutionError::SystemError { .. })
        ));
    }
}
