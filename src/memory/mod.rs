//! Memory model for the p-machine
//!
//! This module provides the core memory abstractions:
//! - [`Memory`]: 64 KiB of byte cells, each with a [`CellFlags`] set
//! - [`value`]: word, integer, boolean and REAL conversions
//! - [`stack`]: the evaluation stack, realized inside [`Memory`]
//! - [`heap`]: the bump-pointer heap used by `NEW`/`MARK`/`RELEASE`
//!
//! # Cells and Flags
//!
//! Every cell starts [`CellFlags::UNINITIALIZED`]. Writing clears that flag.
//! Reading an uninitialized cell or touching a [`CellFlags::WARN_ON_ACCESS`]
//! cell only logs a warning; writing a [`CellFlags::READ_ONLY`] cell fails.
//! [`CellFlags::EMULATED`] cells never touch stored state: reads and writes go
//! to handlers registered with [`Memory::register_emulated`].
//!
//! # Endianness
//!
//! A word is two adjacent bytes combined per the process-wide [`Endianness`],
//! which is chosen once when the system image is loaded.
//!
//! ```text
//! Little: word(a) = mem[a] | mem[a+1] << 8
//! Big:    word(a) = mem[a] << 8 | mem[a+1]
//! ```

pub mod heap;
pub mod stack;
pub mod value;

use crate::interpreter::constants::MEMORY_SIZE;
use crate::interpreter::errors::ExecutionError;
use std::fmt;
use std::ops::{Range, RangeInclusive};
use tracing::warn;

/// Per-cell metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellFlags(u8);

impl CellFlags {
    pub const NONE: CellFlags = CellFlags(0);
    pub const UNINITIALIZED: CellFlags = CellFlags(0x01);
    pub const READ_ONLY: CellFlags = CellFlags(0x02);
    pub const WARN_ON_ACCESS: CellFlags = CellFlags(0x04);
    pub const EMULATED: CellFlags = CellFlags(0x08);

    pub fn contains(self, other: CellFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CellFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: CellFlags) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: CellFlags, enabled: bool) {
        if enabled {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

/// Byte order used to combine two cells into a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Split a word into the bytes stored at `a` and `a + 1`
    pub fn split(self, word: u16) -> [u8; 2] {
        match self {
            Endianness::Little => word.to_le_bytes(),
            Endianness::Big => word.to_be_bytes(),
        }
    }

    /// Combine the bytes stored at `a` and `a + 1` into a word
    pub fn combine(self, bytes: [u8; 2]) -> u16 {
        match self {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        }
    }
}

/// Read handler for an emulated range: receives the cell address and the active byte order
pub type EmulatedReader = Box<dyn Fn(u16, Endianness) -> u8>;

/// Optional write handler for an emulated range
pub type EmulatedWriter = Box<dyn FnMut(u16, u8)>;

struct EmulatedRange {
    range: Range<u16>,
    reader: EmulatedReader,
    writer: Option<EmulatedWriter>,
}

/// The p-machine's flat byte-addressed memory
pub struct Memory {
    cells: Vec<u8>,
    flags: Vec<CellFlags>,
    endianness: Endianness,
    emulated: Vec<EmulatedRange>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: vec![0; MEMORY_SIZE],
            flags: vec![CellFlags::UNINITIALIZED; MEMORY_SIZE],
            endianness: Endianness::Little,
            emulated: Vec::new(),
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Get the flags of a cell (for inspection and tests)
    pub fn flags(&self, addr: u16) -> CellFlags {
        self.flags[addr as usize]
    }

    pub fn is_initialized(&self, addr: u16) -> bool {
        !self.flags[addr as usize].contains(CellFlags::UNINITIALIZED)
    }

    #[inline]
    fn check_address(addr: u16) -> Result<(), ExecutionError> {
        if addr == 0 {
            return Err(ExecutionError::InvalidMemoryReference { address: addr });
        }
        Ok(())
    }

    fn emulated_index(&self, addr: u16) -> Option<usize> {
        self.emulated.iter().position(|e| e.range.contains(&addr))
    }

    /// Read a single byte
    pub fn read_byte(&self, addr: u16) -> Result<u8, ExecutionError> {
        Self::check_address(addr)?;
        let flags = self.flags[addr as usize];

        if flags.contains(CellFlags::EMULATED) {
            if let Some(index) = self.emulated_index(addr) {
                return Ok((self.emulated[index].reader)(addr, self.endianness));
            }
        }
        if flags.contains(CellFlags::WARN_ON_ACCESS) {
            warn!("read from reserved memory at 0x{:04x}", addr);
        }
        if flags.contains(CellFlags::UNINITIALIZED) {
            warn!("read from uninitialized memory at 0x{:04x}", addr);
        }

        Ok(self.cells[addr as usize])
    }

    /// Write a single byte
    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), ExecutionError> {
        Self::check_address(addr)?;
        let flags = self.flags[addr as usize];

        if flags.contains(CellFlags::EMULATED) {
            if let Some(index) = self.emulated_index(addr) {
                if let Some(writer) = self.emulated[index].writer.as_mut() {
                    writer(addr, value);
                }
                return Ok(());
            }
        }
        if flags.contains(CellFlags::READ_ONLY) {
            return Err(ExecutionError::InvalidMemoryReference { address: addr });
        }
        if flags.contains(CellFlags::WARN_ON_ACCESS) {
            warn!("write to reserved memory at 0x{:04x}", addr);
        }

        self.cells[addr as usize] = value;
        self.flags[addr as usize].remove(CellFlags::UNINITIALIZED);
        Ok(())
    }

    /// Read a word at `addr` and `addr + 1`
    pub fn read_word(&self, addr: u16) -> Result<u16, ExecutionError> {
        let hi_addr = addr.wrapping_add(1);
        let bytes = [self.read_byte(addr)?, self.read_byte(hi_addr)?];
        Ok(self.endianness.combine(bytes))
    }

    /// Write a word at `addr` and `addr + 1`
    pub fn write_word(&mut self, addr: u16, value: u16) -> Result<(), ExecutionError> {
        let [first, second] = self.endianness.split(value);
        self.write_byte(addr, first)?;
        self.write_byte(addr.wrapping_add(1), second)
    }

    /// Read `len` bytes starting at `addr`
    pub fn read_bytes(&self, addr: u16, len: usize) -> Result<Vec<u8>, ExecutionError> {
        (0..len)
            .map(|i| self.read_byte(addr.wrapping_add(i as u16)))
            .collect()
    }

    /// Write a run of bytes starting at `addr`
    pub fn write_bytes(&mut self, addr: u16, bytes: &[u8]) -> Result<(), ExecutionError> {
        for (i, &byte) in bytes.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u16), byte)?;
        }
        Ok(())
    }

    /// Toggle write protection on a range of cells
    pub fn mark_read_only(&mut self, range: Range<u16>, read_only: bool) {
        for addr in range {
            self.flags[addr as usize].set(CellFlags::READ_ONLY, read_only);
        }
    }

    /// Flag a range whose accesses should be reported
    pub fn mark_warn_on_access(&mut self, range: RangeInclusive<u16>) {
        for addr in range {
            self.flags[addr as usize].insert(CellFlags::WARN_ON_ACCESS);
        }
    }

    /// Bind a range of cells to host handlers instead of stored state
    pub fn register_emulated(
        &mut self,
        range: Range<u16>,
        reader: EmulatedReader,
        writer: Option<EmulatedWriter>,
    ) {
        for addr in range.clone() {
            self.flags[addr as usize].insert(CellFlags::EMULATED);
            self.flags[addr as usize].remove(CellFlags::UNINITIALIZED);
        }
        self.emulated.push(EmulatedRange {
            range,
            reader,
            writer,
        });
    }

    /// Raw cell contents, ignoring flags and handlers (used for core dumps)
    pub fn raw(&self) -> &[u8] {
        &self.cells
    }

    /// Read a word without flag checks or diagnostics (used by viewers)
    pub fn peek_word(&self, addr: u16) -> u16 {
        let lo = self.cells[addr as usize];
        let hi = self.cells[addr.wrapping_add(1) as usize];
        self.endianness.combine([lo, hi])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("size", &self.cells.len())
            .field("endianness", &self.endianness)
            .field("emulated_ranges", &self.emulated.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_byte_clears_uninitialized() {
        let mut mem = Memory::new();
        for addr in [1u16, 0x80, 0x1234, 0xFFFF] {
            assert!(!mem.is_initialized(addr));
            mem.write_byte(addr, 0xA5).unwrap();
            assert_eq!(mem.read_byte(addr).unwrap(), 0xA5);
            assert!(mem.is_initialized(addr));
        }
    }

    #[test]
    fn test_address_zero_is_invalid() {
        let mut mem = Memory::new();
        assert!(matches!(
            mem.read_byte(0),
            Err(ExecutionError::InvalidMemoryReference { address: 0 })
        ));
        assert!(mem.write_byte(0, 1).is_err());
        assert!(mem.read_word(0).is_err());
        assert!(mem.write_word(0, 1).is_err());
    }

    #[test]
    fn test_word_round_trip_in_both_byte_orders() {
        let mut mem = Memory::new();
        mem.write_word(0x200, 0x1234).unwrap();
        assert_eq!(mem.read_word(0x200).unwrap(), 0x1234);
        assert_eq!(mem.read_byte(0x200).unwrap(), 0x34);

        mem.set_endianness(Endianness::Big);
        mem.write_word(0x300, 0x1234).unwrap();
        assert_eq!(mem.read_word(0x300).unwrap(), 0x1234);
        assert_eq!(mem.read_byte(0x300).unwrap(), 0x12);
    }

    #[test]
    fn test_read_only_write_fails_but_read_succeeds() {
        let mut mem = Memory::new();
        mem.write_byte(0x400, 7).unwrap();
        mem.mark_read_only(0x400..0x402, true);
        assert!(matches!(
            mem.write_byte(0x400, 8),
            Err(ExecutionError::InvalidMemoryReference { address: 0x400 })
        ));
        assert_eq!(mem.read_byte(0x400).unwrap(), 7);

        mem.mark_read_only(0x400..0x402, false);
        mem.write_byte(0x400, 8).unwrap();
        assert_eq!(mem.read_byte(0x400).unwrap(), 8);
    }

    #[test]
    fn test_uninitialized_read_is_not_fatal() {
        let mem = Memory::new();
        assert!(mem.read_word(0x500).is_ok());
    }

    #[test]
    fn test_emulated_range_bypasses_stored_state() {
        let mut mem = Memory::new();
        mem.register_emulated(
            0x90..0x92,
            Box::new(|addr, order| order.split(0xBEEF)[(addr - 0x90) as usize]),
            None,
        );
        assert_eq!(mem.read_word(0x90).unwrap(), 0xBEEF);

        // No writer: the write is ignored
        mem.write_word(0x90, 0).unwrap();
        assert_eq!(mem.read_word(0x90).unwrap(), 0xBEEF);
        assert_eq!(mem.raw()[0x90], 0);
    }
}
