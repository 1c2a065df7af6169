//! Heap implementation for the p-machine
//!
//! The heap is a bump allocator growing upward from [`HEAP_START`] toward the
//! program stack. There is no general-purpose free:
//!
//! - `NEW` advances the heap pointer (NP)
//! - `MARK` records NP in a program variable
//! - `RELEASE` resets NP to a recorded value, discarding everything above it
//!
//! The heap only holds the NP register; the bytes live in [`Memory`].
//!
//! [`Memory`]: super::Memory

use crate::interpreter::constants::HEAP_START;
use crate::interpreter::errors::ExecutionError;

/// The heap pointer register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heap {
    np: u16,
}

impl Heap {
    pub fn new() -> Self {
        Heap { np: HEAP_START }
    }

    /// Current top of the heap
    pub fn np(&self) -> u16 {
        self.np
    }

    /// Allocate `words` words below the program stack pointer `psp`
    pub fn allocate(&mut self, words: u16, psp: u16) -> Result<u16, ExecutionError> {
        let bytes = (words as u32) * 2;
        let new_np = self.np as u32 + bytes;
        if new_np > psp as u32 {
            return Err(ExecutionError::StackOverflow);
        }
        let addr = self.np;
        self.np = new_np as u16;
        Ok(addr)
    }

    /// Value recorded by `MARK`
    pub fn mark(&self) -> u16 {
        self.np
    }

    /// Reset the heap to a value recorded by `MARK`
    pub fn release(&mut self, mark: u16) -> Result<(), ExecutionError> {
        if mark < HEAP_START {
            return Err(ExecutionError::InvalidMemoryReference { address: mark });
        }
        self.np = mark;
        Ok(())
    }

    /// Free words between the heap and the program stack
    pub fn available(&self, psp: u16) -> u16 {
        psp.saturating_sub(self.np) / 2
    }

    /// Whether the heap has crossed the program stack pointer
    pub fn collides_with(&self, psp: u16) -> bool {
        self.np > psp
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_release_is_stack_discipline() {
        let mut heap = Heap::new();
        let first = heap.allocate(4, 0x8000).unwrap();
        assert_eq!(first, HEAP_START);
        let mark = heap.mark();
        heap.allocate(10, 0x8000).unwrap();
        assert_eq!(heap.np(), HEAP_START + 28);
        heap.release(mark).unwrap();
        assert_eq!(heap.np(), HEAP_START + 8);
    }

    #[test]
    fn test_allocation_past_program_stack_overflows() {
        let mut heap = Heap::new();
        let psp = HEAP_START + 6;
        assert_eq!(heap.allocate(4, psp), Err(ExecutionError::StackOverflow));
        assert_eq!(heap.available(psp), 3);
    }
}
