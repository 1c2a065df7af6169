// Execution history for the trace viewer

use crate::interpreter::disasm::Instruction;
use crate::interpreter::engine::Registers;
use crate::storage::console::{ConsoleDevice, EOL};
use std::collections::VecDeque;

/// Console that reads scripted input and records everything written
#[derive(Debug, Clone, Default)]
pub struct MockTerminal {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl MockTerminal {
    pub fn new() -> Self {
        MockTerminal::default()
    }

    /// Queue input; host newlines become the p-System end-of-line
    pub fn with_input(input: &[u8]) -> Self {
        MockTerminal {
            input: input
                .iter()
                .map(|&b| if b == b'\n' { EOL } else { b })
                .collect(),
            output: Vec::new(),
        }
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Get all output as lines
    pub fn get_output(&self) -> Vec<String> {
        split_lines(&self.output)
    }
}

/// Split console bytes into display lines at either end-of-line convention
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines: Vec<String> = bytes
        .split(|&b| b == EOL || b == b'\n')
        .map(|line| line.iter().map(|&b| b as char).collect())
        .collect();
    // Remove trailing empty string if output ended with a newline
    if lines.last().is_some_and(|s| s.is_empty()) {
        lines.pop();
    }
    lines
}

impl ConsoleDevice for MockTerminal {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn has_input(&self) -> bool {
        !self.input.is_empty()
    }

    fn transcript(&self) -> Option<&[u8]> {
        Some(&self.output)
    }
}

/// One activation record on the dynamic chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    pub mp: u16,
    pub segment: u8,
    pub procedure: u8,
    pub lex_level: i8,
    /// Resume offset within the procedure
    pub ipc: u16,
}

/// Machine state after one instruction
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub instruction: u64,
    pub registers: Registers,
    pub depth: usize,
    /// Top of the evaluation stack, top first
    pub stack: Vec<u16>,
    /// Innermost frame first
    pub frames: Vec<FrameSummary>,
    /// Disassembly around the next instruction
    pub code: Vec<Instruction>,
    /// Console transcript length at this point
    pub console_len: usize,
    pub halted: bool,
}

impl Snapshot {
    /// Estimate the memory usage of this snapshot in bytes
    pub fn estimated_size(&self) -> usize {
        let code_size: usize = self
            .code
            .iter()
            .map(|line| std::mem::size_of::<Instruction>() + line.text.len())
            .sum();
        std::mem::size_of::<Snapshot>()
            + self.stack.len() * 2
            + self.frames.len() * std::mem::size_of::<FrameSummary>()
            + code_size
    }
}

/// Manages execution history within a byte budget
#[derive(Debug)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
    max_memory: usize,
    current_memory: usize,
    full: bool,
}

impl SnapshotManager {
    pub fn new(max_memory: usize) -> Self {
        SnapshotManager {
            snapshots: Vec::new(),
            max_memory,
            current_memory: 0,
            full: false,
        }
    }

    /// Add a snapshot to history; once the budget is hit, nothing more is kept
    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), String> {
        let snapshot_size = snapshot.estimated_size();

        if self.current_memory + snapshot_size > self.max_memory {
            self.full = true;
            return Err(format!(
                "Snapshot memory limit exceeded: {} + {} > {}",
                self.current_memory, snapshot_size, self.max_memory
            ));
        }

        self.current_memory += snapshot_size;
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Whether recording stopped at the memory limit
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}
