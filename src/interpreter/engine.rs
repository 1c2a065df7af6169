// Execution engine for the p-machine

use crate::interpreter::constants::*;
use crate::interpreter::disasm;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::ops::decimal;
use crate::interpreter::opcodes::{decode, op, Decoded};
use crate::interpreter::{addressing::AddressingMode, syscom};
use crate::memory::{heap::Heap, stack::EvalStack, Endianness, Memory};
use crate::segments::dictionary::SegmentDictionary;
use crate::segments::SegmentTable;
use crate::snapshot::{FrameSummary, Snapshot, SnapshotManager};
use crate::storage::catalog;
use crate::storage::console::ConsoleDevice;
use crate::storage::StorageManager;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Host implementation of a procedure whose attribute table says "native"
pub type NativeProcedure = fn(&mut Interpreter) -> Result<(), ExecutionError>;

/// Machine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Log every instruction at trace level
    pub trace: bool,
    /// Route execution errors to segment 0 procedure 2
    pub deliver_traps: bool,
    /// Make BPT stop execution
    pub break_on_bpt: bool,
    /// Record per-instruction snapshots within this many bytes
    pub snapshot_limit: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            trace: false,
            deliver_traps: true,
            break_on_bpt: false,
            snapshot_limit: None,
        }
    }
}

/// A copy of the machine registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub psp: u16,
    pub sp: u16,
    pub mp: u16,
    pub base: u16,
    pub seg: u8,
    pub jtab: u16,
    pub ipc: u16,
    pub ipc_base: u16,
    pub np: u16,
}

/// The p-machine
pub struct Interpreter {
    pub(crate) mem: Memory,
    pub(crate) stack: EvalStack,
    pub(crate) heap: Heap,
    pub(crate) segments: SegmentTable,
    pub(crate) storage: StorageManager,
    pub(crate) console: Box<dyn ConsoleDevice>,
    pub(crate) natives: FxHashMap<(String, u8), NativeProcedure>,
    config: MachineConfig,

    /// Program stack pointer
    pub(crate) psp: u16,
    /// Mark stack pointer (current frame)
    pub(crate) mp: u16,
    /// Frame of the latest base procedure
    pub(crate) base: u16,
    pub(crate) seg: u8,
    pub(crate) jtab: u16,
    /// Offset of the next instruction from `ipc_base`
    pub(crate) ipc: u16,
    pub(crate) ipc_base: u16,

    /// Active frames
    pub(crate) depth: usize,
    /// Pending IORESULT
    pub(crate) io_result: u16,
    /// Call depth at which the active trap was delivered
    trap_depth: Option<usize>,
    /// Address of the instruction being executed
    instruction_address: u16,
    halted: bool,
    instructions: u64,
    pub(crate) started: Instant,

    snapshots: Option<SnapshotManager>,
}

impl Interpreter {
    /// Create a machine with empty memory and no segments
    pub fn new(
        storage: StorageManager,
        console: Box<dyn ConsoleDevice>,
        config: MachineConfig,
    ) -> Self {
        let mut mem = Memory::new();
        mem.mark_warn_on_access(LOW_RESERVED_START..=LOW_RESERVED_END - 1);
        mem.mark_warn_on_access(HIGH_RESERVED_START..=u16::MAX);

        let mut natives: FxHashMap<(String, u8), NativeProcedure> = FxHashMap::default();
        natives.insert(("DECOPS".to_string(), 1), |interp| {
            decimal::execute(&mut interp.stack, &mut interp.mem)
        });

        let snapshots = config.snapshot_limit.map(SnapshotManager::new);

        Interpreter {
            mem,
            stack: EvalStack::new(),
            heap: Heap::new(),
            segments: SegmentTable::new(),
            storage,
            console,
            natives,
            config,
            psp: PROGRAM_STACK_TOP,
            mp: 0,
            base: 0,
            seg: 0,
            jtab: 0,
            ipc: 0,
            ipc_base: 0,
            depth: 0,
            io_result: 0,
            trap_depth: None,
            instruction_address: 0,
            halted: false,
            instructions: 0,
            started: Instant::now(),
            snapshots,
        }
    }

    /// Load the system file from a unit and enter segment 0 procedure 1
    pub fn boot(&mut self, unit: u16, system_file: &str) -> Result<(), RuntimeError> {
        let boot_error = |message: String| RuntimeError::Boot { message };

        let extent = catalog::locate(&mut self.storage, unit, system_file)
            .map_err(|e| boot_error(e.to_string()))?;
        let block0 = self
            .storage
            .read_blocks(unit, extent.first_block, BLOCK_SIZE)
            .map_err(|e| boot_error(e.to_string()))?;
        let dictionary = SegmentDictionary::parse(&block0)?;
        info!(
            file = system_file,
            unit,
            segments = dictionary.entries.len(),
            endianness = ?dictionary.endianness,
            "system file found"
        );

        self.mem.set_endianness(dictionary.endianness);
        syscom::install(&mut self.mem)?;
        self.segments = SegmentTable::from_dictionary(&dictionary, unit, extent.first_block);
        self.mem
            .write_word(SYSCOM_ADDR + SYSCOM_SYSUNIT, unit)
            .map_err(RuntimeError::from)?;

        if self.segments.get(0).is_none() {
            return Err(boot_error(format!("{} has no segment 0", system_file)));
        }
        self.segments
            .load(0, &mut self.mem, &mut self.storage, &mut self.psp, self.heap.np())
            .map_err(|e| boot_error(format!("loading segment 0: {}", e)))?;
        if self.segments.get(0).is_some_and(|s| s.extension.is_some()) {
            self.segments
                .load_extension(&mut self.mem, &mut self.storage, &mut self.psp, self.heap.np())
                .map_err(|e| boot_error(format!("loading segment 0 extension: {}", e)))?;
        }

        self.call(0, 1)?;
        self.record_snapshot();
        Ok(())
    }

    /// Run until halt or an unrecoverable error
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while !self.halted {
            self.step()?;
        }
        info!(instructions = self.instructions, "halted");
        Ok(())
    }

    /// Execute one instruction, delivering any trap it raises
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        if self.halted {
            return Ok(());
        }
        if self.trap_depth.is_some_and(|d| self.depth <= d) {
            self.trap_depth = None;
        }

        self.instruction_address = self.ipc_base.wrapping_add(self.ipc);
        if self.config.trace {
            let line = disasm::disassemble(&self.mem, self.instruction_address);
            trace!(seg = self.seg, depth = self.depth, "{:04x}  {}", line.address, line.text);
        }

        let result = self
            .fetch_byte()
            .map_err(RuntimeError::from)
            .and_then(|opcode| self.execute(opcode));
        self.instructions += 1;

        match result {
            Ok(()) => {}
            Err(RuntimeError::Trap(e)) if e.is_halt() => {
                debug!("halt instruction");
                self.halted = true;
            }
            Err(RuntimeError::Trap(e @ ExecutionError::Breakpoint { .. })) => {
                self.record_snapshot();
                return Err(RuntimeError::Trap(e));
            }
            Err(RuntimeError::Trap(e)) => self.deliver_trap(e)?,
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        }

        self.record_snapshot();
        Ok(())
    }

    /// Route an execution error to the program's handler
    fn deliver_trap(&mut self, e: ExecutionError) -> Result<(), RuntimeError> {
        if self.trap_depth.is_some() {
            let message = format!("{} raised while handling a trap", e);
            error!("{}", message);
            return Err(RuntimeError::Panic { message });
        }
        if !self.config.deliver_traps {
            return Err(RuntimeError::Trap(e));
        }
        let has_handler = self.segments.get(0).is_some_and(|s| s.is_resident())
            && self
                .segments
                .procedure_count(0, &self.mem)
                .is_ok_and(|count| count >= EXECERROR_PROC);
        if !has_handler {
            return Err(RuntimeError::Trap(e));
        }

        debug!(code = e.code(), ipc = self.instruction_address, "delivering trap: {}", e);
        syscom::record_trap(&mut self.mem, &e, self.instruction_address, self.mp)?;
        self.trap_depth = Some(self.depth);
        self.call(0, EXECERROR_PROC)?;
        Ok(())
    }

    /// Decode and execute one instruction
    fn execute(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match decode(opcode) {
            Decoded::ShortConstant(value) => self.push(value as u16),
            Decoded::ShortLocal(n) => self.load(AddressingMode::Local(n as u16)),
            Decoded::ShortGlobal(n) => self.load(AddressingMode::Global(n as u16)),
            Decoded::ShortIndirect(n) => self.load(AddressingMode::Indirect { offset: n as u16 }),
            Decoded::Unused(code) => Err(ExecutionError::UnimplementedInstruction {
                what: format!("opcode {}", code),
            }
            .into()),
            Decoded::Table(code) => self.execute_table(code),
        }
    }

    fn execute_table(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            // Constants
            op::LDCN => self.push(0),
            op::LDCI => {
                let value = self.fetch_word()?;
                self.push(value)
            }
            op::LDC => {
                let count = self.fetch_byte()? as usize;
                self.align_ipc();
                let start = self.ipc_address();
                let words = (0..count)
                    .map(|i| self.mem.read_word(start.wrapping_add(2 * i as u16)))
                    .collect::<Result<Vec<_>, _>>()?;
                self.ipc = self.ipc.wrapping_add(2 * count as u16);
                self.stack.push_block(&mut self.mem, &words)?;
                Ok(())
            }
            op::LSA | op::LPA => self.load_string_constant(opcode),

            // Loads and stores
            op::LDL => {
                let n = self.fetch_big()?;
                self.load(AddressingMode::Local(n))
            }
            op::LLA => {
                let n = self.fetch_big()?;
                self.load_address(AddressingMode::Local(n))
            }
            op::STL => {
                let n = self.fetch_big()?;
                self.store(AddressingMode::Local(n))
            }
            op::LDO => {
                let n = self.fetch_big()?;
                self.load(AddressingMode::Global(n))
            }
            op::LAO => {
                let n = self.fetch_big()?;
                self.load_address(AddressingMode::Global(n))
            }
            op::SRO => {
                let n = self.fetch_big()?;
                self.store(AddressingMode::Global(n))
            }
            op::LOD | op::LDA | op::STR => {
                let levels = self.fetch_byte()?;
                let offset = self.fetch_big()?;
                let mode = AddressingMode::Intermediate { levels, offset };
                match opcode {
                    op::LOD => self.load(mode),
                    op::LDA => self.load_address(mode),
                    _ => self.store(mode),
                }
            }
            op::LDE | op::LAE | op::STE => {
                let segment = self.fetch_byte()?;
                let offset = self.fetch_big()?;
                let mode = AddressingMode::External { segment, offset };
                match opcode {
                    op::LDE => self.load(mode),
                    op::LAE => self.load_address(mode),
                    _ => self.store(mode),
                }
            }
            op::IND => {
                let offset = self.fetch_big()?;
                self.load(AddressingMode::Indirect { offset })
            }
            op::INC => {
                let offset = self.fetch_big()?;
                let address = self.pop()?;
                self.push(address.wrapping_add(offset.wrapping_mul(2)))
            }
            op::STO => {
                let value = self.pop()?;
                let address = self.pop()?;
                self.mem.write_word(address, value)?;
                Ok(())
            }
            op::MOV => {
                let words = self.fetch_big()?;
                let source = self.pop()?;
                let destination = self.pop()?;
                let bytes = self.mem.read_bytes(source, 2 * words as usize)?;
                self.mem.write_bytes(destination, &bytes)?;
                Ok(())
            }
            op::LDM => {
                let count = self.fetch_byte()? as usize;
                let address = self.pop()?;
                let words = (0..count)
                    .map(|i| self.mem.read_word(address.wrapping_add(2 * i as u16)))
                    .collect::<Result<Vec<_>, _>>()?;
                self.stack.push_block(&mut self.mem, &words)?;
                Ok(())
            }
            op::STM => {
                let count = self.fetch_byte()? as usize;
                let words = self.stack.pop_block(&self.mem, count)?;
                let address = self.pop()?;
                for (i, word) in words.into_iter().enumerate() {
                    self.mem.write_word(address.wrapping_add(2 * i as u16), word)?;
                }
                Ok(())
            }
            op::LDB => {
                let index = self.pop()?;
                let address = self.pop()?;
                let byte = self.mem.read_byte(address.wrapping_add(index))?;
                self.push(byte as u16)
            }
            op::STB => {
                let value = self.pop()?;
                let index = self.pop()?;
                let address = self.pop()?;
                self.mem.write_byte(address.wrapping_add(index), value as u8)?;
                Ok(())
            }
            op::LDP | op::STP | op::IXP | op::IXA => self.packed_op(opcode),

            // Arithmetic, logic and comparisons
            op::ABI | op::ADI | op::NGI | op::SBI | op::MPI | op::SQI | op::DVI | op::MODI
            | op::CHK | op::LAND | op::LOR | op::LNOT | op::EQUI | op::NEQI | op::LESI
            | op::LEQI | op::GRTI | op::GEQI => self.integer_op(opcode),
            op::ABR | op::ADR | op::NGR | op::SBR | op::MPR | op::SQR | op::DVR | op::FLT
            | op::FLO => self.real_op(opcode),
            op::EQU | op::NEQ | op::LES | op::LEQ | op::GRT | op::GEQ => {
                let kind = self.fetch_byte()?;
                self.compare_op(opcode, kind)
            }
            op::ADJ | op::SRS | op::SGS | op::INN | op::UNI | op::INT | op::DIF => {
                self.set_op(opcode)
            }
            op::SAS => {
                let max = self.fetch_byte()?;
                self.string_assign(max)
            }
            op::IXS => self.string_index(),

            // Branches
            op::UJP | op::FJP | op::EFJ | op::NFJ => {
                let displacement = self.fetch_byte()? as i8;
                self.branch(opcode, displacement)
            }
            op::XJP => self.case_jump(),

            // Calls and returns
            op::CLP | op::CGP | op::CIP | op::CBP => {
                let procedure = self.fetch_byte()?;
                self.call(self.seg, procedure).map(|_| ())
            }
            op::CXP => {
                let segment = self.fetch_byte()?;
                let procedure = self.fetch_byte()?;
                self.call_external(segment, procedure)
            }
            op::RNP => {
                let results = self.fetch_byte()?;
                self.return_from(results as u16, false)
            }
            op::RBP => {
                let results = self.fetch_byte()?;
                self.return_from(results as u16, true)
            }
            op::CSP => {
                let code = self.fetch_byte()?;
                self.standard_procedure(code)
            }

            // Miscellaneous
            op::BPT => {
                let line = self.fetch_big()?;
                if self.config.break_on_bpt {
                    return Err(ExecutionError::Breakpoint { line }.into());
                }
                Ok(())
            }
            op::XIT => Err(ExecutionError::Halt.into()),
            op::NOP => Ok(()),
            _ => Err(ExecutionError::UnimplementedInstruction {
                what: format!("opcode {}", opcode),
            }
            .into()),
        }
    }

    // Operand fetch

    #[inline]
    pub(crate) fn ipc_address(&self) -> u16 {
        self.ipc_base.wrapping_add(self.ipc)
    }

    pub(crate) fn fetch_byte(&mut self) -> Result<u8, ExecutionError> {
        let byte = self.mem.read_byte(self.ipc_address())?;
        self.ipc = self.ipc.wrapping_add(1);
        Ok(byte)
    }

    /// `B` operand
    pub(crate) fn fetch_big(&mut self) -> Result<u16, ExecutionError> {
        let first = self.fetch_byte()?;
        if first < 0x80 {
            return Ok(first as u16);
        }
        let second = self.fetch_byte()?;
        Ok(((first as u16 & 0x7F) << 8) | second as u16)
    }

    pub(crate) fn align_ipc(&mut self) {
        if self.ipc_address() % 2 == 1 {
            self.ipc = self.ipc.wrapping_add(1);
        }
    }

    /// Aligned `W` operand
    pub(crate) fn fetch_word(&mut self) -> Result<u16, ExecutionError> {
        self.align_ipc();
        let word = self.mem.read_word(self.ipc_address())?;
        self.ipc = self.ipc.wrapping_add(2);
        Ok(word)
    }

    // Evaluation stack shorthands

    #[inline]
    pub(crate) fn push(&mut self, word: u16) -> Result<(), RuntimeError> {
        Ok(self.stack.push(&mut self.mem, word)?)
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<u16, ExecutionError> {
        self.stack.pop(&self.mem)
    }

    pub(crate) fn pop_int(&mut self) -> Result<i16, ExecutionError> {
        self.stack.pop_int(&self.mem)
    }

    pub(crate) fn push_int(&mut self, value: i16) -> Result<(), RuntimeError> {
        self.push(value as u16)
    }

    pub(crate) fn push_bool(&mut self, value: bool) -> Result<(), RuntimeError> {
        self.push(value as u16)
    }

    /// Heap and program stack must not cross
    pub(crate) fn check_collision(&self) -> Result<(), ExecutionError> {
        if self.heap.collides_with(self.psp) {
            return Err(ExecutionError::StackOverflow);
        }
        Ok(())
    }

    // Host-facing API

    pub fn registers(&self) -> Registers {
        Registers {
            psp: self.psp,
            sp: self.stack.sp(),
            mp: self.mp,
            base: self.base,
            seg: self.seg,
            jtab: self.jtab,
            ipc: self.ipc,
            ipc_base: self.ipc_base,
            np: self.heap.np(),
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn storage_mut(&mut self) -> &mut StorageManager {
        &mut self.storage
    }

    pub fn console(&self) -> &dyn ConsoleDevice {
        self.console.as_ref()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn endianness(&self) -> Endianness {
        self.mem.endianness()
    }

    /// Evaluation stack contents, top first
    pub fn eval_stack(&self) -> Vec<u16> {
        self.stack.words(&self.mem, usize::MAX)
    }

    pub fn push_word(&mut self, word: u16) -> Result<(), ExecutionError> {
        self.stack.push(&mut self.mem, word)
    }

    pub fn pop_word(&mut self) -> Result<u16, ExecutionError> {
        self.pop()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn io_result(&self) -> u16 {
        self.io_result
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Wall time since the machine was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Bind a host procedure to `(segment name, procedure number)`
    pub fn bind_native(&mut self, segment: &str, procedure: u8, native: NativeProcedure) {
        self.natives
            .insert((segment.to_ascii_uppercase(), procedure), native);
    }

    pub fn snapshots(&self) -> Option<&SnapshotManager> {
        self.snapshots.as_ref()
    }

    /// Write the whole memory image
    pub fn write_core_dump(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.mem.raw())?;
        warn!(path = %path.display(), "core dumped");
        Ok(())
    }

    /// Active frames, innermost first
    pub fn call_chain(&self) -> Vec<FrameSummary> {
        let mut frames = Vec::new();
        let (mut mp, mut jtab, mut seg, mut ipc) = (self.mp, self.jtab, self.seg, self.ipc);
        while mp != 0 && jtab != 0 && frames.len() < self.depth.max(1) && frames.len() < 64 {
            let raw = self.mem.raw();
            frames.push(FrameSummary {
                mp,
                segment: seg,
                procedure: raw[jtab as usize],
                lex_level: raw[jtab.wrapping_add(1) as usize] as i8,
                ipc,
            });
            jtab = self.mem.peek_word(mp.wrapping_add(FRAME_SAVED_JTAB));
            seg = self.mem.peek_word(mp.wrapping_add(FRAME_SAVED_SEG)) as u8;
            ipc = self.mem.peek_word(mp.wrapping_add(FRAME_SAVED_IPC));
            mp = self.mem.peek_word(mp.wrapping_add(FRAME_DYNAMIC_LINK));
        }
        frames
    }

    fn record_snapshot(&mut self) {
        let Some(manager) = self.snapshots.as_ref() else {
            return;
        };
        if manager.is_full() {
            return;
        }
        let snapshot = Snapshot {
            instruction: self.instructions,
            registers: self.registers(),
            depth: self.depth,
            stack: self.stack.words(&self.mem, 32),
            frames: self.call_chain(),
            code: disasm::window(&self.mem, self.ipc_base, self.ipc_address(), 24),
            console_len: self.console.transcript().map_or(0, |t| t.len()),
            halted: self.halted,
        };
        if let Some(manager) = self.snapshots.as_mut() {
            if let Err(message) = manager.push(snapshot) {
                warn!("{}; recording stopped", message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::opcodes::{op, SLDL_FIRST};
    use crate::segments::builder::{Assembler, CodeFileBuilder, ProcedureSpec, SegmentBuilder};
    use crate::snapshot::MockTerminal;
    use crate::storage::DiskUnit;

    fn machine_with(asm: Assembler, lex: i8, data: u16) -> Interpreter {
        let code = asm.finish().unwrap();
        let file = CodeFileBuilder::new()
            .segment(
                SegmentBuilder::new(0, "PASCALSY")
                    .procedure(ProcedureSpec::new(lex, 0, data, code)),
            )
            .build();
        let volume = crate::segments::builder::volume_image("BOOT", &[("SYSTEM.PASCAL", &file)]);
        let mut storage = StorageManager::new();
        storage.attach(4, DiskUnit::from_bytes(volume, false)).unwrap();
        let mut interp =
            Interpreter::new(storage, Box::new(MockTerminal::new()), MachineConfig::default());
        interp.boot(4, "SYSTEM.PASCAL").unwrap();
        interp
    }

    #[test]
    fn test_constants_and_ldc_layout() {
        let mut asm = Assembler::new();
        asm.op(op::LDCI).word(0x1234);
        asm.op(op::LDC).byte(2).word(0xAAAA).word(0xBBBB);
        asm.op(op::XIT);
        let mut interp = machine_with(asm, 1, 0);
        interp.step().unwrap();
        assert_eq!(interp.eval_stack()[0], 0x1234);
        interp.step().unwrap();
        assert_eq!(&interp.eval_stack()[..3], &[0xAAAA, 0xBBBB, 0x1234]);
        interp.run().unwrap();
        assert!(interp.is_halted());
    }

    #[test]
    fn test_local_store_and_load() {
        let mut asm = Assembler::new();
        asm.constant(-7).op_b(op::STL, 2).op(SLDL_FIRST + 1).op(op::XIT);
        let mut interp = machine_with(asm, 1, 4);
        interp.step().unwrap();
        interp.step().unwrap();
        let mp = interp.registers().mp;
        assert_eq!(interp.memory().read_word(mp + FRAME_HEADER_SIZE + 2).unwrap(), (-7i16) as u16);
        interp.step().unwrap();
        assert_eq!(interp.eval_stack()[0], (-7i16) as u16);
    }

    #[test]
    fn test_undelivered_trap_is_returned() {
        let mut asm = Assembler::new();
        asm.constant(1).constant(0).op(op::DVI);
        let mut interp = machine_with(asm, 1, 0);
        assert!(matches!(
            interp.run(),
            Err(RuntimeError::Trap(ExecutionError::DivideByZero))
        ));
    }

    #[test]
    fn test_unused_opcode_is_unimplemented() {
        let mut asm = Assembler::new();
        asm.op(210);
        let mut interp = machine_with(asm, 1, 0);
        assert!(matches!(
            interp.step(),
            Err(RuntimeError::Trap(ExecutionError::UnimplementedInstruction { .. }))
        ));
    }
}
