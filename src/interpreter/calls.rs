//! Procedure call and return
//!
//! # Activation Record
//!
//! A call carves a frame out of the program stack, below PSP:
//!
//! ```text
//! MP+0    saved PSP
//! MP+2    static link       (lexical parent's frame)
//! MP+4    dynamic link      (caller's frame)
//! MP+6    saved JTAB
//! MP+8    saved SEG
//! MP+10   saved IPC         (relative to the caller's entry point)
//! MP+12   saved SP
//! MP+14   parameters, then local data
//! ```
//!
//! Parameters are copied from the evaluation stack byte for byte, so the
//! last word pushed by the caller becomes local 1.
//!
//! Base procedures (lexical level 0 or below) also push the old Base on the
//! evaluation stack before SP is saved, and `RBP` pops it back.

use crate::interpreter::addressing::frame_word;
use crate::interpreter::constants::*;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use tracing::{debug, trace};

/// How a call was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    /// A frame was pushed and execution continues at the callee's entry
    Pcode,
    /// The host ran the procedure to completion
    Native,
}

impl Interpreter {
    fn jtab_word(&self, jtab: u16, field: i16) -> Result<u16, ExecutionError> {
        self.mem.read_word(jtab.wrapping_add_signed(field))
    }

    /// Follow a self-relative pointer stored at `slot`
    pub(crate) fn self_relative(&self, slot: u16) -> Result<u16, ExecutionError> {
        Ok(slot.wrapping_sub(self.mem.read_word(slot)?))
    }

    pub(crate) fn entry_point(&self, jtab: u16) -> Result<u16, ExecutionError> {
        self.self_relative(jtab.wrapping_add_signed(JTAB_ENTRY))
    }

    pub(crate) fn exit_point(&self, jtab: u16) -> Result<u16, ExecutionError> {
        self.self_relative(jtab.wrapping_add_signed(JTAB_EXIT))
    }

    fn lex_level(&self, jtab: u16) -> Result<i8, ExecutionError> {
        Ok(self.mem.read_byte(jtab.wrapping_add_signed(JTAB_LEX_LEVEL))? as i8)
    }

    fn static_link_for(&self, callee_lex: i8) -> Result<u16, ExecutionError> {
        if callee_lex <= 1 {
            return Ok(self.base);
        }
        let current_lex = if self.jtab == 0 { 0 } else { self.lex_level(self.jtab)? };
        let hops = current_lex as i16 - callee_lex as i16 + 1;
        if hops < 0 {
            return Err(ExecutionError::SystemError {
                message: format!("call from level {} into level {}", current_lex, callee_lex),
            });
        }
        let mut link = self.mp;
        for _ in 0..hops {
            link = self.mem.read_word(link.wrapping_add(FRAME_STATIC_LINK))?;
        }
        Ok(link)
    }

    /// Call a procedure of a resident segment
    pub(crate) fn call(&mut self, segment: u8, procedure: u8) -> Result<CallKind, RuntimeError> {
        let jtab = self.segments.jtab(segment, procedure, &self.mem)?;
        if self.mem.read_byte(jtab.wrapping_add_signed(JTAB_PROC_NUMBER))? == 0 {
            self.call_native(segment, procedure)?;
            return Ok(CallKind::Native);
        }

        let lex = self.lex_level(jtab)?;
        let param_bytes = self.jtab_word(jtab, JTAB_PARAM_SIZE)?;
        let data_bytes = self.jtab_word(jtab, JTAB_DATA_SIZE)?;
        let entry = self.entry_point(jtab)?;
        let static_link = self.static_link_for(lex)?;

        let frame_size = FRAME_HEADER_SIZE as u32 + param_bytes as u32 + data_bytes as u32;
        let new_mp = match (self.psp as u32).checked_sub(frame_size) {
            Some(mp) if mp >= self.heap.np() as u32 => mp as u16,
            _ => return Err(ExecutionError::StackOverflow.into()),
        };

        if (self.stack.depth() * 2) < param_bytes as usize {
            return Err(ExecutionError::SystemError {
                message: format!(
                    "procedure {} of segment {} expects {} parameter bytes",
                    procedure, segment, param_bytes
                ),
            }
            .into());
        }
        let params = self.mem.read_bytes(self.stack.sp(), param_bytes as usize)?;
        self.mem
            .write_bytes(frame_word(new_mp, 1), &params)?;
        self.stack.release(param_bytes);

        if lex <= 0 {
            self.push(self.base)?;
        }

        let slots = [
            (FRAME_SAVED_PSP, self.psp),
            (FRAME_STATIC_LINK, static_link),
            (FRAME_DYNAMIC_LINK, self.mp),
            (FRAME_SAVED_JTAB, self.jtab),
            (FRAME_SAVED_SEG, self.seg as u16),
            (FRAME_SAVED_IPC, self.ipc),
            (FRAME_SAVED_SP, self.stack.sp()),
        ];
        for (offset, value) in slots {
            self.mem.write_word(new_mp.wrapping_add(offset), value)?;
        }

        if lex <= 0 {
            self.base = new_mp;
            if let Some(descriptor) = self.segments.get_mut(segment) {
                descriptor.data_base = new_mp;
            }
        }

        self.psp = new_mp;
        self.mp = new_mp;
        self.seg = segment;
        self.jtab = jtab;
        self.ipc_base = entry;
        self.ipc = 0;
        self.depth += 1;
        self.check_collision()?;

        trace!(segment, procedure, lex, depth = self.depth, "call, frame at 0x{:04x}", new_mp);
        Ok(CallKind::Pcode)
    }

    /// `CXP`: bring the target segment in for the duration of the call
    pub(crate) fn call_external(&mut self, segment: u8, procedure: u8) -> Result<(), RuntimeError> {
        let loaded = segment != self.seg && segment != 0;
        if loaded {
            self.segments.load(
                segment,
                &mut self.mem,
                &mut self.storage,
                &mut self.psp,
                self.heap.np(),
            )?;
        }

        match self.call(segment, procedure) {
            Ok(CallKind::Native) if loaded => {
                self.segments.unload(segment, &mut self.mem)?;
                self.reclaim_program_stack();
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                if loaded {
                    self.segments.unload(segment, &mut self.mem)?;
                    self.reclaim_program_stack();
                }
                Err(e)
            }
        }
    }

    /// Move PSP up to the lowest live frame or resident segment
    pub(crate) fn reclaim_program_stack(&mut self) {
        let frame = if self.mp == 0 { PROGRAM_STACK_TOP } else { self.mp };
        self.psp = frame.min(self.segments.resident_floor());
    }

    fn call_native(&mut self, segment: u8, procedure: u8) -> Result<(), ExecutionError> {
        let name = self.segments.require(segment)?.name.trim().to_ascii_uppercase();
        let Some(&native) = self.natives.get(&(name.clone(), procedure)) else {
            return Err(ExecutionError::UnimplementedInstruction {
                what: format!("native procedure {} of {}", procedure, name),
            });
        };
        debug!(segment = %name, procedure, "native call");
        native(self)
    }

    /// `RNP`/`RBP`: pop the current frame and push `results` locals
    ///
    /// PSP goes back up to the caller's frame, but never above a segment
    /// that is still resident.
    pub(crate) fn return_from(
        &mut self,
        results: u16,
        base_procedure: bool,
    ) -> Result<(), RuntimeError> {
        let mp = self.mp;
        let slot = |interp: &Self, offset: u16| interp.mem.read_word(mp.wrapping_add(offset));
        let dynamic_link = slot(self, FRAME_DYNAMIC_LINK)?;
        let saved_jtab = slot(self, FRAME_SAVED_JTAB)?;
        let saved_seg = slot(self, FRAME_SAVED_SEG)? as u8;
        let saved_ipc = slot(self, FRAME_SAVED_IPC)?;
        let saved_sp = slot(self, FRAME_SAVED_SP)?;
        let values = (1..=results)
            .map(|n| self.mem.read_word(frame_word(mp, n)))
            .collect::<Result<Vec<_>, _>>()?;

        let old_seg = self.seg;
        self.stack.set_sp(saved_sp);
        self.mp = dynamic_link;
        self.jtab = saved_jtab;
        self.seg = saved_seg;
        self.ipc_base = if saved_jtab == 0 { 0 } else { self.entry_point(saved_jtab)? };
        self.ipc = saved_ipc;
        self.depth = self.depth.saturating_sub(1);

        if old_seg != self.seg && old_seg != 0 {
            self.segments.unload(old_seg, &mut self.mem)?;
        }
        self.reclaim_program_stack();

        if base_procedure {
            let base = self.pop()?;
            let valid = if base == 0 {
                self.depth == 0
            } else {
                (HEAP_START..PROGRAM_STACK_TOP).contains(&base)
            };
            if !valid {
                return Err(RuntimeError::Panic {
                    message: format!("corrupt base pointer 0x{:04x} on return", base),
                });
            }
            self.base = base;
        }

        for &value in values.iter().rev() {
            self.push(value)?;
        }

        trace!(depth = self.depth, results, "return to segment {}", self.seg);
        if self.depth == 0 {
            self.halt();
        }
        Ok(())
    }

    /// `EXIT(segment, procedure)`: unwind to the end of an active procedure
    ///
    /// The current procedure and each caller up to the target have their
    /// resume point moved to their own exit code, so the normal returns that
    /// follow run every intervening epilogue.
    pub(crate) fn exit_procedure(
        &mut self,
        segment: u8,
        procedure: u8,
    ) -> Result<(), RuntimeError> {
        let matches = |interp: &Self, seg: u8, jtab: u16| -> Result<bool, ExecutionError> {
            Ok(seg == segment && interp.mem.read_byte(jtab)? == procedure)
        };

        // Find the target before rewriting anything
        let mut frames = Vec::new();
        if !matches(self, self.seg, self.jtab)? {
            let mut mp = self.mp;
            loop {
                let jtab = self.mem.read_word(mp.wrapping_add(FRAME_SAVED_JTAB))?;
                let seg = self.mem.read_word(mp.wrapping_add(FRAME_SAVED_SEG))? as u8;
                if jtab == 0 {
                    return Err(
                        ExecutionError::ExitFromUncalledProcedure { segment, procedure }.into()
                    );
                }
                frames.push((mp, jtab));
                if matches(self, seg, jtab)? {
                    break;
                }
                mp = self.mem.read_word(mp.wrapping_add(FRAME_DYNAMIC_LINK))?;
                if mp == 0 {
                    return Err(
                        ExecutionError::ExitFromUncalledProcedure { segment, procedure }.into()
                    );
                }
            }
        }

        self.ipc = self.exit_point(self.jtab)?.wrapping_sub(self.ipc_base);
        for (mp, jtab) in frames {
            let resume = self.exit_point(jtab)?.wrapping_sub(self.entry_point(jtab)?);
            self.mem.write_word(mp.wrapping_add(FRAME_SAVED_IPC), resume)?;
        }
        debug!(segment, procedure, "exit");
        Ok(())
    }

    /// Call a procedure from the host, as `CXP` would
    pub fn call_procedure(&mut self, segment: u8, procedure: u8) -> Result<(), RuntimeError> {
        self.call_external(segment, procedure)
    }
}
