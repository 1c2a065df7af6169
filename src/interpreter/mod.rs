//! p-machine execution engine
//!
//! This module provides the fetch-decode-execute loop and everything it
//! dispatches to:
//! - [`engine`]: the [`engine::Interpreter`], its registers, boot and trap delivery
//! - [`errors`]: execution and runtime error types
//! - [`opcodes`]: the instruction encoding table
//! - [`addressing`]: the five operand addressing modes
//! - [`calls`]: procedure call, return and `EXIT`
//! - [`builtins`]: standard procedures (`CSP`)
//! - [`syscom`]: the system communication block
//! - [`disasm`]: the disassembler used by tracing and the viewer
//!
//! # Execution Model
//!
//! Each [`engine::Interpreter::step`] executes one instruction. Errors it
//! raises are delivered to the running program as a call into segment 0
//! procedure 2; a second error before that handler returns is a panic.

pub mod addressing;
pub mod builtins;
pub mod calls;
pub mod constants;
pub mod disasm;
pub mod engine;
pub mod errors;
pub mod jumps;
pub mod memory_ops;
pub mod opcodes;
pub mod ops;
pub mod syscom;
