//! # Introduction
//!
//! pmachine emulates the UCSD p-System p-machine: it mounts disk images,
//! boots the system code file from a unit and interprets its p-code with
//! full segment, procedure and trap semantics. Runs can optionally record a
//! snapshot after every instruction and be browsed forward and backward
//! through a terminal UI built with [ratatui](https://docs.rs/ratatui).
//!
//! ## Execution pipeline
//!
//! ```text
//! Disk image → Catalog → Segment dictionary → Loader → Interpreter → Snapshots → TUI
//! ```
//!
//! 1. [`storage`]: mounted disk units, block I/O, directory lookup and the
//!    console devices.
//! 2. [`segments`]: segment dictionaries, relocation, the resident segment
//!    table and a builder for assembling code files.
//! 3. [`memory`]: the 64 KiB byte-addressed memory with access flags, the
//!    evaluation stack and the heap.
//! 4. [`interpreter`]: instruction decoding and execution, calls, traps,
//!    standard procedures and the disassembler.
//! 5. [`snapshot`]: per-instruction history with a memory budget and a
//!    [`snapshot::MockTerminal`] that records console output.
//! 6. [`ui`]: ratatui-based trace viewer; not part of the stable library API.
//!
//! ## Memory map
//!
//! Byte-addressed, 16-bit words in the code file's byte order:
//! SYSCOM at `0x0080`, heap growing up from `0x0100`, program stack growing
//! down from `0xF000`, evaluation stack growing down from `0xFFF0`.

pub mod interpreter;
pub mod memory;
pub mod segments;
pub mod snapshot;
pub mod storage;
pub mod ui;
