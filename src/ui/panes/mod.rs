//! TUI pane rendering modules
//!
//! Every pane draws from a recorded [`Snapshot`](crate::snapshot::Snapshot),
//! so the viewer can move backward through history as easily as forward.
//!
//! # Pane Modules
//!
//! - [`code`]: Disassembly around the next instruction
//! - [`frames`]: Active procedure frames, innermost first
//! - [`stack`]: Registers and the top of the evaluation stack
//! - [`console`]: Console transcript up to the selected instruction
//! - [`status`]: Status bar with keybindings and playback state

mod block;

pub mod code;
pub mod console;
pub mod frames;
pub mod stack;
pub mod status;

pub use code::render_code_pane;
pub use console::render_console_pane;
pub use frames::render_frames_pane;
pub use stack::render_stack_pane;
pub use status::render_status_bar;
