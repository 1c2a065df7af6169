//! Runtime error types for the p-machine
//!
//! This module defines two layers of errors:
//!
//! - [`ExecutionError`]: errors raised by a single instruction. Each carries the
//!   numeric code the p-System uses for it, and most of them are delivered back
//!   to the running program as a trap.
//! - [`RuntimeError`]: what [`Interpreter::run`] reports to its caller: a trap
//!   that could not be delivered, a panic, or a boot failure.
//!
//! [`Interpreter::run`]: crate::interpreter::engine::Interpreter::run

use thiserror::Error;

/// Errors raised while executing an instruction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Internal inconsistency that the program may still handle
    #[error("system error: {message}")]
    SystemError { message: String },

    /// Range check, bounds check or set index failure
    #[error("invalid index: {value}")]
    InvalidIndex { value: i16 },

    /// Reference to a segment that is not in the overlay table
    #[error("no such segment: {segment}")]
    NoSuchSegment { segment: u8 },

    /// EXIT named a procedure with no active frame
    #[error("exit from uncalled procedure {procedure} of segment {segment}")]
    ExitFromUncalledProcedure { segment: u8, procedure: u8 },

    /// Heap collided with the program stack, or the evaluation stack is full
    #[error("stack overflow")]
    StackOverflow,

    /// Result does not fit the target representation
    #[error("integer overflow")]
    IntegerOverflow,

    /// Integer, real or decimal division by zero
    #[error("divide by zero")]
    DivideByZero,

    /// Access to address 0 or a write to protected memory
    #[error("invalid memory reference at 0x{address:04x}")]
    InvalidMemoryReference { address: u16 },

    /// The machine itself failed to perform I/O
    #[error("system I/O error {result}")]
    SystemIoError { result: u16 },

    /// IOCHECK found a pending I/O result
    #[error("user I/O error {result}")]
    UserIoError { result: u16 },

    /// Opcode, standard procedure or native procedure without an implementation
    #[error("unimplemented instruction: {what}")]
    UnimplementedInstruction { what: String },

    /// Logarithm or square root outside its domain
    #[error("floating point error")]
    FloatingPointError,

    /// String assignment longer than the destination
    #[error("string too long: {length} > {max}")]
    StringTooLong { length: u8, max: u8 },

    /// HALT or XIT
    #[error("halt")]
    Halt,

    /// BPT with breakpoints enabled
    #[error("breakpoint at line {line}")]
    Breakpoint { line: u16 },
}

impl ExecutionError {
    /// The p-System error number for this error
    pub fn code(&self) -> u16 {
        match self {
            ExecutionError::SystemError { .. } => 0,
            ExecutionError::InvalidIndex { .. } => 1,
            ExecutionError::NoSuchSegment { .. } => 2,
            ExecutionError::ExitFromUncalledProcedure { .. } => 3,
            ExecutionError::StackOverflow => 4,
            ExecutionError::IntegerOverflow => 5,
            ExecutionError::DivideByZero => 6,
            ExecutionError::InvalidMemoryReference { .. } => 7,
            ExecutionError::SystemIoError { .. } => 9,
            ExecutionError::UserIoError { .. } => 10,
            ExecutionError::UnimplementedInstruction { .. } => 11,
            ExecutionError::FloatingPointError => 12,
            ExecutionError::StringTooLong { .. } => 13,
            ExecutionError::Halt => 14,
            ExecutionError::Breakpoint { .. } => 15,
        }
    }

    /// The I/O result carried by this error, if any
    pub fn io_result(&self) -> Option<u16> {
        match self {
            ExecutionError::SystemIoError { result } | ExecutionError::UserIoError { result } => {
                Some(*result)
            }
            _ => None,
        }
    }

    /// Whether this error ends execution normally instead of trapping
    pub fn is_halt(&self) -> bool {
        matches!(self, ExecutionError::Halt)
    }
}

/// Errors reported by the interpreter to its caller
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A trap that could not be routed to the program's handler
    #[error("unhandled execution error {code}: {0}", code = .0.code())]
    Trap(ExecutionError),

    /// Corrupt machine state or a trap raised while handling a trap
    #[error("p-machine panic: {message}")]
    Panic { message: String },

    /// The system image could not be located or parsed
    #[error("boot failed: {message}")]
    Boot { message: String },

    /// Host I/O failure outside of unit I/O
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ExecutionError> for RuntimeError {
    fn from(error: ExecutionError) -> Self {
        RuntimeError::Trap(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_psystem_numbering() {
        assert_eq!(ExecutionError::InvalidIndex { value: 0 }.code(), 1);
        assert_eq!(ExecutionError::StackOverflow.code(), 4);
        assert_eq!(ExecutionError::DivideByZero.code(), 6);
        assert_eq!(ExecutionError::InvalidMemoryReference { address: 0 }.code(), 7);
        assert_eq!(ExecutionError::Halt.code(), 14);
    }

    #[test]
    fn test_io_result_only_on_io_errors() {
        assert_eq!(ExecutionError::UserIoError { result: 9 }.io_result(), Some(9));
        assert_eq!(ExecutionError::StackOverflow.io_result(), None);
    }

    #[test]
    fn test_trap_display_includes_code() {
        let err = RuntimeError::Trap(ExecutionError::DivideByZero);
        assert_eq!(err.to_string(), "unhandled execution error 6: divide by zero");
    }
}
