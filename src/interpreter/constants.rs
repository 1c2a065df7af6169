// Constants for the p-machine memory map and record layouts

/// Number of addressable byte cells
pub const MEMORY_SIZE: usize = 0x1_0000;

/// Reserved low memory (flagged WarnOnAccess)
pub const LOW_RESERVED_START: u16 = 0x0002;
pub const LOW_RESERVED_END: u16 = 0x0080;

/// System communication block
pub const SYSCOM_ADDR: u16 = 0x0080;
pub const SYSCOM_SIZE: u16 = 0x0080;

/// The heap grows upward from here
pub const HEAP_START: u16 = 0x0100;

/// Frames and loaded segments grow downward from here
pub const PROGRAM_STACK_TOP: u16 = 0xF000;

/// Evaluation stack bounds: SP starts at the top, pushes may not go below the limit
pub const EVAL_STACK_TOP: u16 = 0xFFF0;
pub const EVAL_STACK_LIMIT: u16 = 0xF000;

/// Reserved high memory (flagged WarnOnAccess)
pub const HIGH_RESERVED_START: u16 = 0xFFF0;

/// Activation record slots, relative to MP
pub const FRAME_SAVED_PSP: u16 = 0;
pub const FRAME_STATIC_LINK: u16 = 2;
pub const FRAME_DYNAMIC_LINK: u16 = 4;
pub const FRAME_SAVED_JTAB: u16 = 6;
pub const FRAME_SAVED_SEG: u16 = 8;
pub const FRAME_SAVED_IPC: u16 = 10;
pub const FRAME_SAVED_SP: u16 = 12;
pub const FRAME_HEADER_SIZE: u16 = 14;

/// Attribute table fields, relative to JTAB
pub const JTAB_PROC_NUMBER: i16 = 0;
pub const JTAB_LEX_LEVEL: i16 = 1;
pub const JTAB_ENTRY: i16 = -2;
pub const JTAB_EXIT: i16 = -4;
pub const JTAB_PARAM_SIZE: i16 = -6;
pub const JTAB_DATA_SIZE: i16 = -8;

/// SYSCOM field offsets
pub const SYSCOM_IORSLT: u16 = 0;
pub const SYSCOM_XEQERR: u16 = 2;
pub const SYSCOM_SYSUNIT: u16 = 4;
pub const SYSCOM_BOMBIPC: u16 = 6;
pub const SYSCOM_BOMBP: u16 = 8;
pub const SYSCOM_THEDATE: u16 = 10;
pub const SYSCOM_SCREEN_HEIGHT: u16 = 12;
pub const SYSCOM_SCREEN_WIDTH: u16 = 14;
pub const SYSCOM_MACHINE_FLAGS: u16 = 16;

/// MACHINE_FLAGS bits
pub const FLAG_BIG_ENDIAN: u16 = 0x0001;
pub const FLAG_REALS: u16 = 0x0002;
pub const FLAG_DECIMAL: u16 = 0x0004;
pub const FLAG_BYTE_ADDRESSED: u16 = 0x0008;

/// Kernel procedure that receives delivered traps (segment 0)
pub const EXECERROR_PROC: u8 = 2;

/// Disk block size in bytes
pub const BLOCK_SIZE: usize = 512;

/// Highest unit number
pub const MAX_UNIT: u16 = 19;

/// Equality tolerance for REAL comparisons
pub const REAL_EPSILON: f32 = 1.1920929e-7;

/// Largest decimal magnitude, in digits
pub const DECIMAL_MAX_DIGITS: usize = 36;

/// Largest set, in words
pub const SET_MAX_WORDS: usize = 255;

/// File written on fatal errors
pub const CORE_DUMP_FILE: &str = "pmachine.core";
