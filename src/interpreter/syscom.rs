//! The system communication block (SYSCOM)
//!
//! SYSCOM sits at [`SYSCOM_ADDR`] and is shared between the machine and the
//! operating system running on it. The machine writes the trap fields and
//! the I/O result; a few words are emulated and always reflect the host:
//!
//! | Offset | Field | Source |
//! |---|---|---|
//! | +0 | IORSLT | last unit I/O result |
//! | +2 | XEQERR | code of the last delivered trap |
//! | +4 | SYSUNIT | boot unit |
//! | +6 | BOMBIPC | address of the trapping instruction |
//! | +8 | BOMBP | MP at the trap |
//! | +10 | THEDATE | host date, emulated |
//! | +12 | screen height | host terminal, emulated |
//! | +14 | screen width | host terminal, emulated |
//! | +16 | MACHINE_FLAGS | emulated |
//!
//! Emulated words have no write handler, so program writes are dropped.

use crate::interpreter::constants::*;
use crate::interpreter::errors::ExecutionError;
use crate::memory::{Endianness, Memory};
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_SCREEN: (u16, u16) = (24, 80);

/// UCSD packed date: bits 0-3 month, 4-8 day, 9-15 year mod 100
pub fn pack_date(year: i32, month: u32, day: u32) -> u16 {
    let year = year.rem_euclid(100) as u16;
    (year << 9) | ((day as u16 & 0x1F) << 4) | (month as u16 & 0x0F)
}

/// Convert days since 1970-01-01 to (year, month, day)
pub fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = (yoe + era * 400 + if month <= 2 { 1 } else { 0 }) as i32;
    (year, month, day)
}

fn host_date() -> u16 {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64);
    let (year, month, day) = civil_from_days(seconds.div_euclid(86_400));
    pack_date(year, month, day)
}

/// Host terminal size as (rows, columns)
fn host_screen() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok((columns, rows)) if columns > 0 && rows > 0 => (rows, columns),
        _ => DEFAULT_SCREEN,
    }
}

/// MACHINE_FLAGS for a byte order
pub fn machine_flags(endianness: Endianness) -> u16 {
    let big = if endianness == Endianness::Big { FLAG_BIG_ENDIAN } else { 0 };
    big | FLAG_REALS | FLAG_DECIMAL | FLAG_BYTE_ADDRESSED
}

/// Byte `addr - start` of `word` in the active byte order
fn word_byte(word: u16, start: u16, addr: u16, endianness: Endianness) -> u8 {
    endianness.split(word)[(addr.wrapping_sub(start) & 1) as usize]
}

/// Zero SYSCOM and bind its emulated words
pub fn install(mem: &mut Memory) -> Result<(), ExecutionError> {
    mem.write_bytes(SYSCOM_ADDR, &[0; SYSCOM_SIZE as usize])?;

    let date = SYSCOM_ADDR + SYSCOM_THEDATE;
    mem.register_emulated(
        date..date + 2,
        Box::new(move |addr: u16, order: Endianness| word_byte(host_date(), date, addr, order)),
        None,
    );

    let screen = SYSCOM_ADDR + SYSCOM_SCREEN_HEIGHT;
    mem.register_emulated(
        screen..screen + 4,
        Box::new(move |addr: u16, order: Endianness| {
            let (rows, columns) = host_screen();
            let offset = addr - screen;
            let word = if offset < 2 { rows } else { columns };
            word_byte(word, screen + (offset & !1), addr, order)
        }),
        None,
    );

    let flags = SYSCOM_ADDR + SYSCOM_MACHINE_FLAGS;
    mem.register_emulated(
        flags..flags + 2,
        Box::new(move |addr: u16, order: Endianness| {
            word_byte(machine_flags(order), flags, addr, order)
        }),
        None,
    );
    Ok(())
}

/// Mirror the pending I/O result into IORSLT
pub fn write_io_result(mem: &mut Memory, result: u16) -> Result<(), ExecutionError> {
    mem.write_word(SYSCOM_ADDR + SYSCOM_IORSLT, result)
}

/// Fill the trap fields before the handler is entered
pub fn record_trap(
    mem: &mut Memory,
    error: &ExecutionError,
    ipc: u16,
    mp: u16,
) -> Result<(), ExecutionError> {
    mem.write_word(SYSCOM_ADDR + SYSCOM_XEQERR, error.code())?;
    mem.write_word(SYSCOM_ADDR + SYSCOM_BOMBIPC, ipc)?;
    mem.write_word(SYSCOM_ADDR + SYSCOM_BOMBP, mp)?;
    if let Some(result) = error.io_result() {
        write_io_result(mem, result)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_civil_from_days_known_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn test_pack_date_layout() {
        let packed = pack_date(1979, 7, 4);
        assert_eq!(packed & 0x0F, 7);
        assert_eq!((packed >> 4) & 0x1F, 4);
        assert_eq!(packed >> 9, 79);
    }

    #[test]
    fn test_emulated_flags_follow_endianness() {
        let mut mem = Memory::new();
        install(&mut mem).unwrap();
        let addr = SYSCOM_ADDR + SYSCOM_MACHINE_FLAGS;
        assert_eq!(mem.read_word(addr).unwrap() & FLAG_BIG_ENDIAN, 0);
        mem.set_endianness(Endianness::Big);
        assert_eq!(mem.read_word(addr).unwrap() & FLAG_BIG_ENDIAN, FLAG_BIG_ENDIAN);
        assert!(mem.read_word(addr).unwrap() & FLAG_BYTE_ADDRESSED != 0);

        mem.write_word(addr, 0).unwrap();
        assert_ne!(mem.read_word(addr).unwrap(), 0);
    }

    #[test]
    fn test_trap_fields() {
        let mut mem = Memory::new();
        install(&mut mem).unwrap();
        record_trap(&mut mem, &ExecutionError::UserIoError { result: 9 }, 0x1234, 0xE000).unwrap();
        assert_eq!(mem.read_word(SYSCOM_ADDR + SYSCOM_XEQERR).unwrap(), 10);
        assert_eq!(mem.read_word(SYSCOM_ADDR + SYSCOM_BOMBIPC).unwrap(), 0x1234);
        assert_eq!(mem.read_word(SYSCOM_ADDR + SYSCOM_BOMBP).unwrap(), 0xE000);
        assert_eq!(mem.read_word(SYSCOM_ADDR + SYSCOM_IORSLT).unwrap(), 9);
    }
}
