//! Console devices for units 1 (CONSOLE) and 2 (SYSTERM)
//!
//! The p-System uses carriage return (13) as its end-of-line character. The
//! host console translates it to and from the host newline.

use std::io::{self, Read, Write};

/// p-System end-of-line
pub const EOL: u8 = 13;

/// Character source and sink behind the console units
pub trait ConsoleDevice {
    /// Next input character, or `None` at end of input
    fn read_byte(&mut self) -> Option<u8>;

    /// Emit output characters
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Whether a character is ready without blocking
    fn has_input(&self) -> bool {
        false
    }

    /// Everything written so far, for devices that keep it
    fn transcript(&self) -> Option<&[u8]> {
        None
    }
}

/// Console bound to the host's stdin and stdout
#[derive(Debug, Default)]
pub struct HostConsole;

impl ConsoleDevice for HostConsole {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match io::stdin().read(&mut byte) {
            Ok(1) if byte[0] == b'\n' => Some(EOL),
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let translated: Vec<u8> = bytes
            .iter()
            .map(|&b| if b == EOL { b'\n' } else { b })
            .collect();
        let mut stdout = io::stdout();
        // Output errors are ignored
        let _ = stdout.write_all(&translated);
        let _ = stdout.flush();
    }
}
