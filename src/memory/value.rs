//! Word-level value conversions
//!
//! The p-machine only ever stores 16-bit words. This module interprets them:
//!
//! - integers: two's complement `i16`
//! - booleans: only the low bit is significant
//! - REALs: a 32-bit IEEE single split into a low and a high word

/// A 16-bit machine word
pub type Word = u16;

/// A 16-bit byte address
pub type Address = u16;

/// Interpret a word as a signed integer
#[inline]
pub fn as_int(word: Word) -> i16 {
    word as i16
}

/// Store a signed integer in a word
#[inline]
pub fn from_int(value: i16) -> Word {
    value as Word
}

/// Interpret a word as a boolean (low bit)
#[inline]
pub fn as_bool(word: Word) -> bool {
    word & 1 == 1
}

#[inline]
pub fn from_bool(value: bool) -> Word {
    value as Word
}

/// Split a REAL into (low, high) words
pub fn real_to_words(value: f32) -> (Word, Word) {
    let bits = value.to_bits();
    ((bits & 0xFFFF) as Word, (bits >> 16) as Word)
}

/// Join (low, high) words into a REAL
pub fn words_to_real(low: Word, high: Word) -> f32 {
    f32::from_bits(((high as u32) << 16) | low as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_split_keeps_bits() {
        let (low, high) = real_to_words(-2.5);
        assert_eq!(words_to_real(low, high), -2.5);
        assert_eq!(high, 0xC020);
        assert_eq!(low, 0);
    }

    #[test]
    fn test_int_and_bool_views() {
        assert_eq!(as_int(0xFFFF), -1);
        assert_eq!(from_int(-2), 0xFFFE);
        assert!(as_bool(0x0003));
        assert!(!as_bool(0x0002));
    }
}
