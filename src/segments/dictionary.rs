//! Boot-image segment dictionary
//!
//! Block 0 of a code file describes up to sixteen segments:
//!
//! ```text
//! 0x000..0x040  16 x (block, length) word pairs, block relative to the file
//! 0x040..0x0C0  16 x 8-byte space-padded names
//! 0x100..0x120  16 x info word, low byte = segment number
//! ```
//!
//! The file's byte order is detected from the first pair: segment 0 always
//! starts within the first 256 blocks, so a zero first byte followed by a
//! nonzero second byte can only be a big-endian block number.

use crate::interpreter::errors::RuntimeError;
use crate::memory::Endianness;

pub const DICTIONARY_SLOTS: usize = 16;
pub const NAMES_OFFSET: usize = 0x40;
pub const NAME_LENGTH: usize = 8;
pub const INFO_OFFSET: usize = 0x100;

/// Minimum number of bytes needed to parse a dictionary
pub const DICTIONARY_SIZE: usize = INFO_OFFSET + 2 * DICTIONARY_SLOTS;

/// One occupied dictionary slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub slot: usize,
    pub number: u8,
    pub name: String,
    /// Block relative to the start of the code file
    pub block: u16,
    /// Length in bytes
    pub length: u16,
}

/// The parsed dictionary of a code file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDictionary {
    pub endianness: Endianness,
    pub entries: Vec<DictionaryEntry>,
}

/// Guess the byte order of a code file from its first block address
pub fn detect_endianness(block0: &[u8]) -> Endianness {
    match block0 {
        [0, second, ..] if *second != 0 => Endianness::Big,
        _ => Endianness::Little,
    }
}

impl SegmentDictionary {
    pub fn parse(block0: &[u8]) -> Result<Self, RuntimeError> {
        if block0.len() < DICTIONARY_SIZE {
            return Err(RuntimeError::Boot {
                message: format!(
                    "segment dictionary needs {} bytes, found {}",
                    DICTIONARY_SIZE,
                    block0.len()
                ),
            });
        }
        let endianness = detect_endianness(block0);
        let word = |offset: usize| endianness.combine([block0[offset], block0[offset + 1]]);

        let entries = (0..DICTIONARY_SLOTS)
            .filter_map(|slot| {
                let length = word(slot * 4 + 2);
                if length == 0 {
                    return None;
                }
                let name_at = NAMES_OFFSET + slot * NAME_LENGTH;
                let name = block0[name_at..name_at + NAME_LENGTH]
                    .iter()
                    .map(|&b| b as char)
                    .collect::<String>()
                    .trim_end_matches([' ', '\0'])
                    .to_string();
                Some(DictionaryEntry {
                    slot,
                    number: (word(INFO_OFFSET + slot * 2) & 0xFF) as u8,
                    name,
                    block: word(slot * 4),
                    length,
                })
            })
            .collect();

        Ok(SegmentDictionary {
            endianness,
            entries,
        })
    }

    /// Entries carrying a given segment number, in slot order
    pub fn entries_for(&self, number: u8) -> impl Iterator<Item = &DictionaryEntry> {
        self.entries.iter().filter(move |e| e.number == number)
    }
}

/// Encode a dictionary block (used by the code-file builder)
pub fn encode(entries: &[DictionaryEntry], endianness: Endianness) -> Vec<u8> {
    let mut block = vec![0u8; crate::interpreter::constants::BLOCK_SIZE];
    for entry in entries {
        let pair = entry.slot * 4;
        block[pair..pair + 2].copy_from_slice(&endianness.split(entry.block));
        block[pair + 2..pair + 4].copy_from_slice(&endianness.split(entry.length));

        let name_at = NAMES_OFFSET + entry.slot * NAME_LENGTH;
        let mut name = [b' '; NAME_LENGTH];
        for (dst, src) in name.iter_mut().zip(entry.name.bytes()) {
            *dst = src;
        }
        block[name_at..name_at + NAME_LENGTH].copy_from_slice(&name);

        let info = INFO_OFFSET + entry.slot * 2;
        block[info..info + 2].copy_from_slice(&endianness.split(entry.number as u16));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slot: usize, number: u8, name: &str, block: u16, length: u16) -> DictionaryEntry {
        DictionaryEntry {
            slot,
            number,
            name: name.to_string(),
            block,
            length,
        }
    }

    #[test]
    fn test_parse_skips_empty_slots() {
        let entries = vec![entry(0, 0, "PASCALSY", 1, 0x200), entry(3, 7, "USERPROG", 2, 0x40)];
        let dict = SegmentDictionary::parse(&encode(&entries, Endianness::Little)).unwrap();
        assert_eq!(dict.endianness, Endianness::Little);
        assert_eq!(dict.entries, entries);
        assert_eq!(dict.entries_for(7).count(), 1);
    }

    #[test]
    fn test_big_endian_detected() {
        let entries = vec![entry(0, 0, "PASCALSY", 1, 0x200)];
        let bytes = encode(&entries, Endianness::Big);
        assert_eq!(&bytes[..2], &[0, 1]);
        let dict = SegmentDictionary::parse(&bytes).unwrap();
        assert_eq!(dict.endianness, Endianness::Big);
        assert_eq!(dict.entries[0].length, 0x200);
    }

    #[test]
    fn test_short_block_is_a_boot_error() {
        assert!(matches!(
            SegmentDictionary::parse(&[0u8; 16]),
            Err(RuntimeError::Boot { .. })
        ));
    }
}
