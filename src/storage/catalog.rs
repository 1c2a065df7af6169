//! Locating named files on a mounted volume
//!
//! The boot sequence only needs one thing from a volume: the block extent of
//! the system file. [`Catalog`] captures that lookup; [`VolumeDirectory`]
//! implements it for the UCSD volume directory stored at block 2.
//!
//! # Directory Layout
//!
//! ```text
//! entry 0   volume header   (+16: number of files)
//! entry i   +0  first block
//!           +2  next block (one past the last)
//!           +4  file kind
//!           +6  name length, then up to 15 name bytes
//! ```
//!
//! Entries are 26 bytes each.

use super::{StorageError, StorageManager, BLOCK_SIZE};

/// Block holding the volume directory
pub const DIRECTORY_BLOCK: u16 = 2;

/// Size of one directory entry
pub const ENTRY_SIZE: usize = 26;

/// Bytes read for the whole directory (four blocks)
pub const DIRECTORY_BYTES: usize = 4 * BLOCK_SIZE;

/// Largest file count a real directory can hold
const MAX_FILES: u16 = 77;

const NAME_LENGTH_OFFSET: usize = 6;
const NAME_MAX: usize = 15;

/// Where a file lives on its unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtent {
    pub name: String,
    pub first_block: u16,
    pub next_block: u16,
    pub kind: u16,
}

impl FileExtent {
    pub fn blocks(&self) -> u16 {
        self.next_block.saturating_sub(self.first_block)
    }
}

/// A lookup of named files on a unit
pub trait Catalog {
    fn find(&self, name: &str) -> Option<FileExtent>;

    fn files(&self) -> &[FileExtent];
}

/// A parsed UCSD volume directory
#[derive(Debug, Clone, Default)]
pub struct VolumeDirectory {
    pub volume_name: String,
    files: Vec<FileExtent>,
}

fn word(bytes: &[u8], offset: usize, big: bool) -> u16 {
    let pair = [bytes[offset], bytes[offset + 1]];
    if big {
        u16::from_be_bytes(pair)
    } else {
        u16::from_le_bytes(pair)
    }
}

fn name_at(bytes: &[u8], offset: usize) -> String {
    let len = (bytes[offset] as usize).min(NAME_MAX);
    bytes[offset + 1..offset + 1 + len]
        .iter()
        .map(|&b| b as char)
        .collect()
}

impl VolumeDirectory {
    /// Read and parse the directory of a mounted unit
    pub fn read(storage: &mut StorageManager, unit: u16) -> Result<Self, StorageError> {
        let size = storage
            .unit(unit)
            .map(|u| u.size() as usize)
            .unwrap_or(DIRECTORY_BYTES + DIRECTORY_BLOCK as usize * BLOCK_SIZE);
        let available = size.saturating_sub(DIRECTORY_BLOCK as usize * BLOCK_SIZE);
        let bytes = storage.read_blocks(unit, DIRECTORY_BLOCK, available.min(DIRECTORY_BYTES))?;
        Ok(Self::parse(&bytes))
    }

    /// Parse directory bytes; the byte order is chosen from the file count
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.len() < ENTRY_SIZE {
            return VolumeDirectory::default();
        }
        let mut big = false;
        let mut count = word(bytes, 16, false);
        if count > MAX_FILES {
            big = true;
            count = word(bytes, 16, true);
        }

        let volume_name = if bytes[NAME_LENGTH_OFFSET] as usize <= 7 {
            name_at(bytes, NAME_LENGTH_OFFSET)
        } else {
            String::new()
        };

        let files = (1..=count.min(MAX_FILES) as usize)
            .map(|i| i * ENTRY_SIZE)
            .take_while(|&offset| offset + ENTRY_SIZE <= bytes.len())
            .map(|offset| FileExtent {
                first_block: word(bytes, offset, big),
                next_block: word(bytes, offset + 2, big),
                kind: word(bytes, offset + 4, big),
                name: name_at(bytes, offset + NAME_LENGTH_OFFSET),
            })
            .collect();

        VolumeDirectory { volume_name, files }
    }
}

impl Catalog for VolumeDirectory {
    fn find(&self, name: &str) -> Option<FileExtent> {
        self.files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn files(&self) -> &[FileExtent] {
        &self.files
    }
}

/// Find a file on a unit through its volume directory
pub fn locate(
    storage: &mut StorageManager,
    unit: u16,
    name: &str,
) -> Result<FileExtent, StorageError> {
    VolumeDirectory::read(storage, unit)?
        .find(name)
        .ok_or_else(|| StorageError::FileNotFound {
            unit,
            name: name.to_string(),
        })
}

/// Encode a directory (volume header plus file entries) in little-endian order
pub fn encode_directory(volume: &str, files: &[FileExtent]) -> Vec<u8> {
    let mut bytes = vec![0u8; DIRECTORY_BYTES];
    let put_word = |bytes: &mut [u8], offset: usize, value: u16| {
        bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    };
    let put_name = |bytes: &mut [u8], offset: usize, name: &str| {
        let name = name.as_bytes();
        let len = name.len().min(NAME_MAX);
        bytes[offset] = len as u8;
        bytes[offset + 1..offset + 1 + len].copy_from_slice(&name[..len]);
    };

    put_word(&mut bytes, 2, DIRECTORY_BLOCK + 4);
    put_name(&mut bytes, NAME_LENGTH_OFFSET, &volume[..volume.len().min(7)]);
    put_word(&mut bytes, 16, files.len() as u16);
    for (i, file) in files.iter().enumerate() {
        let offset = (i + 1) * ENTRY_SIZE;
        put_word(&mut bytes, offset, file.first_block);
        put_word(&mut bytes, offset + 2, file.next_block);
        put_word(&mut bytes, offset + 4, file.kind);
        put_name(&mut bytes, offset + NAME_LENGTH_OFFSET, &file.name);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskUnit;

    fn extent(name: &str, first: u16, next: u16) -> FileExtent {
        FileExtent {
            name: name.to_string(),
            first_block: first,
            next_block: next,
            kind: 2,
        }
    }

    #[test]
    fn test_parse_finds_files_case_insensitively() {
        let dir = VolumeDirectory::parse(&encode_directory(
            "PASCAL",
            &[extent("SYSTEM.PASCAL", 6, 40), extent("SYSTEM.FILER", 40, 60)],
        ));
        assert_eq!(dir.volume_name, "PASCAL");
        assert_eq!(dir.files().len(), 2);
        let found = dir.find("system.pascal").unwrap();
        assert_eq!((found.first_block, found.blocks()), (6, 34));
        assert!(dir.find("SYSTEM.EDITOR").is_none());
    }

    #[test]
    fn test_big_endian_directory_detected_from_count() {
        let mut bytes = encode_directory("V", &[extent("A", 6, 7)]);
        for offset in [16usize, ENTRY_SIZE, ENTRY_SIZE + 2, ENTRY_SIZE + 4] {
            bytes.swap(offset, offset + 1);
        }
        let dir = VolumeDirectory::parse(&bytes);
        assert_eq!(dir.find("A").unwrap().first_block, 6);
    }

    #[test]
    fn test_locate_on_mounted_unit() {
        let mut image = vec![0u8; 8 * BLOCK_SIZE];
        let dir = encode_directory("BOOT", &[extent("SYSTEM.PASCAL", 6, 8)]);
        image[2 * BLOCK_SIZE..6 * BLOCK_SIZE].copy_from_slice(&dir);

        let mut storage = StorageManager::new();
        storage.attach(4, DiskUnit::from_bytes(image, true)).unwrap();
        assert_eq!(locate(&mut storage, 4, "SYSTEM.PASCAL").unwrap().first_block, 6);
        assert!(matches!(
            locate(&mut storage, 4, "NOPE"),
            Err(StorageError::FileNotFound { .. })
        ));
    }
}
