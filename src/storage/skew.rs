//! Sector interleave tables for historical disk image orders
//!
//! p-System volumes are addressed in 512-byte blocks, each made of two
//! 256-byte logical sectors. Images saved in DOS 3.3 sector order store the
//! sectors of each 16-sector track in a different physical order, so every
//! logical sector has to be translated before it is read or written.

use std::path::Path;

/// Bytes per logical sector in a skewed image
pub const SECTOR_SIZE: u64 = 256;

/// Sectors per track in a skewed image
pub const SECTORS_PER_TRACK: u64 = 16;

/// Logical (p-System) sector → physical sector within a track, for DOS-order images
pub const DOS_ORDER_SKEW: [u8; 16] = [0, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 15];

/// Choose a translation table from the image file name
pub fn skew_for_path(path: &Path) -> Option<&'static [u8; 16]> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "dsk" | "do" => Some(&DOS_ORDER_SKEW),
        _ => None,
    }
}

/// Translate a logical byte position into its physical position in the image
#[inline]
pub fn translate(position: u64, table: Option<&[u8; 16]>) -> u64 {
    match table {
        None => position,
        Some(table) => {
            let sector = position / SECTOR_SIZE;
            let track = sector / SECTORS_PER_TRACK;
            let physical =
                track * SECTORS_PER_TRACK + table[(sector % SECTORS_PER_TRACK) as usize] as u64;
            physical * SECTOR_SIZE + position % SECTOR_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_selects_table() {
        assert!(skew_for_path(Path::new("pascal.dsk")).is_some());
        assert!(skew_for_path(Path::new("PASCAL.DO")).is_some());
        assert!(skew_for_path(Path::new("pascal.po")).is_none());
        assert!(skew_for_path(Path::new("pascal")).is_none());
    }

    #[test]
    fn test_translation_within_and_across_tracks() {
        let table = Some(&DOS_ORDER_SKEW);
        assert_eq!(translate(0, table), 0);
        assert_eq!(translate(256 + 5, table), 14 * 256 + 5);
        // Second track keeps the track offset
        assert_eq!(translate(16 * 256 + 256, table), (16 + 14) * 256);
        assert_eq!(translate(1234, None), 1234);
    }

    #[test]
    fn test_table_is_a_permutation() {
        let mut seen = [false; 16];
        for &s in DOS_ORDER_SKEW.iter() {
            seen[s as usize] = true;
        }
        assert!(seen.iter().all(|&b| b));
    }
}
