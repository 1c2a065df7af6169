//! Storage manager for mountable disk units
//!
//! This module provides the backing stores behind p-System unit numbers:
//! - [`StorageManager`]: the table of units 0-19
//! - [`DiskUnit`]: an open image file or a fully buffered snapshot
//! - [`skew`]: sector translation for DOS-order images
//! - [`catalog`]: locating named files on a mounted volume
//! - [`console`]: character devices behind units 1 and 2
//!
//! # Mount Modes
//!
//! - [`MountMode::ReadOnly`]: file stays open, writes fail with IORESULT 16
//! - [`MountMode::ReadWrite`]: file stays open, writes go to the host file
//! - [`MountMode::Forget`]: the image is read into memory and the file closed;
//!   writes only change the in-memory copy
//!
//! # Error Handling
//!
//! Unit I/O failures are not execution errors. They are reported as
//! [`StorageError`] values whose [`StorageError::io_result`] becomes the
//! program's pending IORESULT.

pub mod catalog;
pub mod console;
pub mod skew;

use crate::interpreter::constants::{BLOCK_SIZE, MAX_UNIT};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// IORESULT values
pub const IO_OK: u16 = 0;
pub const IO_BAD_UNIT: u16 = 2;
pub const IO_BAD_MODE: u16 = 3;
pub const IO_NO_UNIT: u16 = 9;
pub const IO_WRITE_PROTECT: u16 = 16;
pub const IO_DEVICE_ERROR: u16 = 64;

/// Console units, never disk-backed
pub const CONSOLE_UNIT: u16 = 1;
pub const SYSTERM_UNIT: u16 = 2;

/// Storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bad unit number {unit}")]
    BadUnit { unit: u16 },

    #[error("unit {unit} is not on line")]
    NoUnit { unit: u16 },

    #[error("unit {unit} is a console unit")]
    ConsoleUnit { unit: u16 },

    #[error("unit {unit} is write protected")]
    WriteProtected { unit: u16 },

    #[error("transfer outside of unit {unit}: {position} + {length} > {size}")]
    OutOfRange {
        unit: u16,
        position: u64,
        length: usize,
        size: u64,
    },

    #[error("file {name} not found on unit {unit}")]
    FileNotFound { unit: u16, name: String },

    #[error("I/O error on {path}: {source}")]
    Host {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// IORESULT reported to the program for this failure
    pub fn io_result(&self) -> u16 {
        match self {
            StorageError::BadUnit { .. } => IO_BAD_UNIT,
            StorageError::ConsoleUnit { .. } => IO_BAD_MODE,
            StorageError::NoUnit { .. } => IO_NO_UNIT,
            StorageError::WriteProtected { .. } => IO_WRITE_PROTECT,
            StorageError::OutOfRange { .. }
            | StorageError::FileNotFound { .. }
            | StorageError::Host { .. } => IO_DEVICE_ERROR,
        }
    }
}

/// How an image is attached to a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
    #[default]
    Forget,
}

#[derive(Debug)]
enum Backing {
    File(File),
    Buffer(Vec<u8>),
}

/// A mounted disk image
#[derive(Debug)]
pub struct DiskUnit {
    path: Option<PathBuf>,
    backing: Backing,
    size: u64,
    read_only: bool,
    skew: Option<&'static [u8; 16]>,
}

impl DiskUnit {
    /// Open an image file in the given mode
    pub fn open(path: &Path, mode: MountMode) -> Result<Self, StorageError> {
        let host = |source| StorageError::Host {
            path: path.to_path_buf(),
            source,
        };
        let skew = skew::skew_for_path(path);

        let (backing, size) = match mode {
            MountMode::Forget => {
                let mut data = Vec::new();
                File::open(path)
                    .and_then(|mut f| f.read_to_end(&mut data))
                    .map_err(host)?;
                let size = data.len() as u64;
                (Backing::Buffer(data), size)
            }
            MountMode::ReadOnly | MountMode::ReadWrite => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(mode == MountMode::ReadWrite)
                    .open(path)
                    .map_err(host)?;
                let size = file.metadata().map_err(host)?.len();
                (Backing::File(file), size)
            }
        };

        Ok(DiskUnit {
            path: Some(path.to_path_buf()),
            backing,
            size,
            read_only: mode == MountMode::ReadOnly,
            skew,
        })
    }

    /// Wrap an in-memory image
    pub fn from_bytes(data: Vec<u8>, read_only: bool) -> Self {
        let size = data.len() as u64;
        DiskUnit {
            path: None,
            backing: Backing::Buffer(data),
            size,
            read_only,
            skew: None,
        }
    }

    /// Apply a sector translation table
    pub fn with_skew(mut self, skew: Option<&'static [u8; 16]>) -> Self {
        self.skew = skew;
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn blocks(&self) -> u64 {
        self.size / BLOCK_SIZE as u64
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn host_error(&self, source: io::Error) -> StorageError {
        StorageError::Host {
            path: self.path.clone().unwrap_or_default(),
            source,
        }
    }

    /// Copy bytes starting at a logical position, one sector run at a time
    ///
    /// A skewed image that ends mid-track can map an in-range logical sector
    /// past the end of the image; that run fails as out of range.
    fn transfer<F>(
        &mut self,
        unit: u16,
        position: u64,
        length: usize,
        mut f: F,
    ) -> Result<(), StorageError>
    where
        F: FnMut(&mut Backing, u64, usize, usize) -> io::Result<()>,
    {
        let run = if self.skew.is_some() {
            skew::SECTOR_SIZE
        } else {
            u64::MAX
        };
        let mut done = 0usize;
        while done < length {
            let logical = position + done as u64;
            let in_run = (run - logical % run).min((length - done) as u64) as usize;
            let physical = skew::translate(logical, self.skew);
            if physical + in_run as u64 > self.size {
                return Err(StorageError::OutOfRange {
                    unit,
                    position: physical,
                    length: in_run,
                    size: self.size,
                });
            }
            f(&mut self.backing, physical, done, in_run).map_err(|e| self.host_error(e))?;
            done += in_run;
        }
        Ok(())
    }

    /// Read `buf.len()` bytes from a logical position
    pub fn read_at(
        &mut self,
        unit: u16,
        position: u64,
        buf: &mut [u8],
    ) -> Result<(), StorageError> {
        if position + buf.len() as u64 > self.size {
            return Err(StorageError::OutOfRange {
                unit,
                position,
                length: buf.len(),
                size: self.size,
            });
        }
        let length = buf.len();
        self.transfer(unit, position, length, |backing, physical, offset, len| {
            let dst = &mut buf[offset..offset + len];
            match backing {
                Backing::Buffer(data) => {
                    dst.copy_from_slice(&data[physical as usize..physical as usize + len]);
                    Ok(())
                }
                Backing::File(file) => {
                    file.seek(SeekFrom::Start(physical))?;
                    file.read_exact(dst)
                }
            }
        })
    }

    /// Write bytes at a logical position
    pub fn write_at(&mut self, unit: u16, position: u64, bytes: &[u8]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::WriteProtected { unit });
        }
        if position + bytes.len() as u64 > self.size {
            return Err(StorageError::OutOfRange {
                unit,
                position,
                length: bytes.len(),
                size: self.size,
            });
        }
        self.transfer(unit, position, bytes.len(), |backing, physical, offset, len| {
            let src = &bytes[offset..offset + len];
            match backing {
                Backing::Buffer(data) => {
                    data[physical as usize..physical as usize + len].copy_from_slice(src);
                    Ok(())
                }
                Backing::File(file) => {
                    file.seek(SeekFrom::Start(physical))?;
                    file.write_all(src)
                }
            }
        })
    }
}

/// The unit table
#[derive(Debug)]
pub struct StorageManager {
    units: Vec<Option<DiskUnit>>,
}

impl StorageManager {
    pub fn new() -> Self {
        StorageManager {
            units: (0..=MAX_UNIT).map(|_| None).collect(),
        }
    }

    fn check_mountable(unit: u16) -> Result<(), StorageError> {
        if unit > MAX_UNIT {
            return Err(StorageError::BadUnit { unit });
        }
        if unit == CONSOLE_UNIT || unit == SYSTERM_UNIT {
            return Err(StorageError::ConsoleUnit { unit });
        }
        Ok(())
    }

    /// Mount an image file on a unit, replacing any previous mount
    pub fn mount(&mut self, unit: u16, path: &Path, mode: MountMode) -> Result<(), StorageError> {
        Self::check_mountable(unit)?;
        let disk = DiskUnit::open(path, mode)?;
        debug!(
            unit,
            path = %path.display(),
            ?mode,
            size = disk.size(),
            skewed = disk.skew.is_some(),
            "mounted"
        );
        self.units[unit as usize] = Some(disk);
        Ok(())
    }

    /// Mount an already constructed unit
    pub fn attach(&mut self, unit: u16, disk: DiskUnit) -> Result<(), StorageError> {
        Self::check_mountable(unit)?;
        debug!(unit, size = disk.size(), "attached in-memory image");
        self.units[unit as usize] = Some(disk);
        Ok(())
    }

    /// Detach a unit, closing its file
    pub fn unmount(&mut self, unit: u16) -> Result<(), StorageError> {
        Self::check_mountable(unit)?;
        match self.units[unit as usize].take() {
            Some(_) => {
                debug!(unit, "unmounted");
                Ok(())
            }
            None => Err(StorageError::NoUnit { unit }),
        }
    }

    pub fn is_mounted(&self, unit: u16) -> bool {
        self.units
            .get(unit as usize)
            .is_some_and(|u| u.is_some())
    }

    pub fn unit(&self, unit: u16) -> Option<&DiskUnit> {
        self.units.get(unit as usize).and_then(|u| u.as_ref())
    }

    fn unit_mut(&mut self, unit: u16) -> Result<&mut DiskUnit, StorageError> {
        if unit > MAX_UNIT {
            return Err(StorageError::BadUnit { unit });
        }
        if unit == CONSOLE_UNIT || unit == SYSTERM_UNIT {
            return Err(StorageError::ConsoleUnit { unit });
        }
        self.units[unit as usize]
            .as_mut()
            .ok_or(StorageError::NoUnit { unit })
    }

    /// Read `length` bytes starting at a block
    pub fn read_blocks(
        &mut self,
        unit: u16,
        block: u16,
        length: usize,
    ) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; length];
        let position = block as u64 * BLOCK_SIZE as u64;
        self.unit_mut(unit)?.read_at(unit, position, &mut buf)?;
        Ok(buf)
    }

    /// Write bytes starting at a block
    pub fn write_blocks(
        &mut self,
        unit: u16,
        block: u16,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        let position = block as u64 * BLOCK_SIZE as u64;
        self.unit_mut(unit)?.write_at(unit, position, bytes)
    }
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}
