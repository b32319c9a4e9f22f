#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod cursor;
pub mod error;
mod flash;
mod get;
mod internal;
pub mod platform;
mod raw;
mod set;
mod walk;

pub use get::Get;
pub use set::Set;

extern crate alloc;

use crate::cursor::Geometry;
use crate::error::Error;
use crate::flash::Flash;
use crate::internal::Fs;
use crate::platform::Platform;
use crate::raw::BLOCK_SIZE;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::warn;
use spin::Mutex;

/// Offsets inside a sector are stored as `u16` on the flash.
const MAX_SECTOR_SIZE: usize = 0x10000;

#[derive(Debug, Clone, PartialEq)]
pub struct NvsStatistics {
    /// One entry per sector, in address order.
    pub sectors: Vec<SectorStatistics>,
    pub entries_overall: EntryStatistics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorStatistics {
    pub sector: u16,
    pub state: SectorState,
    pub entries: EntryStatistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SectorState {
    /// Receives the writes.
    Open,
    /// Full, carries a close entry.
    Closed,
    /// Erased, waiting to be opened.
    Empty,
}

/// Allocation table entry slots by content. Close entries are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStatistics {
    pub valid: u32,
    /// Torn entries left behind by a power loss.
    pub invalid: u32,
    pub free: u32,
}

/// A crash-safe key/value log on a raw NOR flash partition. Values are addressed by a `u16` id
/// and appended to the open sector, the oldest sector is compacted by a garbage collection once
/// all sectors are in use.
///
/// All operations lock the filesystem for their whole duration, so a read never observes a
/// garbage collection halfway through.
pub struct Nvs<T: Platform> {
    inner: Mutex<Fs<T>>,
}

impl<T: Platform> Nvs<T> {
    /// Mounts the partition that starts at `partition_offset` of the device and spans
    /// `sector_count` sectors of `sector_size` bytes. The sector size has to be a multiple of the
    /// erase size of the flash and hold at least four allocation table entries.
    ///
    /// Startup rebuilds the write cursors from the flash content, so a log that was cut off by a
    /// power loss is picked up right after its last complete entry. An interrupted garbage
    /// collection is finished before this returns.
    pub fn new(
        partition_offset: usize,
        sector_size: usize,
        sector_count: u16,
        hal: T,
    ) -> Result<Nvs<T>, Error> {
        if T::WRITE_SIZE > BLOCK_SIZE || !T::WRITE_SIZE.is_multiple_of(T::READ_SIZE) {
            return Err(Error::InvalidArgument);
        }

        if !partition_offset.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidArgument);
        }

        if sector_size == 0
            || !sector_size.is_multiple_of(T::ERASE_SIZE)
            || sector_size > MAX_SECTOR_SIZE
        {
            return Err(Error::InvalidArgument);
        }

        let geometry = Geometry::new(sector_size as u32, sector_count, T::WRITE_SIZE as u32);

        // close entry, one value with its entry and the entry kept free for a delete
        if sector_size < 4 * geometry.ate_len() {
            return Err(Error::InvalidArgument);
        }

        if sector_count < 2 {
            return Err(Error::InvalidArgument);
        }

        let partition_end = sector_size
            .checked_mul(sector_count as usize)
            .and_then(|len| len.checked_add(partition_offset))
            .ok_or(Error::InvalidArgument)?;
        if partition_end > hal.capacity() {
            return Err(Error::InvalidArgument);
        }

        let mut fs = Fs::new(Flash::new(hal, partition_offset, geometry));
        fs.startup()?;

        Ok(Self {
            inner: Mutex::new(fs),
        })
    }

    /// Rescans the flash and rebuilds the write cursors, like [`Nvs::new`] does. Required after
    /// a flash error, every other call returns [`Error::NotInitialized`] until then.
    pub fn mount(&self) -> Result<(), Error> {
        self.inner.lock().startup()
    }

    /// Writes `data` for `id` and returns the number of bytes written. Nothing is written, and
    /// `Ok(0)` returned, if the newest value of `id` is identical.
    ///
    /// The largest accepted value is `sector_size - 3 * ate_size`, with `ate_size` being 8 bytes
    /// aligned up to the write size of the flash. Empty values are rejected, use
    /// [`Nvs::delete`].
    pub fn write(&self, id: u16, data: &[u8]) -> Result<usize, Error> {
        if data.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.with_fs(|fs| fs.write(id, data))
    }

    /// Deletes `id` by writing a tombstone. Deleting a missing id is a no-op.
    pub fn delete(&self, id: u16) -> Result<usize, Error> {
        self.with_fs(|fs| fs.write(id, &[]))
    }

    /// Reads the newest value of `id` into `buf` and returns its stored length. If the value is
    /// longer than the buffer, only the first `buf.len()` bytes are copied.
    pub fn read(&self, id: u16, buf: &mut [u8]) -> Result<usize, Error> {
        self.read_hist(id, buf, 0)
    }

    /// Like [`Nvs::read`] but for older values: version 0 is the newest one, version 1 the
    /// value it replaced and so on, as long as the garbage collection didn't drop them.
    pub fn read_hist(&self, id: u16, buf: &mut [u8], version: u16) -> Result<usize, Error> {
        self.with_fs(|fs| fs.read_hist(id, buf, version))
    }

    /// Bytes available for new values once all stale entries are collected.
    pub fn calc_free_space(&self) -> Result<usize, Error> {
        self.with_fs(|fs| fs.calc_free_space())
    }

    /// Ids that currently hold a value, in ascending order. Deleted ids are left out.
    pub fn ids(&self) -> Result<Vec<u16>, Error> {
        self.with_fs(|fs| fs.ids())
    }

    /// Erases every sector of the partition. The filesystem stays mounted on the empty log.
    pub fn clear(&self) -> Result<(), Error> {
        self.inner.lock().clear()
    }

    /// Get a value from the flash.
    ///
    /// Supported types are bool, signed and unsigned integers up to 64-bit width, String and Vec.
    pub fn get<R>(&self, id: u16) -> Result<R, Error>
    where
        Nvs<T>: Get<R>,
    {
        Get::get(self, id)
    }

    /// Set a value and write it to the flash
    ///
    /// Type support:
    ///  * bool, signed and unsigned integers up to 64-bit width: saved little endian
    ///  * &str: saved without terminator
    ///  * &[u8]: saved as is
    pub fn set<R>(&self, id: u16, value: R) -> Result<usize, Error>
    where
        Nvs<T>: Set<R>,
    {
        Set::set(self, id, value)
    }

    /// Returns detailed statistics about the partition usage
    pub fn statistics(&self) -> Result<NvsStatistics, Error> {
        self.with_fs(|fs| fs.statistics())
    }

    /// Releases the flash driver.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().flash.hal
    }

    /// Runs `f` on the mounted filesystem. A flash error unmounts it as the write cursors can't
    /// be trusted anymore.
    pub(crate) fn with_fs<R>(
        &self,
        f: impl FnOnce(&mut Fs<T>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut fs = self.inner.lock();
        if !fs.ready {
            return Err(Error::NotInitialized);
        }

        let result = f(&mut fs);
        if let Err(Error::Io(_kind)) = result {
            #[cfg(feature = "defmt")]
            warn!("flash error {}, unmounting", _kind);

            #[cfg(feature = "debug-logs")]
            println!("nvs: flash error {_kind}, unmounting");

            fs.ready = false;
        }
        result
    }
}
