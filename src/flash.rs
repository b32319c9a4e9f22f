use crate::cursor::{Addr, Geometry, SectorCursor};
use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use crate::raw::{ATE_SIZE, Ate, BLOCK_SIZE};
use core::cmp;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
#[cfg(feature = "defmt")]
use defmt::{debug, trace};
use embedded_storage::nor_flash::NorFlashError;

pub(crate) fn io_error<E: NorFlashError>(err: E) -> Error {
    Error::Io(err.kind().into())
}

/// Lifts the write protection for as long as it lives. Protection is restored on drop, so every
/// exit path of a write or erase re-enables it, including early returns on errors. The success
/// path goes through [`Unprotected::finish`] to see whether that worked.
struct Unprotected<'a, T: Platform> {
    hal: &'a mut T,
}

impl<'a, T: Platform> Unprotected<'a, T> {
    fn new(hal: &'a mut T) -> Result<Self, Error> {
        hal.set_write_protection(false).map_err(io_error)?;
        Ok(Self { hal })
    }

    /// Restores the protection and reports a failure to do so.
    fn finish(self) -> Result<(), Error> {
        let mut this = ManuallyDrop::new(self);
        this.hal.set_write_protection(true).map_err(io_error)
    }
}

impl<T: Platform> Deref for Unprotected<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.hal
    }
}

impl<T: Platform> DerefMut for Unprotected<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.hal
    }
}

impl<T: Platform> Drop for Unprotected<'_, T> {
    fn drop(&mut self) {
        // only reached with an error already on its way to the caller
        let _ = self.hal.set_write_protection(true);
    }
}

/// Translates `(sector, offset)` addresses of the partition to device offsets and performs
/// block aligned I/O on top of the raw driver.
pub(crate) struct Flash<T: Platform> {
    pub(crate) hal: T,
    pub(crate) base_address: usize,
    pub(crate) geometry: Geometry,
}

impl<T: Platform> Flash<T> {
    pub(crate) fn new(hal: T, base_address: usize, geometry: Geometry) -> Self {
        Self {
            hal,
            base_address,
            geometry,
        }
    }

    fn device_offset(&self, addr: Addr) -> u32 {
        (self.base_address
            + addr.sector as usize * self.geometry.sector_size as usize
            + addr.offset as usize) as u32
    }

    /// Compare and move chunks are multiples of the write block size.
    fn chunk_size(&self) -> usize {
        T::align_write_floor(BLOCK_SIZE)
    }

    /// Plain read. Offsets handed to us are always aligned to the write block size, only the
    /// length may leave a partial read block which is fetched through a scratch buffer.
    pub(crate) fn read(&mut self, addr: Addr, buf: &mut [u8]) -> Result<(), Error> {
        if buf.is_empty() {
            return Ok(());
        }

        let offset = self.device_offset(addr);
        let pivot = T::align_read_floor(buf.len());
        let (head, tail) = buf.split_at_mut(pivot);
        if !head.is_empty() {
            self.hal.read(offset, head).map_err(io_error)?;
        }

        if !tail.is_empty() {
            let mut scratch = [0u8; BLOCK_SIZE];
            let block = &mut scratch[..T::align_read(tail.len())];
            self.hal
                .read(offset + pivot as u32, block)
                .map_err(io_error)?;
            tail.copy_from_slice(&block[..tail.len()]);
        }

        Ok(())
    }

    pub(crate) fn read_ate(&mut self, addr: Addr) -> Result<Ate, Error> {
        let mut raw = [0u8; ATE_SIZE];
        self.read(addr, &mut raw)?;
        Ok(Ate::from_bytes(raw))
    }

    /// Writes `bytes` and pads the last partial write block with 0xFF.
    pub(crate) fn write(&mut self, addr: Addr, bytes: &[u8]) -> Result<(), Error> {
        if bytes.is_empty() {
            // nothing to write, leave the protection alone
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        trace!("write @{}: [{}]", addr, bytes.len());

        let offset = self.device_offset(addr);
        let mut hal = Unprotected::new(&mut self.hal)?;

        let pivot = T::align_write_floor(bytes.len());
        let (header, trailer) = bytes.split_at(pivot);
        if !header.is_empty() {
            hal.write(offset, header).map_err(io_error)?;
        }

        // no need to write the trailer if remaining data is all ones - this the default state of the flash
        if trailer.iter().any(|&e| e != 0xFF) {
            let mut buf = [0xFFu8; BLOCK_SIZE];
            buf[..trailer.len()].copy_from_slice(trailer);
            hal.write(offset + pivot as u32, &buf[..T::WRITE_SIZE])
                .map_err(io_error)?;
        }

        hal.finish()
    }

    /// Appends an entry at the entry cursor and moves the cursor down by one slot.
    pub(crate) fn write_ate(&mut self, cursor: &mut SectorCursor, ate: &Ate) -> Result<(), Error> {
        let addr = cursor.ate_wra;
        cursor.ate_wra = addr.sub(self.geometry.ate_size);
        self.write(addr, &ate.to_bytes())
    }

    /// Appends data at the data cursor and moves the cursor up by the aligned length.
    pub(crate) fn write_data(&mut self, cursor: &mut SectorCursor, data: &[u8]) -> Result<(), Error> {
        let addr = cursor.data_wra;
        cursor.data_wra = addr.add(self.geometry.align(data.len()) as u32);
        self.write(addr, data)
    }

    /// `Ok(true)` if the flash at `addr` holds exactly `data`.
    pub(crate) fn block_compare(&mut self, mut addr: Addr, mut data: &[u8]) -> Result<bool, Error> {
        let chunk_size = self.chunk_size();
        let mut buf = [0u8; BLOCK_SIZE];
        while !data.is_empty() {
            let len = cmp::min(chunk_size, data.len());
            self.read(addr, &mut buf[..len])?;
            if buf[..len] != data[..len] {
                return Ok(false);
            }
            data = &data[len..];
            addr = addr.add(len as u32);
        }
        Ok(true)
    }

    /// `Ok(true)` if all `len` bytes at `addr` equal `value`.
    pub(crate) fn compare_const(
        &mut self,
        mut addr: Addr,
        value: u8,
        mut len: usize,
    ) -> Result<bool, Error> {
        let chunk_size = self.chunk_size();
        let expected = [value; BLOCK_SIZE];
        while len > 0 {
            let chunk = cmp::min(chunk_size, len);
            if !self.block_compare(addr, &expected[..chunk])? {
                return Ok(false);
            }
            len -= chunk;
            addr = addr.add(chunk as u32);
        }
        Ok(true)
    }

    pub(crate) fn is_erased(&mut self, addr: Addr, len: usize) -> Result<bool, Error> {
        self.compare_const(addr, 0xFF, len)
    }

    /// Copies `len` bytes from `from` to the data cursor, chunk by chunk.
    pub(crate) fn block_move(
        &mut self,
        cursor: &mut SectorCursor,
        mut from: Addr,
        mut len: usize,
    ) -> Result<(), Error> {
        let chunk_size = self.chunk_size();
        let mut buf = [0u8; BLOCK_SIZE];
        while len > 0 {
            let chunk = cmp::min(chunk_size, len);
            self.read(from, &mut buf[..chunk])?;
            self.write_data(cursor, &buf[..chunk])?;
            len -= chunk;
            from = from.add(chunk as u32);
        }
        Ok(())
    }

    /// Erases a sector unless it is already blank, so blank sectors never pay an erase cycle.
    pub(crate) fn erase_sector(&mut self, sector: u16) -> Result<(), Error> {
        let base = Addr::new(sector, 0);
        let sector_size = self.geometry.sector_size;
        if self.is_erased(base, sector_size as usize)? {
            return Ok(());
        }

        let from = self.device_offset(base);

        #[cfg(feature = "defmt")]
        debug!("erasing sector {} @{:#x}", sector, from);

        #[cfg(feature = "debug-logs")]
        println!("flash: erase_sector {sector} @0x{from:0>8x}");

        let mut hal = Unprotected::new(&mut self.hal)?;
        hal.erase(from, from + sector_size).map_err(io_error)?;
        hal.finish()
    }
}
