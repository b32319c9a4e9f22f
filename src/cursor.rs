//! Addressing inside the partition. An address is always a `(sector, offset)` pair, the device
//! offset is only computed at the very last moment by the flash adapter.

use crate::raw::ATE_SIZE;
use core::fmt::{Debug, Formatter};

#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct Addr {
    pub(crate) sector: u16,
    pub(crate) offset: u32,
}

impl Addr {
    pub(crate) const fn new(sector: u16, offset: u32) -> Self {
        Self { sector, offset }
    }

    pub(crate) const fn with_offset(self, offset: u32) -> Self {
        Self::new(self.sector, offset)
    }

    const fn with_sector(self, sector: u16) -> Self {
        Self::new(sector, self.offset)
    }

    pub(crate) const fn add(self, len: u32) -> Self {
        Self::new(self.sector, self.offset + len)
    }

    pub(crate) const fn sub(self, len: u32) -> Self {
        Self::new(self.sector, self.offset - len)
    }
}

impl Debug for Addr {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let sector = self.sector;
        let offset = self.offset;
        f.write_fmt(format_args!("{sector}:0x{offset:0>4x}"))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Addr {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u16}:{=u32:#x}", self.sector, self.offset)
    }
}

/// Static shape of the partition, fixed at mount time.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Geometry {
    pub(crate) sector_size: u32,
    pub(crate) sector_count: u16,
    pub(crate) write_size: u32,
    /// `ATE_SIZE` aligned to the write block size.
    pub(crate) ate_size: u32,
}

impl Geometry {
    pub(crate) fn new(sector_size: u32, sector_count: u16, write_size: u32) -> Self {
        Self {
            sector_size,
            sector_count,
            write_size,
            ate_size: crate::platform::align_ceil(ATE_SIZE, write_size as usize) as u32,
        }
    }

    pub(crate) fn align(&self, len: usize) -> usize {
        crate::platform::align_ceil(len, self.write_size as usize)
    }

    /// The close entry always lives in the last slot of a sector.
    pub(crate) fn close_slot(&self, sector: u16) -> Addr {
        Addr::new(sector, self.sector_size - self.ate_size)
    }

    /// Slot of the first regular entry written into an empty sector.
    pub(crate) fn first_ate_slot(&self, sector: u16) -> Addr {
        Addr::new(sector, self.sector_size - 2 * self.ate_size)
    }

    /// Same offset, next sector (circular).
    pub(crate) fn next_sector(&self, addr: Addr) -> Addr {
        let sector = if addr.sector + 1 == self.sector_count {
            0
        } else {
            addr.sector + 1
        };
        addr.with_sector(sector)
    }

    /// Same offset, previous sector (circular).
    pub(crate) fn prev_sector(&self, addr: Addr) -> Addr {
        let sector = if addr.sector == 0 {
            self.sector_count - 1
        } else {
            addr.sector - 1
        };
        addr.with_sector(sector)
    }

    /// The largest value accepted by a single write: one entry for the data, one for closing
    /// the sector and one that is always kept so a delete can succeed.
    pub(crate) fn max_value_len(&self) -> usize {
        (self.sector_size - 3 * self.ate_size) as usize
    }

    /// The fixed cost of one stored entry besides its aligned data.
    pub(crate) fn ate_len(&self) -> usize {
        self.ate_size as usize
    }
}

/// The two write cursors of the open sector: data grows up from offset 0, entries grow down
/// from the end of the sector. They meet in the middle once the sector is full.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct SectorCursor {
    /// Next free entry slot.
    pub(crate) ate_wra: Addr,
    /// Next free data byte.
    pub(crate) data_wra: Addr,
}

impl SectorCursor {
    /// Cursor of a freshly erased sector.
    pub(crate) fn empty(geometry: &Geometry, sector: u16) -> Self {
        Self {
            ate_wra: geometry.first_ate_slot(sector),
            data_wra: Addr::new(sector, 0),
        }
    }

    pub(crate) fn sector(&self) -> u16 {
        self.ate_wra.sector
    }

    /// Bytes between the data cursor and the next entry slot.
    pub(crate) fn free_space(&self) -> usize {
        debug_assert_eq!(self.ate_wra.sector, self.data_wra.sector);
        debug_assert!(
            self.data_wra.offset <= self.ate_wra.offset,
            "write cursors crossed: {:?}",
            self
        );
        self.ate_wra.offset.saturating_sub(self.data_wra.offset) as usize
    }

    /// A value of `data_len` aligned bytes plus its entry fits while still leaving the next
    /// entry slot untouched.
    pub(crate) fn fits(&self, data_len: usize, ate_len: usize) -> bool {
        self.free_space() >= data_len + ate_len
    }
}
