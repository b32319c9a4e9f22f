use crate::cursor::{Addr, SectorCursor};
use crate::error::Error;
use crate::flash::Flash;
use crate::platform::Platform;
use crate::raw::Ate;
use crate::walk::{self, Entries};
use crate::{EntryStatistics, NvsStatistics, SectorState, SectorStatistics};
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::cmp;
#[cfg(feature = "defmt")]
use defmt::{debug, info, trace, warn};

/// Mutable state of a mounted filesystem. Lives behind the lock of [`crate::Nvs`].
pub(crate) struct Fs<T: Platform> {
    pub(crate) flash: Flash<T>,
    pub(crate) cursor: SectorCursor,
    /// Cleared until startup succeeded and again after any I/O error, as the cursors may no
    /// longer match the flash.
    pub(crate) ready: bool,
}

impl<T: Platform> Fs<T> {
    pub(crate) fn new(flash: Flash<T>) -> Self {
        let cursor = SectorCursor::empty(&flash.geometry, 0);
        Self {
            flash,
            cursor,
            ready: false,
        }
    }

    /// Rebuilds the write cursors from the flash content and finishes a garbage collection
    /// that was interrupted by a power loss.
    pub(crate) fn startup(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("startup");

        #[cfg(feature = "debug-logs")]
        println!("internal: startup");

        self.ready = false;
        let geometry = self.flash.geometry;

        let sector = self.find_open_sector()?;
        self.cursor = self.recover_cursor(sector)?;

        // the sector after the open one has to be blank, anything else is a gc that never finished
        let next = geometry.next_sector(Addr::new(sector, 0));
        if !self.flash.is_erased(next, geometry.sector_size as usize)? {
            #[cfg(feature = "defmt")]
            warn!("gc of sector {} was interrupted, restarting it", next.sector);

            #[cfg(feature = "debug-logs")]
            println!("internal: gc of sector {} was interrupted", next.sector);

            self.flash.erase_sector(sector)?;
            self.cursor = SectorCursor::empty(&geometry, sector);
            self.gc()?;
        }

        // data written after the last complete entry is orphaned
        let step = cmp::max(geometry.write_size, 1);
        while self.cursor.data_wra.offset < self.cursor.ate_wra.offset {
            let gap = (self.cursor.ate_wra.offset - self.cursor.data_wra.offset) as usize;
            if self.flash.is_erased(self.cursor.data_wra, gap)? {
                break;
            }
            self.cursor.data_wra = self.cursor.data_wra.add(step);
        }

        // an open sector without a single entry but with data holds nothing of value
        if self.cursor.ate_wra == geometry.first_ate_slot(sector)
            && self.cursor.data_wra.offset != 0
        {
            self.flash.erase_sector(sector)?;
            self.cursor = SectorCursor::empty(&geometry, sector);
        }

        #[cfg(feature = "defmt")]
        info!(
            "mounted {} sectors of {} bytes: ate_wra {}, data_wra {}",
            geometry.sector_count,
            geometry.sector_size,
            self.cursor.ate_wra,
            self.cursor.data_wra
        );

        #[cfg(feature = "debug-logs")]
        println!("internal: startup done: {:?}", self.cursor);

        self.ready = true;
        Ok(())
    }

    fn is_closed(&mut self, sector: u16) -> Result<bool, Error> {
        let close_slot = self.flash.geometry.close_slot(sector);
        Ok(!self.flash.read_ate(close_slot)?.is_erased())
    }

    /// The open sector is the one following the last closed sector.
    fn find_open_sector(&mut self) -> Result<u16, Error> {
        let geometry = self.flash.geometry;
        let mut closed_sectors = 0;

        for sector in 0..geometry.sector_count {
            if self.is_closed(sector)? {
                closed_sectors += 1;
                let next = geometry.next_sector(Addr::new(sector, 0)).sector;
                if !self.is_closed(next)? {
                    return Ok(next);
                }
            }
        }

        if closed_sectors == geometry.sector_count {
            #[cfg(feature = "defmt")]
            warn!("every sector is closed, not a valid partition");

            return Err(Error::CorruptedData);
        }

        // nothing was ever closed: the log lives in the first sector, unless the last one already
        // holds entries
        let last = geometry.sector_count - 1;
        if self.flash.read_ate(geometry.first_ate_slot(last))?.is_erased() {
            Ok(0)
        } else {
            Ok(last)
        }
    }

    /// Scans the entry slots of the open sector from the top for the first erased one. The data
    /// cursor follows the newest complete entry on the way.
    fn recover_cursor(&mut self, sector: u16) -> Result<SectorCursor, Error> {
        let geometry = self.flash.geometry;
        let base = Addr::new(sector, 0);
        let mut cursor = SectorCursor::empty(&geometry, sector);

        loop {
            let ate = self.flash.read_ate(cursor.ate_wra)?;
            if ate.is_erased() {
                return Ok(cursor);
            }

            if ate.is_valid(T::crc8_ccitt) {
                let end = ate.offset as usize + geometry.align(ate.len as usize);
                cursor.data_wra = base.add(end as u32);
            } else {
                #[cfg(feature = "defmt")]
                warn!("skipping torn entry @{}", cursor.ate_wra);

                #[cfg(feature = "debug-logs")]
                println!("internal: skipping torn entry @{:?}", cursor.ate_wra);
            }

            match cursor.ate_wra.offset.checked_sub(geometry.ate_size) {
                Some(offset) if offset >= cursor.data_wra.offset => {
                    cursor.ate_wra = cursor.ate_wra.with_offset(offset);
                }
                _ => {
                    #[cfg(feature = "defmt")]
                    warn!("no free entry slot left in open sector {}", sector);

                    return Err(Error::CorruptedData);
                }
            }
        }
    }

    /// Appends a value (or a tombstone for empty `data`) unless the newest entry for `id`
    /// already holds exactly the same content. Returns the number of bytes written.
    pub(crate) fn write(&mut self, id: u16, data: &[u8]) -> Result<usize, Error> {
        let geometry = self.flash.geometry;
        if data.len() > geometry.max_value_len() {
            return Err(Error::InvalidArgument);
        }

        #[cfg(feature = "defmt")]
        trace!("write: id {=u16:#x}, [{}]", id, data.len());

        #[cfg(feature = "debug-logs")]
        println!("internal: write id {id:#06x} len {}", data.len());

        if self.is_unchanged(id, data)? {
            #[cfg(feature = "debug-logs")]
            println!("internal: write id {id:#06x} unchanged");

            return Ok(0);
        }

        let data_len = geometry.align(data.len());
        let mut gc_count = 0;
        loop {
            if gc_count == geometry.sector_count {
                return Err(Error::OutOfSpace);
            }

            if self.cursor.fits(data_len, geometry.ate_len()) {
                self.write_entry(id, data)?;
                return Ok(data.len());
            }

            self.sector_close()?;
            self.gc()?;
            gc_count += 1;
        }
    }

    /// A delete is unchanged if there is nothing to delete.
    fn is_unchanged(&mut self, id: u16, data: &[u8]) -> Result<bool, Error> {
        let Some((addr, ate)) = walk::find_latest(&mut self.flash, self.cursor.ate_wra, id)? else {
            return Ok(data.is_empty());
        };

        if data.is_empty() || ate.is_tombstone() {
            return Ok(data.is_empty() && ate.is_tombstone());
        }

        if ate.len as usize != data.len() {
            return Ok(false);
        }

        self.flash
            .block_compare(addr.with_offset(ate.offset as u32), data)
    }

    fn write_entry(&mut self, id: u16, data: &[u8]) -> Result<(), Error> {
        let ate = Ate::new(
            T::crc8_ccitt,
            id,
            self.cursor.data_wra.offset as u16,
            data.len() as u16,
        );

        // the entry goes last, a crash in between leaves orphaned data that startup skips
        self.flash.write_data(&mut self.cursor, data)?;
        self.flash.write_ate(&mut self.cursor, &ate)
    }

    /// Writes the close entry of the open sector and opens the next one.
    fn sector_close(&mut self) -> Result<(), Error> {
        let geometry = self.flash.geometry;
        let sector = self.cursor.sector();
        let last_ate_offset = self.cursor.ate_wra.offset + geometry.ate_size;

        #[cfg(feature = "defmt")]
        debug!("closing sector {}", sector);

        #[cfg(feature = "debug-logs")]
        println!("internal: sector_close {sector}");

        let close = Ate::close(T::crc8_ccitt, last_ate_offset as u16);
        self.flash
            .write(geometry.close_slot(sector), &close.to_bytes())?;

        let next = geometry.next_sector(Addr::new(sector, 0)).sector;
        self.cursor = SectorCursor::empty(&geometry, next);
        Ok(())
    }

    /// Moves the live entries of the sector after the open one to the open sector, then erases
    /// it. An entry is live if it is the newest one for its id and not a tombstone.
    fn gc(&mut self) -> Result<(), Error> {
        let geometry = self.flash.geometry;
        let doomed = geometry.next_sector(Addr::new(self.cursor.sector(), 0)).sector;

        #[cfg(feature = "defmt")]
        trace!("gc: sector {}", doomed);

        #[cfg(feature = "debug-logs")]
        println!("internal: gc sector {doomed}");

        if let Some(last) = walk::last_ate(&mut self.flash, doomed)? {
            let stop = geometry.first_ate_slot(doomed);
            let mut slot = last;
            loop {
                self.gc_entry(slot)?;
                if slot.offset >= stop.offset {
                    break;
                }
                slot = slot.add(geometry.ate_size);
            }
        }

        self.flash.erase_sector(doomed)
    }

    fn gc_entry(&mut self, slot: Addr) -> Result<(), Error> {
        let gc_ate = self.flash.read_ate(slot)?;
        if !gc_ate.is_valid(T::crc8_ccitt) {
            if !gc_ate.is_erased() {
                #[cfg(feature = "defmt")]
                warn!("gc: skipping invalid entry @{}", slot);

                #[cfg(feature = "debug-logs")]
                println!("internal: gc skipping invalid entry @{slot:?}");
            }
            return Ok(());
        }

        if gc_ate.is_tombstone() {
            return Ok(());
        }

        let newest = walk::find_latest(&mut self.flash, self.cursor.ate_wra, gc_ate.id)?;
        if newest.map(|(addr, _)| addr) != Some(slot) {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        debug!("gc: moving {} to {}", gc_ate, self.cursor.data_wra);

        #[cfg(feature = "debug-logs")]
        println!("internal: gc moving {gc_ate:?} to {:?}", self.cursor.data_wra);

        let mut ate = gc_ate;
        ate.offset = self.cursor.data_wra.offset as u16;
        ate.update_crc8(T::crc8_ccitt);

        let data = slot.with_offset(gc_ate.offset as u32);
        self.flash
            .block_move(&mut self.cursor, data, gc_ate.len as usize)?;
        self.flash.write_ate(&mut self.cursor, &ate)
    }

    /// Copies the `version`-th newest value of `id` into `buf` and returns its stored length,
    /// which may exceed the buffer.
    pub(crate) fn read_hist(
        &mut self,
        id: u16,
        buf: &mut [u8],
        version: u16,
    ) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("read_hist: id {=u16:#x}, version {}", id, version);

        let mut skip = version;
        let mut found = None;
        for item in Entries::new(&mut self.flash, self.cursor.ate_wra).valid() {
            let (addr, ate) = item?;
            if ate.id != id {
                continue;
            }
            if skip == 0 {
                found = Some((addr, ate));
                break;
            }
            skip -= 1;
        }

        let (addr, ate) = found.ok_or(Error::NotFound)?;
        if ate.is_tombstone() {
            return Err(Error::NotFound);
        }

        let len = cmp::min(buf.len(), ate.len as usize);
        self.flash
            .read(addr.with_offset(ate.offset as u32), &mut buf[..len])?;

        Ok(ate.len as usize)
    }

    /// Stored length of the newest value of `id`.
    pub(crate) fn value_len(&mut self, id: u16) -> Result<usize, Error> {
        match walk::find_latest(&mut self.flash, self.cursor.ate_wra, id)? {
            Some((_, ate)) if !ate.is_tombstone() => Ok(ate.len as usize),
            _ => Err(Error::NotFound),
        }
    }

    /// Space left for new values once every stale entry got collected. One sector is always kept
    /// free for the garbage collection.
    pub(crate) fn calc_free_space(&mut self) -> Result<usize, Error> {
        let geometry = self.flash.geometry;
        let mut free_space = (geometry.sector_count as usize - 1)
            * (geometry.sector_size - geometry.ate_size) as usize;

        let mut seen = BTreeSet::new();
        for item in Entries::new(&mut self.flash, self.cursor.ate_wra).valid() {
            let (_, ate) = item?;
            // newest first, so only the first sighting of an id is live
            if seen.insert(ate.id) && !ate.is_tombstone() {
                free_space = free_space
                    .saturating_sub(geometry.align(ate.len as usize) + geometry.ate_len());
            }
        }

        Ok(free_space)
    }

    /// Ids with a live value, ascending.
    pub(crate) fn ids(&mut self) -> Result<Vec<u16>, Error> {
        let mut seen = BTreeSet::new();
        let mut live = BTreeSet::new();
        for item in Entries::new(&mut self.flash, self.cursor.ate_wra).valid() {
            let (_, ate) = item?;
            if seen.insert(ate.id) && !ate.is_tombstone() {
                live.insert(ate.id);
            }
        }

        Ok(live.into_iter().collect())
    }

    /// Erases the whole partition and starts over with an empty log.
    pub(crate) fn clear(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("clear");

        #[cfg(feature = "debug-logs")]
        println!("internal: clear");

        self.ready = false;
        for sector in 0..self.flash.geometry.sector_count {
            self.flash.erase_sector(sector)?;
        }
        self.startup()
    }

    pub(crate) fn statistics(&mut self) -> Result<NvsStatistics, Error> {
        let geometry = self.flash.geometry;
        let mut sectors = Vec::with_capacity(geometry.sector_count as usize);

        for sector in 0..geometry.sector_count {
            let (state, entries) = if sector == self.cursor.sector() {
                let first = self.cursor.ate_wra.add(geometry.ate_size);
                let mut entries = self.count_entries(sector, first)?;
                entries.free = (self.cursor.free_space() / geometry.ate_len()) as u32;
                (SectorState::Open, entries)
            } else if self.is_closed(sector)? {
                let entries = match walk::last_ate(&mut self.flash, sector)? {
                    Some(last) => self.count_entries(sector, last)?,
                    None => EntryStatistics::default(),
                };
                (SectorState::Closed, entries)
            } else {
                let entries = EntryStatistics {
                    free: (geometry.first_ate_slot(sector).offset / geometry.ate_size) as u32 + 1,
                    ..Default::default()
                };
                (SectorState::Empty, entries)
            };

            sectors.push(SectorStatistics {
                sector,
                state,
                entries,
            });
        }

        let entries_overall = sectors
            .iter()
            .fold(EntryStatistics::default(), |acc, x| EntryStatistics {
                valid: acc.valid + x.entries.valid,
                invalid: acc.invalid + x.entries.invalid,
                free: acc.free + x.entries.free,
            });

        Ok(NvsStatistics {
            sectors,
            entries_overall,
        })
    }

    /// Counts the entry slots from `from` up to the first entry slot of the sector.
    fn count_entries(&mut self, sector: u16, from: Addr) -> Result<EntryStatistics, Error> {
        let geometry = self.flash.geometry;
        let stop = geometry.first_ate_slot(sector);
        let mut entries = EntryStatistics::default();

        let mut slot = from;
        while slot.offset <= stop.offset {
            let ate = self.flash.read_ate(slot)?;
            if ate.is_valid(T::crc8_ccitt) {
                entries.valid += 1;
            } else if ate.is_erased() {
                entries.free += 1;
            } else {
                entries.invalid += 1;
            }
            slot = slot.add(geometry.ate_size);
        }

        Ok(entries)
    }
}
