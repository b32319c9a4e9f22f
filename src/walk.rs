//! Backward traversal of the log, newest entry first.
//!
//! Inside a sector entries are stacked downwards, so walking back in time means walking up
//! towards the close slot. Once the oldest entry of a sector was read, the walk continues at
//! the newest entry of the previous sector, found through that sector's close entry. When the
//! previous sector isn't closed the whole log has been visited and the walk ends where it
//! started: at the entry cursor.

use crate::cursor::Addr;
use crate::error::Error;
use crate::flash::Flash;
use crate::platform::Platform;
use crate::raw::Ate;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// What the close slot of a sector tells about its content.
enum SectorEnd {
    /// Close slot erased: the sector is open or empty, the log ends here.
    Open,
    /// Closed but without a single valid entry.
    Empty,
    /// Closed, the newest entry lives at the given address.
    LastAte(Addr),
}

fn sector_end<T: Platform>(flash: &mut Flash<T>, sector: u16) -> Result<SectorEnd, Error> {
    let geometry = flash.geometry;
    let close_slot = geometry.close_slot(sector);
    let close = flash.read_ate(close_slot)?;

    if close.is_erased() {
        return Ok(SectorEnd::Open);
    }

    if close.is_valid(T::crc8_ccitt) {
        let offset = close.offset as u32;
        return Ok(if offset >= close_slot.offset {
            SectorEnd::Empty
        } else {
            SectorEnd::LastAte(close_slot.with_offset(offset))
        });
    }

    #[cfg(feature = "defmt")]
    warn!("corrupt close entry in sector {}, searching last entry", sector);

    #[cfg(feature = "debug-logs")]
    println!("walk: corrupt close entry in sector {sector}, searching last entry");

    recover_last_ate(flash, sector)
}

/// Finds the newest valid entry of a sector without the help of its close entry. Slots are
/// scanned from the top down, every valid entry pushes the end of the data region up so data
/// that happens to look like an entry is never mistaken for one.
fn recover_last_ate<T: Platform>(flash: &mut Flash<T>, sector: u16) -> Result<SectorEnd, Error> {
    let geometry = flash.geometry;
    let mut slot = geometry.first_ate_slot(sector);
    let mut data_end = 0u32;
    let mut found = None;

    while slot.offset > data_end {
        let ate = flash.read_ate(slot)?;
        if ate.is_valid(T::crc8_ccitt) {
            data_end = ate.offset as u32 + ate.len as u32;
            found = Some(slot);
        }
        match slot.offset.checked_sub(geometry.ate_size) {
            Some(offset) => slot = slot.with_offset(offset),
            None => break,
        }
    }

    Ok(match found {
        Some(addr) => SectorEnd::LastAte(addr),
        None => SectorEnd::Empty,
    })
}

/// Address of the newest entry of a closed sector, `None` for open or empty ones.
pub(crate) fn last_ate<T: Platform>(
    flash: &mut Flash<T>,
    sector: u16,
) -> Result<Option<Addr>, Error> {
    Ok(match sector_end(flash, sector)? {
        SectorEnd::LastAte(addr) => Some(addr),
        SectorEnd::Open | SectorEnd::Empty => None,
    })
}

/// Restartable position of a backward walk. It doesn't borrow the flash, so a walk can be
/// interleaved with writes.
pub(crate) struct Walker {
    addr: Addr,
    /// Sector jumps left before the walk gives up. Only a corrupt log would need them all.
    jumps_left: u16,
}

impl Walker {
    pub(crate) fn new(start: Addr, sector_count: u16) -> Self {
        Self {
            addr: start,
            jumps_left: sector_count,
        }
    }

    /// Address the next call to [`Walker::step`] reads from.
    pub(crate) fn addr(&self) -> Addr {
        self.addr
    }

    /// Reads the entry at the current position and moves on to the next older one. `ate_wra`
    /// is the current entry cursor, which is where the walk ends.
    pub(crate) fn step<T: Platform>(
        &mut self,
        flash: &mut Flash<T>,
        ate_wra: Addr,
    ) -> Result<(Addr, Ate), Error> {
        let geometry = flash.geometry;
        let at = self.addr;
        let ate = flash.read_ate(at)?;

        let next = at.add(geometry.ate_size);
        if next.offset < geometry.close_slot(at.sector).offset {
            self.addr = next;
            return Ok((at, ate));
        }

        // oldest entry of the sector was read, continue in the previous one
        let mut sector = geometry.prev_sector(at).sector;
        self.addr = loop {
            if self.jumps_left == 0 {
                break ate_wra;
            }
            self.jumps_left -= 1;

            match sector_end(flash, sector)? {
                SectorEnd::Open => break ate_wra,
                SectorEnd::LastAte(addr) => break addr,
                SectorEnd::Empty => sector = geometry.prev_sector(Addr::new(sector, 0)).sector,
            }
        };

        #[cfg(feature = "defmt")]
        trace!("walk: {} -> {}", at, self.addr);

        Ok((at, ate))
    }
}

/// Every entry slot of the log, newest first, including invalid ones. The first item is the
/// (erased) slot at the entry cursor itself.
pub(crate) struct Entries<'a, T: Platform> {
    flash: &'a mut Flash<T>,
    walker: Walker,
    end: Addr,
    done: bool,
}

impl<'a, T: Platform> Entries<'a, T> {
    pub(crate) fn new(flash: &'a mut Flash<T>, ate_wra: Addr) -> Self {
        let sector_count = flash.geometry.sector_count;
        Self {
            flash,
            walker: Walker::new(ate_wra, sector_count),
            end: ate_wra,
            done: false,
        }
    }

    /// Only entries with a valid CRC.
    pub(crate) fn valid(self) -> impl Iterator<Item = Result<(Addr, Ate), Error>> + 'a {
        self.filter(|item| match item {
            Ok((_, ate)) => ate.is_valid(T::crc8_ccitt),
            Err(_) => true,
        })
    }
}

impl<T: Platform> Iterator for Entries<'_, T> {
    type Item = Result<(Addr, Ate), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.walker.step(self.flash, self.end) {
            Ok(item) => {
                self.done = self.walker.addr() == self.end;
                Some(Ok(item))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// The newest valid entry for `id`.
pub(crate) fn find_latest<T: Platform>(
    flash: &mut Flash<T>,
    ate_wra: Addr,
    id: u16,
) -> Result<Option<(Addr, Ate)>, Error> {
    for item in Entries::new(flash, ate_wra).valid() {
        let (addr, ate) = item?;
        if ate.id == id {
            return Ok(Some((addr, ate)));
        }
    }
    Ok(None)
}
