use std::fs;
use std::path::Path;

use nor_nvs::Nvs;

use super::ram_flash::RamFlash;
use super::{
    DataValue,
    NvsEntry,
};
use crate::error::Error;
use crate::NvsImage;

/// Parse an image file at the given `path`.
pub(crate) fn parse_image<P: AsRef<Path>>(path: P, sector_size: usize) -> Result<NvsImage, Error> {
    let data = fs::read(path)?;
    parse_image_data(&data, sector_size)
}

/// Parse an image from an in-memory byte slice.
///
/// The image is mounted like the device would mount it, so torn entries are
/// skipped and an interrupted garbage collection is finished on the copy.
/// Every live id yields one [`DataValue::Binary`] entry, ascending by id.
pub(crate) fn parse_image_data(data: &[u8], sector_size: usize) -> Result<NvsImage, Error> {
    if data.is_empty() {
        return Err(Error::InvalidValue("image is empty".to_string()));
    }

    if sector_size == 0 || !data.len().is_multiple_of(sector_size) {
        return Err(Error::InvalidValue(format!(
            "image size {} is not a multiple of sector size {}",
            data.len(),
            sector_size
        )));
    }

    let sector_count = u16::try_from(data.len() / sector_size).map_err(|_| {
        Error::InvalidValue(format!(
            "image has more than {} sectors of {} bytes",
            u16::MAX,
            sector_size
        ))
    })?;

    let nvs = Nvs::new(0, sector_size, sector_count, RamFlash::from(data.to_vec()))?;

    let entries = nvs
        .ids()?
        .into_iter()
        .map(|id| -> Result<NvsEntry, Error> {
            let value = nvs.get::<Vec<u8>>(id)?;
            Ok(NvsEntry::new(id, DataValue::Binary(value)))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(NvsImage { entries })
}
