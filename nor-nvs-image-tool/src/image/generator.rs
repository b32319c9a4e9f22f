use nor_nvs::Nvs;

use super::ram_flash::RamFlash;
use crate::error::Error;
use crate::NvsImage;

/// Generate an image in memory by running the filesystem on a [`RamFlash`].
///
/// Entries are written in order, so a later entry for the same id replaces
/// the earlier one like it would on the device.
pub(crate) fn generate_image_data(
    image: &NvsImage,
    sector_size: usize,
    sector_count: u16,
) -> Result<Vec<u8>, Error> {
    let mut flash = RamFlash::new(sector_size * sector_count as usize);
    let nvs = Nvs::new(0, sector_size, sector_count, &mut flash)?;

    for entry in &image.entries {
        let bytes = entry.value.to_bytes();
        if bytes.is_empty() {
            return Err(Error::InvalidValue(format!(
                "id {}: empty values can't be stored",
                entry.id
            )));
        }
        nvs.write(entry.id, &bytes)?;
    }

    drop(nvs);
    Ok(flash.into_inner())
}
