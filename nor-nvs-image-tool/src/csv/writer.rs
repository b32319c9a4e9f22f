use std::path::Path;

use csv::Writer;

use crate::error::Error;
use crate::NvsImage;

/// Serialize an image to a CSV file at the given `output_path`.
///
/// `Binary` values are serialized as base64.
pub(crate) fn write_csv<P: AsRef<Path>>(image: &NvsImage, output_path: P) -> Result<(), Error> {
    let mut wtr = Writer::from_path(output_path)?;
    write_records(&mut wtr, image)
}

/// Serialize an image to CSV and return the content as a `String`.
pub(crate) fn write_csv_content(image: &NvsImage) -> Result<String, Error> {
    let mut wtr = Writer::from_writer(Vec::new());
    write_records(&mut wtr, image)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::IoError(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidValue(format!("CSV output is not valid UTF-8: {}", e)))
}

fn write_records<W: std::io::Write>(wtr: &mut Writer<W>, image: &NvsImage) -> Result<(), Error> {
    wtr.write_record(["id", "encoding", "value"])?;

    for entry in &image.entries {
        wtr.write_record([
            entry.id.to_string().as_str(),
            entry.value.encoding_str(),
            entry.value.to_string().as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
