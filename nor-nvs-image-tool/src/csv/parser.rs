use base64::Engine;

use crate::error::Error;
use crate::image::{
    DataValue,
    NvsEntry,
};
use crate::NvsImage;

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    id: String,
    encoding: String,
    value: String,
}

/// Parse CSV content from a string into an [`NvsImage`].
pub(crate) fn parse_csv(content: &str) -> Result<NvsImage, Error> {
    let mut image = NvsImage { entries: vec![] };
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    for result in reader.deserialize() {
        let row: CsvRow = result?;
        let id = parse_id(&row.id)?;
        let value = parse_value(&row.value, &row.encoding)?;
        image.entries.push(NvsEntry::new(id, value));
    }

    Ok(image)
}

/// Ids are decimal or `0x` prefixed hex. 0xFFFF is reserved for sector close
/// entries.
fn parse_id(id: &str) -> Result<u16, Error> {
    let id = id.trim();
    let parsed = if let Some(hex) = id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        id.parse::<u16>()
    };

    match parsed {
        Ok(u16::MAX) => Err(Error::InvalidId(format!("{id} is reserved"))),
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(Error::InvalidId(format!("{id}: {e}"))),
    }
}

macro_rules! parse_numeric {
    ($value:expr, $ty:ty, $variant:ident) => {
        $value
            .trim()
            .parse::<$ty>()
            .map(DataValue::$variant)
            .map_err(|e| Error::InvalidValue(format!("invalid {} value: {}", stringify!($ty), e)))
    };
}

fn parse_value(value: &str, encoding: &str) -> Result<DataValue, Error> {
    let value = match encoding {
        "u8" => parse_numeric!(value, u8, U8)?,
        "i8" => parse_numeric!(value, i8, I8)?,
        "u16" => parse_numeric!(value, u16, U16)?,
        "i16" => parse_numeric!(value, i16, I16)?,
        "u32" => parse_numeric!(value, u32, U32)?,
        "i32" => parse_numeric!(value, i32, I32)?,
        "u64" => parse_numeric!(value, u64, U64)?,
        "i64" => parse_numeric!(value, i64, I64)?,
        "string" => DataValue::String(value.to_string()),
        "hex2bin" => DataValue::Binary(hex::decode(value.trim())?),
        "base64" => {
            DataValue::Binary(base64::engine::general_purpose::STANDARD.decode(value.trim())?)
        }
        _ => return Err(Error::InvalidEncoding(encoding.to_string())),
    };

    // an empty value would be a delete on the flash
    if value.to_bytes().is_empty() {
        return Err(Error::InvalidValue(format!("empty {encoding} value")));
    }

    Ok(value)
}
