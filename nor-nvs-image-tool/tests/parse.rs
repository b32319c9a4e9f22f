use nor_nvs_image_tool::{
    DataValue,
    Error,
    NvsEntry,
    NvsImage,
    ERASE_SIZE,
};
use pretty_assertions::assert_eq;

#[test]
fn test_hex2bin_encoding() {
    let image = NvsImage::from_csv("id,encoding,value\n5,hex2bin,00ff10\n").unwrap();
    assert_eq!(
        image.entries,
        [NvsEntry::new(5, DataValue::Binary(vec![0x00, 0xFF, 0x10]))]
    );
}

#[test]
fn test_invalid_rows() {
    assert!(matches!(
        NvsImage::from_csv_file("tests/assets/invalid_id.csv"),
        Err(Error::InvalidId(_))
    ));
    assert!(matches!(
        NvsImage::from_csv_file("tests/assets/invalid_encoding.csv"),
        Err(Error::InvalidEncoding(_))
    ));
    assert!(matches!(
        NvsImage::from_csv("id,encoding,value\n1,u8,256\n"),
        Err(Error::InvalidValue(_))
    ));
    assert!(matches!(
        NvsImage::from_csv("id,encoding,value\n1,hex2bin,xyz\n"),
        Err(Error::HexError(_))
    ));
}

#[test]
fn test_blank_image() {
    let image = NvsImage::parse_image(&vec![0xFF; 2 * ERASE_SIZE], ERASE_SIZE).unwrap();
    assert!(image.entries.is_empty());
}

#[test]
fn test_image_size_mismatch() {
    assert!(matches!(
        NvsImage::parse_image(&[], ERASE_SIZE),
        Err(Error::InvalidValue(_))
    ));
    assert!(matches!(
        NvsImage::parse_image(&vec![0xFF; 6000], ERASE_SIZE),
        Err(Error::InvalidValue(_))
    ));
}

#[test]
fn test_parsed_values_are_binary() {
    let image = NvsImage::from_csv_file("tests/assets/basic.csv").unwrap();
    let data = image.generate_image(ERASE_SIZE, 2).unwrap();

    let parsed = NvsImage::parse_image(&data, ERASE_SIZE).unwrap();
    assert_eq!(
        parsed.entries.iter().map(|e| e.id).collect::<Vec<_>>(),
        [1, 2, 0x10, 17, 18, 19]
    );
    assert_eq!(
        parsed.entries[3].value,
        DataValue::Binary(b"hello world".to_vec())
    );
    assert_eq!(parsed.entries[1].value.encoding_str(), "base64");
}
