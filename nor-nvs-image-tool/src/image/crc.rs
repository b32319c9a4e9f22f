/// CRC-8/CCITT (polynomial 0x07, MSB first, no final xor), the checksum of
/// every allocation table entry.
///
/// Public so that callers can check entries of a dumped image without
/// mounting it.
pub fn crc8_ccitt(seed: u8, data: &[u8]) -> u8 {
    let mut crc = seed;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x07;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
