//! Frame checksum
//!
//! CRC-16 over the generator `0x18005`, shifted LSB first (so the register
//! works with the reflected `0xA001`), starting from `0xFFFF` with no final XOR.
//! This is the parameter set better known as CRC-16/MODBUS.

const POLY_REFLECTED: u16 = 0xa001;
const INIT: u16 = 0xffff;

/// Checksum `data`
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(INIT, |crc, &byte| {
        (0..8).fold(crc ^ byte as u16, |crc, _| {
            if crc & 1 != 0 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            }
        })
    })
}
