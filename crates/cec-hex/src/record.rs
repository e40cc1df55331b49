//! Single Intel HEX record
//!
//! `:LLAAAATT<data>CC` with `LL` data bytes, a big endian `AAAA` offset, the
//! record type `TT` and a checksum that makes all bytes sum to zero.

use derive_more::IsVariant;

use crate::{Result, err::Error};

#[derive(Debug, PartialEq, Eq, IsVariant)]
pub(crate) enum Record {
    Data { offset: u16, data: Vec<u8> },
    EndOfFile,
    /// Bits 4..20 of the address for following data records
    ExtendedSegment(u16),
    /// Bits 16..32 of the address for following data records
    ExtendedLinear(u16),
    /// CS:IP or EIP of the entry point, meaningless for flash images
    StartAddress,
}

fn decode_hex(line: usize, text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return Err(Error::InvalidHex { line });
    }

    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).map_err(|_| Error::InvalidHex { line }))
        .collect()
}

impl Record {
    pub(crate) fn parse(line: usize, text: &str) -> Result<Self> {
        let text = text
            .strip_prefix(':')
            .ok_or(Error::MissingStartCode { line })?;
        let bytes = decode_hex(line, text)?;

        let (&got, body) = bytes.split_last().ok_or(Error::InvalidLength { line })?;
        if body.len() < 4 || body.len() != body[0] as usize + 4 {
            return Err(Error::InvalidLength { line });
        }

        let expected = body
            .iter()
            .fold(0u8, |sum, b| sum.wrapping_add(*b))
            .wrapping_neg();
        if expected != got {
            return Err(Error::ChecksumMismatch {
                line,
                expected,
                got,
            });
        }

        let offset = u16::from_be_bytes([body[1], body[2]]);
        let data = &body[4..];
        let word = || -> Result<u16> {
            match data {
                [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
                _ => Err(Error::InvalidLength { line }),
            }
        };

        match body[3] {
            0x00 => Ok(Self::Data {
                offset,
                data: data.to_vec(),
            }),
            0x01 => Ok(Self::EndOfFile),
            0x02 => Ok(Self::ExtendedSegment(word()?)),
            0x04 => Ok(Self::ExtendedLinear(word()?)),
            0x03 | 0x05 => Ok(Self::StartAddress),
            kind => Err(Error::UnsupportedRecord { line, kind }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_record() {
        let record = Record::parse(1, ":0400100007C0FFCF57").unwrap();
        assert_eq!(
            record,
            Record::Data {
                offset: 0x10,
                data: vec![0x07, 0xc0, 0xff, 0xcf]
            }
        );
    }

    #[test]
    fn test_eof_record() {
        assert!(Record::parse(1, ":00000001FF").unwrap().is_end_of_file());
    }

    #[test]
    fn test_extended_linear_record() {
        assert_eq!(
            Record::parse(1, ":020000040001F9").unwrap(),
            Record::ExtendedLinear(1)
        );
    }

    #[test]
    fn test_bad_checksum() {
        assert!(matches!(
            Record::parse(3, ":00000001FE"),
            Err(Error::ChecksumMismatch {
                line: 3,
                expected: 0xff,
                got: 0xfe
            })
        ));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            Record::parse(1, "00000001FF"),
            Err(Error::MissingStartCode { line: 1 })
        ));
        assert!(matches!(
            Record::parse(1, ":0000001FF"),
            Err(Error::InvalidHex { .. })
        ));
        assert!(matches!(
            Record::parse(1, ":02000001FF"),
            Err(Error::InvalidLength { .. })
        ));
        assert!(matches!(
            Record::parse(1, ":00000006FA"),
            Err(Error::UnsupportedRecord { kind: 6, .. })
        ));
    }
}
