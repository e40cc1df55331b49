//! Intel HEX firmware loader
use std::{fs, path::Path};

use derive_ctor::ctor;
use getset::Getters;

use crate::{err::Error, record::Record};

pub mod err;
mod record;

pub type Result<T> = core::result::Result<T, Error>;

/// Records may not run past the 32 bit address space
const ADDRESS_SPACE: u64 = 1 << 32;

/// Contiguous run of bytes at a fixed address
#[derive(Debug, Clone, PartialEq, Eq, Getters, ctor)]
pub struct Segment {
    /// Address of the first byte
    #[getset(get = "pub")]
    address: u32,

    /// Contents
    #[getset(get = "pub")]
    data: Vec<u8>,
}

impl Segment {
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// One past the last covered address, which is 2^32 for a segment ending at the very top
    #[must_use]
    pub fn end(&self) -> u64 {
        self.address as u64 + self.data.len() as u64
    }

    /// Whether `address` falls inside the segment
    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        (self.address as u64..self.end()).contains(&(address as u64))
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Firmware file as address tagged segments, sorted by address
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Image {
    #[getset(get = "pub")]
    segments: Vec<Segment>,
}

impl Image {
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

/// Read and parse the file at `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Image> {
    parse(&fs::read_to_string(path)?)
}

/// Parse Intel HEX `text`
///
/// Adjacent data records are merged into one segment, anything after the
/// end-of-file record is ignored.
pub fn parse(text: &str) -> Result<Image> {
    let mut base = 0u32;
    let mut chunks = Vec::new();
    let mut eof = false;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Record::parse(idx + 1, line)? {
            Record::Data { offset, data } => {
                let segment = Segment::new(base.wrapping_add(offset as u32), data);
                if segment.end() > ADDRESS_SPACE {
                    return Err(Error::AddressOverflow { line: idx + 1 });
                }
                chunks.push(segment)
            }
            Record::EndOfFile => {
                eof = true;
                break;
            }
            Record::ExtendedSegment(segment) => base = (segment as u32) << 4,
            Record::ExtendedLinear(upper) => base = (upper as u32) << 16,
            Record::StartAddress => (),
        }
    }

    if !eof {
        return Err(Error::MissingEof);
    }

    Ok(Image {
        segments: merge(chunks)?,
    })
}

fn merge(mut chunks: Vec<Segment>) -> Result<Vec<Segment>> {
    chunks.sort_by_key(|s| s.address);

    let mut segments: Vec<Segment> = Vec::new();
    for chunk in chunks.into_iter().filter(|c| !c.data.is_empty()) {
        match segments.last_mut() {
            Some(last) if (chunk.address as u64) < last.end() => {
                return Err(Error::Overlap {
                    address: chunk.address,
                });
            }
            Some(last) if chunk.address as u64 == last.end() => last.data.extend(chunk.data),
            _ => segments.push(chunk),
        }
    }

    Ok(segments)
}
