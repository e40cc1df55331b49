use core::fmt::Display;

use derive_more::IsVariant;

use crate::err::Error;

pub mod cancel;
pub mod crc;
pub mod err;
pub mod session;

pub use cancel::CancelToken;
pub use crc::crc16;
pub use session::Session;

pub type Result<T> = core::result::Result<T, Error>;

/// Frame header: unregistered initiator to the TV, then the vendor command opcode
pub const MAGIC: [u8; 2] = [0xf0, 0x89];

/// Payload bytes carried by a single [`Opcode::WriteData`]
pub const CHUNK_SIZE: usize = 8;

/// Longest frame [`frame`] builds: header, command, chunk and checksum
pub const MAX_FRAME_LEN: usize = MAGIC.len() + 1 + CHUNK_SIZE + 2;

/// Knocks the running firmware into its bootloader.
///
/// Sent verbatim, it isn't built by [`frame`] and carries no checksum.
pub const WAKE_FRAME: [u8; 16] = [
    0x80, 0x89, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0xb1,
];

/// Bootloader commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
#[repr(u8)]
pub enum Opcode {
    /// Is anybody there?
    Ping = 0,
    /// Leave the bootloader and start the user program.
    Run = 1,
    /// Erase the application area.
    Erase = 3,
    /// Program the next 8 bytes. The address is implied by the write order.
    WriteData = 5,
}

impl Opcode {
    /// Payload size the bootloader expects after this opcode
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        match self {
            Self::WriteData => CHUNK_SIZE,
            _ => 0,
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ping => write!(f, "Ping"),
            Self::Run => write!(f, "Run"),
            Self::Erase => write!(f, "Erase"),
            Self::WriteData => write!(f, "Write data"),
        }
    }
}

/// Build a command frame
///
/// Layout: [`MAGIC`], opcode, payload, then the [`crc16`] of everything
/// before it in little endian.
pub fn frame(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() != opcode.payload_len() {
        return Err(Error::InvalidPayload {
            opcode,
            expected: opcode.payload_len(),
            got: payload.len(),
        });
    }

    let mut bytes = Vec::with_capacity(MAX_FRAME_LEN);
    bytes.extend_from_slice(&MAGIC);
    bytes.push(opcode as u8);
    bytes.extend_from_slice(payload);
    let crc = crc16(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_frame() {
        assert_eq!(
            frame(Opcode::Ping, &[]).unwrap(),
            [0xf0, 0x89, 0x00, 0x16, 0x63]
        );
    }

    #[test]
    fn test_run_and_erase_frames() {
        assert_eq!(
            frame(Opcode::Run, &[]).unwrap(),
            [0xf0, 0x89, 0x01, 0xd7, 0xa3]
        );
        assert_eq!(
            frame(Opcode::Erase, &[]).unwrap(),
            [0xf0, 0x89, 0x03, 0x56, 0x62]
        );
    }

    #[test]
    fn test_write_data_frame() {
        let bytes = frame(Opcode::WriteData, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(bytes.len(), MAX_FRAME_LEN);
        assert_eq!(&bytes[..3], &[0xf0, 0x89, 0x05]);
        assert_eq!(&bytes[3..11], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[11..], &[0x1d, 0xb4]);
    }

    #[test]
    fn test_payload_size_is_enforced() {
        assert!(matches!(
            frame(Opcode::WriteData, &[0; 7]),
            Err(Error::InvalidPayload {
                expected: 8,
                got: 7,
                ..
            })
        ));
        assert!(frame(Opcode::Ping, &[0]).is_err());
    }

    #[test]
    fn test_wake_frame_is_raw() {
        assert_eq!(WAKE_FRAME.len(), 16);
        assert_eq!(WAKE_FRAME[0], 0x80);
        assert_eq!(WAKE_FRAME[15], 0xb1);
    }
}
