use derive_ctor::ctor;

use crate::{Patch, Result, avr::encode_rjmp};

/// Point the reset vector at the bootloader
///
/// Every reset then runs the bootloader first, which leaves through the
/// [`Trampoline`](super::trampoline::Trampoline).
#[derive(Debug, Clone, ctor)]
pub struct ResetVector {
    bootloader_start: u32,
}

impl Patch for ResetVector {
    fn address(&self) -> u32 {
        0
    }

    fn offset(&self, _page_size: usize) -> usize {
        0
    }

    fn replacement(&self) -> Result<Vec<u8>> {
        Ok(encode_rjmp(self.bootloader_start, self.address())?
            .to_le_bytes()
            .to_vec())
    }

    fn describe(&self) -> String {
        format!("reset vector jumps to bootloader at {:#x}", self.bootloader_start)
    }
}
