use derive_ctor::ctor;

use crate::{Patch, Result, avr::encode_jmp};

/// Absolute jump to the original reset target in the last 4 bytes before the bootloader
#[derive(Debug, Clone, ctor)]
pub struct Trampoline {
    /// Last page before the bootloader
    page_address: u32,
    /// Where the image's own reset vector pointed
    user_reset: u32,
}

/// `jmp` is two words
const JMP_LEN: usize = 4;

impl Patch for Trampoline {
    fn address(&self) -> u32 {
        self.page_address
    }

    fn offset(&self, page_size: usize) -> usize {
        page_size - JMP_LEN
    }

    fn replacement(&self) -> Result<Vec<u8>> {
        Ok(encode_jmp(self.user_reset)?.to_vec())
    }

    fn describe(&self) -> String {
        format!(
            "trampoline in page {:#x} returns to {:#x}",
            self.page_address, self.user_reset
        )
    }
}
