use derive_more::IsVariant;
use enum_dispatch::enum_dispatch;

use crate::{
    Patch, Result,
    patches::{reset_vector::ResetVector, trampoline::Trampoline},
};

pub mod reset_vector;
pub mod trampoline;

/// Edits layered onto the raw image
#[enum_dispatch(Patch)]
#[derive(Debug, Clone, IsVariant)]
pub enum Patches {
    /// Reset vector redirected into the bootloader
    ResetVector(ResetVector),
    /// Jump back into the user program from the last application page
    Trampoline(Trampoline),
}

impl Patches {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ResetVector(_) => "reset vector",
            Self::Trampoline(_) => "trampoline",
        }
    }
}
