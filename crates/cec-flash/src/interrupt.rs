//! Ctrl-C handling
use std::{ffi::c_int, sync::OnceLock};

use cec_protocol::CancelToken;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::Result;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_signal(_: c_int) {
    if let Some(token) = TOKEN.get() {
        token.cancel();
    }
}

/// Cancel `token` on SIGINT and SIGTERM.
///
/// Only the first token installed is ever signalled.
pub fn install(token: &CancelToken) -> Result<()> {
    let _ = TOKEN.set(token.clone());

    // No SA_RESTART: a blocked poll has to return so the flag is seen
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only does an atomic store
        unsafe { sigaction(signal, &action) }?;
    }

    Ok(())
}
