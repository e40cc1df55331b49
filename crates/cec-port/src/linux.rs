//! Linux kernel CEC adapter (`/dev/cecN`)
//!
//! The device node is opened non-blocking: `CEC_TRANSMIT` returns as soon as the
//! frame is queued and the transmit result comes back later through `CEC_RECEIVE`,
//! tagged with the sequence number the kernel handed out on transmit.
//!
//! Frames from an initiator the adapter hasn't claimed, like the bootloader wake
//! frame, go out with `CEC_MSG_FL_RAW`, which needs `CAP_SYS_RAWIO`.

use std::{
    fs::{File, OpenOptions},
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd},
        unix::fs::OpenOptionsExt,
    },
    path::Path,
    time::Duration,
};

use log::{debug, trace, warn};
use nix::{
    errno::Errno,
    poll::{PollFd, PollFlags, poll},
};

use crate::{Bus, Event, MAX_FRAME_LEN, Result, Status, UNREGISTERED, err::Error, initiator};

const CEC_MAX_LOG_ADDRS: usize = 4;

mod ioctl {
    use nix::{ioctl_readwrite, ioctl_write_ptr};

    use super::{CecLogAddrs, CecMsg};

    const CEC_IOC_MAGIC: u8 = b'a';

    ioctl_readwrite!(cec_adap_s_log_addrs, CEC_IOC_MAGIC, 4, CecLogAddrs);
    ioctl_readwrite!(cec_transmit, CEC_IOC_MAGIC, 5, CecMsg);
    ioctl_readwrite!(cec_receive, CEC_IOC_MAGIC, 6, CecMsg);
    ioctl_write_ptr!(cec_s_mode, CEC_IOC_MAGIC, 9, u32);
}

/// `struct cec_msg` from `linux/cec.h`
#[allow(dead_code)]
#[derive(Debug, Default)]
#[repr(C)]
pub(crate) struct CecMsg {
    tx_ts: u64,
    rx_ts: u64,
    len: u32,
    timeout: u32,
    sequence: u32,
    flags: u32,
    msg: [u8; MAX_FRAME_LEN],
    reply: u8,
    rx_status: u8,
    tx_status: u8,
    tx_arb_lost_cnt: u8,
    tx_nack_cnt: u8,
    tx_low_drive_cnt: u8,
    tx_error_cnt: u8,
}

/// `struct cec_log_addrs` from `linux/cec.h`
#[allow(dead_code)]
#[derive(Debug, Default)]
#[repr(C)]
pub(crate) struct CecLogAddrs {
    log_addr: [u8; CEC_MAX_LOG_ADDRS],
    log_addr_mask: u16,
    cec_version: u8,
    num_log_addrs: u8,
    vendor_id: u32,
    flags: u32,
    osd_name: [u8; 15],
    primary_device_type: [u8; CEC_MAX_LOG_ADDRS],
    log_addr_type: [u8; CEC_MAX_LOG_ADDRS],
    all_device_types: [u8; CEC_MAX_LOG_ADDRS],
    features: [[u8; 12]; CEC_MAX_LOG_ADDRS],
}

const CEC_MODE_EXCL_INITIATOR: u32 = 0x2;
const CEC_MODE_FOLLOWER: u32 = 0x10;

const CEC_OP_CEC_VERSION_1_4: u8 = 5;
const CEC_VENDOR_ID_NONE: u32 = 0xffff_ffff;
const CEC_LOG_ADDRS_FL_ALLOW_UNREG_FALLBACK: u32 = 1 << 0;

const CEC_MSG_FL_RAW: u32 = 1 << 1;

const CEC_TX_STATUS_OK: u8 = 1 << 0;
const CEC_RX_STATUS_TIMEOUT: u8 = 1 << 1;
const CEC_RX_STATUS_ABORTED: u8 = 1 << 3;

/// Logical address type and primary device type for a logical address
const fn address_kind(address: u8) -> (u8, u8) {
    match address {
        0 => (0, 0),
        1 | 2 | 9 => (1, 1),
        3 | 6 | 7 | 10 => (2, 3),
        4 | 8 | 11 => (3, 4),
        5 => (4, 5),
        12..=14 => (5, 7),
        _ => (6, 7),
    }
}

/// Whether the kernel would refuse `frame` for coming from an address outside `claimed`
fn needs_raw(frame: &[u8], claimed: u16) -> bool {
    match frame {
        [header, _, ..] => {
            let from = initiator(*header);
            from != UNREGISTERED && claimed & (1 << from) == 0
        }
        _ => false,
    }
}

/// Wait up to `timeout` for `fd` to become readable
///
/// A signal cuts the wait short and reads as nothing to do, so callers get to
/// look at their cancel flag.
fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> Result<bool> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);

    match poll(&mut fds, millis) {
        Ok(n) => Ok(n > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// CEC adapter driven through the kernel CEC framework
///
/// Dropping the adapter releases every claimed logical address.
pub struct LinuxCec {
    file: File,
    pending: Option<u32>,
    /// Mask last passed to [`Bus::set_logical_addresses`]
    claimed: u16,
}

impl LinuxCec {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;

        let mode = CEC_MODE_EXCL_INITIATOR | CEC_MODE_FOLLOWER;
        unsafe { ioctl::cec_s_mode(file.as_raw_fd(), &mode) }?;
        debug!("Opened {} in exclusive initiator mode", path.display());

        Ok(Self {
            file,
            pending: None,
            claimed: 0,
        })
    }

    fn configure(&mut self, addrs: &mut CecLogAddrs) -> Result<()> {
        unsafe { ioctl::cec_adap_s_log_addrs(self.file.as_raw_fd(), addrs) }?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<CecMsg>> {
        let mut msg = CecMsg::default();
        match unsafe { ioctl::cec_receive(self.file.as_raw_fd(), &mut msg) } {
            Ok(_) => Ok(Some(msg)),
            Err(Errno::EAGAIN) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Bus for LinuxCec {
    fn set_logical_addresses(&mut self, mask: u16) -> Result<()> {
        let count = mask.count_ones() as usize;
        if count > CEC_MAX_LOG_ADDRS {
            return Err(Error::TooManyAddresses(mask));
        }

        // Claiming on a configured adapter fails with EBUSY
        self.configure(&mut CecLogAddrs::default())?;

        let mut addrs = CecLogAddrs {
            cec_version: CEC_OP_CEC_VERSION_1_4,
            num_log_addrs: count as u8,
            vendor_id: CEC_VENDOR_ID_NONE,
            flags: CEC_LOG_ADDRS_FL_ALLOW_UNREG_FALLBACK,
            ..Default::default()
        };
        let name = b"cec-flash";
        addrs.osd_name[..name.len()].copy_from_slice(name);

        for (i, address) in (0..=UNREGISTERED)
            .filter(|a| mask & (1u16 << *a) != 0)
            .enumerate()
        {
            let (ty, primary) = address_kind(address);
            addrs.log_addr_type[i] = ty;
            addrs.primary_device_type[i] = primary;
        }

        if count > 0 {
            self.configure(&mut addrs)?;
        }
        self.claimed = mask;
        debug!(
            "Claimed logical addresses {:#06x} for mask {mask:#06x}",
            addrs.log_addr_mask
        );
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(Error::FrameTooLong(frame.len()));
        }

        let mut msg = CecMsg {
            len: frame.len() as u32,
            ..Default::default()
        };
        msg.msg[..frame.len()].copy_from_slice(frame);

        let raw = needs_raw(frame, self.claimed);
        if raw {
            debug!("Sending raw as initiator {}", initiator(frame[0]));
            msg.flags |= CEC_MSG_FL_RAW;
        }

        match unsafe { ioctl::cec_transmit(self.file.as_raw_fd(), &mut msg) } {
            Ok(_) => (),
            Err(Errno::EPERM) if raw => return Err(Error::RawNotPermitted(initiator(frame[0]))),
            Err(e) => return Err(e.into()),
        }
        trace!("Queued {frame:02x?} as sequence {}", msg.sequence);
        self.pending = Some(msg.sequence);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if !wait_readable(self.file.as_fd(), timeout)? {
            return Ok(None);
        }

        let Some(msg) = self.receive()? else {
            return Ok(None);
        };

        if msg.tx_status != 0 {
            if self.pending != Some(msg.sequence) {
                warn!("Ignoring transmit result for stale sequence {}", msg.sequence);
                return Ok(None);
            }
            self.pending = None;

            let status = if msg.tx_status & CEC_TX_STATUS_OK != 0 {
                Status::empty()
            } else {
                debug!(
                    "Transmit failed: status {:#04x}, {} nacks, {} errors",
                    msg.tx_status, msg.tx_nack_cnt, msg.tx_error_cnt
                );
                Status::NACK
            };
            return Ok(Some(Event::Transmitted { status }));
        }

        let length = msg.len as usize;
        let status = if msg.rx_status & (CEC_RX_STATUS_TIMEOUT | CEC_RX_STATUS_ABORTED) != 0 {
            Status::OVERRUN
        } else {
            Status::empty()
        };
        Ok(Some(Event::Received {
            message: msg.msg[..length.min(MAX_FRAME_LEN)].to_vec(),
            length,
            status,
        }))
    }
}

impl Drop for LinuxCec {
    fn drop(&mut self) {
        if let Err(e) = self.configure(&mut CecLogAddrs::default()) {
            warn!("Failed to release logical addresses: {e}");
        }
    }
}
