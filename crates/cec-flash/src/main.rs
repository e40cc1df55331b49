use std::{
    io::{Write, stdout},
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use cec_patcher::{Firmware, Layout, Patch as _};
use cec_port::{Bus, DEFAULT_DEVICE};
use cec_protocol::{CancelToken, Session};
use cec_target::Target;
use clap::{ArgAction, Parser};
use clap_num::maybe_hex;
use colored::Colorize;
use env_logger::Env;

use crate::{
    err::Error,
    flasher::{DEFAULT_ATTEMPTS, FlashState, Flasher, RetryPolicy},
    progress::{PageBar, Progress, Quiet},
};

mod err;
mod flasher;
mod interrupt;
mod logging;
mod progress;

type Result<T> = core::result::Result<T, Error>;

#[derive(Parser)]
#[command(version, about = "Flash an ATtiny over HDMI-CEC through its resident bootloader")]
struct Cli {
    /// Intel HEX image to flash
    image: PathBuf,
    /// CEC adapter device
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    device: PathBuf,
    /// How long to wait for each frame to go out, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Attempts per 8 byte chunk before giving up
    #[arg(short, long, default_value_t = DEFAULT_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    retries: u32,
    /// Bootloader start address, defaults to the target's
    #[arg(short, long, value_parser = maybe_hex::<u32>)]
    bootloader_start: Option<u32>,
    /// More output, twice for bus traces
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[cfg(target_os = "linux")]
fn open_bus(device: &Path) -> Result<Box<dyn Bus>> {
    Ok(Box::new(cec_port::linux::LinuxCec::open(device)?))
}

#[cfg(not(target_os = "linux"))]
fn open_bus(device: &Path) -> Result<Box<dyn Bus>> {
    Err(Error::Custom(format!(
        "{}: CEC adapters are only supported on Linux",
        device.display()
    )))
}

fn flash<B: Bus>(
    flasher: &mut Flasher<B>,
    firmware: &Firmware,
    progress: &mut dyn Progress,
) -> Result<()> {
    log!("Entering bootloader...");
    status!(flasher.enter())?;
    log!("Pinging bootloader...");
    status!(flasher.ping())?;
    log!("Erasing...");
    status!(flasher.erase())?;

    println!("Programming {} pages", firmware.layout().page_count());
    flasher.program(firmware, progress)?;

    log!("Starting the program...");
    status!(flasher.run())
}

fn report_abort(state: FlashState, error: &Error) {
    eprintln!("Aborted while {state}");
    match error {
        Error::RunFailed => eprintln!(
            "{}",
            "The image is written but the bootloader did not confirm starting it".yellow()
        ),
        _ if state.device_erased() => eprintln!(
            "{}",
            "The device is erased and holds no program, flash it again before using it".yellow()
        ),
        _ => (),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let target = Target::default();
    let layout = match cli.bootloader_start {
        Some(start) => Layout::new(target.page_size(), start)?,
        None => Layout::from(target),
    };

    // Everything that can be wrong with the image is caught before the device is touched
    let firmware = Firmware::from_image(cec_hex::load(&cli.image)?, layout)?;
    println!(
        "Image is {} bytes, reset vector points to {:#x}",
        firmware.size(),
        firmware.facts().user_reset()
    );
    for patch in firmware.patches() {
        println!("Patching {}", patch.describe());
    }

    let cancel = CancelToken::new();
    interrupt::install(&cancel)?;

    let session = Session::open(open_bus(&cli.device)?)?
        .with_timeout(Duration::from_millis(cli.timeout_ms))
        .with_cancel(cancel.clone());
    let mut flasher = Flasher::new(session, RetryPolicy::new(cli.retries), cancel);
    let mut progress: Box<dyn Progress> = match cli.verbose {
        0 => Box::new(PageBar::new(layout.page_count())?),
        _ => Box::new(Quiet),
    };

    let ret = flash(&mut flasher, &firmware, progress.as_mut());
    drop(progress);
    if let Err(e) = &ret {
        report_abort(flasher.state(), e);
    }
    ret
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            ExitCode::from(e.kind().exit_code())
        }
    }
}
