use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use efibc::{
    EfivarServices, EventKind, Interceptor, Outcome, RestartChain,
    RestartEvent, LOADER_ATTRIBUTES, LOADER_ENTRY_ONE_SHOT, LOADER_GUID,
};
use fern::colors::{Color, ColoredLevelConfig};

#[derive(PartialEq, Debug, clap::ValueEnum, Clone, Copy)]
pub enum ColorMode {
    Auto,
    On,
    Off,
}

#[derive(PartialEq, Debug, clap::ValueEnum, Clone, Copy)]
pub enum Kind {
    Restart,
    Halt,
    PowerOff,
}

impl From<Kind> for EventKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Restart => EventKind::Restart,
            Kind::Halt => EventKind::Halt,
            Kind::PowerOff => EventKind::PowerOff,
        }
    }
}

/// Tells the bootloader which entry to boot after a restart.
#[derive(Parser)]
struct Args {
    /// Be verbose.
    #[clap(long, short)]
    verbose: bool,

    /// Set the color mode.
    #[clap(value_enum, long = "color", default_value_t = ColorMode::Auto)]
    color_mode: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Restart with the given command. Short alias is "r".
    #[clap(alias = "r")]
    Restart {
        /// Boot loader entry to boot next time.
        entry: String,

        /// Actually reboot the machine afterwards.
        #[clap(long)]
        reboot: bool,
    },

    /// Deliver an arbitrary shutdown event without rebooting.
    Notify {
        /// Kind of the event.
        #[clap(value_enum)]
        kind: Kind,

        /// Command attached to the event.
        payload: Option<String>,
    },

    /// Print the variable the entry is stored in.
    Show,
}

fn init_logging(verbose: bool, color_mode: ColorMode) -> Result<()> {
    let colorful_logs = match color_mode {
        ColorMode::Auto => {
            #[cfg(target_os = "linux")]
            {
                use std::os::unix::io::AsRawFd;
                nix::unistd::isatty(std::io::stdout().as_raw_fd()).unwrap_or(false)
            }
            #[cfg(not(target_os = "linux"))]
            {
                true
            }
        }
        ColorMode::On => true,
        ColorMode::Off => false,
    };

    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Cyan);
    type Formatter =
        Box<dyn Fn(fern::FormatCallback, &std::fmt::Arguments, &log::Record) + Sync + Send>;
    let formatter: Formatter = if colorful_logs {
        Box::new(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}{message}\x1B[0m",
                color_line =
                    format_args!("\x1B[{}m", colors.get_color(&record.level()).to_fg_str()),
                message = message
            ))
        })
    } else {
        Box::new(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
    };

    fern::Dispatch::new()
        .format(formatter)
        .level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stdout())
        .apply()
        .context("Unable to initialize logging")
}

#[cfg(target_os = "linux")]
fn reboot_now() -> Result<()> {
    use nix::sys::reboot::{reboot, RebootMode};

    nix::unistd::sync();
    match reboot(RebootMode::RB_AUTOBOOT).context("Unable to reboot")? {}
}

#[cfg(not(target_os = "linux"))]
fn reboot_now() -> Result<()> {
    anyhow::bail!("Rebooting is only supported on Linux")
}

fn main() -> Result<()> {
    let Args {
        verbose,
        color_mode,
        command,
    } = Args::parse();

    init_logging(verbose, color_mode)?;

    if let Command::Show = command {
        log::info!(
            "{}-{} (attributes {:#x})",
            LOADER_ENTRY_ONE_SHOT,
            LOADER_GUID,
            LOADER_ATTRIBUTES.bits()
        );
        return Ok(());
    }

    let chain = RestartChain::new();
    let interceptor = Arc::new(Interceptor::new(EfivarServices::new()));
    let registration =
        efibc::start(interceptor, &chain).context("Unable to register reboot notifier")?;

    match command {
        Command::Restart { entry, reboot: do_reboot } => {
            let outcome = chain.notify(&RestartEvent::restart(entry.as_bytes()));
            if outcome == Outcome::NotHandled {
                log::warn!(r#"Boot entry "{}" has not been recorded"#, entry);
            }
            registration.stop();
            if do_reboot {
                log::info!("Rebooting");
                reboot_now()?;
            }
        }
        Command::Notify { kind, payload } => {
            let event = RestartEvent::new(kind.into(), payload.as_deref().map(str::as_bytes));
            let outcome = chain.notify(&event);
            log::info!("{} event outcome: {:?}", event.kind, outcome);
        }
        Command::Show => { /* Handled above */ }
    }

    Ok(())
}
