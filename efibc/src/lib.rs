//! EFI bootloader communication.
//!
//! Intercepts restart requests and stores the command they carry in the
//! `LoaderEntryOneShot` EFI variable. Bootloaders following the
//! [boot loader interface](https://systemd.io/BOOT_LOADER_INTERFACE/) boot the
//! named entry on the following boot.

#![deny(missing_docs)]

mod array_ext;
pub mod buffer;
pub mod efivarfs;
pub mod encode;
mod error;
pub mod firmware;
pub mod interceptor;
pub mod lifecycle;
pub mod notifier;
pub mod status;

#[cfg(target_os = "linux")]
mod attributes;

pub use efivarfs::EfivarServices;
pub use firmware::{FirmwareVariables, LOADER_ATTRIBUTES, LOADER_ENTRY_ONE_SHOT, LOADER_GUID};
pub use interceptor::Interceptor;
pub use lifecycle::{start, Registration};
pub use notifier::{EventKind, Outcome, RestartChain, RestartEvent, RestartObserver};
pub use status::Status;
