//! The firmware variable service contract and the constants shared with the
//! bootloader.

use efivar::efi::VariableFlags;
use uuid::Uuid;

use crate::status::Status;

/// The EFI variable LoaderEntryOneShot contains the default boot loader entry
/// to use for a single following boot. It is set by the OS in order to request
/// booting into a specific menu entry on the following boot. When set overrides
/// LoaderEntryDefault. It is removed automatically after being read by the boot
/// loader, to ensure it only takes effect a single time.
///
/// (c) https://systemd.io/BOOT_LOADER_INTERFACE/
pub const LOADER_ENTRY_ONE_SHOT: &str = "LoaderEntryOneShot";

/// Vendor bytes from https://systemd.io/BOOT_LOADER_INTERFACE/
pub const LOADER_GUID: Uuid = Uuid::from_bytes([
    0x4a, 0x67, 0xb0, 0x82, 0x0a, 0x4c, 0x41, 0xcf, 0xb6, 0xc7, 0x44, 0x0b, 0x29, 0xbb, 0x8c, 0x4f,
]);

/// Attributes the one shot entry is written with: non-volatile, accessible
/// both from boot and runtime services.
pub const LOADER_ATTRIBUTES: VariableFlags = VariableFlags::from_bits_truncate(
    VariableFlags::NON_VOLATILE.bits()
        | VariableFlags::BOOTSERVICE_ACCESS.bits()
        | VariableFlags::RUNTIME_ACCESS.bits(),
);

/// Access to the firmware runtime variable services.
pub trait FirmwareVariables {
    /// Whether the firmware runtime services are present at all.
    fn runtime_services_available(&self) -> bool;

    /// Stores `data` in the variable `name` (null-terminated wide string) under
    /// the `vendor` namespace.
    fn set_variable(
        &self,
        name: &[u16],
        vendor: &Uuid,
        attributes: VariableFlags,
        data: &[u8],
    ) -> Result<(), Status>;
}

impl<T: FirmwareVariables + ?Sized> FirmwareVariables for &T {
    fn runtime_services_available(&self) -> bool {
        (**self).runtime_services_available()
    }

    fn set_variable(
        &self,
        name: &[u16],
        vendor: &Uuid,
        attributes: VariableFlags,
        data: &[u8],
    ) -> Result<(), Status> {
        (**self).set_variable(name, vendor, attributes, data)
    }
}
