//! [FirmwareVariables] backed by the operating system's EFI variable store.

use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

use efivar::{
    efi::{VariableFlags, VariableName, VariableVendor},
    VarManager,
};
use uuid::Uuid;

use crate::{encode::encoded_len, error::EfiError, firmware::FirmwareVariables, status::Status};

/// Where Linux mounts efivarfs. This is the store [efivar::system] writes to.
pub const EFIVARS: &str = "/sys/firmware/efi/efivars";

/// System EFI variables accessed through the [efivar] crate.
///
/// Without efivarfs there is no manager at all: the host has no EFI runtime
/// services, and every write is answered with [Status::UNSUPPORTED].
pub struct EfivarServices {
    inner: Option<Mutex<Box<dyn VarManager>>>,
}

impl EfivarServices {
    /// Opens the system variable store, if there is one.
    pub fn new() -> Self {
        Self::open(Path::new(EFIVARS))
    }

    /// Opens the system variable store if `efivars` is a directory.
    ///
    /// [efivar::system] panics on hosts without EFI, so it is only called once
    /// the store is known to exist.
    fn open(efivars: &Path) -> Self {
        let inner = if efivars.is_dir() {
            Some(Mutex::new(efivar::system()))
        } else {
            log::debug!("{} not found, no EFI runtime services", efivars.display());
            None
        };
        Self { inner }
    }

    fn write(
        manager: &Mutex<Box<dyn VarManager>>,
        name: &VariableName,
        flags: VariableFlags,
        value: &[u8],
    ) -> Result<(), Status> {
        #[cfg(target_os = "linux")]
        let _guard = {
            let path = Path::new(EFIVARS).join(name.to_string());
            match crate::attributes::temp_mutable(&path) {
                Ok(guard) => guard,
                Err(e) => {
                    log::warn!("Writing {} regardless: {:#}", path.display(), e);
                    None
                }
            }
        };

        let mut manager = manager.lock().unwrap_or_else(PoisonError::into_inner);
        manager.write(name, flags, value).map_err(|e| {
            let error = EfiError(e);
            let status = error.status();
            log::error!("Unable to set variable '{}': {:#}", name, anyhow::Error::new(error));
            status
        })
    }
}

impl Default for EfivarServices {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareVariables for EfivarServices {
    fn runtime_services_available(&self) -> bool {
        self.inner.is_some()
    }

    fn set_variable(
        &self,
        name: &[u16],
        vendor: &Uuid,
        attributes: VariableFlags,
        data: &[u8],
    ) -> Result<(), Status> {
        let manager = self.inner.as_ref().ok_or(Status::UNSUPPORTED)?;
        let name = &name[..encoded_len(name)];
        let name = String::from_utf16(name).map_err(|_| {
            log::error!(
                "Non-UTF16 variable name: {}",
                String::from_utf16_lossy(name)
            );
            Status::INVALID_PARAMETER
        })?;
        let name = VariableName::new_with_vendor(&name, VariableVendor::Custom(*vendor));
        log::trace!("Writing {} with {:?}: {:x?}", name, attributes, data);
        Self::write(manager, &name, attributes, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::{LOADER_ATTRIBUTES, LOADER_GUID};

    #[test]
    fn missing_store_means_no_runtime_services() {
        let missing = std::env::temp_dir().join("efibc-no-such-efivars");
        let _ = std::fs::remove_dir_all(&missing);

        let services = EfivarServices::open(&missing);
        assert!(!services.runtime_services_available());

        let name: Vec<u16> = "LoaderEntryOneShot".encode_utf16().chain(Some(0)).collect();
        assert_eq!(
            services.set_variable(&name, &LOADER_GUID, LOADER_ATTRIBUTES, &[0x61, 0, 0, 0]),
            Err(Status::UNSUPPORTED)
        );
    }

    #[test]
    fn availability_follows_system_store() {
        let services = EfivarServices::new();
        assert_eq!(
            services.runtime_services_available(),
            Path::new(EFIVARS).is_dir()
        );
    }
}
