//! Inode flags of efivarfs entries.
//!
//! efivarfs creates most variable files with the "immutable" flag set, so the
//! flag has to be lifted before the variable can be overwritten.

use std::{
    fs::File,
    os::unix::prelude::AsRawFd,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Inode flag "Immutable file".
///
/// See `linux/fs.h`.
const FS_IMMUTABLE_FL: libc::c_long = 0x10;

nix::ioctl_read!(get_inode_flags, b'f', 1, libc::c_long);
nix::ioctl_write_ptr!(set_inode_flags, b'f', 2, libc::c_long);

fn inode_flags(file: &File) -> nix::Result<libc::c_long> {
    let mut flags = 0;
    // Safety: the ioctl request is set up correctly.
    unsafe { get_inode_flags(file.as_raw_fd(), &mut flags) }?;
    Ok(flags)
}

fn update_inode_flags(file: &File, flags: libc::c_long) -> nix::Result<()> {
    // Safety: the ioctl request is set up correctly.
    unsafe { set_inode_flags(file.as_raw_fd(), &flags) }?;
    Ok(())
}

/// Sets the immutability back on drop.
#[derive(Debug)]
pub struct Guard {
    attr: libc::c_long,
    path: PathBuf,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!(
                    "Unable to open file {} to make it immutable: {:#}",
                    self.path.display(),
                    e
                );
                return;
            }
        };

        if let Err(error) = update_inode_flags(&file, self.attr) {
            log::warn!(
                "Unable make file {} immutable: {:#}",
                self.path.display(),
                error
            );
        } else {
            log::debug!("Immutability of {} has been restored", self.path.display())
        }
    }
}

/// Removes the "immutable" attribute from a file at the given path and returns
/// a [Guard] that will restore the attribute back when dropped.
///
/// If the file didn't have the flag at the first place, [None] is returned,
/// hence the file wouldn't become immutable afterwards. A missing file is
/// fine: it is made immutable once the variable gets created.
pub fn temp_mutable<P>(path: P) -> Result<Option<Guard>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Some(Guard {
                attr: FS_IMMUTABLE_FL,
                path: path.to_owned(),
            }));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Unable to open {}", path.display()))
        }
    };

    let original_attr = inode_flags(&file).context("Unable to obtain inode flags")?;

    if original_attr & FS_IMMUTABLE_FL == 0 {
        return Ok(None);
    }

    update_inode_flags(&file, original_attr ^ FS_IMMUTABLE_FL)
        .context("Unable to switch off immutability")?;
    drop(file);

    log::debug!("Immutable flag removed from file {}", path.display());

    Ok(Some(Guard {
        attr: original_attr,
        path: path.to_owned(),
    }))
}
