// SPDX-License-Identifier: MIT

//! Real `DeviceFs` (§4.7): `BLKRRPART` ioctl, sysfs partition-child
//! enumeration, and the `change` trigger write, plus the shared advisory
//! devnode lock §4.5/§5 require around rule execution for block devices.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use fs2::FileExt;
use tracing::warn;

use ueventd_engine::error::SynthesizeError;
use ueventd_engine::ports::DeviceFs;

// `_IO(0x12, 95)`: BLKRRPART, "re-read partition table" (see
// `linux/fs.h`). No argument, no data transfer.
nix::ioctl_none!(blkrrpart, 0x12, 95);

pub struct RealDeviceFs;

impl DeviceFs for RealDeviceFs {
    fn reread_partition_table(&self, devnode: &str) -> Result<bool, SynthesizeError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(devnode)
            .map_err(|e| SynthesizeError::OpenFailed(e.to_string()))?;

        file.try_lock_exclusive()
            .map_err(|e| SynthesizeError::LockFailed(e.to_string()))?;

        // SAFETY: `blkrrpart` issues the parameterless `BLKRRPART` ioctl on
        // an fd this function just opened and holds for the call's
        // duration; no buffer is shared with the kernel.
        #[allow(unsafe_code)]
        let result = unsafe { blkrrpart(file.as_raw_fd()) };

        let _ = fs2::FileExt::unlock(&file);

        match result {
            Ok(_) => Ok(true),
            Err(e) => Err(SynthesizeError::RereadFailed(e.to_string())),
        }
    }

    fn partition_children(&self, disk_syspath: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(disk_syspath) else {
            return Vec::new();
        };

        let mut children: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join("partition").exists())
            .filter_map(|p| p.to_str().map(str::to_string))
            .collect();
        children.sort();
        children
    }

    fn write_change_trigger(&self, syspath: &str) -> Result<(), SynthesizeError> {
        let path = Path::new(syspath).join("uevent");
        std::fs::write(&path, b"change\n").map_err(|e| SynthesizeError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Shared advisory lock a worker takes on a devnode before running rules
/// for a non-remove block device whose devtype is not `dm-*`/`md*`/`drbd*`
/// (§4.5 "Spawning"). `Ok(false)` means another process holds `LOCK_EX` —
/// the caller skips rule execution for this event rather than blocking.
pub fn try_lock_devnode_shared(devnode: &str) -> std::io::Result<LockGuard> {
    let file = OpenOptions::new().read(true).open(devnode)?;
    match file.try_lock_shared() {
        Ok(()) => Ok(LockGuard {
            file: Some(file),
            held: true,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(LockGuard { file: None, held: false }),
        Err(e) => {
            warn!(devnode, error = %e, "devnode lock attempt failed");
            Err(e)
        }
    }
}

/// RAII holder for the shared devnode lock; unlocks (if held) on drop.
pub struct LockGuard {
    file: Option<std::fs::File>,
    held: bool,
}

impl LockGuard {
    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = fs2::FileExt::unlock(file);
        }
    }
}

/// Devtypes the worker must never take the shared lock / run the reread
/// special-case for (§4.5: "non-remove block devices not of type `dm-*`,
/// `md*`, `drbd*`").
pub fn is_lock_exempt(sysname: &str) -> bool {
    sysname.starts_with("dm-") || sysname.starts_with("md") || sysname.starts_with("drbd")
}
