// SPDX-License-Identifier: MIT

//! The inotify synthesizer (C7, §4.7): on close-after-write for a watched
//! devnode, decides whether to let the kernel's own reread emit events or
//! to manually trigger `change` uevents via sysfs.

use crate::error::SynthesizeError;
use crate::ports::DeviceFs;

/// The device fields the synthesizer needs, independent of whatever
/// watch-descriptor-to-device map the inotify adapter maintains.
#[derive(Debug, Clone)]
pub struct WatchedDevice {
    pub subsystem: String,
    pub sysname: String,
    pub devnode: String,
    pub syspath: String,
    pub devtype: String,
}

impl WatchedDevice {
    fn is_whole_disk(&self) -> bool {
        self.subsystem == "block" && self.devtype == "disk" && !self.sysname.starts_with("dm-")
    }
}

/// Run the synthesizer for one `IN_CLOSE_WRITE` event (§4.7).
pub fn synthesize(dev: &WatchedDevice, fs: &dyn DeviceFs) -> Result<(), SynthesizeError> {
    if dev.is_whole_disk() {
        let reread_ok = fs.reread_partition_table(&dev.devnode).unwrap_or(false);
        let children = fs.partition_children(&dev.syspath);

        if reread_ok && !children.is_empty() {
            // Kernel will emit change/remove/add events itself.
            return Ok(());
        }

        fs.write_change_trigger(&dev.syspath)?;
        for child in children {
            fs.write_change_trigger(&child)?;
        }
        return Ok(());
    }

    fs.write_change_trigger(&dev.syspath)
}
