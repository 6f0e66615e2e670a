// SPDX-License-Identifier: MIT

//! The kernel-facing device view: the fields a uevent carries, amended or
//! not, plus the small identifier newtypes used throughout the engine.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically increasing identifier assigned by the kernel to each
/// uevent. Unique within a single daemon run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeqNum(pub u64);

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (major, minor) device-number pair. `(0, 0)` means "absent" — most
/// non-block devices (and network interfaces) never have a devnum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevNum {
    pub major: u32,
    pub minor: u32,
}

impl DevNum {
    pub const NONE: DevNum = DevNum { major: 0, minor: 0 };

    pub fn is_absent(&self) -> bool {
        self.major == 0
    }
}

/// Kernel network-interface index. `0` means "not a network device";
/// positive values identify a live interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IfIndex(pub i32);

impl IfIndex {
    pub const NONE: IfIndex = IfIndex(0);

    pub fn is_present(&self) -> bool {
        self.0 > 0
    }
}

/// The uevent action tag. Stored as a string because the kernel's action
/// vocabulary (add/remove/change/move/online/offline/bind/unbind) is open
/// ended, but `remove` is the only value the engine itself inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action(pub String);

impl Action {
    pub fn is_remove(&self) -> bool {
        self.0 == "remove"
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action(s.to_string())
    }
}

/// Opaque device view handed over by the (external) netlink monitor codec.
///
/// `devpath` is a null-free ASCII sysfs path such as
/// `/devices/.../sdX/sdX1`. `properties` carries whatever `KEY=value` pairs
/// the kernel (or, after processing, the rule engine) attached; it is the
/// only field a worker is allowed to amend in place — everything else is
/// identity/topology data the conflict detector depends on and must not
/// change underneath a queued event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub seqnum: SeqNum,
    pub devpath: String,
    pub devpath_old: Option<String>,
    pub devnum: DevNum,
    pub is_block: bool,
    pub ifindex: IfIndex,
    pub action: Action,
    pub subsystem: String,
    pub devtype: String,
    pub sysname: String,
    /// The parent whole-disk devnode (e.g. `/dev/sda` for partition
    /// `/dev/sda1`), supplied by the monitor for partition devices by
    /// walking the sysfs hierarchy — `None` for non-partition devices.
    /// §4.5 "Spawning" requires partition-device rule execution to take
    /// its advisory lock "on the parent disk", not on the partition's own
    /// node, so it actually serializes against the whole-disk `BLKRRPART`
    /// lock the C7 synthesizer takes.
    #[serde(default)]
    pub parent_devnode: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Device {
    /// Build a minimal device view for tests and for synthesized events.
    pub fn new(seqnum: u64, devpath: impl Into<String>, action: impl Into<Action>) -> Self {
        Self {
            seqnum: SeqNum(seqnum),
            devpath: devpath.into(),
            devpath_old: None,
            devnum: DevNum::NONE,
            is_block: false,
            ifindex: IfIndex::NONE,
            action: action.into(),
            subsystem: String::new(),
            devtype: String::new(),
            sysname: String::new(),
            parent_devnode: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_devnum(mut self, major: u32, minor: u32, is_block: bool) -> Self {
        self.devnum = DevNum { major, minor };
        self.is_block = is_block;
        self
    }

    pub fn with_ifindex(mut self, ifindex: i32) -> Self {
        self.ifindex = IfIndex(ifindex);
        self
    }

    pub fn with_devpath_old(mut self, devpath_old: impl Into<String>) -> Self {
        self.devpath_old = Some(devpath_old.into());
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn with_devtype(mut self, devtype: impl Into<String>) -> Self {
        self.devtype = devtype.into();
        self
    }

    pub fn with_sysname(mut self, sysname: impl Into<String>) -> Self {
        self.sysname = sysname.into();
        self
    }

    pub fn with_parent_devnode(mut self, parent_devnode: impl Into<String>) -> Self {
        self.parent_devnode = Some(parent_devnode.into());
        self
    }
}
