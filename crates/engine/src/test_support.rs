// SPDX-License-Identifier: MIT

//! Fake implementations of this crate's ports, for engine-level unit tests
//! and for other crates testing against [`crate::dispatch::Dispatcher`]/
//! [`crate::synth`] without a real process/filesystem.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ueventd_core::{Device, Pid, WorkerEndpoint};

use crate::error::{DispatchError, QueueError, SynthesizeError};
use crate::ports::{DeviceFs, MonitorPublisher, QueueMarker, RulesFreshness, WorkerSpawner};

/// In-memory `/run/udev/queue` marker stand-in.
#[derive(Default)]
pub struct FakeQueueMarker {
    pub present: Mutex<bool>,
    pub fail_touch: Mutex<bool>,
}

impl QueueMarker for FakeQueueMarker {
    fn touch(&self) -> Result<(), QueueError> {
        if *self.fail_touch.lock().unwrap() {
            return Err(QueueError::MarkerCreate("fake failure".into()));
        }
        *self.present.lock().unwrap() = true;
        Ok(())
    }

    fn remove(&self) -> Result<(), QueueError> {
        *self.present.lock().unwrap() = false;
        Ok(())
    }
}

/// Spawns no real processes: allocates sequential fake pids and records
/// every spawn/send/terminate/kill call for assertions.
pub struct FakeWorkerSpawner {
    next_pid: AtomicI32,
    pub spawned: Mutex<Vec<Device>>,
    pub sent: Mutex<Vec<(WorkerEndpoint, Device)>>,
    pub terminated: Mutex<Vec<Pid>>,
    pub killed: Mutex<Vec<Pid>>,
    pub fail_send_to: Mutex<Vec<WorkerEndpoint>>,
}

impl Default for FakeWorkerSpawner {
    fn default() -> Self {
        Self {
            next_pid: AtomicI32::new(100),
            spawned: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            killed: Mutex::new(Vec::new()),
            fail_send_to: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WorkerSpawner for FakeWorkerSpawner {
    async fn spawn(
        &self,
        initial: &Device,
        _env: &HashMap<String, Option<String>>,
    ) -> Result<(Pid, WorkerEndpoint), DispatchError> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawned.lock().unwrap().push(initial.clone());
        Ok((Pid(pid), WorkerEndpoint(format!("fake-worker-{pid}"))))
    }

    async fn send(&self, endpoint: &WorkerEndpoint, device: &Device) -> Result<(), DispatchError> {
        if self.fail_send_to.lock().unwrap().contains(endpoint) {
            return Err(DispatchError::SendFailed {
                seqnum: device.seqnum,
                reason: "fake send failure".into(),
            });
        }
        self.sent.lock().unwrap().push((endpoint.clone(), device.clone()));
        Ok(())
    }

    fn terminate(&self, pid: Pid) {
        self.terminated.lock().unwrap().push(pid);
    }

    fn kill(&self, pid: Pid) {
        self.killed.lock().unwrap().push(pid);
    }
}

/// Records every published device instead of sending it anywhere.
#[derive(Default)]
pub struct FakeMonitorPublisher {
    pub published: Mutex<Vec<Device>>,
}

#[async_trait]
impl MonitorPublisher for FakeMonitorPublisher {
    async fn publish(&self, device: &Device) {
        self.published.lock().unwrap().push(device.clone());
    }
}

/// Rules freshness stand-in, toggled directly by tests.
#[derive(Default)]
pub struct FakeRulesFreshness {
    pub stale: Mutex<bool>,
    pub built: Mutex<bool>,
}

impl RulesFreshness for FakeRulesFreshness {
    fn is_stale(&self) -> bool {
        *self.stale.lock().unwrap()
    }

    fn mark_fresh(&self) {
        *self.stale.lock().unwrap() = false;
        *self.built.lock().unwrap() = true;
    }

    fn invalidate(&self) {
        *self.built.lock().unwrap() = false;
    }

    fn is_built(&self) -> bool {
        *self.built.lock().unwrap()
    }
}

/// In-memory devnode filesystem for the inotify-synthesizer tests (§4.7,
/// scenarios S7/S8).
#[derive(Default)]
pub struct FakeDeviceFs {
    pub reread_results: Mutex<HashMap<String, Result<bool, String>>>,
    pub children: Mutex<HashMap<String, Vec<String>>>,
    pub writes: Mutex<Vec<String>>,
}

impl DeviceFs for FakeDeviceFs {
    fn reread_partition_table(&self, devnode: &str) -> Result<bool, SynthesizeError> {
        match self.reread_results.lock().unwrap().get(devnode) {
            Some(Ok(b)) => Ok(*b),
            Some(Err(e)) => Err(SynthesizeError::RereadFailed(e.clone())),
            None => Err(SynthesizeError::RereadFailed("not configured".into())),
        }
    }

    fn partition_children(&self, disk_syspath: &str) -> Vec<String> {
        self.children
            .lock()
            .unwrap()
            .get(disk_syspath)
            .cloned()
            .unwrap_or_default()
    }

    fn write_change_trigger(&self, syspath: &str) -> Result<(), SynthesizeError> {
        self.writes.lock().unwrap().push(syspath.to_string());
        Ok(())
    }
}
