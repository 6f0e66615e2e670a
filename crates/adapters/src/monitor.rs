// SPDX-License-Identifier: MIT

//! Real `MonitorPublisher`: republishes a device on the main monitor
//! socket for local subscribers (§4.4 failure fan-out, §6 "Outbound
//! monitor"). The netlink framing itself is the external "monitor"
//! transport spec.md excludes from the core; this adapter only needs a
//! unicast/multicast `UnixDatagram` send, matching the worker-hand-off
//! transport this workspace substitutes for raw netlink (SPEC_FULL.md §5).

use async_trait::async_trait;
use tokio::net::UnixDatagram;
use tracing::warn;

use ueventd_core::Device;
use ueventd_engine::ports::MonitorPublisher;

pub struct RealMonitorPublisher {
    socket_path: String,
}

impl RealMonitorPublisher {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }
}

#[async_trait]
impl MonitorPublisher for RealMonitorPublisher {
    async fn publish(&self, device: &Device) {
        let payload = match serde_json::to_vec(device) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to serialize device for republish");
                return;
            }
        };

        let socket = match UnixDatagram::unbound() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to open monitor republish socket");
                return;
            }
        };

        if let Err(e) = socket.send_to(&payload, &self.socket_path).await {
            warn!(
                error = %e,
                socket_path = %self.socket_path,
                "failed to republish device on main monitor"
            );
        }
    }
}
