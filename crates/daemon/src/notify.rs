// SPDX-License-Identifier: MIT

//! systemd's notify protocol (`sd_notify(3)`): a handful of `KEY=VALUE`
//! lines sent as a single datagram to the socket named by `$NOTIFY_SOCKET`.
//! A three-line wire protocol is not worth pulling in a dependency for, so
//! this is hand-rolled.

use std::os::unix::net::UnixDatagram;
use std::time::Duration;

use tracing::warn;

/// Send one or more `KEY=VALUE` lines to the supervisor, if `$NOTIFY_SOCKET`
/// is set (i.e. we were started under systemd). A no-op otherwise.
pub fn notify(state: &str) {
    let Ok(path) = std::env::var("NOTIFY_SOCKET") else {
        return;
    };
    let Ok(socket) = UnixDatagram::unbound() else {
        return;
    };
    let addr = if let Some(abstract_name) = path.strip_prefix('@') {
        std::path::PathBuf::from(format!("\0{abstract_name}"))
    } else {
        std::path::PathBuf::from(&path)
    };
    if let Err(e) = socket.send_to(state.as_bytes(), &addr) {
        warn!(error = %e, "failed to notify supervisor");
    }
}

pub fn ready() {
    notify("READY=1");
}

pub fn reloading() {
    notify("RELOADING=1");
}

pub fn stopping() {
    notify("STOPPING=1");
}

pub fn status(msg: &str) {
    notify(&format!("STATUS={msg}"));
}

/// Parse `$WATCHDOG_USEC` into a heartbeat interval: systemd expects a
/// `WATCHDOG=1` ping at least every `WATCHDOG_USEC`; we halve it for
/// margin, matching the conventional sd_notify client pattern.
pub fn watchdog_interval() -> Option<Duration> {
    let usec: u64 = std::env::var("WATCHDOG_USEC").ok()?.parse().ok()?;
    if usec == 0 {
        return None;
    }
    Some(Duration::from_micros(usec) / 2)
}

pub fn watchdog_ping() {
    notify("WATCHDOG=1");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_interval_is_half_of_usec() {
        std::env::set_var("WATCHDOG_USEC", "2000000");
        assert_eq!(watchdog_interval(), Some(Duration::from_secs(1)));
        std::env::remove_var("WATCHDOG_USEC");
    }

    #[test]
    fn watchdog_interval_absent_without_env() {
        std::env::remove_var("WATCHDOG_USEC");
        assert_eq!(watchdog_interval(), None);
    }
}
