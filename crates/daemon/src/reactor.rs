// SPDX-License-Identifier: MIT

//! The event loop driver (C1, §4.1): a single-threaded `tokio::select!`
//! reactor multiplexing the uevent source, inotify, worker acks, the
//! control socket, OS signals, SIGCHLD reaping, and the timers §4.1/§4.5/§4.8
//! name, followed by the post-iteration hook.
//!
//! Control-socket handling runs at idle priority (§4.1, §5): `biased;`
//! below lists every other source ahead of the control branch, so a batch
//! of control ops is only applied after whatever device/ack/signal work
//! was also ready in the same wakeup has been drained.

use std::sync::Arc;
use std::time::Instant;

use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Interval;
use tracing::{debug, info, warn};

use ueventd_adapters::{InotifyOutcome, UeventSource};
use ueventd_core::config::{EXIT_DEADLINE, IDLE_WORKER_CLEANUP, TIMEOUT_SCAN_INTERVAL};
use ueventd_core::protocol::{ControlRequest, ControlResponse};
use ueventd_core::Pid;
use ueventd_engine::ports::{MonitorPublisher, QueueMarker, RulesFreshness, WorkerSpawner};
use ueventd_engine::{ReapOutcome, ReapedStatus};

use crate::control::{self, ControlMessage};
use crate::lifecycle::Daemon;
use crate::logging::LogController;
use crate::notify;

/// How [`run`] concluded, for `main.rs` to map to a process exit code (§7
/// "Exit deadline expired: the loop terminates with ETIMEDOUT").
pub enum ExitOutcome {
    Clean,
    TimedOut,
}

/// Drive the reactor to completion. Takes `daemon` by value per
/// [`Daemon`]'s doc comment, and runs [`Daemon::shutdown`] itself once the
/// loop exits, so the caller only needs to map the returned outcome to an
/// exit code.
pub async fn run(mut daemon: Daemon, log_controller: LogController) -> ExitOutcome {
    let (ctrl_tx, mut ctrl_rx) = mpsc::channel::<ControlMessage>(32);
    tokio::spawn(control::run(Arc::clone(&daemon.control_listener), ctrl_tx));

    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            return ExitOutcome::TimedOut;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return ExitOutcome::TimedOut;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGHUP handler");
            return ExitOutcome::TimedOut;
        }
    };
    let mut sigchld = match signal(SignalKind::from_raw(Signal::SIGCHLD as i32)) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGCHLD handler");
            return ExitOutcome::TimedOut;
        }
    };

    let mut timeout_scan = tokio::time::interval(TIMEOUT_SCAN_INTERVAL);
    let mut watchdog_tick: Option<Interval> = notify::watchdog_interval().map(tokio::time::interval);

    let mut idle_deadline: Option<tokio::time::Instant> = None;
    let mut exit_deadline: Option<tokio::time::Instant> = None;
    let mut pending_exit_reply: Option<oneshot::Sender<ControlResponse>> = None;
    let mut ctrl_channel_open = true;
    let mut inotify_open = true;

    notify::ready();

    let outcome = 'reactor: loop {
        tokio::select! {
            biased;

            _ = daemon.uevent_source.readable() => {
                for dev in daemon.uevent_source.drain() {
                    debug!(seqnum = dev.seqnum.0, devpath = %dev.devpath, "enqueued uevent");
                    daemon.manager.enqueue_device(dev, &daemon.queue_marker);
                }
                dispatch_now(&mut daemon).await;
            }

            outcome = daemon.inotify.next_outcome(), if inotify_open => {
                match outcome {
                    Some(InotifyOutcome::CloseWrite(watched)) => {
                        if let Err(e) = daemon.manager.synthesize_change(&watched, &daemon.device_fs) {
                            warn!(error = %e, sysname = %watched.sysname, "inotify synthesizer failed");
                        }
                    }
                    Some(InotifyOutcome::Ignored(wd)) => daemon.inotify.forget(&wd),
                    None => {
                        warn!("inotify event stream ended");
                        inotify_open = false;
                    }
                }
            }

            _ = daemon.ack_receiver.readable() => {
                drain_acks(&mut daemon).await;
                dispatch_now(&mut daemon).await;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, beginning graceful shutdown");
                begin_shutdown(&mut daemon, &mut exit_deadline);
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, beginning graceful shutdown");
                begin_shutdown(&mut daemon, &mut exit_deadline);
            }

            _ = sighup.recv() => {
                info!("received SIGHUP, reloading");
                daemon.manager.reload(&daemon.rules_freshness, &daemon.worker_spawner);
                notify::ready();
                dispatch_now(&mut daemon).await;
            }

            _ = sigchld.recv() => {
                reap_children(&mut daemon).await;
                dispatch_now(&mut daemon).await;
            }

            _ = timeout_scan.tick() => {
                let report = daemon.manager.check_timeouts(&daemon.worker_spawner, Instant::now());
                for seqnum in report.warned {
                    warn!(seqnum = seqnum.0, "event exceeded timeout/3, worker still running");
                }
                for seqnum in report.killed {
                    warn!(seqnum = seqnum.0, "event exceeded timeout, worker killed");
                }
            }

            _ = sleep_until_opt(idle_deadline) => {
                daemon.manager.terminate_idle_workers(&daemon.worker_spawner);
                idle_deadline = None;
            }

            _ = sleep_until_opt(exit_deadline) => {
                warn!("exit deadline expired with workers still outstanding");
                break 'reactor ExitOutcome::TimedOut;
            }

            _ = tick_opt(&mut watchdog_tick) => {
                notify::watchdog_ping();
            }

            msg = ctrl_rx.recv(), if ctrl_channel_open => {
                match msg {
                    Some(msg) => {
                        apply_control_batch(&mut daemon, &log_controller, &mut exit_deadline, &mut pending_exit_reply, msg).await;
                        dispatch_now(&mut daemon).await;
                    }
                    None => {
                        warn!("control accept loop ended");
                        ctrl_channel_open = false;
                    }
                }
            }
        }

        // §4.1 post-iteration hook.
        if !daemon.manager.queue.is_empty() {
            idle_deadline = None;
        } else if !daemon.manager.pool.is_empty() {
            if idle_deadline.is_none() {
                idle_deadline = Some(tokio::time::Instant::now() + IDLE_WORKER_CLEANUP);
            }
        } else if daemon.manager.exit {
            if let Some(reply) = pending_exit_reply.take() {
                let _ = reply.send(ControlResponse::ExitAcknowledged);
            }
            break 'reactor ExitOutcome::Clean;
        }
    };

    daemon.shutdown();
    outcome
}

fn begin_shutdown(daemon: &mut Daemon, exit_deadline: &mut Option<tokio::time::Instant>) {
    if daemon.manager.exit {
        return;
    }
    daemon.manager.begin_graceful_shutdown(&daemon.worker_spawner, &daemon.queue_marker);
    *exit_deadline = Some(tokio::time::Instant::now() + EXIT_DEADLINE);
}

/// Drain every pending worker ack (§5: "recvmsg uses MSG_DONTWAIT and loops
/// until EAGAIN"), dropping malformed or untracked-sender acks per §7/§8
/// property 9 without mutating worker state.
async fn drain_acks(daemon: &mut Daemon) {
    loop {
        match daemon.ack_receiver.try_recv() {
            Ok(Some(ack)) => {
                if daemon.manager.pool.get(ack.sender_pid).is_some() {
                    if let Some(seqnum) = daemon.manager.handle_ack(ack.sender_pid, &daemon.queue_marker) {
                        debug!(seqnum = seqnum.0, pid = ack.sender_pid.0, "worker acked");
                    }
                } else {
                    warn!(pid = ack.sender_pid.0, "dropping ack from untracked pid");
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to receive worker ack");
                break;
            }
        }
    }
}

/// SIGCHLD handler (§4.4): repeatedly `waitpid(-1, WNOHANG)` until no more
/// state changes are pending, feeding each reaped pid through the failure
/// fan-out in [`ueventd_engine::Manager::reap`].
async fn reap_children(daemon: &mut Daemon) {
    loop {
        let status = match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => status,
            Err(nix::Error::ECHILD) => break,
            Err(e) => {
                warn!(error = %e, "waitpid failed");
                break;
            }
        };
        let Some((raw_pid, reaped)) = classify(status) else {
            break;
        };
        let pid = Pid(raw_pid);
        let result = daemon
            .manager
            .reap(pid, reaped, &daemon.monitor_publisher, &daemon.queue_marker)
            .await;
        if matches!(result.outcome, ReapOutcome::Failed) {
            warn!(pid = pid.0, "worker exited abnormally with an event attached");
        }
    }
}

fn classify(status: WaitStatus) -> Option<(i32, ReapedStatus)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid.as_raw(), ReapedStatus::Exited(code))),
        WaitStatus::Signaled(pid, sig, _) => Some((pid.as_raw(), ReapedStatus::Signalled(sig as i32))),
        WaitStatus::Stopped(pid, _) => Some((pid.as_raw(), ReapedStatus::StoppedOrContinued)),
        WaitStatus::Continued(pid) => Some((pid.as_raw(), ReapedStatus::StoppedOrContinued)),
        _ => None,
    }
}

/// Apply one control-message batch (§4.6). `EXIT` is special: it doesn't
/// reply immediately — `reply` is stashed in `pending_exit_reply` and sent
/// only once the manager goes quiescent, per "hold the originating
/// connection open as an acknowledgment the client blocks on".
async fn apply_control_batch(
    daemon: &mut Daemon,
    log_controller: &LogController,
    exit_deadline: &mut Option<tokio::time::Instant>,
    pending_exit_reply: &mut Option<oneshot::Sender<ControlResponse>>,
    msg: ControlMessage,
) {
    let ControlMessage { ops, reply } = msg;
    let mut response = ControlResponse::Ok;
    let mut exit_requested = false;

    for op in ops {
        match op {
            ControlRequest::SetLogLevel(level) => {
                log_controller.set_level(level);
                daemon.manager.restart_workers_for_config_change(&daemon.worker_spawner);
            }
            ControlRequest::StopExecQueue => daemon.manager.stop_exec_queue = true,
            ControlRequest::StartExecQueue => daemon.manager.stop_exec_queue = false,
            ControlRequest::Reload => {
                daemon.manager.reload(&daemon.rules_freshness, &daemon.worker_spawner);
                notify::ready();
            }
            ControlRequest::SetEnv { key, value } => {
                daemon.manager.set_env(key, value, &daemon.worker_spawner);
            }
            ControlRequest::SetChildrenMax(n) => {
                daemon.manager.pool.set_children_max(n);
                notify::ready();
            }
            ControlRequest::Ping => response = ControlResponse::Pong,
            ControlRequest::Exit => exit_requested = true,
        }
    }

    if exit_requested {
        info!("received EXIT, beginning graceful shutdown");
        begin_shutdown(daemon, exit_deadline);
        *pending_exit_reply = Some(reply);
        return;
    }

    let _ = reply.send(response);
}

async fn dispatch_now(daemon: &mut Daemon) {
    let now = Instant::now();
    let report = daemon
        .manager
        .dispatch(&daemon.rules_freshness, &daemon.worker_spawner, now)
        .await;
    if report.reloaded {
        info!("rules database was stale; invalidated before dispatch");
    }
    for seqnum in &report.dispatched {
        debug!(seqnum = seqnum.0, "dispatched queued event to a worker");
    }
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn tick_opt(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending().await,
    }
}
