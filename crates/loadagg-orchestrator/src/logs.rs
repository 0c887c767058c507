//! Per-pod log streaming with follow, reconnect, and terminal draining.
//!
//! One stream serves one pod; callers compose streams for multi-pod views.
//! The producer loops over the pod's phase until cancelled: running pods
//! are followed live with reconnection, terminated pods get their final
//! tail drained once, and everything else waits and re-checks.

use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::driver::K8sDriver;
use crate::error::Result;

/// Bounded capacity of a log stream; a slow consumer blocks the producer.
const LOG_BUFFER: usize = 50;
/// Lines replayed when draining a terminated pod.
const FINAL_TAIL_LINES: i64 = 50;
/// Delay before reopening a dropped follow stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// Delay between phase checks for pods that are not running yet.
const WAIT_DELAY: Duration = Duration::from_secs(5);

pub(crate) fn spawn(
    driver: K8sDriver,
    pod_name: String,
    cancel: CancellationToken,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LOG_BUFFER);
    tokio::spawn(async move {
        run(&driver, &pod_name, &cancel, &tx).await;
    });
    rx
}

async fn run(
    driver: &K8sDriver,
    pod_name: &str,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<String>,
) {
    let pods = driver.pods_api();

    loop {
        if cancel.is_cancelled() {
            return;
        }

        // An unreadable pod is fatal for this stream.
        let pod = match pods.get(pod_name).await {
            Ok(pod) => pod,
            Err(e) => {
                send(tx, cancel, format!("Error getting pod {pod_name}: {e}")).await;
                return;
            }
        };

        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        match phase.as_str() {
            "Succeeded" | "Failed" => {
                if !send(
                    tx,
                    cancel,
                    format!("Pod {pod_name} is {phase}, streaming final logs..."),
                )
                .await
                {
                    return;
                }
                drain_final(&pods, pod_name, cancel, tx).await;
                send(
                    tx,
                    cancel,
                    format!("Pod {pod_name} completed, closing stream"),
                )
                .await;
                return;
            }
            "Running" => {
                if let Err(e) = follow_once(&pods, pod_name, cancel, tx).await {
                    if !send(
                        tx,
                        cancel,
                        format!("Stream disconnected: {e}, reconnecting in 3s..."),
                    )
                    .await
                    {
                        return;
                    }
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = sleep(RECONNECT_DELAY) => {}
                    }
                }
                // A clean EOF falls through to re-read the phase: the pod
                // may have reached a terminal state while being followed.
            }
            _ => {
                if !send(
                    tx,
                    cancel,
                    format!("Pod {pod_name} is in {phase} state, waiting..."),
                )
                .await
                {
                    return;
                }
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = sleep(WAIT_DELAY) => {}
                }
            }
        }
    }
}

/// Send one line, racing cancellation. Returns false when the stream is done.
async fn send(tx: &mpsc::Sender<String>, cancel: &CancellationToken, line: String) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        sent = tx.send(line) => sent.is_ok(),
    }
}

/// Follow the pod's log from now on, forwarding every line.
///
/// `tail_lines = 0` means historical lines are not replayed on reconnect;
/// gaps across a disconnect are accepted over duplicates.
async fn follow_once(
    pods: &Api<Pod>,
    pod_name: &str,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<String>,
) -> Result<()> {
    let params = LogParams {
        follow: true,
        tail_lines: Some(0),
        ..LogParams::default()
    };
    let mut lines = pods.log_stream(pod_name, &params).await?.lines();

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            next = lines.try_next() => match next {
                Ok(Some(line)) => {
                    if !send(tx, cancel, line).await {
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Replay the last lines of a terminated pod, no follow.
async fn drain_final(
    pods: &Api<Pod>,
    pod_name: &str,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<String>,
) {
    let params = LogParams {
        tail_lines: Some(FINAL_TAIL_LINES),
        ..LogParams::default()
    };

    let text = match pods.logs(pod_name, &params).await {
        Ok(text) => text,
        Err(e) => {
            send(tx, cancel, format!("Failed to get final logs: {e}")).await;
            return;
        }
    };

    for line in text.lines() {
        if !send(tx, cancel, line.to_string()).await {
            return;
        }
    }
}
