//! Metric-frame extraction and cross-worker aggregation.
//!
//! Workers print JSON metric frames on stdout behind a `METRICS:` sentinel.
//! Sampling a test means: list its pods, pull each pod's log tail, decode
//! the newest frame, and reduce the frames into one snapshot. The
//! requests-per-second figure always comes from the workload's own wall
//! clock, never from worker-reported values.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use loadagg_core::TestId;

use crate::driver::{K8sDriver, WorkloadDriver};
use crate::job::job_name_for_test;
use crate::types::{AggregatedMetrics, LoadTestMetrics, MetricsSnapshot, WorkerMetrics};
use crate::Result;

/// Sentinel preceding a metric frame in worker stdout.
const METRICS_SENTINEL: &str = "METRICS:";
/// Lines fetched per pod when sampling metrics.
const METRICS_TAIL_LINES: i64 = 100;
/// Interval between snapshots on a metrics stream.
const STREAM_INTERVAL: Duration = Duration::from_secs(5);
/// Buffered snapshots on a metrics stream.
const STREAM_BUFFER: usize = 10;

pub(crate) async fn collect(driver: &K8sDriver, test_id: &TestId) -> Result<MetricsSnapshot> {
    let pods = driver.pods_api();
    let selector = format!("job-name={}", job_name_for_test(test_id));
    let list = pods.list(&ListParams::default().labels(&selector)).await?;

    let mut frames = Vec::new();
    for pod in list.items {
        let Some(pod_name) = pod.metadata.name.clone() else {
            continue;
        };
        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown");
        if phase != "Running" && phase != "Succeeded" {
            continue;
        }

        match extract_from_pod(&pods, &pod_name).await {
            Ok(Some(frame)) => frames.push((pod_name, frame)),
            Ok(None) => debug!(pod_name, "No metric frame in pod log tail"),
            Err(e) => warn!(pod_name, error = %e, "Failed to get metrics from pod"),
        }
    }

    let elapsed = job_elapsed_seconds(driver, test_id).await;
    let (workers, summary) = summarize(frames, elapsed);

    Ok(MetricsSnapshot {
        test_id: test_id.clone(),
        timestamp: Utc::now(),
        workers,
        summary,
    })
}

/// Elapsed wall time of the workload in seconds.
///
/// Runs from the workload's start time to its terminal condition's
/// transition time, or to now while it is still active. Zero when the
/// workload cannot be read or has not started.
async fn job_elapsed_seconds(driver: &K8sDriver, test_id: &TestId) -> f64 {
    let jobs = driver.jobs_api();
    let name = job_name_for_test(test_id);

    let Ok(Some(job)) = jobs.get_opt(&name).await else {
        return 0.0;
    };
    let Some(status) = job.status else {
        return 0.0;
    };
    let Some(start) = status.start_time.map(|t| t.0) else {
        return 0.0;
    };

    let end = status
        .conditions
        .unwrap_or_default()
        .into_iter()
        .find(|c| (c.type_ == "Complete" || c.type_ == "Failed") && c.status == "True")
        .and_then(|c| c.last_transition_time)
        .map_or_else(Utc::now, |t| t.0);

    #[allow(clippy::cast_precision_loss)]
    let elapsed = (end - start).num_milliseconds().max(0) as f64 / 1000.0;
    elapsed
}

/// Fetch a pod's log tail and return its newest metric frame.
async fn extract_from_pod(pods: &Api<Pod>, pod_name: &str) -> Result<Option<LoadTestMetrics>> {
    let params = LogParams {
        tail_lines: Some(METRICS_TAIL_LINES),
        ..LogParams::default()
    };
    let text = pods.logs(pod_name, &params).await?;
    Ok(last_metric_frame(&text))
}

/// Scan log text for `METRICS:`-delimited JSON frames and decode the last one.
///
/// A frame begins at the first `{` after the sentinel and ends where brace
/// depth returns to zero, so pretty-printed JSON spanning multiple lines is
/// handled. The scanner is not escape-aware: workers must not emit
/// unbalanced braces inside string literals. Frames that fail to decode are
/// logged and skipped. Returns `None` when no frame decodes; per-worker
/// counters are monotonic within a run, so the last frame wins.
#[must_use]
pub fn last_metric_frame(text: &str) -> Option<LoadTestMetrics> {
    let mut last = None;
    let mut capturing = false;
    let mut depth = 0i64;
    let mut buffer = String::new();

    for line in text.lines() {
        if let Some(idx) = line.find(METRICS_SENTINEL) {
            let rest = &line[idx + METRICS_SENTINEL.len()..];
            if let Some(brace) = rest.find('{') {
                capturing = true;
                buffer.clear();
                buffer.push_str(&rest[brace..]);
                buffer.push('\n');
                depth = brace_delta(&rest[brace..]);
                if depth == 0 {
                    decode_frame(&buffer, &mut last);
                    capturing = false;
                }
            }
            continue;
        }

        if capturing {
            buffer.push_str(line);
            buffer.push('\n');
            depth += brace_delta(line);
            if depth <= 0 {
                decode_frame(&buffer, &mut last);
                capturing = false;
            }
        }
    }

    last
}

fn brace_delta(s: &str) -> i64 {
    s.chars()
        .map(|c| match c {
            '{' => 1,
            '}' => -1,
            _ => 0,
        })
        .sum()
}

fn decode_frame(buffer: &str, last: &mut Option<LoadTestMetrics>) {
    match serde_json::from_str::<LoadTestMetrics>(buffer) {
        Ok(frame) => *last = Some(frame),
        Err(e) => warn!(error = %e, "Failed to parse metrics frame, discarding"),
    }
}

/// Reduce per-worker frames into the snapshot's worker list and summary.
#[allow(clippy::cast_precision_loss)]
fn summarize(
    frames: Vec<(String, LoadTestMetrics)>,
    elapsed_seconds: f64,
) -> (Vec<WorkerMetrics>, AggregatedMetrics) {
    let mut workers = Vec::with_capacity(frames.len());
    let mut total_requests = 0i64;
    let mut successful_requests = 0i64;
    let mut failed_requests = 0i64;
    let mut weighted_response_time = 0f64;
    let mut status_code_breakdown = BTreeMap::new();

    for (pod_name, frame) in frames {
        total_requests += frame.total_requests;
        successful_requests += frame.successful_requests;
        failed_requests += frame.failed_requests;
        weighted_response_time += frame.avg_response_time * frame.total_requests as f64;

        for (code, count) in &frame.status_codes {
            *status_code_breakdown.entry(code.clone()).or_insert(0) += count;
        }

        workers.push(WorkerMetrics {
            worker_id: pod_name.clone(),
            pod_name,
            total_requests: frame.total_requests,
            successful_requests: frame.successful_requests,
            failed_requests: frame.failed_requests,
            avg_response_time: frame.avg_response_time,
            last_update: frame.timestamp,
        });
    }

    let avg_response_time = if total_requests > 0 {
        weighted_response_time / total_requests as f64
    } else {
        0.0
    };
    let overall_error_rate = if total_requests > 0 {
        failed_requests as f64 / total_requests as f64 * 100.0
    } else {
        0.0
    };
    let requests_per_second = if elapsed_seconds > 0.0 {
        total_requests as f64 / elapsed_seconds
    } else {
        0.0
    };

    let active_workers = workers.len();
    let summary = AggregatedMetrics {
        total_requests,
        successful_requests,
        failed_requests,
        overall_error_rate,
        avg_response_time,
        requests_per_second,
        status_code_breakdown,
        active_workers,
    };

    (workers, summary)
}

/// Periodically aggregate metrics for a test, forwarding one snapshot per
/// tick.
///
/// Aggregation errors are logged and the ticker continues. The stream ends
/// on cancel or when the consumer goes away.
pub fn stream_metrics<D>(
    driver: Arc<D>,
    test_id: TestId,
    cancel: CancellationToken,
) -> mpsc::Receiver<MetricsSnapshot>
where
    D: WorkloadDriver + 'static,
{
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STREAM_INTERVAL);
        // The first interval tick fires immediately; skip it so snapshots
        // are spaced one full period apart.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let snapshot = match driver.metrics(&test_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(test_id = %test_id, error = %e, "Failed to aggregate metrics");
                    continue;
                }
            };

            tokio::select! {
                () = cancel.cancelled() => return,
                sent = tx.send(snapshot) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;

    #[test]
    fn extracts_single_line_frame() {
        let logs = "worker starting\nMETRICS: {\"total_requests\": 10, \"successful_requests\": 9, \"failed_requests\": 1, \"avg_response_time\": 0.2}\ndone\n";
        let frame = last_metric_frame(logs).unwrap();
        assert_eq!(frame.total_requests, 10);
        assert_eq!(frame.failed_requests, 1);
    }

    #[test]
    fn extracts_multi_line_frame() {
        let logs = concat!(
            "METRICS: {\n",
            "  \"total_requests\": 100,\n",
            "  \"successful_requests\": 90,\n",
            "  \"failed_requests\": 10,\n",
            "  \"avg_response_time\": 0.25,\n",
            "  \"status_codes\": {\n",
            "    \"200\": 90,\n",
            "    \"500\": 10\n",
            "  }\n",
            "}\n",
        );
        let frame = last_metric_frame(logs).unwrap();
        assert_eq!(frame.total_requests, 100);
        assert_eq!(frame.status_codes.get("200"), Some(&90));
        assert_eq!(frame.status_codes.get("500"), Some(&10));
    }

    #[test]
    fn later_frame_wins() {
        let logs = concat!(
            "METRICS: {\"total_requests\": 5, \"successful_requests\": 5, \"failed_requests\": 0, \"avg_response_time\": 0.1}\n",
            "some noise between frames\n",
            "METRICS: {\"total_requests\": 50, \"successful_requests\": 48, \"failed_requests\": 2, \"avg_response_time\": 0.15}\n",
        );
        let frame = last_metric_frame(logs).unwrap();
        assert_eq!(frame.total_requests, 50);
    }

    #[test]
    fn unbalanced_frame_is_rejected() {
        let logs = "METRICS: {\n  \"total_requests\": 1,\n  \"nested\": {\n";
        assert!(last_metric_frame(logs).is_none());
    }

    #[test]
    fn undecodable_frame_is_skipped_but_earlier_valid_frame_survives() {
        let logs = concat!(
            "METRICS: {\"total_requests\": 7, \"successful_requests\": 7, \"failed_requests\": 0, \"avg_response_time\": 0.3}\n",
            "METRICS: {\"this is\": \"not a metrics frame\"}\n",
        );
        let frame = last_metric_frame(logs).unwrap();
        assert_eq!(frame.total_requests, 7);
    }

    #[test]
    fn no_sentinel_means_no_frame() {
        assert!(last_metric_frame("just ordinary log output\n{\"not\": \"a frame\"}\n").is_none());
    }

    fn frame(total: i64, successful: i64, failed: i64, avg: f64) -> LoadTestMetrics {
        LoadTestMetrics {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            avg_response_time: avg,
            status_codes: BTreeMap::new(),
            timestamp: None,
        }
    }

    #[test]
    fn summarize_two_workers() {
        let mut a = frame(100, 90, 10, 0.2);
        a.status_codes.insert("200".to_string(), 90);
        a.status_codes.insert("500".to_string(), 10);
        let mut b = frame(200, 200, 0, 0.1);
        b.status_codes.insert("200".to_string(), 200);

        let (workers, summary) =
            summarize(vec![("pod-a".to_string(), a), ("pod-b".to_string(), b)], 10.0);

        assert_eq!(workers.len(), 2);
        assert_eq!(summary.total_requests, 300);
        assert_eq!(summary.successful_requests, 290);
        assert_eq!(summary.failed_requests, 10);
        assert!((summary.overall_error_rate - 10.0 / 300.0 * 100.0).abs() < 1e-9);
        assert!((summary.avg_response_time - (0.2 * 100.0 + 0.1 * 200.0) / 300.0).abs() < 1e-9);
        assert!((summary.requests_per_second - 30.0).abs() < 1e-9);
        assert_eq!(summary.status_code_breakdown.get("200"), Some(&290));
        assert_eq!(summary.status_code_breakdown.get("500"), Some(&10));
        assert_eq!(summary.active_workers, 2);
    }

    #[test]
    fn summarize_empty_is_all_zeroes() {
        let (workers, summary) = summarize(Vec::new(), 10.0);
        assert!(workers.is_empty());
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.overall_error_rate, 0.0);
        assert_eq!(summary.avg_response_time, 0.0);
        assert_eq!(summary.requests_per_second, 0.0);
    }

    #[test]
    fn summarize_zero_elapsed_means_zero_rps() {
        let (_, summary) = summarize(vec![("pod-a".to_string(), frame(10, 10, 0, 0.1))], 0.0);
        assert_eq!(summary.requests_per_second, 0.0);
        assert_eq!(summary.total_requests, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_forwards_snapshots_until_cancelled() {
        let driver = Arc::new(MockDriver::new());
        let test_id = loadagg_core::TestId::parse("test-1").unwrap();
        let mut snapshot = MetricsSnapshot::empty(test_id.clone());
        snapshot.summary.total_requests = 42;
        driver.set_snapshot(test_id.clone(), snapshot);

        let cancel = CancellationToken::new();
        let mut rx = stream_metrics(Arc::clone(&driver), test_id, cancel.clone());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.summary.total_requests, 42);

        cancel.cancel();
        // Drain whatever was already buffered; the channel must then close.
        while rx.recv().await.is_some() {}
    }
}
