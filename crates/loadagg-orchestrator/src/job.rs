//! Job spec construction for load-test worker fleets.
//!
//! A load test materializes as one batch Job with `worker_count` identical
//! replicas. Parallelism equals completions, so the workload completes only
//! when every worker's process exits successfully.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use kube::api::ObjectMeta;

use loadagg_core::TestId;
use loadagg_store::LoadTest;

use crate::types::OrchestratorConfig;

/// Label applied to every workload; the cleanup sweep selects on it.
pub const WORKER_APP_LABEL: &str = "loadtest-worker";

/// Name of the traffic-generating container.
const WORKER_CONTAINER: &str = "loadtest-worker";

/// Derive the workload name for a test.
///
/// Never persisted; always reconstructed from the test id.
#[must_use]
pub fn job_name_for_test(test_id: &TestId) -> String {
    format!("loadtest-{test_id}")
}

/// Build the batch Job for a load test.
#[must_use]
pub fn build_job(test: &LoadTest, config: &OrchestratorConfig) -> Job {
    let workers = i32::try_from(test.config.worker_count).unwrap_or(i32::MAX);

    Job {
        metadata: build_metadata(test, config),
        spec: Some(JobSpec {
            parallelism: Some(workers),
            completions: Some(workers),
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: WORKER_CONTAINER.to_string(),
                        image: Some(config.worker_image.clone()),
                        env: Some(build_env(test)),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_metadata(test: &LoadTest, config: &OrchestratorConfig) -> ObjectMeta {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), WORKER_APP_LABEL.to_string());

    ObjectMeta {
        name: Some(job_name_for_test(&test.id)),
        namespace: Some(config.namespace.clone()),
        labels: Some(labels),
        ..Default::default()
    }
}

fn build_env(test: &LoadTest) -> Vec<EnvVar> {
    let mut env = vec![
        env_var("TEST_ID", test.id.as_str()),
        env_var("TARGET_URL", &test.target_url),
        env_var("DURATION_SECONDS", &test.config.duration_seconds.to_string()),
        env_var(
            "REQUESTS_PER_SEC",
            &test.config.requests_per_sec.to_string(),
        ),
        env_var("HTTP_METHOD", &test.config.http_method),
    ];

    if let Some(headers) = &test.config.headers {
        if !headers.is_empty() {
            if let Ok(json) = serde_json::to_string(headers) {
                env.push(env_var("HTTP_HEADERS", &json));
            }
        }
    }

    if let Some(body) = &test.config.body {
        if !body.is_empty() {
            env.push(env_var("HTTP_BODY", body));
        }
    }

    env
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}
