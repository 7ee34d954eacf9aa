use std::{sync::Arc, time::Duration};

use lexio::{JobManager, ReleaseCheckJob, ReleaseEvent};
use lexio_e2e::{init_tracing, serve_json};
use tokio::{sync::mpsc, time::timeout};

const EVENT_WAIT: Duration = Duration::from_secs(5);

async fn run_check(endpoint: String, current: &str) -> Option<ReleaseEvent> {
    init_tracing();
    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = ReleaseCheckJob::new_with_endpoint(
        reqwest::Client::new(),
        endpoint,
        current,
        events_send,
    );

    let (manager, mut manager_events) = JobManager::new();
    manager.start(Arc::new(job)).await;
    timeout(EVENT_WAIT, manager_events.recv())
        .await
        .unwrap()
        .unwrap();
    manager.destroy().await;

    events.try_recv().ok()
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_newer_versions_trimmed() {
    let url = serve_json(r#"{"tag_name": "v1.1.0 ", "body": "fixes\n"}"#).await;
    let event = run_check(url, "v1.0.0").await.unwrap();
    assert_eq!(event.version, "v1.1.0");
    assert_eq!(event.changelog, "fixes");
}

#[tokio::test(flavor = "multi_thread")]
async fn quiet_on_the_current_version() {
    let url = serve_json(r#"{"tag_name": "v1.0.0", "body": "notes"}"#).await;
    assert!(run_check(url, "v1.0.0").await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn swallows_endpoint_failures() {
    // Nothing listens on port 1; the check must log and finish anyway.
    let event = run_check("http://127.0.0.1:1/latest".to_string(), "v1.0.0").await;
    assert!(event.is_none());
}
