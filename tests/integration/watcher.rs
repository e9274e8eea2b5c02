//! File-change re-runs and coalescing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskline::core::{FnTask, Task};
use taskline::watch::{WatchBinding, Watcher};

use crate::fixtures::{read_json, wait_for, TestProject};

/// Time for the OS watch to be installed before files are touched.
const SETTLE: Duration = Duration::from_millis(300);

fn counting_task(name: &str, count: &Arc<AtomicUsize>, delay: Duration) -> Arc<dyn Task> {
    let count = count.clone();
    Arc::new(FnTask::new(name, move || {
        let count = count.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_change_reruns_only_bound_task() {
    let project = TestProject::new();
    let data_runs = Arc::new(AtomicUsize::new(0));
    let copy_runs = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let watcher = Watcher::new(
        project.root.clone(),
        vec![
            WatchBinding::new("data/*", counting_task("data", &data_runs, Duration::ZERO)).unwrap(),
            WatchBinding::new("static/**/*", counting_task("copy", &copy_runs, Duration::ZERO))
                .unwrap(),
        ],
        cancel.clone(),
    );
    let handle = tokio::spawn(async move { watcher.watch().await });
    tokio::time::sleep(SETTLE).await;

    project.write("data/readings.csv", "Paris, 18\n");

    assert!(wait_for(Duration::from_secs(5), || data_runs.load(Ordering::SeqCst) >= 1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(copy_runs.load(Ordering::SeqCst), 0);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_of_changes_is_coalesced() {
    let project = TestProject::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let watcher = Watcher::new(
        project.root.clone(),
        vec![WatchBinding::new(
            "static/**/*",
            counting_task("copy", &runs, Duration::from_millis(500)),
        )
        .unwrap()],
        cancel.clone(),
    );
    let handle = tokio::spawn(async move { watcher.watch().await });
    tokio::time::sleep(SETTLE).await;

    for i in 0..20 {
        project.write(&format!("static/burst/{}.txt", i), "x");
    }

    assert!(wait_for(Duration::from_secs(5), || runs.load(Ordering::SeqCst) >= 1).await);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let total = runs.load(Ordering::SeqCst);
    // One run for the first event, at most one follow-up for everything
    // that arrived while it was running.
    assert!((1..=2).contains(&total), "expected 1 or 2 runs, got {}", total);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watched_data_regenerates_api_artifact() {
    use taskline::pipeline::Tasks;

    let project = TestProject::new();
    let tasks = Tasks::new(project.context());
    let cancel = CancellationToken::new();
    let watcher = Watcher::new(project.root.clone(), tasks.watch_bindings().unwrap(), cancel.clone());
    let handle = tokio::spawn(async move { watcher.watch().await });
    tokio::time::sleep(SETTLE).await;

    project.write("data/readings.csv", "Tokyo, 30\n");

    let api = project.path("dist/api/readings.json");
    let regenerated = wait_for(Duration::from_secs(5), || {
        api.exists() && std::fs::read_to_string(&api).map(|s| s.contains("Tokyo")).unwrap_or(false)
    })
    .await;
    assert!(regenerated);
    assert_eq!(
        read_json(&api)["entries"][0]["temp"],
        serde_json::Value::String("30".to_string())
    );

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
