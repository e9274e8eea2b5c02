//! Development pipeline startup and shutdown.

#![cfg(unix)]

use std::net::TcpListener;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskline::{pipeline, Pipeline};

use crate::fixtures::{process_alive, wait_for, TestProject, FAKE_DEV_SERVER};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_serve_prepares_spawns_and_stops_on_cancel() {
    let project = TestProject::new();
    project.write("dist/kept.txt", "incremental output");

    let held = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let busy = held.local_addr().unwrap().port();
    let mut config = project.config();
    config.serve.port_start = busy;
    config.serve.port_end = busy.saturating_add(50);
    let ctx = project.context_with(config, "development");

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(pipeline::run(ctx, Pipeline::Serve, cancel.clone()));

    let args_path = project.path("bundler-args.txt");
    assert!(wait_for(Duration::from_secs(5), || args_path.exists()).await);

    let args = project.read("bundler-args.txt");
    assert!(args.starts_with("serve "));
    let port: u16 = args
        .split_whitespace()
        .skip_while(|a| *a != "--port")
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap();
    assert_ne!(port, busy);

    // Serve never cleans.
    assert!(project.path("dist/kept.txt").exists());
    assert!(project.path("dist/api/readings.json").exists());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("serve pipeline did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_serve_survives_exhausted_port_range_and_stops_server() {
    let project = TestProject::new();
    project.write("server.sh", FAKE_DEV_SERVER);

    let held = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let busy = held.local_addr().unwrap().port();
    let mut config = project.config();
    config.bundler.script = Some("server.sh".into());
    config.serve.port_start = busy;
    config.serve.port_end = busy;
    let ctx = project.context_with(config, "development");

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(pipeline::run(ctx, Pipeline::Serve, cancel.clone()));

    let pid_path = project.path("server.pid");
    assert!(
        wait_for(Duration::from_secs(5), || {
            std::fs::read_to_string(&pid_path)
                .map(|pid| !pid.trim().is_empty())
                .unwrap_or(false)
        })
        .await
    );
    let pid = project.read("server.pid").trim().to_string();

    // No free port is logged, not fatal: the pipeline keeps serving.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished(), "serve pipeline ended before cancel");
    assert!(process_alive(&pid));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("serve pipeline did not stop")
        .unwrap()
        .unwrap();

    assert!(
        wait_for(Duration::from_secs(5), || !process_alive(&pid)).await,
        "dev server {} outlived the pipeline",
        pid
    );
}
