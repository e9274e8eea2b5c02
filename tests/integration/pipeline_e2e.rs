//! Production and clean pipelines end to end.

#![cfg(unix)]

use serde_json::json;
use tokio_util::sync::CancellationToken;

use taskline::{pipeline, Error, Pipeline};

use crate::fixtures::{read_json, TestProject};

#[tokio::test]
async fn test_default_pipeline_produces_artifacts() {
    let project = TestProject::new();

    pipeline::run(project.context(), Pipeline::Default, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        read_json(&project.path("dist/api/readings.json")),
        json!({"entries": [{"city": "NYC", "temp": "72"}, {"city": "LA", "temp": "85"}]})
    );

    let time = read_json(&project.path("app/scripts/time.json"));
    assert!(time["time"].as_i64().unwrap() > 0);
    assert_eq!(time["foo"], "bar");

    assert_eq!(project.read("dist/robots.txt"), "User-agent: *\n");
    assert_eq!(
        project.read("dist/meta/default-meta-image.png"),
        "png-bytes"
    );
    assert_eq!(project.read("dist/index.html").trim(), "<html>production</html>");

    let args = project.read("bundler-args.txt");
    assert!(args.starts_with("build "));
    assert!(args.contains("app/index.html --config"));
    assert!(!args.contains("--port"));
}

#[tokio::test]
async fn test_default_pipeline_cleans_stale_output() {
    let project = TestProject::new();
    project.write("dist/stale.txt", "old build");
    project.write(".parcel-cache/entry", "cached");

    pipeline::run(project.context(), Pipeline::Default, CancellationToken::new())
        .await
        .unwrap();

    assert!(!project.path("dist/stale.txt").exists());
    assert!(!project.path(".parcel-cache").exists());
    assert!(project.path("dist/index.html").exists());
}

#[tokio::test]
async fn test_missing_data_stops_before_bundling() {
    let project = TestProject::new();
    std::fs::remove_file(project.path("data/readings.csv")).unwrap();

    let err = pipeline::run(project.context(), Pipeline::Default, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Read { .. }));
    assert!(!project.path("bundler-args.txt").exists());
}

#[tokio::test]
async fn test_bundler_failure_fails_pipeline() {
    let project = TestProject::new();
    project.write("bundle.sh", "#!/bin/sh\nexit 4\n");

    let err = pipeline::run(project.context(), Pipeline::Default, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BundlerExit { code: Some(4), .. }));
    // Data preparation still ran before the bundler.
    assert!(project.path("dist/api/readings.json").exists());
}

#[tokio::test]
async fn test_clean_pipeline_is_idempotent() {
    let project = TestProject::new();
    project.write("dist/index.html", "<html></html>");

    for _ in 0..2 {
        pipeline::run(project.context(), Pipeline::Clean, CancellationToken::new())
            .await
            .unwrap();
    }

    assert!(!project.path("dist").exists());
    assert!(project.path("static/robots.txt").exists());
}
