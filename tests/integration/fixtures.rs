//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating a temporary front-end project
//! - A fake bundler script that records how it was called
//! - Polling for files written by background tasks

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use taskline::config::{BuildEnv, Config};
use taskline::Context;

/// Fake bundler: refuses to run before the time file exists (the front end
/// imports it), then records its arguments and writes an HTML artifact.
pub const FAKE_BUNDLER: &str = r#"#!/bin/sh
test -f app/scripts/time.json || exit 3
echo "$@" > bundler-args.txt
mkdir -p dist
echo "<html>$NODE_ENV</html>" > dist/index.html
"#;

/// Long-running fake dev server: records its pid, then stays up.
pub const FAKE_DEV_SERVER: &str = r#"#!/bin/sh
echo $$ > server.pid
exec sleep 30
"#;

/// A temporary project laid out like the front-end scaffold.
pub struct TestProject {
    /// The temporary directory holding the project.
    pub temp_dir: TempDir,
    /// Canonical project root.
    pub root: PathBuf,
}

impl TestProject {
    /// Create a project with readings, two static files, a manifest and the
    /// fake bundler.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp directory");

        let project = Self { temp_dir, root };
        project.write("data/readings.csv", "NYC, 72\nLA, 85\n");
        project.write("static/robots.txt", "User-agent: *\n");
        project.write("static/meta/default-meta-image.png", "png-bytes");
        project.write("package.json", r#"{"name": "demo", "version": "0.3.1"}"#);
        project.write("bundle.sh", FAKE_BUNDLER);
        project
    }

    /// Write a project-relative file, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, contents).expect("Failed to write fixture file");
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("Failed to read project file")
    }

    /// Configuration that runs the fake bundler through `sh`.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.bundler.program = "sh".to_string();
        config.bundler.script = Some(PathBuf::from("bundle.sh"));
        config.bundler.open = false;
        config
    }

    pub fn context_with(&self, config: Config, mode: &str) -> Arc<Context> {
        Arc::new(Context::new(
            self.root.clone(),
            config,
            BuildEnv::capture(&self.root, Some(mode.to_string())),
        ))
    }

    pub fn context(&self) -> Arc<Context> {
        self.context_with(self.config(), "production")
    }
}

/// Poll until `check` holds or `timeout` elapses.
pub async fn wait_for<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

/// Whether a process with this pid still exists.
pub fn process_alive(pid: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("kill -0 {} 2>/dev/null", pid))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(path).expect("Failed to read JSON file");
    serde_json::from_str(&raw).expect("File is not valid JSON")
}
