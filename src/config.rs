use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{tlog_debug, Error, Result};

/// Name of the optional project configuration file.
pub const CONFIG_FILE: &str = "taskline.toml";

/// Manifest that supplies the application version.
pub const MANIFEST_FILE: &str = "package.json";

/// Mode used when neither `--mode` nor `NODE_ENV` is set.
pub const DEFAULT_MODE: &str = "development";

/// Settings read from `taskline.toml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub bundler: BundlerConfig,
    pub serve: ServeConfig,
    pub watch: Vec<WatchRule>,
}

/// Project-relative locations of inputs and derived artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub data_source: PathBuf,
    pub api_output: PathBuf,
    pub time_file: PathBuf,
    pub static_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_source: PathBuf::from("data/readings.csv"),
            api_output: PathBuf::from("dist/api/readings.json"),
            time_file: PathBuf::from("app/scripts/time.json"),
            static_dir: PathBuf::from("static"),
            output_dir: PathBuf::from("dist"),
            cache_dir: PathBuf::from(".parcel-cache"),
        }
    }
}

/// How the external bundler is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BundlerConfig {
    /// Executable, resolved on PATH when it is a bare name.
    pub program: String,
    /// Script passed as the first argument (the bundler's JS entry point).
    pub script: Option<PathBuf>,
    /// Bundler configuration file, passed as `--config`.
    pub config: PathBuf,
    /// HTML entry the bundler starts from.
    pub entry: PathBuf,
    /// Pass `--open` in serve mode.
    pub open: bool,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            script: Some(PathBuf::from("node_modules/parcel/lib/cli.js")),
            config: PathBuf::from(".parcelrc"),
            entry: PathBuf::from("app/index.html"),
            open: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port_start: u16,
    pub port_end: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port_start: 9000,
            port_end: 9999,
        }
    }
}

/// A glob pattern and the name of the task it re-runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchRule {
    pub pattern: String,
    pub task: String,
}

impl WatchRule {
    pub fn new(pattern: &str, task: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            task: task.to_string(),
        }
    }
}

impl Config {
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Load `taskline.toml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        tlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        tlog_debug!(
            "Config loaded: bundler={}, ports={}-{}, watch rules={}",
            config.bundler.program,
            config.serve.port_start,
            config.serve.port_end,
            config.watch_rules().len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.serve.port_start > self.serve.port_end {
            return Err(Error::Validation(format!(
                "serve.port_start ({}) is greater than serve.port_end ({})",
                self.serve.port_start, self.serve.port_end
            )));
        }
        Ok(())
    }

    /// Watch rules in effect: the configured list, or the defaults when none
    /// are given. Defaults follow `paths`: the data source's directory
    /// re-runs `data`, the static tree re-runs `copy`.
    pub fn watch_rules(&self) -> Vec<WatchRule> {
        if !self.watch.is_empty() {
            return self.watch.clone();
        }
        let data_dir = self.paths.data_source.parent().unwrap_or(Path::new(""));
        vec![
            WatchRule::new(&glob_under(data_dir, "*"), "data"),
            WatchRule::new(&glob_under(&self.paths.static_dir, "**/*"), "copy"),
        ]
    }
}

/// `suffix` below `dir`, as a `/`-separated glob with `dir` escaped.
fn glob_under(dir: &Path, suffix: &str) -> String {
    let mut parts: Vec<String> = dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| glob::Pattern::escape(&c.as_os_str().to_string_lossy()))
        .collect();
    parts.push(suffix.to_string());
    parts.join("/")
}

/// Values the bundler reads from its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnv {
    /// Execution mode, exported as `NODE_ENV`.
    pub mode: String,
    /// Manifest version, exported as `APP_VERSION`.
    pub app_version: Option<String>,
    /// Milliseconds since epoch at startup, exported as `APP_BUILD_TIME`.
    pub build_time: i64,
}

impl BuildEnv {
    /// Capture the environment once: `mode` wins over `NODE_ENV`, which wins over the default.
    pub fn capture(root: &Path, mode: Option<String>) -> Self {
        let mode = mode
            .or_else(|| std::env::var("NODE_ENV").ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_MODE.to_string());
        Self {
            mode,
            app_version: read_manifest_version(root),
            build_time: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            ("NODE_ENV", self.mode.clone()),
            ("APP_BUILD_TIME", self.build_time.to_string()),
        ];
        if let Some(version) = &self.app_version {
            vars.push(("APP_VERSION", version.clone()));
        }
        vars
    }
}

fn read_manifest_version(root: &Path) -> Option<String> {
    let path = root.join(MANIFEST_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            tlog_debug!("No manifest at {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(manifest) => manifest
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        Err(e) => {
            tlog_debug!("Manifest {} is not valid JSON: {}", path.display(), e);
            None
        }
    }
}

/// Everything a task needs, fixed at construction time.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub env: BuildEnv,
}

impl Context {
    /// Load the project at `root`. The root is canonicalized so that watcher
    /// event paths can be made project-relative.
    pub fn load(root: &Path, mode: Option<String>) -> Result<Self> {
        let root = root.canonicalize().map_err(|source| Error::Read {
            path: root.to_path_buf(),
            source,
        })?;
        let config = Config::load(&root)?;
        let env = BuildEnv::capture(&root, mode);
        Ok(Self { root, config, env })
    }

    pub fn new(root: PathBuf, config: Config, env: BuildEnv) -> Self {
        Self { root, config, env }
    }

    /// Resolve a project-relative path.
    pub fn path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}
