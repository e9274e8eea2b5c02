//! External bundler invocation.
//!
//! The bundler runs as a child process sharing our stdin/stdout/stderr so
//! that its colored progress output and errors reach the terminal unchanged.
//! Build mode waits for the child. Serve mode returns once it has spawned
//! and stops the child when its cancellation token fires.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::Context;
use crate::core::{Task, TaskFuture};
use crate::error::{Error, Result};
use crate::port::select_port;
use crate::{tlog, tlog_debug, tlog_error, tlog_warn};

/// Which bundler subcommand to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleMode {
    Build,
    Serve,
}

impl BundleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleMode::Build => "build",
            BundleMode::Serve => "serve",
        }
    }
}

impl std::fmt::Display for BundleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Launches the bundler in one mode.
pub struct Bundler {
    ctx: Arc<Context>,
    mode: BundleMode,
    cancel: CancellationToken,
}

impl Bundler {
    pub fn new(ctx: Arc<Context>, mode: BundleMode, cancel: CancellationToken) -> Self {
        Self { ctx, mode, cancel }
    }

    pub fn build(ctx: Arc<Context>) -> Self {
        Self::new(ctx, BundleMode::Build, CancellationToken::new())
    }

    /// Serve mode. The spawned server is killed once `cancel` fires.
    pub fn serve(ctx: Arc<Context>, cancel: CancellationToken) -> Self {
        Self::new(ctx, BundleMode::Serve, cancel)
    }

    pub fn mode(&self) -> BundleMode {
        self.mode
    }

    /// Arguments after the program name. `port` is only used in serve mode.
    pub fn args(&self, port: Option<u16>) -> Vec<String> {
        let bundler = &self.ctx.config.bundler;
        let mut args = Vec::new();
        if let Some(script) = &bundler.script {
            args.push(self.ctx.path(script).display().to_string());
        }
        args.push(self.mode.as_str().to_string());
        args.push(self.ctx.path(&bundler.entry).display().to_string());
        args.push("--config".to_string());
        args.push(self.ctx.path(&bundler.config).display().to_string());
        if let (BundleMode::Serve, Some(port)) = (self.mode, port) {
            args.push("--port".to_string());
            args.push(port.to_string());
            if bundler.open {
                args.push("--open".to_string());
            }
        }
        args
    }

    /// Resolve the bundler program. Bare names are looked up on PATH,
    /// anything containing a separator is taken relative to the project.
    pub fn program(&self) -> Result<PathBuf> {
        let program = &self.ctx.config.bundler.program;
        if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
            let path = self.ctx.path(std::path::Path::new(program));
            if path.exists() {
                return Ok(path);
            }
            return Err(Error::BundlerNotFound(path.display().to_string()));
        }
        which::which(program).map_err(|_| Error::BundlerNotFound(program.clone()))
    }

    fn command(&self, port: Option<u16>) -> Result<Command> {
        let program = self.program()?;
        let args = self.args(port);
        tlog_debug!("Bundler command: {} {}", program.display(), args.join(" "));

        let mut command = Command::new(program);
        command
            .args(&args)
            .current_dir(&self.ctx.root)
            .envs(self.ctx.env.vars());
        Ok(command)
    }

    /// Run a production build and wait for it. A non-zero exit fails the task.
    pub async fn run_build(&self) -> Result<()> {
        let status = self.command(None)?.status().await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::BundlerExit {
                mode: self.mode.to_string(),
                code: status.code(),
            })
        }
    }

    /// Pick a port and start the development server. Returns once the
    /// process has spawned; its exit is logged in the background.
    ///
    /// A failed port scan is logged and the server is started on the
    /// preferred port anyway.
    pub async fn run_serve(&self) -> Result<u16> {
        let serve = &self.ctx.config.serve;
        let port = match select_port(&serve.host, serve.port_start, serve.port_end).await {
            Ok(selection) => {
                if selection.preferred_busy() {
                    tlog_warn!("  Port {} is busy.", selection.preferred);
                }
                selection.port
            }
            Err(e) => {
                tlog_error!("Port scan failed: {}", e);
                serve.port_start
            }
        };

        let mut child = self.command(Some(port))?.kill_on_drop(true).spawn()?;
        tlog!("Bundler serving on port {}", port);

        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => tlog_debug!("Bundler serve exited"),
                    Ok(status) => tlog_warn!("Bundler serve exited with {}", status),
                    Err(e) => tlog_error!("Failed to wait for bundler serve: {}", e),
                },
                _ = cancel.cancelled() => {
                    tlog_debug!("Stopping bundler serve");
                    if let Err(e) = child.kill().await {
                        tlog_warn!("Failed to stop bundler serve: {}", e);
                    }
                }
            }
        });

        Ok(port)
    }
}

impl Task for Bundler {
    fn name(&self) -> &str {
        match self.mode {
            BundleMode::Build => "bundle:build",
            BundleMode::Serve => "bundle:serve",
        }
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(async move {
            match self.mode {
                BundleMode::Build => self.run_build().await,
                BundleMode::Serve => self.run_serve().await.map(|_| ()),
            }
        })
    }
}
