//! Copies the static asset tree into the output tree.
//!
//! This is a copy, not a sync: files removed from the static tree stay in
//! the output until the next `clean`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::config::Context;
use crate::core::{Task, TaskFuture};
use crate::error::{Error, Result};
use crate::util::blocking;
use crate::{tlog_debug, tlog_warn};

pub struct CopyStatic {
    ctx: Arc<Context>,
}

impl CopyStatic {
    pub const NAME: &'static str = "copy";

    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<()> {
        let paths = &self.ctx.config.paths;
        let from = self.ctx.path(&paths.static_dir);
        let to = self.ctx.path(&paths.output_dir);

        if !from.is_dir() {
            tlog_warn!("Static directory {} not found, nothing to copy", from.display());
            return Ok(());
        }

        let copied = blocking(move || copy_tree(&from, &to)).await?;
        tlog_debug!("Copied {} static file(s)", copied);
        Ok(())
    }
}

impl Task for CopyStatic {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(self.execute())
    }
}

/// Copy every file under `from` to the same relative path under `to`.
/// Returns the number of files copied.
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::Validation(e.to_string()))?;
        let target: PathBuf = to.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(entry.path(), &target).map_err(|source| Error::Write {
            path: target.clone(),
            source,
        })?;
        copied += 1;
    }
    Ok(copied)
}
