//! Removes the output tree and the bundler cache before a production build.

use std::path::Path;
use std::sync::Arc;

use crate::config::Context;
use crate::core::{Task, TaskFuture};
use crate::error::{Error, Result};
use crate::tlog_debug;

pub struct Clean {
    ctx: Arc<Context>,
}

impl Clean {
    pub const NAME: &'static str = "clean";

    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<()> {
        let paths = &self.ctx.config.paths;
        for relative in [&paths.output_dir, &paths.cache_dir] {
            remove_tree(&self.ctx.path(relative)).await?;
        }
        Ok(())
    }
}

impl Task for Clean {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(self.execute())
    }
}

/// Delete `path` recursively. A path that does not exist is already clean.
async fn remove_tree(path: &Path) -> Result<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            tlog_debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}
