//! Named entry points composed from the leaf tasks.
//!
//! ```text
//! default = series(clean, parallel(data, time, copy), bundle:build)
//! serve   = series(parallel(data, time, copy), parallel(watch, bundle:serve))
//! clean   = clean
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bundler::Bundler;
use crate::config::Context;
use crate::core::{parallel, series, Task, TaskNode};
use crate::error::{Error, Result};
use crate::tasks::{Clean, CopyStatic, DataProcessing, TimeFile};
use crate::watch::{WatchBinding, Watcher};

/// Entry points exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Production build.
    Default,
    /// Development server with file watching.
    Serve,
    /// Remove build output and cache.
    Clean,
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Pipeline::Default => "default",
            Pipeline::Serve => "serve",
            Pipeline::Clean => "clean",
        }
    }

    pub fn all() -> [Pipeline; 3] {
        [Pipeline::Default, Pipeline::Serve, Pipeline::Clean]
    }
}

/// The leaf tasks of one project, built once and shared between pipelines
/// and watch bindings.
pub struct Tasks {
    ctx: Arc<Context>,
    clean: Arc<dyn Task>,
    data: Arc<dyn Task>,
    time: Arc<dyn Task>,
    copy: Arc<dyn Task>,
}

impl Tasks {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            clean: Arc::new(Clean::new(ctx.clone())),
            data: Arc::new(DataProcessing::new(ctx.clone())),
            time: Arc::new(TimeFile::new(ctx.clone())),
            copy: Arc::new(CopyStatic::new(ctx.clone())),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Tasks that watch rules may refer to, by name.
    pub fn registry(&self) -> HashMap<&'static str, Arc<dyn Task>> {
        HashMap::from([
            (Clean::NAME, self.clean.clone()),
            (DataProcessing::NAME, self.data.clone()),
            (TimeFile::NAME, self.time.clone()),
            (CopyStatic::NAME, self.copy.clone()),
        ])
    }

    /// Resolve the configured watch rules into bindings.
    pub fn watch_bindings(&self) -> Result<Vec<WatchBinding>> {
        let registry = self.registry();
        self.ctx
            .config
            .watch_rules()
            .iter()
            .map(|rule| {
                let task = registry
                    .get(rule.task.as_str())
                    .cloned()
                    .ok_or_else(|| Error::UnknownTask(rule.task.clone()))?;
                WatchBinding::new(&rule.pattern, task)
            })
            .collect()
    }

    fn prepare(&self) -> TaskNode {
        parallel(vec![
            TaskNode::shared(self.data.clone()),
            TaskNode::shared(self.time.clone()),
            TaskNode::shared(self.copy.clone()),
        ])
    }

    pub fn build_graph(&self) -> TaskNode {
        series(vec![
            TaskNode::shared(self.clean.clone()),
            self.prepare(),
            TaskNode::task(Bundler::build(self.ctx.clone())),
        ])
    }

    /// The serve graph. Its watcher and dev server run until `cancel` fires.
    pub fn serve_graph(&self, cancel: CancellationToken) -> Result<TaskNode> {
        let server = Bundler::serve(self.ctx.clone(), cancel.clone());
        let watcher = Watcher::new(self.ctx.root.clone(), self.watch_bindings()?, cancel);
        Ok(series(vec![
            self.prepare(),
            parallel(vec![
                TaskNode::task(watcher),
                TaskNode::task(server),
            ]),
        ]))
    }

    pub fn clean_graph(&self) -> TaskNode {
        TaskNode::shared(self.clean.clone())
    }

    pub fn graph(&self, pipeline: Pipeline, cancel: CancellationToken) -> Result<TaskNode> {
        match pipeline {
            Pipeline::Default => Ok(self.build_graph()),
            Pipeline::Serve => self.serve_graph(cancel),
            Pipeline::Clean => Ok(self.clean_graph()),
        }
    }
}

/// Build and run one pipeline.
pub async fn run(ctx: Arc<Context>, pipeline: Pipeline, cancel: CancellationToken) -> Result<()> {
    let graph = Tasks::new(ctx).graph(pipeline, cancel)?;
    graph.run().await
}
