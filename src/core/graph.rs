//! Task graph built from `series` and `parallel` combinators.
//!
//! A `TaskNode` is an explicit tree. Leaves are shared tasks; inner nodes
//! are sequential or concurrent groups. Running a node walks the tree:
//!
//! - `Series`: each child starts only after the previous one has completed.
//!   The first failure stops the chain and is returned.
//! - `Parallel`: every child is spawned before any is awaited. The group
//!   completes when all children complete, or fails as soon as one child
//!   fails. Siblings that are already running are left to finish.

use crate::core::task::{Task, TaskFuture};
use crate::error::{Error, Result};
use crate::{tlog, tlog_debug, tlog_error};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A node in the task graph.
#[derive(Clone, Debug)]
pub enum TaskNode {
    /// A single task.
    Task(Arc<dyn Task>),
    /// Children run one after another.
    Series(Vec<TaskNode>),
    /// Children run concurrently.
    Parallel(Vec<TaskNode>),
}

/// Compose nodes so that each starts only after the previous one completes.
pub fn series(nodes: Vec<TaskNode>) -> TaskNode {
    TaskNode::Series(nodes)
}

/// Compose nodes so that they all start together.
pub fn parallel(nodes: Vec<TaskNode>) -> TaskNode {
    TaskNode::Parallel(nodes)
}

impl TaskNode {
    /// Wrap an owned task as a leaf.
    pub fn task<T: Task + 'static>(task: T) -> Self {
        Self::Task(Arc::new(task))
    }

    /// Wrap a shared task as a leaf.
    pub fn shared(task: Arc<dyn Task>) -> Self {
        Self::Task(task)
    }

    /// Names of every leaf, depth first.
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            TaskNode::Task(task) => names.push(task.name().to_string()),
            TaskNode::Series(children) | TaskNode::Parallel(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
        }
    }

    /// Run the graph to completion.
    pub fn run(&self) -> TaskFuture<'_> {
        Box::pin(async move {
            match self {
                TaskNode::Task(task) => run_leaf(task.as_ref()).await,
                TaskNode::Series(children) => {
                    for child in children {
                        child.run().await?;
                    }
                    Ok(())
                }
                TaskNode::Parallel(children) => run_parallel(children).await,
            }
        })
    }

    /// Render the tree the way `taskline tasks` prints it.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, "", "");
        out
    }

    fn describe_into(&self, out: &mut String, first_prefix: &str, rest_prefix: &str) {
        let label = match self {
            TaskNode::Task(task) => task.name().to_string(),
            TaskNode::Series(_) => "<series>".to_string(),
            TaskNode::Parallel(_) => "<parallel>".to_string(),
        };
        out.push_str(first_prefix);
        out.push_str(&label);
        out.push('\n');

        if let TaskNode::Series(children) | TaskNode::Parallel(children) = self {
            for (i, child) in children.iter().enumerate() {
                let last = i + 1 == children.len();
                let (branch, indent) = if last {
                    ("└── ", "    ")
                } else {
                    ("├── ", "│   ")
                };
                child.describe_into(
                    out,
                    &format!("{}{}", rest_prefix, branch),
                    &format!("{}{}", rest_prefix, indent),
                );
            }
        }
    }
}

async fn run_leaf(task: &dyn Task) -> Result<()> {
    let name = task.name();
    tlog!("Starting '{}'...", name);
    let started = Instant::now();
    match task.run().await {
        Ok(()) => {
            tlog!("Finished '{}' after {}", name, format_elapsed(started.elapsed()));
            Ok(())
        }
        Err(e) => {
            tlog_error!(
                "'{}' errored after {}: {}",
                name,
                format_elapsed(started.elapsed()),
                e
            );
            Err(e)
        }
    }
}

async fn run_parallel(children: &[TaskNode]) -> Result<()> {
    // Spawned so that a failing child does not drop its siblings.
    let mut pending: FuturesUnordered<_> = children
        .iter()
        .cloned()
        .map(|child| tokio::spawn(async move { child.run().await }))
        .collect();

    while let Some(joined) = pending.next().await {
        let result = joined.map_err(|e| Error::TaskJoin(e.to_string()))?;
        if let Err(e) = result {
            if !pending.is_empty() {
                tlog_debug!(
                    "Parallel group failed with {} sibling(s) still running",
                    pending.len()
                );
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Human-readable duration: `850 μs`, `12 ms`, `1.4 s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let micros = elapsed.as_micros();
    if micros < 1_000 {
        format!("{} μs", micros)
    } else if micros < 1_000_000 {
        format!("{} ms", micros / 1_000)
    } else {
        format!("{:.1} s", elapsed.as_secs_f64())
    }
}
