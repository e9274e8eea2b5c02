//! The unit of orchestrated work.
//!
//! A task is anything with a name that can be run asynchronously to
//! completion. Tasks are constructed once, with their configuration, and may
//! be run any number of times: once per pipeline invocation, and again for
//! every watcher event bound to them.

use crate::error::Result;
use futures::future::BoxFuture;
use std::future::Future;

/// Future returned by [`Task::run`].
pub type TaskFuture<'a> = BoxFuture<'a, Result<()>>;

/// A named asynchronous unit of work.
pub trait Task: Send + Sync {
    /// Name shown in logs and in the task tree.
    fn name(&self) -> &str;

    /// Run the task once. Completion of the returned future is the task's
    /// completion signal; an `Err` marks the task as failed.
    fn run(&self) -> TaskFuture<'_>;
}

/// A task backed by a closure that produces a fresh future per run.
///
/// # Example
///
/// ```ignore
/// use taskline::core::FnTask;
///
/// let hello = FnTask::new("hello", || async {
///     println!("hello");
///     Ok(())
/// });
/// ```
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> FnTask<F> {
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F, Fut> Task for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin((self.f)())
    }
}

impl std::fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name()).finish()
    }
}
