//! Task model and graph execution.
//!
//! Tasks are composed into a tree with `series` and `parallel`, run by the
//! tree itself, and can be lowered into an `ExecutionPlan` for inspection.

pub mod dag;
pub mod graph;
pub mod task;

pub use dag::ExecutionPlan;
pub use graph::{parallel, series, TaskNode};
pub use task::{FnTask, Task, TaskFuture};
