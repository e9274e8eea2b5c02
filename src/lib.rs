//! Task runner for a bundled single-page front end.
//!
//! Prepares derived data files, mirrors static assets, and drives an
//! external bundler in build or serve mode, re-running tasks as their
//! inputs change.

pub mod bundler;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod port;
pub mod tasks;
pub mod util;
pub mod watch;

pub use config::{BuildEnv, Config, Context};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Tasks};
