//! Writes the build timestamp into the source tree, where the front end
//! imports it at bundle time. It must exist before the bundler runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Context;
use crate::core::{Task, TaskFuture};
use crate::error::Result;
use crate::util::write_json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    /// Milliseconds since the Unix epoch at capture time.
    pub time: i64,
    pub foo: String,
}

impl TimeRecord {
    pub fn now() -> Self {
        Self {
            time: chrono::Utc::now().timestamp_millis(),
            foo: "bar".to_string(),
        }
    }
}

pub struct TimeFile {
    ctx: Arc<Context>,
}

impl TimeFile {
    pub const NAME: &'static str = "time";

    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<()> {
        let path = self.ctx.path(&self.ctx.config.paths.time_file);
        write_json(&path, &TimeRecord::now()).await
    }
}

impl Task for TimeFile {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(self.execute())
    }
}
