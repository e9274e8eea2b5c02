//! Converts the readings CSV into the JSON document the front end fetches as
//! if it were an API response.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Context;
use crate::core::{Task, TaskFuture};
use crate::error::{Error, Result};
use crate::tlog_debug;
use crate::util::write_json;

/// One line of the readings file. Fields are kept as the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readings {
    pub entries: Vec<Reading>,
}

fn separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r", ?").expect("separator regex is valid"))
}

/// Parse the readings text. Lines are not validated: a line without a
/// separator becomes a record with only `city`, and interior blank lines
/// become records with an empty `city`.
pub fn parse_readings(input: &str) -> Readings {
    let input = input.trim();
    if input.is_empty() {
        return Readings { entries: vec![] };
    }

    let entries = input
        .split('\n')
        .map(|line| {
            let mut fields = separator().split(line.trim());
            Reading {
                city: fields.next().unwrap_or_default().to_string(),
                temp: fields.next().map(str::to_string),
            }
        })
        .collect();
    Readings { entries }
}

pub struct DataProcessing {
    ctx: Arc<Context>,
}

impl DataProcessing {
    pub const NAME: &'static str = "data";

    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<()> {
        let paths = &self.ctx.config.paths;
        let source = self.ctx.path(&paths.data_source);
        let raw = tokio::fs::read_to_string(&source)
            .await
            .map_err(|e| Error::Read {
                path: source.clone(),
                source: e,
            })?;

        let readings = parse_readings(&raw);
        let output = self.ctx.path(&paths.api_output);
        write_json(&output, &readings).await?;
        tlog_debug!(
            "Wrote {} readings to {}",
            readings.entries.len(),
            output.display()
        );
        Ok(())
    }
}

impl Task for DataProcessing {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(self.execute())
    }
}
