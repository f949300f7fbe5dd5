//! Join operator configuration that downstream crates can serialize/deserialize.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What the partition cache does with a table that arrives for a side that
/// already holds rows for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateBufferPolicy {
    /// The first table for a (side, key) wins; later ones are released unread.
    #[default]
    KeepFirst,
    /// Later tables are appended to the side's rows.
    Append,
}

impl FromStr for LateBufferPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_first" | "keep-first" | "first" => Ok(LateBufferPolicy::KeepFirst),
            "append" => Ok(LateBufferPolicy::Append),
            other => Err(Error::Config(format!(
                "unknown late buffer policy '{}' (expected keep_first or append)",
                other
            ))),
        }
    }
}

impl fmt::Display for LateBufferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LateBufferPolicy::KeepFirst => f.write_str("keep_first"),
            LateBufferPolicy::Append => f.write_str("append"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Column both sides are matched on.
    pub time_column: String,

    /// Hard cap (in bytes) on the buffers the join may retain at once.
    pub mem_cap_bytes: usize,

    pub late_buffers: LateBufferPolicy,
}

pub const DEFAULT_TIME_COLUMN: &str = "_time";

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            mem_cap_bytes: 256 * 1024 * 1024, // 256 MiB default
            late_buffers: LateBufferPolicy::KeepFirst,
        }
    }
}

impl JoinConfig {
    /// Defaults overlaid with `TSFLOW_*` environment variables.
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TSFLOW_TIME_COLUMN") {
            if !s.trim().is_empty() {
                cfg.time_column = s.trim().to_string();
            }
        }

        if let Ok(s) = std::env::var("TSFLOW_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("TSFLOW_LATE_BUFFERS") {
            if let Ok(p) = s.parse::<LateBufferPolicy>() {
                cfg.late_buffers = p;
            }
        }

        cfg
    }

    pub fn with_time_column(mut self, name: impl Into<String>) -> Self {
        self.time_column = name.into();
        self
    }

    pub fn with_mem_cap_bytes(mut self, bytes: usize) -> Self {
        self.mem_cap_bytes = bytes;
        self
    }

    pub fn with_late_buffers(mut self, policy: LateBufferPolicy) -> Self {
        self.late_buffers = policy;
        self
    }
}
