use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where an entry came from. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    User,
    Inference,
    Tool,
    System,
    External,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::User => "user",
            Source::Inference => "inference",
            Source::Tool => "tool",
            Source::System => "system",
            Source::External => "external",
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::System
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Source::User),
            "inference" => Ok(Source::Inference),
            "tool" => Ok(Source::Tool),
            "system" => Ok(Source::System),
            "external" => Ok(Source::External),
            other => Err(format!("unknown source: {other}")),
        }
    }
}
