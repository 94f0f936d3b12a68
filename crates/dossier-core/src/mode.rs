//! Execution mode shared by the engine and agents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether agents may reach external services during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Deterministic in-process behavior only. No network calls.
    #[default]
    Fake,
    /// Agents backed by external services (e.g. a generative model) call out.
    Real,
}

impl ExecutionMode {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fake => "fake",
            Self::Real => "real",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fake" => Ok(Self::Fake),
            "real" => Ok(Self::Real),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}
