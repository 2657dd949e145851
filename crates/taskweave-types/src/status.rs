use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a single `Action` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Completed,
    Failure,
    Skipped,
}

impl WorkStatus {
    pub fn is_completed(self) -> bool {
        self == WorkStatus::Completed
    }

    pub fn is_failure(self) -> bool {
        self == WorkStatus::Failure
    }

    pub fn is_skipped(self) -> bool {
        self == WorkStatus::Skipped
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkStatus::Completed => write!(f, "completed"),
            WorkStatus::Failure => write!(f, "failure"),
            WorkStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(WorkStatus::Completed),
            "failure" | "failed" => Ok(WorkStatus::Failure),
            "skipped" => Ok(WorkStatus::Skipped),
            other => Err(format!("invalid work status: '{other}'")),
        }
    }
}
