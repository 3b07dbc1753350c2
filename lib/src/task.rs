use serde::{Deserialize, Serialize};

/// Lifecycle of a proof task as persisted in the task store.
#[derive(PartialEq, Debug, Clone, Copy, Deserialize, Serialize, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Unassigned,
    Assigned,
    Proved,
    Verified,
    Failed,
}

impl From<TaskStatus> for i32 {
    fn from(status: TaskStatus) -> i32 {
        match status {
            TaskStatus::Unassigned => 0,
            TaskStatus::Assigned => 1000,
            TaskStatus::Proved => 2000,
            TaskStatus::Verified => 3000,
            TaskStatus::Failed => -1000,
        }
    }
}

impl From<i32> for TaskStatus {
    fn from(value: i32) -> TaskStatus {
        match value {
            0 => TaskStatus::Unassigned,
            1000 => TaskStatus::Assigned,
            2000 => TaskStatus::Proved,
            3000 => TaskStatus::Verified,
            _ => TaskStatus::Failed,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Unassigned => write!(f, "unassigned"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::Proved => write!(f, "proved"),
            TaskStatus::Verified => write!(f, "verified"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Verified | TaskStatus::Failed)
    }
}

/// One row of the task store, keyed by block number.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub payload: Vec<u8>,
    pub status: TaskStatus,
    pub proof: Option<Vec<u8>>,
    pub final_pair: Option<Vec<u8>>,
    pub proof_time_sec: Option<u64>,
}

impl Task {
    pub fn new(id: u64, payload: Vec<u8>) -> Self {
        Self {
            id,
            payload,
            status: TaskStatus::Unassigned,
            proof: None,
            final_pair: None,
            proof_time_sec: None,
        }
    }
}

/// Ordering used when fetching unassigned tasks.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OrderBy {
    Asc,
    Desc,
}

impl std::str::FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(OrderBy::Asc),
            "DESC" => Ok(OrderBy::Desc),
            other => Err(format!("unknown ordering: {other}")),
        }
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderBy::Asc => write!(f, "ASC"),
            OrderBy::Desc => write!(f, "DESC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_i32_round_trip() {
        for status in [
            TaskStatus::Unassigned,
            TaskStatus::Assigned,
            TaskStatus::Proved,
            TaskStatus::Verified,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from(i32::from(status)), status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Verified.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
    }

    #[test]
    fn test_order_by_parse() {
        assert_eq!("asc".parse::<OrderBy>().unwrap(), OrderBy::Asc);
        assert_eq!("DESC".parse::<OrderBy>().unwrap(), OrderBy::Desc);
        assert!("sideways".parse::<OrderBy>().is_err());
    }
}
