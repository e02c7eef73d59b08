//! Status - バックエンド非依存のジョブ状態
//!
//! 各 Provider は自分のバックエンドの状態語彙をこの enum のどれか 1 つに写像する。
//!
//! # 優先順位（複数のシグナルが同時に存在する場合）
//! terminal-failure > terminal-success > running > pending > unknown

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical job status shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Unknown,
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// No further transitions are expected once a job reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Rank used when an adapter has to merge several native signals.
    ///
    /// Cancelled sits with the terminal failures: the job did not produce a
    /// successful result.
    pub fn precedence(self) -> u8 {
        match self {
            JobStatus::Failed => 5,
            JobStatus::Cancelled => 4,
            JobStatus::Completed => 3,
            JobStatus::Running => 2,
            JobStatus::Pending => 1,
            JobStatus::Unknown => 0,
        }
    }

    /// Picks the most significant status out of several signals.
    /// An empty iterator yields `Unknown`.
    pub fn most_significant<I>(signals: I) -> JobStatus
    where
        I: IntoIterator<Item = JobStatus>,
    {
        signals
            .into_iter()
            .max_by_key(|s| s.precedence())
            .unwrap_or(JobStatus::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Unknown => "UNKNOWN",
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::completed(JobStatus::Completed, true)]
    #[case::failed(JobStatus::Failed, true)]
    #[case::cancelled(JobStatus::Cancelled, true)]
    #[case::running(JobStatus::Running, false)]
    #[case::pending(JobStatus::Pending, false)]
    #[case::unknown(JobStatus::Unknown, false)]
    fn terminal_states(#[case] status: JobStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn failure_beats_success_beats_running_beats_pending() {
        use JobStatus::*;
        assert_eq!(JobStatus::most_significant([Pending, Running]), Running);
        assert_eq!(JobStatus::most_significant([Running, Completed]), Completed);
        assert_eq!(JobStatus::most_significant([Completed, Failed]), Failed);
        assert_eq!(JobStatus::most_significant([Unknown, Pending]), Pending);
    }

    #[test]
    fn no_signals_is_unknown() {
        assert_eq!(JobStatus::most_significant([]), JobStatus::Unknown);
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&JobStatus::Cancelled).unwrap();
        assert_eq!(s, "\"CANCELLED\"");
        assert_eq!(JobStatus::Running.to_string(), "RUNNING");
    }
}
