//! Job records and retry policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job types understood by the workers.
pub mod job_types {
    pub const SEARCH_SYNC: &str = "search_sync";
    pub const APPLICATION_STUDYING: &str = "application_studying";
    pub const CLEANUP_JOBS: &str = "cleanup_jobs";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low = 0,
    Normal = 5,
    High = 10,
}

impl JobPriority {
    pub fn from_i32(value: i32) -> Self {
        match value {
            v if v >= JobPriority::High as i32 => JobPriority::High,
            v if v >= JobPriority::Normal as i32 => JobPriority::Normal,
            _ => JobPriority::Low,
        }
    }
}

/// Exponential backoff: `initial_delay_seconds * backoff_multiplier^attempt`, capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub initial_delay_seconds: u64,
    pub backoff_multiplier: f64,
    pub max_delay_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_seconds: 5,
            backoff_multiplier: 2.0,
            max_delay_seconds: 600,
        }
    }
}

impl RetryPolicy {
    pub fn calculate_delay(&self, attempt: i32) -> u64 {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.max(0));
        let delay = (self.initial_delay_seconds as f64 * factor).round();
        if !delay.is_finite() || delay > self.max_delay_seconds as f64 {
            return self.max_delay_seconds;
        }
        delay as u64
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: i32,
    pub parameters: serde_json::Value,
    pub progress: Option<serde_json::Value>,
    pub retry_policy: serde_json::Value,
    pub retry_count: i32,
    pub processed_items: i32,
    pub total_items: Option<i32>,
    pub error_message: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
}

impl Job {
    pub fn get_priority(&self) -> JobPriority {
        JobPriority::from_i32(self.priority)
    }

    /// Stored policy, falling back to the default when the column is empty or malformed.
    pub fn get_retry_policy(&self) -> RetryPolicy {
        serde_json::from_value(self.retry_policy.clone()).unwrap_or_default()
    }

    pub fn can_retry(&self) -> bool {
        !self.cancel_requested && self.retry_count < self.get_retry_policy().max_retries
    }

    pub fn progress_percent(&self) -> Option<f64> {
        match self.total_items {
            Some(total) if total > 0 => {
                Some((f64::from(self.processed_items) / f64::from(total) * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(retry_count: i32, retry_policy: serde_json::Value) -> Job {
        Job {
            id: Uuid::new_v4(),
            job_type: job_types::SEARCH_SYNC.to_string(),
            status: JobStatus::Running,
            priority: JobPriority::Normal as i32,
            parameters: serde_json::json!({}),
            progress: None,
            retry_policy,
            retry_count,
            processed_items: 3,
            total_items: Some(4),
            error_message: None,
            last_error_at: None,
            scheduled_at: None,
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            worker_id: None,
        }
    }

    #[test]
    fn delay_grows_exponentially_and_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.calculate_delay(0), 5);
        assert_eq!(policy.calculate_delay(1), 10);
        assert_eq!(policy.calculate_delay(3), 40);
        assert_eq!(policy.calculate_delay(30), 600);
    }

    #[test]
    fn retry_budget_comes_from_stored_policy() {
        let stored = serde_json::json!({ "max_retries": 1 });
        assert!(job(0, stored.clone()).can_retry());
        assert!(!job(1, stored).can_retry());
        assert!(job(2, serde_json::Value::Null).can_retry());
    }

    #[test]
    fn priority_and_progress() {
        let j = job(0, serde_json::Value::Null);
        assert_eq!(j.get_priority(), JobPriority::Normal);
        assert_eq!(j.progress_percent(), Some(75.0));
        assert_eq!(JobPriority::from_i32(42), JobPriority::High);
    }
}
