use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Attempt status as reported by the backend. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Other(String),
}

impl From<String> for AttemptStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "in_progress" | "in-progress" | "inprogress" | "started" | "active" => {
                Self::InProgress
            }
            "submitted" | "completed" | "graded" => Self::Submitted,
            _ => Self::Other(value),
        }
    }
}

impl From<AttemptStatus> for String {
    fn from(value: AttemptStatus) -> Self {
        match value {
            AttemptStatus::InProgress => "in_progress".to_string(),
            AttemptStatus::Submitted => "submitted".to_string(),
            AttemptStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: String,
    #[serde(alias = "examId")]
    pub exam_id: String,
    #[serde(default)]
    #[serde(alias = "studentId")]
    pub student_id: Option<String>,
    pub status: AttemptStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(alias = "startedAt", alias = "startTime")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "durationMinutes")]
    pub duration_minutes: Option<u32>,
    /// Saved answers keyed by question id. Values are opaque per question kind.
    #[serde(default)]
    #[serde(alias = "savedAnswers")]
    pub answers: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl ExamAttempt {
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    pub fn is_submitted(&self) -> bool {
        self.status == AttemptStatus::Submitted
    }

    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration_minutes.map(|minutes| u64::from(minutes) * 60)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveAnswerRequest<'a> {
    pub answer: &'a str,
}
