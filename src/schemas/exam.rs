use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::schemas::question::Question;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    #[serde(default)]
    #[serde(alias = "classId")]
    pub class_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "subjectId")]
    pub subject_id: Option<String>,
    pub title: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(alias = "openAt")]
    pub open_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(alias = "closeAt")]
    pub close_at: Option<OffsetDateTime>,
    #[serde(alias = "durationMinutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    #[serde(alias = "shuffleQuestions")]
    pub shuffle_questions: bool,
    #[serde(default)]
    #[serde(alias = "shuffleChoices")]
    pub shuffle_choices: bool,
    #[serde(default)]
    #[serde(alias = "allowReview")]
    pub allow_review: bool,
    #[serde(default)]
    #[serde(alias = "maxAttempts")]
    pub max_attempts: Option<u32>,
}

impl Exam {
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

/// Question counts and points per difficulty tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub easy: TierScoring,
    #[serde(default)]
    pub medium: TierScoring,
    #[serde(default)]
    pub hard: TierScoring,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TierScoring {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub points: f64,
}

impl ScoringConfig {
    pub fn max_score(&self) -> f64 {
        [self.easy, self.medium, self.hard]
            .iter()
            .map(|tier| f64::from(tier.count) * tier.points)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDetail {
    pub exam: Exam,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grade: Option<u8>,
}

impl Subject {
    pub fn display_label(&self) -> String {
        match self.grade {
            Some(grade) => format!("{} - Grade {grade}", self.name),
            None => self.name.clone(),
        }
    }
}
