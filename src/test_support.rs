use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::core::time::now_utc;
use crate::schemas::exam::ScoringConfig;
use crate::schemas::{
    AttemptStatus, Choice, Exam, ExamAttempt, ExamDetail, MatchingColumns, MediaKind, Question,
    QuestionKind, SharedMedia, Subject,
};
use crate::services::{ApiClientError, ExamApi};

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiCall {
    Start(String),
    Fetch(String),
    Detail(String),
    Save { attempt_id: String, question_id: String, answer: String },
    Submit(String),
    Subject(String),
}

/// In-memory backend that records every call.
#[derive(Default)]
pub(crate) struct FakeExamApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    attempts: BTreeMap<String, ExamAttempt>,
    next_id: u64,
    detail: Option<ExamDetail>,
    subjects: HashMap<String, Subject>,
    calls: Vec<ApiCall>,
    saves: Vec<(String, String)>,
    answers: HashMap<(String, String), String>,
    start_failure: Option<String>,
    detail_failure: bool,
    submit_failure: bool,
    failing_saves: HashSet<String>,
    slow_saves: HashMap<String, Duration>,
}

impl FakeExamApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake api state")
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Successful saves as `(question_id, answer)` in the order they landed.
    pub(crate) fn saves(&self) -> Vec<(String, String)> {
        self.state().saves.clone()
    }

    pub(crate) fn saved_answer(&self, attempt_id: &str, question_id: &str) -> Option<String> {
        self.state().answers.get(&(attempt_id.to_string(), question_id.to_string())).cloned()
    }

    pub(crate) fn attempt(&self, attempt_id: &str) -> Option<ExamAttempt> {
        self.state().attempts.get(attempt_id).cloned()
    }

    pub(crate) fn seed_attempt(&self, attempt: ExamAttempt) {
        self.state().attempts.insert(attempt.id.clone(), attempt);
    }

    pub(crate) fn set_detail(&self, detail: ExamDetail) {
        self.state().detail = Some(detail);
    }

    pub(crate) fn add_subject(&self, subject: Subject) {
        self.state().subjects.insert(subject.id.clone(), subject);
    }

    pub(crate) fn fail_start(&self, detail: &str) {
        self.state().start_failure = Some(detail.to_string());
    }

    pub(crate) fn fail_detail(&self) {
        self.state().detail_failure = true;
    }

    pub(crate) fn fail_submit(&self) {
        self.state().submit_failure = true;
    }

    pub(crate) fn fail_saves_for(&self, question_id: &str) {
        self.state().failing_saves.insert(question_id.to_string());
    }

    /// Delays every save carrying `answer` so it stays in flight for `delay`.
    pub(crate) fn slow_save(&self, answer: &str, delay: Duration) {
        self.state().slow_saves.insert(answer.to_string(), delay);
    }

    pub(crate) fn clear_failures(&self) {
        let mut state = self.state();
        state.start_failure = None;
        state.detail_failure = false;
        state.submit_failure = false;
        state.failing_saves.clear();
    }
}

fn status(status: u16, detail: &str) -> ApiClientError {
    ApiClientError::Status { status, detail: detail.to_string() }
}

#[async_trait]
impl ExamApi for FakeExamApi {
    async fn start_attempt(&self, exam_id: &str) -> Result<ExamAttempt, ApiClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::Start(exam_id.to_string()));

        if let Some(detail) = state.start_failure.clone() {
            return Err(status(409, &detail));
        }

        if let Some(existing) = state
            .attempts
            .values()
            .find(|attempt| attempt.exam_id == exam_id && attempt.is_in_progress())
        {
            return Ok(existing.clone());
        }

        let id = loop {
            state.next_id += 1;
            let candidate = format!("attempt-{}", state.next_id);
            if !state.attempts.contains_key(&candidate) {
                break candidate;
            }
        };
        let duration_minutes = state
            .detail
            .as_ref()
            .map(|detail| detail.exam.duration_minutes)
            .unwrap_or(30);

        let mut created = attempt(&id, exam_id);
        created.started_at = Some(now_utc());
        created.duration_minutes = Some(duration_minutes);
        state.attempts.insert(id, created.clone());
        Ok(created)
    }

    async fn fetch_attempt(&self, attempt_id: &str) -> Result<ExamAttempt, ApiClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::Fetch(attempt_id.to_string()));
        state.attempts.get(attempt_id).cloned().ok_or_else(|| status(404, "Attempt not found"))
    }

    async fn fetch_exam_detail(&self, exam_id: &str) -> Result<ExamDetail, ApiClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::Detail(exam_id.to_string()));

        if state.detail_failure {
            return Err(status(404, "Exam not found"));
        }
        Ok(state
            .detail
            .clone()
            .unwrap_or_else(|| ExamDetail { exam: exam(exam_id, 30), questions: Vec::new() }))
    }

    async fn save_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<(), ApiClientError> {
        let delay = self.state().slow_saves.get(answer).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.calls.push(ApiCall::Save {
            attempt_id: attempt_id.to_string(),
            question_id: question_id.to_string(),
            answer: answer.to_string(),
        });

        if state.failing_saves.contains(question_id) {
            return Err(status(500, "database unavailable"));
        }

        state.saves.push((question_id.to_string(), answer.to_string()));
        state
            .answers
            .insert((attempt_id.to_string(), question_id.to_string()), answer.to_string());
        if let Some(stored) = state.attempts.get_mut(attempt_id) {
            stored.answers.insert(question_id.to_string(), Value::String(answer.to_string()));
        }
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: &str) -> Result<ExamAttempt, ApiClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::Submit(attempt_id.to_string()));

        if state.submit_failure {
            return Err(status(500, "grading queue unavailable"));
        }

        let stored = state
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| status(404, "Attempt not found"))?;
        stored.status = AttemptStatus::Submitted;
        Ok(stored.clone())
    }

    async fn fetch_subject(&self, subject_id: &str) -> Result<Subject, ApiClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::Subject(subject_id.to_string()));
        state.subjects.get(subject_id).cloned().ok_or_else(|| status(404, "Subject not found"))
    }
}

pub(crate) fn exam(id: &str, duration_minutes: u32) -> Exam {
    Exam {
        id: id.to_string(),
        class_id: None,
        subject_id: None,
        title: format!("Exam {id}"),
        open_at: None,
        close_at: None,
        duration_minutes,
        scoring: ScoringConfig::default(),
        shuffle_questions: false,
        shuffle_choices: false,
        allow_review: false,
        max_attempts: None,
    }
}

pub(crate) fn attempt(id: &str, exam_id: &str) -> ExamAttempt {
    ExamAttempt {
        id: id.to_string(),
        exam_id: exam_id.to_string(),
        student_id: None,
        status: AttemptStatus::InProgress,
        started_at: None,
        duration_minutes: None,
        answers: BTreeMap::new(),
        score: None,
    }
}

fn choice(id: String) -> Choice {
    Choice { text: format!("Option {id}"), id }
}

pub(crate) fn question(id: &str, kind: QuestionKind, media: Option<&str>) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        body: None,
        kind,
        choices: ["a", "b", "c"].iter().map(|suffix| choice(format!("{id}-{suffix}"))).collect(),
        matching: None,
        shared_media: media.map(|media_id| SharedMedia {
            id: media_id.to_string(),
            kind: MediaKind::Text,
            content: Some(format!("Passage {media_id}")),
            url: None,
        }),
    }
}

pub(crate) fn matching_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        body: None,
        kind: QuestionKind::Matching,
        choices: Vec::new(),
        matching: Some(MatchingColumns {
            left: vec![choice("l1".into()), choice("l2".into())],
            right: vec![choice("r1".into()), choice("r2".into())],
        }),
        shared_media: None,
    }
}
