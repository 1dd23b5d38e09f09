use crate::schemas::ExamAttempt;
use crate::services::ExamApi;
use crate::session::autosave::AutosavePipeline;
use crate::session::errors::SessionError;
use crate::session::Route;
use crate::storage::ResumeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimeExpired,
}

impl SubmitTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::TimeExpired => "time_expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}

/// Confirmation step shown before a manual submission.
pub trait SubmitPrompt: Send + Sync {
    fn confirm_submit(&self, progress: &Progress) -> bool;
}

impl<F> SubmitPrompt for F
where
    F: Fn(&Progress) -> bool + Send + Sync,
{
    fn confirm_submit(&self, progress: &Progress) -> bool {
        self(progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The student declined the confirmation; nothing was sent.
    Declined,
    Submitted { attempt_id: String, route: Route },
}

/// Flushes every answer, submits, then forgets the resume pointer.
///
/// The pointer is kept when any step fails so the student can retry from a reload.
pub(crate) async fn finalize(
    api: &dyn ExamApi,
    store: &dyn ResumeStore,
    autosave: &AutosavePipeline,
    exam_id: &str,
    attempt_id: &str,
    answers: &[(String, String)],
) -> Result<ExamAttempt, SessionError> {
    autosave.flush(answers).await?;

    let submitted = api.submit_attempt(attempt_id).await.map_err(|err| {
        tracing::error!(exam_id, attempt_id, error = %err, "Failed to submit attempt");
        SessionError::Submit(err.detail())
    })?;

    if let Err(err) = store.remove(exam_id) {
        tracing::warn!(exam_id, attempt_id, error = %err, "Failed to clear resume pointer");
    }

    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryResumeStore;
    use crate::test_support::{attempt, ApiCall, FakeExamApi};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn pending_saves_are_flushed_before_submit() {
        let api = Arc::new(FakeExamApi::new());
        api.seed_attempt(attempt("attempt-1", "exam-1"));
        let store = MemoryResumeStore::new();
        store.save("exam-1", "attempt-1").unwrap();
        let autosave = AutosavePipeline::new(api.clone(), "attempt-1", Duration::from_secs(1));

        autosave.schedule("q1", "A".into());
        autosave.schedule("q2", "B".into());

        let answers = vec![("q1".to_string(), "A".to_string()), ("q2".to_string(), "B".to_string())];
        let submitted =
            finalize(api.as_ref(), &store, &autosave, "exam-1", "attempt-1", &answers)
                .await
                .expect("submitted");

        assert!(submitted.is_submitted());
        assert_eq!(
            api.calls(),
            vec![
                ApiCall::Save { attempt_id: "attempt-1".into(), question_id: "q1".into(), answer: "A".into() },
                ApiCall::Save { attempt_id: "attempt-1".into(), question_id: "q2".into(), answer: "B".into() },
                ApiCall::Submit("attempt-1".into()),
            ]
        );
        assert!(store.is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(api.calls().len(), 3, "debounced saves were cancelled by the flush");
    }

    #[tokio::test]
    async fn submit_failure_keeps_pointer() {
        let api = Arc::new(FakeExamApi::new());
        api.seed_attempt(attempt("attempt-1", "exam-1"));
        api.fail_submit();
        let store = MemoryResumeStore::new();
        store.save("exam-1", "attempt-1").unwrap();
        let autosave = AutosavePipeline::new(api.clone(), "attempt-1", Duration::from_secs(1));

        let answers = vec![("q1".to_string(), "A".to_string())];
        let err = finalize(api.as_ref(), &store, &autosave, "exam-1", "attempt-1", &answers)
            .await
            .expect_err("submit fails");

        assert!(matches!(err, SessionError::Submit(_)));
        assert_eq!(store.load("exam-1").unwrap().as_deref(), Some("attempt-1"));
        assert_eq!(api.saved_answer("attempt-1", "q1").as_deref(), Some("A"), "flushed answer is durable");
    }

    #[test]
    fn closures_work_as_prompts() {
        let prompt = |progress: &Progress| progress.unanswered() == 0;
        assert!(prompt.confirm_submit(&Progress { answered: 3, total: 3 }));
        assert!(!prompt.confirm_submit(&Progress { answered: 1, total: 3 }));
    }
}
