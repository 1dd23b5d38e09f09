use crate::schemas::ExamAttempt;
use crate::services::ExamApi;
use crate::session::errors::SessionError;
use crate::storage::ResumeStore;

#[derive(Debug, Clone)]
pub struct ResolvedAttempt {
    pub attempt: ExamAttempt,
    /// True when the attempt was found through the local resume pointer.
    pub resumed: bool,
}

/// Finds the in-progress attempt to work on for `exam_id`, starting one if needed.
///
/// A resume pointer is only trusted while the backend still reports its attempt as in
/// progress; anything else clears it. The pointer is (re)written after every start.
pub async fn resolve_attempt(
    api: &dyn ExamApi,
    store: &dyn ResumeStore,
    exam_id: &str,
) -> Result<ResolvedAttempt, SessionError> {
    if exam_id.trim().is_empty() {
        return Err(SessionError::InvalidExamId);
    }

    if let Some(attempt) = resume_from_pointer(api, store, exam_id).await {
        return Ok(ResolvedAttempt { attempt, resumed: true });
    }

    let attempt = api.start_attempt(exam_id).await.map_err(|err| {
        tracing::error!(exam_id, error = %err, "Failed to start exam attempt");
        SessionError::Resolution(err.detail())
    })?;

    if !attempt.is_in_progress() {
        tracing::error!(
            exam_id,
            attempt_id = %attempt.id,
            status = ?attempt.status,
            "Backend returned an attempt that is not in progress"
        );
        return Err(SessionError::Resolution("This attempt has already been submitted".into()));
    }

    if let Err(err) = store.save(exam_id, &attempt.id) {
        tracing::error!(exam_id, attempt_id = %attempt.id, error = %err, "Failed to store resume pointer");
    }

    tracing::info!(exam_id, attempt_id = %attempt.id, "Exam attempt started");
    Ok(ResolvedAttempt { attempt, resumed: false })
}

async fn resume_from_pointer(
    api: &dyn ExamApi,
    store: &dyn ResumeStore,
    exam_id: &str,
) -> Option<ExamAttempt> {
    let attempt_id = match store.load(exam_id) {
        Ok(Some(attempt_id)) => attempt_id,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(exam_id, error = %err, "Failed to read resume pointer");
            return None;
        }
    };

    match api.fetch_attempt(&attempt_id).await {
        Ok(attempt) if attempt.is_in_progress() && attempt.exam_id == exam_id => {
            tracing::info!(exam_id, attempt_id = %attempt.id, "Resuming exam attempt");
            return Some(attempt);
        }
        Ok(attempt) => {
            tracing::info!(
                exam_id,
                attempt_id = %attempt.id,
                status = ?attempt.status,
                "Discarding stale resume pointer"
            );
        }
        Err(err) => {
            tracing::warn!(exam_id, attempt_id = %attempt_id, error = %err, "Failed to fetch resumed attempt");
        }
    }

    if let Err(err) = store.remove(exam_id) {
        tracing::warn!(exam_id, error = %err, "Failed to clear stale resume pointer");
    }
    None
}
