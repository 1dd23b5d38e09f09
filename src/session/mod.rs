pub mod answers;
pub mod autosave;
pub mod countdown;
pub mod errors;
pub mod ordering;
pub mod resolver;
pub mod submission;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};

use crate::core::config::SessionSettings;
use crate::core::state::SessionContext;
use crate::core::{metrics, time::now_utc};
use crate::schemas::{Exam, Question};
use crate::services::ExamApi;

pub use answers::{build_models, AnswerValue, QuestionInput, QuestionModel};
pub use autosave::{AutosavePipeline, SaveStatus};
pub use countdown::{derive_remaining, Countdown, CountdownState, Tick};
pub use errors::SessionError;
pub use ordering::{media_blocks, shared_media_order, MediaBlock, MediaGrouped};
pub use resolver::{resolve_attempt, ResolvedAttempt};
pub use submission::{Progress, SubmitOutcome, SubmitPrompt, SubmitTrigger};

const SUBJECT_PLACEHOLDER: &str = "Loading...";
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Navigation target handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Instructions { exam_id: String },
    Result { attempt_id: String },
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instructions { exam_id } => write!(f, "/exams/{exam_id}/instructions"),
            Self::Result { attempt_id } => write!(f, "/exams/attempts/{attempt_id}/result"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub autosave_debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { autosave_debounce: Duration::from_millis(1000) }
    }
}

impl From<&SessionSettings> for SessionOptions {
    fn from(settings: &SessionSettings) -> Self {
        Self { autosave_debounce: settings.autosave_debounce() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Submitted,
    Left,
}

/// Input to a running session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Answer { question_id: String, value: AnswerValue },
    Submit,
    Leave,
}

/// Feedback for the student while the session loop runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Toast(String),
    SubmitDeclined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    Submitted { attempt_id: String, route: Route },
    Left { exam_id: String },
}

/// One student's timed, autosaving, resumable exam attempt.
pub struct ExamSession {
    context: SessionContext,
    api: Arc<dyn ExamApi>,
    prompt: Arc<dyn SubmitPrompt>,
    exam: Exam,
    attempt_id: String,
    resumed: bool,
    questions: Vec<Question>,
    display_order: Vec<usize>,
    models: HashMap<String, QuestionModel>,
    autosave: AutosavePipeline,
    countdown: Countdown,
    subject_label: String,
    phase: Phase,
}

impl ExamSession {
    /// Resolves the attempt, loads the exam and restores saved answers.
    ///
    /// Errors from here end the session before it starts; see [`SessionError::redirect`].
    pub async fn open(
        context: SessionContext,
        api: Arc<dyn ExamApi>,
        prompt: Arc<dyn SubmitPrompt>,
        exam_id: &str,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let resolved = resolve_attempt(api.as_ref(), context.resume(), exam_id).await?;
        let attempt = resolved.attempt;

        let detail = api.fetch_exam_detail(exam_id).await.map_err(|err| {
            tracing::error!(exam_id, error = %err, "Failed to load exam detail");
            SessionError::DetailFetch(err.detail())
        })?;

        let subject_id = detail.exam.subject_id.as_deref();
        let subject_label = load_subject_label(api.as_ref(), subject_id).await;
        let models = build_models(&detail.questions, &attempt.answers);
        let display_order = shared_media_order(&detail.questions);

        let mut countdown = Countdown::new();
        let remaining = derive_remaining(&detail.exam, &attempt, now_utc());
        countdown.start(remaining);

        let autosave =
            AutosavePipeline::new(Arc::clone(&api), attempt.id.clone(), options.autosave_debounce);

        tracing::info!(
            exam_id,
            attempt_id = %attempt.id,
            resumed = resolved.resumed,
            questions = detail.questions.len(),
            restored_answers = attempt.answers.len(),
            remaining_seconds = remaining,
            "Exam session opened"
        );

        Ok(Self {
            context,
            api,
            prompt,
            exam: detail.exam,
            attempt_id: attempt.id,
            resumed: resolved.resumed,
            questions: detail.questions,
            display_order,
            models,
            autosave,
            countdown,
            subject_label,
            phase: Phase::Active,
        })
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn subject_label(&self) -> &str {
        &self.subject_label
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn subscribe_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.subscribe()
    }

    /// Indices into the exam's question list in display order.
    pub fn display_order(&self) -> &[usize] {
        &self.display_order
    }

    /// Questions in display order, shared-media groups kept together.
    pub fn questions_in_display_order(&self) -> Vec<&Question> {
        self.display_order.iter().filter_map(|&index| self.questions.get(index)).collect()
    }

    pub fn media_blocks(&self) -> Vec<MediaBlock> {
        media_blocks(&self.questions, &self.display_order)
    }

    pub fn model(&self, question_id: &str) -> Option<&QuestionModel> {
        self.models.get(question_id)
    }

    pub fn progress(&self) -> Progress {
        let answered = self.models.values().filter(|model| model.is_answered()).count();
        Progress { answered, total: self.models.len() }
    }

    /// Records an edit and schedules its autosave.
    pub fn set_answer(&mut self, question_id: &str, value: AnswerValue) -> Result<(), SessionError> {
        if self.phase != Phase::Active {
            return Err(SessionError::Closed);
        }

        let model = self
            .models
            .get_mut(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        model.set_answer(value)?;

        self.autosave.schedule(question_id, model.answer().to_wire());
        Ok(())
    }

    pub fn tick(&mut self) -> Tick {
        self.countdown.tick()
    }

    /// Finalizes the attempt.
    ///
    /// A manual submission with time left asks the prompt first. Failures leave the
    /// resume pointer and countdown in place so the student can retry.
    pub async fn submit(&mut self, trigger: SubmitTrigger) -> Result<SubmitOutcome, SessionError> {
        if self.phase == Phase::Left {
            return Err(SessionError::Closed);
        }

        let needs_confirmation =
            trigger == SubmitTrigger::Manual && !self.countdown.is_expired();
        if needs_confirmation && !self.prompt.confirm_submit(&self.progress()) {
            tracing::debug!(attempt_id = %self.attempt_id, "Submission declined");
            return Ok(SubmitOutcome::Declined);
        }

        let answers = self.current_answers();
        let result = submission::finalize(
            self.api.as_ref(),
            self.context.resume(),
            &self.autosave,
            &self.exam.id,
            &self.attempt_id,
            &answers,
        )
        .await;

        match result {
            Ok(submitted) => {
                metrics::record_submission(trigger.as_str(), "ok");
                self.countdown.stop();
                self.phase = Phase::Submitted;
                tracing::info!(
                    exam_id = %self.exam.id,
                    attempt_id = %submitted.id,
                    trigger = trigger.as_str(),
                    "Exam attempt submitted"
                );
                Ok(SubmitOutcome::Submitted {
                    attempt_id: self.attempt_id.clone(),
                    route: Route::Result { attempt_id: self.attempt_id.clone() },
                })
            }
            Err(err) => {
                metrics::record_submission(trigger.as_str(), "error");
                Err(err)
            }
        }
    }

    /// Navigates away: stops the clock and abandons pending saves. The resume pointer
    /// stays so the attempt can be picked up again.
    pub fn leave(&mut self) {
        self.autosave.cancel_pending();
        self.countdown.stop();
        self.phase = Phase::Left;
        tracing::info!(exam_id = %self.exam.id, attempt_id = %self.attempt_id, "Exam session left");
    }

    /// Drives the session until it is submitted or left.
    ///
    /// Ticks once per second; reaching zero submits without confirmation. A closed
    /// command channel counts as leaving.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> SessionExit {
        let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        let mut expiry_pending = self.countdown.is_expired();

        loop {
            if expiry_pending {
                expiry_pending = false;
                let outcome = self.submit_and_report(SubmitTrigger::TimeExpired, &notices).await;
                if let Some(exit) = outcome {
                    return exit;
                }
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if self.tick() == Tick::Expired {
                        expiry_pending = true;
                    }
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::Answer { question_id, value }) => {
                        if let Err(err) = self.set_answer(&question_id, value) {
                            tracing::warn!(question_id = %question_id, error = %err, "Rejected answer");
                            let _ = notices.send(Notice::Toast(err.user_message()));
                        }
                    }
                    Some(SessionCommand::Submit) => {
                        let outcome = self.submit_and_report(SubmitTrigger::Manual, &notices).await;
                        if let Some(exit) = outcome {
                            return exit;
                        }
                    }
                    Some(SessionCommand::Leave) | None => {
                        self.leave();
                        return SessionExit::Left { exam_id: self.exam.id.clone() };
                    }
                },
            }
        }
    }

    async fn submit_and_report(
        &mut self,
        trigger: SubmitTrigger,
        notices: &mpsc::UnboundedSender<Notice>,
    ) -> Option<SessionExit> {
        match self.submit(trigger).await {
            Ok(SubmitOutcome::Submitted { attempt_id, route }) => {
                Some(SessionExit::Submitted { attempt_id, route })
            }
            Ok(SubmitOutcome::Declined) => {
                let _ = notices.send(Notice::SubmitDeclined);
                None
            }
            Err(err) => {
                let _ = notices.send(Notice::Toast(err.user_message()));
                None
            }
        }
    }

    fn current_answers(&self) -> Vec<(String, String)> {
        self.display_order
            .iter()
            .filter_map(|&index| self.questions.get(index))
            .filter_map(|question| self.models.get(&question.id))
            .map(|model| (model.question_id().to_string(), model.answer().to_wire()))
            .collect()
    }
}

async fn load_subject_label(api: &dyn ExamApi, subject_id: Option<&str>) -> String {
    let Some(subject_id) = subject_id else {
        return SUBJECT_PLACEHOLDER.to_string();
    };

    match api.fetch_subject(subject_id).await {
        Ok(subject) => subject.display_label(),
        Err(err) => {
            tracing::debug!(subject_id, error = %err, "Subject lookup failed");
            SUBJECT_PLACEHOLDER.to_string()
        }
    }
}
