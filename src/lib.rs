pub mod core;
pub mod schemas;
pub mod services;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::core::time::format_offset;
use crate::core::{config::Settings, shutdown, state::SessionContext, telemetry};
use crate::services::HttpExamApi;
use crate::session::{
    ExamSession, Notice, Progress, SaveStatus, SessionCommand, SessionExit, SessionOptions,
    SubmitPrompt,
};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let exam_id = settings
        .session()
        .exam_id
        .clone()
        .context("EXAM_ID must be set to open an exam session")?;

    let context = SessionContext::from_settings(&settings);
    let api = Arc::new(HttpExamApi::new(settings.api(), &context)?);
    // Headless runs have nobody to confirm a manual submission.
    let prompt: Arc<dyn SubmitPrompt> = Arc::new(|_: &Progress| false);

    let session = match ExamSession::open(
        context,
        api,
        prompt,
        &exam_id,
        SessionOptions::from(settings.session()),
    )
    .await
    {
        Ok(session) => session,
        Err(err) => {
            if let Some(route) = err.redirect(&exam_id) {
                tracing::warn!(exam_id = %exam_id, route = %route, "Exam session could not be opened");
            }
            return Err(anyhow::anyhow!(err.user_message()));
        }
    };

    let order: Vec<&str> =
        session.questions_in_display_order().iter().map(|question| question.id.as_str()).collect();
    tracing::info!(
        exam_id = %exam_id,
        title = %session.exam().title,
        subject = session.subject_label(),
        attempt_id = session.attempt_id(),
        resumed = session.is_resumed(),
        display_order = ?order,
        remaining_seconds = ?session.countdown().remaining(),
        answered = session.progress().answered,
        resume_store = %settings.storage().resume_store_path.display(),
        environment = %settings.runtime().environment.as_str(),
        "Exam session ready"
    );

    let (commands, receiver) = mpsc::channel(16);
    let (notices, mut notice_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        shutdown::leave_signal().await;
        let _ = commands.send(SessionCommand::Leave).await;
    });
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            match notice {
                Notice::Toast(message) => tracing::warn!(notice = %message, "Session notice"),
                Notice::SubmitDeclined => tracing::info!("Submission declined"),
            }
        }
    });

    let mut save_status = session.subscribe_save_status();
    tokio::spawn(async move {
        while save_status.changed().await.is_ok() {
            let status = save_status.borrow_and_update().clone();
            match status {
                SaveStatus::Saved { at } => {
                    tracing::info!(saved_at = %format_offset(at), "Answers saved");
                }
                SaveStatus::Error { question_id, message } => {
                    tracing::warn!(question_id = %question_id, error = %message, "Answer not saved");
                }
                SaveStatus::Idle | SaveStatus::Saving => {}
            }
        }
    });

    match session.run(receiver, notices).await {
        SessionExit::Submitted { attempt_id, route } => {
            tracing::info!(attempt_id = %attempt_id, route = %route, "Exam submitted");
        }
        SessionExit::Left { exam_id } => {
            tracing::info!(exam_id = %exam_id, "Exam session left; attempt can be resumed");
        }
    }

    if let Some(rendered) = core::metrics::render() {
        tracing::debug!(metrics = %rendered, "Session metrics");
    }

    Ok(())
}
