use thiserror::Error;

use crate::session::Route;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("exam id must not be empty")]
    InvalidExamId,
    #[error("cannot start or resume attempt: {0}")]
    Resolution(String),
    #[error("cannot load exam: {0}")]
    DetailFetch(String),
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(String),
    #[error("answer does not fit question {question_id} ({kind})")]
    AnswerShape { question_id: String, kind: &'static str },
    #[error("failed to save answer for question {question_id}: {message}")]
    Flush { question_id: String, message: String },
    #[error("failed to submit attempt: {0}")]
    Submit(String),
    #[error("session has been left")]
    Closed,
}

impl SessionError {
    /// Text shown to the student as a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidExamId => "This exam link is not valid.".to_string(),
            Self::Resolution(detail) => format!("Could not start the exam: {detail}"),
            Self::DetailFetch(detail) => format!("Could not load the exam: {detail}"),
            Self::UnknownQuestion(_) | Self::AnswerShape { .. } => {
                "That answer could not be recorded.".to_string()
            }
            Self::Flush { message, .. } => {
                format!("Some answers were not saved, submission stopped: {message}")
            }
            Self::Submit(detail) => format!("Submission failed, please try again: {detail}"),
            Self::Closed => "This exam session is no longer open.".to_string(),
        }
    }

    /// Where the student is sent when the error ends the session before it starts.
    pub fn redirect(&self, exam_id: &str) -> Option<Route> {
        match self {
            Self::InvalidExamId | Self::Resolution(_) | Self::DetailFetch(_) => {
                Some(Route::Instructions { exam_id: exam_id.to_string() })
            }
            _ => None,
        }
    }
}
