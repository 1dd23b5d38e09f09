pub mod attempt;
pub mod exam;
pub mod question;

pub use attempt::{AttemptStatus, ExamAttempt};
pub use exam::{Exam, ExamDetail, Subject};
pub use question::{Choice, MatchingColumns, MediaKind, Question, QuestionKind, SharedMedia};
