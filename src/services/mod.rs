pub mod exam_api;

pub use exam_api::{ApiClientError, ExamApi, HttpExamApi};
