pub mod resume;

pub use resume::{resume_key, FileResumeStore, MemoryResumeStore, ResumeStore, StoreError};
