use std::sync::Arc;

use crate::core::config::Settings;
use crate::storage::{FileResumeStore, ResumeStore};

/// Per-user client state: the bearer token and the resume pointer store.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<InnerContext>,
}

struct InnerContext {
    access_token: Option<String>,
    resume: Arc<dyn ResumeStore>,
}

impl SessionContext {
    pub fn new(access_token: Option<String>, resume: Arc<dyn ResumeStore>) -> Self {
        Self { inner: Arc::new(InnerContext { access_token, resume }) }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let resume = FileResumeStore::new(settings.storage().resume_store_path.clone());
        Self::new(settings.api().access_token.clone(), Arc::new(resume))
    }

    pub fn access_token(&self) -> Option<&str> {
        self.inner.access_token.as_deref()
    }

    pub fn resume(&self) -> &dyn ResumeStore {
        self.inner.resume.as_ref()
    }
}
