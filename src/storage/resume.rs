use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resume store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("resume store at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Client-local persisted pointer from an exam id to its in-progress attempt id.
pub trait ResumeStore: Send + Sync {
    fn load(&self, exam_id: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, exam_id: &str, attempt_id: &str) -> Result<(), StoreError>;
    fn remove(&self, exam_id: &str) -> Result<(), StoreError>;
}

pub fn resume_key(exam_id: &str) -> String {
    format!("exam_attempt_{exam_id}")
}

#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResumeStore for MemoryResumeStore {
    fn load(&self, exam_id: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&resume_key(exam_id)).cloned())
    }

    fn save(&self, exam_id: &str, attempt_id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(resume_key(exam_id), attempt_id.to_string());
        Ok(())
    }

    fn remove(&self, exam_id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&resume_key(exam_id));
        Ok(())
    }
}

/// Resume pointers kept in a single JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileResumeStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(StoreError::Io { path: self.path.clone(), source }),
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw)
            .map_err(|source| StoreError::Json { path: self.path.clone(), source })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }

        let body = serde_json::to_vec_pretty(entries)
            .map_err(|source| StoreError::Json { path: self.path.clone(), source })?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|source| StoreError::Io { path: staging.clone(), source })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Err(err) = fs::set_permissions(&staging, fs::Permissions::from_mode(0o600)) {
                tracing::warn!(
                    error = %err,
                    path = %staging.display(),
                    "Failed to set resume store permissions"
                );
            }
        }

        fs::rename(&staging, &self.path)
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })
    }
}

impl ResumeStore for FileResumeStore {
    fn load(&self, exam_id: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(&resume_key(exam_id)))
    }

    fn save(&self, exam_id: &str, attempt_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        entries.insert(resume_key(exam_id), attempt_id.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, exam_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        if entries.remove(&resume_key(exam_id)).is_none() {
            return Ok(());
        }
        self.write_all(&entries)
    }
}
