use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{watch, Mutex as WriteGate};
use tokio::task::JoinHandle;

use crate::core::{metrics, time::now_utc};
use crate::services::{ApiClientError, ExamApi};
use crate::session::errors::SessionError;

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved { at: OffsetDateTime },
    Error { question_id: String, message: String },
}

/// Debounced per-question answer persistence.
///
/// Each question has at most one pending save; scheduling again for the same question
/// aborts the pending one. Writes already sent are never cancelled, and writes for one
/// question reach the backend one at a time in the order they were claimed.
pub struct AutosavePipeline {
    inner: Arc<AutosaveInner>,
}

struct AutosaveInner {
    api: Arc<dyn ExamApi>,
    attempt_id: String,
    window: Duration,
    pending: Mutex<HashMap<String, PendingSave>>,
    gates: Mutex<HashMap<String, Arc<WriteGate<()>>>>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    status: watch::Sender<SaveStatus>,
}

struct PendingSave {
    generation: u64,
    handle: JoinHandle<()>,
}

impl AutosavePipeline {
    pub fn new(api: Arc<dyn ExamApi>, attempt_id: impl Into<String>, window: Duration) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(AutosaveInner {
                api,
                attempt_id: attempt_id.into(),
                window,
                pending: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                status,
            }),
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock_pending().len()
    }

    /// Schedules `answer` to be written once `question_id` has been quiet for the window.
    pub fn schedule(&self, question_id: &str, answer: String) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);

        // Held across the spawn so the task cannot claim its slot before it is recorded.
        let mut pending = self.inner.lock_pending();
        if let Some(previous) = pending.remove(question_id) {
            previous.handle.abort();
        }

        let inner = Arc::clone(&self.inner);
        let key = question_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            let gate = inner.gate(&key);
            let _writing = gate.lock().await;
            if !inner.claim(&key, generation) {
                return;
            }
            let _ = inner.write(&key, &answer).await;
        });

        pending.insert(question_id.to_string(), PendingSave { generation, handle });
    }

    /// Drops every pending save without sending it.
    pub fn cancel_pending(&self) {
        let drained: Vec<PendingSave> =
            self.inner.lock_pending().drain().map(|(_, pending)| pending).collect();
        for pending in drained {
            pending.handle.abort();
        }
    }

    /// Cancels pending saves and writes every given answer now, in order.
    ///
    /// Writes already on the wire are awaited first, so nothing older can land after the
    /// flushed value.
    pub async fn flush(&self, answers: &[(String, String)]) -> Result<(), SessionError> {
        self.cancel_pending();

        let gates: Vec<Arc<WriteGate<()>>> = self.inner.lock_gates().values().cloned().collect();
        for gate in gates {
            drop(gate.lock().await);
        }

        for (question_id, answer) in answers {
            let gate = self.inner.gate(question_id);
            let _writing = gate.lock().await;
            self.inner.write(question_id, answer).await.map_err(|err| SessionError::Flush {
                question_id: question_id.clone(),
                message: err.detail(),
            })?;
        }

        Ok(())
    }
}

impl Drop for AutosavePipeline {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

impl AutosaveInner {
    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingSave>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_gates(&self) -> MutexGuard<'_, HashMap<String, Arc<WriteGate<()>>>> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self, question_id: &str) -> Arc<WriteGate<()>> {
        Arc::clone(self.lock_gates().entry(question_id.to_string()).or_default())
    }

    /// Removes the pending entry if it still belongs to `generation`. After this the
    /// write can no longer be aborted by a newer schedule.
    fn claim(&self, question_id: &str, generation: u64) -> bool {
        let mut pending = self.lock_pending();
        match pending.get(question_id) {
            Some(entry) if entry.generation == generation => {
                pending.remove(question_id);
                true
            }
            _ => false,
        }
    }

    async fn write(&self, question_id: &str, answer: &str) -> Result<(), ApiClientError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(SaveStatus::Saving);

        let result = self.api.save_answer(&self.attempt_id, question_id, answer).await;
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;

        match &result {
            Ok(()) => {
                metrics::record_autosave("ok");
                tracing::debug!(attempt_id = %self.attempt_id, question_id, "Answer saved");
                if remaining == 0 {
                    self.status.send_replace(SaveStatus::Saved { at: now_utc() });
                }
            }
            Err(err) => {
                metrics::record_autosave("error");
                tracing::warn!(
                    attempt_id = %self.attempt_id,
                    question_id,
                    error = %err,
                    "Failed to save answer"
                );
                self.status.send_replace(SaveStatus::Error {
                    question_id: question_id.to_string(),
                    message: err.detail(),
                });
            }
        }

        result
    }
}
