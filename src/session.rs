use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{InvoiceError, Result};
use crate::extract::Extractor;
use crate::model::{Product, Snapshot};
use crate::store::InvoiceStore;

/// Progress of a session's upload task, broadcast to subscribers. Subscribe
/// through [`Session::events`] before submitting to observe the full
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started { filename: String },
    Completed,
    Failed { notice: String },
    Cancelled,
}

/// Where the session's upload control currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadPhase {
    Idle,
    InFlight,
    Done,
}

struct UploadState {
    phase: UploadPhase,
    task: Option<JoinHandle<()>>,
}

impl UploadState {
    fn settle(&mut self, phase: UploadPhase) {
        self.phase = phase;
        self.task = None;
    }
}

/// One review session: a single upload slot plus the state container and
/// command surface behind it.
///
/// The upload control accepts one file. Submission spawns one cancellable
/// task; failure and cancellation reopen the control, success closes it for
/// the rest of the session. Line-item commands go straight to the store.
pub struct Session<X: Extractor> {
    inner: Arc<Inner<X>>,
}

struct Inner<X> {
    extractor: X,
    store: Mutex<InvoiceStore>,
    upload: Mutex<UploadState>,
    events: broadcast::Sender<UploadEvent>,
}

/// Take the guard even if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<X: Extractor> Session<X> {
    pub fn new(extractor: X) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                extractor,
                store: Mutex::new(InvoiceStore::new()),
                upload: Mutex::new(UploadState {
                    phase: UploadPhase::Idle,
                    task: None,
                }),
                events,
            }),
        }
    }

    /// Current state, cloned for the caller.
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.inner.store).snapshot()
    }

    /// Subscribe to state changes.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        lock(&self.inner.store).watch()
    }

    /// Subscribe to upload progress events.
    pub fn events(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    /// True while a submission is running or after one has succeeded.
    pub fn upload_locked(&self) -> bool {
        lock(&self.inner.upload).phase != UploadPhase::Idle
    }

    /// Hand a file to the extraction service on a background task.
    ///
    /// Rejects the submission when one is already running or the session has
    /// already processed an invoice. Must be called within a tokio runtime.
    pub fn submit_file(&self, filename: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        let filename = filename.into();
        let mut upload = lock(&self.inner.upload);
        match upload.phase {
            UploadPhase::InFlight => {
                return Err(InvoiceError::UploadLocked(
                    "a submission is already in flight",
                ));
            }
            UploadPhase::Done => {
                return Err(InvoiceError::UploadLocked(
                    "this session already processed an invoice",
                ));
            }
            UploadPhase::Idle => {}
        }
        upload.phase = UploadPhase::InFlight;
        let _ = self.inner.events.send(UploadEvent::Started {
            filename: filename.clone(),
        });

        let inner = Arc::clone(&self.inner);
        upload.task = Some(tokio::spawn(async move {
            let outcome = inner.extractor.extract(&filename, bytes).await;

            // A cancel that won the race owns the control now; the late
            // result is discarded.
            let mut upload = lock(&inner.upload);
            if upload.phase != UploadPhase::InFlight {
                return;
            }
            match outcome {
                Ok(result) => {
                    lock(&inner.store).install(result);
                    upload.settle(UploadPhase::Done);
                    drop(upload);
                    info!(filename = %filename, "Invoice processed; upload control stays closed");
                    let _ = inner.events.send(UploadEvent::Completed);
                }
                Err(e) => {
                    upload.settle(UploadPhase::Idle);
                    drop(upload);
                    error!(filename = %filename, error = %e, "Invoice processing failed");
                    let _ = inner.events.send(UploadEvent::Failed {
                        notice: format!("Failed to process invoice: {e}"),
                    });
                }
            }
        }));
        Ok(())
    }

    /// Abort an in-flight upload. Returns false when nothing was in flight.
    pub fn cancel_upload(&self) -> bool {
        let mut upload = lock(&self.inner.upload);
        if upload.phase != UploadPhase::InFlight {
            return false;
        }
        if let Some(task) = upload.task.take() {
            task.abort();
        }
        upload.phase = UploadPhase::Idle;
        drop(upload);
        info!("Upload cancelled");
        let _ = self.inner.events.send(UploadEvent::Cancelled);
        true
    }

    /// Replace the product data of one line item.
    pub fn edit_product(&self, id: Uuid, product: Product) -> Result<Snapshot> {
        lock(&self.inner.store).update_item(id, product)
    }

    /// Remove one line item.
    pub fn delete_product(&self, id: Uuid) -> Result<Snapshot> {
        lock(&self.inner.store).delete_item(id)
    }
}

impl<X: Extractor> Clone for Session<X> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
