//! Speech narration gateway.
//!
//! The narrator is a process-wide service whose lifetime is independent
//! of any controller or view that enqueues an utterance. Teardown of the
//! owner must not cancel narration: a lingering utterance is harmless,
//! while tying narration to view lifetime would let a view crash silence
//! audio mid-question. A completion whose enqueuer is gone simply has
//! its callback dropped.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NarrationError {
    #[error("speech backend failed: {0}")]
    Backend(String),
    #[error("narrator queue is closed")]
    Closed,
}

/// The opaque speech synthesis backend: one utterance in, a completion or
/// failure out. Audio capture and playback hardware live behind this
/// seam.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), NarrationError>;
}

struct Utterance {
    text: String,
    done: oneshot::Sender<Result<(), NarrationError>>,
}

/// Handle to the narration queue. Cloning is cheap; all clones feed the
/// same detached worker task.
#[derive(Clone)]
pub struct Narrator {
    tx: mpsc::Sender<Utterance>,
    outstanding: Arc<AtomicUsize>,
}

static GLOBAL: OnceLock<Narrator> = OnceLock::new();

impl Narrator {
    /// Spawns a narrator with its own worker task. Used directly in
    /// tests; production code goes through [`Narrator::install`].
    pub fn with_backend(backend: Arc<dyn SpeechBackend>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Utterance>(32);
        let outstanding = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&outstanding);

        tokio::spawn(async move {
            while let Some(utterance) = rx.recv().await {
                let result = backend.speak(&utterance.text).await;
                // The enqueuer may be gone already; narration finishes
                // regardless and the callback is simply dropped.
                let _ = utterance.done.send(result);
                counter.fetch_sub(1, Ordering::SeqCst);
            }
        });

        Self { tx, outstanding }
    }

    /// Installs the process-wide narrator, or returns the existing one if
    /// a backend was already installed.
    pub fn install(backend: Arc<dyn SpeechBackend>) -> &'static Narrator {
        GLOBAL.get_or_init(|| Narrator::with_backend(backend))
    }

    pub fn global() -> Option<&'static Narrator> {
        GLOBAL.get()
    }

    /// Enqueues one utterance. The returned receiver resolves when the
    /// backend finishes or fails; dropping it abandons the callback but
    /// never the narration.
    pub async fn narrate(&self, text: &str) -> oneshot::Receiver<Result<(), NarrationError>> {
        let (done_tx, done_rx) = oneshot::channel();
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        let utterance = Utterance {
            text: text.to_owned(),
            done: done_tx,
        };
        if let Err(rejected) = self.tx.send(utterance).await {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            let _ = rejected.0.done.send(Err(NarrationError::Closed));
        }
        done_rx
    }

    /// Number of utterances queued or speaking. Used by teardown tests to
    /// prove callbacks do not leak.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}
