//! The client-resident session controller.
//!
//! One controller drives one interview end to end: it requests the
//! question set, narrates each question at most once, collects the
//! answer, consults the follow-up decision service, splices follow-ups
//! into the live queue, and triggers guarded finalization when the index
//! passes the (possibly grown) queue length. Every provider call and
//! narration completion is folded back into a phase transition; the
//! controller never blocks a thread waiting on I/O.

use crate::error::CoreError;
use crate::followup::FollowUpRequest;
use crate::model::{Difficulty, FollowUpDecision, Satisfaction, TurnRecord};
use crate::queue::QuestionQueue;
use crate::service::{GeneratedSession, SubmitOutcome};
use crate::speech::Narrator;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

/// Server operations as seen from the client side. `LocalBackend` in
/// `service` adapts the in-process service; an HTTP client can implement
/// the same seam.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DecisionBackend: Send + Sync {
    async fn generate(
        &self,
        role: &str,
        difficulty: Difficulty,
        resume_text: Option<String>,
    ) -> Result<GeneratedSession, CoreError>;

    async fn followup(&self, request: &FollowUpRequest) -> Result<FollowUpDecision, CoreError>;

    async fn record_answer(
        &self,
        session_id: Uuid,
        index: usize,
        answer: &str,
    ) -> Result<(), CoreError>;

    async fn submit(&self, session_id: Uuid) -> Result<SubmitOutcome, CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    Asking,
    Recording,
    Evaluating,
    Completed,
}

/// What the caller should do next after driving the controller one step.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerStep {
    /// The current question is ready; collect an answer.
    AwaitingAnswer,
    /// The session finalized; the grading outcome is attached.
    Finished(SubmitOutcome),
}

pub struct SessionController<B> {
    backend: B,
    narrator: Narrator,
    role: String,
    difficulty: Difficulty,
    phase: Phase,
    // Single-flight latch: concurrent begin() triggers collapse into one
    // in-flight generation call.
    generating: bool,
    session_id: Option<Uuid>,
    queue: QuestionQueue,
    current: usize,
    memory: Vec<TurnRecord>,
}

impl<B: DecisionBackend> SessionController<B> {
    pub fn new(
        backend: B,
        narrator: Narrator,
        role: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            backend,
            narrator,
            role: role.into(),
            difficulty,
            phase: Phase::Idle,
            generating: false,
            session_id: None,
            queue: QuestionQueue::default(),
            current: 0,
            memory: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn current_question(&self) -> Option<&str> {
        self.queue.question(self.current)
    }

    pub fn memory(&self) -> &[TurnRecord] {
        &self.memory
    }

    /// Requests the question set. On failure the error is surfaced to the
    /// embedding UI (an alert concern) and the controller stays `Idle`;
    /// it never retries on its own.
    pub async fn begin(&mut self, resume_text: Option<String>) -> Result<(), CoreError> {
        if self.generating || self.phase != Phase::Idle || self.session_id.is_some() {
            return Ok(());
        }
        self.generating = true;
        self.phase = Phase::Generating;

        let outcome = self
            .backend
            .generate(&self.role, self.difficulty, resume_text)
            .await;
        self.generating = false;
        self.phase = Phase::Idle;

        let generated = outcome?;
        self.session_id = Some(generated.session_id);
        self.queue = QuestionQueue::new(generated.questions);
        self.current = 0;
        Ok(())
    }

    /// Enters the current question index: narrates it if this index was
    /// never spoken, then waits for an answer. Re-entry into an
    /// already-spoken index (a re-render) skips narration and goes
    /// straight to `Recording`. Also the place the terminal boundary is
    /// checked, so a follow-up spliced in at the last index still gets
    /// asked before completion.
    pub async fn enter_question(&mut self) -> Result<ControllerStep, CoreError> {
        if self.phase == Phase::Evaluating || self.phase == Phase::Generating {
            return Ok(ControllerStep::AwaitingAnswer);
        }

        // Boundary check against the live queue length, which may have
        // grown since the boundary was last computed.
        if self.current >= self.queue.len() {
            return self.finalize().await;
        }

        if self.queue.spoken(self.current) {
            self.phase = Phase::Recording;
            return Ok(ControllerStep::AwaitingAnswer);
        }

        self.phase = Phase::Asking;
        self.queue.mark_spoken(self.current);

        if let Some(text) = self.queue.question(self.current) {
            let done = self.narrator.narrate(text).await;
            // Narration completion or error both proceed to recording;
            // the candidate can always read the question text. Holding
            // the controller across this await is what keeps a late
            // completion from racing a phase change.
            if let Ok(Err(e)) = done.await {
                tracing::warn!(index = self.current, "narration failed, recording anyway: {e}");
            }
        }

        self.phase = Phase::Recording;
        Ok(ControllerStep::AwaitingAnswer)
    }

    /// Accepts an explicit answer submission. Empty trimmed text is
    /// rejected locally with no phase change. A transport failure during
    /// follow-up evaluation is swallowed: the session advances without a
    /// probe rather than stalling.
    pub async fn submit_answer(&mut self, answer: &str) -> Result<ControllerStep, CoreError> {
        if self.phase != Phase::Recording {
            tracing::warn!(phase = ?self.phase, "answer submitted outside Recording, ignoring");
            return Ok(ControllerStep::AwaitingAnswer);
        }
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Ok(ControllerStep::AwaitingAnswer);
        }

        let session_id = self
            .session_id
            .ok_or(CoreError::GenerationFailure(anyhow::anyhow!(
                "no active session"
            )))?;
        self.phase = Phase::Evaluating;
        let index = self.current;
        let question = self
            .queue
            .question(index)
            .unwrap_or_default()
            .to_owned();

        // Only original questions have persistent answer slots; a
        // follow-up exchange lives in session memory and nowhere else.
        if let Some(slot) = self.queue.original_index(index) {
            if let Err(e) = self.backend.record_answer(session_id, slot, trimmed).await {
                tracing::warn!(index, "failed to persist answer, continuing: {e:#}");
            }
        }

        let request = FollowUpRequest {
            question: question.clone(),
            answer: trimmed.to_owned(),
            role: self.role.clone(),
            difficulty: self.difficulty,
            history: self.memory.clone(),
        };
        match self.backend.followup(&request).await {
            Ok(decision) => {
                let satisfaction = if decision.follow_up.is_some() {
                    Satisfaction::NeedsProbing
                } else {
                    Satisfaction::Satisfactory
                };
                self.memory.push(TurnRecord {
                    question,
                    answer: trimmed.to_owned(),
                    satisfaction,
                    weak_topics: decision.weak_topics.clone(),
                    confidence: decision.confidence_score,
                });
                if let Some(follow_up) = decision.follow_up {
                    tracing::debug!(after = index, "splicing follow-up into the queue");
                    self.queue.insert_after(index, follow_up);
                }
            }
            Err(e) => {
                tracing::warn!(index, "follow-up evaluation failed, advancing without a probe: {e:#}");
            }
        }

        self.current += 1;
        self.phase = Phase::Recording;
        self.enter_question().await
    }

    async fn finalize(&mut self) -> Result<ControllerStep, CoreError> {
        if self.phase == Phase::Completed {
            // Completion already ran; nothing to re-trigger locally. The
            // guard makes a remote retry idempotent anyway.
            tracing::debug!("finalize re-entered after completion");
        }
        self.phase = Phase::Completed;
        let session_id = self
            .session_id
            .ok_or(CoreError::GenerationFailure(anyhow::anyhow!(
                "no active session"
            )))?;
        let outcome = self.backend.submit(session_id).await?;
        Ok(ControllerStep::Finished(outcome))
    }
}
