//! Server-side interview operations: question generation, follow-up
//! evaluation, answer persistence, guarded submission, session lookup.
//! The axum handlers and the CLI runtime are both thin shells over this
//! type.

use crate::controller::DecisionBackend;
use crate::error::CoreError;
use crate::followup::{self, FollowUpRequest};
use crate::grader;
use crate::guard::{self, FinalizeOutcome};
use crate::model::{
    Category, Difficulty, Feedback, FollowUpDecision, PromptMessage, SessionRecord,
};
use crate::orchestrator::Orchestrator;
use crate::store::SessionStore;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Resume excerpts beyond this length are truncated before prompting.
const RESUME_EXCERPT_CHARS: usize = 4000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSession {
    pub session_id: Uuid,
    pub questions: Vec<String>,
}

/// Result of a submit call. `Processing` maps to the 202 path at the
/// HTTP boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Graded(Feedback),
    Processing,
}

pub struct InterviewService<S> {
    orchestrator: Orchestrator,
    store: S,
}

impl<S: SessionStore> InterviewService<S> {
    pub fn new(orchestrator: Orchestrator, store: S) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an `InProgress` session with a generated question set.
    /// This is the one AI-backed operation whose failure is surfaced to
    /// the caller: a session that never got questions never starts.
    pub async fn generate(
        &self,
        user_id: &str,
        role: &str,
        difficulty: Difficulty,
        category: Category,
        resume_text: Option<&str>,
    ) -> Result<GeneratedSession, CoreError> {
        let messages = generation_prompt(role, difficulty, category, resume_text);
        let fallback = fallback_questions(role);

        let value = self.orchestrator.infer(&messages, fallback).await.into_value();
        let questions: Vec<String> = value
            .get("questions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|q| q.as_str())
                    .map(str::to_owned)
                    .filter(|q| !q.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if questions.is_empty() {
            return Err(CoreError::GenerationFailure(anyhow::anyhow!(
                "no questions produced for role '{role}'"
            )));
        }

        let record = SessionRecord::new(user_id, role, difficulty, category, questions.clone());
        let session_id = record.id;
        self.store.insert_session(record).await?;

        tracing::info!(%session_id, role, "interview session created");
        Ok(GeneratedSession {
            session_id,
            questions,
        })
    }

    /// Always returns a decision; see [`followup::decide`].
    pub async fn followup(&self, request: &FollowUpRequest) -> FollowUpDecision {
        followup::decide(&self.orchestrator, request).await
    }

    pub async fn record_answer(
        &self,
        session_id: Uuid,
        index: usize,
        answer: &str,
    ) -> Result<(), CoreError> {
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidAnswer);
        }
        self.store
            .append_answer(session_id, index, trimmed.to_owned())
            .await
            .map_err(|e| CoreError::from_store(session_id, e))
    }

    /// Guarded finalization. At most one caller per (user, session) runs
    /// grading; replays and racing duplicates get what the guard says.
    pub async fn submit(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<SubmitOutcome, CoreError> {
        match guard::finalize(&self.store, user_id, session_id).await? {
            FinalizeOutcome::Replay(feedback) => Ok(SubmitOutcome::Graded(feedback)),
            FinalizeOutcome::InFlight => Ok(SubmitOutcome::Processing),
            FinalizeOutcome::Cleared => {
                let record = self
                    .store
                    .fetch_session(session_id)
                    .await
                    .map_err(|e| CoreError::from_store(session_id, e))?
                    .ok_or(CoreError::SessionNotFound(session_id))?;

                let feedback = grader::grade(&self.orchestrator, &record).await;
                self.store
                    .complete_session(session_id, feedback.clone())
                    .await
                    .map_err(|e| CoreError::from_store(session_id, e))?;

                tracing::info!(%session_id, score = feedback.overall_score, "session graded");
                Ok(SubmitOutcome::Graded(feedback))
            }
        }
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<SessionRecord, CoreError> {
        self.store
            .fetch_session(session_id)
            .await
            .map_err(|e| CoreError::from_store(session_id, e))?
            .ok_or(CoreError::SessionNotFound(session_id))
    }
}

fn generation_prompt(
    role: &str,
    difficulty: Difficulty,
    category: Category,
    resume_text: Option<&str>,
) -> Vec<PromptMessage> {
    let category_line = match category {
        Category::Technical => {
            "Mix technical depth questions with one or two behavioral questions."
        }
        Category::NonTechnical => "Focus on behavioral and situational questions.",
    };

    let system = format!(
        r#"You are preparing a {difficulty}-level mock interview for a {role} position.
{category_line}

Produce exactly five questions and respond with STRICT JSON:
{{"questions": [<string>, <string>, <string>, <string>, <string>]}}"#
    );

    let mut user = format!("Role: {role}\nDifficulty: {difficulty}\n");
    if let Some(resume) = resume_text {
        let excerpt: String = resume.chars().take(RESUME_EXCERPT_CHARS).collect();
        user.push_str("\nCandidate resume excerpt:\n");
        user.push_str(&excerpt);
        user.push_str("\n\nGround at least two questions in this resume.");
    }

    vec![PromptMessage::system(system), PromptMessage::user(user)]
}

/// The static stub served when every provider is down. Generic enough to
/// run any interview, specific enough to mention the role.
fn fallback_questions(role: &str) -> Value {
    json!({
        "questions": [
            format!("Tell me about your background and how it led you to {role} work."),
            "Describe a challenging project you worked on recently. What made it difficult?",
            "How do you approach learning a technology you have never used before?",
            "Tell me about a time you disagreed with a teammate. How was it resolved?",
            "What do you consider your biggest area for growth, and what are you doing about it?"
        ]
    })
}

/// Adapts the service to the controller's backend seam for in-process
/// runtimes, binding the user identity the embedding app authenticated.
pub struct LocalBackend<S> {
    service: Arc<InterviewService<S>>,
    user_id: String,
}

impl<S> LocalBackend<S> {
    pub fn new(service: Arc<InterviewService<S>>, user_id: impl Into<String>) -> Self {
        Self {
            service,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl<S: SessionStore> DecisionBackend for LocalBackend<S> {
    async fn generate(
        &self,
        role: &str,
        difficulty: Difficulty,
        resume_text: Option<String>,
    ) -> Result<GeneratedSession, CoreError> {
        self.service
            .generate(
                &self.user_id,
                role,
                difficulty,
                Category::Technical,
                resume_text.as_deref(),
            )
            .await
    }

    async fn followup(&self, request: &FollowUpRequest) -> Result<FollowUpDecision, CoreError> {
        Ok(self.service.followup(request).await)
    }

    async fn record_answer(
        &self,
        session_id: Uuid,
        index: usize,
        answer: &str,
    ) -> Result<(), CoreError> {
        self.service.record_answer(session_id, index, answer).await
    }

    async fn submit(&self, session_id: Uuid) -> Result<SubmitOutcome, CoreError> {
        self.service.submit(&self.user_id, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::MockChatProvider;
    use crate::store::MemoryStore;

    const GRADE_JSON: &str = r#"{
        "overallScore": 81,
        "categoryScores": [{"name": "Technical Knowledge", "score": 84}],
        "questionReviews": [],
        "summary": "Strong session."
    }"#;

    fn service_with_provider(provider: MockChatProvider) -> InterviewService<MemoryStore> {
        InterviewService::new(Orchestrator::new(Arc::new(provider)), MemoryStore::new())
    }

    #[tokio::test]
    async fn generate_parses_provider_questions() {
        let mut provider = MockChatProvider::new();
        provider.expect_complete().returning(|_| {
            Ok(r#"{"questions": ["Q1", "Q2", "Q3", "Q4", "Q5"]}"#.to_string())
        });
        let service = service_with_provider(provider);

        let generated = service
            .generate("user-1", "backend engineer", Difficulty::Mid, Category::Technical, None)
            .await
            .unwrap();

        assert_eq!(generated.questions.len(), 5);
        let record = service.get_session(generated.session_id).await.unwrap();
        assert_eq!(record.status, crate::model::SessionStatus::InProgress);
        assert_eq!(record.questions, generated.questions);
    }

    #[tokio::test]
    async fn generate_with_dead_providers_serves_the_stub() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("timeout")));
        let service = service_with_provider(provider);

        let generated = service
            .generate("user-1", "data engineer", Difficulty::Junior, Category::Technical, None)
            .await
            .expect("fallback stub still yields a session");

        assert_eq!(generated.questions.len(), 5);
        assert!(generated.questions[0].contains("data engineer"));
    }

    #[tokio::test]
    async fn record_answer_rejects_empty_text() {
        let provider = MockChatProvider::new();
        let service = service_with_provider(provider);
        let err = service
            .record_answer(Uuid::new_v4(), 0, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAnswer));
    }

    #[tokio::test]
    async fn double_submit_grades_once_and_replays_identically() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(r#"{"questions": ["Q1"]}"#.to_string()))
            .once();
        // Exactly one grading call over both submits.
        provider
            .expect_complete()
            .returning(|_| Ok(GRADE_JSON.to_string()))
            .once();
        let service = service_with_provider(provider);

        let generated = service
            .generate("user-1", "backend engineer", Difficulty::Mid, Category::Technical, None)
            .await
            .unwrap();
        service
            .record_answer(generated.session_id, 0, "an answer")
            .await
            .unwrap();

        let first = service.submit("user-1", generated.session_id).await.unwrap();
        let second = service.submit("user-1", generated.session_id).await.unwrap();

        let SubmitOutcome::Graded(first_feedback) = first else {
            panic!("first submit should grade");
        };
        let SubmitOutcome::Graded(second_feedback) = second else {
            panic!("second submit should replay");
        };
        assert_eq!(first_feedback, second_feedback);
        assert_eq!(first_feedback.overall_score, 81);
    }

    #[tokio::test]
    async fn submit_after_claim_expiry_replays_without_regrading() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(r#"{"questions": ["Q1"]}"#.to_string()))
            .once();
        // The grading call is pinned to exactly one invocation even
        // though the second submit re-acquires the claim.
        provider
            .expect_complete()
            .returning(|_| Ok(GRADE_JSON.to_string()))
            .once();
        let service = service_with_provider(provider);

        let generated = service
            .generate("user-1", "backend engineer", Difficulty::Mid, Category::Technical, None)
            .await
            .unwrap();
        let first = service.submit("user-1", generated.session_id).await.unwrap();

        service.store().backdate_claim(
            "user-1",
            generated.session_id,
            chrono::Duration::hours(25),
        );
        let second = service.submit("user-1", generated.session_id).await.unwrap();

        let SubmitOutcome::Graded(first_feedback) = first else {
            panic!("first submit should grade");
        };
        assert_eq!(second, SubmitOutcome::Graded(first_feedback));
    }

    #[tokio::test]
    async fn record_answer_rejects_an_index_past_the_question_list() {
        let mut provider = MockChatProvider::new();
        provider.expect_complete().returning(|_| {
            Ok(r#"{"questions": ["Q1", "Q2", "Q3", "Q4", "Q5"]}"#.to_string())
        });
        let service = service_with_provider(provider);
        let generated = service
            .generate("user-1", "backend engineer", Difficulty::Mid, Category::Technical, None)
            .await
            .unwrap();

        let err = service
            .record_answer(generated.session_id, 4_000_000_000, "an answer")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAnswer));
    }

    #[tokio::test]
    async fn submit_racing_an_unfinished_grade_reports_processing() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(r#"{"questions": ["Q1"]}"#.to_string()))
            .once();
        let service = service_with_provider(provider);

        let generated = service
            .generate("user-1", "backend engineer", Difficulty::Mid, Category::Technical, None)
            .await
            .unwrap();

        // Another request holds the claim but has not persisted feedback.
        assert!(
            service
                .store()
                .try_claim("user-1", generated.session_id)
                .await
                .unwrap()
        );

        let outcome = service.submit("user-1", generated.session_id).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Processing);
    }

    #[tokio::test]
    async fn submit_for_unknown_session_is_not_found() {
        let provider = MockChatProvider::new();
        let service = service_with_provider(provider);
        let missing = Uuid::new_v4();

        let err = service.submit("user-1", missing).await.unwrap_err();
        assert!(matches!(err, CoreError::SessionNotFound(id) if id == missing));
    }
}
