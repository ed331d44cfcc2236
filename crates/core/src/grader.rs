//! Transcript grading. Runs once per session, behind the finalization
//! guard; total inference failure degrades to the "analysis failed"
//! shape rather than surfacing an error.

use crate::model::{Feedback, PromptMessage, SessionRecord};
use crate::orchestrator::Orchestrator;
use serde_json::Value;

pub async fn grade(orchestrator: &Orchestrator, record: &SessionRecord) -> Feedback {
    let messages = build_prompt(record);
    let fallback =
        serde_json::to_value(Feedback::analysis_failed()).unwrap_or(Value::Null);

    let value = orchestrator.infer(&messages, fallback).await.into_value();
    match serde_json::from_value::<Feedback>(value) {
        Ok(feedback) => feedback,
        Err(e) => {
            tracing::warn!("graded report had an unusable shape: {e}");
            Feedback::analysis_failed()
        }
    }
}

fn build_prompt(record: &SessionRecord) -> Vec<PromptMessage> {
    let system = format!(
        r#"You are grading a completed mock interview for a {difficulty}-level {role} position.

Score the full transcript and respond with STRICT JSON:
{{
  "overallScore": <integer 0-100>,
  "categoryScores": [
    {{"name": "Technical Knowledge", "score": <0-100>}},
    {{"name": "Communication", "score": <0-100>}},
    {{"name": "Problem Solving", "score": <0-100>}},
    {{"name": "Confidence", "score": <0-100>}}
  ],
  "questionReviews": [
    {{"question": <string>, "critique": <string>, "idealAnswer": <string>}}
  ],
  "summary": <string>
}}

Include one questionReviews entry per question, in transcript order. The
idealAnswer is a rewrite of what a strong candidate would have said.
Unanswered questions score as misses and the critique should say so."#,
        difficulty = record.difficulty,
        role = record.role,
    );

    let mut transcript = String::from("Transcript:\n");
    for (index, question) in record.questions.iter().enumerate() {
        let answer = record
            .answers
            .get(index)
            .map(String::as_str)
            .filter(|a| !a.trim().is_empty())
            .unwrap_or("(no answer given)");
        transcript.push_str(&format!("Q{n}: {question}\nA{n}: {answer}\n", n = index + 1));
    }

    vec![PromptMessage::system(system), PromptMessage::user(transcript)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Difficulty};
    use crate::orchestrator::MockChatProvider;
    use std::sync::Arc;

    fn record() -> SessionRecord {
        let mut record = SessionRecord::new(
            "user-1",
            "backend engineer",
            Difficulty::Mid,
            Category::Technical,
            vec!["What is TCP?".to_string(), "What is a mutex?".to_string()],
        );
        record.answers = vec!["A transport protocol".to_string()];
        record
    }

    #[test]
    fn prompt_marks_unanswered_questions() {
        let messages = build_prompt(&record());
        let transcript = &messages[1].content;
        assert!(transcript.contains("A1: A transport protocol"));
        assert!(transcript.contains("A2: (no answer given)"));
    }

    #[tokio::test]
    async fn well_formed_report_parses_through() {
        let mut provider = MockChatProvider::new();
        provider.expect_complete().returning(|_| {
            Ok(r#"{
                "overallScore": 72,
                "categoryScores": [{"name": "Technical Knowledge", "score": 70}],
                "questionReviews": [
                    {"question": "What is TCP?", "critique": "Accurate but thin.", "idealAnswer": "TCP is a reliable, ordered transport protocol."}
                ],
                "summary": "Solid fundamentals, needs depth."
            }"#
            .to_string())
        });
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let feedback = grade(&orchestrator, &record()).await;
        assert_eq!(feedback.overall_score, 72);
        assert_eq!(feedback.question_reviews.len(), 1);
        assert_eq!(
            feedback.question_reviews[0].ideal_answer,
            "TCP is a reliable, ordered transport protocol."
        );
    }

    #[tokio::test]
    async fn total_failure_grades_as_analysis_failed() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("model overloaded")));
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let feedback = grade(&orchestrator, &record()).await;
        assert_eq!(feedback, Feedback::analysis_failed());
    }

    #[tokio::test]
    async fn unusable_shape_also_degrades() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(r#"{"overallScore": "excellent"}"#.to_string()));
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let feedback = grade(&orchestrator, &record()).await;
        assert_eq!(feedback, Feedback::analysis_failed());
    }
}
