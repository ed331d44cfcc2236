//! Adaptive follow-up decisions.
//!
//! The service pins the probing rubric into the prompt and delegates the
//! judgment itself to the orchestrator. It is infallible by contract: any
//! provider or parse failure degrades to the default non-decision so the
//! session loop can always advance.

use crate::model::{Difficulty, FollowUpDecision, PromptMessage, TurnRecord};
use crate::orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// How many recent turns are serialized verbatim into the prompt. Older
/// turns are summarized as aggregated weak-topic counts only.
pub const MEMORY_WINDOW: usize = 2;

/// Answers under this word count mandate a follow-up per the rubric.
const SHORT_ANSWER_WORDS: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub question: String,
    pub answer: String,
    pub role: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub history: Vec<TurnRecord>,
}

/// Classifies one answer and optionally emits a follow-up question.
/// Never returns an error.
pub async fn decide(orchestrator: &Orchestrator, request: &FollowUpRequest) -> FollowUpDecision {
    let messages = build_prompt(request);
    let fallback = json!({
        "followUp": null,
        "confidenceScore": 80,
        "weakTopics": []
    });

    let value = orchestrator.infer(&messages, fallback).await.into_value();
    match parse_decision(&value) {
        Some(decision) => decision,
        None => {
            tracing::warn!("follow-up decision was malformed, substituting the non-decision");
            FollowUpDecision::default()
        }
    }
}

/// Weak-topic tallies across the whole session, keyed alphabetically so
/// prompt text is stable between calls.
fn weak_topic_counts(history: &[TurnRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for turn in history {
        for topic in &turn.weak_topics {
            *counts.entry(topic.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

fn build_prompt(request: &FollowUpRequest) -> Vec<PromptMessage> {
    let system = format!(
        r#"You are a {difficulty}-level interviewer for a {role} position, deciding whether to probe deeper after one answer.

Apply these rules strictly:
- If the answer has fewer than {short} words, or admits not knowing ("I don't know", "no idea", "not sure what that is"), you MUST ask a follow-up.
- If the answer hedges ("maybe", "I think", "probably", "I guess"), ask a follow-up that probes how certain the candidate really is.
- If the answer contradicts anything in the recent exchanges below, flag the contradicted subject in weakTopics and ask a follow-up that challenges the contradiction.
- If the answer is correct but shallow, ask a "how" or "why" drill into the same subject.
- If the answer touches a topic listed in the weak-topic tallies, challenge it harder than you otherwise would.
- If the answer is satisfactory and none of the rules above apply, followUp MUST be null.

Respond with STRICT JSON only:
{{"followUp": <string or null>, "confidenceScore": <integer 0-100>, "weakTopics": [<string>, ...]}}"#,
        difficulty = request.difficulty,
        role = request.role,
        short = SHORT_ANSWER_WORDS,
    );

    let mut user = format!(
        "Question: {}\nAnswer: {}\n",
        request.question, request.answer
    );

    let recent_start = request.history.len().saturating_sub(MEMORY_WINDOW);
    let recent = &request.history[recent_start..];
    if !recent.is_empty() {
        user.push_str("\nRecent exchanges:\n");
        for turn in recent {
            user.push_str(&format!(
                "Q: {}\nA: {} (confidence {})\n",
                turn.question, turn.answer, turn.confidence
            ));
        }
    }

    let counts = weak_topic_counts(&request.history);
    if !counts.is_empty() {
        user.push_str("\nWeak-topic tallies so far:\n");
        for (topic, count) in counts {
            user.push_str(&format!("- {topic}: {count}\n"));
        }
    }

    vec![PromptMessage::system(system), PromptMessage::user(user)]
}

/// Validated parse of the decision shape. `None` means the caller should
/// substitute the default; downstream code never sees a partial decision.
fn parse_decision(value: &Value) -> Option<FollowUpDecision> {
    let object = value.as_object()?;

    let follow_up = match object.get("followUp") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => return None,
    };

    let confidence_score = object
        .get("confidenceScore")
        .and_then(Value::as_f64)
        .map(|n| n.clamp(0.0, 100.0) as u8)?;

    let weak_topics = match object.get("weakTopics") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|t| t.as_str().map(str::to_owned))
            .collect(),
        Some(_) => return None,
    };

    Some(FollowUpDecision {
        follow_up,
        confidence_score,
        weak_topics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Satisfaction;
    use crate::orchestrator::MockChatProvider;
    use std::sync::Arc;

    fn request_with_history(history: Vec<TurnRecord>) -> FollowUpRequest {
        FollowUpRequest {
            question: "What is a B-tree?".to_string(),
            answer: "I don't know".to_string(),
            role: "backend engineer".to_string(),
            difficulty: Difficulty::Mid,
            history,
        }
    }

    fn turn(question: &str, weak_topics: &[&str]) -> TurnRecord {
        TurnRecord {
            question: question.to_string(),
            answer: "some answer".to_string(),
            satisfaction: Satisfaction::NeedsProbing,
            weak_topics: weak_topics.iter().map(|t| t.to_string()).collect(),
            confidence: 40,
        }
    }

    #[test]
    fn parse_accepts_the_full_shape() {
        let value = json!({
            "followUp": "How does a B-tree stay balanced?",
            "confidenceScore": 35,
            "weakTopics": ["data structures"]
        });
        let decision = parse_decision(&value).expect("should parse");
        assert_eq!(
            decision.follow_up.as_deref(),
            Some("How does a B-tree stay balanced?")
        );
        assert_eq!(decision.confidence_score, 35);
        assert_eq!(decision.weak_topics, vec!["data structures".to_string()]);
    }

    #[test]
    fn parse_treats_blank_follow_up_as_none() {
        let value = json!({"followUp": "  ", "confidenceScore": 90, "weakTopics": []});
        let decision = parse_decision(&value).expect("should parse");
        assert!(decision.follow_up.is_none());
    }

    #[test]
    fn parse_clamps_out_of_range_confidence() {
        let value = json!({"followUp": null, "confidenceScore": 640, "weakTopics": []});
        let decision = parse_decision(&value).expect("should parse");
        assert_eq!(decision.confidence_score, 100);
    }

    #[test]
    fn parse_rejects_missing_confidence() {
        let value = json!({"followUp": null, "weakTopics": []});
        assert!(parse_decision(&value).is_none());
    }

    #[test]
    fn prompt_bounds_memory_to_two_turns_and_tallies_the_rest() {
        let history = vec![
            turn("Q1", &["sql", "indexes"]),
            turn("Q2", &["sql"]),
            turn("Q3", &[]),
        ];
        let request = request_with_history(history);
        let messages = build_prompt(&request);
        let user = &messages[1].content;

        // Only the two most recent turns appear verbatim.
        assert!(!user.contains("Q: Q1"));
        assert!(user.contains("Q: Q2"));
        assert!(user.contains("Q: Q3"));
        // Every prior turn still contributes to the tallies.
        assert!(user.contains("- sql: 2"));
        assert!(user.contains("- indexes: 1"));
    }

    #[tokio::test]
    async fn provider_failure_yields_the_default_non_decision() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let decision = decide(&orchestrator, &request_with_history(vec![])).await;
        assert_eq!(decision, FollowUpDecision::default());
    }

    #[tokio::test]
    async fn dont_know_answer_surfaces_the_providers_follow_up() {
        let mut provider = MockChatProvider::new();
        provider.expect_complete().returning(|_| {
            Ok(r#"{"followUp": "What problem do B-trees solve?", "confidenceScore": 20, "weakTopics": ["data structures"]}"#
                .to_string())
        });
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let decision = decide(&orchestrator, &request_with_history(vec![])).await;
        assert_eq!(
            decision.follow_up.as_deref(),
            Some("What problem do B-trees solve?")
        );
        assert_eq!(decision.confidence_score, 20);
    }

    #[tokio::test]
    async fn malformed_provider_output_degrades_not_errors() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(r#"{"followUp": 7, "confidenceScore": "high"}"#.to_string()));
        let orchestrator = Orchestrator::new(Arc::new(provider));

        let decision = decide(&orchestrator, &request_with_history(vec![])).await;
        assert_eq!(decision, FollowUpDecision::default());
    }
}
