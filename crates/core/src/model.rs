use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seniority tier an interview is pitched at. Drives both the question
/// generation prompt and how hard the follow-up rubric probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Junior,
    Mid,
    Senior,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Junior => "junior",
            Difficulty::Mid => "mid",
            Difficulty::Senior => "senior",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "junior" => Ok(Difficulty::Junior),
            "mid" => Ok(Difficulty::Mid),
            "senior" => Ok(Difficulty::Senior),
            other => Err(format!(
                "unknown difficulty '{other}', expected junior|mid|senior"
            )),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Technical,
    #[serde(rename = "Non-Technical")]
    NonTechnical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// Durable record of one interview attempt. Owned by the controller while
/// the session is live, by the store afterwards. `status` flips to
/// `Completed` exactly once, on the finalization path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub role: String,
    pub difficulty: Difficulty,
    pub category: Category,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub feedback: Option<Feedback>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        user_id: impl Into<String>,
        role: impl Into<String>,
        difficulty: Difficulty,
        category: Category,
        questions: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            role: role.into(),
            difficulty,
            category,
            questions,
            answers: Vec::new(),
            feedback: None,
            status: SessionStatus::InProgress,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Satisfaction {
    Satisfactory,
    NeedsProbing,
}

/// One question/answer exchange plus the judgment derived from it.
/// Appended by the controller after each evaluated answer and read-only
/// afterwards. Only the two most recent records are serialized into
/// decision prompts; older turns contribute aggregated weak-topic counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub question: String,
    pub answer: String,
    pub satisfaction: Satisfaction,
    pub weak_topics: Vec<String>,
    pub confidence: u8,
}

/// Outcome of one follow-up evaluation. `follow_up: None` means the answer
/// was judged satisfactory and the session moves straight on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpDecision {
    pub follow_up: Option<String>,
    pub confidence_score: u8,
    pub weak_topics: Vec<String>,
}

impl Default for FollowUpDecision {
    /// The safe non-decision substituted on any parse or validation
    /// failure. A non-decision must never block the session loop.
    fn default() -> Self {
        Self {
            follow_up: None,
            confidence_score: 80,
            weak_topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub question: String,
    pub critique: String,
    pub ideal_answer: String,
}

/// The graded report produced exactly once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u8,
    #[serde(default)]
    pub category_scores: Vec<CategoryScore>,
    #[serde(default)]
    pub question_reviews: Vec<QuestionReview>,
    #[serde(default)]
    pub summary: String,
}

impl Feedback {
    /// Minimal shape persisted when grading inference fails end to end.
    pub fn analysis_failed() -> Self {
        Self {
            overall_score: 0,
            category_scores: Vec::new(),
            question_reviews: Vec::new(),
            summary: "Analysis failed. The transcript was saved but could not be graded."
                .to_string(),
        }
    }
}

/// One message routed through the inference orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}
