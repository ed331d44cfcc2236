pub mod controller;
pub mod error;
pub mod followup;
pub mod grader;
pub mod guard;
pub mod model;
pub mod orchestrator;
pub mod queue;
pub mod service;
pub mod speech;
pub mod store;

pub use controller::{ControllerStep, Phase, SessionController};
pub use error::{CoreError, StoreError};
pub use model::{
    Category, Difficulty, Feedback, FollowUpDecision, SessionRecord, SessionStatus, TurnRecord,
};
pub use orchestrator::{ChatProvider, GeminiChat, InferOutcome, OpenAiChat, Orchestrator};
pub use service::{InterviewService, LocalBackend, SubmitOutcome};
pub use store::{MemoryStore, SessionStore};
