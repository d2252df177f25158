//! Answer generation, chat session state and service clients.

pub mod answer;
pub mod app;
pub mod gemini;
pub mod guard;
pub mod prompt;
pub mod session;
pub mod trace;

pub use answer::{route, Answer, AnswerGenerator, AnswerMode, Route};
pub use app::{DocChat, IngestOutcome};
pub use gemini::GeminiChat;
pub use guard::{RefusalGuard, Verdict};
pub use session::{Message, Role, Session, Status};
pub use trace::{RunTracer, TracedChatModel};
