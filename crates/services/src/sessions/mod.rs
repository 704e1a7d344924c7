mod practice;
mod progress;
mod registry;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use practice::{AnswerFeedback, PracticeSession, SessionId, SessionPhase};
pub use progress::{QuestionView, SessionSnapshot};
pub use registry::{DEFAULT_SESSION_TTL_MINUTES, SessionRegistry, SharedSession};
pub use workflow::{DEFAULT_SESSION_LENGTH, MAX_SESSION_LENGTH, PracticeLoopService, StartSession};
