mod ability;
mod answer;
mod ids;
mod mistake;
mod question;
mod quota;
mod session;
mod subject;
mod subscription;
mod topic;
mod usage;

pub use ability::{ABILITY_K_FACTOR, AbilityScore, DEFAULT_ABILITY, GradedAnswer, ability_delta};
pub use answer::{AnswerVerdict, NUMERIC_TOLERANCE, check_answer};
pub use ids::{MistakeId, ParseIdError, SeedQuestionId, TopicId, UserId};
pub use mistake::{MistakeRecord, NewMistake};
pub use question::{Question, QuestionError, QuestionSource, SeedQuestion, ShapeParams};
pub use quota::{DailyTask, QuotaError, QuotaPolicy};
pub use session::{SessionStats, SessionStatsError, SessionSummary, SubjectDelta};
pub use subject::{Subject, SubjectError};
pub use subscription::{Plan, Subscription, SubscriptionStatus};
pub use topic::{Topic, TopicDraft, TopicError, ValidatedTopic};
pub use usage::{UsageEvent, UsageKind};
