pub mod ai;
pub mod approval;
pub mod control;
pub mod history;
pub mod navigation;
pub mod notifications;
pub mod profiles;
pub mod resolver;
pub mod workspace;

// Re-export commonly used types for convenience.
pub use control::{ControlService, InboundMessage, OutboundMessage};
pub use navigation::{FormDriver, Navigator, SessionOutcome, SessionState};
pub use profiles::{Profile, ProfileStore};
pub use resolver::{AnswerSource, Question, QuestionKind, ResolvedAnswer, Resolver};
pub use workspace::AppConfig;
