pub mod error;
pub mod models;
pub mod prakriti;
pub mod recommendations;
pub mod session;

pub use error::InvalidAnswer;
pub use models::*;
pub use prakriti::{questionnaire, AnswerSet, PrakritiClassifier, TieBreak, QUESTION_COUNT};
pub use recommendations::{constitution_profile, daily_schedule, diet_plan};
pub use session::{ResolvedSession, Role, SessionContext, UserIdentity};
