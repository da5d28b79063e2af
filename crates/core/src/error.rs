use thiserror::Error;

/// Rejection raised before any scoring happens. The classifier never returns
/// a partial tally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAnswer {
    #[error("question {question} has unknown answer tag `{tag}`")]
    UnknownTag { question: usize, tag: String },

    #[error("question {question} was not answered")]
    Missing { question: usize },

    #[error("expected {expected} answers, got {actual}")]
    AnswerCount { expected: usize, actual: usize },

    #[error("question index {question} is outside the questionnaire (0..{expected})")]
    OutOfRange { question: usize, expected: usize },

    #[error("`{key}` is not a question index")]
    QuestionKey { key: String },
}

impl InvalidAnswer {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTag { .. } => "unknown_tag",
            Self::Missing { .. } => "missing_answer",
            Self::AnswerCount { .. } => "answer_count",
            Self::OutOfRange { .. } => "question_out_of_range",
            Self::QuestionKey { .. } => "bad_question_key",
        }
    }
}
