use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InvalidAnswer;
use crate::models::{ClassificationResult, Dosha, Question, QuestionOption, ScoreTally};

pub const QUESTION_COUNT: usize = 5;

const CATALOG: [(u8, &str, [(Dosha, &str); 3]); QUESTION_COUNT] = [
    (
        1,
        "What is your body build?",
        [
            (Dosha::Vata, "Thin, light frame"),
            (Dosha::Pitta, "Medium, muscular build"),
            (Dosha::Kapha, "Heavy, broad frame"),
        ],
    ),
    (
        2,
        "How is your skin texture?",
        [
            (Dosha::Vata, "Dry, rough, cool"),
            (Dosha::Pitta, "Warm, oily, soft"),
            (Dosha::Kapha, "Thick, moist, cool"),
        ],
    ),
    (
        3,
        "How is your appetite?",
        [
            (Dosha::Vata, "Variable, irregular"),
            (Dosha::Pitta, "Strong, regular"),
            (Dosha::Kapha, "Slow, steady"),
        ],
    ),
    (
        4,
        "How do you handle stress?",
        [
            (Dosha::Vata, "Get anxious easily"),
            (Dosha::Pitta, "Get irritated quickly"),
            (Dosha::Kapha, "Stay calm and composed"),
        ],
    ),
    (
        5,
        "What is your sleep pattern?",
        [
            (Dosha::Vata, "Light, restless sleep"),
            (Dosha::Pitta, "Moderate, sound sleep"),
            (Dosha::Kapha, "Deep, heavy sleep"),
        ],
    ),
];

pub fn questionnaire() -> Vec<Question> {
    CATALOG
        .iter()
        .map(|(id, question, options)| Question {
            id: *id,
            question: question.to_string(),
            options: options
                .iter()
                .map(|(value, label)| QuestionOption {
                    value: *value,
                    label: label.to_string(),
                })
                .collect(),
        })
        .collect()
}

/// Which category wins when several share the highest count.
///
/// `LastListed` keeps the later of two equal counts while reducing over
/// `Dosha::ALL`, which is what a strict greater-than reduction produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    FirstListed,
    #[default]
    LastListed,
}

impl TieBreak {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "first" | "first_listed" => Some(Self::FirstListed),
            "last" | "last_listed" => Some(Self::LastListed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstListed => "first",
            Self::LastListed => "last",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrakritiClassifier {
    expected_answers: usize,
    tie_break: TieBreak,
}

impl Default for PrakritiClassifier {
    fn default() -> Self {
        Self::new(QUESTION_COUNT, TieBreak::default())
    }
}

impl PrakritiClassifier {
    /// A questionnaire always has at least one question; zero is clamped to one.
    pub fn new(expected_answers: usize, tie_break: TieBreak) -> Self {
        Self {
            expected_answers: expected_answers.max(1),
            tie_break,
        }
    }

    pub fn expected_answers(&self) -> usize {
        self.expected_answers
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn classify<S: AsRef<str>>(
        &self,
        answers: &[S],
    ) -> Result<ClassificationResult, InvalidAnswer> {
        if answers.len() != self.expected_answers {
            return Err(InvalidAnswer::AnswerCount {
                expected: self.expected_answers,
                actual: answers.len(),
            });
        }

        let doshas = answers
            .iter()
            .enumerate()
            .map(|(question, answer)| parse_answer(question, answer.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.score(&doshas))
    }

    /// Scores a question-index keyed submission. Every index in
    /// `0..expected_answers` must be present and nothing else may be.
    pub fn classify_indexed(
        &self,
        answers: &BTreeMap<usize, String>,
    ) -> Result<ClassificationResult, InvalidAnswer> {
        if let Some(question) = answers.keys().find(|idx| **idx >= self.expected_answers) {
            return Err(InvalidAnswer::OutOfRange {
                question: *question,
                expected: self.expected_answers,
            });
        }

        let doshas = (0..self.expected_answers)
            .map(|question| match answers.get(&question) {
                Some(answer) => parse_answer(question, answer),
                None => Err(InvalidAnswer::Missing { question }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.score(&doshas))
    }

    fn score(&self, doshas: &[Dosha]) -> ClassificationResult {
        let mut score = ScoreTally::default();
        for dosha in doshas {
            score.increment(*dosha);
        }

        ClassificationResult {
            prakriti_type: self.dominant(&score),
            score,
        }
    }

    fn dominant(&self, score: &ScoreTally) -> Dosha {
        let [first, rest @ ..] = Dosha::ALL;
        rest.into_iter().fold(first, |best, candidate| {
            let (best_count, candidate_count) = (score.get(best), score.get(candidate));
            let keep_best = match self.tie_break {
                TieBreak::FirstListed => best_count >= candidate_count,
                TieBreak::LastListed => best_count > candidate_count,
            };
            if keep_best {
                best
            } else {
                candidate
            }
        })
    }
}

/// A submission as it arrives over the wire: either answers in question
/// order, or an object keyed by zero-based question index. JSON object keys
/// are always strings, so indexed keys are parsed during classification.
/// A `null` answer is an unanswered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerSet {
    Ordered(Vec<Option<String>>),
    Indexed(BTreeMap<String, Option<String>>),
}

impl AnswerSet {
    pub fn len(&self) -> usize {
        match self {
            Self::Ordered(answers) => answers.len(),
            Self::Indexed(answers) => answers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PrakritiClassifier {
    pub fn classify_set(&self, answers: &AnswerSet) -> Result<ClassificationResult, InvalidAnswer> {
        match answers {
            AnswerSet::Ordered(answers) => {
                let tags = answers
                    .iter()
                    .map(|answer| answer.as_deref().unwrap_or_default())
                    .collect::<Vec<_>>();
                self.classify(&tags)
            }
            AnswerSet::Indexed(answers) => {
                let mut keyed = BTreeMap::new();
                for (key, answer) in answers {
                    let question = question_index(key)?;
                    let answer = answer.clone().unwrap_or_default();
                    if keyed.insert(question, answer).is_some() {
                        return Err(InvalidAnswer::QuestionKey { key: key.clone() });
                    }
                }
                self.classify_indexed(&keyed)
            }
        }
    }
}

/// Only the canonical decimal spelling names a question, so `"00"`, `"+0"`
/// and `" 0"` cannot shadow `"0"`.
fn question_index(key: &str) -> Result<usize, InvalidAnswer> {
    key.parse::<usize>()
        .ok()
        .filter(|question| question.to_string() == key)
        .ok_or_else(|| InvalidAnswer::QuestionKey {
            key: key.to_string(),
        })
}

fn parse_answer(question: usize, answer: &str) -> Result<Dosha, InvalidAnswer> {
    if answer.trim().is_empty() {
        return Err(InvalidAnswer::Missing { question });
    }
    Dosha::from_tag(answer).ok_or_else(|| InvalidAnswer::UnknownTag {
        question,
        tag: answer.to_string(),
    })
}
