use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dosha {
    #[serde(alias = "vata")]
    Vata,
    #[serde(alias = "pitta")]
    Pitta,
    #[serde(alias = "kapha")]
    Kapha,
}

impl Dosha {
    /// Fixed enumeration order. Tie-breaking is defined against this order.
    pub const ALL: [Dosha; 3] = [Dosha::Vata, Dosha::Pitta, Dosha::Kapha];

    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vata" => Some(Self::Vata),
            "pitta" => Some(Self::Pitta),
            "kapha" => Some(Self::Kapha),
            _ => None,
        }
    }

    /// Parses the capitalized label exactly as stored alongside results.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim() {
            "Vata" => Some(Self::Vata),
            "Pitta" => Some(Self::Pitta),
            "Kapha" => Some(Self::Kapha),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Vata => "vata",
            Self::Pitta => "pitta",
            Self::Kapha => "kapha",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Vata => "Vata",
            Self::Pitta => "Pitta",
            Self::Kapha => "Kapha",
        }
    }
}

impl std::fmt::Display for Dosha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTally {
    pub vata: u32,
    pub pitta: u32,
    pub kapha: u32,
}

impl ScoreTally {
    pub fn get(&self, dosha: Dosha) -> u32 {
        match dosha {
            Dosha::Vata => self.vata,
            Dosha::Pitta => self.pitta,
            Dosha::Kapha => self.kapha,
        }
    }

    pub fn increment(&mut self, dosha: Dosha) {
        match dosha {
            Dosha::Vata => self.vata += 1,
            Dosha::Pitta => self.pitta += 1,
            Dosha::Kapha => self.kapha += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.vata + self.pitta + self.kapha
    }

    pub fn max_count(&self) -> u32 {
        self.vata.max(self.pitta).max(self.kapha)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "prakritiType")]
    pub prakriti_type: Dosha,
    pub score: ScoreTally,
}

impl ClassificationResult {
    pub fn label(&self) -> &'static str {
        self.prakriti_type.label()
    }

    /// Categories sharing the winning count, in `Dosha::ALL` order.
    pub fn contenders(&self) -> Vec<Dosha> {
        let top = self.score.max_count();
        Dosha::ALL
            .into_iter()
            .filter(|dosha| self.score.get(*dosha) == top)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: Dosha,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u8,
    pub question: String,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrakritiRecord {
    pub result_id: String,
    pub user_id: String,
    pub prakriti_type: Dosha,
    pub score: ScoreTally,
    pub created_at: DateTime<Utc>,
}

impl PrakritiRecord {
    pub fn classification(&self) -> ClassificationResult {
        ClassificationResult {
            prakriti_type: self.prakriti_type,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub follow_up_id: String,
    pub user_id: String,
    pub reminder_date: NaiveDate,
    pub feedback: String,
    pub progress_notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpDraft {
    pub reminder_date: NaiveDate,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub progress_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub age: Option<u8>,
    pub gender: Option<String>,
    pub health_history: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<String>,
    pub health_history: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietPlan {
    pub prakriti_type: Dosha,
    pub breakfast: String,
    pub lunch: String,
    pub dinner: String,
    pub snacks: String,
    pub characteristics: Vec<String>,
    pub avoid: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySchedule {
    pub prakriti_type: Dosha,
    pub wake_up: String,
    pub meditation: String,
    pub exercise: String,
    pub breakfast: String,
    pub work: String,
    pub lunch: String,
    pub rest: Option<String>,
    pub work_afternoon: String,
    pub dinner: String,
    pub relaxation: String,
    pub sleep: String,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstitutionProfile {
    pub prakriti_type: Dosha,
    pub elements: String,
    pub summary: String,
    pub characteristics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_prakriti_tests: u64,
    pub total_follow_ups: u64,
    pub recent_follow_ups: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Prakriti,
    FollowUp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryView {
    pub results: Vec<PrakritiRecord>,
    pub recent_follow_ups: Vec<FollowUp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dosha_tags_are_case_folded_but_labels_are_exact() {
        assert_eq!(Dosha::from_tag(" Pitta "), Some(Dosha::Pitta));
        assert_eq!(Dosha::from_tag("unknown"), None);
        assert_eq!(Dosha::from_label("Kapha"), Some(Dosha::Kapha));
        assert_eq!(Dosha::from_label("kapha"), None);
    }

    #[test]
    fn classification_serializes_with_external_contract() {
        let result = ClassificationResult {
            prakriti_type: Dosha::Vata,
            score: ScoreTally {
                vata: 3,
                pitta: 1,
                kapha: 1,
            },
        };
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "prakritiType": "Vata",
                "score": { "vata": 3, "pitta": 1, "kapha": 1 }
            })
        );
    }

    #[test]
    fn dosha_deserializes_from_tag_or_label() {
        let from_tag: Dosha = serde_json::from_str("\"pitta\"").unwrap();
        let from_label: Dosha = serde_json::from_str("\"Pitta\"").unwrap();
        assert_eq!(from_tag, from_label);
    }
}
