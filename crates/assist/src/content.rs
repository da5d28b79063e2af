use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::upstream_message;
use crate::{AssistError, OpenAiConfig};

const MAX_TOKENS: u32 = 1500;
const TEMPERATURE: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    DailyTips,
    DietPlan,
    WellnessArticle,
    MeditationGuide,
}

impl ContentType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "daily_tips" => Some(Self::DailyTips),
            "diet_plan" => Some(Self::DietPlan),
            "wellness_article" => Some(Self::WellnessArticle),
            "meditation_guide" => Some(Self::MeditationGuide),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyTips => "daily_tips",
            Self::DietPlan => "diet_plan",
            Self::WellnessArticle => "wellness_article",
            Self::MeditationGuide => "meditation_guide",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPreferences {
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub content_type: String,
    #[serde(default)]
    pub user_profile: Option<serde_json::Value>,
    #[serde(default)]
    pub preferences: Option<ContentPreferences>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content: String,
    pub content_type: ContentType,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

pub fn build_prompts(
    content_type: ContentType,
    user_profile: Option<&serde_json::Value>,
    preferences: Option<&ContentPreferences>,
) -> PromptPair {
    let prakriti = user_profile
        .and_then(|profile| profile.get("prakriti"))
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match content_type {
        ContentType::DailyTips => PromptPair {
            system: "You are an expert Ayurvedic wellness advisor. Generate personalized daily wellness tips based on Ayurvedic principles.".to_string(),
            user: format!(
                "Create 3 personalized daily wellness tips for a user with the following profile: {}. Include practical advice for diet, lifestyle, and mindfulness. Keep each tip concise and actionable.",
                user_profile
                    .map(|profile| profile.to_string())
                    .unwrap_or_else(|| "{}".to_string())
            ),
        },
        ContentType::DietPlan => PromptPair {
            system: "You are an Ayurvedic nutrition expert. Create personalized meal recommendations based on Prakriti and current health needs.".to_string(),
            user: format!(
                "Generate a personalized daily diet plan for a user with Prakriti: {}. Include breakfast, lunch, dinner, and snacks. Consider seasonal foods and Ayurvedic principles. Format as a structured meal plan.",
                prakriti.unwrap_or("Unknown")
            ),
        },
        ContentType::WellnessArticle => PromptPair {
            system: "You are an Ayurvedic health writer. Create educational content that is informative, engaging, and based on traditional Ayurvedic wisdom.".to_string(),
            user: format!(
                "Write a short wellness article (300-400 words) about {}. Include practical tips and explain the Ayurvedic perspective. Make it engaging and educational.",
                preferences
                    .and_then(|value| value.topic.as_deref())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or("general Ayurvedic wellness")
            ),
        },
        ContentType::MeditationGuide => PromptPair {
            system: "You are a mindfulness and meditation expert with deep knowledge of Ayurvedic practices.".to_string(),
            user: format!(
                "Create a personalized 10-minute meditation guide for someone with {} constitution. Include breathing techniques and visualization. Focus on balancing their specific dosha.",
                prakriti.unwrap_or("balanced")
            ),
        },
    }
}

fn chat_payload(model: &str, prompts: &PromptPair) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": prompts.system },
            { "role": "user", "content": prompts.user }
        ],
        "max_tokens": MAX_TOKENS,
        "temperature": TEMPERATURE,
    })
}

fn extract_chat_content(payload: &serde_json::Value) -> Option<String> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
        .filter(|value| !value.trim().is_empty())
}

#[derive(Clone)]
pub struct ContentGenerator {
    http: Client,
    config: Option<OpenAiConfig>,
}

impl ContentGenerator {
    pub fn new(http: Client, config: Option<OpenAiConfig>) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    #[instrument(skip(self, request), fields(content_type = %request.content_type))]
    pub async fn generate(&self, request: &ContentRequest) -> Result<GeneratedContent, AssistError> {
        let content_type = ContentType::parse(&request.content_type)
            .ok_or_else(|| AssistError::InvalidRequest("Invalid content type".to_string()))?;
        let config = self
            .config
            .as_ref()
            .ok_or(AssistError::NotConfigured("content generation"))?;

        let prompts = build_prompts(
            content_type,
            request.user_profile.as_ref(),
            request.preferences.as_ref(),
        );
        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(url)
            .bearer_auth(config.api_key.as_str())
            .json(&chat_payload(&config.model, &prompts))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "content generation upstream failure");
            return Err(AssistError::Upstream {
                status: status.as_u16(),
                body: upstream_message(&body),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let content = extract_chat_content(&body).ok_or(AssistError::EmptyResult)?;
        info!(chars = content.len(), "content generated");

        Ok(GeneratedContent {
            content,
            content_type,
            generated_at: Utc::now(),
        })
    }
}
