mod content;
mod error;
mod speech;

use std::env;

use reqwest::Client;
use serde::Serialize;

pub use content::{
    build_prompts, ContentGenerator, ContentPreferences, ContentRequest, ContentType,
    GeneratedContent, PromptPair,
};
pub use error::AssistError;
pub use speech::{
    voice_for, SpeechRecognizer, SpeechSynthesizer, SynthesisRequest, SynthesizedSpeech,
    Transcription, TranscriptionRequest, DEFAULT_VOICE,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
pub const DEFAULT_STT_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GoogleSpeechConfig {
    pub api_key: String,
    pub synthesize_url: String,
    pub recognize_url: String,
}

/// Provider credentials. A missing key leaves that proxy disabled.
#[derive(Debug, Clone, Default)]
pub struct AssistConfig {
    pub openai: Option<OpenAiConfig>,
    pub google: Option<GoogleSpeechConfig>,
}

impl AssistConfig {
    pub fn from_env() -> Self {
        let openai = non_empty_env("AYURWELL_OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: non_empty_env("AYURWELL_OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: non_empty_env("AYURWELL_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });
        let google = non_empty_env("AYURWELL_GOOGLE_API_KEY").map(|api_key| GoogleSpeechConfig {
            api_key,
            synthesize_url: non_empty_env("AYURWELL_GOOGLE_TTS_URL")
                .unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            recognize_url: non_empty_env("AYURWELL_GOOGLE_STT_URL")
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
        });

        Self { openai, google }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssistStatus {
    pub content: bool,
    pub speech: bool,
}

/// The three proxies, sharing one HTTP client.
#[derive(Clone)]
pub struct Assistants {
    pub content: ContentGenerator,
    pub synthesizer: SpeechSynthesizer,
    pub recognizer: SpeechRecognizer,
}

impl Assistants {
    pub fn new(http: Client, config: AssistConfig) -> Self {
        Self {
            content: ContentGenerator::new(http.clone(), config.openai),
            synthesizer: SpeechSynthesizer::new(http.clone(), config.google.clone()),
            recognizer: SpeechRecognizer::new(http, config.google),
        }
    }

    pub fn status(&self) -> AssistStatus {
        AssistStatus {
            content: self.content.is_configured(),
            speech: self.synthesizer.is_configured(),
        }
    }
}
