use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::upstream_message;
use crate::{AssistError, GoogleSpeechConfig};

pub const DEFAULT_VOICE: &str = "en-US-Journey-F";

const LANGUAGE_CODE: &str = "en-US";

/// Maps the client-facing voice names to provider voices.
pub fn voice_for(name: Option<&str>) -> &'static str {
    match name.map(|value| value.trim().to_lowercase()).as_deref() {
        Some("echo") => "en-US-Casual-K",
        Some("fable") => "en-US-Journey-D",
        Some("onyx") => "en-US-Journey-O",
        // alloy, nova and shimmer all use the default voice.
        _ => DEFAULT_VOICE,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedSpeech {
    /// Base64-encoded MP3.
    pub audio_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    #[serde(default)]
    pub audio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
}

fn synthesis_payload(text: &str, voice: &str) -> serde_json::Value {
    serde_json::json!({
        "input": { "text": text },
        "voice": {
            "languageCode": LANGUAGE_CODE,
            "name": voice,
            "ssmlGender": "FEMALE"
        },
        "audioConfig": {
            "audioEncoding": "MP3",
            "speakingRate": 1.0,
            "pitch": 0.0
        }
    })
}

fn recognition_payload(audio_base64: &str) -> serde_json::Value {
    serde_json::json!({
        "config": {
            "encoding": "WEBM_OPUS",
            "sampleRateHertz": 48000,
            "languageCode": LANGUAGE_CODE,
            "model": "latest_long",
            "useEnhanced": true
        },
        "audio": { "content": audio_base64 }
    })
}

/// `None` when the provider returned no results at all. An empty transcript
/// inside a result is passed through.
fn extract_transcript(payload: &serde_json::Value) -> Option<String> {
    let first = payload.get("results")?.as_array()?.first()?;
    Some(
        first
            .pointer("/alternatives/0/transcript")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string(),
    )
}

async fn post_json(
    http: &Client,
    url: &str,
    api_key: &str,
    payload: &serde_json::Value,
) -> Result<serde_json::Value, AssistError> {
    let response = http
        .post(url)
        .query(&[("key", api_key)])
        .json(payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "speech upstream failure");
        return Err(AssistError::Upstream {
            status: status.as_u16(),
            body: upstream_message(&body),
        });
    }

    Ok(response.json().await?)
}

#[derive(Clone)]
pub struct SpeechSynthesizer {
    http: Client,
    config: Option<GoogleSpeechConfig>,
}

impl SpeechSynthesizer {
    pub fn new(http: Client, config: Option<GoogleSpeechConfig>) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    #[instrument(skip(self, request))]
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedSpeech, AssistError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(AssistError::InvalidRequest("Text is required".to_string()));
        }
        let config = self
            .config
            .as_ref()
            .ok_or(AssistError::NotConfigured("speech synthesis"))?;

        let voice = voice_for(request.voice.as_deref());
        let body = post_json(
            &self.http,
            &config.synthesize_url,
            &config.api_key,
            &synthesis_payload(text, voice),
        )
        .await?;

        let audio_content = body
            .get("audioContent")
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .ok_or(AssistError::EmptyResult)?
            .to_string();
        info!(voice, chars = text.len(), "speech synthesized");

        Ok(SynthesizedSpeech { audio_content })
    }
}

#[derive(Clone)]
pub struct SpeechRecognizer {
    http: Client,
    config: Option<GoogleSpeechConfig>,
}

impl SpeechRecognizer {
    pub fn new(http: Client, config: Option<GoogleSpeechConfig>) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    #[instrument(skip(self, request))]
    pub async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, AssistError> {
        let audio = request.audio.trim();
        if audio.is_empty() {
            return Err(AssistError::InvalidRequest(
                "No audio data provided".to_string(),
            ));
        }
        let bytes = STANDARD
            .decode(audio)
            .map_err(|_| AssistError::InvalidRequest("Audio is not valid base64".to_string()))?;
        let config = self
            .config
            .as_ref()
            .ok_or(AssistError::NotConfigured("speech recognition"))?;

        let body = post_json(
            &self.http,
            &config.recognize_url,
            &config.api_key,
            &recognition_payload(&STANDARD.encode(&bytes)),
        )
        .await?;

        let text = extract_transcript(&body).ok_or(AssistError::EmptyResult)?;
        info!(audio_bytes = bytes.len(), "speech transcribed");

        Ok(Transcription { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_voices_and_defaults_the_rest() {
        assert_eq!(voice_for(Some("echo")), "en-US-Casual-K");
        assert_eq!(voice_for(Some("onyx")), "en-US-Journey-O");
        assert_eq!(voice_for(Some("shimmer")), DEFAULT_VOICE);
        assert_eq!(voice_for(Some("robot")), DEFAULT_VOICE);
        assert_eq!(voice_for(None), DEFAULT_VOICE);
    }

    #[test]
    fn synthesis_requests_mp3() {
        let payload = synthesis_payload("Breathe in", "en-US-Journey-D");
        assert_eq!(payload["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(payload["voice"]["name"], "en-US-Journey-D");
        assert_eq!(payload["input"]["text"], "Breathe in");
    }

    #[test]
    fn recognition_uses_webm_opus_at_48k() {
        let payload = recognition_payload("AAAA");
        assert_eq!(payload["config"]["encoding"], "WEBM_OPUS");
        assert_eq!(payload["config"]["sampleRateHertz"], 48000);
        assert_eq!(payload["config"]["model"], "latest_long");
    }

    #[test]
    fn transcript_requires_results() {
        let body = serde_json::json!({
            "results": [{ "alternatives": [{ "transcript": "how do I balance vata" }] }]
        });
        assert_eq!(
            extract_transcript(&body).as_deref(),
            Some("how do I balance vata")
        );
        assert!(extract_transcript(&serde_json::json!({})).is_none());
        assert!(extract_transcript(&serde_json::json!({ "results": [] })).is_none());
    }

    #[tokio::test]
    async fn validates_input_before_calling_out() {
        let synthesizer = SpeechSynthesizer::new(Client::new(), None);
        let err = synthesizer
            .synthesize(&SynthesisRequest {
                text: "   ".to_string(),
                voice: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::InvalidRequest(_)));

        let recognizer = SpeechRecognizer::new(Client::new(), None);
        let err = recognizer
            .transcribe(&TranscriptionRequest {
                audio: "not base64!".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::InvalidRequest(_)));

        let err = recognizer
            .transcribe(&TranscriptionRequest {
                audio: "AAAA".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssistError::NotConfigured(_)));
    }
}
