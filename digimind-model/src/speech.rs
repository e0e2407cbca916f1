//! Speech-to-text and voice conversation.
//!
//! Capturing and playing audio is left to the host application; this module
//! only deals with recorded clips.

use std::sync::Arc;

use async_trait::async_trait;
use digimind_core::{Message, Result};
use tracing::{info, warn};

use crate::chat::ChatAssistant;

/// Reply used when a clip produced no words.
pub const NOT_UNDERSTOOD_MESSAGE: &str = "Could not understand audio";

/// A recorded audio clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    file_name: String,
    mime_type: String,
    data: Vec<u8>,
}

impl AudioClip {
    /// Wrap recorded bytes. The MIME type is guessed from the file extension.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for_file_name(&file_name).to_string();
        Self { file_name, mime_type, data }
    }

    /// The file name sent with the upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The MIME type sent with the upload.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The raw audio bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn mime_for_file_name(file_name: &str) -> &'static str {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// A speech recognition backend.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Return the words spoken in `clip`.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

/// Outcome of one spoken turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceReply {
    /// What the user said, if recognition succeeded.
    pub transcript: Option<String>,
    /// What to show (or speak) back.
    pub reply: String,
}

/// Transcribes a clip and answers it with a [`ChatAssistant`].
pub struct VoiceChat {
    speech: Arc<dyn SpeechToText>,
    assistant: ChatAssistant,
}

impl VoiceChat {
    /// Create a voice chat from a recogniser and an assistant.
    pub fn new(speech: Arc<dyn SpeechToText>, assistant: ChatAssistant) -> Self {
        Self { speech, assistant }
    }

    /// Handle one spoken turn. Never fails: errors become readable messages.
    pub async fn reply(&self, history: &[Message], clip: &AudioClip) -> VoiceReply {
        let transcript = match self.speech.transcribe(clip).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "speech recognition failed");
                return VoiceReply {
                    transcript: None,
                    reply: format!("Error with speech recognition service: {e}"),
                };
            }
        };

        if transcript.is_empty() {
            return VoiceReply { transcript: None, reply: NOT_UNDERSTOOD_MESSAGE.to_string() };
        }

        info!(chars = transcript.chars().count(), "transcribed voice input");
        let reply = self.assistant.respond(history, &transcript).await;
        VoiceReply { transcript: Some(transcript), reply }
    }
}

#[cfg(test)]
mod tests {
    use digimind_core::ModelError;

    use super::*;
    use crate::mock::MockModel;

    struct FixedTranscript(Result<String>);

    #[async_trait]
    impl SpeechToText for FixedTranscript {
        async fn transcribe(&self, _clip: &AudioClip) -> Result<String> {
            self.0.clone()
        }
    }

    fn clip() -> AudioClip {
        AudioClip::new("turn.WAV", vec![1, 2, 3])
    }

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(clip().mime_type(), "audio/wav");
        assert_eq!(AudioClip::new("a.mp3", vec![]).mime_type(), "audio/mpeg");
        assert_eq!(AudioClip::new("noext", vec![]).mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn transcript_is_answered() {
        let model = Arc::new(MockModel::new("mock").with_response("sunny"));
        let voice = VoiceChat::new(
            Arc::new(FixedTranscript(Ok(" what's the weather? ".into()))),
            ChatAssistant::new(model.clone()),
        );

        let reply = voice.reply(&[], &clip()).await;
        assert_eq!(reply.transcript.as_deref(), Some("what's the weather?"));
        assert_eq!(reply.reply, "sunny");
        assert_eq!(model.requests()[0].messages.last().unwrap().text(), "what's the weather?");
    }

    #[tokio::test]
    async fn silence_is_not_sent_to_the_model() {
        let model = Arc::new(MockModel::new("mock"));
        let voice =
            VoiceChat::new(Arc::new(FixedTranscript(Ok("   ".into()))), ChatAssistant::new(model.clone()));

        let reply = voice.reply(&[], &clip()).await;
        assert_eq!(reply.reply, NOT_UNDERSTOOD_MESSAGE);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn recognition_errors_are_reported() {
        let model = Arc::new(MockModel::new("mock"));
        let voice = VoiceChat::new(
            Arc::new(FixedTranscript(Err(ModelError::Unauthorized("bad key".into())))),
            ChatAssistant::new(model),
        );

        let reply = voice.reply(&[], &clip()).await;
        assert!(reply.transcript.is_none());
        assert_eq!(reply.reply, "Error with speech recognition service: unauthorized: bad key");
    }
}
