//! # digimind-model
//!
//! Hosted model integrations for DigiMind.
//!
//! ## Overview
//!
//! - [`OpenAICompatibleClient`] - Groq (default) or any OpenAI-compatible API,
//!   for chat completions and audio transcription
//! - [`MockModel`] - scripted responses for tests
//! - [`ChatAssistant`] - persona chat over an explicit history
//! - [`ImageAnalyzer`] - questions about an uploaded image
//! - [`VoiceChat`] - transcribe a clip, then answer it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use digimind_model::{ChatAssistant, OpenAICompatibleClient, OpenAICompatibleConfig};
//!
//! let client = Arc::new(OpenAICompatibleClient::new(OpenAICompatibleConfig::from_env()?)?);
//! let assistant = ChatAssistant::new(client);
//! let reply = assistant.respond(&[], "hello").await;
//! ```
//!
//! Every user-facing entry point returns a `String`: failures are turned
//! into short readable messages rather than propagated.

pub mod chat;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod speech;
pub mod vision;

pub use chat::{ChatAssistant, DEFAULT_CHAT_MODEL};
pub use mock::MockModel;
#[cfg(feature = "openai")]
pub use openai::{OpenAICompatibleClient, OpenAICompatibleConfig};
pub use speech::{AudioClip, SpeechToText, VoiceChat, VoiceReply};
pub use vision::{ImageAnalyzer, ImageInput};

pub use digimind_core::{ChatModel, GenerationRequest, Message, ModelError, RetryPolicy, Role};
