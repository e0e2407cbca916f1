//! OpenAI-compatible provider (Groq by default).
//!
//! Talks to `/chat/completions` for text and vision requests and to
//! `/audio/transcriptions` for speech. Any endpoint that speaks the OpenAI
//! wire format works once `base_url` points at it.
//!
//! # Example
//!
//! ```rust,ignore
//! use digimind_model::openai::{OpenAICompatibleClient, OpenAICompatibleConfig};
//!
//! let groq = OpenAICompatibleClient::new(OpenAICompatibleConfig::groq(std::env::var("GROQ_API_KEY")?))?;
//!
//! let local = OpenAICompatibleClient::new(
//!     OpenAICompatibleConfig::new("unused", "llama3").with_base_url("http://localhost:11434/v1"),
//! )?;
//! ```

mod client;
mod config;

pub use client::OpenAICompatibleClient;
pub use config::{DEFAULT_TRANSCRIPTION_MODEL, GROQ_API_BASE, OpenAICompatibleConfig};

pub use crate::chat::DEFAULT_CHAT_MODEL;
