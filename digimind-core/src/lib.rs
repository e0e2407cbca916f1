//! # digimind-core
//!
//! Shared building blocks for the DigiMind question-answering stack.
//!
//! ## Overview
//!
//! - [`Message`], [`Role`] and [`Part`] describe an ordered conversation.
//! - [`GenerationRequest`] is the call shape every hosted model endpoint takes.
//! - [`ChatModel`] is the capability interface the rest of the workspace
//!   depends on; concrete adapters live in `digimind-model`.
//! - [`ModelError`] is the typed error returned by those adapters.
//! - [`RetryPolicy`] retries transient failures with a bounded back-off.
//! - [`fallback_message`] turns a final error into text a user can read.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use digimind_core::{ChatModel, GenerationRequest, Message, RetryPolicy};
//!
//! let request = GenerationRequest::new("llama-3.3-70b-versatile", vec![Message::user("hi")]);
//! let reply = RetryPolicy::default().execute(|| model.generate(request.clone())).await?;
//! ```

pub mod error;
pub mod fallback;
pub mod model;
pub mod retry;
pub mod types;

pub use error::{ModelError, Result, Retryable};
pub use fallback::fallback_message;
pub use model::ChatModel;
pub use retry::{Backoff, RetryPolicy};
pub use types::{GenerationRequest, Message, Part, Role};
