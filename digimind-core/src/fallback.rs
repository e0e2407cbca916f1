//! User-facing messages for failed model calls.
//!
//! Every API-calling entry point in the workspace returns something
//! displayable. These helpers turn a final [`ModelError`] into that text.

use crate::error::ModelError;

/// Shown when every attempt timed out.
pub const TIMEOUT_MESSAGE: &str = "The request timed out. Please try again later.";

/// Shown when every attempt was rate limited.
pub const RETRIES_EXHAUSTED_MESSAGE: &str =
    "Sorry, I couldn't process your request after multiple attempts.";

/// Shown when the configured model does not exist.
pub const UNAVAILABLE_MESSAGE: &str =
    "Error: The AI service is currently unavailable. Please try again later.";

/// Convert the last error of a retried call into a user-facing message.
pub fn fallback_message(err: &ModelError) -> String {
    match err {
        ModelError::Timeout => TIMEOUT_MESSAGE.to_string(),
        ModelError::RateLimited(_) => RETRIES_EXHAUSTED_MESSAGE.to_string(),
        other => format!("API Error: {other}"),
    }
}
