//! # digimind-session
//!
//! The chat transcript shown to the user, persisted as a JSON array.
//!
//! The file is read once at start-up and rewritten in full after every
//! turn. Each element looks like
//! `{"role": "user" | "bot", "content": "...", "type": "image"}`, where
//! `type` is omitted for text turns.
//!
//! ```rust,ignore
//! use digimind_session::{ChatHistory, DEFAULT_HISTORY_FILE};
//!
//! let mut history = ChatHistory::load(DEFAULT_HISTORY_FILE).await?;
//! history.record_exchange(question, answer);
//! history.save(DEFAULT_HISTORY_FILE).await?;
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use digimind_core::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// File used when the caller does not choose one.
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.json";

/// Errors from reading or writing a history file.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The file exists but is not a valid history.
    #[error("chat history at {} is corrupt: {message}", path.display())]
    Corrupt {
        /// The history file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The file could not be read or written.
    #[error("chat history I/O error at {}: {message}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// OS error message.
        message: String,
    },
}

/// A convenience result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Bot,
}

/// What a turn's content holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    #[default]
    Text,
    /// `content` is an image reference (path or `data:` URL).
    Image,
}

impl TurnKind {
    fn is_text(&self) -> bool {
        *self == Self::Text
    }
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "TurnKind::is_text")]
    pub kind: TurnKind,
}

impl Turn {
    /// A text turn typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: content.into(), kind: TurnKind::Text }
    }

    /// A text turn produced by the assistant.
    pub fn bot(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Bot, content: content.into(), kind: TurnKind::Text }
    }

    /// An image uploaded by the user.
    pub fn image(reference: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: reference.into(), kind: TurnKind::Image }
    }
}

/// Ordered, append-only transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<Turn>,
}

impl ChatHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a history file. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// [`SessionError::Corrupt`] if the file is not a JSON array of turns.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no chat history yet");
                return Ok(Self::new());
            }
            Err(e) => return Err(SessionError::Io { path: path.to_path_buf(), message: e.to_string() }),
        };
        let history: Self = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(path = %path.display(), error = %e, "unreadable chat history");
            SessionError::Corrupt { path: path.to_path_buf(), message: e.to_string() }
        })?;
        debug!(path = %path.display(), turns = history.len(), "loaded chat history");
        Ok(history)
    }

    /// Rewrite the whole file with the current transcript.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_error = |p: &Path, e: std::io::Error| SessionError::Io { path: p.to_path_buf(), message: e.to_string() };

        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| SessionError::Io { path: path.to_path_buf(), message: e.to_string() })?;
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes).await.map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| io_error(path, e))
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append a user question and the reply to it.
    pub fn record_exchange(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        self.push(Turn::user(user));
        self.push(Turn::bot(reply));
    }

    /// Forget every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text turns as chat messages, for passing prior context to a model.
    /// Image turns are skipped.
    pub fn to_messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .filter(|t| t.kind.is_text())
            .map(|t| match t.role {
                TurnRole::User => Message::user(t.content.clone()),
                TurnRole::Bot => Message::assistant(t.content.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use digimind_core::Role;

    use super::*;

    #[test]
    fn wire_format_matches_existing_files() {
        let json = r#"[
            {"role": "user", "content": "hi"},
            {"role": "bot", "content": "hello"},
            {"role": "user", "content": "cat.png", "type": "image"}
        ]"#;
        let history: ChatHistory = serde_json::from_str(json).unwrap();
        assert_eq!(history.turns(), [Turn::user("hi"), Turn::bot("hello"), Turn::image("cat.png")]);

        let written = serde_json::to_value(&history).unwrap();
        assert!(written[0].get("type").is_none());
        assert_eq!(written[2]["type"], "image");
    }

    #[test]
    fn messages_skip_images() {
        let mut history = ChatHistory::new();
        history.push(Turn::image("cat.png"));
        history.record_exchange("what is this?", "a cat");

        let messages = history.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text(), "a cat");
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = ChatHistory::load(dir.path().join(DEFAULT_HISTORY_FILE)).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn save_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_HISTORY_FILE);

        let mut history = ChatHistory::new();
        history.record_exchange("q", "a");
        history.save(&path).await.unwrap();
        assert_eq!(ChatHistory::load(&path).await.unwrap(), history);

        history.clear();
        history.save(&path).await.unwrap();
        assert!(ChatHistory::load(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_HISTORY_FILE);
        tokio::fs::write(&path, b"{\"role\": 42}").await.unwrap();
        assert!(matches!(ChatHistory::load(&path).await, Err(SessionError::Corrupt { .. })));
    }
}
