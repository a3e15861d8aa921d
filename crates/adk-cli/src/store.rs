use std::fs;
use std::path::PathBuf;

use adk_stream::models::message::Message;
use adk_stream::session::SessionDescriptor;
use adk_stream::transcript::{load_messages, persist_messages};
use anyhow::{Context, Result};

pub fn ensure_data_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let data_dir = home_dir.join(".config").join("adk-chat");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// Local state for the current session: its descriptor and one transcript per session id
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> Self {
        SessionStore { dir }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(ensure_data_dir()?))
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join("config.toml")
    }

    fn session_file(&self) -> PathBuf {
        self.dir.join("session.json")
    }

    pub fn transcript_file(&self, session: &SessionDescriptor) -> PathBuf {
        self.dir
            .join("sessions")
            .join(format!("{}.jsonl", session.session_id))
    }

    pub fn load_session(&self) -> Result<Option<SessionDescriptor>> {
        let path = self.session_file();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let session: SessionDescriptor = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(session).filter(SessionDescriptor::is_valid))
    }

    pub fn save_session(&self, session: &SessionDescriptor) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.session_file(), serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    /// Drop the stored descriptor. Transcripts stay on disk.
    pub fn forget_session(&self) -> Result<()> {
        let path = self.session_file();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn load_transcript(&self, session: &SessionDescriptor) -> Result<Vec<Message>> {
        load_messages(&self.transcript_file(session))
    }

    pub fn save_transcript(&self, session: &SessionDescriptor, messages: &[Message]) -> Result<()> {
        persist_messages(&self.transcript_file(session), messages)
    }

    /// Returns whether there was anything to remove
    pub fn clear_transcript(&self, session: &SessionDescriptor) -> Result<bool> {
        let path = self.transcript_file(session);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn descriptor() -> SessionDescriptor {
        SessionDescriptor {
            session_id: "session-1-abc".to_string(),
            user_id: "user-1".to_string(),
            app_name: "demo_agent".to_string(),
            created_at: 1,
        }
    }

    #[test]
    fn test_session_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let store = SessionStore::new(dir.path().to_path_buf());

        assert!(store.load_session()?.is_none());
        store.save_session(&descriptor())?;
        assert_eq!(store.load_session()?, Some(descriptor()));

        store.forget_session()?;
        assert!(store.load_session()?.is_none());
        store.forget_session()?;
        Ok(())
    }

    #[test]
    fn test_invalid_descriptor_is_ignored() -> Result<()> {
        let dir = tempdir()?;
        let store = SessionStore::new(dir.path().to_path_buf());
        let mut session = descriptor();
        session.user_id.clear();
        store.save_session(&session)?;
        assert!(store.load_session()?.is_none());
        Ok(())
    }

    #[test]
    fn test_transcript_lifecycle() -> Result<()> {
        let dir = tempdir()?;
        let store = SessionStore::new(dir.path().to_path_buf());
        let session = descriptor();

        assert!(store.load_transcript(&session)?.is_empty());
        assert!(!store.clear_transcript(&session)?);

        store.save_transcript(&session, &[Message::user_text("hello")])?;
        assert!(store.transcript_file(&session).ends_with("sessions/session-1-abc.jsonl"));
        assert_eq!(store.load_transcript(&session)?.len(), 1);

        assert!(store.clear_transcript(&session)?);
        assert!(store.load_transcript(&session)?.is_empty());
        Ok(())
    }
}
