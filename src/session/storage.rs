//! File-backed session store
//!
//! Each session lives in its own directory:
//! - `session.json` - the session record
//! - `interactions.jsonl` - one interaction per line, in sequence order

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;

use super::store::{SessionStore, SessionStoreError};
use super::types::{Interaction, NewInteraction, NewSession, Session};

/// Default directory for session storage
const SESSIONS_DIR: &str = "sessions";

/// Highest sequence seen for a session, loaded lazily from disk
type SequenceCursor = Arc<Mutex<Option<i64>>>;

/// Session store writing JSON files under a base directory
#[derive(Debug)]
pub struct FileSessionStore {
    base_dir: PathBuf,
    cursors: DashMap<String, SequenceCursor>,
}

impl FileSessionStore {
    /// Create a store in the default directory
    pub fn new() -> Self {
        Self::with_dir(SESSIONS_DIR)
    }

    /// Create a store in a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
            cursors: DashMap::new(),
        }
    }

    /// Directory for a session
    ///
    /// The id must be a single plain path component, so a caller-supplied id
    /// can never point outside the base directory.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        let mut components = Path::new(session_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == session_id => {
                Ok(self.base_dir.join(session_id))
            }
            _ => Err(SessionStoreError::InvalidId(session_id.to_string())),
        }
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        Ok(self.session_dir(session_id)?.join("session.json"))
    }

    fn interactions_path(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        Ok(self.session_dir(session_id)?.join("interactions.jsonl"))
    }

    /// Base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn write_session(&self, session: &Session) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(&session.id)?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        // Write then rename so readers never see a half-written record
        let tmp = dir.join("session.json.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, session)?;
        writer.flush()?;
        fs::rename(&tmp, dir.join("session.json"))?;
        Ok(())
    }

    fn read_session(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    fn read_interactions(&self, session_id: &str) -> Result<Vec<Interaction>, SessionStoreError> {
        let path = self.interactions_path(session_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut interactions = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            interactions.push(serde_json::from_str(&line)?);
        }
        Ok(interactions)
    }

    fn cursor(&self, session_id: &str) -> SequenceCursor {
        self.cursors
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Append under the session's cursor lock
    fn append_locked(&self, new: NewInteraction) -> Result<Interaction, SessionStoreError> {
        let cursor = self.cursor(&new.session_id);
        let mut highest = cursor
            .lock()
            .map_err(|e| SessionStoreError::Storage(e.to_string()))?;

        let mut session = self
            .read_session(&new.session_id)?
            .ok_or_else(|| SessionStoreError::NotFound(new.session_id.clone()))?;

        if highest.is_none() {
            *highest = self
                .read_interactions(&new.session_id)?
                .last()
                .map(|i| i.sequence);
        }
        let sequence = highest.map(|s| s + 1).unwrap_or(1);
        let interaction = new.into_interaction(sequence);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.interactions_path(&interaction.session_id)?)?;
        writeln!(file, "{}", serde_json::to_string(&interaction)?)?;
        *highest = Some(sequence);

        // The interaction is stored at this point; a stale timestamp is not
        // worth failing the append over.
        session.updated_at = Utc::now();
        if let Err(e) = self.write_session(&session) {
            tracing::warn!(
                "[FileSessionStore] Appended {} to session {} but failed to update its timestamp: {}",
                sequence,
                session.id,
                e
            );
        }
        Ok(interaction)
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, SessionStoreError> {
        let session = new.into_session();
        self.write_session(&session)?;
        tracing::debug!(
            "[FileSessionStore] Created session {} in {}",
            session.id,
            self.base_dir.display()
        );
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        self.read_session(session_id)
    }

    async fn append_interaction(
        &self,
        new: NewInteraction,
    ) -> Result<Interaction, SessionStoreError> {
        self.append_locked(new)
    }

    async fn highest_sequence(&self, session_id: &str) -> Result<Option<i64>, SessionStoreError> {
        if self.read_session(session_id)?.is_none() {
            return Err(SessionStoreError::NotFound(session_id.to_string()));
        }
        Ok(self.read_interactions(session_id)?.last().map(|i| i.sequence))
    }

    async fn list_interactions(
        &self,
        session_id: &str,
    ) -> Result<Vec<Interaction>, SessionStoreError> {
        if self.read_session(session_id)?.is_none() {
            return Err(SessionStoreError::NotFound(session_id.to_string()));
        }
        self.read_interactions(session_id)
    }
}
