//! Durable "remember me" hint. At most one email and one flag survive a
//! restart, stored as a single JSON file so the pair is always written
//! atomically (temp file + rename; readers never observe a partial write).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const HINT_FILE: &str = "remembered_login.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct Hint {
    email: Option<String>,
    remember_me: bool,
}

/// File-backed store for the remembered-login hint.
#[derive(Debug, Clone)]
pub struct RememberStore {
    path: PathBuf,
}

impl RememberStore {
    /// Opens (or lazily creates) the store under `state_dir`.
    pub fn open(state_dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = state_dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(HINT_FILE),
        })
    }

    /// Whether the user opted into remembering their email.
    #[must_use]
    pub fn remember_me(&self) -> bool {
        self.load().remember_me
    }

    /// The remembered email. Empty when the flag is off, regardless of what
    /// an older file version may still contain.
    #[must_use]
    pub fn remembered_email(&self) -> Option<String> {
        let hint = self.load();
        if hint.remember_me {
            hint.email
        } else {
            None
        }
    }

    pub fn set_remember(&self, remember: bool) {
        let mut hint = self.load();
        hint.remember_me = remember;
        if !remember {
            hint.email = None;
        }
        self.save(&hint);
    }

    pub fn set_email(&self, email: &str) {
        let mut hint = self.load();
        hint.email = Some(email.to_string());
        self.save(&hint);
    }

    pub fn clear_email(&self) {
        let mut hint = self.load();
        if hint.email.is_some() {
            hint.email = None;
            self.save(&hint);
        }
    }

    fn load(&self) -> Hint {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!("Discarding unreadable remembered-login hint: {err}");
                Hint::default()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Hint::default(),
            Err(err) => {
                warn!("Failed to read remembered-login hint: {err}");
                Hint::default()
            }
        }
    }

    fn save(&self, hint: &Hint) {
        let tmp = self.path.with_extension("json.tmp");
        let result = serde_json::to_vec_pretty(hint)
            .map_err(io::Error::other)
            .and_then(|bytes| fs::write(&tmp, bytes))
            .and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(err) = result {
            warn!("Failed to persist remembered-login hint: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_email_when_remember_is_on() {
        let dir = tempfile::tempdir().unwrap();
        let store = RememberStore::open(dir.path()).unwrap();

        store.set_remember(true);
        store.set_email("ada@example.com");

        // A fresh handle simulates a process restart.
        let reopened = RememberStore::open(dir.path()).unwrap();
        assert!(reopened.remember_me());
        assert_eq!(
            reopened.remembered_email().as_deref(),
            Some("ada@example.com")
        );
    }

    #[test]
    fn no_email_survives_with_remember_off() {
        let dir = tempfile::tempdir().unwrap();
        let store = RememberStore::open(dir.path()).unwrap();

        store.set_email("ada@example.com");
        store.set_remember(false);

        let reopened = RememberStore::open(dir.path()).unwrap();
        assert!(!reopened.remember_me());
        assert_eq!(reopened.remembered_email(), None);
    }

    #[test]
    fn turning_remember_off_drops_the_stored_email() {
        let dir = tempfile::tempdir().unwrap();
        let store = RememberStore::open(dir.path()).unwrap();

        store.set_remember(true);
        store.set_email("ada@example.com");
        store.set_remember(false);

        let raw = fs::read_to_string(dir.path().join(HINT_FILE)).unwrap();
        assert!(!raw.contains("ada@example.com"));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(HINT_FILE), b"{not json").unwrap();

        let store = RememberStore::open(dir.path()).unwrap();
        assert!(!store.remember_me());
        assert_eq!(store.remembered_email(), None);
    }

    #[test]
    fn writes_leave_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = RememberStore::open(dir.path()).unwrap();
        store.set_remember(true);
        store.set_email("ada@example.com");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
