//! Per-profile user identity.
//!
//! The identity is an opaque token generated once per profile and sent with
//! every chat request. Persistence goes through [`IdentityStore`] so the
//! session never touches a concrete storage layer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::error::IdentityError;

/// Storage key, shared with the website widget's local storage
pub const IDENTITY_KEY: &str = "chat_user_id";

const PREFIX: &str = "user_";
const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Generate a fresh `user_` token with a random base-36 suffix
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("{}{}", PREFIX, suffix))
    }

    /// Wrap a token read back from storage
    pub fn from_stored(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the stored identity, creating and persisting one if absent.
    ///
    /// `set` is called at most once, and only when nothing was stored.
    pub fn load_or_create(store: &dyn IdentityStore) -> Result<Self, IdentityError> {
        if let Some(existing) = store.get()? {
            return Ok(existing);
        }

        let identity = Self::generate();
        store.set(&identity)?;
        info!(user_id = identity.as_str(), "created chat identity");
        Ok(identity)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable key-value port holding the identity
pub trait IdentityStore: Send + Sync {
    fn get(&self) -> Result<Option<Identity>, IdentityError>;
    fn set(&self, identity: &Identity) -> Result<(), IdentityError>;
}

/// JSON file store, one file per profile
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory
    pub fn in_data_dir() -> Result<Self, IdentityError> {
        let data_dir = dirs::data_dir().ok_or(IdentityError::NoDataDir)?;
        Ok(Self::new(data_dir.join("sitechat").join("identity.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<HashMap<String, String>, IdentityError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self) -> Result<Option<Identity>, IdentityError> {
        let entries = self.read_entries()?;
        Ok(entries.get(IDENTITY_KEY).map(Identity::from_stored))
    }

    fn set(&self, identity: &Identity) -> Result<(), IdentityError> {
        let mut entries = self.read_entries()?;
        entries.insert(IDENTITY_KEY.to_string(), identity.as_str().to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// In-process store for tests and for running without a writable data dir
#[derive(Default)]
pub struct MemoryIdentityStore {
    value: Mutex<Option<Identity>>,
    writes: Mutex<usize>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            value: Mutex::new(Some(identity)),
            writes: Mutex::new(0),
        }
    }

    /// Number of `set` calls so far
    pub fn writes(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or_default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self) -> Result<Option<Identity>, IdentityError> {
        Ok(self.value.lock().ok().and_then(|v| v.clone()))
    }

    fn set(&self, identity: &Identity) -> Result<(), IdentityError> {
        if let Ok(mut value) = self.value.lock() {
            *value = Some(identity.clone());
        }
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }
}
