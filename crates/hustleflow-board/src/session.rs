use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::warn;

use hustleflow_types::models::{Identity, IDENTITY_TTL_HOURS};

/// Key under which the identity record is persisted client-side.
pub const STORAGE_KEY: &str = "hustleflow_identity";

const TOKEN_PREFIX: &str = "hstl_";

/// Fixed pool of pseudonymous display names.
const ALIAS_POOL: [&str; 12] = [
    "Panda", "Turtle", "Seahorse", "Squirrel", "Koala", "Dolphin", "Penguin", "Otter", "Quokka",
    "Meerkat", "Hedgehog", "Alpaca",
];

/// Client-local persistence seam for the session identity. Scoped to one
/// device; a multi-device deployment would swap in a server-side store
/// without touching the manager.
pub trait IdentityStore {
    fn load(&self) -> Result<Option<Identity>>;
    fn save(&self, identity: &Identity) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Issues and renews the pseudonymous session identity.
///
/// The token and alias are assigned once and survive every renewal; only
/// the profile fields and the expiry window change on save.
pub struct SessionManager<S> {
    store: S,
}

/// User-entered profile fields of a save.
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub real_name: String,
    pub room: String,
    pub contact: Option<String>,
}

impl<S: IdentityStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The stored identity if still valid; stale storage is cleared as a
    /// side effect of the read.
    pub fn current(&self, now: DateTime<Utc>) -> Result<Option<Identity>> {
        match self.store.load()? {
            Some(identity) if !identity.is_expired(now) => Ok(Some(identity)),
            Some(_) => {
                self.store.clear()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Write the profile back with a fresh 24-hour window, reusing the
    /// token and alias of a still-valid identity.
    pub fn save(&self, profile: ProfileFields, now: DateTime<Utc>) -> Result<Identity> {
        let (token, display_alias) = match self.current(now)? {
            Some(existing) => (existing.token, existing.display_alias),
            None => (generate_token(), random_alias()),
        };

        let identity = Identity {
            token,
            display_alias,
            real_name: profile.real_name,
            room: profile.room,
            contact: profile.contact,
            expires_at: now + Duration::hours(IDENTITY_TTL_HOURS),
        };
        self.store.save(&identity)?;
        Ok(identity)
    }
}

fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

fn random_alias() -> String {
    let idx = rand::rng().random_range(0..ALIAS_POOL.len());
    ALIAS_POOL[idx].to_string()
}

/// JSON file store: a single keyed record, the file-system analog of the
/// browser's keyed local storage. Unreadable content is treated as absent
/// and cleared.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for JsonFileStore {
    fn load(&self) -> Result<Option<Identity>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<HashMap<String, Identity>>(&raw) {
            Ok(mut records) => Ok(records.remove(STORAGE_KEY)),
            Err(e) => {
                warn!("discarding unreadable identity storage: {}", e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn save(&self, identity: &Identity) -> Result<()> {
        let mut records = HashMap::new();
        records.insert(STORAGE_KEY.to_string(), identity.clone());
        fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory identity store for tests.
#[derive(Default)]
pub struct MemoryIdentityStore {
    slot: Mutex<Option<Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<Identity>> {
        Ok(self
            .slot
            .lock()
            .map_err(|e| anyhow::anyhow!("identity lock poisoned: {}", e))?
            .clone())
    }

    fn save(&self, identity: &Identity) -> Result<()> {
        *self
            .slot
            .lock()
            .map_err(|e| anyhow::anyhow!("identity lock poisoned: {}", e))? = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .slot
            .lock()
            .map_err(|e| anyhow::anyhow!("identity lock poisoned: {}", e))? = None;
        Ok(())
    }
}
