//! Durable subscriber registry
//!
//! One JSON file holds every registered chat and its notification settings.
//! The registry is loaded once at startup, held in memory for the process
//! lifetime, and rewritten after every mutation.

use crate::error::{BotError, Result};
use crate::types::{PreferenceKind, PreferenceSet, Subscriber};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;


/// On-disk layout: `{ "users": [ ... ] }`
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    users: Vec<Subscriber>,
}

/// In-memory subscriber registry backed by a JSON file.
///
/// All mutation goes through the one lock, which also serializes against the
/// scheduler's fan-out snapshots. The lock is never held across an await.
pub struct SubscriberStore {
    path: PathBuf,
    registry: RwLock<RegistryFile>,
}

impl SubscriberStore {
    /// Load the registry from `path`. A missing file starts an empty
    /// registry; a malformed one is logged and replaced with an empty
    /// registry, never an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let registry = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<RegistryFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(
                        "Corrupt registry file {}: {}, starting with an empty registry",
                        path.display(),
                        e
                    );
                    RegistryFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read registry file {}: {}, starting with an empty registry",
                    path.display(),
                    e
                );
                RegistryFile::default()
            }
        };
        tracing::info!(
            "Loaded {} subscriber(s) from {}",
            registry.users.len(),
            path.display()
        );
        Self {
            path,
            registry: RwLock::new(registry),
        }
    }

    /// Register a chat. Returns `true` if a new record was created with
    /// default settings, `false` if the chat was already known (no mutation).
    pub fn register(&self, chat_id: i64, username: Option<String>) -> bool {
        let mut registry = self.registry.write();
        if registry.users.iter().any(|u| u.chat_id == chat_id) {
            return false;
        }
        registry.users.push(Subscriber {
            chat_id,
            username,
            registered_at: Utc::now(),
            settings: PreferenceSet::default(),
        });
        self.persist(&registry);
        true
    }

    pub fn find(&self, chat_id: i64) -> Option<Subscriber> {
        self.registry
            .read()
            .users
            .iter()
            .find(|u| u.chat_id == chat_id)
            .cloned()
    }

    /// Flip one preference flag and persist. Unknown chats are an error the
    /// command surface reports back to the sender.
    pub fn set_preference(&self, chat_id: i64, kind: PreferenceKind, value: bool) -> Result<()> {
        let mut registry = self.registry.write();
        let user = registry
            .users
            .iter_mut()
            .find(|u| u.chat_id == chat_id)
            .ok_or(BotError::NotRegistered(chat_id))?;
        user.settings.set(kind, value);
        self.persist(&registry);
        Ok(())
    }

    /// Snapshot of every registered subscriber, in registration order
    pub fn all(&self) -> Vec<Subscriber> {
        self.registry.read().users.clone()
    }

    /// Subscribers satisfying `predicate`, in registration order
    pub fn all_matching(&self, predicate: impl Fn(&Subscriber) -> bool) -> Vec<Subscriber> {
        self.registry
            .read()
            .users
            .iter()
            .filter(|u| predicate(u))
            .cloned()
            .collect()
    }

    /// Disk failures are logged and swallowed: the in-memory registry stays
    /// authoritative and the next successful write reconciles the file.
    fn persist(&self, registry: &RegistryFile) {
        if let Err(e) = self.write_atomic(registry) {
            tracing::error!(
                "Failed to persist registry to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    /// Write-then-rename so a crash mid-write cannot corrupt the registry.
    fn write_atomic(&self, registry: &RegistryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(registry)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
